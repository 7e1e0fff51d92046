//! Bounded schedule store.
//!
//! Holds the parsed [`ScheduleEntry`] table and the [`TimeSlotGroup`] view
//! derived from it.  Both live in fixed-capacity `heapless` collections;
//! anything beyond capacity is dropped at the point it would overflow, and
//! the group view is rebuilt in full whenever the entry table is replaced.
//!
//! ```text
//!   data.json ──parse──▶ entries[≤12] ──group_by_time──▶ groups[≤12]
//!                                                         └─ members[≤3]
//! ```

mod parse;
pub mod time;

use heapless::Vec;
use log::warn;

use crate::error::ParseError;

pub use time::WallTime;

// ═══════════════════════════════════════════════════════════════════════════
//  Capacities
// ═══════════════════════════════════════════════════════════════════════════

/// Live `(entry, time_to_take)` pairs kept after parsing.
pub const MAX_ENTRIES: usize = 12;
/// Medications that can share one time slot.
pub const MAX_GROUP_MEMBERS: usize = 3;
/// Distinct tubes the provisioning wizard will walk through.
pub const MAX_DISTINCT_TUBES: usize = 10;
/// Largest schedule file accepted over the link and read back from storage.
pub const SCHEDULE_MAX_BYTES: usize = 4096;

pub const TIME_LEN: usize = 5;
pub const TUBE_LEN: usize = 7;
pub const MEDICATION_LEN: usize = 23;
pub const DOSAGE_LEN: usize = 15;

pub type TimeKey = heapless::String<TIME_LEN>;
pub type TubeId = heapless::String<TUBE_LEN>;
pub type MedicationName = heapless::String<MEDICATION_LEN>;
pub type DosageLabel = heapless::String<DOSAGE_LEN>;

/// Copy `s` into a fixed-capacity string, cutting at the last character
/// boundary that fits.
pub fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════
//  Records
// ═══════════════════════════════════════════════════════════════════════════

/// One dose of one medication at one time of day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub time: TimeKey,
    pub tube: TubeId,
    pub medication: MedicationName,
    pub dosage: DosageLabel,
    /// Grams loaded into the tube for this dose.
    pub amount: i32,
}

/// A medication inside a [`TimeSlotGroup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub medication: MedicationName,
    pub dosage: DosageLabel,
    pub tube: TubeId,
    pub amount: i32,
}

impl From<&ScheduleEntry> for GroupMember {
    fn from(e: &ScheduleEntry) -> Self {
        Self {
            medication: e.medication.clone(),
            dosage: e.dosage.clone(),
            tube: e.tube.clone(),
            amount: e.amount,
        }
    }
}

/// Every medication due at the same `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlotGroup {
    pub time: TimeKey,
    pub members: Vec<GroupMember, MAX_GROUP_MEMBERS>,
}

impl TimeSlotGroup {
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// The slot key as a wall time, or `None` for a malformed key.
    pub fn wall_time(&self) -> Option<WallTime> {
        WallTime::parse(&self.time)
    }
}

/// Group entries by exact time string.  Groups appear in first-seen order;
/// members keep entry order and stop at [`MAX_GROUP_MEMBERS`].
pub fn group_by_time(entries: &[ScheduleEntry]) -> Vec<TimeSlotGroup, MAX_ENTRIES> {
    let mut groups: Vec<TimeSlotGroup, MAX_ENTRIES> = Vec::new();

    for entry in entries {
        let member = GroupMember::from(entry);
        if let Some(group) = groups.iter_mut().find(|g| g.time == entry.time) {
            if group.members.push(member).is_err() {
                warn!(
                    "SCHED: slot {} full, dropping {}",
                    entry.time, entry.medication
                );
            }
            continue;
        }

        let mut members = Vec::new();
        // A fresh member list always has room for one.
        let _ = members.push(member);
        // `entries` never exceeds MAX_ENTRIES, so neither do distinct keys.
        let _ = groups.push(TimeSlotGroup {
            time: entry.time.clone(),
            members,
        });
    }

    groups
}

// ═══════════════════════════════════════════════════════════════════════════
//  Store
// ═══════════════════════════════════════════════════════════════════════════

/// The live schedule: entries plus the group view derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleStore {
    entries: Vec<ScheduleEntry, MAX_ENTRIES>,
    groups: Vec<TimeSlotGroup, MAX_ENTRIES>,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-parsed entries.  At most
    /// [`MAX_ENTRIES`] are kept.
    pub fn from_entries(entries: &[ScheduleEntry]) -> Self {
        let mut kept: Vec<ScheduleEntry, MAX_ENTRIES> = Vec::new();
        for e in entries.iter().take(MAX_ENTRIES) {
            let _ = kept.push(e.clone());
        }
        let groups = group_by_time(&kept);
        Self {
            entries: kept,
            groups,
        }
    }

    /// Parse a schedule document and rebuild the group view.
    ///
    /// A document that yields no entries is an error: an empty schedule is
    /// never installed over a working one.
    pub fn load(content: &[u8]) -> Result<Self, ParseError> {
        let entries = parse::parse_entries(content)?;
        if entries.is_empty() {
            return Err(ParseError::Empty);
        }
        let groups = group_by_time(&entries);
        Ok(Self { entries, groups })
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn groups(&self) -> &[TimeSlotGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The group whose key equals `key` exactly.
    pub fn group_for_key(&self, key: &str) -> Option<(usize, &TimeSlotGroup)> {
        self.groups
            .iter()
            .enumerate()
            .find(|(_, g)| g.time.as_str() == key)
    }

    /// Distinct tube ids in first-seen entry order, capped at
    /// [`MAX_DISTINCT_TUBES`].
    pub fn distinct_tubes(&self) -> Vec<TubeId, MAX_DISTINCT_TUBES> {
        let mut tubes: Vec<TubeId, MAX_DISTINCT_TUBES> = Vec::new();
        for e in &self.entries {
            if tubes.iter().any(|t| *t == e.tube) {
                continue;
            }
            if tubes.push(e.tube.clone()).is_err() {
                break;
            }
        }
        tubes
    }
}
