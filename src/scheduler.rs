//! Due-time scheduler.
//!
//! Answers two questions against the live [`ScheduleStore`]:
//!
//! * **due now**: which slot's `HH:MM` key string-equals the current
//!   minute.  A dose is due only during its exact minute; there is no
//!   catch-up for a minute the loop never observed.
//! * **due next**: which slot is the shortest forward distance away on a
//!   24-hour circle, ties going to the earlier group.
//!
//! [`Scheduler::poll`] adds the once-per-minute latch the control loop
//! needs: a slot fires at most once for a given minute, however many ticks
//! run inside it.

use core::fmt::Write;

use log::info;

use crate::schedule::{ScheduleStore, TimeKey, TimeSlotGroup, WallTime};

/// Capacity of the dose notification text.
pub const NOTIFICATION_LEN: usize = 200;

pub type NotificationText = heapless::String<NOTIFICATION_LEN>;

// ═══════════════════════════════════════════════════════════════
//  Queries
// ═══════════════════════════════════════════════════════════════

/// Index of the group whose key equals `now` formatted `HH:MM`.
pub fn due_now(groups: &[TimeSlotGroup], now: WallTime) -> Option<usize> {
    let key = now.key();
    groups.iter().position(|g| g.time == key)
}

/// Index of the group with the smallest forward circular distance from
/// `now`.  Groups with a malformed key are skipped.
pub fn due_next(groups: &[TimeSlotGroup], now: WallTime) -> Option<usize> {
    let mut best: Option<(usize, u16)> = None;
    for (i, g) in groups.iter().enumerate() {
        let Some(slot) = g.wall_time() else {
            continue;
        };
        let distance = now.minutes_until(slot);
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((i, distance));
        }
    }
    best.map(|(i, _)| i)
}

/// Human-readable prompt for a due slot.
///
/// One member: `TIME TO TAKE: <med> - <dosage>`.  Several:
/// `TIME TO TAKE <n> MEDS: <med0> (<dose0>) + <med1> (<dose1>)`.
pub fn notification_text(group: &TimeSlotGroup) -> NotificationText {
    let mut text = NotificationText::new();
    let members = &group.members;

    match members.len() {
        0 => {}
        1 => {
            let _ = write!(
                text,
                "TIME TO TAKE: {} - {}",
                members[0].medication, members[0].dosage
            );
        }
        n => {
            let _ = write!(
                text,
                "TIME TO TAKE {} MEDS: {} ({})",
                n, members[0].medication, members[0].dosage
            );
            if text.len() < 150 {
                let _ = write!(text, " + {} ({})", members[1].medication, members[1].dosage);
            }
        }
    }
    text
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

/// Once-per-minute latch over [`due_now`].
#[derive(Debug, Default)]
pub struct Scheduler {
    /// Minute in which a slot last fired.
    fired_key: Option<TimeKey>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of a slot that became due at `now` and has not
    /// yet fired during this minute.
    pub fn poll(&mut self, store: &ScheduleStore, now: WallTime) -> Option<usize> {
        let key = now.key();
        if self.fired_key.as_ref().is_some_and(|k| *k != key) {
            self.fired_key = None;
        }
        if self.fired_key.is_some() {
            return None;
        }

        let idx = due_now(store.groups(), now)?;
        info!(
            "SCHED: slot {} due ({} meds)",
            key,
            store.groups()[idx].count()
        );
        self.fired_key = Some(key);
        Some(idx)
    }

    /// Whether the slot for `now` has already fired.
    #[cfg(test)]
    pub fn fired_this_minute(&self, now: WallTime) -> bool {
        self.fired_key.as_ref().is_some_and(|k| *k == now.key())
    }
}
