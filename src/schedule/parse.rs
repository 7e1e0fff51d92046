//! Field-filtered streaming parse of the schedule document.
//!
//! The document is a JSON array of objects:
//!
//! ```text
//! [ { "tube": "tube1", "type": "Aspirin", "amount": 10,
//!     "time_to_take": [ { "time": "08:00", "dosage": "1 tab" }, ... ] }, ... ]
//! ]
//! ```
//!
//! Only `tube`, `type`, `amount` and `time_to_take[].{time,dosage}` are
//! read; every other key is skipped with `IgnoredAny`.  Nothing is
//! collected into a DOM: each field goes straight into its bounded slot.
//! A field of the wrong JSON type reads as its default (`""` / `0`), and an
//! object whose `time_to_take` is missing or not an array contributes no
//! entries.

use core::fmt;

use heapless::Vec;
use log::warn;
use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::error::Category;

use super::{
    DOSAGE_LEN, DosageLabel, MAX_ENTRIES, MEDICATION_LEN, MedicationName, ScheduleEntry, TIME_LEN,
    TimeKey, TUBE_LEN, TubeId, bounded,
};
use crate::error::ParseError;

/// Parse a document into at most [`MAX_ENTRIES`] entries.  Pairs beyond
/// capacity are dropped with a warning.
pub(super) fn parse_entries(content: &[u8]) -> Result<Vec<ScheduleEntry, MAX_ENTRIES>, ParseError> {
    let mut de = serde_json::Deserializer::from_slice(content);
    let parsed = de.deserialize_seq(ScheduleVisitor).map_err(classify)?;
    de.end().map_err(classify)?;

    if parsed.dropped > 0 {
        warn!(
            "SCHED: {} dose times beyond capacity ({}) dropped",
            parsed.dropped, MAX_ENTRIES
        );
    }
    Ok(parsed.entries)
}

fn classify(e: serde_json::Error) -> ParseError {
    match e.classify() {
        Category::Data => ParseError::UnexpectedShape,
        Category::Syntax | Category::Eof | Category::Io => ParseError::Syntax,
    }
}

// ───────────────────────────────────────────────────────────────
// Lenient visitor helpers
// ───────────────────────────────────────────────────────────────

/// Accept scalar values of the wrong type and yield the fallback.
macro_rules! fallback_scalars {
    ($fallback:expr) => {
        fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
            Ok($fallback)
        }
        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok($fallback)
        }
        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok($fallback)
        }
    };
}

macro_rules! fallback_numbers {
    ($fallback:expr) => {
        fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
            Ok($fallback)
        }
        fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
            Ok($fallback)
        }
        fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
            Ok($fallback)
        }
    };
}

macro_rules! fallback_str {
    ($fallback:expr) => {
        fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
            Ok($fallback)
        }
    };
}

macro_rules! fallback_seq {
    ($de:lifetime, $fallback:expr) => {
        fn visit_seq<A: SeqAccess<$de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok($fallback)
        }
    };
}

macro_rules! fallback_map {
    ($de:lifetime, $fallback:expr) => {
        fn visit_map<A: MapAccess<$de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
            Ok($fallback)
        }
    };
}

// ───────────────────────────────────────────────────────────────
// Leaf values
// ───────────────────────────────────────────────────────────────

/// A string truncated into `N` bytes; non-strings read as `""`.
struct Text<const N: usize>(heapless::String<N>);

impl<'de, const N: usize> Deserialize<'de> for Text<N> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct TextVisitor<const N: usize>;

        impl<'de, const N: usize> Visitor<'de> for TextVisitor<N> {
            type Value = Text<N>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Text(bounded(v)))
            }

            fallback_scalars!(Text(heapless::String::new()));
            fallback_numbers!(Text(heapless::String::new()));
            fallback_seq!('de, Text(heapless::String::new()));
            fallback_map!('de, Text(heapless::String::new()));
        }

        d.deserialize_any(TextVisitor::<N>)
    }
}

/// Gram amount; any JSON number is accepted and saturated into `i32`.
struct Amount(i32);

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Amount(v.clamp(i32::MIN as i64, i32::MAX as i64) as i32))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Amount(v.min(i32::MAX as u64) as i32))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                // `as` saturates and maps NaN to 0.
                Ok(Amount(v as i32))
            }

            fallback_scalars!(Amount(0));
            fallback_str!(Amount(0));
            fallback_seq!('de, Amount(0));
            fallback_map!('de, Amount(0));
        }

        d.deserialize_any(AmountVisitor)
    }
}

// ───────────────────────────────────────────────────────────────
// time_to_take
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct DoseTime {
    time: TimeKey,
    dosage: DosageLabel,
}

impl<'de> Deserialize<'de> for DoseTime {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct DoseTimeVisitor;

        impl<'de> Visitor<'de> for DoseTimeVisitor {
            type Value = DoseTime;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a {time, dosage} object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut out = DoseTime::default();
                while let Some(key) = map.next_key::<Key>()? {
                    match key {
                        Key::Time => out.time = map.next_value::<Text<TIME_LEN>>()?.0,
                        Key::Dosage => out.dosage = map.next_value::<Text<DOSAGE_LEN>>()?.0,
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(out)
            }

            fallback_scalars!(DoseTime::default());
            fallback_numbers!(DoseTime::default());
            fallback_str!(DoseTime::default());
            fallback_seq!('de, DoseTime::default());
        }

        d.deserialize_any(DoseTimeVisitor)
    }
}

/// The dose times of one object.  `None` when `time_to_take` is not an
/// array.  Elements past [`MAX_ENTRIES`] are counted, not stored.
struct DoseTimes(Option<(Vec<DoseTime, MAX_ENTRIES>, usize)>);

impl<'de> Deserialize<'de> for DoseTimes {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct DoseTimesVisitor;

        impl<'de> Visitor<'de> for DoseTimesVisitor {
            type Value = DoseTimes;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array of dose times")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut times = Vec::new();
                let mut overflow = 0usize;
                while !times.is_full() {
                    match seq.next_element::<DoseTime>()? {
                        Some(t) => {
                            let _ = times.push(t);
                        }
                        None => return Ok(DoseTimes(Some((times, overflow)))),
                    }
                }
                while seq.next_element::<IgnoredAny>()?.is_some() {
                    overflow += 1;
                }
                Ok(DoseTimes(Some((times, overflow))))
            }

            fallback_scalars!(DoseTimes(None));
            fallback_numbers!(DoseTimes(None));
            fallback_str!(DoseTimes(None));
            fallback_map!('de, DoseTimes(None));
        }

        d.deserialize_any(DoseTimesVisitor)
    }
}

// ───────────────────────────────────────────────────────────────
// Schedule object
// ───────────────────────────────────────────────────────────────

enum Key {
    Tube,
    Type,
    Amount,
    TimeToTake,
    Time,
    Dosage,
    Other,
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = Key;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object key")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(match v {
                    "tube" => Key::Tube,
                    "type" => Key::Type,
                    "amount" => Key::Amount,
                    "time_to_take" => Key::TimeToTake,
                    "time" => Key::Time,
                    "dosage" => Key::Dosage,
                    _ => Key::Other,
                })
            }
        }

        d.deserialize_identifier(KeyVisitor)
    }
}

#[derive(Default)]
struct RawObject {
    tube: TubeId,
    medication: MedicationName,
    amount: i32,
    times: Option<(Vec<DoseTime, MAX_ENTRIES>, usize)>,
}

impl<'de> Deserialize<'de> for RawObject {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct RawObjectVisitor;

        impl<'de> Visitor<'de> for RawObjectVisitor {
            type Value = RawObject;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a schedule object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut out = RawObject::default();
                while let Some(key) = map.next_key::<Key>()? {
                    match key {
                        Key::Tube => out.tube = map.next_value::<Text<TUBE_LEN>>()?.0,
                        Key::Type => {
                            out.medication = map.next_value::<Text<MEDICATION_LEN>>()?.0;
                        }
                        Key::Amount => out.amount = map.next_value::<Amount>()?.0,
                        Key::TimeToTake => out.times = map.next_value::<DoseTimes>()?.0,
                        Key::Time | Key::Dosage | Key::Other => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(out)
            }

            fallback_scalars!(RawObject::default());
            fallback_numbers!(RawObject::default());
            fallback_str!(RawObject::default());
            fallback_seq!('de, RawObject::default());
        }

        d.deserialize_any(RawObjectVisitor)
    }
}

// ───────────────────────────────────────────────────────────────
// Top level
// ───────────────────────────────────────────────────────────────

struct Parsed {
    entries: Vec<ScheduleEntry, MAX_ENTRIES>,
    dropped: usize,
}

struct ScheduleVisitor;

impl<'de> Visitor<'de> for ScheduleVisitor {
    type Value = Parsed;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of schedule objects")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = Parsed {
            entries: Vec::new(),
            dropped: 0,
        };

        while let Some(obj) = seq.next_element::<RawObject>()? {
            let Some((times, overflow)) = obj.times else {
                continue;
            };
            out.dropped += overflow;

            for t in times {
                let entry = ScheduleEntry {
                    time: t.time,
                    tube: obj.tube.clone(),
                    medication: obj.medication.clone(),
                    dosage: t.dosage,
                    amount: obj.amount,
                };
                if out.entries.push(entry).is_err() {
                    out.dropped += 1;
                }
            }
        }

        Ok(out)
    }
}
