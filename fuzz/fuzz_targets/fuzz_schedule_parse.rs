//! Fuzz target: `ScheduleStore::load`
//!
//! Whatever lands on the card must either parse into a bounded schedule
//! or be rejected.  It must never panic.
//!
//! cargo fuzz run fuzz_schedule_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use meddispenser::schedule::{MAX_ENTRIES, MAX_GROUP_MEMBERS, ScheduleStore};

fuzz_target!(|data: &[u8]| {
    let Ok(store) = ScheduleStore::load(data) else {
        return;
    };

    assert!(!store.is_empty());
    assert!(store.entries().len() <= MAX_ENTRIES);
    assert!(store.groups().len() <= store.entries().len());
    for group in store.groups() {
        assert!(group.count() >= 1 && group.count() <= MAX_GROUP_MEMBERS);
    }
});
