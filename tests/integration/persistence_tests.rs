//! Persistence gateway against the mock card: the atomic replace
//! protocol under a stubborn final file, and the busy marker.

use meddispenser::app::ports::StorageError;
use meddispenser::config::DispenserConfig;
use meddispenser::error::Error;
use meddispenser::persistence::PersistenceGateway;

use crate::mock_hw::{MockFs, NoopDelay, SCHEDULE_FILE, TEMP_FILE};

fn gateway(fs: MockFs) -> PersistenceGateway<MockFs> {
    PersistenceGateway::new(fs, &DispenserConfig::default())
}

fn write(gw: &mut PersistenceGateway<MockFs>, data: &[u8]) -> Result<(), Error> {
    let mut h = gw.begin_write(TEMP_FILE)?;
    gw.append(&mut h, data)?;
    gw.commit(h, SCHEDULE_FILE, &mut NoopDelay)
}

#[test]
fn stubborn_final_is_removed_on_retry() {
    let mut fs = MockFs::with_file(SCHEDULE_FILE, b"old");
    fs.remove_failures = 3;
    let mut gw = gateway(fs);

    write(&mut gw, b"new").unwrap();
    assert_eq!(gw.store().file(SCHEDULE_FILE), Some(&b"new"[..]));
    assert!(gw.store().file(TEMP_FILE).is_none());
    assert!(!gw.is_busy());
}

#[test]
fn final_that_never_goes_away_is_overwritten_by_copy() {
    // Every retry fails, so the rename meets an existing target and the
    // copy path replaces the final file.
    let mut fs = MockFs::with_file(SCHEDULE_FILE, b"old contents");
    fs.remove_failures = 6;
    let mut gw = gateway(fs);

    write(&mut gw, b"new").unwrap();
    assert_eq!(gw.store().file(SCHEDULE_FILE), Some(&b"new"[..]));
    assert!(!gw.is_busy());
}

#[test]
fn large_payload_survives_chunked_copy() {
    let mut fs = MockFs::new();
    fs.fail_rename = true;
    let mut gw = gateway(fs);
    let payload: Vec<u8> = (0..1_000u32).map(|i| (i % 251) as u8).collect();

    write(&mut gw, &payload).unwrap();
    assert_eq!(gw.store().file(SCHEDULE_FILE), Some(payload.as_slice()));
}

#[test]
fn read_and_write_refused_while_busy() {
    let mut gw = gateway(MockFs::with_file(SCHEDULE_FILE, b"[]"));
    let h = gw.begin_write(TEMP_FILE).unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(gw.read_all(SCHEDULE_FILE, &mut buf), Err(Error::StorageBusy));
    assert_eq!(gw.begin_write("other.tmp").err(), Some(Error::StorageBusy));

    gw.abort(h);
    assert_eq!(gw.read_all(SCHEDULE_FILE, &mut buf), Ok(2));
}

#[test]
fn failed_read_releases_busy_marker() {
    let mut fs = MockFs::with_file(SCHEDULE_FILE, b"[]");
    fs.read_failures = 1;
    let mut gw = gateway(fs);

    let mut buf = [0u8; 16];
    assert_eq!(
        gw.read_all(SCHEDULE_FILE, &mut buf),
        Err(Error::Storage(StorageError::IoError))
    );
    assert!(!gw.is_busy());
    assert_eq!(gw.read_all(SCHEDULE_FILE, &mut buf), Ok(2));
}

#[test]
fn stubborn_temp_is_left_on_abort_and_truncated_on_next_write() {
    let mut fs = MockFs::new();
    fs.remove_failures = 2;
    let mut gw = gateway(fs);

    let mut h = gw.begin_write(TEMP_FILE).unwrap();
    gw.append(&mut h, b"stale partial").unwrap();
    gw.abort(h);
    assert!(!gw.is_busy(), "a failed remove still releases the card");
    assert_eq!(gw.store().file(TEMP_FILE), Some(&b"stale partial"[..]));

    // The leftover will not go either; create starts it from empty.
    write(&mut gw, b"new").unwrap();
    assert_eq!(gw.store().file(SCHEDULE_FILE), Some(&b"new"[..]));
    assert!(gw.store().file(TEMP_FILE).is_none());
}
