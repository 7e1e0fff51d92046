//! Fuzz target: `IngestionSession::on_byte`
//!
//! Streams arbitrary serial traffic through the frame scanner into an
//! in-memory store.  The session must never panic, and a completed frame
//! must leave exactly the streamed byte count in the schedule file with no
//! temporary file behind.
//!
//! cargo fuzz run fuzz_ingest_session

#![no_main]

use std::collections::HashMap;

use embedded_hal::delay::DelayNs;
use libfuzzer_sys::fuzz_target;
use meddispenser::app::ports::{FileStore, StorageError};
use meddispenser::config::DispenserConfig;
use meddispenser::ingest::{FrameOutcome, IngestionSession};
use meddispenser::persistence::PersistenceGateway;

#[derive(Default)]
struct MemFs(HashMap<String, Vec<u8>>);

impl FileStore for MemFs {
    fn exists(&mut self, name: &str) -> bool {
        self.0.contains_key(name)
    }
    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        self.0.remove(name).map(|_| ()).ok_or(StorageError::NotFound)
    }
    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
        if self.0.contains_key(to) {
            return Err(StorageError::IoError);
        }
        let data = self.0.remove(from).ok_or(StorageError::NotFound)?;
        self.0.insert(to.to_string(), data);
        Ok(())
    }
    fn create(&mut self, name: &str) -> Result<(), StorageError> {
        self.0.insert(name.to_string(), Vec::new());
        Ok(())
    }
    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        self.0
            .get_mut(name)
            .ok_or(StorageError::NotFound)?
            .extend_from_slice(data);
        Ok(())
    }
    fn sync(&mut self, _name: &str) -> Result<(), StorageError> {
        Ok(())
    }
    fn close(&mut self, _name: &str) -> Result<(), StorageError> {
        Ok(())
    }
    fn read_at(&mut self, name: &str, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.0.get(name).ok_or(StorageError::NotFound)?;
        let rest = data.get(offset..).unwrap_or(&[]);
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        Ok(n)
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

fuzz_target!(|data: &[u8]| {
    let config = DispenserConfig::default();
    let mut session = IngestionSession::new(&config);
    let mut gateway = PersistenceGateway::new(MemFs::default(), &config);

    for (i, &byte) in data.iter().enumerate() {
        let now = i as u64;
        if let Some(FrameOutcome::Completed { bytes, result: Ok(()) }) =
            session.on_byte(byte, now, &mut gateway, &mut NoDelay)
        {
            let file = gateway.store().0.get(config.schedule_file.as_str());
            assert_eq!(file.map(Vec::len), Some(bytes));
            assert!(!gateway.store().0.contains_key(config.temp_file.as_str()));
        }
        assert!(!gateway.is_busy() || session.is_receiving());
    }
});
