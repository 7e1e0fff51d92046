//! Persistence gateway: the only path to the SD card.
//!
//! Wraps a [`FileStore`] with a cooperative busy marker and the atomic
//! replace protocol for the schedule file:
//!
//! ```text
//!  begin_write(tmp) ─▶ append* ─▶ commit(final)
//!                                   │ sync + close tmp      (fail: final untouched)
//!                                   │ remove final, ≤N tries
//!                                   │ rename tmp → final ──ok──▶ done
//!                                   └ copy tmp → final in chunks, remove tmp
//! ```
//!
//! The busy marker is never waited on: a contested `begin_write` or
//! `read_all` returns [`Error::StorageBusy`] immediately and the caller
//! decides what to do.  It is released on every exit from `commit` and
//! `abort`.
//!
//! The copy fallback is best-effort: losing power between removing the old
//! final file and finishing the copy loses the schedule.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::{FileStore, StorageError};
use crate::config::{DispenserConfig, FileName};
use crate::error::{Error, ParseError, Result};
use crate::schedule::bounded;

/// Largest copy-fallback chunk the gateway will stage on the stack.
const MAX_COPY_CHUNK: usize = 512;

/// Proof that a temporary file is open for writing.  Consumed by
/// [`PersistenceGateway::commit`] or [`PersistenceGateway::abort`].
#[derive(Debug)]
pub struct WriteHandle {
    name: FileName,
    written: usize,
}

impl WriteHandle {
    /// Bytes appended so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

pub struct PersistenceGateway<S: FileStore> {
    store: S,
    busy: bool,
    settle_ms: u32,
    remove_attempts: u8,
    retry_delay_ms: u32,
    copy_chunk: usize,
}

impl<S: FileStore> PersistenceGateway<S> {
    pub fn new(store: S, config: &DispenserConfig) -> Self {
        Self {
            store,
            busy: false,
            settle_ms: config.commit_settle_ms,
            remove_attempts: config.commit_remove_attempts,
            retry_delay_ms: config.commit_retry_delay_ms,
            copy_chunk: (config.copy_chunk_bytes as usize).clamp(1, MAX_COPY_CHUNK),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // ── Write path ────────────────────────────────────────────

    /// Remove any stale `name`, create it empty and take the busy marker.
    pub fn begin_write(&mut self, name: &str) -> Result<WriteHandle> {
        if self.busy {
            warn!("STORE: begin_write({}) while busy", name);
            return Err(Error::StorageBusy);
        }

        if self.store.exists(name) {
            // Leftover from an interrupted session.  `create` truncates it
            // if it refuses to go.
            self.discard(name);
        }
        self.store.create(name)?;
        self.busy = true;

        Ok(WriteHandle {
            name: bounded(name),
            written: 0,
        })
    }

    pub fn append(&mut self, handle: &mut WriteHandle, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.store.append(&handle.name, data)?;
        handle.written += data.len();
        Ok(())
    }

    /// End a write without committing.  The temporary file is discarded.
    pub fn abort(&mut self, handle: WriteHandle) {
        if let Err(e) = self.store.close(&handle.name) {
            debug!("STORE: close {} on abort: {}", handle.name, e);
        }
        self.discard(&handle.name);
        self.busy = false;
        info!("STORE: discarded {} ({} bytes)", handle.name, handle.written);
    }

    /// Replace `final_name` with the content written through `handle`.
    pub fn commit(
        &mut self,
        handle: WriteHandle,
        final_name: &str,
        delay: &mut impl DelayNs,
    ) -> Result<()> {
        let result = self.commit_inner(&handle, final_name, delay);
        if self.store.exists(&handle.name) {
            self.discard(&handle.name);
        }
        self.busy = false;

        match result {
            Ok(()) => info!(
                "STORE: committed {} bytes to {}",
                handle.written, final_name
            ),
            Err(e) => warn!("STORE: commit to {} failed: {}", final_name, e),
        }
        result
    }

    fn commit_inner(
        &mut self,
        handle: &WriteHandle,
        final_name: &str,
        delay: &mut impl DelayNs,
    ) -> Result<()> {
        let tmp = handle.name.as_str();

        // Nothing outside the temp file has changed yet.
        let synced = self.store.sync(tmp);
        let closed = self.store.close(tmp);
        synced?;
        closed?;
        delay.delay_ms(self.settle_ms);

        if self.store.exists(final_name) {
            for attempt in 1..=self.remove_attempts {
                delay.delay_ms(self.retry_delay_ms);
                if self.store.remove(final_name).is_ok() && !self.store.exists(final_name) {
                    break;
                }
                warn!(
                    "STORE: remove {} failed (attempt {}/{})",
                    final_name, attempt, self.remove_attempts
                );
            }
        }

        match self.store.rename(tmp, final_name) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("STORE: rename failed ({}), copying", e);
                self.copy_file(tmp, final_name)
            }
        }
    }

    fn copy_file(&mut self, from: &str, to: &str) -> Result<()> {
        if self.store.exists(to) {
            self.discard(to);
        }
        self.store.create(to)?;

        let mut chunk = [0u8; MAX_COPY_CHUNK];
        let chunk = &mut chunk[..self.copy_chunk];
        let mut offset = 0;
        let copied = loop {
            let n = match self.store.read_at(from, offset, chunk) {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) => break Err(e),
            };
            if let Err(e) = self.store.append(to, &chunk[..n]) {
                break Err(e);
            }
            offset += n;
        };

        let synced = self.store.sync(to);
        let closed = self.store.close(to);
        copied?;
        synced?;
        closed?;
        Ok(())
    }

    /// Best-effort removal.  A file that will not go is logged and left.
    fn discard(&mut self, name: &str) {
        if let Err(e) = self.store.remove(name) {
            warn!("STORE: could not remove {}: {}", name, e);
        }
    }

    // ── Read path ─────────────────────────────────────────────

    /// Read the whole of `name` into `buf`.  Returns the byte count.
    pub fn read_all(&mut self, name: &str, buf: &mut [u8]) -> Result<usize> {
        if self.busy {
            warn!("STORE: read_all({}) while busy", name);
            return Err(Error::StorageBusy);
        }
        if !self.store.exists(name) {
            return Err(Error::Storage(StorageError::NotFound));
        }

        self.busy = true;
        let result = self.read_into(name, buf);
        self.busy = false;
        result
    }

    fn read_into(&mut self, name: &str, buf: &mut [u8]) -> Result<usize> {
        let mut len = 0;
        loop {
            if len == buf.len() {
                let mut extra = [0u8; 1];
                return match self.store.read_at(name, len, &mut extra)? {
                    0 => Ok(len),
                    _ => Err(Error::Parse(ParseError::TooLarge)),
                };
            }
            let n = self.store.read_at(name, len, &mut buf[len..])?;
            if n == 0 {
                return Ok(len);
            }
            len += n;
        }
    }
}
