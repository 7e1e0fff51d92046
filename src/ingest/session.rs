//! Framing state machine for one schedule upload.
//!
//! ```text
//!            #START# (begin_write ok)
//!   IDLE ────────────────────────────▶ RECEIVING
//!    ▲  ▲                                 │ │ │
//!    │  └──── #END# → commit ─────────────┘ │ │
//!    │                                      │ │
//!    └── idle 5 s / session 20 s → abort ───┘ │
//!    └── append failed → abort ───────────────┘
//! ```
//!
//! While idle the window is trimmed to its last 16 bytes once it reaches
//! 56, which is still enough to see a start marker split across reads.
//! While receiving, the first 32 bytes are flushed to storage whenever the
//! window reaches 56 bytes; the unflushed tail always covers a partly
//! received terminator.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::ports::FileStore;
use crate::config::{DispenserConfig, FileName};
use crate::error::{Error, FramingError, Result};
use crate::persistence::{PersistenceGateway, WriteHandle};
use crate::schedule::SCHEDULE_MAX_BYTES;

use super::buffer::RollingBuffer;
use super::{END_MARKER, START_MARKER};

/// Scanner window size.
pub const WINDOW: usize = 64;
/// Fill level at which the window is trimmed or flushed.
const HIGH_WATER: usize = WINDOW - 8;
/// Bytes kept when trimming an idle window.
const IDLE_TAIL: usize = 16;
/// Bytes flushed to storage per chunk while receiving.
const FLUSH_CHUNK: usize = 32;

/// What a byte or a timeout check did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Start marker seen and the temporary file is open.
    Started,
    /// Start marker seen but storage refused the write.  Still idle.
    Rejected(Error),
    /// Terminator seen.  `result` is the commit outcome.
    Completed { bytes: usize, result: Result<()> },
    /// Receiving ended without a commit.
    Aborted(Error),
}

struct Receiving {
    handle: WriteHandle,
    started_ms: u64,
}

pub struct IngestionSession {
    window: RollingBuffer<WINDOW>,
    receiving: Option<Receiving>,
    last_byte_ms: u64,
    idle_timeout_ms: u64,
    session_timeout_ms: u64,
    temp_file: FileName,
    schedule_file: FileName,
}

impl IngestionSession {
    pub fn new(config: &DispenserConfig) -> Self {
        Self {
            window: RollingBuffer::new(),
            receiving: None,
            last_byte_ms: 0,
            idle_timeout_ms: config.frame_idle_timeout_ms as u64,
            session_timeout_ms: config.frame_session_timeout_ms as u64,
            temp_file: config.temp_file.clone(),
            schedule_file: config.schedule_file.clone(),
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving.is_some()
    }

    /// Bytes written to the temporary file so far (0 when idle).
    pub fn bytes_streamed(&self) -> usize {
        self.receiving.as_ref().map_or(0, |r| r.handle.written())
    }

    /// Feed one received byte.
    pub fn on_byte<S: FileStore>(
        &mut self,
        byte: u8,
        now_ms: u64,
        gateway: &mut PersistenceGateway<S>,
        delay: &mut impl DelayNs,
    ) -> Option<FrameOutcome> {
        self.last_byte_ms = now_ms;
        // The thresholds below keep the window from ever filling.
        let _ = self.window.push(byte);

        if self.receiving.is_some() {
            self.scan_receiving(gateway, delay)
        } else {
            self.scan_idle(now_ms, gateway)
        }
    }

    /// Enforce the idle and session bounds.  Call once per control tick.
    pub fn poll_timeout<S: FileStore>(
        &mut self,
        now_ms: u64,
        gateway: &mut PersistenceGateway<S>,
    ) -> Option<FrameOutcome> {
        let rx = self.receiving.as_ref()?;

        let reason = if now_ms.saturating_sub(self.last_byte_ms) > self.idle_timeout_ms {
            FramingError::IdleTimeout
        } else if now_ms.saturating_sub(rx.started_ms) > self.session_timeout_ms {
            FramingError::SessionTimeout
        } else {
            return None;
        };

        warn!("FRAME: {} after {} bytes", reason, rx.handle.written());
        Some(self.abort(gateway, Error::Framing(reason)))
    }

    // ── Internal ──────────────────────────────────────────────

    fn scan_idle<S: FileStore>(
        &mut self,
        now_ms: u64,
        gateway: &mut PersistenceGateway<S>,
    ) -> Option<FrameOutcome> {
        let Some(pos) = self.window.find(START_MARKER) else {
            if self.window.len() >= HIGH_WATER {
                self.window.keep_tail(IDLE_TAIL);
            }
            return None;
        };

        match gateway.begin_write(&self.temp_file) {
            Ok(handle) => {
                // Anything after the marker is payload.
                self.window.drop_front(pos + START_MARKER.len());
                self.receiving = Some(Receiving {
                    handle,
                    started_ms: now_ms,
                });
                info!("FRAME: start, streaming to {}", self.temp_file);
                Some(FrameOutcome::Started)
            }
            Err(e) => {
                warn!("FRAME: start rejected: {}", e);
                self.window.clear();
                Some(FrameOutcome::Rejected(e))
            }
        }
    }

    fn scan_receiving<S: FileStore>(
        &mut self,
        gateway: &mut PersistenceGateway<S>,
        delay: &mut impl DelayNs,
    ) -> Option<FrameOutcome> {
        let rx = self.receiving.as_mut()?;

        if let Some(pos) = self.window.find(END_MARKER) {
            if rx.handle.written() + pos > SCHEDULE_MAX_BYTES {
                return Some(self.oversize(gateway));
            }
            if let Err(e) = gateway.append(&mut rx.handle, &self.window.as_slice()[..pos]) {
                return Some(self.abort(gateway, e));
            }
            self.window.drop_front(pos + END_MARKER.len());

            let rx = self.receiving.take()?;
            let bytes = rx.handle.written();
            info!("FRAME: end after {} bytes", bytes);
            let result = gateway.commit(rx.handle, &self.schedule_file, delay);
            return Some(FrameOutcome::Completed { bytes, result });
        }

        if self.window.len() >= HIGH_WATER {
            if rx.handle.written() + FLUSH_CHUNK > SCHEDULE_MAX_BYTES {
                return Some(self.oversize(gateway));
            }
            let chunk = &self.window.as_slice()[..FLUSH_CHUNK];
            if let Err(e) = gateway.append(&mut rx.handle, chunk) {
                return Some(self.abort(gateway, e));
            }
            self.window.drop_front(FLUSH_CHUNK);
        }
        None
    }

    fn oversize<S: FileStore>(&mut self, gateway: &mut PersistenceGateway<S>) -> FrameOutcome {
        warn!("FRAME: payload exceeds {} bytes", SCHEDULE_MAX_BYTES);
        self.abort(gateway, Error::Framing(FramingError::Oversize))
    }

    fn abort<S: FileStore>(
        &mut self,
        gateway: &mut PersistenceGateway<S>,
        reason: Error,
    ) -> FrameOutcome {
        if let Some(rx) = self.receiving.take() {
            gateway.abort(rx.handle);
        }
        self.window.clear();
        FrameOutcome::Aborted(reason)
    }
}
