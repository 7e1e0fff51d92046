//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (valves, motors, beam sensor, serial link, SD card,
//! display, clock) implement these traits.  The
//! [`AppService`](super::service::AppService) consumes them via generics,
//! so the domain core never touches hardware directly.

use crate::schedule::WallTime;

use super::view::DisplayView;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to move tube actuators.
/// `actuator` is the index from [`TUBE_MAPPINGS`](crate::pins::TUBE_MAPPINGS).
pub trait ActuatorPort {
    /// Drive the valve servo of `actuator` to `angle` degrees.
    fn set_valve(&mut self, actuator: usize, angle: u8);

    /// Switch the feed motor of `actuator` on or off.
    fn set_motor(&mut self, actuator: usize, on: bool);

    /// Every motor off, every valve to standby.  Safe shutdown.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the discrete inputs.
pub trait SensorPort {
    /// Raw level of the drop-chute beam: `true` while something blocks it.
    fn beam_interrupted(&mut self) -> bool;

    /// Raw level of the confirm (DROP) button: `true` while held.
    fn confirm_pressed(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: serial link ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Raw byte link to the companion app.  Framing is the domain's job.
pub trait TransportPort {
    /// Non-blocking read.  Returns the number of bytes placed in `buf`
    /// (0 when nothing is pending).
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Best-effort write of `data`.
    fn write(&mut self, data: &[u8]);
}

// ───────────────────────────────────────────────────────────────
// File store port (driven adapter: domain ↔ SD card)
// ───────────────────────────────────────────────────────────────

/// Flat named-file storage.  At most one file is open for writing at a
/// time; `create` opens it and `close` ends it.  Mutual exclusion is the
/// caller's job (see [`PersistenceGateway`](crate::persistence::PersistenceGateway)).
pub trait FileStore {
    fn exists(&mut self, name: &str) -> bool;

    /// Remove `name`.  Removing a missing file is `NotFound`.
    fn remove(&mut self, name: &str) -> Result<(), StorageError>;

    /// Rename `from` to `to`.  Fails if `to` exists.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError>;

    /// Create `name` empty (truncating) and open it for appending.
    fn create(&mut self, name: &str) -> Result<(), StorageError>;

    /// Append to the file opened by `create`.
    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Flush buffered writes of the open file to the medium.
    fn sync(&mut self, name: &str) -> Result<(), StorageError>;

    /// Close the open file.
    fn close(&mut self, name: &str) -> Result<(), StorageError>;

    /// Read up to `buf.len()` bytes starting at `offset`.  Returns 0 at end
    /// of file.
    fn read_at(&mut self, name: &str, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock and monotonic time sources.
pub trait ClockPort {
    /// Current time of day from the RTC.
    fn wall_time(&mut self) -> WallTime;

    /// Milliseconds since boot (monotonic).
    fn uptime_ms(&mut self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: domain → screen)
// ───────────────────────────────────────────────────────────────

/// Pull-based renderer.  Called only when the view is dirty.
pub trait DisplayPort {
    fn render(&mut self, view: &DisplayView<'_>);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from configuration validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

/// Errors from [`FileStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested file does not exist.
    NotFound,
    /// The medium is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
