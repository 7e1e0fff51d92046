//! Serial ingestion: frame scanning and streaming to storage.
//!
//! ```text
//!  #START# <payload bytes …> #END#   ──▶  'A'
//! ```
//!
//! [`IngestionSession`] is fed one byte at a time by the control loop and
//! drives the [`PersistenceGateway`](crate::persistence::PersistenceGateway)
//! directly, so a payload never has to fit in RAM.

pub mod buffer;
pub mod session;

pub use buffer::RollingBuffer;
pub use session::{FrameOutcome, IngestionSession};

/// Opens a frame.
pub const START_MARKER: &[u8] = b"#START#";
/// Closes a frame.
pub const END_MARKER: &[u8] = b"#END#";
/// Sent back once `#END#` has been recognised.
pub const ACK_BYTE: u8 = b'A';
