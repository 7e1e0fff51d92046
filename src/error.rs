//! Unified error types for the dispenser firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the ingestion session and dispense engine without
//! allocation.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The serial framing layer gave up on a frame.
    Framing(FramingError),
    /// The storage device is held by another operation.
    StorageBusy,
    /// A storage operation failed.
    Storage(StorageError),
    /// The schedule document could not be turned into entries.
    Parse(ParseError),
    /// A tube never reported a detection before its deadline.
    ActuatorTimeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framing(e) => write!(f, "framing: {e}"),
            Self::StorageBusy => write!(f, "storage busy"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Parse(e) => write!(f, "schedule: {e}"),
            Self::ActuatorTimeout => write!(f, "actuator timeout"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Framing errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// No byte arrived within the idle window.
    IdleTimeout,
    /// The frame exceeded the total session window.
    SessionTimeout,
    /// A start marker arrived but storage could not be opened.
    StartRejected,
    /// The payload outgrew the largest schedule the device will read.
    Oversize,
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::SessionTimeout => write!(f, "session timeout"),
            Self::StartRejected => write!(f, "start rejected"),
            Self::Oversize => write!(f, "frame too large"),
        }
    }
}

impl From<FramingError> for Error {
    fn from(e: FramingError) -> Self {
        Self::Framing(e)
    }
}

// ---------------------------------------------------------------------------
// Schedule parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The content is not valid JSON.
    Syntax,
    /// Valid JSON, but not an array of schedule objects.
    UnexpectedShape,
    /// The document parsed but produced no entries.
    Empty,
    /// The file is larger than the read buffer.
    TooLarge,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "invalid JSON"),
            Self::UnexpectedShape => write!(f, "unexpected document shape"),
            Self::Empty => write!(f, "no schedule entries"),
            Self::TooLarge => write!(f, "document too large"),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
