//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, test recorder, …).

use crate::dispense::DispenseEvent;
use crate::error::Error;
use crate::schedule::{MAX_GROUP_MEMBERS, TimeKey, TubeId};

/// Why a dose notification went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    /// Nobody acted within the notification window.
    TimedOut,
    /// The job for the slot completed.
    Dispensed,
    /// Cleared by command or by a schedule replacement.
    Cleared,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Boot finished.  `entries` is 0 when no schedule could be loaded.
    Booted { entries: usize, storage_ok: bool },

    // ── Ingestion ─────────────────────────────────────────────
    FrameStarted,
    /// A start marker arrived but storage refused the write.
    FrameRejected(Error),
    /// Terminator seen and acknowledged.  `committed` is the storage outcome.
    FrameCompleted { bytes: usize, committed: bool },
    FrameAborted(Error),

    // ── Schedule ──────────────────────────────────────────────
    ScheduleLoaded {
        entries: usize,
        groups: usize,
        attempt: u8,
    },
    /// Every reload attempt failed; the previous schedule stays live.
    ScheduleLoadFailed(Error),

    // ── Doses ─────────────────────────────────────────────────
    DoseDue { time: TimeKey, meds: usize },
    NotificationDismissed { time: TimeKey, reason: DismissReason },
    Dispense(DispenseEvent),
    /// A job was requested while another was running.
    DispenseRefused(TimeKey),
    /// None of the slot's tubes has an actuator.  The notification stays.
    DispenseSkipped {
        time: TimeKey,
        unknown: heapless::Vec<TubeId, MAX_GROUP_MEMBERS>,
    },

    // ── Provisioning ──────────────────────────────────────────
    WizardStarted { tubes: usize },
    WizardAdvanced { step: usize },
    WizardCompleted,

    /// The actuation guard found a fault; everything was switched off.
    SafetyTrip(u8),
}
