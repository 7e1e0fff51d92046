//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (the confirm
//! button, a maintenance console, tests) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// The confirm button fired.  Advances the wizard when it is active,
    /// otherwise dispenses the slot of the active notification.
    Confirm,

    /// Drop the active notification without dispensing.
    DismissNotification,

    /// Re-read the schedule file.  Does not arm the wizard.
    ReloadSchedule,
}
