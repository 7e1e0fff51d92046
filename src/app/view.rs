//! Read-only snapshot handed to the [`DisplayPort`](super::ports::DisplayPort).

use crate::schedule::{TimeSlotGroup, WallTime};
use crate::wizard::WizardStep;

/// Active dose notification as the screen shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationView<'a> {
    pub text: &'a str,
    pub elapsed_secs: u64,
    /// Seconds until auto-dismiss.
    pub remaining_secs: u64,
}

/// Everything a renderer needs, borrowed from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayView<'a> {
    pub now: WallTime,
    pub storage_ok: bool,
    /// Unattended dispensing is allowed.
    pub trusted: bool,
    pub groups: &'a [TimeSlotGroup],
    /// Index into `groups`.
    pub due_next: Option<usize>,
    pub notification: Option<NotificationView<'a>>,
    pub wizard: Option<WizardStep>,
    pub dispensing: bool,
}

impl DisplayView<'_> {
    pub fn next_group(&self) -> Option<&TimeSlotGroup> {
        self.groups.get(self.due_next?)
    }
}
