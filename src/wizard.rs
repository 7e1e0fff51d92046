//! Tube provisioning wizard.
//!
//! After a fresh upload the operator is walked through every distinct tube
//! the schedule uses and loads it by hand, confirming each step.  Until
//! the last tube is confirmed the dispenser does not run unattended.
//!
//! ```text
//!  INACTIVE ──[arm (fresh load) + next render]──▶ IN_PROGRESS(0)
//!                                                    │ confirm
//!                                                    ▼
//!                                               IN_PROGRESS(i+1) … ──[confirm last]──▶ INACTIVE
//! ```
//!
//! Arming is one-shot: it is consumed by the next render cycle and only a
//! new successful ingestion arms it again.

use heapless::Vec;
use log::info;

use crate::schedule::{MAX_DISTINCT_TUBES, MedicationName, ScheduleStore, TubeId};

/// Medications listed per step before "+ more".
pub const MAX_LISTED: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    Inactive,
    /// Index into the distinct-tube list.
    InProgress(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Not active; the press belongs to someone else.
    Ignored,
    /// Moved on to step `n`.
    Advanced(usize),
    /// Last tube confirmed.
    Completed,
}

/// What the display shows for the current step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardStep {
    /// Zero-based step.
    pub index: usize,
    pub total: usize,
    pub tube: TubeId,
    /// `(medication, grams)` per schedule entry for this tube.
    pub medications: Vec<(MedicationName, i32), MAX_LISTED>,
    /// More entries exist than are listed.
    pub more: bool,
    /// Grams across every entry for this tube.
    pub total_grams: i32,
}

#[derive(Debug)]
pub struct ProvisioningWizard {
    state: WizardState,
    armed: bool,
    tubes: Vec<TubeId, MAX_DISTINCT_TUBES>,
    confirm_pending: bool,
}

impl Default for ProvisioningWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisioningWizard {
    pub const fn new() -> Self {
        Self {
            state: WizardState::Inactive,
            armed: false,
            tubes: Vec::new(),
            confirm_pending: false,
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, WizardState::InProgress(_))
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// The current step is waiting for the operator.
    pub fn confirm_pending(&self) -> bool {
        self.is_active() && self.confirm_pending
    }

    /// Arm after a reload from a fresh upload.  Ignored when the store has
    /// no groups.  Restarts a wizard that was already running.
    pub fn arm(&mut self, store: &ScheduleStore) {
        if store.groups().is_empty() {
            return;
        }
        self.tubes = store.distinct_tubes();
        self.state = WizardState::Inactive;
        self.armed = !self.tubes.is_empty();
        if self.armed {
            info!("WIZARD: armed for {} tubes", self.tubes.len());
        }
    }

    /// Consume the arm flag.  Returns `true` when the wizard started.
    pub fn activate_if_armed(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = false;
        self.state = WizardState::InProgress(0);
        self.confirm_pending = true;
        info!("WIZARD: started, tube 1/{} = {}", self.tubes.len(), self.tubes[0]);
        true
    }

    /// Operator confirmed the current tube is loaded.
    pub fn confirm(&mut self) -> ConfirmOutcome {
        let WizardState::InProgress(i) = self.state else {
            return ConfirmOutcome::Ignored;
        };

        info!("WIZARD: tube {}/{} ({}) loaded", i + 1, self.tubes.len(), self.tubes[i]);
        let next = i + 1;
        if next >= self.tubes.len() {
            self.state = WizardState::Inactive;
            self.confirm_pending = false;
            info!("WIZARD: complete, unattended dispensing enabled");
            ConfirmOutcome::Completed
        } else {
            self.state = WizardState::InProgress(next);
            self.confirm_pending = true;
            ConfirmOutcome::Advanced(next)
        }
    }

    /// Build the view of the current step from `store`.
    pub fn step(&self, store: &ScheduleStore) -> Option<WizardStep> {
        let WizardState::InProgress(index) = self.state else {
            return None;
        };
        let tube = self.tubes.get(index)?.clone();

        let mut medications = Vec::new();
        let mut more = false;
        let mut total_grams: i32 = 0;
        for e in store.entries().iter().filter(|e| e.tube == tube) {
            total_grams = total_grams.saturating_add(e.amount);
            if medications.push((e.medication.clone(), e.amount)).is_err() {
                more = true;
            }
        }

        Some(WizardStep {
            index,
            total: self.tubes.len(),
            tube,
            medications,
            more,
            total_grams,
        })
    }
}
