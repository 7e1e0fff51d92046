//! Actuation guard.
//!
//! Runs **every tick after the dispensing engine** and checks the commanded
//! actuator state against the engine state:
//!
//! | Fault                 | Condition                                      |
//! |-----------------------|------------------------------------------------|
//! | `MotorOutsideFeed`    | a motor is on outside `Stabilizing`/`Sensing`  |
//! | `ConcurrentMotors`    | more than one motor is on                      |
//! | `ValveOpenWhileIdle`  | a valve is off standby while the engine idles  |
//!
//! Any set bit makes the service force the engine safe and switch every
//! actuator off.  Bits clear on the next evaluation once the condition is
//! gone.

use core::fmt;

use log::{error, info};

use crate::fsm::StateId;
use crate::fsm::context::ActuatorCommands;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActuationFault {
    MotorOutsideFeed = 0,
    ConcurrentMotors = 1,
    ValveOpenWhileIdle = 2,
}

impl ActuationFault {
    pub const fn mask(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for ActuationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MotorOutsideFeed => write!(f, "motor on outside feed window"),
            Self::ConcurrentMotors => write!(f, "more than one motor on"),
            Self::ValveOpenWhileIdle => write!(f, "valve off standby while idle"),
        }
    }
}

pub struct ActuationGuard {
    standby_deg: u8,
    /// Latched fault bitmask.
    faults: u8,
}

impl ActuationGuard {
    pub fn new(standby_deg: u8) -> Self {
        Self {
            standby_deg,
            faults: 0,
        }
    }

    /// Evaluate the commanded state.  Returns the fault bitmask.
    pub fn evaluate(&mut self, state: StateId, cmds: &ActuatorCommands) -> u8 {
        let motors = cmds.motor_mask();

        self.eval_fault(
            ActuationFault::MotorOutsideFeed,
            motors != 0 && !state.motor_allowed(),
        );
        self.eval_fault(ActuationFault::ConcurrentMotors, motors.count_ones() > 1);
        self.eval_fault(
            ActuationFault::ValveOpenWhileIdle,
            state == StateId::Idle && cmds.valve_mask(self.standby_deg) != 0,
        );

        self.faults
    }

    #[cfg(test)]
    pub fn faults(&self) -> u8 {
        self.faults
    }

    #[cfg(test)]
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    #[cfg(test)]
    pub fn has_fault(&self, fault: ActuationFault) -> bool {
        self.faults & fault.mask() != 0
    }

    // ── Internal ──────────────────────────────────────────────────

    fn eval_fault(&mut self, fault: ActuationFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("ACTUATION FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("ACTUATION FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
