//! Shared mutable context threaded through every FSM handler.
//!
//! `DispenseContext` is the blackboard the state handlers read from and
//! write to: the running job, the latest beam sample, actuator command
//! outputs, timing and configuration.

use heapless::Vec;

use crate::config::DispenserConfig;
use crate::pins::TUBE_COUNT;
use crate::schedule::{MAX_GROUP_MEMBERS, MedicationName, TimeKey, TubeId};

// ---------------------------------------------------------------------------
// Actuator commands (written by state handlers; applied by the engine)
// ---------------------------------------------------------------------------

/// Desired actuator positions, one slot per tube actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommands {
    /// Valve servo angle in degrees.
    pub valves: [u8; TUBE_COUNT],
    /// Feed motor on/off.
    pub motors: [bool; TUBE_COUNT],
}

impl ActuatorCommands {
    /// Every motor off, every valve at `standby_deg`.
    pub fn all_off(standby_deg: u8) -> Self {
        Self {
            valves: [standby_deg; TUBE_COUNT],
            motors: [false; TUBE_COUNT],
        }
    }

    /// Bit `i` set when motor `i` is on.
    pub fn motor_mask(&self) -> u8 {
        self.motors
            .iter()
            .enumerate()
            .fold(0, |m, (i, &on)| if on { m | (1 << i) } else { m })
    }

    /// Bit `i` set when valve `i` is away from `standby_deg`.
    pub fn valve_mask(&self, standby_deg: u8) -> u8 {
        self.valves
            .iter()
            .enumerate()
            .fold(0, |m, (i, &deg)| if deg != standby_deg { m | (1 << i) } else { m })
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One tube of a dispense job, already resolved to its actuator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTube {
    pub tube: TubeId,
    pub medication: MedicationName,
    pub actuator: usize,
}

/// The tubes of one due slot, actuated in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenseJob {
    pub time: TimeKey,
    pub tubes: Vec<JobTube, MAX_GROUP_MEMBERS>,
}

/// Result of actuating one tube.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TubeReport {
    pub tube: TubeId,
    pub actuator: usize,
    /// The beam confirmed a drop before the sensing timeout.
    pub detected: bool,
    /// From motor start to the end of the close pulse.
    pub feed_ms: u64,
}

// ---------------------------------------------------------------------------
// DispenseContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct DispenseContext {
    // -- Timing --
    /// Monotonic time of the current tick (milliseconds).
    pub now_ms: u64,
    /// Milliseconds since the current state was entered.
    pub ms_in_state: u64,

    // -- Sensor data --
    /// Two consecutive beam reads agreed on "interrupted" this tick.
    pub beam_confirmed: bool,

    // -- Actuator outputs --
    pub commands: ActuatorCommands,

    // -- Job progress --
    pub job: Option<DispenseJob>,
    /// Index into `job.tubes` of the tube being (or next to be) actuated.
    pub cursor: usize,
    /// Earliest time the next tube may start.
    pub next_start_ms: u64,
    pub motor_started_ms: u64,
    pub detected: bool,

    // -- Outputs to the engine --
    pub report: Option<TubeReport>,
    pub finished: Option<TimeKey>,

    pub config: DispenserConfig,
}

impl DispenseContext {
    pub fn new(config: DispenserConfig) -> Self {
        Self {
            now_ms: 0,
            ms_in_state: 0,
            beam_confirmed: false,
            commands: ActuatorCommands::all_off(config.servo_standby_deg),
            job: None,
            cursor: 0,
            next_start_ms: 0,
            motor_started_ms: 0,
            detected: false,
            report: None,
            finished: None,
            config,
        }
    }

    /// The tube at the cursor, if a job is running and not exhausted.
    pub fn current_tube(&self) -> Option<&JobTube> {
        self.job.as_ref()?.tubes.get(self.cursor)
    }

    pub fn current_actuator(&self) -> Option<usize> {
        self.current_tube().map(|t| t.actuator)
    }
}
