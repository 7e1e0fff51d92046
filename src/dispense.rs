//! Dispensing engine: runs one job at a time through the actuation FSM.
//!
//! The engine owns the [`Fsm`] and its [`DispenseContext`].  Per tick it
//! samples the beam (only while sensing), advances the FSM, and pushes
//! any changed actuator command to the [`ActuatorPort`].  Motors are
//! switched off before valves move, and switched on after.

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use log::{info, warn};

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::config::DispenserConfig;
use crate::fsm::context::{ActuatorCommands, DispenseContext, DispenseJob, JobTube, TubeReport};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::pins::{TUBE_COUNT, actuator_for_tube};
use crate::schedule::{MAX_GROUP_MEMBERS, TimeKey, TimeSlotGroup, TubeId};

/// Events produced by [`DispenseEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispenseEvent {
    /// A job was accepted.  `unknown` tubes have no actuator and were
    /// left out.
    JobStarted {
        time: TimeKey,
        tubes: usize,
        unknown: Vec<TubeId, MAX_GROUP_MEMBERS>,
    },
    TubeDone(TubeReport),
    JobDone(TimeKey),
}

/// Returned by [`DispenseEngine::start_job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStart {
    Accepted(DispenseEvent),
    /// A job is already running.  Nothing was queued.
    Busy,
    /// No member maps to an actuator.  Nothing was queued.
    NoKnownTube(Vec<TubeId, MAX_GROUP_MEMBERS>),
}

pub struct DispenseEngine {
    fsm: Fsm,
    ctx: DispenseContext,
    /// Last commands written to hardware.
    applied: ActuatorCommands,
    beam_pause_us: u32,
}

impl DispenseEngine {
    pub fn new(config: DispenserConfig) -> Self {
        let beam_pause_us = config.beam_confirm_pause_us;
        let ctx = DispenseContext::new(config);
        let applied = ctx.commands;
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx,
            applied,
            beam_pause_us,
        }
    }

    /// Enter `Idle` and drive every actuator to its safe position.
    pub fn start(&mut self, now_ms: u64, hw: &mut impl ActuatorPort) {
        self.ctx.now_ms = now_ms;
        self.fsm.start(&mut self.ctx);
        hw.all_off();
        self.applied = self.ctx.commands;
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn commands(&self) -> &ActuatorCommands {
        &self.ctx.commands
    }

    /// A job is queued or a tube is mid-actuation.
    pub fn is_busy(&self) -> bool {
        self.ctx.job.is_some() || self.fsm.current_state() != StateId::Idle
    }

    /// Queue every member of `group`.  Unknown tubes are skipped with a
    /// warning.
    pub fn start_job(&mut self, group: &TimeSlotGroup, now_ms: u64) -> JobStart {
        if self.is_busy() {
            warn!("DISPENSE: job {} refused, engine busy", group.time);
            return JobStart::Busy;
        }

        let mut tubes = Vec::new();
        let mut unknown = Vec::new();
        for m in &group.members {
            match actuator_for_tube(&m.tube) {
                Some(actuator) => {
                    let _ = tubes.push(JobTube {
                        tube: m.tube.clone(),
                        medication: m.medication.clone(),
                        actuator,
                    });
                }
                None => {
                    warn!("DISPENSE: unknown tube '{}' for {}, skipped", m.tube, m.medication);
                    let _ = unknown.push(m.tube.clone());
                }
            }
        }

        if tubes.is_empty() {
            warn!("DISPENSE: job {} has no known tube, nothing queued", group.time);
            return JobStart::NoKnownTube(unknown);
        }

        info!(
            "DISPENSE: job {} with {} tubes ({} skipped)",
            group.time,
            tubes.len(),
            unknown.len()
        );

        let event = DispenseEvent::JobStarted {
            time: group.time.clone(),
            tubes: tubes.len(),
            unknown,
        };
        self.ctx.job = Some(DispenseJob {
            time: group.time.clone(),
            tubes,
        });
        self.ctx.cursor = 0;
        self.ctx.next_start_ms = now_ms;
        JobStart::Accepted(event)
    }

    /// One control-loop step.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl SensorPort + ActuatorPort),
        delay: &mut impl DelayNs,
    ) -> Option<DispenseEvent> {
        self.ctx.now_ms = now_ms;
        self.ctx.beam_confirmed =
            self.fsm.current_state() == StateId::Sensing && self.sample_beam(hw, delay);

        self.fsm.tick(&mut self.ctx);
        self.apply(hw);

        if let Some(report) = self.ctx.report.take() {
            return Some(DispenseEvent::TubeDone(report));
        }
        self.ctx.finished.take().map(DispenseEvent::JobDone)
    }

    /// Drop any job, return to `Idle` and switch every actuator off.
    pub fn force_safe(&mut self, hw: &mut impl ActuatorPort) {
        self.ctx.job = None;
        self.fsm.force_transition(StateId::Idle, &mut self.ctx);
        self.ctx.commands = ActuatorCommands::all_off(self.ctx.config.servo_standby_deg);
        self.ctx.report = None;
        self.ctx.finished = None;
        hw.all_off();
        self.applied = self.ctx.commands;
    }

    // ── Internal ──────────────────────────────────────────────

    /// Two reads, `beam_pause_us` apart, must both see the beam broken.
    fn sample_beam(&self, hw: &mut impl SensorPort, delay: &mut impl DelayNs) -> bool {
        if !hw.beam_interrupted() {
            return false;
        }
        delay.delay_us(self.beam_pause_us);
        hw.beam_interrupted()
    }

    fn apply(&mut self, hw: &mut impl ActuatorPort) {
        let want = self.ctx.commands;

        for i in 0..TUBE_COUNT {
            if self.applied.motors[i] && !want.motors[i] {
                hw.set_motor(i, false);
            }
        }
        for i in 0..TUBE_COUNT {
            if self.applied.valves[i] != want.valves[i] {
                hw.set_valve(i, want.valves[i]);
            }
        }
        for i in 0..TUBE_COUNT {
            if !self.applied.motors[i] && want.motors[i] {
                hw.set_motor(i, true);
            }
        }
        self.applied = want;
    }
}
