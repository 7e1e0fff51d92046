//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers: no closures, no
//! dynamic dispatch, no heap.
//!
//! ```text
//!  IDLE ──[tube queued, delay elapsed]──▶ OPENING ──[valve settle]──▶ STABILIZING
//!    ▲                                                                   │
//!    │                                                            [stabilize]
//!    │                                                                   ▼
//!  CLOSING ◀──────── STOPPING ◀──[beam confirmed | sensing timeout]── SENSING
//!    │ [valve settle]
//!    └──▶ IDLE (next tube after the inter-tube delay)
//! ```
//!
//! Every path out of `Stabilizing`/`Sensing` passes through `Stopping` and
//! `Closing`, so the motor is always switched off and the valve always
//! returned to standby whatever the sensor did.

use super::context::{ActuatorCommands, DispenseContext, TubeReport};
use super::{StateDescriptor, StateId};
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Opening
        StateDescriptor {
            id: StateId::Opening,
            name: "Opening",
            on_enter: Some(opening_enter),
            on_exit: Some(opening_exit),
            on_update: opening_update,
        },
        // Index 2: Stabilizing
        StateDescriptor {
            id: StateId::Stabilizing,
            name: "Stabilizing",
            on_enter: Some(stabilizing_enter),
            on_exit: None,
            on_update: stabilizing_update,
        },
        // Index 3: Sensing
        StateDescriptor {
            id: StateId::Sensing,
            name: "Sensing",
            on_enter: None,
            on_exit: None,
            on_update: sensing_update,
        },
        // Index 4: Stopping
        StateDescriptor {
            id: StateId::Stopping,
            name: "Stopping",
            on_enter: Some(stopping_enter),
            on_exit: None,
            on_update: stopping_update,
        },
        // Index 5: Closing
        StateDescriptor {
            id: StateId::Closing,
            name: "Closing",
            on_enter: Some(closing_enter),
            on_exit: Some(closing_exit),
            on_update: closing_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE: waiting for a queued tube
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut DispenseContext) {
    ctx.commands = ActuatorCommands::all_off(ctx.config.servo_standby_deg);
}

fn idle_update(ctx: &mut DispenseContext) -> Option<StateId> {
    let job = ctx.job.as_ref()?;

    if ctx.cursor >= job.tubes.len() {
        info!("IDLE: job {} finished ({} tubes)", job.time, job.tubes.len());
        ctx.finished = Some(job.time.clone());
        ctx.job = None;
        return None;
    }

    if ctx.now_ms >= ctx.next_start_ms {
        return Some(StateId::Opening);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPENING: valve pulsed open, then back to standby on exit
// ═══════════════════════════════════════════════════════════════════════════

fn opening_enter(ctx: &mut DispenseContext) {
    ctx.detected = false;
    let Some(tube) = ctx.current_tube() else {
        return;
    };
    let (a, name) = (tube.actuator, tube.tube.clone());
    ctx.commands.valves[a] = ctx.config.servo_open_deg;
    info!(
        "OPENING: {} on actuator {} ({}°)",
        name, a, ctx.config.servo_open_deg
    );
}

fn opening_exit(ctx: &mut DispenseContext) {
    if let Some(a) = ctx.current_actuator() {
        ctx.commands.valves[a] = ctx.config.servo_standby_deg;
    }
}

fn opening_update(ctx: &mut DispenseContext) -> Option<StateId> {
    if ctx.ms_in_state >= ctx.config.valve_settle_ms as u64 {
        return Some(StateId::Stabilizing);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  STABILIZING: motor running, sensor ignored until vibration settles
// ═══════════════════════════════════════════════════════════════════════════

fn stabilizing_enter(ctx: &mut DispenseContext) {
    if let Some(a) = ctx.current_actuator() {
        ctx.commands.motors[a] = true;
    }
    ctx.motor_started_ms = ctx.now_ms;
}

fn stabilizing_update(ctx: &mut DispenseContext) -> Option<StateId> {
    if ctx.ms_in_state >= ctx.config.stabilize_ms as u64 {
        return Some(StateId::Sensing);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SENSING: waiting for the beam, bounded from motor start
// ═══════════════════════════════════════════════════════════════════════════

fn sensing_update(ctx: &mut DispenseContext) -> Option<StateId> {
    if ctx.beam_confirmed {
        ctx.detected = true;
        info!(
            "SENSING: drop detected after {} ms",
            ctx.now_ms.saturating_sub(ctx.motor_started_ms)
        );
        return Some(StateId::Stopping);
    }

    if ctx.now_ms.saturating_sub(ctx.motor_started_ms) >= ctx.config.sensing_timeout_ms as u64 {
        warn!(
            "SENSING: no drop within {} ms, stopping",
            ctx.config.sensing_timeout_ms
        );
        return Some(StateId::Stopping);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  STOPPING: motor off; the valve closes on the next tick
// ═══════════════════════════════════════════════════════════════════════════

fn stopping_enter(ctx: &mut DispenseContext) {
    if let Some(a) = ctx.current_actuator() {
        ctx.commands.motors[a] = false;
    }
}

fn stopping_update(_ctx: &mut DispenseContext) -> Option<StateId> {
    Some(StateId::Closing)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CLOSING: valve pulsed closed, back to standby on exit
// ═══════════════════════════════════════════════════════════════════════════

fn closing_enter(ctx: &mut DispenseContext) {
    if let Some(a) = ctx.current_actuator() {
        ctx.commands.valves[a] = ctx.config.servo_close_deg;
    }
}

fn closing_exit(ctx: &mut DispenseContext) {
    let Some(tube) = ctx.current_tube() else {
        return;
    };
    let report = TubeReport {
        tube: tube.tube.clone(),
        actuator: tube.actuator,
        detected: ctx.detected,
        feed_ms: ctx.now_ms.saturating_sub(ctx.motor_started_ms),
    };
    ctx.commands.valves[report.actuator] = ctx.config.servo_standby_deg;
    ctx.report = Some(report);
    ctx.cursor += 1;
    ctx.next_start_ms = ctx.now_ms + ctx.config.inter_tube_delay_ms as u64;
}

fn closing_update(ctx: &mut DispenseContext) -> Option<StateId> {
    if ctx.ms_in_state >= ctx.config.valve_settle_ms as u64 {
        return Some(StateId::Idle);
    }
    None
}
