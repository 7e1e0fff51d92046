//! Integration tests for the AppService → engine → actuators pipeline.
//!
//! These run on the host (x86_64) and drive the full control loop (boot,
//! due-slot detection, notifications, the confirm button and the
//! dispensing engine) against mock adapters.

use meddispenser::app::commands::AppCommand;
use meddispenser::app::events::{AppEvent, DismissReason};
use meddispenser::config::DispenserConfig;
use meddispenser::dispense::DispenseEvent;
use meddispenser::fsm::StateId;
use meddispenser::schedule::WallTime;

use crate::mock_hw::{ActuatorCall, MockFs, Rig, SCHEDULE_FILE};

fn manual_config() -> DispenserConfig {
    DispenserConfig {
        auto_dispense: false,
        ..DispenserConfig::default()
    }
}

fn job_done(rig: &Rig) -> bool {
    rig.sink
        .any(|e| matches!(e, AppEvent::Dispense(DispenseEvent::JobDone(_))))
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_with_schedule_is_trusted_and_parks_actuators() {
    let rig = Rig::provisioned(DispenserConfig::default());

    assert!(rig.app.storage_ok());
    assert!(rig.app.is_trusted());
    assert_eq!(rig.app.schedule().entries().len(), 3);
    assert_eq!(rig.app.schedule().groups().len(), 2);
    assert!(!rig.app.wizard().is_armed(), "boot never arms the wizard");
    assert_eq!(rig.hw.calls.first(), Some(&ActuatorCall::AllOff));
    assert_eq!(
        rig.sink.events.last(),
        Some(&AppEvent::Booted {
            entries: 3,
            storage_ok: true
        })
    );
}

#[test]
fn boot_without_schedule_reports_storage_error() {
    let mut rig = Rig::new(DispenserConfig::default(), MockFs::new());

    assert!(!rig.app.storage_ok());
    assert!(!rig.app.is_trusted());
    assert!(rig.app.schedule().is_empty());

    rig.tick(10);
    let frame = rig.display.frames.last().unwrap();
    assert!(!frame.storage_ok);
    assert_eq!(frame.groups, 0);
}

#[test]
fn boot_with_garbage_file_keeps_empty_schedule() {
    let rig = Rig::new(
        DispenserConfig::default(),
        MockFs::with_file("data.json", b"{not json"),
    );
    assert!(!rig.app.storage_ok());
    assert!(rig.app.schedule().is_empty());
}

// ── Unattended dispensing ─────────────────────────────────────

#[test]
fn due_slot_dispenses_every_tube_unattended() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.hw.beam = true;
    rig.hw.clear();

    rig.clock.wall = WallTime::new(8, 0).unwrap();
    rig.tick(10);

    assert!(rig.sink.any(|e| matches!(e, AppEvent::DoseDue { meds: 2, .. })));
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::Dispense(DispenseEvent::JobStarted { tubes: 2, unknown, .. }) if unknown.is_empty()
    )));
    assert_eq!(
        rig.app.notification_text(),
        Some("TIME TO TAKE 2 MEDS: Aspirin (1 tab) + Zinc (2 caps)")
    );

    assert!(rig.run_until(60_000, job_done), "job never finished");

    assert_eq!(rig.hw.motor_starts(), vec![0, 1], "tubes run in order");
    assert!(!rig.hw.motor_on(0));
    assert!(!rig.hw.motor_on(1));
    assert_eq!(rig.app.engine_state(), StateId::Idle);

    let detected = rig.sink.count(|e| {
        matches!(e, AppEvent::Dispense(DispenseEvent::TubeDone(r)) if r.detected)
    });
    assert_eq!(detected, 2);

    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::NotificationDismissed { reason: DismissReason::Dispensed, .. }
    )));
    assert_eq!(rig.app.notification_text(), None);
}

#[test]
fn slot_fires_once_per_minute() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.hw.beam = true;
    rig.clock.wall = WallTime::new(8, 0).unwrap();
    assert!(rig.run_until(60_000, job_done));

    // Still 08:00 on the wall: nothing new.
    rig.run_until(5_000, |_| false);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::DoseDue { .. })), 1);
    assert!(!rig.app.is_dispensing());
}

#[test]
fn missing_drop_times_out_and_moves_on() {
    let mut rig = Rig::provisioned(DispenserConfig {
        sensing_timeout_ms: 1_000,
        ..DispenserConfig::default()
    });
    rig.hw.beam = false;
    rig.clock.wall = WallTime::new(8, 0).unwrap();

    assert!(rig.run_until(60_000, job_done));
    let misses = rig.sink.count(|e| {
        matches!(e, AppEvent::Dispense(DispenseEvent::TubeDone(r)) if !r.detected)
    });
    assert_eq!(misses, 2);
    assert_eq!(rig.hw.motor_starts(), vec![0, 1]);
}

#[test]
fn motor_runs_only_between_open_and_close_pulses() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.hw.beam = true;
    rig.hw.clear();
    rig.clock.wall = WallTime::new(8, 0).unwrap();
    assert!(rig.run_until(60_000, job_done));

    // Each motor start follows an open pulse on the same tube, and no
    // close pulse is sent while that motor runs.
    let open = rig.app.config().servo_open_deg;
    let close = rig.app.config().servo_close_deg;
    let mut opened = [false; 4];
    let mut motor = [false; 4];
    for call in &rig.hw.calls {
        match *call {
            ActuatorCall::SetMotor { actuator, on: true } => {
                assert!(opened[actuator], "motor {} started without open pulse", actuator);
                opened[actuator] = false;
                motor[actuator] = true;
            }
            ActuatorCall::SetMotor { actuator, on: false } => motor[actuator] = false,
            ActuatorCall::SetValve { actuator, angle } => {
                if angle == open {
                    opened[actuator] = true;
                }
                if angle == close {
                    assert!(!motor[actuator], "valve closed on a running motor");
                }
            }
            ActuatorCall::AllOff => motor = [false; 4],
        }
    }
    assert_eq!(motor, [false; 4]);
}

// ── Manual dispensing ─────────────────────────────────────────

#[test]
fn notification_waits_for_button_without_auto_dispense() {
    let mut rig = Rig::provisioned(manual_config());
    rig.hw.beam = true;
    rig.clock.wall = WallTime::new(8, 0).unwrap();
    rig.tick(10);

    assert!(rig.app.notification_text().is_some());
    assert!(!rig.app.is_dispensing());
    let frame = rig.display.frames.last().unwrap();
    assert!(frame.notification.is_some());

    rig.press_button();
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::Dispense(DispenseEvent::JobStarted { tubes: 2, .. })
    )));
    assert!(rig.run_until(60_000, job_done));
    assert_eq!(rig.app.notification_text(), None);
}

#[test]
fn button_after_slot_minute_does_not_dispense() {
    let mut rig = Rig::provisioned(manual_config());
    rig.hw.beam = true;
    rig.clock.wall = WallTime::new(8, 0).unwrap();
    rig.tick(10);
    assert!(rig.app.notification_text().is_some());

    // The notification is still up but its minute is gone.
    rig.clock.wall = WallTime::new(8, 1).unwrap();
    rig.tick(10);
    rig.press_button();

    assert!(rig.app.notification_text().is_some());
    assert!(!rig.app.is_dispensing());
    assert!(!rig.sink.any(|e| matches!(e, AppEvent::Dispense(_))));
    assert!(rig.hw.motor_starts().is_empty());
}

#[test]
fn slot_without_known_tube_keeps_notification() {
    const UNKNOWN_TUBE_JSON: &str = r#"[{"tube":"tube9","type":"Biotin","amount":3,"time_to_take":[{"time":"08:00","dosage":"1"}]}]"#;
    let mut rig = Rig::new(
        DispenserConfig::default(),
        MockFs::with_file(SCHEDULE_FILE, UNKNOWN_TUBE_JSON.as_bytes()),
    );
    rig.hw.beam = true;
    rig.clock.wall = WallTime::new(8, 0).unwrap();
    rig.tick(10);

    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::DispenseSkipped { unknown, .. } if unknown.len() == 1
    )));
    assert!(!rig.sink.any(|e| matches!(e, AppEvent::Dispense(_))));
    assert!(!rig.app.is_dispensing());

    rig.run_until(5_000, |_| false);
    assert!(rig.app.notification_text().is_some(), "nothing was dispensed");
    assert!(!rig.sink.any(|e| matches!(
        e,
        AppEvent::NotificationDismissed { reason: DismissReason::Dispensed, .. }
    )));
    assert!(rig.hw.motor_starts().is_empty());
}

#[test]
fn button_without_notification_does_nothing() {
    let mut rig = Rig::provisioned(manual_config());
    rig.press_button();
    assert!(!rig.app.is_dispensing());
    assert!(!rig.sink.any(|e| matches!(e, AppEvent::Dispense(_))));
}

#[test]
fn notification_expires_after_window() {
    let mut rig = Rig::provisioned(manual_config());
    rig.clock.wall = WallTime::new(8, 0).unwrap();
    rig.tick(10);
    assert!(rig.app.notification_text().is_some());

    rig.tick(299_000);
    assert!(rig.app.notification_text().is_some());

    rig.tick(1_000);
    assert_eq!(rig.app.notification_text(), None);
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::NotificationDismissed { reason: DismissReason::TimedOut, .. }
    )));
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::DoseDue { .. })), 1);
}

#[test]
fn dismiss_command_clears_notification() {
    let mut rig = Rig::provisioned(manual_config());
    rig.clock.wall = WallTime::new(20, 0).unwrap();
    rig.tick(10);
    assert_eq!(
        rig.app.notification_text(),
        Some("TIME TO TAKE: Aspirin - 1 tab")
    );

    rig.app
        .handle_command(AppCommand::DismissNotification, &mut rig.sink);
    assert_eq!(rig.app.notification_text(), None);
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::NotificationDismissed { reason: DismissReason::Cleared, .. }
    )));
}

// ── Display ───────────────────────────────────────────────────

#[test]
fn clean_view_is_not_redrawn() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.tick(10);
    let drawn = rig.display.frames.len();
    assert!(drawn >= 1);

    // Same minute, nothing happening.
    rig.run_until(1_000, |_| false);
    assert_eq!(rig.display.frames.len(), drawn);

    rig.clock.wall = WallTime::new(7, 1).unwrap();
    rig.tick(10);
    assert_eq!(rig.display.frames.len(), drawn + 1);
}

#[test]
fn countdown_redraws_every_ten_seconds() {
    let mut rig = Rig::provisioned(manual_config());
    rig.clock.wall = WallTime::new(8, 0).unwrap();
    rig.tick(10);
    let drawn = rig.display.frames.len();

    rig.tick(5_000);
    assert_eq!(rig.display.frames.len(), drawn);
    rig.tick(5_000);
    assert_eq!(rig.display.frames.len(), drawn + 1);
}
