//! Provisioning wizard flow: a fresh upload arms the wizard, the first
//! render starts it, and the confirm button walks the distinct tubes
//! before unattended dispensing is allowed again.

use meddispenser::app::commands::AppCommand;
use meddispenser::app::events::AppEvent;
use meddispenser::config::DispenserConfig;
use meddispenser::dispense::DispenseEvent;
use meddispenser::schedule::WallTime;

use crate::mock_hw::{MockFs, Rig, SCHEDULE_JSON};

fn uploaded_rig(config: DispenserConfig) -> Rig {
    let mut rig = Rig::new(config, MockFs::new());
    rig.upload(SCHEDULE_JSON.as_bytes());
    assert!(rig.run_until(3_000, |r| r.app.wizard().is_active()));
    rig
}

#[test]
fn upload_starts_wizard_on_next_render() {
    let rig = uploaded_rig(DispenserConfig::default());

    assert!(rig.sink.any(|e| matches!(e, AppEvent::WizardStarted { tubes: 2 })));
    assert!(!rig.app.wizard().is_armed(), "arming is consumed");
    assert!(rig.app.wizard().confirm_pending());

    let frame = rig.display.frames.last().unwrap();
    assert_eq!(frame.wizard_step, Some((0, 2)));
    assert!(!frame.trusted);
}

#[test]
fn wizard_step_lists_tube_contents() {
    let rig = uploaded_rig(DispenserConfig::default());
    let view = rig.app.view();
    let step = view.wizard.as_ref().unwrap();

    assert_eq!(step.tube.as_str(), "tube1");
    assert_eq!(step.medications.len(), 2, "Aspirin at 08:00 and 20:00");
    assert_eq!(step.total_grams, 20);
    assert!(!step.more);
}

#[test]
fn confirm_walks_tubes_then_trusts() {
    let mut rig = uploaded_rig(DispenserConfig::default());

    rig.press_button();
    assert!(rig.sink.any(|e| matches!(e, AppEvent::WizardAdvanced { step: 1 })));
    assert_eq!(rig.display.frames.last().unwrap().wizard_step, Some((1, 2)));
    assert!(!rig.app.is_trusted());

    rig.press_button();
    assert!(rig.sink.any(|e| matches!(e, AppEvent::WizardCompleted)));
    assert!(!rig.app.wizard().is_active());
    assert!(rig.app.is_trusted());
    assert_eq!(rig.display.frames.last().unwrap().wizard_step, None);
}

#[test]
fn due_slot_is_not_dispensed_during_provisioning() {
    let mut rig = uploaded_rig(DispenserConfig::default());
    rig.hw.beam = true;
    rig.clock.wall = WallTime::new(8, 0).unwrap();
    rig.tick(10);

    assert!(rig.sink.any(|e| matches!(e, AppEvent::DoseDue { .. })));
    assert!(!rig.app.is_dispensing());

    // The button belongs to the wizard while it runs.
    rig.press_button();
    assert!(rig.sink.any(|e| matches!(e, AppEvent::WizardAdvanced { step: 1 })));
    assert!(!rig.sink.any(|e| matches!(e, AppEvent::Dispense(_))));
}

#[test]
fn after_provisioning_next_slot_runs_unattended() {
    let mut rig = uploaded_rig(DispenserConfig::default());
    rig.app.handle_command(AppCommand::Confirm, &mut rig.sink);
    rig.app.handle_command(AppCommand::Confirm, &mut rig.sink);
    assert!(rig.app.is_trusted());

    rig.hw.beam = true;
    rig.clock.wall = WallTime::new(20, 0).unwrap();
    rig.tick(10);
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::Dispense(DispenseEvent::JobStarted { tubes: 1, .. })
    )));
}

#[test]
fn second_upload_restarts_wizard_from_first_tube() {
    let mut rig = uploaded_rig(DispenserConfig::default());
    rig.press_button();
    assert_eq!(rig.display.frames.last().unwrap().wizard_step, Some((1, 2)));

    rig.upload(SCHEDULE_JSON.as_bytes());
    assert!(rig.run_until(3_000, |r| {
        r.sink.count(|e| matches!(e, AppEvent::WizardStarted { .. })) == 2
    }));
    assert_eq!(rig.display.frames.last().unwrap().wizard_step, Some((0, 2)));
    assert!(!rig.app.is_trusted());
}

#[test]
fn boot_schedule_never_starts_wizard() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.run_until(1_000, |_| false);
    assert!(!rig.app.wizard().is_active());
    assert!(!rig.sink.any(|e| matches!(e, AppEvent::WizardStarted { .. })));
}
