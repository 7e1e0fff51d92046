//! End-to-end schedule upload: serial framing → temp file → atomic
//! replace → acknowledgement → delayed reload.

use meddispenser::app::commands::AppCommand;
use meddispenser::app::events::AppEvent;
use meddispenser::config::DispenserConfig;
use meddispenser::error::{Error, FramingError};
use meddispenser::schedule::SCHEDULE_MAX_BYTES;

use crate::mock_hw::{MockFs, Rig, SCHEDULE_FILE, SCHEDULE_JSON, TEMP_FILE};

const SINGLE_SLOT_JSON: &str =
    r#"[{"tube":"tube3","type":"Iron","amount":7,"time_to_take":[{"time":"12:30","dosage":"1"}]}]"#;

fn loaded(rig: &Rig) -> bool {
    rig.sink.any(|e| matches!(e, AppEvent::ScheduleLoaded { .. }))
}

#[test]
fn upload_is_acked_persisted_and_loaded() {
    let mut rig = Rig::new(DispenserConfig::default(), MockFs::new());
    rig.link.inject(b"garbage before the frame ");
    rig.upload(SCHEDULE_JSON.as_bytes());

    assert_eq!(rig.link.written, b"A", "exactly one ACK");
    assert_eq!(
        rig.app.files().file(SCHEDULE_FILE),
        Some(SCHEDULE_JSON.as_bytes())
    );
    assert!(rig.app.files().file(TEMP_FILE).is_none());
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::FrameCompleted { committed: true, bytes } if *bytes == SCHEDULE_JSON.len()
    )));

    // The reload waits for the settle time.
    assert!(rig.app.reload_pending());
    assert!(rig.app.schedule().is_empty());
    assert!(rig.run_until(3_000, loaded));

    assert_eq!(rig.app.schedule().entries().len(), 3);
    assert!(rig.app.storage_ok());
    assert!(!rig.app.is_trusted(), "fresh upload needs provisioning");
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::ScheduleLoaded { entries: 3, groups: 2, attempt: 1 }
    )));
}

#[test]
fn upload_replaces_previous_schedule() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.upload(SINGLE_SLOT_JSON.as_bytes());
    assert!(rig.run_until(3_000, loaded));

    assert_eq!(rig.app.schedule().entries().len(), 1);
    assert_eq!(rig.app.schedule().groups()[0].time.as_str(), "12:30");
    assert_eq!(
        rig.app.files().file(SCHEDULE_FILE),
        Some(SINGLE_SLOT_JSON.as_bytes())
    );
}

#[test]
fn marker_split_across_reads_is_found() {
    let mut rig = Rig::new(DispenserConfig::default(), MockFs::new());
    rig.link.inject(b"#STA");
    rig.tick(10);
    assert!(!rig.app.is_receiving());
    rig.link.inject(b"RT#");
    rig.tick(10);
    assert!(rig.app.is_receiving());

    rig.link.inject(SINGLE_SLOT_JSON.as_bytes());
    rig.link.inject(b"#EN");
    while !rig.link.inbound.is_empty() {
        rig.tick(10);
    }
    assert!(rig.app.is_receiving());
    rig.link.inject(b"D#");
    rig.tick(10);
    assert!(!rig.app.is_receiving());
    assert_eq!(
        rig.app.files().file(SCHEDULE_FILE),
        Some(SINGLE_SLOT_JSON.as_bytes())
    );
}

#[test]
fn idle_timeout_discards_partial_frame() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.link.inject(b"#START#[{\"tube\":");
    rig.tick(10);
    assert!(rig.app.is_receiving());

    rig.tick(5_000);
    assert!(rig.app.is_receiving(), "exactly the idle window is tolerated");
    rig.tick(10);
    assert!(!rig.app.is_receiving());

    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::FrameAborted(Error::Framing(FramingError::IdleTimeout))
    )));
    assert!(rig.link.written.is_empty(), "no ACK for an aborted frame");
    assert!(rig.app.files().file(TEMP_FILE).is_none());
    assert_eq!(
        rig.app.files().file(SCHEDULE_FILE),
        Some(SCHEDULE_JSON.as_bytes()),
        "previous schedule untouched"
    );
    assert_eq!(rig.app.schedule().entries().len(), 3);
}

#[test]
fn slow_sender_hits_session_timeout() {
    let mut rig = Rig::new(DispenserConfig::default(), MockFs::new());
    rig.link.inject(b"#START#");
    rig.tick(10);

    // A byte every 4 s keeps the idle timer happy but not the session.
    for _ in 0..6 {
        rig.link.inject(b" ");
        rig.tick(4_000);
    }
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::FrameAborted(Error::Framing(FramingError::SessionTimeout))
    )));
    assert!(!rig.app.is_receiving());
}

#[test]
fn failed_commit_is_still_acked_but_flags_storage() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.app.files_mut().fail_sync = true;
    rig.upload(SINGLE_SLOT_JSON.as_bytes());

    assert_eq!(rig.link.written, b"A");
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::FrameCompleted { committed: false, .. }
    )));
    assert!(!rig.app.storage_ok());
    assert!(!rig.app.reload_pending(), "no reload after a failed commit");
    assert_eq!(
        rig.app.files().file(SCHEDULE_FILE),
        Some(SCHEDULE_JSON.as_bytes())
    );
    assert!(rig.app.files().file(TEMP_FILE).is_none());
}

#[test]
fn rename_failure_falls_back_to_copy() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.app.files_mut().fail_rename = true;
    rig.upload(SINGLE_SLOT_JSON.as_bytes());

    assert_eq!(
        rig.app.files().file(SCHEDULE_FILE),
        Some(SINGLE_SLOT_JSON.as_bytes())
    );
    assert!(rig.app.files().file(TEMP_FILE).is_none());
    assert!(rig.run_until(3_000, loaded));
    assert_eq!(rig.app.schedule().entries().len(), 1);
}

#[test]
fn start_rejected_when_temp_cannot_be_created() {
    let mut rig = Rig::new(DispenserConfig::default(), MockFs::new());
    rig.app.files_mut().fail_create = true;
    rig.link.inject(b"#START#[]#END#");
    rig.tick(10);

    assert!(rig.sink.any(|e| matches!(e, AppEvent::FrameRejected(_))));
    assert!(!rig.app.is_receiving());
    assert!(rig.link.written.is_empty());
}

#[test]
fn append_failure_aborts_frame() {
    let mut rig = Rig::new(DispenserConfig::default(), MockFs::new());
    rig.app.files_mut().fail_append = true;
    rig.link.inject(b"#START#");
    rig.link.inject(&[b'x'; 100]);
    rig.tick(10);
    rig.tick(10);

    assert!(rig.sink.any(|e| matches!(e, AppEvent::FrameAborted(Error::Storage(_)))));
    assert!(!rig.app.is_receiving());
}

// ── Reload ────────────────────────────────────────────────────

#[test]
fn reload_retries_then_succeeds() {
    let mut rig = Rig::new(DispenserConfig::default(), MockFs::new());
    rig.upload(SCHEDULE_JSON.as_bytes());
    rig.app.files_mut().read_failures = 2;

    assert!(rig.run_until(5_000, loaded));
    assert!(rig.sink.any(|e| matches!(e, AppEvent::ScheduleLoaded { attempt: 3, .. })));
    assert!(rig.app.storage_ok());
}

#[test]
fn exhausted_reload_keeps_previous_schedule() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.upload(SINGLE_SLOT_JSON.as_bytes());
    rig.app.files_mut().read_failures = 3;

    assert!(rig.run_until(5_000, |r| {
        r.sink.any(|e| matches!(e, AppEvent::ScheduleLoadFailed(_)))
    }));
    assert!(!rig.app.storage_ok());
    assert!(!rig.app.reload_pending());
    assert_eq!(rig.app.schedule().entries().len(), 3, "old schedule stays live");
    assert!(!loaded(&rig));
}

#[test]
fn reload_waits_out_a_frame_opened_during_settle() {
    let mut rig = Rig::new(DispenserConfig::default(), MockFs::new());
    rig.upload(SCHEDULE_JSON.as_bytes());
    rig.link.inject(b"#START#[");
    rig.tick(10);
    assert!(rig.app.is_receiving());

    // Past the settle time and every retry the frame still holds storage.
    rig.run_until(4_500, |_| false);
    assert!(rig.app.is_receiving());
    assert!(rig.app.reload_pending());
    assert!(rig.app.storage_ok());
    assert!(!rig.sink.any(|e| matches!(e, AppEvent::ScheduleLoadFailed(_))));

    // The frame idles out, then the deferred reload lands first try.
    assert!(rig.run_until(5_000, loaded));
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::FrameAborted(Error::Framing(FramingError::IdleTimeout))
    )));
    assert!(rig.sink.any(|e| matches!(e, AppEvent::ScheduleLoaded { attempt: 1, .. })));
    assert!(rig.app.storage_ok());
    assert_eq!(rig.app.schedule().entries().len(), 3);
}

#[test]
fn oversize_upload_is_refused_without_ack() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    let payload = vec![b'x'; SCHEDULE_MAX_BYTES + 1_000];
    rig.upload(&payload);

    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::FrameAborted(Error::Framing(FramingError::Oversize))
    )));
    assert!(rig.link.written.is_empty(), "no ACK for an oversize frame");
    assert!(!rig.app.is_receiving());
    assert!(!rig.app.reload_pending());
    assert!(rig.app.files().file(TEMP_FILE).is_none());
    assert_eq!(
        rig.app.files().file(SCHEDULE_FILE),
        Some(SCHEDULE_JSON.as_bytes())
    );
    assert!(rig.app.storage_ok());
}

#[test]
fn unparseable_upload_is_committed_but_not_installed() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.upload(b"this is not json");

    assert_eq!(rig.link.written, b"A");
    assert!(rig.run_until(5_000, |r| {
        r.sink.any(|e| matches!(e, AppEvent::ScheduleLoadFailed(Error::Parse(_))))
    }));
    assert_eq!(rig.app.schedule().entries().len(), 3);
    assert!(!rig.app.storage_ok());
}

#[test]
fn reload_command_rereads_without_arming_wizard() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.app
        .files_mut()
        .files
        .insert(SCHEDULE_FILE.to_string(), SINGLE_SLOT_JSON.as_bytes().to_vec());

    rig.app.handle_command(AppCommand::ReloadSchedule, &mut rig.sink);
    rig.tick(10);

    assert!(loaded(&rig));
    assert_eq!(rig.app.schedule().entries().len(), 1);
    assert!(rig.app.is_trusted());
    assert!(!rig.app.wizard().is_armed());
}

#[test]
fn display_is_not_drawn_mid_frame() {
    let mut rig = Rig::provisioned(DispenserConfig::default());
    rig.tick(10);
    let drawn = rig.display.frames.len();

    rig.link.inject(b"#START#[");
    rig.tick(10);
    rig.clock.wall = meddispenser::schedule::WallTime::new(7, 1).unwrap();
    rig.link.inject(b"1");
    rig.tick(10);
    assert!(rig.app.is_dirty());
    assert_eq!(rig.display.frames.len(), drawn);

    rig.link.inject(b"]#END#");
    rig.tick(10);
    assert!(rig.display.frames.len() > drawn);
}
