//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the persistence gateway, the ingestion session, the
//! live schedule, the dispensing engine, the provisioning wizard and the
//! actuation guard.  All I/O flows through port traits passed in at call
//! sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  TransportPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  SensorPort ─────▶ │          AppService          │ ──▶ DisplayPort
//!  ClockPort ──────▶ │ Ingest · Schedule · Dispense │
//! ActuatorPort ◀──── │ Wizard · Guard               │ ◀─▶ FileStore
//!                    └──────────────────────────────┘
//! ```
//!
//! One [`tick`](AppService::tick) runs, in order: minute bookkeeping, the
//! due-now check, notification timeout, the confirm button, received
//! serial bytes, frame timeouts, a pending schedule reload, the engine
//! step and the actuation guard.  Nothing in a tick waits longer than the
//! beam-confirm pause; every multi-second delay is a timestamp comparison.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::DispenserConfig;
use crate::dispense::{DispenseEngine, DispenseEvent, JobStart};
use crate::drivers::button::ConfirmButton;
use crate::error::{Error, Result};
use crate::fsm::StateId;
use crate::ingest::{ACK_BYTE, FrameOutcome, IngestionSession};
use crate::persistence::PersistenceGateway;
use crate::safety::ActuationGuard;
use crate::schedule::{SCHEDULE_MAX_BYTES, ScheduleStore, TimeKey, WallTime};
use crate::scheduler::{NotificationText, Scheduler, due_next, notification_text};
use crate::wizard::{ConfirmOutcome, ProvisioningWizard};

use super::commands::AppCommand;
use super::events::{AppEvent, DismissReason};
use super::ports::{
    ActuatorPort, ClockPort, ConfigError, DisplayPort, EventSink, FileStore, SensorPort,
    TransportPort,
};
use super::view::{DisplayView, NotificationView};

/// Serial bytes drained per tick.
const RX_CHUNK: usize = 64;

// ───────────────────────────────────────────────────────────────
// Internal state
// ───────────────────────────────────────────────────────────────

struct Notification {
    /// Index into the live store's groups.
    group: usize,
    time: TimeKey,
    text: NotificationText,
    raised_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingReload {
    due_ms: u64,
    attempt: u8,
    /// Triggered by a fresh upload: arms the wizard on success.
    fresh: bool,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService<S: FileStore> {
    config: DispenserConfig,
    gateway: PersistenceGateway<S>,
    session: IngestionSession,
    store: ScheduleStore,
    scheduler: Scheduler,
    engine: DispenseEngine,
    wizard: ProvisioningWizard,
    guard: ActuationGuard,
    button: ConfirmButton,

    storage_ok: bool,
    /// Tubes are provisioned for the live schedule.
    trusted: bool,
    notification: Option<Notification>,
    reload: Option<PendingReload>,

    now_ms: u64,
    wall: Option<WallTime>,
    last_countdown_ms: u64,
    dirty: bool,
}

impl<S: FileStore> AppService<S> {
    /// Construct the service.  The configuration is validated first.
    ///
    /// Does **not** touch hardware; call [`boot`](Self::boot) next.
    pub fn try_new(config: DispenserConfig, files: S) -> core::result::Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            gateway: PersistenceGateway::new(files, &config),
            session: IngestionSession::new(&config),
            store: ScheduleStore::new(),
            scheduler: Scheduler::new(),
            engine: DispenseEngine::new(config.clone()),
            wizard: ProvisioningWizard::new(),
            guard: ActuationGuard::new(config.servo_standby_deg),
            button: ConfirmButton::new(config.button_debounce_ms, config.button_cooldown_ms),
            storage_ok: false,
            trusted: false,
            notification: None,
            reload: None,
            now_ms: 0,
            wall: None,
            last_countdown_ms: 0,
            dirty: true,
            config,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Park every actuator and load the persisted schedule.
    ///
    /// A schedule found at boot was provisioned in an earlier session, so
    /// it is trusted straight away and the wizard stays unarmed.
    pub fn boot(
        &mut self,
        hw: &mut impl ActuatorPort,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        self.now_ms = clock.uptime_ms();
        self.wall = Some(clock.wall_time());
        self.engine.start(self.now_ms, hw);

        match self.read_schedule() {
            Ok(store) => {
                info!(
                    "Boot: {} entries in {} slots",
                    store.entries().len(),
                    store.groups().len()
                );
                self.store = store;
                self.storage_ok = true;
                self.trusted = true;
            }
            Err(e) => {
                warn!("Boot: no usable schedule ({})", e);
                self.storage_ok = false;
                self.trusted = false;
            }
        }

        self.dirty = true;
        sink.emit(&AppEvent::Booted {
            entries: self.store.entries().len(),
            storage_ok: self.storage_ok,
        });
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`]; this avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + ActuatorPort),
        link: &mut impl TransportPort,
        clock: &mut impl ClockPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) {
        self.now_ms = clock.uptime_ms();
        let wall = clock.wall_time();

        // 1. Minute rollover
        if self.wall != Some(wall) {
            self.wall = Some(wall);
            self.dirty = true;
        }

        // 2. Due-now
        if self.notification.is_none() {
            if let Some(idx) = self.scheduler.poll(&self.store, wall) {
                self.raise_notification(idx, sink);
                if self.may_run_unattended() {
                    self.start_dispense(idx, sink);
                }
            }
        }

        // 3. Notification lifetime
        self.expire_notification(sink);

        // 4. Confirm button
        if self.button.update(hw.confirm_pressed(), self.now_ms) {
            self.handle_command(AppCommand::Confirm, sink);
        }

        // 5. Serial link
        let mut rx = [0u8; RX_CHUNK];
        let n = link.read(&mut rx).min(RX_CHUNK);
        for &byte in &rx[..n] {
            let outcome = self
                .session
                .on_byte(byte, self.now_ms, &mut self.gateway, delay);
            if let Some(outcome) = outcome {
                self.handle_frame(outcome, link, sink);
            }
        }

        // 6. Frame timeouts
        if let Some(outcome) = self.session.poll_timeout(self.now_ms, &mut self.gateway) {
            self.handle_frame(outcome, link, sink);
        }

        // 7. Pending reload
        self.poll_reload(sink);

        // 8. Dispensing engine
        if let Some(event) = self.engine.tick(self.now_ms, hw, delay) {
            self.handle_dispense(event, sink);
        }

        // 9. Actuation guard
        let faults = self
            .guard
            .evaluate(self.engine.state(), self.engine.commands());
        if faults != 0 {
            self.engine.force_safe(hw);
            sink.emit(&AppEvent::SafetyTrip(faults));
            self.dirty = true;
        }
    }

    /// Render when something changed.  Skipped while a frame is being
    /// received.  Returns `true` when the display was drawn.
    pub fn render_if_dirty(
        &mut self,
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if self.session.is_receiving() {
            return false;
        }

        if self.wizard.activate_if_armed() {
            if let Some(step) = self.wizard.step(&self.store) {
                sink.emit(&AppEvent::WizardStarted { tubes: step.total });
            }
            self.dirty = true;
        }

        if !self.dirty {
            return false;
        }
        self.dirty = false;
        let view = self.view();
        display.render(&view);
        true
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (button, console, tests).
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) {
        match cmd {
            AppCommand::Confirm => {
                if self.wizard.is_active() {
                    match self.wizard.confirm() {
                        ConfirmOutcome::Advanced(step) => {
                            sink.emit(&AppEvent::WizardAdvanced { step });
                        }
                        ConfirmOutcome::Completed => {
                            self.trusted = true;
                            sink.emit(&AppEvent::WizardCompleted);
                        }
                        ConfirmOutcome::Ignored => {}
                    }
                    self.dirty = true;
                } else if let Some(n) = self.notification.as_ref() {
                    // Only the slot of the current minute is dispensed.
                    let current = self.wall.is_some_and(|w| w.key() == n.time);
                    if current {
                        let group = n.group;
                        self.start_dispense(group, sink);
                    } else {
                        info!("Confirm: slot {} has passed, not dispensing", n.time);
                    }
                }
            }
            AppCommand::DismissNotification => {
                self.dismiss_notification(DismissReason::Cleared, sink);
            }
            AppCommand::ReloadSchedule => {
                self.reload = Some(PendingReload {
                    due_ms: self.now_ms,
                    attempt: 1,
                    fresh: false,
                });
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Snapshot for the renderer.
    pub fn view(&self) -> DisplayView<'_> {
        let groups = self.store.groups();
        let now = self.wall.unwrap_or_default();
        let timeout_secs = self.config.notification_timeout_secs as u64;

        DisplayView {
            now,
            storage_ok: self.storage_ok,
            trusted: self.trusted,
            groups,
            due_next: due_next(groups, now),
            notification: self.notification.as_ref().map(|n| {
                let elapsed_secs = self.now_ms.saturating_sub(n.raised_ms) / 1000;
                NotificationView {
                    text: n.text.as_str(),
                    elapsed_secs,
                    remaining_secs: timeout_secs.saturating_sub(elapsed_secs),
                }
            }),
            wizard: self.wizard.step(&self.store),
            dispensing: self.engine.is_busy(),
        }
    }

    pub fn schedule(&self) -> &ScheduleStore {
        &self.store
    }

    pub fn storage_ok(&self) -> bool {
        self.storage_ok
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn is_receiving(&self) -> bool {
        self.session.is_receiving()
    }

    pub fn reload_pending(&self) -> bool {
        self.reload.is_some()
    }

    pub fn notification_text(&self) -> Option<&str> {
        self.notification.as_ref().map(|n| n.text.as_str())
    }

    pub fn wizard(&self) -> &ProvisioningWizard {
        &self.wizard
    }

    pub fn engine_state(&self) -> StateId {
        self.engine.state()
    }

    pub fn is_dispensing(&self) -> bool {
        self.engine.is_busy()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn config(&self) -> &DispenserConfig {
        &self.config
    }

    pub fn files(&self) -> &S {
        self.gateway.store()
    }

    /// Direct access to the file store (fault injection in tests).
    pub fn files_mut(&mut self) -> &mut S {
        self.gateway.store_mut()
    }

    // ── Internal: schedule ────────────────────────────────────

    fn read_schedule(&mut self) -> Result<ScheduleStore> {
        let mut buf = [0u8; SCHEDULE_MAX_BYTES];
        let name = self.config.schedule_file.clone();
        let n = self.gateway.read_all(&name, &mut buf)?;
        Ok(ScheduleStore::load(&buf[..n])?)
    }

    fn poll_reload(&mut self, sink: &mut impl EventSink) {
        let Some(pending) = self.reload else {
            return;
        };
        if self.now_ms < pending.due_ms {
            return;
        }

        match self.read_schedule() {
            Ok(store) => {
                info!(
                    "Reload: {} entries in {} slots (try {})",
                    store.entries().len(),
                    store.groups().len(),
                    pending.attempt
                );
                self.reload = None;
                self.install(store, pending.fresh, sink);
                sink.emit(&AppEvent::ScheduleLoaded {
                    entries: self.store.entries().len(),
                    groups: self.store.groups().len(),
                    attempt: pending.attempt,
                });
            }
            Err(Error::StorageBusy) => {
                // A new frame holds the card.  Wait for it without
                // spending an attempt.
                info!("Reload deferred: storage busy");
                self.reload = Some(PendingReload {
                    due_ms: self.now_ms + self.config.reload_settle_ms as u64,
                    ..pending
                });
            }
            Err(e) if pending.attempt < self.config.reload_attempts => {
                warn!("Reload failed (try {}): {}, retrying", pending.attempt, e);
                self.reload = Some(PendingReload {
                    due_ms: self.now_ms + self.config.reload_backoff_ms as u64,
                    attempt: pending.attempt + 1,
                    ..pending
                });
            }
            Err(e) => {
                warn!(
                    "Reload failed after {} tries: {}; keeping previous schedule",
                    pending.attempt, e
                );
                self.reload = None;
                self.storage_ok = false;
                self.dirty = true;
                sink.emit(&AppEvent::ScheduleLoadFailed(e));
            }
        }
    }

    /// Swap in a freshly parsed schedule.
    fn install(&mut self, store: ScheduleStore, fresh: bool, sink: &mut impl EventSink) {
        // Group indices of the old store are meaningless now.
        self.dismiss_notification(DismissReason::Cleared, sink);
        self.store = store;
        self.storage_ok = true;
        if fresh {
            self.trusted = false;
            self.wizard.arm(&self.store);
        }
        self.dirty = true;
    }

    // ── Internal: ingestion ───────────────────────────────────

    fn handle_frame(
        &mut self,
        outcome: FrameOutcome,
        link: &mut impl TransportPort,
        sink: &mut impl EventSink,
    ) {
        match outcome {
            FrameOutcome::Started => sink.emit(&AppEvent::FrameStarted),
            FrameOutcome::Rejected(e) => sink.emit(&AppEvent::FrameRejected(e)),
            FrameOutcome::Completed { bytes, result } => {
                link.write(&[ACK_BYTE]);
                let committed = result.is_ok();
                sink.emit(&AppEvent::FrameCompleted { bytes, committed });
                if committed {
                    self.reload = Some(PendingReload {
                        due_ms: self.now_ms + self.config.reload_settle_ms as u64,
                        attempt: 1,
                        fresh: true,
                    });
                } else {
                    self.storage_ok = false;
                }
                self.dirty = true;
            }
            FrameOutcome::Aborted(e) => {
                sink.emit(&AppEvent::FrameAborted(e));
                self.dirty = true;
            }
        }
    }

    // ── Internal: doses ───────────────────────────────────────

    fn may_run_unattended(&self) -> bool {
        self.config.auto_dispense
            && self.trusted
            && !self.wizard.is_active()
            && !self.wizard.is_armed()
    }

    fn raise_notification(&mut self, idx: usize, sink: &mut impl EventSink) {
        let Some(group) = self.store.groups().get(idx) else {
            return;
        };
        info!("Dose due at {}: {} meds", group.time, group.count());
        sink.emit(&AppEvent::DoseDue {
            time: group.time.clone(),
            meds: group.count(),
        });
        self.notification = Some(Notification {
            group: idx,
            time: group.time.clone(),
            text: notification_text(group),
            raised_ms: self.now_ms,
        });
        self.last_countdown_ms = self.now_ms;
        self.dirty = true;
    }

    fn expire_notification(&mut self, sink: &mut impl EventSink) {
        let Some(n) = self.notification.as_ref() else {
            return;
        };
        let elapsed = self.now_ms.saturating_sub(n.raised_ms);
        if elapsed >= self.config.notification_timeout_secs as u64 * 1000 {
            // A running job keeps its notification until it finishes.
            if !self.engine.is_busy() {
                self.dismiss_notification(DismissReason::TimedOut, sink);
            }
            return;
        }
        if self.now_ms.saturating_sub(self.last_countdown_ms)
            >= self.config.countdown_refresh_secs as u64 * 1000
        {
            self.last_countdown_ms = self.now_ms;
            self.dirty = true;
        }
    }

    fn dismiss_notification(&mut self, reason: DismissReason, sink: &mut impl EventSink) {
        if let Some(n) = self.notification.take() {
            info!("Notification {} dismissed ({:?})", n.time, reason);
            sink.emit(&AppEvent::NotificationDismissed {
                time: n.time,
                reason,
            });
            self.dirty = true;
        }
    }

    fn start_dispense(&mut self, idx: usize, sink: &mut impl EventSink) {
        let Some(group) = self.store.groups().get(idx) else {
            return;
        };
        match self.engine.start_job(group, self.now_ms) {
            JobStart::Accepted(event) => sink.emit(&AppEvent::Dispense(event)),
            JobStart::Busy => sink.emit(&AppEvent::DispenseRefused(group.time.clone())),
            JobStart::NoKnownTube(unknown) => sink.emit(&AppEvent::DispenseSkipped {
                time: group.time.clone(),
                unknown,
            }),
        }
        self.dirty = true;
    }

    fn handle_dispense(&mut self, event: DispenseEvent, sink: &mut impl EventSink) {
        let finished = match &event {
            DispenseEvent::JobDone(time) => Some(time.clone()),
            _ => None,
        };
        sink.emit(&AppEvent::Dispense(event));
        if let Some(time) = finished {
            if self.notification.as_ref().is_some_and(|n| n.time == time) {
                self.dismiss_notification(DismissReason::Dispensed, sink);
            }
        }
        self.dirty = true;
    }
}
