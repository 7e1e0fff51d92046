//! Mock adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO/PWM registers, and provides an
//! in-memory file store with fault injection, a loopback serial link, a
//! hand-driven clock and recording sink/display.

use std::collections::{HashMap, VecDeque};

use embedded_hal::delay::DelayNs;
use meddispenser::app::events::AppEvent;
use meddispenser::app::ports::{
    ActuatorPort, ClockPort, DisplayPort, EventSink, FileStore, SensorPort, StorageError,
    TransportPort,
};
use meddispenser::app::service::AppService;
use meddispenser::app::view::DisplayView;
use meddispenser::config::DispenserConfig;
use meddispenser::schedule::WallTime;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    SetValve { actuator: usize, angle: u8 },
    SetMotor { actuator: usize, on: bool },
    AllOff,
}

// ── MockHardware ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
    /// Level returned by `beam_interrupted`.
    pub beam: bool,
    /// Level returned by `confirm_pressed`.
    pub button: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn motor_on(&self, actuator: usize) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match *c {
                ActuatorCall::SetMotor { actuator: a, on } if a == actuator => Some(on),
                ActuatorCall::AllOff => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn motor_starts(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                ActuatorCall::SetMotor { actuator, on: true } => Some(actuator),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl ActuatorPort for MockHardware {
    fn set_valve(&mut self, actuator: usize, angle: u8) {
        self.calls.push(ActuatorCall::SetValve { actuator, angle });
    }

    fn set_motor(&mut self, actuator: usize, on: bool) {
        self.calls.push(ActuatorCall::SetMotor { actuator, on });
    }

    fn all_off(&mut self) {
        self.calls.push(ActuatorCall::AllOff);
    }
}

impl SensorPort for MockHardware {
    fn beam_interrupted(&mut self) -> bool {
        self.beam
    }

    fn confirm_pressed(&mut self) -> bool {
        self.button
    }
}

// ── MockFs ────────────────────────────────────────────────────

/// In-memory [`FileStore`] with switches for the failure paths.
#[derive(Default)]
pub struct MockFs {
    pub files: HashMap<String, Vec<u8>>,
    pub open: Option<String>,
    pub fail_create: bool,
    pub fail_append: bool,
    pub fail_sync: bool,
    pub fail_rename: bool,
    /// The next N `read_at` calls fail with `IoError`.
    pub read_failures: u32,
    /// The next N `remove` calls fail with `IoError`.
    pub remove_failures: u32,
}

#[allow(dead_code)]
impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(name: &str, data: &[u8]) -> Self {
        let mut fs = Self::default();
        fs.files.insert(name.to_string(), data.to_vec());
        fs
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }
}

impl FileStore for MockFs {
    fn exists(&mut self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        if self.remove_failures > 0 {
            self.remove_failures -= 1;
            return Err(StorageError::IoError);
        }
        self.files.remove(name).map(|_| ()).ok_or(StorageError::NotFound)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
        if self.fail_rename || self.files.contains_key(to) {
            return Err(StorageError::IoError);
        }
        let data = self.files.remove(from).ok_or(StorageError::NotFound)?;
        self.files.insert(to.to_string(), data);
        Ok(())
    }

    fn create(&mut self, name: &str) -> Result<(), StorageError> {
        if self.fail_create {
            return Err(StorageError::IoError);
        }
        self.files.insert(name.to_string(), Vec::new());
        self.open = Some(name.to_string());
        Ok(())
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_append {
            return Err(StorageError::Full);
        }
        self.files
            .get_mut(name)
            .ok_or(StorageError::NotFound)?
            .extend_from_slice(data);
        Ok(())
    }

    fn sync(&mut self, _name: &str) -> Result<(), StorageError> {
        if self.fail_sync {
            return Err(StorageError::IoError);
        }
        Ok(())
    }

    fn close(&mut self, _name: &str) -> Result<(), StorageError> {
        self.open = None;
        Ok(())
    }

    fn read_at(&mut self, name: &str, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError> {
        if self.read_failures > 0 {
            self.read_failures -= 1;
            return Err(StorageError::IoError);
        }
        let data = self.files.get(name).ok_or(StorageError::NotFound)?;
        let rest = data.get(offset..).unwrap_or(&[]);
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        Ok(n)
    }
}

// ── MockSerial ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSerial {
    pub inbound: VecDeque<u8>,
    pub written: Vec<u8>,
}

impl MockSerial {
    pub fn inject(&mut self, data: &[u8]) {
        self.inbound.extend(data);
    }
}

impl TransportPort for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write(&mut self, data: &[u8]) {
        self.written.extend_from_slice(data);
    }
}

// ── MockClock ─────────────────────────────────────────────────

pub struct MockClock {
    pub wall: WallTime,
    pub ms: u64,
}

impl MockClock {
    pub fn at(hour: u8, minute: u8) -> Self {
        Self {
            wall: WallTime::new(hour, minute).unwrap(),
            ms: 0,
        }
    }
}

impl ClockPort for MockClock {
    fn wall_time(&mut self) -> WallTime {
        self.wall
    }

    fn uptime_ms(&mut self) -> u64 {
        self.ms
    }
}

// ── NoopDelay ─────────────────────────────────────────────────

pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|&e| pred(e)).count()
    }

    pub fn any(&self, pred: impl Fn(&AppEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── RecordingDisplay ──────────────────────────────────────────

/// Owned summary of one rendered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub storage_ok: bool,
    pub trusted: bool,
    pub groups: usize,
    pub notification: Option<String>,
    pub wizard_step: Option<(usize, usize)>,
    pub dispensing: bool,
}

#[derive(Default)]
pub struct RecordingDisplay {
    pub frames: Vec<Frame>,
}

impl DisplayPort for RecordingDisplay {
    fn render(&mut self, view: &DisplayView<'_>) {
        self.frames.push(Frame {
            storage_ok: view.storage_ok,
            trusted: view.trusted,
            groups: view.groups.len(),
            notification: view.notification.map(|n| n.text.to_string()),
            wizard_step: view.wizard.as_ref().map(|s| (s.index, s.total)),
            dispensing: view.dispensing,
        });
    }
}

// ── Rig: service + every mock ─────────────────────────────────

pub const SCHEDULE_FILE: &str = "data.json";
pub const TEMP_FILE: &str = "data.tmp";

/// Two tubes, three doses: 08:00 has two members, 20:00 one.
pub const SCHEDULE_JSON: &str = r#"[
  {"tube":"tube1","type":"Aspirin","amount":10,
   "time_to_take":[{"time":"08:00","dosage":"1 tab"},{"time":"20:00","dosage":"1 tab"}]},
  {"tube":"tube2","type":"Zinc","amount":5,
   "time_to_take":[{"time":"08:00","dosage":"2 caps"}]}
]"#;

pub struct Rig {
    pub app: AppService<MockFs>,
    pub hw: MockHardware,
    pub link: MockSerial,
    pub clock: MockClock,
    pub sink: RecordingSink,
    pub display: RecordingDisplay,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: DispenserConfig, files: MockFs) -> Self {
        let mut rig = Self {
            app: AppService::try_new(config, files).unwrap(),
            hw: MockHardware::new(),
            link: MockSerial::default(),
            clock: MockClock::at(7, 0),
            sink: RecordingSink::default(),
            display: RecordingDisplay::default(),
        };
        rig.app.boot(&mut rig.hw, &mut rig.clock, &mut rig.sink);
        rig
    }

    /// Booted with [`SCHEDULE_JSON`] already on the card.
    pub fn provisioned(config: DispenserConfig) -> Self {
        Self::new(config, MockFs::with_file(SCHEDULE_FILE, SCHEDULE_JSON.as_bytes()))
    }

    /// One control cycle `step_ms` after the previous one, then a render.
    pub fn tick(&mut self, step_ms: u64) {
        self.clock.ms += step_ms;
        self.app.tick(
            &mut self.hw,
            &mut self.link,
            &mut self.clock,
            &mut NoopDelay,
            &mut self.sink,
        );
        self.app.render_if_dirty(&mut self.display, &mut self.sink);
    }

    /// Tick at the control interval until `pred` holds or `max_ms` passes.
    pub fn run_until(&mut self, max_ms: u64, pred: impl Fn(&Self) -> bool) -> bool {
        let step = self.app.config().control_loop_interval_ms as u64;
        let mut elapsed = 0;
        while elapsed < max_ms {
            self.tick(step);
            elapsed += step;
            if pred(self) {
                return true;
            }
        }
        false
    }

    /// Hold the button down across enough ticks to pass the debounce.
    pub fn press_button(&mut self) {
        self.hw.button = true;
        let hold = self.app.config().button_debounce_ms as u64 + 20;
        let step = self.app.config().control_loop_interval_ms as u64;
        let mut t = 0;
        while t <= hold {
            self.tick(step);
            t += step;
        }
        self.hw.button = false;
        self.tick(step);
    }

    /// Send a complete framed upload and tick until the link is drained.
    pub fn upload(&mut self, payload: &[u8]) {
        self.link.inject(b"#START#");
        self.link.inject(payload);
        self.link.inject(b"#END#");
        while !self.link.inbound.is_empty() {
            self.tick(10);
        }
    }
}
