//! MedDispenser Firmware: Main Entry Point
//!
//! Hexagonal architecture with a fixed-rate cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   SdCardStore   SerialLink   SystemClock      │
//! │  (Sensor+Actuator) (FileStore)   (Transport)  (Clock+Delay)    │
//! │  LogEventSink      LogDisplay                                  │
//! │  (EventSink)       (DisplayPort)                               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Ingest · Persistence · Schedule · Dispense FSM ·      │    │
//! │  │  Wizard · Safety guard                                 │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use log::{error, info};

use meddispenser::adapters::hardware::HardwareAdapter;
use meddispenser::adapters::log_display::LogDisplay;
use meddispenser::adapters::log_sink::LogEventSink;
use meddispenser::adapters::sdcard;
use meddispenser::adapters::serial::SerialLink;
use meddispenser::adapters::time::{SystemClock, SystemDelay};
use meddispenser::app::service::AppService;
use meddispenser::config::DispenserConfig;
use meddispenser::drivers::hw_init;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  MedDispenser v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Without actuators and inputs the device must not run.
        error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // ── 3. Storage ────────────────────────────────────────────
    // A missing card is not fatal: the schedule can still arrive over the
    // link, it just cannot be persisted.  The service reports storage ERR.
    let files = match sdcard::mount() {
        Ok(store) => store,
        Err(e) => {
            error!("SD mount failed: {}", e);
            sdcard::SdCardStore::new(meddispenser::pins::SD_MOUNT_POINT)
        }
    };

    // ── 4. Adapters + service ─────────────────────────────────
    let config = DispenserConfig::default();
    let interval = std::time::Duration::from_millis(config.control_loop_interval_ms as u64);

    let mut hw = HardwareAdapter::new(config.servo_standby_deg);
    let mut link = SerialLink::new();
    let mut clock = SystemClock::new();
    let mut delay = SystemDelay;
    let mut sink = LogEventSink::new();
    let mut display = LogDisplay::new();

    let mut app = AppService::try_new(config, files)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("invalid dispenser configuration")?;
    app.boot(&mut hw, &mut clock, &mut sink);

    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        app.tick(&mut hw, &mut link, &mut clock, &mut delay, &mut sink);
        app.render_if_dirty(&mut display, &mut sink);
        std::thread::sleep(interval);
    }
}
