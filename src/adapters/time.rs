//! Time adapters.
//!
//! [`SystemClock`] implements [`ClockPort`]; [`SystemDelay`] implements
//! `embedded_hal::delay::DelayNs` for the bounded waits of the commit
//! protocol and the beam re-check.
//!
//! - **`target_os = "espidf"`**: monotonic time from `esp_timer_get_time()`,
//!   time of day from the system clock (kept by the board RTC).
//! - **`not(target_os = "espidf")`**: `std::time::Instant` plus a settable
//!   wall-clock origin for host-side simulation.

use embedded_hal::delay::DelayNs;

use crate::app::ports::ClockPort;
use crate::schedule::WallTime;
use crate::schedule::time::MINUTES_PER_DAY;

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    /// Time of day at `start`.
    #[cfg(not(target_os = "espidf"))]
    origin: WallTime,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            origin: WallTime::default(),
        }
    }

    /// Pin the simulated time of day to `now`.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_wall_time(&mut self, now: WallTime) {
        self.start = std::time::Instant::now();
        self.origin = now;
    }
}

/// Minutes-of-day wrapped onto a [`WallTime`].
fn wall_from_minutes(minutes: u64) -> WallTime {
    let m = (minutes % MINUTES_PER_DAY as u64) as u16;
    WallTime::new((m / 60) as u8, (m % 60) as u8).unwrap_or_default()
}

#[cfg(target_os = "espidf")]
impl ClockPort for SystemClock {
    fn wall_time(&mut self) -> WallTime {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: gettimeofday writes into the local `tv` only.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return WallTime::default();
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        // SAFETY: `tm` is plain data; localtime_r fills it or returns null.
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return WallTime::default();
        }
        WallTime::new(tm.tm_hour as u8, tm.tm_min as u8).unwrap_or_default()
    }

    fn uptime_ms(&mut self) -> u64 {
        // SAFETY: esp_timer_get_time is a monotonic counter read.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }
}

#[cfg(not(target_os = "espidf"))]
impl ClockPort for SystemClock {
    fn wall_time(&mut self) -> WallTime {
        let elapsed_min = self.start.elapsed().as_secs() / 60;
        wall_from_minutes(self.origin.minutes_since_midnight() as u64 + elapsed_min)
    }

    fn uptime_ms(&mut self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Blocking delay for the short bounded waits inside one tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDelay;

#[cfg(target_os = "espidf")]
impl DelayNs for SystemDelay {
    fn delay_ns(&mut self, ns: u32) {
        // Sub-tick waits busy-spin on the ROM delay; longer ones yield.
        let us = ns.div_ceil(1_000);
        if us < 10_000 {
            esp_idf_svc::hal::delay::Ets::delay_us(us);
        } else {
            esp_idf_svc::hal::delay::FreeRtos::delay_ms(us / 1_000);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl DelayNs for SystemDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(ns as u64));
    }
}
