//! Dispenser configuration parameters
//!
//! All tunable timings and limits for the dispenser.  Defaults match the
//! production board; tests shrink individual fields where convenient.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::schedule::bounded;

/// Capacity of a storage file name.
pub const FILE_NAME_LEN: usize = 16;

pub type FileName = heapless::String<FILE_NAME_LEN>;

/// Core dispenser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenserConfig {
    // --- Serial framing ---
    /// Abort a frame when no byte arrives for this long (milliseconds)
    pub frame_idle_timeout_ms: u32,
    /// Abort a frame that has been open for this long (milliseconds)
    pub frame_session_timeout_ms: u32,

    // --- Reload after commit ---
    /// Settle time between commit and the first reload attempt (milliseconds)
    pub reload_settle_ms: u32,
    /// Reload attempts before the schedule is marked failed
    pub reload_attempts: u8,
    /// Delay between reload attempts (milliseconds)
    pub reload_backoff_ms: u32,

    // --- Storage ---
    /// Final schedule file name
    pub schedule_file: FileName,
    /// Temporary file used while a frame is streamed in
    pub temp_file: FileName,
    /// Pause after closing the temporary file, before the swap (milliseconds)
    pub commit_settle_ms: u32,
    /// Attempts to remove the previous final file before renaming
    pub commit_remove_attempts: u8,
    /// Delay before each removal attempt (milliseconds)
    pub commit_retry_delay_ms: u32,
    /// Chunk size for the copy fallback (bytes)
    pub copy_chunk_bytes: u16,

    // --- Valve servo (degrees) ---
    pub servo_standby_deg: u8,
    pub servo_open_deg: u8,
    pub servo_close_deg: u8,
    /// Hold time at open/close before returning to standby (milliseconds)
    pub valve_settle_ms: u32,

    // --- Feed motor / beam sensor ---
    /// Motor run time before the beam is sampled (milliseconds)
    pub stabilize_ms: u32,
    /// Give up on detection this long after the motor started (milliseconds)
    pub sensing_timeout_ms: u32,
    /// Pause between the two confirming beam reads (microseconds)
    pub beam_confirm_pause_us: u32,
    /// Gap between consecutive tubes of one job (milliseconds)
    pub inter_tube_delay_ms: u32,

    // --- Confirm button ---
    pub button_debounce_ms: u32,
    /// Ignore the button for this long after it triggered an action
    pub button_cooldown_ms: u32,

    // --- Notification ---
    /// Auto-dismiss a dose notification after this many seconds
    pub notification_timeout_secs: u32,
    /// Redraw interval for the notification countdown (seconds)
    pub countdown_refresh_secs: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,

    /// Start due jobs without a button press once the tubes are provisioned
    pub auto_dispense: bool,
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            // Framing
            frame_idle_timeout_ms: 5_000,
            frame_session_timeout_ms: 20_000,

            // Reload
            reload_settle_ms: 2_000,
            reload_attempts: 3,
            reload_backoff_ms: 500,

            // Storage
            schedule_file: bounded("data.json"),
            temp_file: bounded("data.tmp"),
            commit_settle_ms: 50,
            commit_remove_attempts: 6,
            commit_retry_delay_ms: 40,
            copy_chunk_bytes: 32,

            // Valve
            servo_standby_deg: 91,
            servo_open_deg: 55,
            servo_close_deg: 125,
            valve_settle_ms: 600,

            // Motor / sensor
            stabilize_ms: 500,
            sensing_timeout_ms: 30_000,
            beam_confirm_pause_us: 50,
            inter_tube_delay_ms: 2_000,

            // Button
            button_debounce_ms: 50,
            button_cooldown_ms: 500,

            // Notification
            notification_timeout_secs: 300,
            countdown_refresh_secs: 10,

            // Timing
            control_loop_interval_ms: 10, // 100 Hz

            auto_dispense: true,
        }
    }
}

impl DispenserConfig {
    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_idle_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("frame_idle_timeout_ms must be > 0"));
        }
        if self.frame_session_timeout_ms < self.frame_idle_timeout_ms {
            return Err(ConfigError::ValidationFailed(
                "frame_session_timeout_ms must be >= frame_idle_timeout_ms",
            ));
        }
        if self.reload_attempts == 0 {
            return Err(ConfigError::ValidationFailed("reload_attempts must be >= 1"));
        }
        if self.schedule_file.is_empty() || self.temp_file.is_empty() {
            return Err(ConfigError::ValidationFailed("file names must not be empty"));
        }
        if self.schedule_file == self.temp_file {
            return Err(ConfigError::ValidationFailed(
                "temp_file must differ from schedule_file",
            ));
        }
        if self.commit_remove_attempts == 0 {
            return Err(ConfigError::ValidationFailed("commit_remove_attempts must be >= 1"));
        }
        if self.copy_chunk_bytes == 0 || self.copy_chunk_bytes > 512 {
            return Err(ConfigError::ValidationFailed("copy_chunk_bytes must be 1-512"));
        }
        for deg in [self.servo_standby_deg, self.servo_open_deg, self.servo_close_deg] {
            if deg > 180 {
                return Err(ConfigError::ValidationFailed("servo angles must be 0-180"));
            }
        }
        if self.stabilize_ms >= self.sensing_timeout_ms {
            return Err(ConfigError::ValidationFailed(
                "stabilize_ms must be below sensing_timeout_ms",
            ));
        }
        if self.beam_confirm_pause_us > 1_000 {
            return Err(ConfigError::ValidationFailed("beam_confirm_pause_us must be <= 1000"));
        }
        if self.notification_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed("notification_timeout_secs must be > 0"));
        }
        if self.countdown_refresh_secs == 0 {
            return Err(ConfigError::ValidationFailed("countdown_refresh_secs must be > 0"));
        }
        if self.control_loop_interval_ms == 0 || self.control_loop_interval_ms > 1_000 {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be 1-1000",
            ));
        }
        Ok(())
    }
}
