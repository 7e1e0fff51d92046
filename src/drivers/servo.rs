//! Valve servo driver (hobby servo on a 50 Hz LEDC channel).
//!
//! Angle is mapped linearly onto a 544–2400 µs pulse, then onto the
//! 14-bit duty of a 20 ms frame.
//!
//! On host/test the LEDC write is a no-op; the driver still tracks the
//! commanded angle.

use crate::drivers::hw_init;
use crate::pins;

/// Largest accepted angle.
pub const MAX_ANGLE_DEG: u8 = 180;

/// Pulse width for `angle` degrees (clamped to 0..=180).
pub fn pulse_us(angle: u8) -> u32 {
    let angle = angle.min(MAX_ANGLE_DEG) as u32;
    let span = pins::SERVO_MAX_PULSE_US - pins::SERVO_MIN_PULSE_US;
    pins::SERVO_MIN_PULSE_US + span * angle / MAX_ANGLE_DEG as u32
}

/// LEDC duty for a pulse of `pulse_us` inside one PWM period.
pub fn duty_for_pulse(pulse_us: u32) -> u32 {
    let period_us = 1_000_000 / pins::SERVO_PWM_FREQ_HZ;
    let full_scale = 1u32 << pins::SERVO_PWM_RESOLUTION_BITS;
    (pulse_us as u64 * full_scale as u64 / period_us as u64) as u32
}

pub struct ServoDriver {
    channel: u32,
    angle: Option<u8>,
}

impl ServoDriver {
    pub fn new(actuator: usize) -> Self {
        Self {
            channel: hw_init::servo_channel(actuator),
            angle: None,
        }
    }

    /// Command `angle`.  Repeating the current angle skips the register
    /// write.
    pub fn set_angle(&mut self, angle: u8) {
        let angle = angle.min(MAX_ANGLE_DEG);
        if self.angle == Some(angle) {
            return;
        }
        hw_init::ledc_set(self.channel, duty_for_pulse(pulse_us(angle)));
        self.angle = Some(angle);
    }

    /// Last commanded angle; `None` before the first command.
    pub fn angle(&self) -> Option<u8> {
        self.angle
    }
}
