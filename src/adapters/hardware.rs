//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns one servo and one motor driver per tube and reads the two
//! active-low inputs, exposing them through [`SensorPort`] and
//! [`ActuatorPort`].  This is the only module in the system that touches
//! actuator hardware.  On non-espidf targets, the underlying drivers use
//! cfg-gated simulation stubs.

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::drivers::hw_init;
use crate::drivers::motor::MotorDriver;
use crate::drivers::servo::ServoDriver;
use crate::pins::{self, TUBE_COUNT, TUBE_MAPPINGS};

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    servos: [ServoDriver; TUBE_COUNT],
    motors: [MotorDriver; TUBE_COUNT],
    standby_deg: u8,
}

impl HardwareAdapter {
    pub fn new(standby_deg: u8) -> Self {
        Self {
            servos: core::array::from_fn(|i| ServoDriver::new(TUBE_MAPPINGS[i].actuator)),
            motors: core::array::from_fn(|i| MotorDriver::new(TUBE_MAPPINGS[i].motor_gpio)),
            standby_deg,
        }
    }

    pub fn motor_running(&self, actuator: usize) -> bool {
        self.motors.get(actuator).is_some_and(MotorDriver::is_running)
    }

    pub fn valve_angle(&self, actuator: usize) -> Option<u8> {
        self.servos.get(actuator).and_then(ServoDriver::angle)
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl SensorPort for HardwareAdapter {
    fn beam_interrupted(&mut self) -> bool {
        // LOW = beam blocked
        !hw_init::gpio_read(pins::BEAM_SENSOR_GPIO)
    }

    fn confirm_pressed(&mut self) -> bool {
        !hw_init::gpio_read(pins::CONFIRM_BUTTON_GPIO)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_valve(&mut self, actuator: usize, angle: u8) {
        match self.servos.get_mut(actuator) {
            Some(servo) => servo.set_angle(angle),
            None => log::warn!("hardware: no servo for actuator {}", actuator),
        }
    }

    fn set_motor(&mut self, actuator: usize, on: bool) {
        match self.motors.get_mut(actuator) {
            Some(motor) => motor.set(on),
            None => log::warn!("hardware: no motor for actuator {}", actuator),
        }
    }

    fn all_off(&mut self) {
        for motor in &mut self.motors {
            motor.stop();
        }
        for servo in &mut self.servos {
            servo.set_angle(self.standby_deg);
        }
    }
}
