//! Feed motor driver (DC motor behind a low-side MOSFET, active HIGH).
//!
//! On/off only.  The actuation FSM decides when a motor may run; this
//! driver is a dumb actuator.

use crate::drivers::hw_init;

pub struct MotorDriver {
    gpio: i32,
    running: bool,
}

impl MotorDriver {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            running: false,
        }
    }

    pub fn set(&mut self, on: bool) {
        hw_init::gpio_write(self.gpio, on);
        self.running = on;
    }

    pub fn stop(&mut self) {
        self.set(false);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
