//! Actuator drivers, input debouncing, and hardware initialisation.

pub mod button;
pub mod hw_init;
pub mod motor;
pub mod servo;
