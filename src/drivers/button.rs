//! Debounced confirm (DROP) button.
//!
//! ## Hardware
//!
//! Active-low momentary switch with the internal pull-up enabled.  The
//! level is polled once per control tick through
//! [`SensorPort::confirm_pressed`](crate::app::ports::SensorPort::confirm_pressed),
//! which already inverts it, so `pressed == true` means "held down".
//!
//! ## Gesture
//!
//! | Phase      | Condition                                  |
//! |------------|--------------------------------------------|
//! | Debounce   | level held for `debounce_ms` → one press   |
//! | Cooldown   | further presses ignored for `cooldown_ms`  |
//! | Release    | must let go before the next press counts   |

/// Internal state machine for press detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState {
    Released,
    Debouncing { since_ms: u64 },
    Cooldown { until_ms: u64 },
    /// Still held after the cooldown; waiting for release.
    Held,
}

#[derive(Debug)]
pub struct ConfirmButton {
    debounce_ms: u64,
    cooldown_ms: u64,
    state: PressState,
}

impl ConfirmButton {
    pub fn new(debounce_ms: u32, cooldown_ms: u32) -> Self {
        Self {
            debounce_ms: debounce_ms as u64,
            cooldown_ms: cooldown_ms as u64,
            state: PressState::Released,
        }
    }

    /// Feed the current level.  Returns `true` exactly once per accepted
    /// press.
    pub fn update(&mut self, pressed: bool, now_ms: u64) -> bool {
        match self.state {
            PressState::Released => {
                if pressed {
                    self.state = PressState::Debouncing { since_ms: now_ms };
                }
                false
            }

            PressState::Debouncing { since_ms } => {
                if !pressed {
                    self.state = PressState::Released;
                    return false;
                }
                if now_ms.saturating_sub(since_ms) >= self.debounce_ms {
                    self.state = PressState::Cooldown {
                        until_ms: now_ms + self.cooldown_ms,
                    };
                    return true;
                }
                false
            }

            PressState::Cooldown { until_ms } => {
                if now_ms >= until_ms {
                    self.state = if pressed {
                        PressState::Held
                    } else {
                        PressState::Released
                    };
                }
                false
            }

            PressState::Held => {
                if !pressed {
                    self.state = PressState::Released;
                }
                false
            }
        }
    }
}
