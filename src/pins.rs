//! GPIO / peripheral pin assignments for the dispenser main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  The tube table at the bottom is the only
//! mapping from schedule tube ids to physical actuators.

// ---------------------------------------------------------------------------
// Valve servos (one per tube, LEDC PWM at 50 Hz)
// ---------------------------------------------------------------------------

pub const SERVO_1_GPIO: i32 = 4;
pub const SERVO_2_GPIO: i32 = 5;
pub const SERVO_3_GPIO: i32 = 6;
pub const SERVO_4_GPIO: i32 = 7;

// ---------------------------------------------------------------------------
// Feed motors (digital output via MOSFET, active HIGH)
// ---------------------------------------------------------------------------

pub const MOTOR_1_GPIO: i32 = 15;
pub const MOTOR_2_GPIO: i32 = 16;
pub const MOTOR_3_GPIO: i32 = 17;
pub const MOTOR_4_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Optical break-beam at the shared drop chute.  LOW = beam interrupted.
pub const BEAM_SENSOR_GPIO: i32 = 8;

// ---------------------------------------------------------------------------
// User button (active-low with internal pull-up)
// ---------------------------------------------------------------------------

/// DROP button: confirms wizard steps and triggers manual dispensing.
pub const CONFIRM_BUTTON_GPIO: i32 = 9;

// ---------------------------------------------------------------------------
// Schedule link (UART1 from the companion app bridge)
// ---------------------------------------------------------------------------

pub const LINK_UART_TX_GPIO: i32 = 43;
pub const LINK_UART_RX_GPIO: i32 = 44;
pub const LINK_UART_BAUD: u32 = 9_600;

// ---------------------------------------------------------------------------
// SD card (SPI)
// ---------------------------------------------------------------------------

pub const SD_MOSI_GPIO: i32 = 11;
pub const SD_MISO_GPIO: i32 = 13;
pub const SD_SCLK_GPIO: i32 = 12;
pub const SD_CS_GPIO: i32 = 10;
pub const SD_MOUNT_POINT: &str = "/sdcard";

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// Hobby-servo frame rate.
pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// LEDC resolution for servo channels (14-bit = 16384 steps per 20 ms).
pub const SERVO_PWM_RESOLUTION_BITS: u32 = 14;
/// Pulse width at 0° and 180°.
pub const SERVO_MIN_PULSE_US: u32 = 544;
pub const SERVO_MAX_PULSE_US: u32 = 2_400;

// ---------------------------------------------------------------------------
// Tube → actuator mapping
// ---------------------------------------------------------------------------

/// Number of physical tubes on the carousel.
pub const TUBE_COUNT: usize = 4;

/// One row of the static tube table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TubeMapping {
    pub tube_id: &'static str,
    pub actuator: usize,
    pub servo_gpio: i32,
    pub motor_gpio: i32,
}

pub static TUBE_MAPPINGS: [TubeMapping; TUBE_COUNT] = [
    TubeMapping { tube_id: "tube1", actuator: 0, servo_gpio: SERVO_1_GPIO, motor_gpio: MOTOR_1_GPIO },
    TubeMapping { tube_id: "tube2", actuator: 1, servo_gpio: SERVO_2_GPIO, motor_gpio: MOTOR_2_GPIO },
    TubeMapping { tube_id: "tube3", actuator: 2, servo_gpio: SERVO_3_GPIO, motor_gpio: MOTOR_3_GPIO },
    TubeMapping { tube_id: "tube4", actuator: 3, servo_gpio: SERVO_4_GPIO, motor_gpio: MOTOR_4_GPIO },
];

/// Resolve a schedule tube id to its actuator index.
pub fn actuator_for_tube(tube_id: &str) -> Option<usize> {
    TUBE_MAPPINGS
        .iter()
        .find(|m| m.tube_id == tube_id)
        .map(|m| m.actuator)
}
