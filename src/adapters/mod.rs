//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to               |
//! |----------------|--------------------|---------------------------|
//! | `hardware`     | SensorPort         | beam sensor, DROP button  |
//! |                | ActuatorPort       | valve servos, feed motors |
//! | `sdcard`       | FileStore          | FAT on SD card over SPI   |
//! | `serial`       | TransportPort      | UART1 schedule link       |
//! | `time`         | ClockPort, DelayNs | ESP32 system timer / RTC  |
//! | `log_sink`     | EventSink          | Serial log output         |
//! | `log_display`  | DisplayPort        | Serial log output         |

pub mod hardware;
pub mod log_display;
pub mod log_sink;
pub mod sdcard;
pub mod serial;
pub mod time;
