/*!
 * # PavitraX boat peripherals
 *
 * Drivers for the sensors and motors of the PavitraX waste-sorting boat.
 * Every driver is generic over `embedded-hal` traits (plus the few
 * capabilities in `hal`), so the same code runs on the ESP32 and against the
 * mocks in `hal::mock` on the host.
 *
 * ## Modules
 * - `hal`: capability traits, analog multiplexer, ESP32 adapters and mocks
 * - `hardware`: sensor drivers, motor banks, pin registry
 * - `utils`: conversions, TDS classification, NMEA parsing
 * - `core`: telemetry snapshot and control commands
 * - `config`: build-time settings from `cfg.toml`
 */

pub mod config;
pub mod core;
pub mod hal;
pub mod hardware;
pub mod utils;

pub use self::core::{parse_command, ControlCommand, TelemetrySnapshot};
pub use config::{AppConfig, ConfigError};
pub use hardware::{BoardPins, MotorError, PinConfigError, SensorError, SensorResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
