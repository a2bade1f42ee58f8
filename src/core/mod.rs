/// Hardware-independent glue between the drivers and the uplink
pub mod command;
pub mod telemetry;

pub use command::{parse_command, CommandParseError, ControlCommand, NavigationMode};
pub use telemetry::{AlertKind, AlertThresholds, TelemetrySnapshot};
