/// Sensor and motor drivers
pub mod compass;
pub mod error;
pub mod gas_sensor;
pub mod gps;
pub mod load_cell;
pub mod moisture_sensor;
pub mod motors;
pub mod one_wire;
pub mod pins;
pub mod tds_sensor;
pub mod temp_sensor;
pub mod ultrasonic;

pub use compass::Compass;
pub use error::{SensorError, SensorResult};
pub use gas_sensor::{GasKind, GasSensor};
pub use gps::{Gps, GpsFix};
pub use load_cell::{Hx711, LoadCell};
pub use moisture_sensor::{Bin, MoistureSensor};
pub use motors::{ConveyorBank, HBridgeChannel, Motion, MotorError, PropellerBank};
pub use one_wire::{BitBangOneWire, OneWireBus, RomCode};
pub use pins::{BoardPins, MuxChannel, PinConfigError};
pub use tds_sensor::{TdsReading, TdsSensor};
pub use temp_sensor::TemperatureSensor;
pub use ultrasonic::Ultrasonic;
