/// Utility modules
/// Hardware-independent pure functions and parsers

pub mod analog_calc;
pub mod nmea;
pub mod tds_calc;

// convenience re-exports
pub use analog_calc::{calculate_gas_ppm, moisture_percentage, raw_to_voltage};
pub use nmea::{Location, NmeaParser, ParserStats};
pub use tds_calc::{calculate_tds_ppm, pollution_zone, water_health_status, PollutionZone, WaterHealth};
