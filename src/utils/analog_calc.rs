/// Analog conversion helpers
/// Hardware-independent pure functions
use crate::hal::ADC_FULL_SCALE;

/// Reference voltage of the MQ-series gas sensor boards
pub const GAS_REFERENCE_VOLTAGE: f32 = 5.0;

/// Convert a 10-bit ADC sample to volts.
///
/// # Arguments
/// - `raw`: ADC sample (0-1023)
/// - `reference_v`: ADC reference voltage
///
/// # Examples
/// ```
/// use boat_peripherals::utils::analog_calc::raw_to_voltage;
///
/// assert_eq!(raw_to_voltage(512, 5.0), 2.5);
/// ```
pub fn raw_to_voltage(raw: u16, reference_v: f32) -> f32 {
    f32::from(raw) / ADC_FULL_SCALE * reference_v
}

/// Gas concentration (ppm) from the sensor output voltage.
pub fn calculate_gas_ppm(voltage: f32, calibration_factor: f32) -> f32 {
    voltage * calibration_factor
}

/// Integer re-mapping with the semantics of Arduino's `map()`.
///
/// Truncates toward zero. Returns `None` when the input range is empty.
pub fn map_range(x: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> Option<i64> {
    let span = in_max - in_min;
    if span == 0 {
        return None;
    }
    Some((x - in_min) * (out_max - out_min) / span + out_min)
}

/// Moisture percentage of `raw` between the `dry` (0 %) and `wet` (100 %) endpoints.
///
/// # Returns
/// - `Some(0..=100)`: clamped percentage
/// - `None`: `dry == wet`, no usable calibration
///
/// # Examples
/// ```
/// use boat_peripherals::utils::analog_calc::moisture_percentage;
///
/// assert_eq!(moisture_percentage(600, 800, 400), Some(50));
/// ```
pub fn moisture_percentage(raw: u16, dry: i32, wet: i32) -> Option<u8> {
    let percentage = map_range(i64::from(raw), i64::from(dry), i64::from(wet), 0, 100)?;
    Some(percentage.clamp(0, 100) as u8)
}
