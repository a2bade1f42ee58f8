use std::fmt;

use log::{debug, info, warn};

use super::error::{hardware, SensorError, SensorResult};
use crate::hal::AnalogInput;
use crate::utils::analog_calc::moisture_percentage;

/// Largest accepted calibration endpoint
pub const CALIBRATION_LIMIT: u16 = 1024;
pub const DEFAULT_DRY_VALUE: u16 = 0;
pub const DEFAULT_WET_VALUE: u16 = 1024;

/// Which sorting bin the probe sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bin {
    Dry,
    Wet,
}

impl fmt::Display for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bin::Dry => f.write_str("dry bin"),
            Bin::Wet => f.write_str("wet bin"),
        }
    }
}

/// Resistive/capacitive moisture probe mapped to 0-100 %
pub struct MoistureSensor<A> {
    input: A,
    bin: Bin,
    dry_value: u16,
    wet_value: u16,
}

fn check_endpoint(name: &str, value: u16) -> SensorResult<u16> {
    if value > CALIBRATION_LIMIT {
        return Err(SensorError::InvalidCalibration(format!(
            "{} endpoint {} is above {}",
            name, value, CALIBRATION_LIMIT
        )));
    }
    Ok(value)
}

impl<A: AnalogInput> MoistureSensor<A> {
    pub fn new(bin: Bin, input: A) -> Self {
        Self {
            input,
            bin,
            dry_value: DEFAULT_DRY_VALUE,
            wet_value: DEFAULT_WET_VALUE,
        }
    }

    /// Sensor with both endpoints already known, see [`MoistureSensor::set_calibration`].
    pub fn with_calibration(bin: Bin, input: A, dry: u16, wet: u16) -> SensorResult<Self> {
        let mut sensor = Self::new(bin, input);
        sensor.set_calibration(dry, wet)?;
        Ok(sensor)
    }

    pub fn begin(&mut self) {
        info!(
            "moisture sensor ({}) ready (dry {}, wet {})",
            self.bin, self.dry_value, self.wet_value
        );
    }

    pub fn try_read_raw(&mut self) -> SensorResult<u16> {
        self.input.read_raw().map_err(hardware)
    }

    /// Moisture in percent, clamped to `0..=100`.
    ///
    /// # Errors
    /// `InvalidCalibration` when the dry and wet endpoints are equal.
    pub fn try_read_percentage(&mut self) -> SensorResult<u8> {
        let raw = self.try_read_raw()?;
        let percent = moisture_percentage(raw, i32::from(self.dry_value), i32::from(self.wet_value))
            .ok_or_else(|| {
                SensorError::InvalidCalibration(format!(
                    "dry and wet endpoints are both {}",
                    self.dry_value
                ))
            })?;
        debug!("moisture ({}): raw {} -> {}%", self.bin, raw, percent);
        Ok(percent)
    }

    /// Moisture in percent, 0 if the probe could not be read.
    pub fn read_percentage(&mut self) -> u8 {
        self.try_read_percentage().unwrap_or_else(|e| {
            warn!("moisture ({}) read failed: {}, reporting 0%", self.bin, e);
            0
        })
    }

    /// Take the current sample as the 0 % endpoint.
    pub fn calibrate_dry(&mut self) -> SensorResult<u16> {
        self.dry_value = self.try_read_raw()?;
        info!("moisture ({}) dry endpoint set to {}", self.bin, self.dry_value);
        Ok(self.dry_value)
    }

    /// Take the current sample as the 100 % endpoint.
    pub fn calibrate_wet(&mut self) -> SensorResult<u16> {
        self.wet_value = self.try_read_raw()?;
        info!("moisture ({}) wet endpoint set to {}", self.bin, self.wet_value);
        Ok(self.wet_value)
    }

    /// Set both endpoints. Either may be the larger one.
    ///
    /// # Arguments
    /// - `dry`: raw reading of the probe in air
    /// - `wet`: raw reading of the probe in water
    ///
    /// # Errors
    /// `InvalidCalibration` when an endpoint is above [`CALIBRATION_LIMIT`].
    /// The previous endpoints are kept.
    pub fn set_calibration(&mut self, dry: u16, wet: u16) -> SensorResult<()> {
        let dry = check_endpoint("dry", dry)?;
        let wet = check_endpoint("wet", wet)?;
        if dry > wet {
            debug!("moisture ({}): dry {} > wet {}, probe reads lower when wet", self.bin, dry, wet);
        }
        self.dry_value = dry;
        self.wet_value = wet;
        Ok(())
    }

    /// `(dry, wet)` endpoints
    pub fn calibration(&self) -> (u16, u16) {
        (self.dry_value, self.wet_value)
    }

    pub fn bin(&self) -> Bin {
        self.bin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockAnalog;

    #[test]
    fn test_default_endpoints() {
        let adc = MockAnalog::new(512);
        let mut sensor = MoistureSensor::new(Bin::Dry, adc.clone());
        assert_eq!(sensor.read_percentage(), 50);

        adc.set_value(1023);
        assert_eq!(sensor.read_percentage(), 99);
    }

    #[test]
    fn test_one_shot_calibration() {
        let adc = MockAnalog::new(300);
        let mut sensor = MoistureSensor::new(Bin::Wet, adc.clone());
        assert_eq!(sensor.calibrate_dry(), Ok(300));
        adc.set_value(700);
        assert_eq!(sensor.calibrate_wet(), Ok(700));
        assert_eq!(sensor.calibration(), (300, 700));

        assert_eq!(sensor.read_percentage(), 100);
        adc.set_value(300);
        assert_eq!(sensor.read_percentage(), 0);
        adc.set_value(500);
        assert_eq!(sensor.read_percentage(), 50);
    }

    #[test]
    fn test_endpoint_validation() {
        let mut sensor = MoistureSensor::new(Bin::Dry, MockAnalog::new(0));
        assert!(matches!(
            sensor.set_calibration(0, 1025),
            Err(SensorError::InvalidCalibration(_))
        ));
        assert_eq!(sensor.calibration(), (DEFAULT_DRY_VALUE, DEFAULT_WET_VALUE));
        assert!(sensor.set_calibration(1024, 0).is_ok());
    }

    #[test]
    fn test_equal_endpoints() {
        let adc = MockAnalog::new(400);
        let mut sensor = MoistureSensor::with_calibration(Bin::Dry, adc, 400, 400).unwrap();
        assert!(matches!(
            sensor.try_read_percentage(),
            Err(SensorError::InvalidCalibration(_))
        ));
        assert_eq!(sensor.read_percentage(), 0);
    }
}
