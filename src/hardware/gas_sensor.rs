use std::fmt;

use log::{debug, info, warn};

use super::error::{check_factor, hardware, SensorResult};
use crate::hal::AnalogInput;
use crate::utils::analog_calc::{calculate_gas_ppm, raw_to_voltage, GAS_REFERENCE_VOLTAGE};

/// Default ppm per volt for both MQ sensors
pub const DEFAULT_GAS_CALIBRATION: f32 = 200.0;

/// MQ-series sensor model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasKind {
    /// Air quality (NH3, NOx, benzene, CO2)
    Mq135,
    /// Combustible gas and smoke
    Mq2,
}

impl fmt::Display for GasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasKind::Mq135 => f.write_str("MQ135"),
            GasKind::Mq2 => f.write_str("MQ2"),
        }
    }
}

/// MQ135 / MQ2 gas sensor on an analog input
pub struct GasSensor<A> {
    input: A,
    kind: GasKind,
    calibration_factor: f32,
}

impl<A: AnalogInput> GasSensor<A> {
    pub fn new(kind: GasKind, input: A) -> Self {
        Self {
            input,
            kind,
            calibration_factor: DEFAULT_GAS_CALIBRATION,
        }
    }

    /// Create a sensor with a non-default calibration factor.
    ///
    /// # Arguments
    /// - `kind`: which gas the element responds to, used in log lines
    /// - `input`: analog channel the sensor's AO output is wired to
    /// - `calibration_factor`: ppm per volt
    ///
    /// # Errors
    /// `InvalidCalibration` unless the factor is finite and positive
    pub fn with_calibration(kind: GasKind, input: A, calibration_factor: f32) -> SensorResult<Self> {
        Ok(Self {
            input,
            kind,
            calibration_factor: check_factor(calibration_factor)?,
        })
    }

    pub fn begin(&mut self) {
        info!("{} gas sensor ready (factor {:.1} ppm/V)", self.kind, self.calibration_factor);
    }

    pub fn try_read_raw(&mut self) -> SensorResult<u16> {
        self.input.read_raw().map_err(hardware)
    }

    /// Gas concentration in ppm.
    pub fn try_read_ppm(&mut self) -> SensorResult<f32> {
        let raw = self.try_read_raw()?;
        let voltage = raw_to_voltage(raw, GAS_REFERENCE_VOLTAGE);
        let ppm = calculate_gas_ppm(voltage, self.calibration_factor);
        debug!("{}: raw {} -> {:.3} V -> {:.1} ppm", self.kind, raw, voltage, ppm);
        Ok(ppm)
    }

    /// Gas concentration in ppm, 0.0 if the sample could not be taken.
    pub fn read_ppm(&mut self) -> f32 {
        self.try_read_ppm().unwrap_or_else(|e| {
            warn!("{} read failed: {}, reporting 0 ppm", self.kind, e);
            0.0
        })
    }

    /// Replace the ppm-per-volt factor. Non-positive or non-finite factors are rejected.
    pub fn set_calibration_factor(&mut self, factor: f32) -> SensorResult<()> {
        self.calibration_factor = check_factor(factor)?;
        info!("{} calibration factor set to {:.3}", self.kind, factor);
        Ok(())
    }

    pub fn calibration_factor(&self) -> f32 {
        self.calibration_factor
    }

    pub fn kind(&self) -> GasKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockAnalog;
    use crate::hardware::SensorError;

    #[test]
    fn test_default_conversion() {
        let adc = MockAnalog::new(512);
        let mut sensor = GasSensor::new(GasKind::Mq135, adc);
        // 512 / 1024 * 5 V * 200
        assert_eq!(sensor.read_ppm(), 500.0);
    }

    #[test]
    fn test_new_factor_applies_to_next_read() {
        let adc = MockAnalog::new(256);
        let mut sensor = GasSensor::new(GasKind::Mq2, adc);
        assert_eq!(sensor.read_ppm(), 250.0);

        sensor.set_calibration_factor(400.0).unwrap();
        assert_eq!(sensor.read_ppm(), 500.0);
    }

    #[test]
    fn test_invalid_factor_keeps_previous() {
        let mut sensor = GasSensor::new(GasKind::Mq2, MockAnalog::new(0));
        for bad in [0.0, -3.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                sensor.set_calibration_factor(bad),
                Err(SensorError::InvalidCalibration(_))
            ));
        }
        assert_eq!(sensor.calibration_factor(), DEFAULT_GAS_CALIBRATION);
        assert!(GasSensor::with_calibration(GasKind::Mq135, MockAnalog::new(0), 0.0).is_err());
    }

    #[test]
    fn test_adc_failure_is_distinguishable_from_zero() {
        let adc = MockAnalog::new(0);
        let mut sensor = GasSensor::new(GasKind::Mq135, adc.clone());
        assert_eq!(sensor.try_read_ppm(), Ok(0.0));

        adc.set_fail(true);
        assert!(matches!(sensor.try_read_ppm(), Err(SensorError::Hardware(_))));
        assert_eq!(sensor.read_ppm(), 0.0);
    }
}
