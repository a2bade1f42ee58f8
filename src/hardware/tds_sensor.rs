use log::{debug, info, warn};

use super::error::{check_factor, hardware, SensorResult};
use crate::hal::AnalogInput;
use crate::utils::analog_calc::raw_to_voltage;
use crate::utils::tds_calc::{
    calculate_tds_ppm, pollution_zone, water_health_status, PollutionZone, WaterHealth,
    TDS_REFERENCE_VOLTAGE,
};

/// Default TDS probe calibration factor
pub const DEFAULT_TDS_CALIBRATION: f32 = 2.0;

/// One classified TDS measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TdsReading {
    /// Raw ADC sample
    pub adc_value: u16,
    /// Probe output (V)
    pub voltage: f32,
    /// TDS concentration (ppm)
    pub tds_ppm: f32,
    pub health: WaterHealth,
    pub zone: PollutionZone,
}

/// Analog TDS probe
pub struct TdsSensor<A> {
    input: A,
    calibration_factor: f32,
}

impl<A: AnalogInput> TdsSensor<A> {
    pub fn new(input: A) -> Self {
        Self {
            input,
            calibration_factor: DEFAULT_TDS_CALIBRATION,
        }
    }

    /// # Arguments
    /// - `input`: analog channel of the TDS probe
    /// - `calibration_factor`: ppm per volt (2.0 for the stock board)
    ///
    /// # Errors
    /// `InvalidCalibration` unless the factor is finite and positive
    pub fn with_calibration(input: A, calibration_factor: f32) -> SensorResult<Self> {
        Ok(Self {
            input,
            calibration_factor: check_factor(calibration_factor)?,
        })
    }

    pub fn begin(&mut self) {
        info!("TDS sensor ready (factor {:.2})", self.calibration_factor);
    }

    /// Sample the probe and classify the water.
    pub fn try_read(&mut self) -> SensorResult<TdsReading> {
        let adc_value = self.input.read_raw().map_err(hardware)?;
        let voltage = raw_to_voltage(adc_value, TDS_REFERENCE_VOLTAGE);
        let tds_ppm = calculate_tds_ppm(voltage, self.calibration_factor);
        debug!("TDS: raw {} -> {:.3} V -> {:.1} ppm", adc_value, voltage, tds_ppm);

        Ok(TdsReading {
            adc_value,
            voltage,
            tds_ppm,
            health: water_health_status(tds_ppm),
            zone: pollution_zone(tds_ppm),
        })
    }

    pub fn try_read_ppm(&mut self) -> SensorResult<f32> {
        self.try_read().map(|reading| reading.tds_ppm)
    }

    /// TDS in ppm, 0.0 if the sample could not be taken.
    pub fn read_ppm(&mut self) -> f32 {
        self.try_read_ppm().unwrap_or_else(|e| {
            warn!("TDS read failed: {}, reporting 0 ppm", e);
            0.0
        })
    }

    pub fn set_calibration_factor(&mut self, factor: f32) -> SensorResult<()> {
        self.calibration_factor = check_factor(factor)?;
        info!("TDS calibration factor set to {:.3}", factor);
        Ok(())
    }

    pub fn calibration_factor(&self) -> f32 {
        self.calibration_factor
    }
}
