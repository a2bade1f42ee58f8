use log::{debug, info, warn};

use super::error::{hardware, SensorError, SensorResult};
use crate::hal::{DelayNs, InputPin, OutputPin};

/// Scale factor of the bin load cell (raw counts per gram)
pub const DEFAULT_LOAD_CELL_CALIBRATION: f32 = 2280.0;
/// Samples averaged per weight reading and per tare
pub const LOAD_CELL_SAMPLES: u8 = 10;
/// How long `read` waits for a conversion (1 ms steps)
pub const HX711_READY_TIMEOUT_MS: u32 = 1000;

/// HX711 24-bit load cell ADC, channel A at gain 128
pub struct Hx711<DT, SCK, D> {
    data: DT,
    clock: SCK,
    delay: D,
    offset: i32,
    scale: f32,
}

impl<DT, SCK, D> Hx711<DT, SCK, D>
where
    DT: InputPin,
    SCK: OutputPin,
    D: DelayNs,
{
    pub fn new(data: DT, mut clock: SCK, delay: D) -> SensorResult<Self> {
        clock.set_low().map_err(hardware)?;
        Ok(Self {
            data,
            clock,
            delay,
            offset: 0,
            scale: 1.0,
        })
    }

    /// DOUT goes low when a conversion is waiting.
    pub fn is_ready(&mut self) -> SensorResult<bool> {
        self.data.is_low().map_err(hardware)
    }

    fn wait_ready(&mut self) -> SensorResult<()> {
        for _ in 0..HX711_READY_TIMEOUT_MS {
            if self.is_ready()? {
                return Ok(());
            }
            self.delay.delay_ms(1);
        }
        Err(SensorError::NotReady)
    }

    fn pulse(&mut self) -> SensorResult<bool> {
        self.clock.set_high().map_err(hardware)?;
        self.delay.delay_us(1);
        let bit = self.data.is_high().map_err(hardware)?;
        self.clock.set_low().map_err(hardware)?;
        self.delay.delay_us(1);
        Ok(bit)
    }

    /// One raw conversion, sign-extended.
    pub fn read(&mut self) -> SensorResult<i32> {
        self.wait_ready()?;
        let mut value: u32 = 0;
        for _ in 0..24 {
            value = (value << 1) | u32::from(self.pulse()?);
        }
        // 25th pulse selects channel A, gain 128 for the next conversion
        self.pulse()?;
        Ok(((value << 8) as i32) >> 8)
    }

    pub fn read_average(&mut self, times: u8) -> SensorResult<i32> {
        let times = times.max(1);
        let mut sum: i64 = 0;
        for _ in 0..times {
            sum += i64::from(self.read()?);
        }
        Ok((sum / i64::from(times)) as i32)
    }

    /// Averaged reading minus the tare offset.
    pub fn get_value(&mut self, times: u8) -> SensorResult<i32> {
        Ok(self.read_average(times)? - self.offset)
    }

    /// Averaged reading in calibrated units.
    pub fn get_units(&mut self, times: u8) -> SensorResult<f32> {
        Ok(self.get_value(times)? as f32 / self.scale)
    }

    /// Take the current load as zero.
    pub fn tare(&mut self, times: u8) -> SensorResult<()> {
        self.offset = self.read_average(times)?;
        Ok(())
    }

    /// Raw counts per unit used by [`Hx711::get_units`].
    ///
    /// # Errors
    /// `InvalidCalibration` for zero or non-finite scales; the previous scale is kept.
    pub fn set_scale(&mut self, scale: f32) -> SensorResult<()> {
        self.scale = check_scale(scale)?;
        Ok(())
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

}

fn check_scale(factor: f32) -> SensorResult<f32> {
    if !factor.is_finite() || factor == 0.0 {
        return Err(SensorError::InvalidCalibration(format!(
            "load cell factor must be finite and non-zero, got {}",
            factor
        )));
    }
    Ok(factor)
}

/// Load cell under a sorting bin
pub struct LoadCell<DT, SCK, D> {
    hx711: Hx711<DT, SCK, D>,
    calibration_factor: f32,
}

impl<DT, SCK, D> LoadCell<DT, SCK, D>
where
    DT: InputPin,
    SCK: OutputPin,
    D: DelayNs,
{
    pub fn new(hx711: Hx711<DT, SCK, D>) -> Self {
        Self {
            hx711,
            calibration_factor: DEFAULT_LOAD_CELL_CALIBRATION,
        }
    }

    /// Load cell with a custom scale factor.
    ///
    /// # Arguments
    /// - `hx711`: the converter the cell is wired to
    /// - `calibration_factor`: raw counts per gram, negative for a cell mounted upside down
    ///
    /// # Errors
    /// `InvalidCalibration` when the factor is zero or not finite
    pub fn with_calibration(hx711: Hx711<DT, SCK, D>, calibration_factor: f32) -> SensorResult<Self> {
        Ok(Self {
            hx711,
            calibration_factor: check_scale(calibration_factor)?,
        })
    }

    /// Apply the scale factor and zero the empty bin.
    pub fn begin(&mut self) -> SensorResult<()> {
        self.hx711.set_scale(self.calibration_factor)?;
        self.hx711.tare(LOAD_CELL_SAMPLES)?;
        info!(
            "load cell ready (factor {:.1}, offset {})",
            self.calibration_factor,
            self.hx711.offset()
        );
        Ok(())
    }

    pub fn is_ready(&mut self) -> bool {
        self.hx711.is_ready().unwrap_or(false)
    }

    /// Weight in grams, never negative.
    ///
    /// # Errors
    /// `NotReady` when no conversion is waiting; the call does not block for one.
    pub fn try_read_grams(&mut self) -> SensorResult<f32> {
        if !self.hx711.is_ready()? {
            return Err(SensorError::NotReady);
        }
        let units = self.hx711.get_units(LOAD_CELL_SAMPLES)?;
        let grams = units.max(0.0);
        debug!("load cell: {:.1} units -> {:.1} g", units, grams);
        Ok(grams)
    }

    /// Weight in grams, 0.0 if the HX711 had nothing ready.
    pub fn read_grams(&mut self) -> f32 {
        self.try_read_grams().unwrap_or_else(|e| {
            warn!("load cell read failed: {}, reporting 0 g", e);
            0.0
        })
    }

    pub fn tare(&mut self) -> SensorResult<()> {
        self.hx711.tare(LOAD_CELL_SAMPLES)?;
        info!("load cell tared (offset {})", self.hx711.offset());
        Ok(())
    }

    /// Takes effect from the next reading.
    pub fn set_calibration_factor(&mut self, factor: f32) -> SensorResult<()> {
        self.hx711.set_scale(factor)?;
        self.calibration_factor = factor;
        info!("load cell calibration factor set to {:.1}", factor);
        Ok(())
    }

    pub fn calibration_factor(&self) -> f32 {
        self.calibration_factor
    }

    pub fn hx711(&mut self) -> &mut Hx711<DT, SCK, D> {
        &mut self.hx711
    }
}
