use log::{debug, info, warn};

use super::error::{SensorError, SensorResult};
use super::pins::COMPASS_I2C_ADDRESS;
use crate::hal::I2c;

pub const REG_MODE: u8 = 0x02;
pub const REG_DATA_X_MSB: u8 = 0x03;
pub const MODE_CONTINUOUS: u8 = 0x00;

/// Raw magnetometer axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagneticField {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl MagneticField {
    /// Decode the six data registers. The chip sends X, Z, Y.
    pub fn from_registers(data: &[u8; 6]) -> Self {
        Self {
            x: i16::from_be_bytes([data[0], data[1]]),
            z: i16::from_be_bytes([data[2], data[3]]),
            y: i16::from_be_bytes([data[4], data[5]]),
        }
    }

    /// Heading in degrees, `0.0..360.0`.
    pub fn heading_degrees(&self) -> f32 {
        normalize_heading(f32::from(self.y).atan2(f32::from(self.x)).to_degrees())
    }
}

/// Fold any angle in degrees into `0.0..360.0`.
pub fn normalize_heading(degrees: f32) -> f32 {
    let heading = degrees % 360.0;
    if heading < 0.0 {
        // -1e-6 % 360 + 360 rounds to 360.0 in f32
        let wrapped = heading + 360.0;
        if wrapped >= 360.0 {
            0.0
        } else {
            wrapped
        }
    } else {
        heading
    }
}

/// HMC5883L three-axis compass
pub struct Compass<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Compass<I> {
    pub fn new(i2c: I) -> Self {
        Self::with_address(i2c, COMPASS_I2C_ADDRESS)
    }

    /// Compass answering on a non-default 7-bit `address`.
    pub fn with_address(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Put the chip in continuous measurement mode.
    pub fn begin(&mut self) -> SensorResult<()> {
        self.i2c
            .write(self.address, &[REG_MODE, MODE_CONTINUOUS])
            .map_err(|e| self.bus_error(e))?;
        info!("compass ready at 0x{:02X}", self.address);
        Ok(())
    }

    /// Zero-length write acknowledged by the chip.
    pub fn is_connected(&mut self) -> bool {
        self.i2c.write(self.address, &[]).is_ok()
    }

    fn bus_error(&self, e: I::Error) -> SensorError {
        use embedded_hal::i2c::{Error, ErrorKind};
        match e.kind() {
            ErrorKind::NoAcknowledge(_) => SensorError::NoAck(self.address),
            _ => SensorError::Hardware(format!("{:?}", e)),
        }
    }

    pub fn try_read_field(&mut self) -> SensorResult<MagneticField> {
        let mut data = [0u8; 6];
        self.i2c
            .write_read(self.address, &[REG_DATA_X_MSB], &mut data)
            .map_err(|e| self.bus_error(e))?;
        Ok(MagneticField::from_registers(&data))
    }

    pub fn try_read_heading(&mut self) -> SensorResult<f32> {
        let field = self.try_read_field()?;
        let heading = field.heading_degrees();
        debug!("compass: x {} y {} z {} -> {:.1}°", field.x, field.y, field.z, heading);
        Ok(heading)
    }

    /// Heading in degrees, 0.0 if the chip did not answer.
    pub fn read_heading(&mut self) -> f32 {
        self.try_read_heading().unwrap_or_else(|e| {
            warn!("compass read failed: {}, reporting 0°", e);
            0.0
        })
    }
}
