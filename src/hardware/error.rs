use std::fmt::Debug;

/// Sensor read failures
///
/// Returned by the `try_*` accessors. The masking accessors turn any of these
/// into the sensor's default value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorError {
    #[error("sensor is not ready")]
    NotReady,

    #[error("no acknowledge from I2C device 0x{0:02X}")]
    NoAck(u8),

    #[error("no device answered on the bus")]
    Disconnected,

    #[error("scratchpad CRC mismatch")]
    Crc,

    #[error("no echo within {0} us")]
    NoEcho(u32),

    #[error("no valid GPS fix")]
    NoFix,

    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("hardware access failed: {0}")]
    Hardware(String),
}

pub type SensorResult<T> = Result<T, SensorError>;

/// Wrap a platform error as [`SensorError::Hardware`].
pub(crate) fn hardware<E: Debug>(e: E) -> SensorError {
    SensorError::Hardware(format!("{:?}", e))
}

/// Reject calibration factors that would make every reading meaningless.
pub(crate) fn check_factor(factor: f32) -> SensorResult<f32> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(SensorError::InvalidCalibration(format!(
            "calibration factor must be a positive number, got {}",
            factor
        )));
    }
    Ok(factor)
}
