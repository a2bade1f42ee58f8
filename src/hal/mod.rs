/// Platform abstraction for the sensor and motor drivers.
///
/// Digital pins, I2C, PWM and delays come from `embedded-hal` 1.0. The
/// capabilities `embedded-hal` has no trait for (ADC sampling, pulse-width
/// measurement, non-blocking serial receive) are defined here so that every
/// driver can run against `mock` on the host or `esp` on the boat.
use std::fmt::Debug;

pub use embedded_hal::delay::DelayNs;
pub use embedded_hal::digital::{InputPin, OutputPin, PinState};
pub use embedded_hal::i2c::I2c;
pub use embedded_hal::pwm::SetDutyCycle;

pub mod mux;

#[cfg(feature = "esp")]
pub mod esp;

// Recording fakes, available for tests and non-esp builds
#[cfg(not(feature = "esp"))]
pub mod mock;

pub use mux::{AnalogMux, MuxError, MuxedInput, SharedMux};

/// Highest raw value an [`AnalogInput`] may return (10-bit ADC).
pub const ADC_MAX_RAW: u16 = 1023;

/// Divisor used to turn a raw sample into a fraction of the reference voltage.
pub const ADC_FULL_SCALE: f32 = 1024.0;

/// One analog input channel.
pub trait AnalogInput {
    type Error: Debug;

    /// Sample the channel once.
    ///
    /// Implementations return a 10-bit value in `0..=ADC_MAX_RAW`; adapters for
    /// wider converters scale their result down.
    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

/// Pulse-width measurement on an input pin (Arduino `pulseIn`).
pub trait PulseInput {
    type Error: Debug;

    /// Wait for the next pulse at `level` and return its width in microseconds.
    ///
    /// Returns `Ok(None)` if no complete pulse is seen within `timeout_us`.
    fn pulse_in(&mut self, level: PinState, timeout_us: u32) -> Result<Option<u32>, Self::Error>;
}

/// Receive half of a serial link.
pub trait SerialRx {
    type Error: Debug;

    /// Take one byte from the receive buffer without blocking.
    ///
    /// `Ok(None)` means the buffer is currently empty.
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;
}

impl<T: AnalogInput + ?Sized> AnalogInput for &mut T {
    type Error = T::Error;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        (**self).read_raw()
    }
}

impl<T: SerialRx + ?Sized> SerialRx for &mut T {
    type Error = T::Error;

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        (**self).read_byte()
    }
}

impl<T: AnalogInput + ?Sized> AnalogInput for Box<T> {
    type Error = T::Error;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        (**self).read_raw()
    }
}
