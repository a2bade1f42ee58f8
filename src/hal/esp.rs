/// ESP32 implementations of the capability traits.
///
/// Digital pins, LEDC PWM, I2C and delays already implement `embedded-hal`
/// in `esp-idf-hal`; only ADC sampling, pulse timing and non-blocking UART
/// receive need adapters.
use std::convert::Infallible;

use esp_idf_svc::hal::adc::attenuation::DB_11;
use esp_idf_svc::hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_svc::hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_svc::hal::adc::{ADCPin, ADC1};
use esp_idf_svc::hal::delay::NON_BLOCK;
use esp_idf_svc::hal::gpio::{
    self, AnyIOPin, AnyInputPin, AnyOutputPin, Input, InputOutput, Level, Output, PinDriver, Pull,
};
use esp_idf_svc::hal::uart::UartRxDriver;
use esp_idf_svc::sys::{esp_timer_get_time, EspError};

use super::{AnalogInput, PinState, PulseInput, SerialRx};

pub type EspOutput = PinDriver<'static, AnyOutputPin, Output>;
pub type EspInput = PinDriver<'static, AnyInputPin, Input>;
pub type EspOpenDrain = PinDriver<'static, AnyIOPin, InputOutput>;

/// Analog input with its concrete pin type erased
pub type BoxedAnalog<'d> = Box<dyn AnalogInput<Error = EspError> + 'd>;

/// ESP-IDF setup errors
#[derive(Debug, thiserror::Error)]
pub enum EspSetupError {
    #[error("ESP-IDF error: {0}")]
    Esp(#[from] EspError),

    #[error("GPIO{0} is not an ADC1 input")]
    NotAdcCapable(u8),
}

/// Push-pull output on `gpio`.
///
/// # Safety
/// `gpio` must not be driven by anything else; take it from a validated
/// `BoardPins`.
pub unsafe fn output_pin(gpio: u8) -> Result<EspOutput, EspError> {
    PinDriver::output(AnyOutputPin::new(i32::from(gpio)))
}

/// # Safety
/// See [`output_pin`].
pub unsafe fn input_pin(gpio: u8) -> Result<EspInput, EspError> {
    PinDriver::input(AnyInputPin::new(i32::from(gpio)))
}

/// Open-drain pin with the internal pull-up enabled, for the 1-Wire bus.
///
/// # Safety
/// See [`output_pin`].
pub unsafe fn open_drain_pin(gpio: u8) -> Result<EspOpenDrain, EspError> {
    let mut pin = PinDriver::input_output_od(AnyIOPin::new(i32::from(gpio)))?;
    pin.set_pull(Pull::Up)?;
    Ok(pin)
}

/// One ADC1 channel scaled to 10 bits
pub struct EspAnalog<'d, T: ADCPin<Adc = ADC1>> {
    channel: AdcChannelDriver<'d, T, &'d AdcDriver<'d, ADC1>>,
}

impl<'d, T: ADCPin<Adc = ADC1>> AnalogInput for EspAnalog<'d, T> {
    type Error = EspError;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        // 12-bit converter
        Ok(self.channel.read_raw()? >> 2)
    }
}

/// Open the ADC1 channel wired to `gpio` (32-39), 11 dB attenuation.
pub fn adc1_input<'d>(adc: &'d AdcDriver<'d, ADC1>, gpio: u8) -> Result<BoxedAnalog<'d>, EspSetupError> {
    let config = AdcChannelConfig {
        attenuation: DB_11,
        ..Default::default()
    };

    macro_rules! channel {
        ($pin:ty) => {
            Box::new(EspAnalog {
                // the pin number was validated by the caller
                channel: AdcChannelDriver::new(adc, unsafe { <$pin>::new() }, &config)?,
            })
        };
    }

    let input: BoxedAnalog<'d> = match gpio {
        32 => channel!(gpio::Gpio32),
        33 => channel!(gpio::Gpio33),
        34 => channel!(gpio::Gpio34),
        35 => channel!(gpio::Gpio35),
        36 => channel!(gpio::Gpio36),
        37 => channel!(gpio::Gpio37),
        38 => channel!(gpio::Gpio38),
        39 => channel!(gpio::Gpio39),
        other => return Err(EspSetupError::NotAdcCapable(other)),
    };
    Ok(input)
}

fn now_us() -> i64 {
    unsafe { esp_timer_get_time() }
}

/// Busy-waiting `pulseIn` on an input pin
pub struct EspPulseIn {
    pin: EspInput,
}

impl EspPulseIn {
    pub fn new(pin: EspInput) -> Self {
        Self { pin }
    }

    fn wait_for(&self, level: Level, deadline: i64) -> bool {
        while self.pin.get_level() != level {
            if now_us() > deadline {
                return false;
            }
        }
        true
    }
}

impl PulseInput for EspPulseIn {
    type Error = Infallible;

    fn pulse_in(&mut self, level: PinState, timeout_us: u32) -> Result<Option<u32>, Self::Error> {
        let (active, idle) = match level {
            PinState::High => (Level::High, Level::Low),
            PinState::Low => (Level::Low, Level::High),
        };
        let deadline = now_us() + i64::from(timeout_us);

        // let a pulse already in progress pass
        if !self.wait_for(idle, deadline) || !self.wait_for(active, deadline) {
            return Ok(None);
        }
        let start = now_us();
        if !self.wait_for(idle, deadline) {
            return Ok(None);
        }
        Ok(u32::try_from(now_us() - start).ok())
    }
}

/// Receive half of a UART, read without blocking
pub struct EspSerialRx<'d> {
    uart: UartRxDriver<'d>,
}

impl<'d> EspSerialRx<'d> {
    pub fn new(uart: UartRxDriver<'d>) -> Self {
        Self { uart }
    }
}

impl SerialRx for EspSerialRx<'_> {
    type Error = EspError;

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte, NON_BLOCK)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}
