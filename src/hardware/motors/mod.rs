/// L298N motor banks
///
/// Each bank owns its direction pins and PWM enables exclusively. Commands
/// return an error if a pin write fails. A failed command leaves the
/// affected motors stopped and reported inactive, never half-switched.
use log::trace;

use crate::hal::{OutputPin, SetDutyCycle};

pub mod conveyor;
pub mod propeller;

pub use conveyor::ConveyorBank;
pub use propeller::{Motion, PropellerBank};

/// Full-scale PWM value (`analogWrite` range)
pub const MAX_SPEED: u8 = 255;
/// Speed of a freshly constructed bank
pub const DEFAULT_SPEED: u8 = MAX_SPEED;

/// Motor control errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MotorError {
    #[error("{motor}: direction pin write failed: {detail}")]
    Direction { motor: &'static str, detail: String },

    #[error("{motor}: PWM duty update failed: {detail}")]
    Pwm { motor: &'static str, detail: String },
}

/// Clamp a requested speed into the PWM range.
///
/// # Examples
/// ```
/// use boat_peripherals::hardware::motors::clamp_speed;
///
/// assert_eq!(clamp_speed(-10), 0);
/// assert_eq!(clamp_speed(300), 255);
/// ```
pub fn clamp_speed(speed: i32) -> u8 {
    speed.clamp(0, i32::from(MAX_SPEED)) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// One H-bridge channel: IN_A/IN_B select the direction, EN carries the PWM.
pub struct HBridgeChannel<P, E> {
    name: &'static str,
    in_a: P,
    in_b: P,
    enable: E,
}

impl<P, E> HBridgeChannel<P, E>
where
    P: OutputPin,
    E: SetDutyCycle,
{
    pub fn new(name: &'static str, in_a: P, in_b: P, enable: E) -> Self {
        Self {
            name,
            in_a,
            in_b,
            enable,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn set_direction_pins(&mut self, a_high: bool, b_high: bool) -> Result<(), MotorError> {
        let name = self.name;
        let direction_error = |e: P::Error| MotorError::Direction {
            motor: name,
            detail: format!("{:?}", e),
        };
        self.in_a.set_state(a_high.into()).map_err(direction_error)?;
        self.in_b.set_state(b_high.into()).map_err(direction_error)
    }

    /// Write `duty` (0-255) to the enable pin.
    pub fn set_duty(&mut self, duty: u8) -> Result<(), MotorError> {
        trace!("{}: duty {}", self.name, duty);
        self.enable
            .set_duty_cycle_fraction(u16::from(duty), u16::from(MAX_SPEED))
            .map_err(|e| MotorError::Pwm {
                motor: self.name,
                detail: format!("{:?}", e),
            })
    }

    pub fn drive(&mut self, direction: Direction, duty: u8) -> Result<(), MotorError> {
        match direction {
            Direction::Forward => self.set_direction_pins(true, false)?,
            Direction::Reverse => self.set_direction_pins(false, true)?,
        }
        self.set_duty(duty)
    }

    pub fn forward(&mut self, duty: u8) -> Result<(), MotorError> {
        self.drive(Direction::Forward, duty)
    }

    pub fn reverse(&mut self, duty: u8) -> Result<(), MotorError> {
        self.drive(Direction::Reverse, duty)
    }

    /// Coast: duty 0, both inputs low.
    ///
    /// Every write is attempted; the first failure is returned.
    pub fn stop(&mut self) -> Result<(), MotorError> {
        let duty = self.set_duty(0);
        let name = self.name;
        let direction_error = |e: P::Error| MotorError::Direction {
            motor: name,
            detail: format!("{:?}", e),
        };
        let in_a = self.in_a.set_low().map_err(direction_error);
        let in_b = self.in_b.set_low().map_err(direction_error);
        duty.and(in_a).and(in_b)
    }
}
