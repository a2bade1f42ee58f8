use log::{debug, info, warn};

use super::{clamp_speed, HBridgeChannel, MotorError, DEFAULT_SPEED};
use crate::hal::{OutputPin, SetDutyCycle};

/// What the propellers are doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Forward,
    Backward,
    /// Port reverse, starboard forward
    Left,
    /// Port forward, starboard reverse
    Right,
}

/// Turning duty: 80 % of `speed`, truncated.
pub fn turn_duty(speed: u8) -> u8 {
    (u16::from(speed) * 4 / 5) as u8
}

impl Motion {
    pub fn duty(self, speed: u8) -> u8 {
        match self {
            Motion::Forward | Motion::Backward => speed,
            Motion::Left | Motion::Right => turn_duty(speed),
        }
    }
}

/// Port and starboard propellers, skid-steered
pub struct PropellerBank<P, E> {
    port: HBridgeChannel<P, E>,
    starboard: HBridgeChannel<P, E>,
    speed: u8,
    motion: Option<Motion>,
}

impl<P, E> PropellerBank<P, E>
where
    P: OutputPin,
    E: SetDutyCycle,
{
    pub fn new(port: HBridgeChannel<P, E>, starboard: HBridgeChannel<P, E>) -> Self {
        Self {
            port,
            starboard,
            speed: DEFAULT_SPEED,
            motion: None,
        }
    }

    pub fn begin(&mut self) -> Result<(), MotorError> {
        self.stop()?;
        info!("propeller motors initialized");
        Ok(())
    }

    fn drive(&mut self, motion: Motion) -> Result<(), MotorError> {
        let duty = motion.duty(self.speed);
        if let Err(e) = self.write_motion(motion, duty) {
            self.halt(&e);
            return Err(e);
        }
        self.motion = Some(motion);
        debug!("propellers: {:?} at duty {}", motion, duty);
        Ok(())
    }

    fn write_motion(&mut self, motion: Motion, duty: u8) -> Result<(), MotorError> {
        match motion {
            Motion::Forward => {
                self.port.forward(duty)?;
                self.starboard.forward(duty)?;
            }
            Motion::Backward => {
                self.port.reverse(duty)?;
                self.starboard.reverse(duty)?;
            }
            Motion::Left => {
                self.port.reverse(duty)?;
                self.starboard.forward(duty)?;
            }
            Motion::Right => {
                self.port.forward(duty)?;
                self.starboard.reverse(duty)?;
            }
        }
        Ok(())
    }

    /// Best-effort stop of both channels after a failed write.
    fn halt(&mut self, cause: &MotorError) {
        warn!("propellers: {}, stopping both motors", cause);
        let _ = self.port.stop();
        let _ = self.starboard.stop();
        self.motion = None;
    }

    pub fn move_forward(&mut self) -> Result<(), MotorError> {
        self.drive(Motion::Forward)
    }

    pub fn move_backward(&mut self) -> Result<(), MotorError> {
        self.drive(Motion::Backward)
    }

    pub fn move_left(&mut self) -> Result<(), MotorError> {
        self.drive(Motion::Left)
    }

    pub fn move_right(&mut self) -> Result<(), MotorError> {
        self.drive(Motion::Right)
    }

    /// Stop both propellers.
    ///
    /// Starboard is stopped even if port failed, and the bank is reported
    /// inactive either way.
    pub fn stop(&mut self) -> Result<(), MotorError> {
        let port = self.port.stop();
        let starboard = self.starboard.stop();
        self.motion = None;
        port.and(starboard)
    }

    /// Clamp `speed` to 0-255 and, while moving, write it to both enables.
    ///
    /// A turn started afterwards runs at 80 % of the new speed.
    ///
    /// # Errors
    /// A failed PWM write stops both motors.
    pub fn set_speed(&mut self, speed: i32) -> Result<(), MotorError> {
        let speed = clamp_speed(speed);
        self.speed = speed;
        if self.motion.is_some() {
            let written = self.port.set_duty(speed).and_then(|_| self.starboard.set_duty(speed));
            if let Err(e) = written {
                self.halt(&e);
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn is_active(&self) -> bool {
        self.motion.is_some()
    }

    pub fn motion(&self) -> Option<Motion> {
        self.motion
    }
}
