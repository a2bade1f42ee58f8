use log::{debug, info, warn};

use super::{clamp_speed, HBridgeChannel, MotorError, DEFAULT_SPEED};
use crate::hal::{OutputPin, SetDutyCycle};

/// Wet and dry waste conveyor belts
pub struct ConveyorBank<P, E> {
    wet: HBridgeChannel<P, E>,
    dry: HBridgeChannel<P, E>,
    speed: u8,
    wet_active: bool,
    dry_active: bool,
}

impl<P, E> ConveyorBank<P, E>
where
    P: OutputPin,
    E: SetDutyCycle,
{
    pub fn new(wet: HBridgeChannel<P, E>, dry: HBridgeChannel<P, E>) -> Self {
        Self {
            wet,
            dry,
            speed: DEFAULT_SPEED,
            wet_active: false,
            dry_active: false,
        }
    }

    /// Put both belts in a known stopped state.
    pub fn begin(&mut self) -> Result<(), MotorError> {
        self.stop_all()?;
        info!("conveyor motors initialized");
        Ok(())
    }

    /// Run the wet belt forward at the bank speed.
    ///
    /// # Errors
    /// On a failed write the belt is stopped and left inactive.
    pub fn start_wet(&mut self) -> Result<(), MotorError> {
        run_belt(&mut self.wet, &mut self.wet_active, self.speed)
    }

    pub fn start_dry(&mut self) -> Result<(), MotorError> {
        run_belt(&mut self.dry, &mut self.dry_active, self.speed)
    }

    /// Stop the wet belt. It is reported inactive even if a write failed.
    pub fn stop_wet(&mut self) -> Result<(), MotorError> {
        self.wet_active = false;
        self.wet.stop()
    }

    pub fn stop_dry(&mut self) -> Result<(), MotorError> {
        self.dry_active = false;
        self.dry.stop()
    }

    /// Stop both belts. The dry belt is stopped even if the wet one failed.
    pub fn stop_all(&mut self) -> Result<(), MotorError> {
        let wet = self.stop_wet();
        let dry = self.stop_dry();
        wet.and(dry)
    }

    /// Clamp `speed` to 0-255 and apply it to the running belts.
    ///
    /// A belt whose PWM write fails is stopped. The other belt is still updated.
    pub fn set_speed(&mut self, speed: i32) -> Result<(), MotorError> {
        let speed = clamp_speed(speed);
        self.speed = speed;
        let wet = if self.wet_active {
            run_belt(&mut self.wet, &mut self.wet_active, speed)
        } else {
            Ok(())
        };
        let dry = if self.dry_active {
            run_belt(&mut self.dry, &mut self.dry_active, speed)
        } else {
            Ok(())
        };
        wet.and(dry)
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn is_wet_active(&self) -> bool {
        self.wet_active
    }

    pub fn is_dry_active(&self) -> bool {
        self.dry_active
    }
}

fn run_belt<P, E>(channel: &mut HBridgeChannel<P, E>, active: &mut bool, speed: u8) -> Result<(), MotorError>
where
    P: OutputPin,
    E: SetDutyCycle,
{
    if let Err(e) = channel.forward(speed) {
        warn!("conveyor: {}, stopping belt", e);
        let _ = channel.stop();
        *active = false;
        return Err(e);
    }
    *active = true;
    debug!("{} conveyor running at {}", channel.name(), speed);
    Ok(())
}
