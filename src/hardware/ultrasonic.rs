use log::{debug, info, warn};

use super::error::{hardware, SensorError, SensorResult};
use crate::hal::{DelayNs, OutputPin, PinState, PulseInput};

/// Speed of sound in cm/us at roughly 20 °C
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.034;
/// Longest echo waited for (about 5 m round trip)
pub const DEFAULT_ECHO_TIMEOUT_US: u32 = 30_000;
pub const DEFAULT_OBSTACLE_THRESHOLD_CM: f32 = 25.0;

/// Distance in cm for a round-trip echo of `echo_us`.
pub fn echo_to_cm(echo_us: u32) -> f32 {
    echo_us as f32 * SPEED_OF_SOUND_CM_PER_US / 2.0
}

/// A zero distance means "no echo" and is never an obstacle.
pub fn is_obstacle(distance_cm: f32, threshold_cm: f32) -> bool {
    distance_cm > 0.0 && distance_cm < threshold_cm
}

/// HC-SR04 style ultrasonic ranger
pub struct Ultrasonic<T, E, D> {
    trigger: T,
    echo: E,
    delay: D,
    echo_timeout_us: u32,
}

impl<T, E, D> Ultrasonic<T, E, D>
where
    T: OutputPin,
    E: PulseInput,
    D: DelayNs,
{
    pub fn new(trigger: T, echo: E, delay: D) -> Self {
        Self {
            trigger,
            echo,
            delay,
            echo_timeout_us: DEFAULT_ECHO_TIMEOUT_US,
        }
    }

    pub fn with_echo_timeout(mut self, timeout_us: u32) -> Self {
        self.echo_timeout_us = timeout_us;
        self
    }

    pub fn begin(&mut self) -> SensorResult<()> {
        self.trigger.set_low().map_err(hardware)?;
        info!("ultrasonic sensor ready (echo timeout {} us)", self.echo_timeout_us);
        Ok(())
    }

    fn fire(&mut self) -> SensorResult<()> {
        self.trigger.set_low().map_err(hardware)?;
        self.delay.delay_us(2);
        self.trigger.set_high().map_err(hardware)?;
        self.delay.delay_us(10);
        self.trigger.set_low().map_err(hardware)
    }

    /// Distance to the nearest reflecting surface.
    ///
    /// # Errors
    /// `NoEcho` when nothing comes back before the echo timeout.
    pub fn try_read_distance_cm(&mut self) -> SensorResult<f32> {
        self.fire()?;
        let echo_us = self
            .echo
            .pulse_in(PinState::High, self.echo_timeout_us)
            .map_err(hardware)?
            .ok_or(SensorError::NoEcho(self.echo_timeout_us))?;
        let distance = echo_to_cm(echo_us);
        debug!("ultrasonic: echo {} us -> {:.1} cm", echo_us, distance);
        Ok(distance)
    }

    /// Distance in cm, 0.0 when there was no echo.
    pub fn read_distance_cm(&mut self) -> f32 {
        match self.try_read_distance_cm() {
            Ok(distance) => distance,
            Err(SensorError::NoEcho(_)) => {
                debug!("ultrasonic: no echo, reporting 0 cm");
                0.0
            }
            Err(e) => {
                warn!("ultrasonic read failed: {}, reporting 0 cm", e);
                0.0
            }
        }
    }

    /// Take a reading and compare it against `threshold_cm`.
    ///
    /// # Returns
    /// `true` for an echo closer than the threshold. A failed reading counts as
    /// 0 cm and never reports an obstacle.
    pub fn is_obstacle_detected(&mut self, threshold_cm: f32) -> bool {
        is_obstacle(self.read_distance_cm(), threshold_cm)
    }

    pub fn echo_timeout_us(&self) -> u32 {
        self.echo_timeout_us
    }
}
