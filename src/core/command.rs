/// Dashboard control command parsing
///
/// Commands arrive as the JSON objects the dashboard publishes
/// (`{"action":"forward"}`, `{"action":"forward","speed":60}`,
/// `{"motor_speed":40}`, `{"mode":"autonomous"}`) or as bare tokens typed on a
/// console (`forward`, `/stop`). Speeds are percentages.
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::hal::{OutputPin, SetDutyCycle};
use crate::hardware::motors::{ConveyorBank, Motion, MotorError, PropellerBank, MAX_SPEED};

/// Navigation mode toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    Manual,
    Autonomous,
}

/// A parsed control command
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Propellers, optionally at a new speed (PWM)
    Drive { motion: Motion, speed: Option<u8> },
    Stop,
    StartWet,
    StartDry,
    StopWet,
    StopDry,
    StopConveyors,
    /// Propeller speed (PWM) without changing the motion
    SetSpeed(u8),
    SetMode(NavigationMode),
    /// Well-formed but not handled by the motor banks
    Unsupported(String),
}

/// Command parse errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("command has no action, motor_speed or mode")]
    MissingAction,

    #[error("speed must be a percentage between 0 and 100, got {0}")]
    InvalidSpeed(String),
}

#[derive(Debug, Deserialize)]
struct CommandMessage {
    action: Option<String>,
    speed: Option<Value>,
    motor_speed: Option<Value>,
    mode: Option<String>,
}

/// Percent (0-100) to PWM duty (0-255), rounded.
///
/// # Examples
/// ```
/// use boat_peripherals::core::command::percent_to_pwm;
///
/// assert_eq!(percent_to_pwm(0.0), Some(0));
/// assert_eq!(percent_to_pwm(50.0), Some(128));
/// assert_eq!(percent_to_pwm(100.0), Some(255));
/// assert_eq!(percent_to_pwm(101.0), None);
/// ```
pub fn percent_to_pwm(percent: f64) -> Option<u8> {
    if !(0.0..=100.0).contains(&percent) {
        return None;
    }
    Some((percent * f64::from(MAX_SPEED) / 100.0).round() as u8)
}

fn parse_speed(value: &Value) -> Result<u8, CommandParseError> {
    value
        .as_f64()
        .and_then(percent_to_pwm)
        .ok_or_else(|| {
            warn!("Invalid speed: {}", value);
            CommandParseError::InvalidSpeed(value.to_string())
        })
}

/// Parse a command string.
///
/// Unknown actions are not an error: they come back as
/// [`ControlCommand::Unsupported`] so the caller can report them.
///
/// # Arguments
/// - `command_str`: a JSON object (`{"action": "left", "speed": 40}`) or a bare token (`forward`, `/stop`)
///
/// # Errors
/// Empty input, malformed JSON, an object without `action`, `motor_speed` or
/// `mode`, or a speed outside 0-100
///
/// # Examples
/// ```
/// use boat_peripherals::core::{parse_command, ControlCommand};
/// use boat_peripherals::hardware::motors::Motion;
///
/// assert_eq!(
///     parse_command(r#"{"action": "left", "speed": 40}"#),
///     Ok(ControlCommand::Drive { motion: Motion::Left, speed: Some(102) })
/// );
/// assert_eq!(parse_command("/stop"), Ok(ControlCommand::Stop));
/// assert!(parse_command("  ").is_err());
/// ```
pub fn parse_command(command_str: &str) -> Result<ControlCommand, CommandParseError> {
    debug!("Parsing command: '{}'", command_str);

    let trimmed = command_str.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    if trimmed.starts_with('{') {
        parse_json_command(trimmed)
    } else {
        Ok(parse_action(trimmed.trim_start_matches('/'), None))
    }
}

fn parse_json_command(json: &str) -> Result<ControlCommand, CommandParseError> {
    let message: CommandMessage =
        serde_json::from_str(json).map_err(|e| CommandParseError::InvalidJson(e.to_string()))?;

    if let Some(action) = message.action {
        let speed = message.speed.as_ref().map(parse_speed).transpose()?;
        return Ok(parse_action(action.trim(), speed));
    }
    if let Some(value) = message.motor_speed {
        return Ok(ControlCommand::SetSpeed(parse_speed(&value)?));
    }
    if let Some(mode) = message.mode {
        return Ok(match mode.trim().to_ascii_lowercase().as_str() {
            "autonomous" => ControlCommand::SetMode(NavigationMode::Autonomous),
            "manual" => ControlCommand::SetMode(NavigationMode::Manual),
            _ => {
                warn!("Unknown mode: '{}'", mode);
                ControlCommand::Unsupported(format!("mode:{}", mode))
            }
        });
    }
    Err(CommandParseError::MissingAction)
}

fn parse_action(action: &str, speed: Option<u8>) -> ControlCommand {
    let drive = |motion| ControlCommand::Drive { motion, speed };
    match action.to_ascii_lowercase().as_str() {
        "forward" => drive(Motion::Forward),
        "backward" | "back" => drive(Motion::Backward),
        "left" => drive(Motion::Left),
        "right" => drive(Motion::Right),
        "stop" => ControlCommand::Stop,
        "start_wet" => ControlCommand::StartWet,
        "start_dry" => ControlCommand::StartDry,
        "stop_wet" => ControlCommand::StopWet,
        "stop_dry" => ControlCommand::StopDry,
        "stop_conveyors" => ControlCommand::StopConveyors,
        _ => {
            warn!("Unknown action: '{}'", action);
            ControlCommand::Unsupported(action.to_string())
        }
    }
}

impl ControlCommand {
    /// Drive the motor banks.
    ///
    /// A new speed is applied before the motion starts. Mode changes and
    /// unsupported commands leave the motors untouched.
    pub fn apply<P, E>(
        &self,
        conveyors: &mut ConveyorBank<P, E>,
        propellers: &mut PropellerBank<P, E>,
    ) -> Result<(), MotorError>
    where
        P: OutputPin,
        E: SetDutyCycle,
    {
        match self {
            ControlCommand::Drive { motion, speed } => {
                if let Some(speed) = speed {
                    propellers.set_speed(i32::from(*speed))?;
                }
                match motion {
                    Motion::Forward => propellers.move_forward(),
                    Motion::Backward => propellers.move_backward(),
                    Motion::Left => propellers.move_left(),
                    Motion::Right => propellers.move_right(),
                }
            }
            ControlCommand::Stop => propellers.stop(),
            ControlCommand::StartWet => conveyors.start_wet(),
            ControlCommand::StartDry => conveyors.start_dry(),
            ControlCommand::StopWet => conveyors.stop_wet(),
            ControlCommand::StopDry => conveyors.stop_dry(),
            ControlCommand::StopConveyors => conveyors.stop_all(),
            ControlCommand::SetSpeed(speed) => propellers.set_speed(i32::from(*speed)),
            ControlCommand::SetMode(mode) => {
                info!("navigation mode requested: {:?}", mode);
                Ok(())
            }
            ControlCommand::Unsupported(action) => {
                warn!("ignoring unsupported command '{}'", action);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_action() {
        assert_eq!(
            parse_command(r#"{"action":"forward"}"#),
            Ok(ControlCommand::Drive {
                motion: Motion::Forward,
                speed: None
            })
        );
        assert_eq!(parse_command(r#"{"action":"stop_dry"}"#), Ok(ControlCommand::StopDry));
    }

    #[test]
    fn test_parse_action_with_speed() {
        assert_eq!(
            parse_command(r#"{"action":"left","speed":50}"#),
            Ok(ControlCommand::Drive {
                motion: Motion::Left,
                speed: Some(128)
            })
        );
    }

    #[test]
    fn test_parse_motor_speed() {
        assert_eq!(parse_command(r#"{"motor_speed":100}"#), Ok(ControlCommand::SetSpeed(255)));
        assert_eq!(parse_command(r#"{"motor_speed":0}"#), Ok(ControlCommand::SetSpeed(0)));
        assert!(matches!(
            parse_command(r#"{"motor_speed":150}"#),
            Err(CommandParseError::InvalidSpeed(_))
        ));
        assert!(matches!(
            parse_command(r#"{"motor_speed":"fast"}"#),
            Err(CommandParseError::InvalidSpeed(_))
        ));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(
            parse_command(r#"{"mode":"autonomous"}"#),
            Ok(ControlCommand::SetMode(NavigationMode::Autonomous))
        );
        assert_eq!(
            parse_command(r#"{"mode":"Manual"}"#),
            Ok(ControlCommand::SetMode(NavigationMode::Manual))
        );
    }

    #[test]
    fn test_parse_bare_tokens() {
        assert_eq!(parse_command("  /stop \n"), Ok(ControlCommand::Stop));
        assert_eq!(parse_command("start_wet"), Ok(ControlCommand::StartWet));
        assert_eq!(
            parse_command("BACKWARD"),
            Ok(ControlCommand::Drive {
                motion: Motion::Backward,
                speed: None
            })
        );
    }

    #[test]
    fn test_unknown_action_is_unsupported() {
        assert_eq!(
            parse_command(r#"{"action":"return_home"}"#),
            Ok(ControlCommand::Unsupported("return_home".to_string()))
        );
        assert_eq!(
            parse_command("open_flap"),
            Ok(ControlCommand::Unsupported("open_flap".to_string()))
        );
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(parse_command("   "), Err(CommandParseError::Empty));
        assert!(matches!(parse_command("{action:"), Err(CommandParseError::InvalidJson(_))));
        assert_eq!(parse_command(r#"{"speed":20}"#), Err(CommandParseError::MissingAction));
    }
}
