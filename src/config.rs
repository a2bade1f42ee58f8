use log::error;

use crate::core::telemetry::AlertThresholds;
use crate::hardware::gas_sensor::DEFAULT_GAS_CALIBRATION;
use crate::hardware::load_cell::DEFAULT_LOAD_CELL_CALIBRATION;
use crate::hardware::moisture_sensor::{CALIBRATION_LIMIT, DEFAULT_DRY_VALUE, DEFAULT_WET_VALUE};
use crate::hardware::pins::{
    AnalogMuxPins, BoardPins, CompassBus, ConveyorPins, GpsPins, LoadCellPins, MotorChannelPins,
    OneWirePins, PinConfigError, PropellerPins, UltrasonicPins,
};
use crate::hardware::tds_sensor::DEFAULT_TDS_CALIBRATION;

/// GPIO value meaning "not connected" in `cfg.toml`
pub const UNUSED_PIN: u8 = 255;

/// Build-time settings
///
/// Read from the `[boat-peripherals]` table of `cfg.toml` when the crate is
/// compiled. Missing keys keep the defaults below.
#[toml_cfg::toml_config]
pub struct Config {
    // Motor driver pins (L298N)
    #[default(25)]
    conveyor_wet_in1: u8,
    #[default(26)]
    conveyor_wet_in2: u8,
    #[default(27)]
    conveyor_wet_enable: u8,
    #[default(14)]
    conveyor_dry_in3: u8,
    #[default(12)]
    conveyor_dry_in4: u8,
    #[default(13)]
    conveyor_dry_enable: u8,
    #[default(32)]
    propeller_port_in1: u8,
    #[default(33)]
    propeller_port_in2: u8,
    #[default(15)]
    propeller_port_enable: u8,
    #[default(16)]
    propeller_starboard_in3: u8,
    #[default(17)]
    propeller_starboard_in4: u8,
    #[default(2)]
    propeller_starboard_enable: u8,

    // Sensor pins
    #[default(5)]
    ultrasonic_trigger: u8,
    #[default(34)]
    ultrasonic_echo: u8,
    #[default(35)]
    hx711_data: u8,
    #[default(23)]
    hx711_clock: u8,
    #[default(39)]
    gps_rx: u8,
    #[default(255)]
    gps_tx: u8,
    #[default(21)]
    compass_sda: u8,
    #[default(22)]
    compass_scl: u8,
    #[default(0x1E)]
    compass_address: u8,
    #[default(4)]
    one_wire_data: u8,
    #[default(18)]
    mux_s0: u8,
    #[default(19)]
    mux_s1: u8,
    #[default(0)]
    mux_s2: u8,
    #[default(255)]
    mux_s3: u8,
    #[default(36)]
    mux_adc: u8,

    // Calibration
    #[default(200.0)]
    mq135_calibration: f32,
    #[default(200.0)]
    mq2_calibration: f32,
    #[default(2.0)]
    tds_calibration: f32,
    #[default(0)]
    moisture_dry_raw: u16,
    #[default(1024)]
    moisture_wet_raw: u16,
    #[default(2280.0)]
    load_cell_calibration: f32,

    // Behaviour
    #[default(25.0)]
    obstacle_threshold_cm: f32,
    #[default(4500.0)]
    bin_full_grams: f32,
    #[default(400.0)]
    pollution_mq135_ppm: f32,
    #[default(30000)]
    echo_timeout_us: u32,
    #[default(1000)]
    poll_interval_ms: u32,
    #[default(9600)]
    gps_baud: u32,
    #[default(255)]
    motor_speed: u16,

    // Uplink, carried for the orchestrator
    #[default("")]
    wifi_ssid: &'static str,
    #[default("")]
    wifi_password: &'static str,
    #[default("")]
    upload_url: &'static str,
    #[default("")]
    mqtt_broker: &'static str,
    #[default(1883)]
    mqtt_port: u16,
    #[default("pavitrax/boat1/telemetry")]
    mqtt_telemetry_topic: &'static str,
    #[default("pavitrax/boat1/commands")]
    mqtt_command_topic: &'static str,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("pin assignment: {0}")]
    Pins(#[from] PinConfigError),

    #[error("{name} calibration factor must be a positive number, got {value}")]
    InvalidCalibration { name: &'static str, value: f32 },

    #[error("moisture endpoints must be distinct and at most {limit}: dry {dry}, wet {wet}")]
    InvalidMoistureCalibration { dry: u16, wet: u16, limit: u16 },

    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },

    #[error("motor_speed must be 0-255, got {0}")]
    InvalidMotorSpeed(u16),

    #[error("mqtt_port must be non-zero when mqtt_broker is set")]
    InvalidMqttPort,
}

/// Per-sensor calibration defaults
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub mq135: f32,
    pub mq2: f32,
    pub tds: f32,
    pub moisture_dry: u16,
    pub moisture_wet: u16,
    /// Raw counts per gram
    pub load_cell: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            mq135: DEFAULT_GAS_CALIBRATION,
            mq2: DEFAULT_GAS_CALIBRATION,
            tds: DEFAULT_TDS_CALIBRATION,
            moisture_dry: DEFAULT_DRY_VALUE,
            moisture_wet: DEFAULT_WET_VALUE,
            load_cell: DEFAULT_LOAD_CELL_CALIBRATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub broker: String,
    pub port: u16,
    pub telemetry_topic: String,
    pub command_topic: String,
}

/// Validated application settings
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub pins: BoardPins,
    pub calibration: Calibration,
    pub obstacle_threshold_cm: f32,
    /// Bin weight that raises a `bin_full` alert (g)
    pub bin_full_grams: f32,
    /// MQ135 reading that raises a `pollution` alert (ppm)
    pub pollution_mq135_ppm: f32,
    pub echo_timeout_us: u32,
    pub poll_interval_ms: u32,
    pub gps_baud: u32,
    /// Initial PWM speed of both motor banks
    pub motor_speed: u8,
    pub wifi_ssid: Option<String>,
    pub wifi_password: String,
    /// HTTP endpoint for sensor uploads, `None` if not configured
    pub upload_url: Option<String>,
    /// `None` when no broker is configured
    pub mqtt: Option<MqttSettings>,
}

fn optional_pin(gpio: u8) -> Option<u8> {
    (gpio != UNUSED_PIN).then_some(gpio)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn check_factor(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidCalibration { name, value });
    }
    Ok(value)
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn check_positive(name: &'static str, positive: bool) -> Result<(), ConfigError> {
    if positive {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name })
    }
}

impl Config {
    fn board_pins(&self) -> BoardPins {
        let select = [self.mux_s0, self.mux_s1, self.mux_s2, self.mux_s3]
            .into_iter()
            .filter_map(optional_pin)
            .collect();

        BoardPins {
            conveyor: ConveyorPins {
                wet: MotorChannelPins::new(
                    self.conveyor_wet_in1,
                    self.conveyor_wet_in2,
                    self.conveyor_wet_enable,
                ),
                dry: MotorChannelPins::new(
                    self.conveyor_dry_in3,
                    self.conveyor_dry_in4,
                    self.conveyor_dry_enable,
                ),
            },
            propeller: PropellerPins {
                port: MotorChannelPins::new(
                    self.propeller_port_in1,
                    self.propeller_port_in2,
                    self.propeller_port_enable,
                ),
                starboard: MotorChannelPins::new(
                    self.propeller_starboard_in3,
                    self.propeller_starboard_in4,
                    self.propeller_starboard_enable,
                ),
            },
            ultrasonic: UltrasonicPins {
                trigger: self.ultrasonic_trigger,
                echo: self.ultrasonic_echo,
            },
            load_cell: LoadCellPins {
                data: self.hx711_data,
                clock: self.hx711_clock,
            },
            gps: GpsPins {
                rx: self.gps_rx,
                tx: optional_pin(self.gps_tx),
            },
            compass: CompassBus {
                sda: self.compass_sda,
                scl: self.compass_scl,
                address: self.compass_address,
            },
            one_wire: OneWirePins {
                data: self.one_wire_data,
            },
            mux: AnalogMuxPins {
                select,
                adc: self.mux_adc,
            },
        }
    }
}

impl AppConfig {
    /// Load the settings compiled in from `cfg.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_config(&CONFIG).inspect_err(|e| error!("invalid cfg.toml: {}", e))
    }

    /// Convert and validate raw settings.
    ///
    /// # Arguments
    /// - `config`: settings as written in `cfg.toml`
    ///
    /// # Returns
    /// The typed settings, with unused pins and empty uplink fields mapped to `None`
    ///
    /// # Errors
    /// Pin conflicts, calibration factors that cannot be used, non-positive
    /// thresholds or timings, a motor speed above 255, or a broker without a port
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let pins = config.board_pins();
        pins.validate()?;

        let calibration = Calibration {
            mq135: check_factor("mq135", config.mq135_calibration)?,
            mq2: check_factor("mq2", config.mq2_calibration)?,
            tds: check_factor("tds", config.tds_calibration)?,
            moisture_dry: config.moisture_dry_raw,
            moisture_wet: config.moisture_wet_raw,
            // a cell mounted upside down is calibrated with a negative factor
            load_cell: match config.load_cell_calibration {
                v if v.is_finite() && v != 0.0 => v,
                value => {
                    return Err(ConfigError::InvalidCalibration {
                        name: "load cell",
                        value,
                    })
                }
            },
        };
        let (dry, wet) = (calibration.moisture_dry, calibration.moisture_wet);
        if dry > CALIBRATION_LIMIT || wet > CALIBRATION_LIMIT || dry == wet {
            return Err(ConfigError::InvalidMoistureCalibration {
                dry,
                wet,
                limit: CALIBRATION_LIMIT,
            });
        }

        check_positive("obstacle_threshold_cm", is_positive(config.obstacle_threshold_cm))?;
        check_positive("bin_full_grams", is_positive(config.bin_full_grams))?;
        check_positive("pollution_mq135_ppm", is_positive(config.pollution_mq135_ppm))?;
        check_positive("echo_timeout_us", config.echo_timeout_us > 0)?;
        check_positive("poll_interval_ms", config.poll_interval_ms > 0)?;
        check_positive("gps_baud", config.gps_baud > 0)?;

        let motor_speed = u8::try_from(config.motor_speed)
            .map_err(|_| ConfigError::InvalidMotorSpeed(config.motor_speed))?;

        let mqtt = match non_empty(config.mqtt_broker) {
            Some(_) if config.mqtt_port == 0 => return Err(ConfigError::InvalidMqttPort),
            Some(broker) => Some(MqttSettings {
                broker,
                port: config.mqtt_port,
                telemetry_topic: config.mqtt_telemetry_topic.to_string(),
                command_topic: config.mqtt_command_topic.to_string(),
            }),
            None => None,
        };

        Ok(Self {
            pins,
            calibration,
            obstacle_threshold_cm: config.obstacle_threshold_cm,
            bin_full_grams: config.bin_full_grams,
            pollution_mq135_ppm: config.pollution_mq135_ppm,
            echo_timeout_us: config.echo_timeout_us,
            poll_interval_ms: config.poll_interval_ms,
            gps_baud: config.gps_baud,
            motor_speed,
            wifi_ssid: non_empty(config.wifi_ssid),
            wifi_password: config.wifi_password.to_string(),
            upload_url: non_empty(config.upload_url),
            mqtt,
        })
    }

    /// Limits for the bin full, obstacle and pollution alerts
    pub fn alert_thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            bin_full_grams: self.bin_full_grams,
            obstacle_cm: self.obstacle_threshold_cm,
            pollution_mq135_ppm: self.pollution_mq135_ppm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: Config = Config {
        conveyor_wet_in1: 25,
        conveyor_wet_in2: 26,
        conveyor_wet_enable: 27,
        conveyor_dry_in3: 14,
        conveyor_dry_in4: 12,
        conveyor_dry_enable: 13,
        propeller_port_in1: 32,
        propeller_port_in2: 33,
        propeller_port_enable: 15,
        propeller_starboard_in3: 16,
        propeller_starboard_in4: 17,
        propeller_starboard_enable: 2,
        ultrasonic_trigger: 5,
        ultrasonic_echo: 34,
        hx711_data: 35,
        hx711_clock: 23,
        gps_rx: 39,
        gps_tx: UNUSED_PIN,
        compass_sda: 21,
        compass_scl: 22,
        compass_address: 0x1E,
        one_wire_data: 4,
        mux_s0: 18,
        mux_s1: 19,
        mux_s2: 0,
        mux_s3: UNUSED_PIN,
        mux_adc: 36,
        mq135_calibration: 200.0,
        mq2_calibration: 200.0,
        tds_calibration: 2.0,
        moisture_dry_raw: 0,
        moisture_wet_raw: 1024,
        load_cell_calibration: 2280.0,
        obstacle_threshold_cm: 25.0,
        bin_full_grams: 4500.0,
        pollution_mq135_ppm: 400.0,
        echo_timeout_us: 30000,
        poll_interval_ms: 1000,
        gps_baud: 9600,
        motor_speed: 255,
        wifi_ssid: "",
        wifi_password: "",
        upload_url: "",
        mqtt_broker: "",
        mqtt_port: 1883,
        mqtt_telemetry_topic: "pavitrax/boat1/telemetry",
        mqtt_command_topic: "pavitrax/boat1/commands",
    };

    #[test]
    fn test_defaults_match_board_layout() {
        let config = AppConfig::from_config(&DEFAULTS).unwrap();
        assert_eq!(config.pins, BoardPins::default());
        assert_eq!(config.calibration, Calibration::default());
        assert_eq!(config.motor_speed, 255);
        assert_eq!(config.upload_url, None);
        assert_eq!(config.mqtt, None);
        assert_eq!(config.wifi_ssid, None);
        assert_eq!(config.alert_thresholds(), AlertThresholds::default());
    }

    #[test]
    fn test_pin_conflict_is_rejected() {
        let config = Config {
            hx711_clock: 25,
            ..DEFAULTS
        };
        assert!(matches!(
            AppConfig::from_config(&config),
            Err(ConfigError::Pins(PinConfigError::Duplicate { gpio: 25, .. }))
        ));

        let config = Config {
            ultrasonic_trigger: 34,
            ultrasonic_echo: 5,
            ..DEFAULTS
        };
        assert!(matches!(
            AppConfig::from_config(&config),
            Err(ConfigError::Pins(PinConfigError::InputOnly { .. }))
        ));
    }

    #[test]
    fn test_optional_pins() {
        let config = Config {
            gps_tx: 1,
            mux_s3: 3,
            ..DEFAULTS
        };
        let config = AppConfig::from_config(&config).unwrap();
        assert_eq!(config.pins.gps.tx, Some(1));
        assert_eq!(config.pins.mux.select, vec![18, 19, 0, 3]);
    }

    #[test]
    fn test_calibration_checks() {
        let config = Config {
            tds_calibration: 0.0,
            ..DEFAULTS
        };
        assert_eq!(
            AppConfig::from_config(&config),
            Err(ConfigError::InvalidCalibration { name: "tds", value: 0.0 })
        );

        let config = Config {
            load_cell_calibration: -2280.0,
            ..DEFAULTS
        };
        assert_eq!(AppConfig::from_config(&config).unwrap().calibration.load_cell, -2280.0);

        let config = Config {
            moisture_wet_raw: 2000,
            ..DEFAULTS
        };
        assert!(matches!(
            AppConfig::from_config(&config),
            Err(ConfigError::InvalidMoistureCalibration { .. })
        ));
    }

    #[test]
    fn test_behaviour_checks() {
        let config = Config {
            motor_speed: 300,
            ..DEFAULTS
        };
        assert_eq!(AppConfig::from_config(&config), Err(ConfigError::InvalidMotorSpeed(300)));

        let config = Config {
            poll_interval_ms: 0,
            ..DEFAULTS
        };
        assert_eq!(
            AppConfig::from_config(&config),
            Err(ConfigError::NotPositive { name: "poll_interval_ms" })
        );
    }

    #[test]
    fn test_alert_thresholds() {
        let config = Config {
            bin_full_grams: 3000.0,
            obstacle_threshold_cm: 40.0,
            ..DEFAULTS
        };
        let thresholds = AppConfig::from_config(&config).unwrap().alert_thresholds();
        assert_eq!(thresholds.bin_full_grams, 3000.0);
        assert_eq!(thresholds.obstacle_cm, 40.0);
        assert_eq!(thresholds.pollution_mq135_ppm, 400.0);

        let config = Config {
            pollution_mq135_ppm: f32::NAN,
            ..DEFAULTS
        };
        assert_eq!(
            AppConfig::from_config(&config),
            Err(ConfigError::NotPositive { name: "pollution_mq135_ppm" })
        );

        let config = Config {
            bin_full_grams: 0.0,
            ..DEFAULTS
        };
        assert_eq!(
            AppConfig::from_config(&config),
            Err(ConfigError::NotPositive { name: "bin_full_grams" })
        );
    }

    #[test]
    fn test_uplink_settings() {
        let config = Config {
            upload_url: "http://192.168.1.100:4000/api/sensors/upload",
            mqtt_broker: " 192.168.1.100 ",
            ..DEFAULTS
        };
        let config = AppConfig::from_config(&config).unwrap();
        assert_eq!(
            config.upload_url.as_deref(),
            Some("http://192.168.1.100:4000/api/sensors/upload")
        );
        let mqtt = config.mqtt.unwrap();
        assert_eq!(mqtt.broker, "192.168.1.100");
        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.command_topic, "pavitrax/boat1/commands");

        let config = Config {
            mqtt_broker: "broker.local",
            mqtt_port: 0,
            ..DEFAULTS
        };
        assert_eq!(AppConfig::from_config(&config), Err(ConfigError::InvalidMqttPort));
    }
}
