/// GPIO assignments for the boat's ESP32 board
///
/// Pins are plain GPIO numbers here; `hal::esp` turns them into drivers at
/// start-up. `BoardPins::validate` catches wiring mistakes before any pin is
/// touched.
use std::ops::RangeInclusive;

/// Highest GPIO number on the ESP32
pub const MAX_GPIO: u8 = 39;
/// Numbers inside `0..=MAX_GPIO` that the ESP32 does not bond out
pub const MISSING_GPIOS: [u8; 6] = [20, 24, 28, 29, 30, 31];
/// GPIOs without output drivers
pub const INPUT_ONLY_GPIOS: RangeInclusive<u8> = 34..=39;
/// GPIOs wired to the SPI flash on every module
pub const FLASH_GPIOS: RangeInclusive<u8> = 6..=11;
/// GPIOs routed to ADC1 (ADC2 is unusable while WiFi is up)
pub const ADC1_GPIOS: RangeInclusive<u8> = 32..=39;

/// Default HMC5883L address
pub const COMPASS_I2C_ADDRESS: u8 = 0x1E;

pub const COMPASS_SDA: u8 = 21;
pub const COMPASS_SCL: u8 = 22;
pub const ONE_WIRE_DATA: u8 = 4;
pub const GPS_RX: u8 = 39;
pub const ULTRASONIC_TRIGGER: u8 = 5;
pub const ULTRASONIC_ECHO: u8 = 34;
pub const LOAD_CELL_DATA: u8 = 35;
pub const LOAD_CELL_CLOCK: u8 = 23;
pub const MUX_SELECT: [u8; 3] = [18, 19, 0];
pub const MUX_ADC: u8 = 36;

/// Channels of the analog multiplexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxChannel {
    Mq135 = 0,
    Mq2 = 1,
    Tds = 2,
    MoistureDryBin = 3,
    MoistureWetBin = 4,
}

impl MuxChannel {
    pub const ALL: [MuxChannel; 5] = [
        MuxChannel::Mq135,
        MuxChannel::Mq2,
        MuxChannel::Tds,
        MuxChannel::MoistureDryBin,
        MuxChannel::MoistureWetBin,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// One L298N channel: two direction inputs and the PWM enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorChannelPins {
    pub in_a: u8,
    pub in_b: u8,
    pub enable: u8,
}

impl MotorChannelPins {
    pub const fn new(in_a: u8, in_b: u8, enable: u8) -> Self {
        Self { in_a, in_b, enable }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConveyorPins {
    pub wet: MotorChannelPins,
    pub dry: MotorChannelPins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropellerPins {
    pub port: MotorChannelPins,
    pub starboard: MotorChannelPins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UltrasonicPins {
    pub trigger: u8,
    pub echo: u8,
}

/// HX711 wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadCellPins {
    pub data: u8,
    pub clock: u8,
}

/// GPS UART. The module is receive-only unless `tx` is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsPins {
    pub rx: u8,
    pub tx: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompassBus {
    pub sda: u8,
    pub scl: u8,
    pub address: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneWirePins {
    pub data: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalogMuxPins {
    /// Select lines, least significant bit first
    pub select: Vec<u8>,
    pub adc: u8,
}

/// Pin configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinConfigError {
    #[error("{role}: GPIO{gpio} does not exist")]
    OutOfRange { role: &'static str, gpio: u8 },

    #[error("{role}: GPIO{gpio} is input-only and cannot drive an output")]
    InputOnly { role: &'static str, gpio: u8 },

    #[error("{role}: GPIO{gpio} is reserved for the SPI flash")]
    FlashPin { role: &'static str, gpio: u8 },

    #[error("{role}: GPIO{gpio} is not an ADC1 input")]
    NotAdcCapable { role: &'static str, gpio: u8 },

    #[error("GPIO{gpio} is assigned to both {first} and {second}")]
    Duplicate {
        gpio: u8,
        first: &'static str,
        second: &'static str,
    },

    #[error("I2C address 0x{0:02X} is outside 0x08..=0x77")]
    InvalidI2cAddress(u8),

    #[error("analog multiplexer needs 1 to 4 select lines, got {0}")]
    SelectLineCount(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Use {
    Input,
    /// Output or open-drain
    Output,
}

/// Every pin the boat uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardPins {
    pub conveyor: ConveyorPins,
    pub propeller: PropellerPins,
    pub ultrasonic: UltrasonicPins,
    pub load_cell: LoadCellPins,
    pub gps: GpsPins,
    pub compass: CompassBus,
    pub one_wire: OneWirePins,
    pub mux: AnalogMuxPins,
}

impl Default for BoardPins {
    fn default() -> Self {
        Self {
            conveyor: ConveyorPins {
                wet: MotorChannelPins::new(25, 26, 27),
                dry: MotorChannelPins::new(14, 12, 13),
            },
            propeller: PropellerPins {
                port: MotorChannelPins::new(32, 33, 15),
                starboard: MotorChannelPins::new(16, 17, 2),
            },
            ultrasonic: UltrasonicPins {
                trigger: ULTRASONIC_TRIGGER,
                echo: ULTRASONIC_ECHO,
            },
            load_cell: LoadCellPins {
                data: LOAD_CELL_DATA,
                clock: LOAD_CELL_CLOCK,
            },
            gps: GpsPins { rx: GPS_RX, tx: None },
            compass: CompassBus {
                sda: COMPASS_SDA,
                scl: COMPASS_SCL,
                address: COMPASS_I2C_ADDRESS,
            },
            one_wire: OneWirePins { data: ONE_WIRE_DATA },
            mux: AnalogMuxPins {
                select: MUX_SELECT.to_vec(),
                adc: MUX_ADC,
            },
        }
    }
}

impl BoardPins {
    fn assignments(&self) -> Vec<(&'static str, u8, Use)> {
        let mut pins = Vec::with_capacity(24);
        let mut motor = |name: [&'static str; 3], channel: &MotorChannelPins| {
            pins.push((name[0], channel.in_a, Use::Output));
            pins.push((name[1], channel.in_b, Use::Output));
            pins.push((name[2], channel.enable, Use::Output));
        };
        motor(["conveyor wet IN1", "conveyor wet IN2", "conveyor wet ENA"], &self.conveyor.wet);
        motor(["conveyor dry IN3", "conveyor dry IN4", "conveyor dry ENB"], &self.conveyor.dry);
        motor(["propeller port IN1", "propeller port IN2", "propeller port ENA"], &self.propeller.port);
        motor(
            ["propeller starboard IN3", "propeller starboard IN4", "propeller starboard ENB"],
            &self.propeller.starboard,
        );

        pins.push(("ultrasonic trigger", self.ultrasonic.trigger, Use::Output));
        pins.push(("ultrasonic echo", self.ultrasonic.echo, Use::Input));
        pins.push(("HX711 DT", self.load_cell.data, Use::Input));
        pins.push(("HX711 SCK", self.load_cell.clock, Use::Output));
        pins.push(("GPS RX", self.gps.rx, Use::Input));
        if let Some(tx) = self.gps.tx {
            pins.push(("GPS TX", tx, Use::Output));
        }
        pins.push(("compass SDA", self.compass.sda, Use::Output));
        pins.push(("compass SCL", self.compass.scl, Use::Output));
        pins.push(("one-wire data", self.one_wire.data, Use::Output));

        const SELECT_ROLES: [&str; 4] = ["mux S0", "mux S1", "mux S2", "mux S3"];
        for (&role, &gpio) in SELECT_ROLES.iter().zip(&self.mux.select) {
            pins.push((role, gpio, Use::Output));
        }
        pins.push(("mux ADC", self.mux.adc, Use::Input));
        pins
    }

    /// Check the assignment against the ESP32's pin capabilities.
    pub fn validate(&self) -> Result<(), PinConfigError> {
        let lines = self.mux.select.len();
        if !(1..=4).contains(&lines) {
            return Err(PinConfigError::SelectLineCount(lines));
        }
        if !(0x08..=0x77).contains(&self.compass.address) {
            return Err(PinConfigError::InvalidI2cAddress(self.compass.address));
        }

        let pins = self.assignments();
        for (index, &(role, gpio, usage)) in pins.iter().enumerate() {
            if gpio > MAX_GPIO || MISSING_GPIOS.contains(&gpio) {
                return Err(PinConfigError::OutOfRange { role, gpio });
            }
            if FLASH_GPIOS.contains(&gpio) {
                return Err(PinConfigError::FlashPin { role, gpio });
            }
            if usage == Use::Output && INPUT_ONLY_GPIOS.contains(&gpio) {
                return Err(PinConfigError::InputOnly { role, gpio });
            }
            if let Some(&(first, _, _)) = pins[..index].iter().find(|(_, other, _)| *other == gpio) {
                return Err(PinConfigError::Duplicate {
                    gpio,
                    first,
                    second: role,
                });
            }
        }

        if !ADC1_GPIOS.contains(&self.mux.adc) {
            return Err(PinConfigError::NotAdcCapable {
                role: "mux ADC",
                gpio: self.mux.adc,
            });
        }
        Ok(())
    }
}
