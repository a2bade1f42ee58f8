use std::io::BufRead;
use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use esp_idf_svc::hal::adc::oneshot::AdcDriver;
use esp_idf_svc::hal::delay::{Delay, FreeRtos};
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyOutputPin};
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::ledc::config::TimerConfig;
use esp_idf_svc::hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::uart::{config::Config as UartConfig, UartRxDriver};
use esp_idf_svc::hal::units::{FromValueType, Hertz};
use log::{debug, error, info, warn};

use boat_peripherals::config::AppConfig;
use boat_peripherals::core::{parse_command, TelemetrySnapshot};
use boat_peripherals::hal::esp::{self, EspOutput, EspPulseIn, EspSerialRx};
use boat_peripherals::hal::AnalogMux;
use boat_peripherals::hardware::motors::{ConveyorBank, HBridgeChannel, PropellerBank};
use boat_peripherals::hardware::pins::{MotorChannelPins, MuxChannel};
use boat_peripherals::hardware::{
    BitBangOneWire, Bin, Compass, GasKind, GasSensor, Gps, Hx711, LoadCell, MoistureSensor,
    SensorResult, TdsSensor, TemperatureSensor, Ultrasonic,
};

/// Stack of the console reader thread
const COMMAND_READER_STACK: usize = 4096;

fn h_bridge(
    name: &'static str,
    pins: MotorChannelPins,
    enable: LedcDriver<'static>,
) -> Result<HBridgeChannel<EspOutput, LedcDriver<'static>>> {
    // pins were checked by AppConfig::load
    let (in_a, in_b) = unsafe { (esp::output_pin(pins.in_a)?, esp::output_pin(pins.in_b)?) };
    Ok(HBridgeChannel::new(name, in_a, in_b, enable))
}

/// Keep a reading, or record why it is missing.
fn reading<T>(snapshot: &mut TelemetrySnapshot, name: &str, result: SensorResult<T>) -> Option<T> {
    result
        .map_err(|e| snapshot.add_warning(format!("{}: {}", name, e)))
        .ok()
}

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("PavitraX boat peripherals v{}", boat_peripherals::VERSION);

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("configuration error: {}", e))?;
    let pins = &config.pins;
    let calibration = &config.calibration;
    let peripherals = Peripherals::take()?;

    // Motor banks on LEDC, 8-bit duty
    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::default()
            .frequency(5.kHz().into())
            .resolution(Resolution::Bits8),
    )?;
    let enable = |gpio: u8| unsafe { AnyOutputPin::new(i32::from(gpio)) };
    let mut conveyors = ConveyorBank::new(
        h_bridge(
            "conveyor wet",
            pins.conveyor.wet,
            LedcDriver::new(peripherals.ledc.channel0, &timer, enable(pins.conveyor.wet.enable))?,
        )?,
        h_bridge(
            "conveyor dry",
            pins.conveyor.dry,
            LedcDriver::new(peripherals.ledc.channel1, &timer, enable(pins.conveyor.dry.enable))?,
        )?,
    );
    let mut propellers = PropellerBank::new(
        h_bridge(
            "propeller port",
            pins.propeller.port,
            LedcDriver::new(peripherals.ledc.channel2, &timer, enable(pins.propeller.port.enable))?,
        )?,
        h_bridge(
            "propeller starboard",
            pins.propeller.starboard,
            LedcDriver::new(
                peripherals.ledc.channel3,
                &timer,
                enable(pins.propeller.starboard.enable),
            )?,
        )?,
    );
    conveyors.set_speed(i32::from(config.motor_speed))?;
    propellers.set_speed(i32::from(config.motor_speed))?;
    conveyors.begin()?;
    propellers.begin()?;

    // Analog sensors share the multiplexer
    let adc = AdcDriver::new(peripherals.adc1)?;
    let select = pins
        .mux
        .select
        .iter()
        .map(|&gpio| unsafe { esp::output_pin(gpio) })
        .collect::<Result<Vec<_>, _>>()?;
    let mux = AnalogMux::shared(select, esp::adc1_input(&adc, pins.mux.adc)?);
    let input = |channel: MuxChannel| AnalogMux::channel(&mux, channel.index());

    let mut mq135 =
        GasSensor::with_calibration(GasKind::Mq135, input(MuxChannel::Mq135)?, calibration.mq135)?;
    let mut mq2 = GasSensor::with_calibration(GasKind::Mq2, input(MuxChannel::Mq2)?, calibration.mq2)?;
    let mut tds = TdsSensor::with_calibration(input(MuxChannel::Tds)?, calibration.tds)?;
    let mut dry_bin = MoistureSensor::with_calibration(
        Bin::Dry,
        input(MuxChannel::MoistureDryBin)?,
        calibration.moisture_dry,
        calibration.moisture_wet,
    )?;
    let mut wet_bin = MoistureSensor::with_calibration(
        Bin::Wet,
        input(MuxChannel::MoistureWetBin)?,
        calibration.moisture_dry,
        calibration.moisture_wet,
    )?;
    mq135.begin();
    mq2.begin();
    tds.begin();
    dry_bin.begin();
    wet_bin.begin();

    let mut ultrasonic = unsafe {
        Ultrasonic::new(
            esp::output_pin(pins.ultrasonic.trigger)?,
            EspPulseIn::new(esp::input_pin(pins.ultrasonic.echo)?),
            Delay::new_default(),
        )
    }
    .with_echo_timeout(config.echo_timeout_us);
    ultrasonic.begin()?;

    let hx711 = unsafe {
        Hx711::new(
            esp::input_pin(pins.load_cell.data)?,
            esp::output_pin(pins.load_cell.clock)?,
            Delay::new_default(),
        )?
    };
    let mut load_cell = LoadCell::with_calibration(hx711, calibration.load_cell)?;
    if let Err(e) = load_cell.begin() {
        warn!("load cell not tared: {}", e);
    }

    let one_wire_pin = unsafe { esp::open_drain_pin(pins.one_wire.data)? };
    let one_wire = BitBangOneWire::new(one_wire_pin, Delay::new_default())
        .map_err(|e| anyhow::anyhow!("one-wire pin: {:?}", e))?;
    let mut thermometer = TemperatureSensor::new(one_wire, Delay::new_default());
    if let Err(e) = thermometer.begin() {
        warn!("temperature probe search failed: {}", e);
    }

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        unsafe { AnyIOPin::new(i32::from(pins.compass.sda)) },
        unsafe { AnyIOPin::new(i32::from(pins.compass.scl)) },
        &I2cConfig::new().baudrate(100.kHz().into()),
    )?;
    let mut compass = Compass::with_address(i2c, pins.compass.address);
    if let Err(e) = compass.begin() {
        warn!("compass not initialized: {}", e);
    }

    let uart = UartRxDriver::new(
        peripherals.uart2,
        unsafe { AnyIOPin::new(i32::from(pins.gps.rx)) },
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::new().baudrate(Hertz(config.gps_baud)),
    )?;
    let mut gps = Gps::new(EspSerialRx::new(uart));
    gps.begin();

    // Control commands typed on the USB console
    let (command_tx, command_rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .stack_size(COMMAND_READER_STACK)
        .spawn(move || {
            for line in std::io::stdin().lock().lines().map_while(|line| line.ok()) {
                if command_tx.send(line).is_err() {
                    break;
                }
            }
        })?;

    let alerts = config.alert_thresholds();
    info!("=== polling every {} ms ===", config.poll_interval_ms);
    loop {
        while let Ok(line) = command_rx.try_recv() {
            match parse_command(&line) {
                Ok(command) => {
                    if let Err(e) = command.apply(&mut conveyors, &mut propellers) {
                        error!("{:?} failed: {}", command, e);
                    }
                }
                Err(e) => warn!("rejected command '{}': {}", line.trim(), e),
            }
        }

        gps.update();
        let mut snapshot = TelemetrySnapshot::new().with_gps(gps.fix().ok());

        let heading = reading(&mut snapshot, "compass", compass.try_read_heading());
        let distance = reading(&mut snapshot, "ultrasonic", ultrasonic.try_read_distance_cm());
        let temperature = reading(&mut snapshot, "temperature", thermometer.try_read_celsius());
        let water = reading(&mut snapshot, "TDS", tds.try_read());
        let grams = reading(&mut snapshot, "load cell", load_cell.try_read_grams());

        let mut snapshot = snapshot
            .with_heading(heading)
            .with_distance(distance)
            .with_temperature(temperature)
            .with_gas(mq2.read_ppm(), mq135.read_ppm())
            .with_tds(water)
            .with_moisture(dry_bin.read_percentage(), wet_bin.read_percentage())
            .with_load(grams)
            .with_conveyor(conveyors.is_wet_active(), conveyors.is_dry_active())
            .with_propeller(propellers.is_active());
        for alert in snapshot.derive_alerts(&alerts) {
            warn!("alert raised: {}", alert);
        }

        info!("{}", snapshot.summary());
        match snapshot.to_json() {
            Ok(json) => debug!("telemetry: {}", json),
            Err(e) => warn!("telemetry serialization failed: {}", e),
        }

        FreeRtos::delay_ms(config.poll_interval_ms);
    }
}
