// One poll of the digital and bus sensors into a telemetry snapshot
// Runs on the host against the mocks

use boat_peripherals::hal::mock::{MockDelay, MockHx711, MockI2c, MockOneWire, MockPin, MockPulse, MockSerial};
use boat_peripherals::hardware::pins::COMPASS_I2C_ADDRESS;
use boat_peripherals::hardware::{Compass, Gps, Hx711, LoadCell, SensorError, TemperatureSensor, Ultrasonic};
use boat_peripherals::core::{AlertKind, AlertThresholds};
use boat_peripherals::TelemetrySnapshot;
use serde_json::Value;

const RMC_FIX: &str = "GPRMC,081836,A,1258.200,N,07735.400,E,001.0,360.0,130998,011.3,E";
const GGA_FIX: &str = "GPGGA,081836,1258.200,N,07735.400,E,1,09,0.9,920.0,M,-86.0,M,,";
const RMC_LOST: &str = "GPRMC,081900,V,,,,,,,130998,,";

fn sentence(body: &str) -> String {
    let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${}*{:02X}\r\n", body, checksum)
}

/// HMC5883L data registers, sent X, Z, Y
fn field(x: i16, y: i16, z: i16) -> Vec<u8> {
    [x, z, y].iter().flat_map(|axis| axis.to_be_bytes()).collect()
}

#[test]
fn test_gps_fix_then_loss_keeps_position() {
    let serial = MockSerial::new();
    let mut gps = Gps::new(serial.clone());
    gps.begin();
    assert_eq!(gps.fix(), Err(SensorError::NoFix));

    serial.push_str(&sentence(RMC_FIX));
    serial.push_str(&sentence(GGA_FIX));
    assert_eq!(gps.try_update(), Ok(2));
    assert_eq!(serial.pending(), 0);

    let fix = gps.fix().unwrap();
    assert!((fix.latitude - 12.97).abs() < 1e-6);
    assert!((fix.longitude - 77.59).abs() < 1e-6);
    assert!((fix.speed_mps - 0.514_444).abs() < 1e-5);
    assert_eq!(fix.satellites, 9);
    assert!(fix.current);

    serial.push_str(&sentence(RMC_LOST));
    gps.update();
    // last known position survives, flagged as stale
    assert!(gps.is_valid());
    assert!(!gps.has_current_fix());
    let stale = gps.fix().unwrap();
    assert!(!stale.current);
    assert!((stale.latitude - 12.97).abs() < 1e-6);

    let snapshot = TelemetrySnapshot::new().with_gps(Some(stale));
    assert!(snapshot.gps.is_some());
    assert!(snapshot.has_warnings());
}

#[test]
fn test_corrupted_sentence_is_ignored() {
    let serial = MockSerial::new();
    let mut gps = Gps::new(serial.clone());
    let mut corrupted = sentence(RMC_FIX);
    corrupted.replace_range(10..11, "9");
    serial.push_str(&corrupted);

    assert_eq!(gps.try_update(), Ok(0));
    assert!(!gps.is_valid());
    assert_eq!(gps.stats().failed_checksum, 1);
}

#[test]
fn test_full_poll_into_snapshot() {
    let serial = MockSerial::new();
    serial.push_str(&sentence(RMC_FIX));
    serial.push_str(&sentence(GGA_FIX));
    let mut gps = Gps::new(serial);

    let i2c = MockI2c::new(COMPASS_I2C_ADDRESS);
    i2c.push_response(&field(0, 100, 0));
    let mut compass = Compass::new(i2c.clone());
    compass.begin().unwrap();

    let echo = MockPulse::new();
    // 1000 us round trip -> 17 cm
    echo.push_pulse(Some(1000));
    let mut ultrasonic = Ultrasonic::new(MockPin::new(), echo, MockDelay::new());
    ultrasonic.begin().unwrap();

    let bus = MockOneWire::new();
    bus.add_ds18b20(0x07, 0x0191);
    let mut thermometer = TemperatureSensor::new(bus, MockDelay::new());
    assert_eq!(thermometer.begin(), Ok(1));

    let hx711 = MockHx711::new(8_000);
    let mut load_cell = LoadCell::new(Hx711::new(hx711.data_pin(), hx711.clock_pin(), MockDelay::new()).unwrap());
    load_cell.begin().unwrap();
    hx711.set_raw(8_000 + 2280 * 250);

    gps.update();
    let distance = ultrasonic.try_read_distance_cm().unwrap();
    let mut snapshot = TelemetrySnapshot::new()
        .with_gps(gps.fix().ok())
        .with_heading(compass.try_read_heading().ok())
        .with_distance(Some(distance))
        .with_temperature(thermometer.try_read_celsius().ok())
        .with_load(load_cell.try_read_grams().ok());
    assert_eq!(snapshot.derive_alerts(&AlertThresholds::default()), vec![AlertKind::Obstacle]);

    let json: Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
    assert!((json["gps"]["lat"].as_f64().unwrap() - 12.97).abs() < 1e-6);
    assert_eq!(json["satellites"], 9);
    assert!((json["heading"].as_f64().unwrap() - 90.0).abs() < 1e-3);
    assert!((json["ultrasonic_cm"].as_f64().unwrap() - 17.0).abs() < 1e-3);
    assert_eq!(json["temperature_c"], 25.0625);
    assert!((json["loadcell_grams"].as_f64().unwrap() - 250.0).abs() < 1e-2);
    assert_eq!(json["warnings"][0], "obstacle: obstacle detected at 17.0 cm");
}

#[test]
fn test_full_bin_raises_alert() {
    let hx711 = MockHx711::new(0);
    let scale = Hx711::new(hx711.data_pin(), hx711.clock_pin(), MockDelay::new()).unwrap();
    let mut load_cell = LoadCell::with_calibration(scale, 1000.0).unwrap();
    load_cell.begin().unwrap();
    hx711.set_raw(1000 * 5000);

    let mut snapshot = TelemetrySnapshot::new().with_load(load_cell.try_read_grams().ok());
    assert_eq!(snapshot.derive_alerts(&AlertThresholds::default()), vec![AlertKind::BinFull]);
    assert!(snapshot.warnings[0].starts_with("bin_full"));
}

#[test]
fn test_missing_peripherals_fall_back_to_defaults() {
    let i2c = MockI2c::new(COMPASS_I2C_ADDRESS);
    i2c.set_present(false);
    let mut compass = Compass::new(i2c);
    assert_eq!(compass.try_read_heading(), Err(SensorError::NoAck(COMPASS_I2C_ADDRESS)));
    assert_eq!(compass.read_heading(), 0.0);

    let echo = MockPulse::new();
    echo.push_pulse(None);
    let mut ultrasonic = Ultrasonic::new(MockPin::new(), echo, MockDelay::new());
    assert_eq!(ultrasonic.read_distance_cm(), 0.0);
    assert!(!ultrasonic.is_obstacle_detected(25.0));

    let mut thermometer = TemperatureSensor::new(MockOneWire::new(), MockDelay::new());
    assert_eq!(thermometer.begin(), Ok(0));
    assert_eq!(thermometer.try_read_celsius(), Err(SensorError::Disconnected));
    assert_eq!(thermometer.read_celsius(), 0.0);

    let hx711 = MockHx711::new(0);
    hx711.set_ready(false);
    let mut load_cell = LoadCell::new(Hx711::new(hx711.data_pin(), hx711.clock_pin(), MockDelay::new()).unwrap());
    assert_eq!(load_cell.read_grams(), 0.0);
}
