use log::{debug, info, warn};

use super::error::{hardware, SensorError, SensorResult};
use super::one_wire::{crc8, OneWireBus, RomCode};
use crate::hal::DelayNs;

pub const CMD_CONVERT_T: u8 = 0x44;
pub const CMD_READ_SCRATCHPAD: u8 = 0xBE;

/// Worst-case 12-bit conversion time
pub const CONVERSION_TIME_MS: u32 = 750;

/// Family codes of the supported thermometers
pub const FAMILY_DS18S20: u8 = 0x10;
pub const FAMILY_DS1822: u8 = 0x22;
pub const FAMILY_DS18B20: u8 = 0x28;
pub const FAMILY_DS1825: u8 = 0x3B;

fn is_thermometer(rom: &RomCode) -> bool {
    matches!(
        rom.family(),
        FAMILY_DS18S20 | FAMILY_DS1822 | FAMILY_DS18B20 | FAMILY_DS1825
    )
}

/// Temperature in °C from a verified scratchpad.
pub fn scratchpad_to_celsius(family: u8, scratchpad: &[u8; 9]) -> f32 {
    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    if family == FAMILY_DS18S20 {
        // 9-bit part, 0.5 °C per LSB
        f32::from(raw) / 2.0
    } else {
        f32::from(raw) / 16.0
    }
}

/// DS18B20 water temperature probe on a 1-Wire bus
///
/// Reads the first thermometer found by `begin()`. Without a prior search it
/// addresses the bus with Skip ROM, which only works with a single device.
pub struct TemperatureSensor<B, D> {
    bus: B,
    delay: D,
    devices: Vec<RomCode>,
}

impl<B, D> TemperatureSensor<B, D>
where
    B: OneWireBus,
    D: DelayNs,
{
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            bus,
            delay,
            devices: Vec::new(),
        }
    }

    /// Enumerate thermometers on the bus.
    ///
    /// # Returns
    /// Number of thermometers found. Reads go to the first one; with none
    /// found they fall back to Skip ROM.
    ///
    /// # Errors
    /// Bus failures during the ROM search
    pub fn begin(&mut self) -> SensorResult<usize> {
        let roms = self.bus.search().map_err(hardware)?;
        self.devices = roms.into_iter().filter(is_thermometer).collect();
        match self.devices.first() {
            Some(rom) => info!(
                "temperature sensor: {} device(s) on the bus, using {}",
                self.devices.len(),
                rom
            ),
            None => warn!("temperature sensor: no DS18x20 found on the bus"),
        }
        Ok(self.devices.len())
    }

    pub fn devices(&self) -> &[RomCode] {
        &self.devices
    }

    /// At least one device answered a reset pulse.
    pub fn is_connected(&mut self) -> bool {
        self.bus.reset().unwrap_or(false)
    }

    fn select(&mut self) -> SensorResult<()> {
        if !self.bus.reset().map_err(hardware)? {
            return Err(SensorError::Disconnected);
        }
        match self.devices.first() {
            Some(rom) => self.bus.match_rom(rom),
            None => self.bus.skip_rom(),
        }
        .map_err(hardware)
    }

    /// Start a conversion, wait for it and read the result back.
    pub fn try_read_celsius(&mut self) -> SensorResult<f32> {
        self.select()?;
        self.bus.write_byte(CMD_CONVERT_T).map_err(hardware)?;
        self.delay.delay_ms(CONVERSION_TIME_MS);

        self.select()?;
        self.bus.write_byte(CMD_READ_SCRATCHPAD).map_err(hardware)?;
        let mut scratchpad = [0u8; 9];
        self.bus.read_bytes(&mut scratchpad).map_err(hardware)?;

        // nobody drove the bus during the read
        if scratchpad.iter().all(|&b| b == 0xFF) {
            return Err(SensorError::Disconnected);
        }
        if crc8(&scratchpad[..8]) != scratchpad[8] {
            return Err(SensorError::Crc);
        }

        let family = self.devices.first().map_or(FAMILY_DS18B20, RomCode::family);
        let celsius = scratchpad_to_celsius(family, &scratchpad);
        debug!("temperature: {:.2} °C", celsius);
        Ok(celsius)
    }

    /// Temperature in °C, 0.0 when the probe is missing or the read failed.
    pub fn read_celsius(&mut self) -> f32 {
        self.try_read_celsius().unwrap_or_else(|e| {
            warn!("temperature read failed: {}, reporting 0 °C", e);
            0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{ds18b20_scratchpad, MockDelay, MockOneWire};

    fn probe(raw: i16) -> (TemperatureSensor<MockOneWire, MockDelay>, MockOneWire, RomCode, MockDelay) {
        let bus = MockOneWire::new();
        let rom = bus.add_ds18b20(0x42, raw);
        let delay = MockDelay::new();
        let sensor = TemperatureSensor::new(bus.clone(), delay.clone());
        (sensor, bus, rom, delay)
    }

    #[test]
    fn test_scratchpad_conversion() {
        assert_eq!(scratchpad_to_celsius(FAMILY_DS18B20, &ds18b20_scratchpad(0x0191)), 25.0625);
        assert_eq!(scratchpad_to_celsius(FAMILY_DS18B20, &ds18b20_scratchpad(-0x005E)), -5.875);
        assert_eq!(scratchpad_to_celsius(FAMILY_DS18S20, &ds18b20_scratchpad(0x0032)), 25.0);
    }

    #[test]
    fn test_begin_finds_probe() {
        let (mut sensor, _bus, rom, _delay) = probe(0x0191);
        assert_eq!(sensor.begin(), Ok(1));
        assert_eq!(sensor.devices(), &[rom]);
        assert!(sensor.is_connected());
    }

    #[test]
    fn test_read_after_begin_uses_match_rom() {
        let (mut sensor, bus, _rom, delay) = probe(0x0191);
        bus.add_device(RomCode([0x01, 0, 0, 0, 0, 0, 0, 0x3D]), [0; 9]);
        sensor.begin().unwrap();

        assert_eq!(sensor.try_read_celsius(), Ok(25.0625));
        assert_eq!(bus.conversions(), 1);
        assert!(delay.total_us() >= u64::from(CONVERSION_TIME_MS) * 1000);
    }

    #[test]
    fn test_read_without_begin_uses_skip_rom() {
        let (mut sensor, _bus, _rom, _delay) = probe(-0x005E);
        assert_eq!(sensor.read_celsius(), -5.875);
    }

    #[test]
    fn test_missing_probe_masks_to_zero() {
        let (mut sensor, bus, _rom, _delay) = probe(0x0191);
        bus.disconnect_all();
        assert!(!sensor.is_connected());
        assert_eq!(sensor.try_read_celsius(), Err(SensorError::Disconnected));
        assert_eq!(sensor.read_celsius(), 0.0);
    }

    #[test]
    fn test_corrupt_scratchpad() {
        let (mut sensor, bus, rom, _delay) = probe(0x0191);
        let mut scratchpad = ds18b20_scratchpad(0x0191);
        scratchpad[8] ^= 0x55;
        bus.set_scratchpad(&rom, scratchpad);
        assert_eq!(sensor.try_read_celsius(), Err(SensorError::Crc));
    }

    #[test]
    fn test_bus_failure() {
        let (mut sensor, bus, _rom, _delay) = probe(0x0191);
        bus.set_fail(true);
        assert!(!sensor.is_connected());
        assert!(matches!(sensor.try_read_celsius(), Err(SensorError::Hardware(_))));
    }
}
