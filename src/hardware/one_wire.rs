/// 1-Wire bus primitives
///
/// [`OneWireBus`] is the bit-level interface a bus master provides; byte
/// transfer, ROM addressing and the ROM search are built on top of it.
/// [`BitBangOneWire`] drives the bus from an open-drain GPIO with standard
/// speed timings.
use std::fmt::{self, Debug};

use crate::hal::{DelayNs, InputPin, OutputPin};

pub const CMD_SEARCH_ROM: u8 = 0xF0;
pub const CMD_READ_ROM: u8 = 0x33;
pub const CMD_MATCH_ROM: u8 = 0x55;
pub const CMD_SKIP_ROM: u8 = 0xCC;

/// Upper bound on devices enumerated by one search
pub const MAX_SEARCH_DEVICES: usize = 16;

/// 64-bit device ROM code: family, 48-bit serial, CRC (bus order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RomCode(pub [u8; 8]);

impl RomCode {
    pub fn family(&self) -> u8 {
        self.0[0]
    }

    pub fn is_crc_valid(&self) -> bool {
        crc8(&self.0) == 0
    }

    pub(crate) fn bit(&self, index: u8) -> bool {
        (self.0[usize::from(index / 8)] >> (index % 8)) & 1 == 1
    }

    fn set_bit(&mut self, index: u8, value: bool) {
        let byte = &mut self.0[usize::from(index / 8)];
        if value {
            *byte |= 1 << (index % 8);
        } else {
            *byte &= !(1 << (index % 8));
        }
    }
}

impl fmt::Display for RomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Dallas/Maxim CRC-8 (x^8 + x^5 + x^4 + 1, reflected).
///
/// Running it over data followed by its CRC yields 0.
///
/// # Examples
/// ```
/// use boat_peripherals::hardware::one_wire::crc8;
///
/// let rom = [0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA2];
/// assert_eq!(crc8(&rom[..7]), rom[7]);
/// assert_eq!(crc8(&rom), 0);
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut byte = byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

/// Bus master operations
pub trait OneWireBus {
    type Error: Debug;

    /// Send a reset pulse. Returns `true` if any device answered with a presence pulse.
    fn reset(&mut self) -> Result<bool, Self::Error>;

    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error>;

    fn read_bit(&mut self) -> Result<bool, Self::Error>;

    /// Write one byte, least significant bit first.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 == 1)?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        bytes.iter().try_for_each(|&b| self.write_byte(b))
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        for byte in buffer.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(())
    }

    /// Address every device on the bus.
    fn skip_rom(&mut self) -> Result<(), Self::Error> {
        self.write_byte(CMD_SKIP_ROM)
    }

    /// Address a single device.
    fn match_rom(&mut self, rom: &RomCode) -> Result<(), Self::Error> {
        self.write_byte(CMD_MATCH_ROM)?;
        self.write_bytes(&rom.0)
    }

    /// Enumerate the ROM codes of all devices on the bus.
    ///
    /// Codes failing their CRC are dropped. Stops after [`MAX_SEARCH_DEVICES`].
    fn search(&mut self) -> Result<Vec<RomCode>, Self::Error> {
        let mut found = Vec::new();
        let mut rom = RomCode([0; 8]);
        let mut last_discrepancy: Option<u8> = None;

        for _ in 0..MAX_SEARCH_DEVICES {
            if !self.reset()? {
                break;
            }
            self.write_byte(CMD_SEARCH_ROM)?;

            let mut last_zero = None;
            for index in 0..64u8 {
                let id_bit = self.read_bit()?;
                let complement = self.read_bit()?;
                let direction = match (id_bit, complement) {
                    // nobody left participating
                    (true, true) => return Ok(found),
                    (false, true) => false,
                    (true, false) => true,
                    (false, false) => {
                        let take_one = match last_discrepancy {
                            Some(d) if index < d => rom.bit(index),
                            Some(d) => index == d,
                            None => false,
                        };
                        if !take_one {
                            last_zero = Some(index);
                        }
                        take_one
                    }
                };
                rom.set_bit(index, direction);
                self.write_bit(direction)?;
            }

            if rom.is_crc_valid() {
                found.push(rom);
            }
            last_discrepancy = last_zero;
            if last_discrepancy.is_none() {
                break;
            }
        }
        Ok(found)
    }
}

/// Bit-banged 1-Wire master on an open-drain pin with an external pull-up
pub struct BitBangOneWire<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> BitBangOneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// `pin` must be configured open-drain; driving it high releases the bus.
    pub fn new(mut pin: P, delay: D) -> Result<Self, P::Error> {
        pin.set_high()?;
        Ok(Self { pin, delay })
    }
}

impl<P, D> OneWireBus for BitBangOneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    type Error = P::Error;

    fn reset(&mut self) -> Result<bool, Self::Error> {
        self.pin.set_low()?;
        self.delay.delay_us(480);
        self.pin.set_high()?;
        self.delay.delay_us(70);
        let presence = self.pin.is_low()?;
        self.delay.delay_us(410);
        Ok(presence)
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error> {
        let (low_us, recovery_us) = if bit { (6, 64) } else { (60, 10) };
        self.pin.set_low()?;
        self.delay.delay_us(low_us);
        self.pin.set_high()?;
        self.delay.delay_us(recovery_us);
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, Self::Error> {
        self.pin.set_low()?;
        self.delay.delay_us(6);
        self.pin.set_high()?;
        self.delay.delay_us(9);
        let bit = self.pin.is_high()?;
        self.delay.delay_us(55);
        Ok(bit)
    }
}
