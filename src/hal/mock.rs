use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use embedded_hal::i2c::{ErrorKind as I2cErrorKind, NoAcknowledgeSource, Operation};

use super::{AnalogInput, DelayNs, I2c, InputPin, OutputPin, PinState, PulseInput, SerialRx, SetDutyCycle};
use crate::hardware::one_wire::{
    crc8, OneWireBus, RomCode, CMD_MATCH_ROM, CMD_READ_ROM, CMD_SEARCH_ROM, CMD_SKIP_ROM,
};
use crate::hardware::temp_sensor::{CMD_CONVERT_T, CMD_READ_SCRATCHPAD};

/// Errors produced by the fakes
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MockError {
    #[error("simulated hardware failure")]
    Injected,
    #[error("no device acknowledged")]
    Nack,
    #[error("device returned fewer bytes than requested")]
    ShortRead,
}

impl embedded_hal::digital::Error for MockError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::pwm::Error for MockError {
    fn kind(&self) -> embedded_hal::pwm::ErrorKind {
        embedded_hal::pwm::ErrorKind::Other
    }
}

impl embedded_hal::i2c::Error for MockError {
    fn kind(&self) -> I2cErrorKind {
        match self {
            MockError::Nack => I2cErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            _ => I2cErrorKind::Other,
        }
    }
}

#[derive(Debug, Default)]
struct PinRecord {
    level: bool,
    writes: Vec<bool>,
    scripted_reads: VecDeque<bool>,
    fail: bool,
}

/// Fake GPIO pin.
///
/// Works as an output (every write is recorded) and as an input (scripted
/// levels are returned first, then the last written level). Clones share state,
/// so a test can keep a probe while the driver owns the pin.
#[derive(Debug, Clone, Default)]
pub struct MockPin {
    state: Arc<Mutex<PinRecord>>,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an input that reads `high` until told otherwise.
    pub fn with_level(high: bool) -> Self {
        let pin = Self::new();
        pin.set_level(high);
        pin
    }

    pub fn set_level(&self, high: bool) {
        self.state.lock().unwrap().level = high;
    }

    /// Queue levels returned by the next input reads.
    pub fn push_reads(&self, levels: &[bool]) {
        self.state.lock().unwrap().scripted_reads.extend(levels);
    }

    pub fn is_set_high(&self) -> bool {
        self.state.lock().unwrap().level
    }

    /// Levels written through `OutputPin`, oldest first.
    pub fn writes(&self) -> Vec<bool> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn set_fail(&self, enable: bool) {
        self.state.lock().unwrap().fail = enable;
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = MockError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_state(PinState::Low)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_state(PinState::High)
    }

    fn set_state(&mut self, state: PinState) -> Result<(), Self::Error> {
        let mut pin = self.state.lock().unwrap();
        if pin.fail {
            return Err(MockError::Injected);
        }
        let high = state == PinState::High;
        pin.level = high;
        pin.writes.push(high);
        Ok(())
    }
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let mut pin = self.state.lock().unwrap();
        if pin.fail {
            return Err(MockError::Injected);
        }
        Ok(pin.scripted_reads.pop_front().unwrap_or(pin.level))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

#[derive(Debug, Default)]
struct PwmState {
    duties: Vec<u16>,
    fail: bool,
}

/// Fake PWM output with 8-bit resolution, like `analogWrite`.
#[derive(Debug, Clone, Default)]
pub struct MockPwm {
    state: Arc<Mutex<PwmState>>,
}

impl MockPwm {
    pub const MAX_DUTY: u16 = 255;

    pub fn new() -> Self {
        Self::default()
    }

    /// Last duty written, 0 if never written.
    pub fn duty(&self) -> u16 {
        self.state.lock().unwrap().duties.last().copied().unwrap_or(0)
    }

    pub fn history(&self) -> Vec<u16> {
        self.state.lock().unwrap().duties.clone()
    }

    pub fn set_fail(&self, enable: bool) {
        self.state.lock().unwrap().fail = enable;
    }
}

impl embedded_hal::pwm::ErrorType for MockPwm {
    type Error = MockError;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let mut pwm = self.state.lock().unwrap();
        if pwm.fail {
            return Err(MockError::Injected);
        }
        pwm.duties.push(duty);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AnalogState {
    value: u16,
    queued: VecDeque<u16>,
    reads: usize,
    fail: bool,
}

/// Fake ADC channel.
#[derive(Debug, Clone, Default)]
pub struct MockAnalog {
    state: Arc<Mutex<AnalogState>>,
}

impl MockAnalog {
    /// Create a channel that keeps returning `value`.
    pub fn new(value: u16) -> Self {
        let analog = Self::default();
        analog.set_value(value);
        analog
    }

    pub fn set_value(&self, value: u16) {
        self.state.lock().unwrap().value = value;
    }

    /// Queue one-off samples returned before the steady value.
    pub fn push_samples(&self, samples: &[u16]) {
        self.state.lock().unwrap().queued.extend(samples);
    }

    pub fn read_count(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn set_fail(&self, enable: bool) {
        self.state.lock().unwrap().fail = enable;
    }
}

impl AnalogInput for MockAnalog {
    type Error = MockError;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        let mut adc = self.state.lock().unwrap();
        if adc.fail {
            return Err(MockError::Injected);
        }
        adc.reads += 1;
        Ok(adc.queued.pop_front().unwrap_or(adc.value))
    }
}

#[derive(Debug, Default)]
struct PulseState {
    pulses: VecDeque<Option<u32>>,
    requests: Vec<(PinState, u32)>,
    fail: bool,
}

/// Fake pulse-width input.
///
/// Returns queued pulse widths in order; an empty queue behaves like a timeout.
#[derive(Debug, Clone, Default)]
pub struct MockPulse {
    state: Arc<Mutex<PulseState>>,
}

impl MockPulse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_pulse(&self, width_us: Option<u32>) {
        self.state.lock().unwrap().pulses.push_back(width_us);
    }

    /// `(level, timeout_us)` of every measurement requested so far.
    pub fn requests(&self) -> Vec<(PinState, u32)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn set_fail(&self, enable: bool) {
        self.state.lock().unwrap().fail = enable;
    }
}

impl PulseInput for MockPulse {
    type Error = MockError;

    fn pulse_in(&mut self, level: PinState, timeout_us: u32) -> Result<Option<u32>, Self::Error> {
        let mut pulse = self.state.lock().unwrap();
        if pulse.fail {
            return Err(MockError::Injected);
        }
        pulse.requests.push((level, timeout_us));
        Ok(pulse.pulses.pop_front().flatten())
    }
}

#[derive(Debug, Default)]
struct I2cState {
    address: u8,
    present: bool,
    writes: Vec<(u8, Vec<u8>)>,
    responses: VecDeque<Vec<u8>>,
}

/// Fake I2C bus with a single device on it.
///
/// Records every write, answers reads from a response queue and NACKs any
/// address other than the simulated device's.
#[derive(Debug, Clone, Default)]
pub struct MockI2c {
    state: Arc<Mutex<I2cState>>,
}

impl MockI2c {
    pub fn new(address: u8) -> Self {
        let bus = Self::default();
        {
            let mut state = bus.state.lock().unwrap();
            state.address = address;
            state.present = true;
        }
        bus
    }

    /// Unplug or replug the simulated device.
    pub fn set_present(&self, present: bool) {
        self.state.lock().unwrap().present = present;
    }

    pub fn push_response(&self, bytes: &[u8]) {
        self.state.lock().unwrap().responses.push_back(bytes.to_vec());
    }

    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.lock().unwrap().writes.clone()
    }
}

impl embedded_hal::i2c::ErrorType for MockI2c {
    type Error = MockError;
}

impl I2c for MockI2c {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        let mut bus = self.state.lock().unwrap();
        if !bus.present || address != bus.address {
            return Err(MockError::Nack);
        }
        for operation in operations {
            match operation {
                Operation::Write(bytes) => bus.writes.push((address, bytes.to_vec())),
                Operation::Read(buffer) => {
                    let response = bus.responses.pop_front().unwrap_or_default();
                    if response.len() < buffer.len() {
                        return Err(MockError::ShortRead);
                    }
                    buffer.copy_from_slice(&response[..buffer.len()]);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SerialState {
    rx: VecDeque<u8>,
    fail: bool,
}

/// Fake serial receiver.
#[derive(Debug, Clone, Default)]
pub struct MockSerial {
    state: Arc<Mutex<SerialState>>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state.lock().unwrap().rx.extend(bytes);
    }

    pub fn push_str(&self, text: &str) {
        self.push_bytes(text.as_bytes());
    }

    /// Bytes still waiting in the receive buffer.
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().rx.len()
    }

    pub fn set_fail(&self, enable: bool) {
        self.state.lock().unwrap().fail = enable;
    }
}

impl SerialRx for MockSerial {
    type Error = MockError;

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let mut serial = self.state.lock().unwrap();
        if serial.fail {
            return Err(MockError::Injected);
        }
        Ok(serial.rx.pop_front())
    }
}

/// Delay that returns immediately and only adds up the requested time.
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    total_ns: Arc<Mutex<u64>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_us(&self) -> u64 {
        *self.total_ns.lock().unwrap() / 1_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        *self.total_ns.lock().unwrap() += u64::from(ns);
    }
}

#[derive(Debug, Clone)]
struct FakeDevice {
    rom: RomCode,
    scratchpad: [u8; 9],
    selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchStep {
    IdBit,
    Complement,
    Direction,
}

#[derive(Debug, Default)]
enum WirePhase {
    #[default]
    Idle,
    RomCommand,
    Search { index: u8, step: SearchStep },
    MatchRom,
    Function,
    Reading(VecDeque<bool>),
}

#[derive(Debug, Default)]
struct OneWireState {
    devices: Vec<FakeDevice>,
    phase: WirePhase,
    shift: u64,
    bits: u8,
    conversions: usize,
    fail: bool,
}

impl OneWireState {
    /// Shift in one written bit; yields the value once `width` bits arrived.
    fn collect(&mut self, bit: bool, width: u8) -> Option<u64> {
        self.shift |= u64::from(bit) << self.bits;
        self.bits += 1;
        if self.bits < width {
            return None;
        }
        let value = self.shift;
        self.shift = 0;
        self.bits = 0;
        Some(value)
    }

    /// Open-drain bus: a bit reads 1 only if every selected device sends 1.
    fn wired_and(&self, bit: impl Fn(&FakeDevice) -> bool) -> bool {
        self.devices.iter().filter(|d| d.selected).all(bit)
    }

    fn read_queue(&self, bytes: impl Fn(&FakeDevice) -> Vec<u8>) -> VecDeque<bool> {
        let selected: Vec<Vec<u8>> = self.devices.iter().filter(|d| d.selected).map(bytes).collect();
        let len = selected.iter().map(Vec::len).max().unwrap_or(0);
        (0..len * 8)
            .map(|i| selected.iter().all(|b| (b[i / 8] >> (i % 8)) & 1 == 1))
            .collect()
    }
}

/// Build a DS18B20 scratchpad holding `raw` (1/16 °C) with a valid CRC.
pub fn ds18b20_scratchpad(raw: i16) -> [u8; 9] {
    let [lsb, msb] = raw.to_le_bytes();
    let mut scratchpad = [lsb, msb, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x00];
    scratchpad[8] = crc8(&scratchpad[..8]);
    scratchpad
}

/// Fake 1-Wire bus with simulated slave devices.
///
/// Follows the bus protocol bit by bit: ROM commands (search, match, skip,
/// read), then Convert T and Read Scratchpad.
#[derive(Debug, Clone, Default)]
pub struct MockOneWire {
    state: Arc<Mutex<OneWireState>>,
}

impl MockOneWire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, rom: RomCode, scratchpad: [u8; 9]) {
        self.state.lock().unwrap().devices.push(FakeDevice {
            rom,
            scratchpad,
            selected: false,
        });
    }

    /// Attach a DS18B20 reading `raw` (1/16 °C) and return its ROM code.
    pub fn add_ds18b20(&self, serial: u8, raw: i16) -> RomCode {
        let mut rom = [0x28, serial, 0x5A, 0xB0, 0x0F, 0x01, 0x00, 0x00];
        rom[7] = crc8(&rom[..7]);
        let rom = RomCode(rom);
        self.add_device(rom, ds18b20_scratchpad(raw));
        rom
    }

    pub fn set_scratchpad(&self, rom: &RomCode, scratchpad: [u8; 9]) {
        let mut bus = self.state.lock().unwrap();
        if let Some(device) = bus.devices.iter_mut().find(|d| d.rom == *rom) {
            device.scratchpad = scratchpad;
        }
    }

    /// Remove every device from the bus.
    pub fn disconnect_all(&self) {
        self.state.lock().unwrap().devices.clear();
    }

    /// Number of Convert T commands received
    pub fn conversions(&self) -> usize {
        self.state.lock().unwrap().conversions
    }

    pub fn set_fail(&self, enable: bool) {
        self.state.lock().unwrap().fail = enable;
    }
}

impl OneWireBus for MockOneWire {
    type Error = MockError;

    fn reset(&mut self) -> Result<bool, Self::Error> {
        let mut bus = self.state.lock().unwrap();
        if bus.fail {
            return Err(MockError::Injected);
        }
        for device in bus.devices.iter_mut() {
            device.selected = true;
        }
        bus.phase = WirePhase::RomCommand;
        bus.shift = 0;
        bus.bits = 0;
        Ok(!bus.devices.is_empty())
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error> {
        let mut guard = self.state.lock().unwrap();
        let bus = &mut *guard;
        if bus.fail {
            return Err(MockError::Injected);
        }
        let phase = std::mem::take(&mut bus.phase);
        bus.phase = match phase {
            WirePhase::RomCommand => match bus.collect(bit, 8).map(|cmd| cmd as u8) {
                None => WirePhase::RomCommand,
                Some(CMD_SEARCH_ROM) => WirePhase::Search {
                    index: 0,
                    step: SearchStep::IdBit,
                },
                Some(CMD_SKIP_ROM) => WirePhase::Function,
                Some(CMD_MATCH_ROM) => WirePhase::MatchRom,
                Some(CMD_READ_ROM) => WirePhase::Reading(bus.read_queue(|d| d.rom.0.to_vec())),
                Some(_) => WirePhase::Idle,
            },
            WirePhase::Search {
                index,
                step: SearchStep::Direction,
            } => {
                for device in bus.devices.iter_mut() {
                    if device.rom.bit(index) != bit {
                        device.selected = false;
                    }
                }
                if index == 63 {
                    WirePhase::Function
                } else {
                    WirePhase::Search {
                        index: index + 1,
                        step: SearchStep::IdBit,
                    }
                }
            }
            WirePhase::MatchRom => match bus.collect(bit, 64) {
                None => WirePhase::MatchRom,
                Some(code) => {
                    let rom = RomCode(code.to_le_bytes());
                    for device in bus.devices.iter_mut() {
                        device.selected &= device.rom == rom;
                    }
                    WirePhase::Function
                }
            },
            WirePhase::Function => match bus.collect(bit, 8).map(|cmd| cmd as u8) {
                None => WirePhase::Function,
                Some(CMD_CONVERT_T) => {
                    bus.conversions += 1;
                    WirePhase::Idle
                }
                Some(CMD_READ_SCRATCHPAD) => {
                    WirePhase::Reading(bus.read_queue(|d| d.scratchpad.to_vec()))
                }
                Some(_) => WirePhase::Idle,
            },
            other => other,
        };
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, Self::Error> {
        let mut guard = self.state.lock().unwrap();
        let bus = &mut *guard;
        if bus.fail {
            return Err(MockError::Injected);
        }
        let (value, next) = match std::mem::take(&mut bus.phase) {
            WirePhase::Search {
                index,
                step: SearchStep::IdBit,
            } => (
                bus.wired_and(|d| d.rom.bit(index)),
                WirePhase::Search {
                    index,
                    step: SearchStep::Complement,
                },
            ),
            WirePhase::Search {
                index,
                step: SearchStep::Complement,
            } => (
                bus.wired_and(|d| !d.rom.bit(index)),
                WirePhase::Search {
                    index,
                    step: SearchStep::Direction,
                },
            ),
            WirePhase::Reading(mut queue) => {
                let bit = queue.pop_front().unwrap_or(true);
                (bit, WirePhase::Reading(queue))
            }
            // idle bus is pulled high
            other => (true, other),
        };
        bus.phase = next;
        Ok(value)
    }
}

#[derive(Debug, Default)]
struct Hx711State {
    steady: i32,
    queued: VecDeque<i32>,
    ready: bool,
    current: u32,
    /// Clock pulses into the current conversion, 0 when idle
    sent: u8,
    clock_high: bool,
    pulses: usize,
}

/// Simulated HX711 load cell ADC.
///
/// Hand [`MockHx711::data_pin`] and [`MockHx711::clock_pin`] to the driver;
/// conversions are shifted out MSB first on rising clock edges.
#[derive(Debug, Clone, Default)]
pub struct MockHx711 {
    state: Arc<Mutex<Hx711State>>,
}

impl MockHx711 {
    /// A ready chip that keeps converting `raw`.
    pub fn new(raw: i32) -> Self {
        let sim = Self::default();
        {
            let mut state = sim.state.lock().unwrap();
            state.steady = raw;
            state.ready = true;
        }
        sim
    }

    pub fn set_raw(&self, raw: i32) {
        self.state.lock().unwrap().steady = raw;
    }

    /// Queue one-off conversions returned before the steady value.
    pub fn push_raw(&self, values: &[i32]) {
        self.state.lock().unwrap().queued.extend(values);
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    /// Rising clock edges seen so far
    pub fn pulses(&self) -> usize {
        self.state.lock().unwrap().pulses
    }

    pub fn data_pin(&self) -> MockHx711Data {
        MockHx711Data {
            state: Arc::clone(&self.state),
        }
    }

    pub fn clock_pin(&self) -> MockHx711Clock {
        MockHx711Clock {
            state: Arc::clone(&self.state),
        }
    }
}

/// DOUT side of [`MockHx711`]
#[derive(Debug, Clone)]
pub struct MockHx711Data {
    state: Arc<Mutex<Hx711State>>,
}

impl embedded_hal::digital::ErrorType for MockHx711Data {
    type Error = MockError;
}

impl InputPin for MockHx711Data {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let chip = self.state.lock().unwrap();
        if chip.sent == 0 {
            return Ok(!chip.ready);
        }
        Ok((chip.current >> (24 - chip.sent)) & 1 == 1)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// PD_SCK side of [`MockHx711`]
#[derive(Debug, Clone)]
pub struct MockHx711Clock {
    state: Arc<Mutex<Hx711State>>,
}

impl embedded_hal::digital::ErrorType for MockHx711Clock {
    type Error = MockError;
}

impl OutputPin for MockHx711Clock {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.state.lock().unwrap().clock_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut chip = self.state.lock().unwrap();
        if chip.clock_high {
            return Ok(());
        }
        chip.clock_high = true;
        chip.pulses += 1;
        if chip.sent == 0 {
            let raw = chip.queued.pop_front().unwrap_or(chip.steady);
            chip.current = (raw as u32) & 0x00FF_FFFF;
        }
        chip.sent += 1;
        if chip.sent == 25 {
            chip.sent = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_pin_records_writes() {
        let mut pin = MockPin::new();
        let probe = pin.clone();

        pin.set_high().unwrap();
        pin.set_low().unwrap();

        assert_eq!(probe.writes(), vec![true, false]);
        assert!(!probe.is_set_high());
    }

    #[test]
    fn test_mock_pin_scripted_reads_then_level() {
        let mut pin = MockPin::with_level(true);
        pin.push_reads(&[false]);

        assert!(pin.is_low().unwrap());
        assert!(pin.is_high().unwrap());
    }

    #[test]
    fn test_mock_i2c_nacks_unknown_address() {
        let mut bus = MockI2c::new(0x1E);
        assert_eq!(bus.write(0x50, &[0x00]), Err(MockError::Nack));
        assert!(bus.write(0x1E, &[0x00]).is_ok());
        assert_eq!(bus.writes(), vec![(0x1E, vec![0x00])]);
    }

    #[test]
    fn test_mock_i2c_short_read() {
        let mut bus = MockI2c::new(0x1E);
        bus.push_response(&[1, 2, 3]);
        let mut buffer = [0u8; 6];
        assert_eq!(bus.read(0x1E, &mut buffer), Err(MockError::ShortRead));
    }

    #[test]
    fn test_mock_delay_accumulates() {
        let mut delay = MockDelay::new();
        delay.delay_us(10);
        delay.delay_ms(1);
        assert_eq!(delay.total_us(), 1_010);
    }
}
