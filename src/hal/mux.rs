/// Analog multiplexer in front of the single ADC input.
///
/// The gas, TDS and moisture sensors all sit behind one CD4051-style
/// multiplexer. `AnalogMux` owns the select lines and the ADC; each sensor gets
/// a [`MuxedInput`] that switches to its channel before sampling.
use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use super::{AnalogInput, OutputPin, PinState};

/// Multiplexer handle shared between the sensors that sample through it.
pub type SharedMux<S, A> = Rc<RefCell<AnalogMux<S, A>>>;

/// Multiplexer errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MuxError {
    #[error("select line {line} could not be driven: {detail}")]
    Select { line: usize, detail: String },
    #[error("ADC read failed: {0}")]
    Adc(String),
    #[error("channel {channel} does not exist on a multiplexer with {lines} select line(s)")]
    NoSuchChannel { channel: u8, lines: usize },
    #[error("multiplexer is already in use")]
    Busy,
}

pub struct AnalogMux<S, A> {
    /// Select lines, least significant bit first
    select: Vec<S>,
    adc: A,
    selected: Option<u8>,
}

impl<S, A> AnalogMux<S, A>
where
    S: OutputPin,
    A: AnalogInput,
{
    pub fn new(select: Vec<S>, adc: A) -> Self {
        Self {
            select,
            adc,
            selected: None,
        }
    }

    /// Wrap a new multiplexer for sharing between sensors.
    pub fn shared(select: Vec<S>, adc: A) -> SharedMux<S, A> {
        Rc::new(RefCell::new(Self::new(select, adc)))
    }

    /// Hand out an input bound to `channel`.
    ///
    /// # Errors
    /// `NoSuchChannel` if the select lines cannot address `channel`.
    pub fn channel(mux: &SharedMux<S, A>, channel: u8) -> Result<MuxedInput<S, A>, MuxError> {
        let lines = mux.try_borrow().map_err(|_| MuxError::Busy)?.select.len();
        if usize::from(channel) >= 1 << lines {
            return Err(MuxError::NoSuchChannel { channel, lines });
        }
        Ok(MuxedInput {
            mux: Rc::clone(mux),
            channel,
        })
    }

    pub fn channel_count(&self) -> usize {
        1 << self.select.len()
    }

    /// Channel the select lines currently point at, if known.
    pub fn selected(&self) -> Option<u8> {
        self.selected
    }

    /// Drive the select lines to `channel`.
    pub fn select(&mut self, channel: u8) -> Result<(), MuxError> {
        if usize::from(channel) >= self.channel_count() {
            return Err(MuxError::NoSuchChannel {
                channel,
                lines: self.select.len(),
            });
        }
        if self.selected == Some(channel) {
            return Ok(());
        }

        // unknown until every line has switched
        self.selected = None;
        for (line, pin) in self.select.iter_mut().enumerate() {
            let state = PinState::from((channel >> line) & 1 == 1);
            pin.set_state(state).map_err(|e| MuxError::Select {
                line,
                detail: format!("{:?}", e),
            })?;
        }
        self.selected = Some(channel);
        debug!("analog mux switched to channel {}", channel);
        Ok(())
    }

    /// Select `channel` and take one sample from it.
    pub fn read_channel(&mut self, channel: u8) -> Result<u16, MuxError> {
        self.select(channel)?;
        self.adc
            .read_raw()
            .map_err(|e| MuxError::Adc(format!("{:?}", e)))
    }
}

/// One multiplexer channel, usable wherever an [`AnalogInput`] is expected.
pub struct MuxedInput<S, A> {
    mux: SharedMux<S, A>,
    channel: u8,
}

impl<S, A> MuxedInput<S, A> {
    pub fn channel(&self) -> u8 {
        self.channel
    }
}

impl<S, A> AnalogInput for MuxedInput<S, A>
where
    S: OutputPin,
    A: AnalogInput,
{
    type Error = MuxError;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        self.mux
            .try_borrow_mut()
            .map_err(|_| MuxError::Busy)?
            .read_channel(self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{MockAnalog, MockPin};

    fn mux_with_probes() -> (SharedMux<MockPin, MockAnalog>, Vec<MockPin>, MockAnalog) {
        let lines = vec![MockPin::new(), MockPin::new(), MockPin::new()];
        let adc = MockAnalog::new(512);
        let mux = AnalogMux::shared(lines.clone(), adc.clone());
        (mux, lines, adc)
    }

    #[test]
    fn test_select_lines_encode_channel_lsb_first() {
        let (mux, lines, _adc) = mux_with_probes();
        let mut input = AnalogMux::channel(&mux, 5).unwrap();

        assert_eq!(input.read_raw().unwrap(), 512);
        assert!(lines[0].is_set_high());
        assert!(!lines[1].is_set_high());
        assert!(lines[2].is_set_high());
        assert_eq!(mux.borrow().selected(), Some(5));
    }

    #[test]
    fn test_channels_share_one_adc() {
        let (mux, lines, adc) = mux_with_probes();
        let mut tds = AnalogMux::channel(&mux, 2).unwrap();
        let mut mq2 = AnalogMux::channel(&mux, 1).unwrap();

        adc.push_samples(&[100, 900]);
        assert_eq!(tds.read_raw().unwrap(), 100);
        assert!(lines[1].is_set_high());
        assert_eq!(mq2.read_raw().unwrap(), 900);
        assert!(lines[0].is_set_high());
        assert!(!lines[1].is_set_high());
        assert_eq!(adc.read_count(), 2);
    }

    #[test]
    fn test_channel_out_of_range_is_rejected() {
        let (mux, _lines, _adc) = mux_with_probes();
        let result = AnalogMux::channel(&mux, 8);
        assert!(matches!(
            result,
            Err(MuxError::NoSuchChannel { channel: 8, lines: 3 })
        ));
    }

    #[test]
    fn test_select_failure_is_reported() {
        let (mux, lines, _adc) = mux_with_probes();
        lines[1].set_fail(true);
        let mut input = AnalogMux::channel(&mux, 3).unwrap();

        let result = input.read_raw();
        assert!(matches!(result, Err(MuxError::Select { line: 1, .. })));
        assert_eq!(mux.borrow().selected(), None);
    }

    #[test]
    fn test_adc_failure_is_reported() {
        let (mux, _lines, adc) = mux_with_probes();
        adc.set_fail(true);
        let mut input = AnalogMux::channel(&mux, 0).unwrap();
        assert!(matches!(input.read_raw(), Err(MuxError::Adc(_))));
    }

    #[test]
    fn test_busy_mux_does_not_panic() {
        let (mux, _lines, _adc) = mux_with_probes();
        let mut input = AnalogMux::channel(&mux, 0).unwrap();
        let _guard = mux.borrow_mut();
        assert_eq!(input.read_raw(), Err(MuxError::Busy));
    }
}
