use log::{debug, info, warn};

use super::error::{hardware, SensorError, SensorResult};
use crate::hal::SerialRx;
use crate::utils::nmea::{NmeaParser, ParserStats};

pub const DEFAULT_GPS_BAUD: u32 = 9600;

/// Position, speed and satellites from the last valid sentences
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Speed over ground (m/s), 0.0 if no RMC speed was received
    pub speed_mps: f64,
    pub satellites: u32,
    /// `false` once the receiver has lost the fix; the position is then the
    /// last known one
    pub current: bool,
}

/// NMEA GPS receiver on a serial port
pub struct Gps<S> {
    serial: S,
    parser: NmeaParser,
}

impl<S: SerialRx> Gps<S> {
    pub fn new(serial: S) -> Self {
        Self {
            serial,
            parser: NmeaParser::new(),
        }
    }

    pub fn begin(&mut self) {
        info!("GPS ready, waiting for NMEA sentences");
    }

    /// Feed every byte currently buffered on the serial port to the parser.
    ///
    /// Never waits for more data. Call it often enough that the UART buffer
    /// does not overflow.
    ///
    /// # Returns
    /// Number of complete sentences accepted
    pub fn try_update(&mut self) -> SensorResult<usize> {
        let mut sentences = 0;
        while let Some(byte) = self.serial.read_byte().map_err(hardware)? {
            if self.parser.encode(byte) {
                sentences += 1;
            }
        }
        if sentences > 0 {
            debug!("GPS: {} sentence(s), location valid: {}", sentences, self.is_valid());
        }
        Ok(sentences)
    }

    pub fn update(&mut self) {
        if let Err(e) = self.try_update() {
            warn!("GPS serial read failed: {}", e);
        }
    }

    /// A location has been received since power-up.
    ///
    /// Stays `true` after the fix is lost; see [`Gps::has_current_fix`].
    pub fn is_valid(&self) -> bool {
        self.parser.location().is_some()
    }

    /// The receiver reported a fix in its latest position sentence.
    pub fn has_current_fix(&self) -> bool {
        self.parser.has_current_fix()
    }

    pub fn latitude(&self) -> f64 {
        self.parser.location().map_or(0.0, |l| l.lat)
    }

    pub fn longitude(&self) -> f64 {
        self.parser.location().map_or(0.0, |l| l.lng)
    }

    pub fn speed_mps(&self) -> f64 {
        self.parser.speed_mps().unwrap_or(0.0)
    }

    pub fn satellites(&self) -> u32 {
        self.parser.satellites().unwrap_or(0)
    }

    pub fn altitude_m(&self) -> Option<f64> {
        self.parser.altitude_m()
    }

    /// Last known position with its freshness.
    ///
    /// # Errors
    /// `NoFix` until the first position sentence with a fix arrives.
    pub fn fix(&self) -> SensorResult<GpsFix> {
        let location = self.parser.location().ok_or(SensorError::NoFix)?;
        Ok(GpsFix {
            latitude: location.lat,
            longitude: location.lng,
            speed_mps: self.speed_mps(),
            satellites: self.satellites(),
            current: self.has_current_fix(),
        })
    }

    pub fn stats(&self) -> ParserStats {
        self.parser.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockSerial;
    use crate::utils::nmea::tests::{sentence, GGA_FIX, RMC_FIX};

    #[test]
    fn test_no_fix_reads_zero() {
        let serial = MockSerial::new();
        let mut gps = Gps::new(serial.clone());
        serial.push_str(&sentence("GPRMC,000000,V,,,,,,,010100,,"));
        gps.update();

        assert!(!gps.is_valid());
        assert_eq!(gps.latitude(), 0.0);
        assert_eq!(gps.longitude(), 0.0);
        assert_eq!(gps.speed_mps(), 0.0);
        assert_eq!(gps.satellites(), 0);
        assert_eq!(gps.fix(), Err(SensorError::NoFix));
    }

    #[test]
    fn test_update_drains_buffer() {
        let serial = MockSerial::new();
        let mut gps = Gps::new(serial.clone());
        serial.push_str(&sentence(RMC_FIX));
        serial.push_str(&sentence(GGA_FIX));

        assert_eq!(gps.try_update(), Ok(2));
        assert_eq!(serial.pending(), 0);

        let fix = gps.fix().unwrap();
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.5167).abs() < 1e-4);
        assert_eq!(fix.satellites, 8);
        assert!(fix.speed_mps > 11.0);
    }

    #[test]
    fn test_sentence_split_across_updates() {
        let serial = MockSerial::new();
        let mut gps = Gps::new(serial.clone());
        let text = sentence(GGA_FIX);
        let (head, tail) = text.split_at(20);

        serial.push_str(head);
        assert_eq!(gps.try_update(), Ok(0));
        serial.push_str(tail);
        assert_eq!(gps.try_update(), Ok(1));
        assert_eq!(gps.satellites(), 8);
    }

    #[test]
    fn test_lost_fix_keeps_last_position() {
        let serial = MockSerial::new();
        let mut gps = Gps::new(serial.clone());
        serial.push_str(&sentence(GGA_FIX));
        gps.update();
        assert!(gps.fix().unwrap().current);

        serial.push_str(&sentence("GPRMC,123600,V,,,,,,,230394,,"));
        gps.update();
        assert!(gps.is_valid());
        assert!(!gps.has_current_fix());
        let fix = gps.fix().unwrap();
        assert!(!fix.current);
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((gps.longitude() - 11.5167).abs() < 1e-4);
    }

    #[test]
    fn test_serial_failure() {
        let serial = MockSerial::new();
        serial.set_fail(true);
        let mut gps = Gps::new(serial);
        assert!(matches!(gps.try_update(), Err(SensorError::Hardware(_))));
        gps.update();
        assert!(!gps.is_valid());
    }
}
