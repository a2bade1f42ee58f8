/// NMEA 0183 sentence parser
///
/// Fed one byte at a time from the GPS UART. Only checksummed RMC and GGA
/// sentences are used (any talker: `GP`, `GN`, `GL`, ...); everything else is
/// counted and dropped. Fields are committed only after the checksum matches.
///
/// Position, speed and altitude keep their last committed value when the
/// receiver loses its fix; [`NmeaParser::has_current_fix`] tells whether the
/// most recent RMC/GGA sentence still carried one.
use heapless::String;
use log::{debug, trace};

/// Longest sentence the NMEA standard allows, `$` and CR/LF excluded
pub const MAX_SENTENCE_LEN: usize = 82;

const KNOTS_TO_MPS: f64 = 0.514_444_444;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Latitude in degrees, negative south
    pub lat: f64,
    /// Longitude in degrees, negative west
    pub lng: f64,
}

/// Parser counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub chars_processed: u32,
    pub passed_checksum: u32,
    pub failed_checksum: u32,
    pub sentences_with_fix: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for `$`
    Idle,
    /// Between `$` and `*`
    Body,
    /// Collecting the two hex digits after `*`
    Checksum { digits: u8, value: u8 },
}

pub struct NmeaParser {
    sentence: String<MAX_SENTENCE_LEN>,
    state: State,
    parity: u8,
    location: Option<Location>,
    fix_current: bool,
    speed_knots: Option<f64>,
    satellites: Option<u32>,
    altitude_m: Option<f64>,
    stats: ParserStats,
}

impl Default for NmeaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl NmeaParser {
    pub fn new() -> Self {
        Self {
            sentence: String::new(),
            state: State::Idle,
            parity: 0,
            location: None,
            fix_current: false,
            speed_knots: None,
            satellites: None,
            altitude_m: None,
            stats: ParserStats::default(),
        }
    }

    /// Feed one received byte.
    ///
    /// # Returns
    /// `true` when this byte completed a valid RMC or GGA sentence.
    pub fn encode(&mut self, byte: u8) -> bool {
        self.stats.chars_processed = self.stats.chars_processed.wrapping_add(1);

        if byte == b'$' {
            self.sentence.clear();
            self.parity = 0;
            self.state = State::Body;
            return false;
        }

        match self.state {
            State::Idle => false,
            State::Body => {
                match byte {
                    b'*' => self.state = State::Checksum { digits: 0, value: 0 },
                    // sentence ended without a checksum
                    b'\r' | b'\n' => self.state = State::Idle,
                    _ if byte.is_ascii() && !byte.is_ascii_control() => {
                        self.parity ^= byte;
                        if self.sentence.push(char::from(byte)).is_err() {
                            trace!("NMEA sentence longer than {} bytes dropped", MAX_SENTENCE_LEN);
                            self.state = State::Idle;
                        }
                    }
                    _ => self.state = State::Idle,
                }
                false
            }
            State::Checksum { digits, value } => {
                let Some(nibble) = (byte as char).to_digit(16) else {
                    self.stats.failed_checksum += 1;
                    self.state = State::Idle;
                    return false;
                };
                let value = (value << 4) | nibble as u8;
                if digits == 0 {
                    self.state = State::Checksum { digits: 1, value };
                    return false;
                }

                self.state = State::Idle;
                if value != self.parity {
                    self.stats.failed_checksum += 1;
                    debug!("NMEA checksum mismatch: got {:02X}, computed {:02X}", value, self.parity);
                    return false;
                }
                self.stats.passed_checksum += 1;
                self.commit_sentence()
            }
        }
    }

    fn commit_sentence(&mut self) -> bool {
        let sentence = std::mem::take(&mut self.sentence);
        let mut fields = sentence.split(',');
        let id = fields.next().unwrap_or_default();
        if id.len() != 5 {
            return false;
        }
        let fields: heapless::Vec<&str, 24> = fields.take(24).collect();
        match &id[2..] {
            "RMC" => {
                self.commit_rmc(&fields);
                true
            }
            "GGA" => {
                self.commit_gga(&fields);
                true
            }
            _ => false,
        }
    }

    /// `hhmmss,A,llll.ll,a,yyyyy.yy,a,x.x,x.x,ddmmyy,...`
    fn commit_rmc(&mut self, fields: &[&str]) {
        let field = |i: usize| fields.get(i).copied().unwrap_or_default();
        if field(1) != "A" {
            self.fix_current = false;
            return;
        }
        self.stats.sentences_with_fix += 1;
        self.commit_location(parse_location(field(2), field(3), field(4), field(5)));
        if let Ok(knots) = field(6).parse() {
            self.speed_knots = Some(knots);
        }
    }

    /// `hhmmss,llll.ll,a,yyyyy.yy,a,q,nn,h.h,alt,M,...`
    fn commit_gga(&mut self, fields: &[&str]) {
        let field = |i: usize| fields.get(i).copied().unwrap_or_default();
        let quality: u8 = field(5).parse().unwrap_or(0);
        self.satellites = field(6).parse().ok();
        if quality == 0 {
            self.fix_current = false;
            return;
        }
        self.stats.sentences_with_fix += 1;
        self.commit_location(parse_location(field(1), field(2), field(3), field(4)));
        if let Ok(altitude) = field(8).parse() {
            self.altitude_m = Some(altitude);
        }
    }

    fn commit_location(&mut self, location: Option<Location>) {
        match location {
            Some(location) => {
                self.location = Some(location);
                self.fix_current = true;
            }
            None => debug!("NMEA fix sentence without usable coordinates"),
        }
    }

    /// Last committed position, `None` until the first fix.
    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// The latest RMC/GGA sentence reported a fix.
    pub fn has_current_fix(&self) -> bool {
        self.fix_current
    }

    /// Last committed speed over ground in m/s, `None` until the first fix.
    pub fn speed_mps(&self) -> Option<f64> {
        self.speed_knots.map(|knots| knots * KNOTS_TO_MPS)
    }

    pub fn satellites(&self) -> Option<u32> {
        self.satellites
    }

    /// Last committed altitude above mean sea level in metres.
    pub fn altitude_m(&self) -> Option<f64> {
        self.altitude_m
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }
}

/// Convert NMEA `(d)ddmm.mmmm` plus hemisphere to signed decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str) -> Option<f64> {
    let raw: f64 = value.parse().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

fn parse_location(lat: &str, ns: &str, lng: &str, ew: &str) -> Option<Location> {
    Some(Location {
        lat: parse_coordinate(lat, ns)?,
        lng: parse_coordinate(lng, ew)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Frame `body` as a full sentence with a correct checksum.
    pub(crate) fn sentence(body: &str) -> std::string::String {
        let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
        format!("${}*{:02X}\r\n", body, checksum)
    }

    pub(crate) const RMC_FIX: &str = "GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W";
    pub(crate) const GGA_FIX: &str = "GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,";

    fn feed(parser: &mut NmeaParser, text: &str) -> usize {
        text.bytes().filter(|&b| parser.encode(b)).count()
    }

    #[test]
    fn test_known_checksums() {
        assert!(sentence(RMC_FIX).starts_with("$GPRMC"));
        assert!(sentence(RMC_FIX).ends_with("*6A\r\n"));
        assert!(sentence(GGA_FIX).ends_with("*47\r\n"));
    }

    #[test]
    fn test_rmc_commits_location_and_speed() {
        let mut parser = NmeaParser::new();
        assert_eq!(feed(&mut parser, &sentence(RMC_FIX)), 1);

        let location = parser.location().unwrap();
        assert!((location.lat - 48.1173).abs() < 1e-4);
        assert!((location.lng - 11.516_666).abs() < 1e-5);
        assert!((parser.speed_mps().unwrap() - 11.5236).abs() < 1e-3);
        assert_eq!(parser.satellites(), None);
    }

    #[test]
    fn test_gga_commits_satellites_and_altitude() {
        let mut parser = NmeaParser::new();
        feed(&mut parser, &sentence(GGA_FIX));

        assert_eq!(parser.satellites(), Some(8));
        assert_eq!(parser.altitude_m(), Some(545.4));
        assert!(parser.location().is_some());
        assert_eq!(parser.speed_mps(), None);
    }

    #[test]
    fn test_southern_western_hemispheres_are_negative() {
        let mut parser = NmeaParser::new();
        feed(
            &mut parser,
            &sentence("GNRMC,081836,A,3751.65,S,14507.36,W,000.0,360.0,130998,011.3,E"),
        );
        let location = parser.location().unwrap();
        assert!(location.lat < -37.0);
        assert!(location.lng < -145.0);
    }

    #[test]
    fn test_bad_checksum_is_not_committed() {
        let mut parser = NmeaParser::new();
        let corrupted = sentence(RMC_FIX).replace("*6A", "*00");
        assert_eq!(feed(&mut parser, &corrupted), 0);
        assert_eq!(parser.location(), None);
        assert_eq!(parser.stats().failed_checksum, 1);
        assert_eq!(parser.stats().passed_checksum, 0);
    }

    #[test]
    fn test_void_status_keeps_last_position() {
        let mut parser = NmeaParser::new();
        feed(&mut parser, &sentence(GGA_FIX));
        let before = parser.location().unwrap();
        assert!(parser.has_current_fix());

        assert_eq!(feed(&mut parser, &sentence("GPRMC,123520,V,,,,,,,230394,,")), 1);
        assert_eq!(parser.location(), Some(before));
        assert_eq!(parser.altitude_m(), Some(545.4));
        assert!(!parser.has_current_fix());

        // fix comes back
        feed(&mut parser, &sentence(RMC_FIX));
        assert!(parser.has_current_fix());
        assert!(parser.speed_mps().is_some());
    }

    #[test]
    fn test_gga_quality_zero_marks_fix_stale() {
        let mut parser = NmeaParser::new();
        feed(&mut parser, &sentence(RMC_FIX));
        feed(&mut parser, &sentence("GPGGA,123530,,,,,0,02,,,M,,M,,"));
        assert!(parser.location().is_some());
        assert!(!parser.has_current_fix());
        assert_eq!(parser.satellites(), Some(2));
    }

    #[test]
    fn test_gga_without_fix_still_reports_satellites() {
        let mut parser = NmeaParser::new();
        feed(&mut parser, &sentence("GPGGA,123519,,,,,0,03,,,M,,M,,"));
        assert_eq!(parser.location(), None);
        assert!(!parser.has_current_fix());
        assert_eq!(parser.satellites(), Some(3));
    }

    #[test]
    fn test_other_sentences_are_ignored() {
        let mut parser = NmeaParser::new();
        let count = feed(&mut parser, &sentence("GPGSV,2,1,08,01,40,083,46,02,17,308,41"));
        assert_eq!(count, 0);
        assert_eq!(parser.stats().passed_checksum, 1);
    }

    #[test]
    fn test_garbage_and_partial_sentences() {
        let mut parser = NmeaParser::new();
        let stream = format!("xx$GPRMC,12{}", sentence(GGA_FIX));
        assert_eq!(feed(&mut parser, &stream), 1);
        assert_eq!(parser.satellites(), Some(8));
        assert_eq!(parser.stats().chars_processed as usize, stream.len());
    }

    #[test]
    fn test_overlong_sentence_is_dropped() {
        let mut parser = NmeaParser::new();
        let long_body = format!("GPRMC,{}", "1".repeat(MAX_SENTENCE_LEN));
        assert_eq!(feed(&mut parser, &sentence(&long_body)), 0);
        assert_eq!(parser.stats().passed_checksum, 0);
    }
}
