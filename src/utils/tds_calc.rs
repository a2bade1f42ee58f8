/// TDS (total dissolved solids) calculation utilities
/// Hardware-independent pure functions
use std::fmt;

use serde::{Serialize, Serializer};

/// Reference voltage of the TDS probe board
pub const TDS_REFERENCE_VOLTAGE: f32 = 3.3;

/// Lower bounds (ppm) of the Good, Fair, Poor and Critical buckets
pub const TDS_THRESHOLDS_PPM: [f32; 4] = [50.0, 200.0, 500.0, 1000.0];

/// TDS concentration (ppm) from the probe output voltage.
///
/// # Arguments
/// - `voltage`: probe output (V)
/// - `calibration_factor`: probe calibration factor (default 2.0)
///
/// # Examples
/// ```
/// use boat_peripherals::utils::tds_calc::calculate_tds_ppm;
///
/// let tds = calculate_tds_ppm(1.0, 2.0);
/// assert_eq!(tds, 500.0);
/// ```
pub fn calculate_tds_ppm(voltage: f32, calibration_factor: f32) -> f32 {
    voltage * 1000.0 / calibration_factor
}

/// Index of the bucket `ppm` falls in, 0 (cleanest) to 4.
fn bucket(ppm: f32) -> usize {
    TDS_THRESHOLDS_PPM
        .iter()
        .position(|&limit| ppm < limit)
        .unwrap_or(TDS_THRESHOLDS_PPM.len())
}

/// Water health label for a TDS reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterHealth {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl WaterHealth {
    pub fn label(&self) -> &'static str {
        match self {
            WaterHealth::Excellent => "Excellent",
            WaterHealth::Good => "Good",
            WaterHealth::Fair => "Fair",
            WaterHealth::Poor => "Poor",
            WaterHealth::Critical => "Critical",
        }
    }
}

impl Serialize for WaterHealth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl fmt::Display for WaterHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pollution zone the boat is in, judged from TDS.
///
/// Very low TDS is typical of water trapped around floating plastic; high TDS
/// points to chemical discharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollutionZone {
    PlasticZone,
    Normal,
    ModeratePollution,
    ChemicalZone,
    CriticalPollution,
}

impl PollutionZone {
    pub fn label(&self) -> &'static str {
        match self {
            PollutionZone::PlasticZone => "Plastic Zone (Low TDS)",
            PollutionZone::Normal => "Normal Zone",
            PollutionZone::ModeratePollution => "Moderate Pollution",
            PollutionZone::ChemicalZone => "Chemical Zone (High TDS)",
            PollutionZone::CriticalPollution => "Critical Pollution Zone",
        }
    }
}

impl Serialize for PollutionZone {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl fmt::Display for PollutionZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a TDS reading into a water health bucket.
///
/// NaN falls through every threshold and is reported as `Critical`.
pub fn water_health_status(ppm: f32) -> WaterHealth {
    match bucket(ppm) {
        0 => WaterHealth::Excellent,
        1 => WaterHealth::Good,
        2 => WaterHealth::Fair,
        3 => WaterHealth::Poor,
        _ => WaterHealth::Critical,
    }
}

/// Classify a TDS reading into a pollution zone.
pub fn pollution_zone(ppm: f32) -> PollutionZone {
    match bucket(ppm) {
        0 => PollutionZone::PlasticZone,
        1 => PollutionZone::Normal,
        2 => PollutionZone::ModeratePollution,
        3 => PollutionZone::ChemicalZone,
        _ => PollutionZone::CriticalPollution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tds_from_voltage_standard() {
        assert_eq!(calculate_tds_ppm(1.0, 2.0), 500.0);
        assert_eq!(calculate_tds_ppm(0.0, 2.0), 0.0);
    }

    #[test]
    fn test_tds_factor_divides() {
        let low = calculate_tds_ppm(1.65, 4.0);
        let high = calculate_tds_ppm(1.65, 1.0);
        assert!((high / low - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_boundary_just_below_50() {
        assert_eq!(water_health_status(49.9), WaterHealth::Excellent);
        assert_eq!(pollution_zone(49.9).label(), "Plastic Zone (Low TDS)");
    }

    #[test]
    fn test_boundary_at_50() {
        assert_eq!(water_health_status(50.0), WaterHealth::Good);
        assert_eq!(pollution_zone(50.0).label(), "Normal Zone");
    }

    #[test]
    fn test_boundary_at_1000() {
        assert_eq!(water_health_status(1000.0).label(), "Critical");
        assert_eq!(pollution_zone(1000.0).label(), "Critical Pollution Zone");
    }

    #[test]
    fn test_middle_buckets() {
        assert_eq!(water_health_status(199.9), WaterHealth::Good);
        assert_eq!(water_health_status(200.0), WaterHealth::Fair);
        assert_eq!(water_health_status(500.0), WaterHealth::Poor);
        assert_eq!(water_health_status(999.9), WaterHealth::Poor);
        assert_eq!(pollution_zone(200.0), PollutionZone::ModeratePollution);
        assert_eq!(pollution_zone(500.0), PollutionZone::ChemicalZone);
    }

    #[test]
    fn test_labels_display() {
        assert_eq!(WaterHealth::Fair.to_string(), "Fair");
        assert_eq!(PollutionZone::ChemicalZone.to_string(), "Chemical Zone (High TDS)");
    }

    #[test]
    fn test_negative_and_nan() {
        assert_eq!(water_health_status(-1.0), WaterHealth::Excellent);
        assert_eq!(water_health_status(f32::NAN), WaterHealth::Critical);
        assert_eq!(pollution_zone(f32::NAN), PollutionZone::CriticalPollution);
    }
}
