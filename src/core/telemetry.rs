use std::fmt;

use serde::Serialize;

use crate::hardware::gps::GpsFix;
use crate::hardware::tds_sensor::TdsReading;
use crate::hardware::ultrasonic::is_obstacle;
use crate::utils::tds_calc::{PollutionZone, WaterHealth};

/// GPS position as the dashboard expects it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpsPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GasLevels {
    pub mq2: f32,
    pub mq135: f32,
}

/// Moisture of each sorting bin (%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BinMoisture {
    pub dry_bin: u8,
    pub wet_bin: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConveyorState {
    pub wet_active: bool,
    pub dry_active: bool,
}

/// Limits past which a snapshot raises an alert
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// Bin weight above which the bin counts as full (g)
    pub bin_full_grams: f32,
    /// Obstacles closer than this are reported (cm)
    pub obstacle_cm: f32,
    /// MQ135 reading above which the water is flagged as polluted (ppm)
    pub pollution_mq135_ppm: f32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            bin_full_grams: 4500.0,
            obstacle_cm: 25.0,
            pollution_mq135_ppm: 400.0,
        }
    }
}

/// Alert types, named as the backend names them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    BinFull,
    Obstacle,
    Pollution,
}

impl AlertKind {
    pub fn label(self) -> &'static str {
        match self {
            AlertKind::BinFull => "bin_full",
            AlertKind::Obstacle => "obstacle",
            AlertKind::Pollution => "pollution",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One poll of every peripheral (hardware independent)
///
/// Readings that were not taken stay `None` and are left out of the JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TelemetrySnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f32>,
    /// Speed over ground (m/s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satellites: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ultrasonic_cm: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<GasLevels>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tds_ppm: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_health: Option<WaterHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pollution_zone: Option<PollutionZone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moisture: Option<BinMoisture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loadcell_grams: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conveyor: Option<ConveyorState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propeller_active: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl TelemetrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position, speed and satellite count from a fix. `None` clears all three.
    ///
    /// A fix the receiver has since lost is kept and flagged with a warning.
    pub fn with_gps(mut self, fix: Option<GpsFix>) -> Self {
        if fix.is_some_and(|f| !f.current) {
            self.add_warning("gps: fix lost, reporting last known position");
        }
        self.gps = fix.map(|f| GpsPoint {
            lat: f.latitude,
            lon: f.longitude,
        });
        self.speed = fix.map(|f| f.speed_mps);
        self.satellites = fix.map(|f| f.satellites);
        self
    }

    pub fn with_heading(mut self, heading: Option<f32>) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_distance(mut self, distance_cm: Option<f32>) -> Self {
        self.ultrasonic_cm = distance_cm;
        self
    }

    pub fn with_temperature(mut self, celsius: Option<f32>) -> Self {
        self.temperature_c = celsius;
        self
    }

    pub fn with_gas(mut self, mq2_ppm: f32, mq135_ppm: f32) -> Self {
        self.gas = Some(GasLevels {
            mq2: mq2_ppm,
            mq135: mq135_ppm,
        });
        self
    }

    /// TDS value together with its health and zone labels.
    pub fn with_tds(mut self, reading: Option<TdsReading>) -> Self {
        self.tds_ppm = reading.map(|r| r.tds_ppm);
        self.water_health = reading.map(|r| r.health);
        self.pollution_zone = reading.map(|r| r.zone);
        self
    }

    pub fn with_moisture(mut self, dry_bin: u8, wet_bin: u8) -> Self {
        self.moisture = Some(BinMoisture { dry_bin, wet_bin });
        self
    }

    pub fn with_load(mut self, grams: Option<f32>) -> Self {
        self.loadcell_grams = grams;
        self
    }

    pub fn with_conveyor(mut self, wet_active: bool, dry_active: bool) -> Self {
        self.conveyor = Some(ConveyorState {
            wet_active,
            dry_active,
        });
        self
    }

    pub fn with_propeller(mut self, active: bool) -> Self {
        self.propeller_active = Some(active);
        self
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Check the readings against `thresholds` and add a warning per alert.
    ///
    /// # Arguments
    /// - `thresholds`: bin weight, obstacle distance and MQ135 limits
    ///
    /// # Returns
    /// The alerts raised, in bin / obstacle / pollution order. Missing
    /// readings never raise an alert.
    pub fn derive_alerts(&mut self, thresholds: &AlertThresholds) -> Vec<AlertKind> {
        let mut raised = Vec::new();

        if let Some(grams) = self.loadcell_grams.filter(|g| *g > thresholds.bin_full_grams) {
            self.add_warning(format!("{}: bin weight {:.0} g above threshold", AlertKind::BinFull, grams));
            raised.push(AlertKind::BinFull);
        }
        if let Some(distance) = self
            .ultrasonic_cm
            .filter(|d| is_obstacle(*d, thresholds.obstacle_cm))
        {
            self.add_warning(format!("{}: obstacle detected at {:.1} cm", AlertKind::Obstacle, distance));
            raised.push(AlertKind::Obstacle);
        }
        if let Some(mq135) = self
            .gas
            .map(|gas| gas.mq135)
            .filter(|ppm| *ppm > thresholds.pollution_mq135_ppm)
        {
            self.add_warning(format!("{}: high MQ135 reading {:.0} ppm", AlertKind::Pollution, mq135));
            raised.push(AlertKind::Pollution);
        }

        raised
    }

    /// One-line summary for the log
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if let Some(gps) = self.gps {
            parts.push(format!("GPS:{:.5},{:.5}", gps.lat, gps.lon));
        }
        if let Some(heading) = self.heading {
            parts.push(format!("heading:{:.0}°", heading));
        }
        if let Some(distance) = self.ultrasonic_cm {
            parts.push(format!("range:{:.1}cm", distance));
        }
        if let Some(temp) = self.temperature_c {
            parts.push(format!("temp:{:.1}°C", temp));
        }
        if let Some(gas) = self.gas {
            parts.push(format!("MQ2:{:.0}ppm MQ135:{:.0}ppm", gas.mq2, gas.mq135));
        }
        if let Some(tds) = self.tds_ppm {
            match self.water_health {
                Some(health) => parts.push(format!("TDS:{:.1}ppm ({})", tds, health)),
                None => parts.push(format!("TDS:{:.1}ppm", tds)),
            }
        }
        if let Some(moisture) = self.moisture {
            parts.push(format!(
                "moisture dry:{}% wet:{}%",
                moisture.dry_bin, moisture.wet_bin
            ));
        }
        if let Some(grams) = self.loadcell_grams {
            parts.push(format!("load:{:.1}g", grams));
        }
        if !self.warnings.is_empty() {
            parts.push(format!("warnings:{}", self.warnings.len()));
        }

        if parts.is_empty() {
            "no readings".to_string()
        } else {
            parts.join(", ")
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
