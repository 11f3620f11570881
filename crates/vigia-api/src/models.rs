// Operational feed response types
//
// The feed returns one JSON document bundling every collection the client
// renders. Fields use `#[serde(default)]` liberally because upstream sources
// (sensor networks, civil-defense bulletins) drop fields independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── Dataset ──────────────────────────────────────────────────────────

/// Everything fetched in one round trip.
///
/// Treated as an opaque value by the sync engine: it is stored, cached,
/// and handed to consumers whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationalDataset {
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub cameras: Vec<Camera>,
    #[serde(default)]
    pub sirens: Vec<Siren>,
    #[serde(default)]
    pub weather_stations: Vec<WeatherStation>,
    #[serde(default)]
    pub support_points: Vec<SupportPoint>,
    #[serde(default)]
    pub health_units: Vec<HealthUnit>,
    /// City operational stage (1 = normal .. 5 = crisis).
    #[serde(default)]
    pub stage: Option<u8>,
    /// Heat level (1 .. 5).
    #[serde(default)]
    pub heat_level: Option<u8>,
}

impl OperationalDataset {
    /// `true` when the feed carried no collections and no levels.
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
            && self.cameras.is_empty()
            && self.sirens.is_empty()
            && self.weather_stations.is_empty()
            && self.support_points.is_empty()
            && self.health_units.is_empty()
            && self.stage.is_none()
            && self.heat_level.is_none()
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            alerts: self.alerts.len(),
            cameras: self.cameras.len(),
            sirens: self.sirens.len(),
            weather_stations: self.weather_stations.len(),
            support_points: self.support_points.len(),
            health_units: self.health_units.len(),
            stage: self.stage,
            heat_level: self.heat_level,
        }
    }
}

/// Per-collection counts, for logs and status displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub alerts: usize,
    pub cameras: usize,
    pub sirens: usize,
    pub weather_stations: usize,
    pub support_points: usize,
    pub health_units: usize,
    pub stage: Option<u8>,
    pub heat_level: Option<u8>,
}

// ── Shared ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

// ── Alerts ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Advisory,
    Warning,
    Emergency,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub severity: AlertSeverity,
    /// Neighborhood or region the alert applies to.
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

// ── Cameras ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub online: Option<bool>,
}

// ── Sirens ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SirenStatus {
    Idle,
    Active,
    Fault,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Siren {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub status: SirenStatus,
    /// Community served by this siren.
    #[serde(default)]
    pub community: Option<String>,
}

// ── Weather / rain stations ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherStation {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub rain_15min_mm: Option<f64>,
    #[serde(default)]
    pub rain_1h_mm: Option<f64>,
    #[serde(default)]
    pub rain_24h_mm: Option<f64>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

// ── Support points / health units ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportPoint {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthUnit {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    /// Facility type as published upstream (clinic, hospital, ...).
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_collections_default_to_empty() {
        let ds: OperationalDataset = serde_json::from_str(r#"{"stage": 2}"#).unwrap();
        assert!(ds.alerts.is_empty());
        assert_eq!(ds.stage, Some(2));
        assert!(!ds.is_empty());
    }

    #[test]
    fn empty_object_is_empty_dataset() {
        let ds: OperationalDataset = serde_json::from_str("{}").unwrap();
        assert!(ds.is_empty());
    }

    #[test]
    fn unknown_severity_falls_back() {
        let alert: Alert = serde_json::from_value(serde_json::json!({
            "id": "a1",
            "title": "Heavy rain",
            "severity": "catastrophic"
        }))
        .unwrap();
        assert_eq!(alert.severity, AlertSeverity::Unknown);
        assert_eq!(alert.severity.to_string(), "unknown");
    }

    #[test]
    fn summary_counts_collections() {
        let ds = OperationalDataset {
            sirens: vec![Siren {
                id: "s1".into(),
                name: "Morro A".into(),
                location: GeoPoint { lat: -22.9, lon: -43.2 },
                status: SirenStatus::Idle,
                community: None,
            }],
            heat_level: Some(3),
            ..OperationalDataset::default()
        };
        let summary = ds.summary();
        assert_eq!(summary.sirens, 1);
        assert_eq!(summary.alerts, 0);
        assert_eq!(summary.heat_level, Some(3));
    }
}
