//! Wire types for the search and risk endpoints.
//!
//! Decoding is lenient. Enumerations stay raw strings and the numeric fields
//! the dashboard ranks or displays stay raw JSON values; they are interpreted
//! at render time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A geocoded address as returned by `/api/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub kommunenummer: String,
    #[serde(default)]
    pub kommunenavn: Option<String>,
    #[serde(default)]
    pub postnummer: Option<String>,
    #[serde(default)]
    pub poststed: Option<String>,
}

impl Address {
    /// Secondary line in the result list: `"0150 OSLO, Oslo"`.
    pub fn subtitle(&self) -> String {
        format!(
            "{} {}, {}",
            self.postnummer.as_deref().unwrap_or(""),
            self.poststed.as_deref().unwrap_or(""),
            self.kommunenavn.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default)]
    pub overall_score: Value,
    #[serde(default)]
    pub overall_level: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub hazards: Vec<Hazard>,
    #[serde(default)]
    pub weather_alerts: Vec<WeatherAlert>,
    #[serde(default)]
    pub historical_events: Vec<HistoricalEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hazard {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub score: Value,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Set when this hazard's own check failed; score and level are then unreliable.
    #[serde(default)]
    pub error: Option<String>,
}

impl Hazard {
    pub fn has_error(&self) -> bool {
        self.error.as_deref().map_or(false, |e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherAlert {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalEvent {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub distance_m: Value,
    #[serde(default)]
    pub building_damage: bool,
    #[serde(default)]
    pub road_damage: bool,
    #[serde(default)]
    pub fatalities: Value,
    #[serde(default)]
    pub description: Option<String>,
}

/// Coerce a loosely typed JSON value to a number; anything else is 0.
pub fn coerce_number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().filter(|x| x.is_finite()).unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()).unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Coerce a count (fatalities) to a non-negative integer.
pub fn coerce_count(v: &Value) -> u64 {
    let n = coerce_number(v);
    if n > 0.0 {
        n.floor() as u64
    } else {
        0
    }
}
