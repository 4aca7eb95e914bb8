//! Presentation model for a risk assessment.
//!
//! Pure transform: `RiskAssessment -> DashboardModel`. Everything that reaches
//! a style class goes through [`RiskLevel::classify`] or
//! [`AlertSeverity::classify`]; everything numeric goes through
//! [`coerce_number`]. Renderers only ever see the finished model.

use crate::model::{coerce_count, coerce_number, Hazard, HistoricalEvent, RiskAssessment, WeatherAlert};

/// Hazard whose card also lists nearby historical events.
pub const HISTORICAL_HAZARD_ID: &str = "historical_landslides";
/// Events listed individually on that card; the rest are summarised.
pub const EVENT_PREVIEW_LIMIT: usize = 5;
pub const UNKNOWN_DATE: &str = "ukjent dato";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
    Unknown,
}

impl RiskLevel {
    /// Anything outside the known set degrades to `Unknown`.
    pub fn classify(raw: Option<&str>) -> Self {
        match raw {
            Some("low") => RiskLevel::Low,
            Some("medium") => RiskLevel::Medium,
            Some("high") => RiskLevel::High,
            Some("very_high") => RiskLevel::VeryHigh,
            _ => RiskLevel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very_high",
            RiskLevel::Unknown => "unknown",
        }
    }

    pub fn css_class(&self) -> String {
        format!("level-{}", self.as_str())
    }

    fn banner_label(&self) -> Option<&'static str> {
        match self {
            RiskLevel::Low => Some("Lav risiko"),
            RiskLevel::Medium => Some("Moderat risiko"),
            RiskLevel::High => Some("Høy risiko"),
            RiskLevel::VeryHigh => Some("Svært høy risiko"),
            RiskLevel::Unknown => None,
        }
    }

    fn card_label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Lav",
            RiskLevel::Medium => "Moderat",
            RiskLevel::High => "Høy",
            RiskLevel::VeryHigh => "Svært høy",
            RiskLevel::Unknown => "Ukjent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Extreme,
    Severe,
    Moderate,
    Minor,
}

impl AlertSeverity {
    /// Anything outside the known set degrades to `Minor`.
    pub fn classify(raw: &str) -> Self {
        match raw {
            "Extreme" => AlertSeverity::Extreme,
            "Severe" => AlertSeverity::Severe,
            "Moderate" => AlertSeverity::Moderate,
            _ => AlertSeverity::Minor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Extreme => "Extreme",
            AlertSeverity::Severe => "Severe",
            AlertSeverity::Moderate => "Moderate",
            AlertSeverity::Minor => "Minor",
        }
    }

    pub fn css_class(&self) -> String {
        format!("severity-{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub score: f64,
    pub level: RiskLevel,
    /// Localized label, or the literal level text when it is not recognised.
    pub label: String,
    pub summary: String,
    pub address: String,
    /// Meters, one decimal.
    pub elevation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertView {
    pub event: String,
    /// Shown as received; only `severity` is sanitized.
    pub severity_text: String,
    pub severity: AlertSeverity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HazardCard {
    pub id: String,
    pub name: String,
    pub level: RiskLevel,
    pub body: CardBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardBody {
    Failed {
        error: String,
    },
    Scored {
        score: f64,
        level_label: String,
        details: String,
        events: Option<EventPreview>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventPreview {
    pub items: Vec<EventLine>,
    /// Events beyond the preview limit.
    pub remaining: usize,
}

impl EventPreview {
    pub fn remaining_line(&self) -> Option<String> {
        (self.remaining > 0).then(|| format!("… og {} til", self.remaining))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventLine {
    pub kind: String,
    pub date: String,
    pub distance_m: f64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardModel {
    pub banner: Banner,
    pub alerts: Vec<AlertView>,
    pub cards: Vec<HazardCard>,
}

impl DashboardModel {
    pub fn from_assessment(ra: &RiskAssessment) -> Self {
        let mut hazards: Vec<&Hazard> = ra.hazards.iter().collect();
        sort_hazards(&mut hazards);

        Self {
            banner: build_banner(ra),
            alerts: ra.weather_alerts.iter().map(build_alert).collect(),
            cards: hazards
                .into_iter()
                .map(|h| build_card(h, &ra.historical_events))
                .collect(),
        }
    }
}

/// Stable sort: failed hazards after successful ones, then score descending.
pub fn sort_hazards(hazards: &mut [&Hazard]) {
    hazards.sort_by(|a, b| {
        a.has_error().cmp(&b.has_error()).then_with(|| {
            coerce_number(&b.score)
                .partial_cmp(&coerce_number(&a.score))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
}

fn build_banner(ra: &RiskAssessment) -> Banner {
    let raw = ra.overall_level.as_deref();
    let level = RiskLevel::classify(raw);
    let label = match (level.banner_label(), raw) {
        (Some(label), _) => label.to_string(),
        (None, Some("unknown")) => "Ukjent risiko".to_string(),
        (None, Some(other)) => other.to_string(),
        (None, None) => String::new(),
    };

    Banner {
        score: coerce_number(&ra.overall_score),
        level,
        label,
        summary: ra.summary.clone().unwrap_or_default(),
        address: ra.address.as_ref().map(|a| a.text.clone()).unwrap_or_default(),
        elevation: ra.elevation.filter(|e| e.is_finite()).map(|e| format!("{:.1}", e)),
    }
}

fn build_alert(alert: &WeatherAlert) -> AlertView {
    AlertView {
        event: alert.event.clone(),
        severity_text: alert.severity.clone(),
        severity: AlertSeverity::classify(&alert.severity),
        description: alert.description.clone(),
    }
}

fn build_card(h: &Hazard, events: &[HistoricalEvent]) -> HazardCard {
    let name = h.name.clone().unwrap_or_default();

    if h.has_error() {
        return HazardCard {
            id: h.id.clone(),
            name,
            level: RiskLevel::Unknown,
            body: CardBody::Failed {
                error: h.error.clone().unwrap_or_default(),
            },
        };
    }

    let raw = h.level.as_deref();
    let level = RiskLevel::classify(raw);
    let level_label = match (level, raw) {
        (RiskLevel::Unknown, Some(other)) if !other.is_empty() && other != "unknown" => other.to_string(),
        _ => level.card_label().to_string(),
    };
    let details = h
        .details
        .as_deref()
        .filter(|d| !d.is_empty())
        .or(h.description.as_deref())
        .unwrap_or("")
        .to_string();
    let events = (h.id == HISTORICAL_HAZARD_ID && !events.is_empty()).then(|| preview_events(events));

    HazardCard {
        id: h.id.clone(),
        name,
        level,
        body: CardBody::Scored {
            score: coerce_number(&h.score),
            level_label,
            details,
            events,
        },
    }
}

/// First [`EVENT_PREVIEW_LIMIT`] events in input order, plus the overflow count.
pub fn preview_events(events: &[HistoricalEvent]) -> EventPreview {
    EventPreview {
        items: events.iter().take(EVENT_PREVIEW_LIMIT).map(event_line).collect(),
        remaining: events.len().saturating_sub(EVENT_PREVIEW_LIMIT),
    }
}

fn event_line(e: &HistoricalEvent) -> EventLine {
    EventLine {
        kind: e.kind.clone(),
        date: e
            .date
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| UNKNOWN_DATE.to_string()),
        distance_m: coerce_number(&e.distance_m),
        tags: damage_tags(e),
    }
}

/// "Bygningsskade", "Vegskade", "<n> omkommet", in that order.
pub fn damage_tags(e: &HistoricalEvent) -> Vec<String> {
    let mut tags = Vec::new();
    if e.building_damage {
        tags.push("Bygningsskade".to_string());
    }
    if e.road_damage {
        tags.push("Vegskade".to_string());
    }
    let fatalities = coerce_count(&e.fatalities);
    if fatalities > 0 {
        tags.push(format!("{} omkommet", fatalities));
    }
    tags
}
