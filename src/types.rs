/// file: src/types.rs
/// description: channel key, radar facet models and inbound frame shapes for the market radar channel
use crate::error::RadarError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading-pair symbol selecting which radar stream to subscribe to.
///
/// Normalized to upper case, matching how the radar server resolves the
/// symbol in its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelKey(String);

impl ChannelKey {
    pub fn new(symbol: &str) -> Result<Self, RadarError> {
        let normalized = symbol.trim().to_ascii_uppercase();
        if normalized.is_empty() || !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RadarError::InvalidSymbol(symbol.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accumulated radar payload. Each facet stays `None` until first received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarUpdate {
    #[serde(default)]
    pub snapshot: Option<ChangeSnapshot>,
    #[serde(default)]
    pub anomalies: Option<AnomalyAlerts>,
    #[serde(default)]
    pub tempo: Option<MarketTempo>,
    #[serde(default)]
    pub timeline: Option<Timeline>,
}

impl RadarUpdate {
    /// Folds `delta` into `self`. Only facets present in the delta overwrite;
    /// a populated facet is never reset to `None` here. Returns how many
    /// facets were replaced.
    pub fn merge(&mut self, delta: RadarUpdate) -> usize {
        let mut merged = 0;
        if let Some(snapshot) = delta.snapshot {
            self.snapshot = Some(snapshot);
            merged += 1;
        }
        if let Some(anomalies) = delta.anomalies {
            self.anomalies = Some(anomalies);
            merged += 1;
        }
        if let Some(tempo) = delta.tempo {
            self.tempo = Some(tempo);
            merged += 1;
        }
        if let Some(timeline) = delta.timeline {
            self.timeline = Some(timeline);
            merged += 1;
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none()
            && self.anomalies.is_none()
            && self.tempo.is_none()
            && self.timeline.is_none()
    }
}

// 1h change snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSnapshot {
    pub price_change: f64,
    pub volume_change: f64,
    pub rsi_shift: RsiShift,
    pub momentum: Momentum,
    #[serde(default)]
    pub news_count: u32,
    #[serde(default)]
    pub news_topic: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiShift {
    pub from: f64,
    pub to: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Rising,
    Falling,
    Neutral,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAlerts {
    pub alerts: Vec<AnomalyAlert>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub id: String,
    #[serde(rename = "type")]
    pub level: AlertLevel,
    #[serde(default)]
    pub icon: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    High,
    Watch,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTempo {
    pub volatility: TempoGauge,
    pub activity: TempoGauge,
    pub direction: TempoGauge,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub timestamp: String,
}

/// One tempo dial. `trend` is set on volatility, `vs_average` on activity
/// and `bias` on direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoGauge {
    pub level: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vs_average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub events: Vec<TimelineEvent>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: TimelineKind,
    #[serde(default)]
    pub icon: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineKind {
    Price,
    Volume,
    News,
    Technical,
    #[serde(other)]
    Other,
}

/// Per-facet failure strings the server attaches when one of its four
/// sources could not be computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetErrors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
}

impl FacetErrors {
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none()
            && self.anomalies.is_none()
            && self.tempo.is_none()
            && self.timeline.is_none()
    }

    /// Applies a newer error report: facets that arrived with data lose
    /// their old error, facets reported as failed take the new one.
    pub fn apply(&mut self, delta: &RadarUpdate, reported: FacetErrors) {
        if delta.snapshot.is_some() {
            self.snapshot = None;
        }
        if delta.anomalies.is_some() {
            self.anomalies = None;
        }
        if delta.tempo.is_some() {
            self.tempo = None;
        }
        if delta.timeline.is_some() {
            self.timeline = None;
        }
        if reported.snapshot.is_some() {
            self.snapshot = reported.snapshot;
        }
        if reported.anomalies.is_some() {
            self.anomalies = reported.anomalies;
        }
        if reported.tempo.is_some() {
            self.tempo = reported.tempo;
        }
        if reported.timeline.is_some() {
            self.timeline = reported.timeline;
        }
    }
}

/// Inbound text frame shapes, discriminated by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    MarketRadarUpdate {
        #[serde(default)]
        symbol: Option<String>,
        #[serde(default)]
        timestamp: Option<String>,
        data: RadarUpdate,
        #[serde(default)]
        errors: Option<FacetErrors>,
    },
    Error {
        message: String,
    },
}

/// Parses the server's timestamps: RFC 3339, or naive ISO-8601 taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}
