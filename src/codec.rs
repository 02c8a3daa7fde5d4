// file: src/codec.rs
// description: decodes raw radar channel text frames into typed updates or error signals

use crate::types::{FacetErrors, InboundFrame, RadarUpdate, parse_timestamp};
use chrono::{DateTime, Utc};

/// Facet delta carried by one `market_radar_update` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarDelta {
    pub symbol: Option<String>,
    /// Server timestamp when present and parseable.
    pub timestamp: Option<DateTime<Utc>>,
    pub facets: RadarUpdate,
    pub facet_errors: FacetErrors,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Update(RadarDelta),
    ServerError { message: String },
    Malformed { reason: String },
}

/// Decodes one inbound text frame. Never fails: anything that is not one of
/// the two known shapes comes back as [`Decoded::Malformed`].
pub fn decode(text: &str) -> Decoded {
    match serde_json::from_str::<InboundFrame>(text) {
        Ok(InboundFrame::MarketRadarUpdate {
            symbol,
            timestamp,
            data,
            errors,
        }) => Decoded::Update(RadarDelta {
            symbol,
            timestamp: timestamp.as_deref().and_then(parse_timestamp),
            facets: data,
            facet_errors: errors.unwrap_or_default(),
        }),
        Ok(InboundFrame::Error { message }) => Decoded::ServerError { message },
        Err(e) => Decoded::Malformed {
            reason: e.to_string(),
        },
    }
}
