/// file: src/view.rs
/// description: consumer-facing view of one radar subscription, separated from connection logic
use crate::{codec::RadarDelta, machine::ConnectionState, types::{FacetErrors, RadarUpdate}};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Read-only view handed to rendering code.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerSnapshot {
    pub data: RadarUpdate,
    pub is_connected: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "FacetErrors::is_empty")]
    pub facet_errors: FacetErrors,
}

/// Mutable backing for [`ConsumerSnapshot`]. Only the connection machine
/// writes to it.
#[derive(Debug, Default)]
pub struct RadarView {
    data: RadarUpdate,
    error: Option<String>,
    facet_errors: FacetErrors,
    last_update: Option<DateTime<Utc>>,
    initial_load: bool,
}

impl RadarView {
    pub fn new() -> Self {
        Self {
            initial_load: true,
            ..Default::default()
        }
    }

    /// Starts from previously accumulated data, as a caller-initiated retry
    /// does.
    pub fn with_data(data: RadarUpdate, last_update: Option<DateTime<Utc>>) -> Self {
        Self {
            data,
            last_update,
            initial_load: true,
            ..Default::default()
        }
    }

    /// Merges one decoded delta. `received_at` stands in when the frame
    /// carried no usable timestamp.
    pub fn apply_delta(&mut self, delta: RadarDelta, received_at: DateTime<Utc>) -> usize {
        self.facet_errors.apply(&delta.facets, delta.facet_errors);
        let merged = self.data.merge(delta.facets);
        if merged > 0 {
            let ts = delta.timestamp.unwrap_or(received_at);
            // arrival order wins; a skewed server clock must not move the stamp backwards
            self.last_update = Some(match self.last_update {
                Some(prev) if prev > ts => prev,
                _ => ts,
            });
        }
        merged
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn mark_open(&mut self) {
        self.error = None;
        self.initial_load = false;
    }

    /// Ends the initial-load phase without a successful open.
    pub fn end_initial_load(&mut self) {
        self.initial_load = false;
    }

    pub fn data(&self) -> &RadarUpdate {
        &self.data
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn snapshot(&self, state: ConnectionState) -> ConsumerSnapshot {
        ConsumerSnapshot {
            data: self.data.clone(),
            is_connected: state == ConnectionState::Open,
            is_loading: state == ConnectionState::Connecting && self.initial_load,
            error: self.error.clone(),
            last_update: self.last_update,
            facet_errors: self.facet_errors.clone(),
        }
    }
}
