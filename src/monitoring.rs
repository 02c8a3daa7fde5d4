use crate::{error::RadarError, types::ChannelKey, view::ConsumerSnapshot};
use anyhow::Result;
use metrics::{Counter, Gauge, counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, sync::LazyLock};
use tracing::{error, info};

// Global metrics
pub static FRAMES_RECEIVED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("radar_frames_received_total"));
pub static MALFORMED_FRAME_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("radar_malformed_frames_total"));
pub static SERVER_ERROR_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("radar_server_errors_total"));
pub static RECONNECT_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("radar_reconnects_total"));
pub static FAILURE_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("radar_reconnect_exhausted_total"));
pub static CONNECTED_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("radar_connected"));

pub async fn setup_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "radar-client")
        .add_global_label("version", env!("CARGO_PKG_VERSION"));

    match builder.install() {
        Ok(_handle) => {
            info!(
                "Prometheus metrics server started on http://{}/metrics",
                addr
            );

            FRAMES_RECEIVED_COUNTER.absolute(0);
            MALFORMED_FRAME_COUNTER.absolute(0);
            SERVER_ERROR_COUNTER.absolute(0);
            RECONNECT_COUNTER.absolute(0);
            FAILURE_COUNTER.absolute(0);
            CONNECTED_GAUGE.set(0.0);

            Ok(())
        }
        Err(e) => {
            error!("Failed to start metrics server: {}", e);
            Err(RadarError::MetricsError(e.to_string()).into())
        }
    }
}

/// Point-in-time health of a radar subscription, for the `status` command.
#[derive(Debug)]
pub struct HealthStatus {
    pub symbol: Option<String>,
    pub is_healthy: bool,
    pub is_connected: bool,
    pub last_update: Option<chrono::DateTime<chrono::Utc>>,
    pub staleness: Option<chrono::Duration>,
    pub facets_populated: usize,
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn from_snapshot(key: Option<&ChannelKey>, snapshot: &ConsumerSnapshot) -> Self {
        Self::at(key, snapshot, chrono::Utc::now())
    }

    pub fn at(
        key: Option<&ChannelKey>,
        snapshot: &ConsumerSnapshot,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        let data = &snapshot.data;
        let facets_populated = [
            data.snapshot.is_some(),
            data.anomalies.is_some(),
            data.tempo.is_some(),
            data.timeline.is_some(),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count();

        Self {
            symbol: key.map(ToString::to_string),
            is_healthy: snapshot.is_connected && snapshot.error.is_none(),
            is_connected: snapshot.is_connected,
            last_update: snapshot.last_update,
            staleness: snapshot.last_update.map(|ts| now - ts),
            facets_populated,
            error: snapshot.error.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": if self.is_healthy { "healthy" } else { "unhealthy" },
            "symbol": self.symbol,
            "connected": self.is_connected,
            "last_update": self.last_update,
            "staleness_seconds": self.staleness.map(|s| s.num_seconds()),
            "facets_populated": self.facets_populated,
            "error": self.error,
            "timestamp": chrono::Utc::now()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RadarUpdate, Timeline};
    use chrono::TimeZone;

    #[test]
    fn health_reflects_snapshot() {
        let last = chrono::Utc.with_ymd_and_hms(2025, 12, 25, 10, 0, 0).unwrap();
        let now = chrono::Utc.with_ymd_and_hms(2025, 12, 25, 10, 1, 30).unwrap();
        let snapshot = ConsumerSnapshot {
            data: RadarUpdate {
                timeline: Some(Timeline {
                    events: vec![],
                    timestamp: String::new(),
                }),
                ..Default::default()
            },
            is_connected: true,
            last_update: Some(last),
            ..Default::default()
        };
        let key = ChannelKey::new("ethusdt").unwrap();
        let health = HealthStatus::at(Some(&key), &snapshot, now);
        assert!(health.is_healthy);
        assert_eq!(health.facets_populated, 1);
        assert_eq!(health.staleness.map(|s| s.num_seconds()), Some(90));

        let json = health.to_json();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["symbol"], "ETHUSDT");
    }

    #[test]
    fn server_error_marks_unhealthy() {
        let snapshot = ConsumerSnapshot {
            is_connected: true,
            error: Some("rate limited".to_string()),
            ..Default::default()
        };
        let health = HealthStatus::from_snapshot(None, &snapshot);
        assert!(!health.is_healthy);
        assert_eq!(health.to_json()["status"], "unhealthy");
    }
}
