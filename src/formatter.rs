use crate::{
    types::{AlertLevel, Momentum},
    view::ConsumerSnapshot,
};

// ANSI color codes
pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";

    pub const RED: &'static str = "\x1b[31m";
    pub const WHITE: &'static str = "\x1b[37m";
    pub const GRAY: &'static str = "\x1b[90m";

    // Bright colors
    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &'static str = "\x1b[93m";
    pub const BRIGHT_BLUE: &'static str = "\x1b[94m";
    pub const BRIGHT_MAGENTA: &'static str = "\x1b[95m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Minimal,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "minimal" => OutputFormat::Minimal,
            _ => OutputFormat::Table,
        }
    }
}

const TABLE_WIDTH: usize = 62;

pub struct RadarFormatter {
    format: OutputFormat,
    colored: bool,
}

impl RadarFormatter {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    pub fn format_snapshot(&self, symbol: &str, snapshot: &ConsumerSnapshot) -> String {
        match self.format {
            OutputFormat::Table => self.format_table(symbol, snapshot),
            OutputFormat::Json => self.format_json(symbol, snapshot),
            OutputFormat::Minimal => self.format_minimal(symbol, snapshot),
        }
    }

    /// Short connection status: connected / connecting / disconnected with reason.
    pub fn status_label(snapshot: &ConsumerSnapshot) -> String {
        match (snapshot.is_connected, snapshot.is_loading, &snapshot.error) {
            (true, _, _) => "connected".to_string(),
            (false, true, _) => "connecting".to_string(),
            (false, false, Some(reason)) => format!("disconnected ({reason})"),
            (false, false, None) => "disconnected".to_string(),
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.colored {
            format!("{}{}{}", color, text, Colors::RESET)
        } else {
            text.to_string()
        }
    }

    fn signed_color(value: f64) -> &'static str {
        if value > 0.0 {
            Colors::BRIGHT_GREEN
        } else if value < 0.0 {
            Colors::BRIGHT_RED
        } else {
            Colors::WHITE
        }
    }

    fn row(&self, label: &str, value: &str) -> String {
        let gray = if self.colored { Colors::GRAY } else { "" };
        let reset = if self.colored { Colors::RESET } else { "" };
        format!("{gray}│{reset} {:<12} {gray}│{reset} {}", label, value)
    }

    fn format_table(&self, symbol: &str, snapshot: &ConsumerSnapshot) -> String {
        let rule = "─".repeat(TABLE_WIDTH);
        let mut lines = Vec::new();
        lines.push(self.paint(Colors::GRAY, &format!("┌{rule}")));
        lines.push(self.row(
            "SYMBOL",
            &self.paint(&format!("{}{}", Colors::BOLD, Colors::BRIGHT_YELLOW), symbol),
        ));

        let status = Self::status_label(snapshot);
        let status_color = if snapshot.is_connected {
            Colors::BRIGHT_GREEN
        } else if snapshot.is_loading {
            Colors::BRIGHT_YELLOW
        } else {
            Colors::BRIGHT_RED
        };
        lines.push(self.row("STATUS", &self.paint(status_color, &status)));
        lines.push(self.paint(Colors::GRAY, &format!("├{rule}")));

        let data = &snapshot.data;
        match &data.snapshot {
            Some(change) => {
                lines.push(self.row(
                    "PRICE 1H",
                    &self.paint(
                        Self::signed_color(change.price_change),
                        &format!("{:+.2}%", change.price_change),
                    ),
                ));
                lines.push(self.row(
                    "VOLUME",
                    &self.paint(
                        Self::signed_color(change.volume_change),
                        &format!("{:+.2}%", change.volume_change),
                    ),
                ));
                lines.push(self.row(
                    "RSI",
                    &format!("{:.1} -> {:.1}", change.rsi_shift.from, change.rsi_shift.to),
                ));
                let momentum = match change.momentum {
                    Momentum::Rising => self.paint(Colors::BRIGHT_GREEN, "rising"),
                    Momentum::Falling => self.paint(Colors::BRIGHT_RED, "falling"),
                    Momentum::Neutral => "neutral".to_string(),
                    Momentum::Other => "unknown".to_string(),
                };
                lines.push(self.row("MOMENTUM", &momentum));
            }
            None => lines.push(self.row("SNAPSHOT", &self.paint(Colors::DIM, "waiting"))),
        }

        match &data.anomalies {
            Some(anomalies) if anomalies.alerts.is_empty() => {
                lines.push(self.row("ALERTS", "none"));
            }
            Some(anomalies) => {
                for (i, alert) in anomalies.alerts.iter().enumerate() {
                    let color = match alert.level {
                        AlertLevel::High => Colors::BRIGHT_RED,
                        AlertLevel::Watch => Colors::BRIGHT_YELLOW,
                        AlertLevel::Other => Colors::WHITE,
                    };
                    let label = if i == 0 { "ALERTS" } else { "" };
                    lines.push(self.row(
                        label,
                        &format!("{} {}", self.paint(color, &alert.title), alert.description),
                    ));
                }
            }
            None => lines.push(self.row("ALERTS", &self.paint(Colors::DIM, "waiting"))),
        }

        match &data.tempo {
            Some(tempo) => {
                lines.push(self.row(
                    "TEMPO",
                    &format!(
                        "{} / {} / {}",
                        tempo.volatility.label, tempo.activity.label, tempo.direction.label
                    ),
                ));
                if !tempo.summary.is_empty() {
                    lines.push(self.row("", &self.paint(Colors::DIM, &tempo.summary)));
                }
            }
            None => lines.push(self.row("TEMPO", &self.paint(Colors::DIM, "waiting"))),
        }

        match data.timeline.as_ref().and_then(|t| t.events.first()) {
            Some(event) => lines.push(self.row(
                "LATEST",
                &format!("{} {}", self.paint(Colors::BRIGHT_BLUE, &event.time), event.title),
            )),
            None if data.timeline.is_some() => lines.push(self.row("LATEST", "no events")),
            None => lines.push(self.row("LATEST", &self.paint(Colors::DIM, "waiting"))),
        }

        lines.push(self.paint(Colors::GRAY, &format!("├{rule}")));
        let updated = snapshot
            .last_update
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        lines.push(self.row("UPDATED", &updated));
        if let Some(error) = &snapshot.error {
            lines.push(self.row("ERROR", &self.paint(Colors::RED, error)));
        }
        lines.push(self.paint(Colors::GRAY, &format!("└{rule}")));
        lines.join("\n")
    }

    fn format_json(&self, symbol: &str, snapshot: &ConsumerSnapshot) -> String {
        let json_obj = serde_json::json!({
            "symbol": symbol,
            "snapshot": snapshot,
        });
        json_obj.to_string()
    }

    fn format_minimal(&self, symbol: &str, snapshot: &ConsumerSnapshot) -> String {
        let price = snapshot
            .data
            .snapshot
            .as_ref()
            .map(|s| format!("{:+.2}%", s.price_change))
            .unwrap_or_else(|| "-".to_string());
        let alerts = snapshot
            .data
            .anomalies
            .as_ref()
            .map(|a| a.alerts.len().to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} {} price1h={} alerts={}",
            symbol,
            Self::status_label(snapshot),
            price,
            alerts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnomalyAlert, AnomalyAlerts, ChangeSnapshot, RadarUpdate, RsiShift};

    fn populated() -> ConsumerSnapshot {
        ConsumerSnapshot {
            data: RadarUpdate {
                snapshot: Some(ChangeSnapshot {
                    price_change: -1.5,
                    volume_change: 22.0,
                    rsi_shift: RsiShift { from: 40.0, to: 35.5 },
                    momentum: Momentum::Falling,
                    news_count: 0,
                    news_topic: String::new(),
                    timestamp: String::new(),
                }),
                anomalies: Some(AnomalyAlerts {
                    alerts: vec![AnomalyAlert {
                        id: "support_break".to_string(),
                        level: AlertLevel::High,
                        icon: String::new(),
                        title: "Key Support Break".to_string(),
                        description: "Price broke $93000.00 (7-day low)".to_string(),
                        context: String::new(),
                        timestamp: String::new(),
                    }],
                    timestamp: String::new(),
                }),
                ..Default::default()
            },
            is_connected: true,
            ..Default::default()
        }
    }

    #[test]
    fn status_labels() {
        let mut snap = ConsumerSnapshot::default();
        assert_eq!(RadarFormatter::status_label(&snap), "disconnected");
        snap.is_loading = true;
        assert_eq!(RadarFormatter::status_label(&snap), "connecting");
        snap.is_loading = false;
        snap.error = Some("gave up".to_string());
        assert_eq!(RadarFormatter::status_label(&snap), "disconnected (gave up)");
        snap.is_connected = true;
        assert_eq!(RadarFormatter::status_label(&snap), "connected");
    }

    #[test]
    fn minimal_line() {
        let formatter = RadarFormatter::new(OutputFormat::Minimal, false);
        assert_eq!(
            formatter.format_snapshot("BTCUSDT", &populated()),
            "BTCUSDT connected price1h=-1.50% alerts=1"
        );
        assert_eq!(
            formatter.format_snapshot("BTCUSDT", &ConsumerSnapshot::default()),
            "BTCUSDT disconnected price1h=- alerts=-"
        );
    }

    #[test]
    fn plain_table_has_no_escape_codes() {
        let formatter = RadarFormatter::new(OutputFormat::Table, false);
        let table = formatter.format_snapshot("BTCUSDT", &populated());
        assert!(!table.contains('\x1b'));
        assert!(table.contains("Key Support Break"));
        assert!(table.contains("40.0 -> 35.5"));
        assert!(table.contains("never"));
    }

    #[test]
    fn json_uses_camel_case_fields() {
        let formatter = RadarFormatter::new(OutputFormat::Json, true);
        let out = formatter.format_snapshot("BTCUSDT", &populated());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["snapshot"]["isConnected"], true);
        assert_eq!(value["snapshot"]["data"]["snapshot"]["priceChange"], -1.5);
        assert!(value["snapshot"]["data"]["tempo"].is_null());
    }
}
