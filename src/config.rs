/// file: src/config.rs
/// description: configuration built from CLI arguments for the radar channel client
use crate::{
    cli::Args,
    client::ChannelSettings,
    error::RadarError,
    formatter::OutputFormat,
    types::ChannelKey,
};
use anyhow::Result;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub websocket: WebSocketConfig,
    pub subscription: SubscriptionConfig,
    pub metrics: MetricsConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnects: u32,
}

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub symbol: ChannelKey,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub format: OutputFormat,
    pub colored: bool,
    pub quiet: bool,
    pub interactive: bool,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        let base_url = Url::parse(&args.url)?;
        if !matches!(base_url.scheme(), "ws" | "wss") {
            return Err(RadarError::UnsupportedScheme(base_url.scheme().to_string()).into());
        }

        Ok(Config {
            websocket: WebSocketConfig {
                base_url,
                timeout: Duration::from_secs(args.timeout),
                reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
                max_reconnects: args.max_reconnects,
            },
            subscription: SubscriptionConfig {
                symbol: ChannelKey::new(&args.symbol)?,
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
            display: DisplayConfig {
                format: OutputFormat::from(args.format.as_str()),
                colored: !args.no_color,
                quiet: args.quiet,
                interactive: !args.no_input,
            },
        })
    }

    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            reconnect_delay: self.websocket.reconnect_delay,
            max_attempts: self.websocket.max_reconnects,
            connect_timeout: self.websocket.timeout,
        }
    }
}

impl WebSocketConfig {
    /// Connection target for `key`: the base URL with the symbol appended.
    pub fn target_for(&self, key: &ChannelKey) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(extra: &[&str]) -> Result<Config> {
        let mut argv = vec!["radar-client"];
        argv.extend_from_slice(extra);
        Config::from_args(&Args::parse_from(argv))
    }

    #[test]
    fn defaults_match_deployment() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.subscription.symbol.as_str(), "BTCUSDT");
        assert_eq!(config.websocket.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.websocket.max_reconnects, 5);
        assert!(config.display.interactive);

        let settings = config.channel_settings();
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn target_appends_symbol() {
        let config = parse(&[
            "--url",
            "wss://radar.example.com/api/v1/market/radar/ws/",
            "-s",
            "ethusdt",
        ])
        .unwrap();
        let target = config.websocket.target_for(&config.subscription.symbol);
        assert_eq!(target, "wss://radar.example.com/api/v1/market/radar/ws/ETHUSDT");
    }

    #[test]
    fn rejects_http_scheme_and_bad_symbol() {
        assert!(parse(&["--url", "http://localhost:8000/ws"]).is_err());
        assert!(parse(&["--symbol", "BTC/USDT"]).is_err());
    }
}
