use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "radar-client",
    about = "realtime market radar client with bounded reconnect and live symbol switching",
    version
)]
pub struct Args {
    /// Trading pair to subscribe to (e.g., BTCUSDT, ETHUSDT)
    #[arg(short, long, default_value = "BTCUSDT")]
    pub symbol: String,

    /// Radar WebSocket base URL; the symbol is appended as the last path segment
    #[arg(short, long, default_value = "ws://localhost:8000/api/v1/market/radar/ws")]
    pub url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, default_value = "9090")]
    pub metrics_port: u16,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// Delay between reconnection attempts in milliseconds
    #[arg(long, default_value = "3000")]
    pub reconnect_delay_ms: u64,

    /// Maximum connection attempts before giving up (0 for unlimited)
    #[arg(long, default_value = "5")]
    pub max_reconnects: u32,

    /// Output format: table, json, minimal
    #[arg(long, default_value = "table")]
    pub format: String,

    /// Disable colored output (useful for piping to files)
    #[arg(long)]
    pub no_color: bool,

    /// Quiet mode - only print snapshots and errors
    #[arg(long)]
    pub quiet: bool,

    /// Ignore stdin commands (symbol switching, retry, status)
    #[arg(long)]
    pub no_input: bool,
}
