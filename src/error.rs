use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadarError {
    #[error("WebSocket connection error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Connection timeout after {secs}s")]
    Timeout { secs: u64 },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error(
        "Market radar connection lost after {attempts} attempts. Automatic reconnect stopped; reload or resubscribe to try again."
    )]
    ReconnectExhausted { attempts: u32 },

    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("Unsupported websocket scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Metrics server error: {0}")]
    MetricsError(String),
}
