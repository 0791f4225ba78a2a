use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level error for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("rejected control request: {0}")]
    Control(#[from] ControlError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the exchange side: stream transport, REST history, payload parsing
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket transport: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("http request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("exchange returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed tick payload: {0}")]
    MalformedTick(String),

    #[error("malformed kline row: {0}")]
    MalformedKline(String),
}

/// Boundary rejections for inbound control operations. No state is mutated
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("unknown position side: {0} (expected LONG or SHORT)")]
    UnknownSide(String),

    #[error("{field} must be a finite, non-negative number, got {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("stop-loss/take-profit for entry {entry_price} do not fit in a decimal")]
    LevelsOutOfRange { entry_price: Decimal },
}
