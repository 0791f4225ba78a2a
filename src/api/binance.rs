use crate::error::FeedError;
use crate::models::{Candle, Tick, Timeframe};
use chrono::DateTime;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

pub const BINANCE_REST_BASE: &str = "https://api.binance.com";
pub const BINANCE_STREAM_BASE: &str = "wss://fstream.binance.com/ws";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// REST client for historical klines
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    symbol: String,
}

/// aggTrade stream payload; only the fields we use
#[derive(Debug, Deserialize)]
struct AggTradeMessage {
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "T")]
    trade_time: i64,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>, symbol: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            symbol: symbol.into(),
        }
    }

    /// aggTrade stream for this client's symbol, so trades and history
    /// always describe the same market
    pub fn agg_trade_stream_url(&self, stream_base: &str) -> String {
        format!(
            "{}/{}@aggTrade",
            stream_base.trim_end_matches('/'),
            self.symbol.to_lowercase()
        )
    }

    /// Fetch up to `limit` most recent candles for a timeframe, oldest first
    ///
    /// Rows that cannot be parsed are skipped with a warning rather than
    /// failing the whole timeframe.
    pub async fn fetch_klines(&self, tf: Timeframe, limit: usize) -> Result<Vec<Candle>, FeedError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", self.symbol.as_str()),
                ("interval", tf.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<Vec<Value>> = response.json().await?;
        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            match parse_kline_row(row) {
                Ok(candle) => candles.push(candle),
                Err(e) => tracing::warn!(timeframe = %tf, "Skipping kline row: {}", e),
            }
        }

        Ok(candles)
    }
}

/// Parse `[openTimeMillis, open, high, low, close, ...]` into a candle
///
/// Open time is truncated to whole seconds.
pub fn parse_kline_row(row: &[Value]) -> Result<Candle, FeedError> {
    if row.len() < 5 {
        return Err(FeedError::MalformedKline(format!(
            "expected at least 5 fields, got {}",
            row.len()
        )));
    }

    let open_time_ms = row[0]
        .as_i64()
        .ok_or_else(|| FeedError::MalformedKline(format!("bad open time: {}", row[0])))?;
    let start_time = DateTime::from_timestamp(open_time_ms.div_euclid(1000), 0)
        .ok_or_else(|| FeedError::MalformedKline(format!("open time out of range: {}", open_time_ms)))?;

    Ok(Candle {
        start_time,
        open: price_field(&row[1], "open")?,
        high: price_field(&row[2], "high")?,
        low: price_field(&row[3], "low")?,
        close: price_field(&row[4], "close")?,
    })
}

fn price_field(value: &Value, name: &str) -> Result<Decimal, FeedError> {
    let text = value
        .as_str()
        .ok_or_else(|| FeedError::MalformedKline(format!("{} is not a string: {}", name, value)))?;
    let price = Decimal::from_str(text)
        .map_err(|e| FeedError::MalformedKline(format!("{} {:?}: {}", name, text, e)))?;

    if price <= Decimal::ZERO {
        return Err(FeedError::MalformedKline(format!("{} must be positive: {}", name, price)));
    }
    Ok(price)
}

/// Parse one aggTrade stream message into a tick
pub fn parse_agg_trade(payload: &str) -> Result<Tick, FeedError> {
    let message: AggTradeMessage =
        serde_json::from_str(payload).map_err(|e| FeedError::MalformedTick(e.to_string()))?;

    let price = Decimal::from_str(&message.price)
        .map_err(|e| FeedError::MalformedTick(format!("price {:?}: {}", message.price, e)))?;
    if price <= Decimal::ZERO {
        return Err(FeedError::MalformedTick(format!("non-positive price {}", price)));
    }

    let timestamp = DateTime::from_timestamp_millis(message.trade_time).ok_or_else(|| {
        FeedError::MalformedTick(format!("trade time out of range: {}", message.trade_time))
    })?;

    Ok(Tick { price, timestamp })
}
