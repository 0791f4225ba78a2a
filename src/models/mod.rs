use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod message;

pub use message::OutboundMessage;

/// Maximum number of candles kept per timeframe
pub const MAX_CANDLES: usize = 250;

/// A single trade event from the exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// OHLC candle
///
/// `open` is fixed at creation. `high`, `low` and `close` move as ticks land
/// in the bucket until a newer candle supersedes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub start_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    /// Open a new candle seeded entirely from one tick
    pub fn seeded(tick: &Tick) -> Self {
        Self {
            start_time: tick.timestamp,
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
        }
    }

    /// Fold a tick into this candle
    pub fn update(&mut self, price: Decimal) {
        self.close = price;
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
    }
}

/// Candle bucket width
///
/// Boundaries are measured from the start of the previous candle, never
/// aligned to the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::M1, Timeframe::M30, Timeframe::H1, Timeframe::H4];

    /// Elapsed time after which a tick opens a new candle
    pub fn threshold(self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
        }
    }

    /// Exchange kline interval name
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Technical level an alert rule can watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorName {
    Rsi,
    Ema20,
    Ema50,
    Ema200,
    BollingerBands,
}

impl IndicatorName {
    pub const ALL: [IndicatorName; 5] = [
        IndicatorName::Rsi,
        IndicatorName::Ema20,
        IndicatorName::Ema50,
        IndicatorName::Ema200,
        IndicatorName::BollingerBands,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IndicatorName::Rsi => "RSI",
            IndicatorName::Ema20 => "EMA20",
            IndicatorName::Ema50 => "EMA50",
            IndicatorName::Ema200 => "EMA200",
            IndicatorName::BollingerBands => "BB",
        }
    }
}

impl fmt::Display for IndicatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndicatorName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndicatorName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// One of the three Bollinger bands, checked independently by alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Upper,
    Middle,
    Lower,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Upper, Band::Middle, Band::Lower];

    pub fn as_str(self) -> &'static str {
        match self {
            Band::Upper => "upper",
            Band::Middle => "middle",
            Band::Lower => "lower",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BollingerBands {
    #[serde(rename = "Upper")]
    pub upper: f64,
    #[serde(rename = "Middle")]
    pub middle: f64,
    #[serde(rename = "Lower")]
    pub lower: f64,
}

impl BollingerBands {
    pub fn band(&self, band: Band) -> f64 {
        match band {
            Band::Upper => self.upper,
            Band::Middle => self.middle,
            Band::Lower => self.lower,
        }
    }
}

/// Most recent indicator values for one timeframe
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IndicatorValues {
    #[serde(rename = "RSI")]
    pub rsi: f64,
    #[serde(rename = "EMA20")]
    pub ema20: f64,
    #[serde(rename = "EMA50")]
    pub ema50: f64,
    #[serde(rename = "EMA200")]
    pub ema200: f64,
    #[serde(rename = "BB")]
    pub bb: BollingerBands,
}

impl IndicatorValues {
    /// Value for a single-level indicator; `None` for Bollinger Bands
    pub fn level(&self, name: IndicatorName) -> Option<f64> {
        match name {
            IndicatorName::Rsi => Some(self.rsi),
            IndicatorName::Ema20 => Some(self.ema20),
            IndicatorName::Ema50 => Some(self.ema50),
            IndicatorName::Ema200 => Some(self.ema200),
            IndicatorName::BollingerBands => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LONG" => Ok(Side::Long),
            "SHORT" => Ok(Side::Short),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("LONG"),
            Side::Short => f.write_str("SHORT"),
        }
    }
}

/// The single tracked position used for SL/TP levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub entry_price: Decimal,
    pub side: Side,
    pub sl_percent: Decimal,
    pub tp_percent: Decimal,
    pub trailing_sl: bool,  // stored only, no effect on levels
    pub trailing_tp: bool,  // stored only, no effect on levels
}

impl Default for Position {
    fn default() -> Self {
        Self {
            entry_price: Decimal::ZERO,
            side: Side::Long,
            sl_percent: Decimal::ONE,
            tp_percent: Decimal::TWO,
            trailing_sl: false,
            trailing_tp: false,
        }
    }
}

/// Round to cents, half away from zero
pub fn round_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Format a price the way every outbound message does: two decimals
pub fn format_price(price: Decimal) -> String {
    format!("{:.2}", round_price(price))
}
