// Technical indicators module
// RSI, EMA/SMA and Bollinger Bands over close prices

pub mod bollinger;
pub mod moving_average;
pub mod provider;
pub mod rsi;

pub use bollinger::calculate_bollinger;
pub use moving_average::{calculate_ema, calculate_sma};
pub use provider::{IndicatorProvider, TechnicalIndicators, MIN_CLOSES};
pub use rsi::calculate_rsi;
