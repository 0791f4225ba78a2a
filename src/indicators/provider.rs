use super::{calculate_bollinger, calculate_ema, calculate_rsi};
use crate::models::IndicatorValues;

/// Minimum number of closes before any indicator is computed for a timeframe
pub const MIN_CLOSES: usize = 200;

/// Closes (oldest first) -> latest indicator values
///
/// Returns `None` when there is not enough history; the caller skips that
/// timeframe for the current cycle.
pub trait IndicatorProvider: Send + Sync {
    fn compute(&self, closes: &[f64]) -> Option<IndicatorValues>;
}

/// RSI(14), EMA(20/50/200), Bollinger(20, 2)
#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalIndicators;

impl IndicatorProvider for TechnicalIndicators {
    fn compute(&self, closes: &[f64]) -> Option<IndicatorValues> {
        if closes.len() < MIN_CLOSES {
            return None;
        }

        Some(IndicatorValues {
            rsi: calculate_rsi(closes, 14)?,
            ema20: calculate_ema(closes, 20)?,
            ema50: calculate_ema(closes, 50)?,
            ema200: calculate_ema(closes, 200)?,
            bb: calculate_bollinger(closes, 20, 2.0)?,
        })
    }
}
