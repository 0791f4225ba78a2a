use crate::models::{Candle, Tick, Timeframe};
use rust_decimal::prelude::ToPrimitive;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe rolling candle series, one per timeframe
///
/// The feed task is the only writer. Readers get copies, never references
/// into the live series.
#[derive(Clone)]
pub struct CandleStore {
    series: Arc<RwLock<HashMap<Timeframe, VecDeque<Candle>>>>,
    max_candles: usize,
}

impl CandleStore {
    /// Create an empty store
    ///
    /// # Arguments
    /// * `max_candles` - Maximum number of candles kept per timeframe
    pub fn new(max_candles: usize) -> Self {
        let series = Timeframe::ALL
            .into_iter()
            .map(|tf| (tf, VecDeque::with_capacity(max_candles)))
            .collect();

        Self {
            series: Arc::new(RwLock::new(series)),
            max_candles,
        }
    }

    pub fn max_candles(&self) -> usize {
        self.max_candles
    }

    /// Fold a tick into every timeframe
    ///
    /// Opens a new seeded candle when the series is empty or when the tick is
    /// at least one threshold past the last candle's start; otherwise updates
    /// the last candle in place.
    pub fn apply(&self, tick: &Tick) {
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);

        for tf in Timeframe::ALL {
            let candles = series.entry(tf).or_default();

            match candles.back_mut() {
                Some(last) if tick.timestamp - last.start_time < tf.threshold() => {
                    last.update(tick.price);
                }
                _ => {
                    candles.push_back(Candle::seeded(tick));
                    while candles.len() > self.max_candles {
                        candles.pop_front();
                    }
                }
            }
        }
    }

    /// Replace one timeframe's series wholesale (history hydration)
    ///
    /// Only the most recent `max_candles` entries are kept.
    pub fn replace(&self, tf: Timeframe, candles: Vec<Candle>) {
        let skip = candles.len().saturating_sub(self.max_candles);
        let fresh: VecDeque<Candle> = candles.into_iter().skip(skip).collect();

        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        series.insert(tf, fresh);
    }

    /// Copy of the full series for a timeframe, oldest first
    pub fn snapshot(&self, tf: Timeframe) -> Vec<Candle> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series
            .get(&tf)
            .map(|deque| deque.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Close prices for a timeframe, oldest first, as indicator input
    pub fn closes(&self, tf: Timeframe) -> Vec<f64> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series
            .get(&tf)
            .map(|deque| {
                deque
                    .iter()
                    .filter_map(|candle| candle.close.to_f64())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn candle_count(&self, tf: Timeframe) -> usize {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series.get(&tf).map(|d| d.len()).unwrap_or(0)
    }
}
