/// Simple moving average of the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Every EMA value from the first full window onward, oldest first
///
/// The first value is the SMA of the first `period` prices; each later value
/// moves toward the price by `2 / (period + 1)`. Empty when there is not
/// enough data.
pub fn ema_series(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = prices[..period].iter().sum::<f64>() / period as f64;

    std::iter::once(seed)
        .chain(prices[period..].iter().scan(seed, |ema, &price| {
            *ema += alpha * (price - *ema);
            Some(*ema)
        }))
        .collect()
}

/// Latest EMA value
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    ema_series(prices, period).last().copied()
}
