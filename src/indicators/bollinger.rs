use super::calculate_sma;
use crate::models::BollingerBands;

/// Bollinger Bands on an SMA basis with population standard deviation
pub fn calculate_bollinger(prices: &[f64], period: usize, std_dev: f64) -> Option<BollingerBands> {
    let middle = calculate_sma(prices, period)?;

    let variance = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| (p - middle).powi(2))
        .sum::<f64>()
        / period as f64;
    let width = std_dev * variance.sqrt();

    Some(BollingerBands {
        upper: middle + width,
        middle,
        lower: middle - width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bollinger_flat_prices_collapse() {
        let bands = calculate_bollinger(&[50.0; 20], 20, 2.0).unwrap();
        assert_eq!(bands.upper, 50.0);
        assert_eq!(bands.middle, 50.0);
        assert_eq!(bands.lower, 50.0);
    }

    #[test]
    fn test_bollinger_known_values() {
        // mean 5, population std dev 2
        let prices = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = calculate_bollinger(&prices, 8, 2.0).unwrap();
        assert_eq!(bands.middle, 5.0);
        assert_eq!(bands.upper, 9.0);
        assert_eq!(bands.lower, 1.0);
    }

    #[test]
    fn test_bollinger_uses_last_window_only() {
        let mut prices = vec![1000.0; 10];
        prices.extend([10.0; 5]);
        let bands = calculate_bollinger(&prices, 5, 2.0).unwrap();
        assert_eq!(bands.middle, 10.0);
        assert_eq!(bands.upper, 10.0);
    }

    #[test]
    fn test_bollinger_insufficient_data() {
        assert!(calculate_bollinger(&[1.0, 2.0], 20, 2.0).is_none());
    }
}
