/// Relative Strength Index (RSI)
///
/// Measures the magnitude of recent price changes to flag overbought
/// (> 70) and oversold (< 30) conditions.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    let recent = &changes[changes.len() - period..];
    let avg_gain: f64 = recent.iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let avg_loss: f64 = recent.iter().filter(|c| **c < 0.0).map(|c| c.abs()).sum::<f64>()
        / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// RSI over the trailing `count` bars, oldest first
///
/// Each value is the RSI of the price series truncated at that bar.
/// Used for smoothing (3-bar average) and slope checks.
pub fn rsi_series(prices: &[f64], period: usize, count: usize) -> Vec<f64> {
    if prices.len() < period + count {
        return Vec::new();
    }

    (0..count)
        .filter_map(|i| {
            let end = prices.len() - count + i + 1;
            calculate_rsi(&prices[..end], period)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_in_range() {
        let prices = vec![
            44.0, 44.25, 44.5, 43.75, 44.0, 44.5, 45.0, 45.5, 45.25, 45.5,
            46.0, 46.5, 46.25, 46.0, 46.5,
        ];

        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!(rsi > 0.0 && rsi < 100.0);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = vec![100.0, 102.0, 101.0];
        assert!(calculate_rsi(&prices, 14).is_none());
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let prices = vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        assert_eq!(calculate_rsi(&prices, 5), Some(100.0));
    }

    #[test]
    fn test_rsi_series_rising_market() {
        // Steady climb: each successive RSI computed on a longer climb
        let prices: Vec<f64> = (0..25).map(|i| 100.0 + i as f64 * 0.5).collect();

        let series = rsi_series(&prices, 14, 3);
        assert_eq!(series.len(), 3);
        for v in &series {
            assert!(*v > 50.0);
        }
    }

    #[test]
    fn test_rsi_series_insufficient_data() {
        let prices = vec![100.0; 10];
        assert!(rsi_series(&prices, 14, 3).is_empty());
    }
}
