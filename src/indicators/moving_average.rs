/// Simple Moving Average over the last `period` values
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period || period == 0 {
        return None;
    }

    let sum: f64 = prices[prices.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Exponential Moving Average, seeded with the first price
///
/// Seeding at the first value instead of an SMA warm-up lets shorter
/// series (down to `period` bars) still produce a usable EMA.
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    calculate_ema_series(prices, period).and_then(|s| s.last().copied())
}

/// Full EMA series aligned with `prices`
pub fn calculate_ema_series(prices: &[f64], period: usize) -> Option<Vec<f64>> {
    if prices.is_empty() || prices.len() < period || period == 0 {
        return None;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut series = Vec::with_capacity(prices.len());
    let mut ema = prices[0];
    series.push(ema);

    for price in &prices[1..] {
        ema = (price - ema) * alpha + ema;
        series.push(ema);
    }

    Some(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        assert_eq!(calculate_sma(&prices, 5), Some(104.0));
    }

    #[test]
    fn test_sma_uses_most_recent_window() {
        let prices = vec![1.0, 1.0, 1.0, 10.0, 10.0];
        assert_eq!(calculate_sma(&prices, 2), Some(10.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        assert!(calculate_sma(&prices, 5).is_none());
    }

    #[test]
    fn test_ema_tracks_rising_prices() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let ema = calculate_ema(&prices, 5).unwrap();

        // Lags price but sits above the simple average of the full series
        assert!(ema > 104.0 && ema < 110.0);
    }

    #[test]
    fn test_ema_series_length_matches_input() {
        let prices = vec![100.0, 101.0, 99.0, 102.0, 103.0];
        let series = calculate_ema_series(&prices, 3).unwrap();
        assert_eq!(series.len(), prices.len());
        assert_eq!(series[0], 100.0);
    }
}
