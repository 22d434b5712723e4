use crate::indicators::moving_average::calculate_ema_series;

/// MACD line, signal line and histogram at the latest bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Moving Average Convergence Divergence
///
/// Standard construction: MACD line is the fast EMA minus the slow EMA,
/// the signal line is an EMA of the MACD line, and the histogram is the
/// gap between the two. Histogram above zero reads bullish.
pub fn calculate_macd(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdOutput> {
    let histograms = macd_histogram_series(prices, fast, slow, signal_period);
    let histogram = *histograms.last()?;

    let fast_ema = calculate_ema_series(prices, fast)?;
    let slow_ema = calculate_ema_series(prices, slow)?;
    let macd = fast_ema.last()? - slow_ema.last()?;

    Some(MacdOutput {
        macd,
        signal: macd - histogram,
        histogram,
    })
}

/// Full histogram series aligned with `prices`
///
/// Returns empty when the series is shorter than the slow period.
pub fn macd_histogram_series(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<f64> {
    if prices.len() < slow {
        return Vec::new();
    }

    let fast_ema = match calculate_ema_series(prices, fast) {
        Some(s) => s,
        None => return Vec::new(),
    };
    let slow_ema = match calculate_ema_series(prices, slow) {
        Some(s) => s,
        None => return Vec::new(),
    };

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = match calculate_ema_series(&macd_line, signal_period.min(macd_line.len())) {
        Some(s) => s,
        None => return Vec::new(),
    };

    macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| m - s)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_bullish_in_uptrend() {
        // Accelerating climb keeps the fast EMA over the slow one
        let prices: Vec<f64> = (0..40).map(|i| 100.0 * (1.0 + 0.01 * i as f64)).collect();

        let macd = calculate_macd(&prices, 12, 26, 9).unwrap();
        assert!(macd.macd > 0.0);
        assert!(macd.histogram > 0.0);
    }

    #[test]
    fn test_macd_bearish_in_downtrend() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 * (1.0 - 0.008 * i as f64)).collect();

        let macd = calculate_macd(&prices, 12, 26, 9).unwrap();
        assert!(macd.macd < 0.0);
        assert!(macd.histogram < 0.0);
    }

    #[test]
    fn test_macd_insufficient_data() {
        let prices = vec![100.0; 10];
        assert!(calculate_macd(&prices, 12, 26, 9).is_none());
    }

    #[test]
    fn test_histogram_identity() {
        let prices: Vec<f64> = (0..50)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0)
            .collect();

        let macd = calculate_macd(&prices, 12, 26, 9).unwrap();
        assert!((macd.macd - macd.signal - macd.histogram).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_series_aligned_with_prices() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let series = macd_histogram_series(&prices, 12, 26, 9);
        assert_eq!(series.len(), prices.len());
    }
}
