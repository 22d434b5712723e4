use crate::indicators::moving_average::calculate_sma;

/// Bollinger band levels plus where the current price sits inside them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// 0.0 at the lower band, 1.0 at the upper band, clamped
    pub position: f64,
    /// Band width as a percent of the middle band
    pub width_pct: f64,
}

/// Bollinger bands over the last `period` closes
///
/// Uses the sample standard deviation. Position is computed against the
/// final price in the series.
pub fn calculate_bollinger(prices: &[f64], period: usize, std_mult: f64) -> Option<BollingerBands> {
    if prices.len() < period || period < 2 {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let middle = calculate_sma(prices, period)?;

    let variance = window.iter().map(|p| (p - middle).powi(2)).sum::<f64>()
        / (period as f64 - 1.0);
    let std_dev = variance.sqrt();

    let upper = middle + std_mult * std_dev;
    let lower = middle - std_mult * std_dev;

    let price = *prices.last()?;
    let position = if upper > lower {
        ((price - lower) / (upper - lower)).clamp(0.0, 1.0)
    } else {
        0.5
    };

    let width_pct = if middle != 0.0 {
        (upper - lower) / middle * 100.0
    } else {
        0.0
    };

    Some(BollingerBands {
        upper,
        middle,
        lower,
        position,
        width_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_bracket_the_mean() {
        let prices: Vec<f64> = (0..25)
            .map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();

        let bb = calculate_bollinger(&prices, 20, 2.0).unwrap();
        assert!(bb.upper > bb.middle);
        assert!(bb.lower < bb.middle);
        assert!((bb.middle - 100.0).abs() < 0.2);
    }

    #[test]
    fn test_position_near_upper_band() {
        // Flat series with a spike at the end
        let mut prices = vec![100.0; 24];
        prices.push(103.0);

        let bb = calculate_bollinger(&prices, 20, 2.0).unwrap();
        assert!(bb.position > 0.85);
    }

    #[test]
    fn test_position_near_lower_band() {
        let mut prices = vec![100.0; 24];
        prices.push(97.0);

        let bb = calculate_bollinger(&prices, 20, 2.0).unwrap();
        assert!(bb.position < 0.15);
    }

    #[test]
    fn test_flat_series_reads_neutral() {
        let prices = vec![100.0; 25];
        let bb = calculate_bollinger(&prices, 20, 2.0).unwrap();
        assert_eq!(bb.position, 0.5);
        assert_eq!(bb.width_pct, 0.0);
    }

    #[test]
    fn test_insufficient_data() {
        let prices = vec![100.0; 10];
        assert!(calculate_bollinger(&prices, 20, 2.0).is_none());
    }
}
