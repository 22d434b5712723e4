/// Average True Range (ATR)
///
/// Volatility measure: average of true ranges over a period, where the
/// true range is the greatest of high-low, |high - prev close| and
/// |low - prev close|. Smoothed with Wilder's method.

use crate::models::Candle;

pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 || period == 0 {
        return None;
    }

    let true_ranges: Vec<f64> = candles
        .windows(2)
        .map(|w| {
            let prev_close = w[0].close;
            let (high, low) = (w[1].high, w[1].low);
            (high - low)
                .max((high - prev_close).abs())
                .max((low - prev_close).abs())
        })
        .collect();

    // Seed with the simple average, then Wilder smoothing
    let mut atr: f64 = true_ranges.iter().take(period).sum::<f64>() / period as f64;
    for tr in &true_ranges[period..] {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
    }

    Some(atr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_candles(bars: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        bars.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                symbol: "BTC-USDT".to_string(),
                timestamp: Utc::now() + chrono::Duration::minutes(15 * i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_atr_quiet_market() {
        let bars = vec![(100.0, 101.0, 99.0, 100.0); 15];
        let candles = create_test_candles(&bars);

        let atr = calculate_atr(&candles, 14).unwrap();
        assert!(atr > 1.5 && atr < 2.5);
    }

    #[test]
    fn test_atr_volatile_market_is_larger() {
        let quiet = create_test_candles(&vec![(100.0, 101.0, 99.0, 100.0); 15]);
        let wild = create_test_candles(&vec![(100.0, 112.0, 91.0, 104.0); 15]);

        let quiet_atr = calculate_atr(&quiet, 14).unwrap();
        let wild_atr = calculate_atr(&wild, 14).unwrap();
        assert!(wild_atr > quiet_atr * 5.0);
    }

    #[test]
    fn test_atr_insufficient_data() {
        let candles = create_test_candles(&[(100.0, 101.0, 99.0, 100.0); 5]);
        assert!(calculate_atr(&candles, 14).is_none());
    }
}
