/// Price-level helpers shared by the regime detector and entry scoring
///
/// Pivots are local extremes confirmed by the bars on either side; VWAP
/// weights closes by traded volume.

use crate::models::Candle;

/// Local highs: bars whose high tops every bar within `window / 2` on
/// both sides. Returns the pivot prices in chronological order.
pub fn pivot_highs(candles: &[Candle], window: usize) -> Vec<f64> {
    pivots(candles, window, |c| c.high, |a, b| a > b)
}

/// Local lows, mirror of [`pivot_highs`]
pub fn pivot_lows(candles: &[Candle], window: usize) -> Vec<f64> {
    pivots(candles, window, |c| c.low, |a, b| a < b)
}

fn pivots(
    candles: &[Candle],
    window: usize,
    value: impl Fn(&Candle) -> f64,
    beats: impl Fn(f64, f64) -> bool,
) -> Vec<f64> {
    let half = window / 2;
    if candles.len() < window || half == 0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for i in half..candles.len() - half {
        let v = value(&candles[i]);
        let is_pivot = (i - half..=i + half)
            .filter(|j| *j != i)
            .all(|j| beats(v, value(&candles[j])));
        if is_pivot {
            out.push(v);
        }
    }
    out
}

/// Volume-weighted average of closes over the last `period` bars
pub fn rolling_vwap(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period || period == 0 {
        return None;
    }

    let window = &candles[candles.len() - period..];
    let total_volume: f64 = window.iter().map(|c| c.volume).sum();
    if total_volume == 0.0 {
        return None;
    }

    let weighted: f64 = window.iter().map(|c| c.close * c.volume).sum();
    Some(weighted / total_volume)
}

/// Plain average volume over the last `period` bars
pub fn average_volume(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period || period == 0 {
        return None;
    }

    let window = &candles[candles.len() - period..];
    Some(window.iter().map(|c| c.volume).sum::<f64>() / period as f64)
}
