use crate::config::IndicatorConfig;
use crate::indicators::{
    calculate_atr, calculate_bollinger, calculate_ema, calculate_macd, macd_histogram_series,
    rsi_series,
};
use crate::models::Candle;
use serde::{Deserialize, Serialize};

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const PRICE_TREND_BARS: usize = 15;
const PRICE_TREND_THRESHOLD_PCT: f64 = 0.8;

/// Direction of the short-horizon price move
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PriceTrend {
    Up,
    Down,
    Neutral,
}

/// EMA crossover state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmaTrend {
    StrongBullish,
    Bullish,
    StrongBearish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceGroup {
    pub change_pct: f64,
    pub trend: PriceTrend,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RsiGroup {
    pub value: f64,
    pub avg_3: f64,
    pub rising: bool,
    pub delta: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MacdGroup {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
    pub hist_avg_3: f64,
    pub rising: bool,
    pub bullish: bool,
    pub bearish: bool,
    /// Histogram close enough to zero that a bullish turn may be forming
    pub weak_bullish: bool,
    pub weak_bearish: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EmaGroup {
    pub short: f64,
    pub long: f64,
    pub diff_pct: f64,
    pub price_above_short: bool,
    pub price_above_long: bool,
    pub trend: EmaTrend,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BollingerGroup {
    pub position: f64,
    pub width_pct: f64,
    pub oversold: bool,
    pub overbought: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MomentumGroup {
    pub value: f64,
    pub bullish: bool,
    pub bearish: bool,
    pub strong: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolatilityGroup {
    pub value: f64,
    pub high: bool,
}

/// One coherent view of all indicators at the latest bar
///
/// Groups are computed independently; a group that lacks data is `None`
/// and the rest of the snapshot is unaffected. Callers that need a
/// value regardless use the `*_or_neutral` accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub current_price: f64,
    pub price: Option<PriceGroup>,
    pub rsi: Option<RsiGroup>,
    pub macd: Option<MacdGroup>,
    pub ema: Option<EmaGroup>,
    pub bollinger: Option<BollingerGroup>,
    pub momentum: Option<MomentumGroup>,
    pub volatility: Option<VolatilityGroup>,
    pub atr: Option<f64>,
}

impl IndicatorSnapshot {
    /// Compute a snapshot from the candle history
    ///
    /// Below `min_candles` bars only the current price is populated.
    pub fn compute(candles: &[Candle], cfg: &IndicatorConfig) -> Self {
        let current_price = candles.last().map(|c| c.close).unwrap_or(0.0);
        let mut snapshot = Self::empty(current_price);

        if candles.len() < cfg.min_candles {
            return snapshot;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        snapshot.price = price_group(&closes);
        snapshot.rsi = rsi_group(&closes, cfg);
        snapshot.macd = macd_group(&closes);
        snapshot.ema = ema_group(&closes, current_price, cfg);
        snapshot.bollinger = bollinger_group(&closes, cfg);
        snapshot.momentum = momentum_group(&closes, cfg);
        snapshot.volatility = volatility_group(&closes, cfg);
        snapshot.atr = calculate_atr(candles, 14);

        snapshot
    }

    pub fn empty(current_price: f64) -> Self {
        Self {
            current_price,
            price: None,
            rsi: None,
            macd: None,
            ema: None,
            bollinger: None,
            momentum: None,
            volatility: None,
            atr: None,
        }
    }

    /// Number of populated indicator values, used as a data-health gate
    pub fn key_count(&self) -> usize {
        let mut count = 0;
        if self.price.is_some() {
            count += 2;
        }
        if self.rsi.is_some() {
            count += 4;
        }
        if self.macd.is_some() {
            count += 9;
        }
        if self.ema.is_some() {
            count += 6;
        }
        if self.bollinger.is_some() {
            count += 4;
        }
        if self.momentum.is_some() {
            count += 4;
        }
        if self.volatility.is_some() {
            count += 2;
        }
        if self.atr.is_some() {
            count += 1;
        }
        count
    }

    pub fn rsi_or_neutral(&self) -> f64 {
        self.rsi.map(|r| r.value).unwrap_or(50.0)
    }

    pub fn bb_position_or_neutral(&self) -> f64 {
        self.bollinger.map(|b| b.position).unwrap_or(0.5)
    }

    pub fn volatility_or_zero(&self) -> f64 {
        self.volatility.map(|v| v.value).unwrap_or(0.0)
    }
}

fn price_group(closes: &[f64]) -> Option<PriceGroup> {
    if closes.len() < PRICE_TREND_BARS + 1 {
        return None;
    }

    let reference = closes[closes.len() - 1 - PRICE_TREND_BARS];
    if reference == 0.0 {
        return None;
    }

    let change_pct = (closes[closes.len() - 1] - reference) / reference * 100.0;
    let trend = if change_pct > PRICE_TREND_THRESHOLD_PCT {
        PriceTrend::Up
    } else if change_pct < -PRICE_TREND_THRESHOLD_PCT {
        PriceTrend::Down
    } else {
        PriceTrend::Neutral
    };

    Some(PriceGroup { change_pct, trend })
}

fn rsi_group(closes: &[f64], cfg: &IndicatorConfig) -> Option<RsiGroup> {
    let series = rsi_series(closes, cfg.rsi_period, 3);
    if series.len() < 3 {
        return None;
    }

    let value = series[2];
    Some(RsiGroup {
        value,
        avg_3: series.iter().sum::<f64>() / 3.0,
        rising: value > series[1],
        delta: value - series[1],
    })
}

fn macd_group(closes: &[f64]) -> Option<MacdGroup> {
    let hist = macd_histogram_series(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    if hist.len() < 3 {
        return None;
    }

    let out = calculate_macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)?;
    let histogram = out.histogram;
    let hist_avg_3 = hist[hist.len() - 3..].iter().sum::<f64>() / 3.0;

    Some(MacdGroup {
        line: out.macd,
        signal: out.signal,
        histogram,
        hist_avg_3,
        rising: histogram > hist[hist.len() - 2],
        bullish: histogram > 0.0,
        bearish: histogram < 0.0,
        weak_bullish: histogram > -0.1,
        weak_bearish: histogram < 0.1,
    })
}

fn ema_group(closes: &[f64], price: f64, cfg: &IndicatorConfig) -> Option<EmaGroup> {
    let short = calculate_ema(closes, cfg.ema_short)?;
    let long = calculate_ema(closes, cfg.ema_long)?;
    if long == 0.0 {
        return None;
    }

    let diff_pct = (short - long) / long * 100.0;
    let price_above_short = price > short;
    let price_above_long = price > long;

    let trend = if short > long {
        if price_above_short && diff_pct.abs() > cfg.ema_trend_threshold_pct {
            EmaTrend::StrongBullish
        } else {
            EmaTrend::Bullish
        }
    } else if short < long {
        if !price_above_short && diff_pct.abs() > cfg.ema_trend_threshold_pct {
            EmaTrend::StrongBearish
        } else {
            EmaTrend::Bearish
        }
    } else {
        EmaTrend::Neutral
    };

    Some(EmaGroup {
        short,
        long,
        diff_pct,
        price_above_short,
        price_above_long,
        trend,
    })
}

fn bollinger_group(closes: &[f64], cfg: &IndicatorConfig) -> Option<BollingerGroup> {
    let bb = calculate_bollinger(closes, cfg.bollinger_period, cfg.bollinger_std)?;

    Some(BollingerGroup {
        position: bb.position,
        width_pct: bb.width_pct,
        oversold: bb.position < cfg.bollinger_oversold,
        overbought: bb.position > cfg.bollinger_overbought,
    })
}

fn momentum_group(closes: &[f64], cfg: &IndicatorConfig) -> Option<MomentumGroup> {
    if closes.len() < cfg.momentum_period + 1 {
        return None;
    }

    let reference = closes[closes.len() - 1 - cfg.momentum_period];
    if reference == 0.0 {
        return None;
    }

    let value = (closes[closes.len() - 1] - reference) / reference * 100.0;

    Some(MomentumGroup {
        value,
        bullish: value > cfg.momentum_threshold,
        bearish: value < -cfg.momentum_threshold,
        strong: value.abs() > cfg.momentum_strong,
    })
}

fn volatility_group(closes: &[f64], cfg: &IndicatorConfig) -> Option<VolatilityGroup> {
    if closes.len() < cfg.volatility_window + 1 {
        return None;
    }

    let window = &closes[closes.len() - cfg.volatility_window - 1..];
    let returns: Vec<f64> = window
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();

    if returns.len() < 2 {
        return None;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() as f64 - 1.0);
    let value = variance.sqrt() * 100.0;

    Some(VolatilityGroup {
        value,
        high: value > cfg.volatility_high,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                symbol: "BTC-USDT".to_string(),
                timestamp: Utc::now() + chrono::Duration::minutes(15 * i as i64),
                open: close * 0.999,
                high: close * 1.002,
                low: close * 0.998,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn trending_up(n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 * (1.0 + 0.004 * i as f64)).collect();
        candles_from_closes(&closes)
    }

    #[test]
    fn test_full_snapshot_has_all_groups() {
        let candles = trending_up(60);
        let snapshot = IndicatorSnapshot::compute(&candles, &IndicatorConfig::default());

        assert!(snapshot.price.is_some());
        assert!(snapshot.rsi.is_some());
        assert!(snapshot.macd.is_some());
        assert!(snapshot.ema.is_some());
        assert!(snapshot.bollinger.is_some());
        assert!(snapshot.momentum.is_some());
        assert!(snapshot.volatility.is_some());
        assert!(snapshot.atr.is_some());
        assert!(snapshot.key_count() >= 8);
    }

    #[test]
    fn test_no_nan_in_full_snapshot() {
        let candles = trending_up(60);
        let s = IndicatorSnapshot::compute(&candles, &IndicatorConfig::default());

        assert!(s.current_price.is_finite());
        assert!(s.rsi.unwrap().value.is_finite());
        assert!(s.macd.unwrap().histogram.is_finite());
        assert!(s.ema.unwrap().diff_pct.is_finite());
        assert!(s.bollinger.unwrap().position.is_finite());
        assert!(s.momentum.unwrap().value.is_finite());
        assert!(s.volatility.unwrap().value.is_finite());
    }

    #[test]
    fn test_uptrend_reads_bullish() {
        let candles = trending_up(60);
        let s = IndicatorSnapshot::compute(&candles, &IndicatorConfig::default());

        assert_eq!(s.price.unwrap().trend, PriceTrend::Up);
        assert!(s.macd.unwrap().bullish);
        assert!(matches!(
            s.ema.unwrap().trend,
            EmaTrend::Bullish | EmaTrend::StrongBullish
        ));
        assert!(s.momentum.unwrap().bullish);
    }

    #[test]
    fn test_macd_group_carries_both_lines() {
        let candles = trending_up(60);
        let s = IndicatorSnapshot::compute(&candles, &IndicatorConfig::default());

        let macd = s.macd.unwrap();
        assert!(macd.line > macd.signal);
        assert!((macd.line - macd.signal - macd.histogram).abs() < 1e-9);
    }

    #[test]
    fn test_below_minimum_bars_is_empty() {
        let candles = trending_up(20);
        let s = IndicatorSnapshot::compute(&candles, &IndicatorConfig::default());

        assert_eq!(s.key_count(), 0);
        assert!(s.current_price > 0.0);
    }

    #[test]
    fn test_neutral_accessors_on_empty_snapshot() {
        let s = IndicatorSnapshot::empty(100.0);

        assert_eq!(s.rsi_or_neutral(), 50.0);
        assert_eq!(s.bb_position_or_neutral(), 0.5);
        assert_eq!(s.volatility_or_zero(), 0.0);
    }

    #[test]
    fn test_no_candles() {
        let s = IndicatorSnapshot::compute(&[], &IndicatorConfig::default());
        assert_eq!(s.current_price, 0.0);
        assert_eq!(s.key_count(), 0);
    }

    #[test]
    fn test_random_walks_stay_in_bounds() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);

        for _ in 0..20 {
            let mut price = 100.0;
            let closes: Vec<f64> = (0..80)
                .map(|_| {
                    price *= 1.0 + rng.gen_range(-0.01..0.01);
                    price
                })
                .collect();

            let s = IndicatorSnapshot::compute(
                &candles_from_closes(&closes),
                &IndicatorConfig::default(),
            );

            let rsi = s.rsi.unwrap();
            assert!((0.0..=100.0).contains(&rsi.value));
            assert!((0.0..=100.0).contains(&rsi.avg_3));
            let bb = s.bollinger.unwrap();
            assert!(bb.width_pct.is_finite() && bb.width_pct >= 0.0);
            assert!(s.volatility.unwrap().value >= 0.0);
            assert!(s.atr.unwrap() >= 0.0);
        }
    }
}
