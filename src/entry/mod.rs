// Entry quality scoring and position sizing
//
// Grades a proposed entry 0-100 from market microstructure (volume
// profile, nearby levels, order flow, achievable risk-reward, timing)
// and turns the grade into a size multiplier.

use crate::config::EntryConfig;
use crate::indicators::{calculate_atr, pivot_highs, pivot_lows, rolling_vwap};
use crate::models::{Candle, PositionSide};
use serde::{Deserialize, Serialize};

const VWAP_PERIOD: usize = 50;
const VOLUME_ZONE_LOOKBACK: usize = 20;
const LEVEL_LOOKBACK: usize = 10;
const ORDER_FLOW_BARS: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntryTiming {
    Immediate,
    /// Better long entry expected slightly below the current price
    OnPullback,
    /// Better short entry expected slightly above the current price
    OnRetrace,
    WaitForVolume,
}

/// Full entry evaluation for one side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryQuality {
    pub quality: f64,
    pub volume_profile_score: f64,
    pub level_score: f64,
    pub order_flow_score: f64,
    pub risk_reward_score: f64,
    pub timing_score: f64,
    pub risk_reward: f64,
    pub stop_price: f64,
    pub target_price: f64,
    /// Recommended order price, shaded toward the expected pullback or retrace
    pub entry_price: f64,
    pub timing: EntryTiming,
    pub should_enter_now: bool,
    pub size_multiplier: f64,
}

pub struct EntryAdvisor {
    config: EntryConfig,
}

impl EntryAdvisor {
    pub fn new(config: EntryConfig) -> Self {
        Self { config }
    }

    /// Grade an entry at the last close of `candles`
    pub fn evaluate(&self, candles: &[Candle], side: PositionSide) -> Option<EntryQuality> {
        let price = candles.last()?.close;
        if price <= 0.0 {
            return None;
        }

        let volume_profile_score = volume_profile_score(candles, price);
        let level_score = level_score(candles, price);
        let order_flow_score = order_flow_score(candles, side);
        let (risk_reward, stop_price, target_price) = risk_reward(candles, price, side);
        let risk_reward_score = risk_reward_tier(risk_reward);
        let (timing_score, timing) = timing_score(candles, side);

        let quality = (volume_profile_score
            + level_score
            + order_flow_score
            + risk_reward_score
            + timing_score)
            .clamp(0.0, 100.0);

        let should_enter_now = quality >= self.config.min_quality
            && risk_reward >= self.config.min_risk_reward
            && timing != EntryTiming::WaitForVolume;

        let quality_mult = 0.5 + quality / 100.0;
        let rr_mult = (0.8 + (risk_reward - 1.0) * 0.2).min(1.3);
        let size_multiplier = (quality_mult * rr_mult).clamp(0.6, 1.8);

        let entry_price = match timing {
            EntryTiming::OnPullback => price * 0.999,
            EntryTiming::OnRetrace => price * 1.001,
            _ => price,
        };

        Some(EntryQuality {
            quality,
            volume_profile_score,
            level_score,
            order_flow_score,
            risk_reward_score,
            timing_score,
            risk_reward,
            stop_price,
            target_price,
            entry_price,
            timing,
            should_enter_now,
            size_multiplier,
        })
    }

    /// Notional size for this entry, scaled by the regime's size factor
    pub fn position_size(&self, quality: &EntryQuality, regime_factor: f64) -> f64 {
        self.config.base_size_usdt * quality.size_multiplier * regime_factor
    }
}

/// Proximity to VWAP and to high-volume zones, capped at 25
fn volume_profile_score(candles: &[Candle], price: f64) -> f64 {
    let mut score: f64 = 0.0;

    let Some(vwap) = rolling_vwap(candles, VWAP_PERIOD) else {
        return 0.0;
    };

    let vwap_dist_pct = (price - vwap).abs() / vwap * 100.0;
    if vwap_dist_pct < 0.2 {
        score += 15.0;
    } else if vwap_dist_pct < 0.5 {
        score += 10.0;
    }

    // High-volume zones: bars in the top volume quintile of the lookback
    if candles.len() >= VOLUME_ZONE_LOOKBACK {
        let window = &candles[candles.len() - VOLUME_ZONE_LOOKBACK..];
        let mut volumes: Vec<f64> = window.iter().map(|c| c.volume).collect();
        volumes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let threshold = volumes[(volumes.len() * 4) / 5];

        let nearest = window
            .iter()
            .filter(|c| c.volume > threshold)
            .map(|c| (c.close - price).abs() / price * 100.0)
            .fold(f64::INFINITY, f64::min);

        if nearest < 0.3 {
            score += 12.0;
        } else if nearest < 0.7 {
            score += 6.0;
        }
    }

    // Inside one standard deviation of VWAP
    let window = &candles[candles.len() - VWAP_PERIOD..];
    let mean = window.iter().map(|c| c.close).sum::<f64>() / VWAP_PERIOD as f64;
    let variance = window
        .iter()
        .map(|c| (c.close - mean).powi(2))
        .sum::<f64>()
        / VWAP_PERIOD as f64;
    if (price - vwap).abs() <= variance.sqrt() {
        score += 8.0;
    }

    score.min(25.0)
}

/// Proximity to recent pivot levels, capped at 20
fn level_score(candles: &[Candle], price: f64) -> f64 {
    let mut levels = pivot_highs(candles, 5);
    levels.extend(pivot_lows(candles, 5));
    if levels.len() > LEVEL_LOOKBACK {
        levels.drain(..levels.len() - LEVEL_LOOKBACK);
    }

    let nearest = levels
        .iter()
        .map(|l| (l - price).abs() / price * 100.0)
        .fold(f64::INFINITY, f64::min);

    if nearest < 0.5 {
        20.0
    } else if nearest < 1.0 {
        12.0
    } else if nearest < 2.0 {
        6.0
    } else {
        0.0
    }
}

/// Where closes land in their bar ranges over the last bars: +15 when
/// the flow backs the entry, +5 neutral, -10 against
fn order_flow_score(candles: &[Candle], side: PositionSide) -> f64 {
    if candles.len() < ORDER_FLOW_BARS {
        return 0.0;
    }

    let window = &candles[candles.len() - ORDER_FLOW_BARS..];
    let mut bullish = 0i32;
    let mut bearish = 0i32;

    for c in window {
        let range = c.high - c.low;
        if range <= 0.0 {
            continue;
        }
        let position = (c.close - c.low) / range;
        if position > 0.66 {
            bullish += 1;
        } else if position < 0.33 {
            bearish += 1;
        }
    }

    let bias = if bullish - bearish > 2 {
        Some(PositionSide::Long)
    } else if bearish - bullish > 2 {
        Some(PositionSide::Short)
    } else {
        None
    };

    match bias {
        Some(b) if b == side => 15.0,
        None => 5.0,
        Some(_) => -10.0,
    }
}

/// ATR-anchored stop and nearest-level target; returns (ratio, stop, target)
fn risk_reward(candles: &[Candle], price: f64, side: PositionSide) -> (f64, f64, f64) {
    let Some(atr) = calculate_atr(candles, 14) else {
        return (0.0, 0.0, 0.0);
    };
    if candles.len() < LEVEL_LOOKBACK {
        return (0.0, 0.0, 0.0);
    }

    let recent = &candles[candles.len() - LEVEL_LOOKBACK..];

    match side {
        PositionSide::Long => {
            let recent_low = recent.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            let stop = (recent_low * 0.998).min(price - 1.5 * atr);

            let target = recent
                .iter()
                .map(|c| c.high)
                .filter(|h| *h > price * 1.01)
                .fold(f64::INFINITY, f64::min);
            let target = if target.is_finite() {
                target
            } else {
                price * 1.025
            };

            let risk = price - stop;
            if risk <= 0.0 {
                return (0.0, stop, target);
            }
            ((target - price) / risk, stop, target)
        }
        PositionSide::Short => {
            let recent_high = recent
                .iter()
                .map(|c| c.high)
                .fold(f64::NEG_INFINITY, f64::max);
            let stop = (recent_high * 1.002).max(price + 1.5 * atr);

            let target = recent
                .iter()
                .map(|c| c.low)
                .filter(|l| *l < price * 0.99)
                .fold(f64::NEG_INFINITY, f64::max);
            let target = if target.is_finite() {
                target
            } else {
                price * 0.975
            };

            let risk = stop - price;
            if risk <= 0.0 {
                return (0.0, stop, target);
            }
            ((price - target) / risk, stop, target)
        }
    }
}

fn risk_reward_tier(rr: f64) -> f64 {
    if rr >= 3.0 {
        25.0
    } else if rr >= 2.0 {
        20.0
    } else if rr >= 1.5 {
        15.0
    } else if rr >= 1.0 {
        5.0
    } else {
        -15.0
    }
}

/// Pullback/retrace pattern and volume health; clamped to [-5, 15]
fn timing_score(candles: &[Candle], side: PositionSide) -> (f64, EntryTiming) {
    if candles.len() < VOLUME_ZONE_LOOKBACK + 1 {
        return (0.0, EntryTiming::Immediate);
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let n = closes.len();
    let mut score: f64 = 0.0;
    let mut timing = EntryTiming::Immediate;

    let (a, b, c) = (closes[n - 3], closes[n - 2], closes[n - 1]);
    match side {
        PositionSide::Long => {
            // Rally, dip, holding above the rally start
            if a < b && b > c && c > a {
                score += 10.0;
                timing = EntryTiming::OnPullback;
            }
        }
        PositionSide::Short => {
            // Drop, bounce, still below the drop start
            if a > b && b < c && c < a {
                score += 10.0;
                timing = EntryTiming::OnRetrace;
            }
        }
    }

    let current_volume = candles[n - 1].volume;
    let avg_volume = candles[n - 1 - VOLUME_ZONE_LOOKBACK..n - 1]
        .iter()
        .map(|c| c.volume)
        .sum::<f64>()
        / VOLUME_ZONE_LOOKBACK as f64;

    if current_volume > avg_volume * 1.2 {
        score += 8.0;
    } else if current_volume < avg_volume * 0.7 {
        score -= 5.0;
        timing = EntryTiming::WaitForVolume;
    }

    (score.clamp(-5.0, 15.0), timing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(close: f64, low: f64, high: f64, volume: f64, i: usize) -> Candle {
        Candle {
            symbol: "BTC-USDT".to_string(),
            timestamp: Utc::now() + chrono::Duration::minutes(15 * i as i64),
            open: close,
            high,
            low,
            close,
            volume,
        }
    }

    /// Ranging series around 100 with normal volume
    fn base_series(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + ((i as f64) * 0.9).sin() * 1.5;
                candle(close, close - 0.4, close + 0.4, 1000.0, i)
            })
            .collect()
    }

    fn advisor() -> EntryAdvisor {
        EntryAdvisor::new(EntryConfig::default())
    }

    #[test]
    fn test_evaluate_produces_bounded_quality() {
        let candles = base_series(60);
        let q = advisor().evaluate(&candles, PositionSide::Long).unwrap();

        assert!(q.quality >= 0.0 && q.quality <= 100.0);
        assert!(q.size_multiplier >= 0.6 && q.size_multiplier <= 1.8);
    }

    #[test]
    fn test_poor_risk_reward_blocks_entry() {
        // Price at the very top of the recent range: stops far, targets near
        let mut candles = base_series(60);
        let n = candles.len();
        candles[n - 1].close = 104.0;
        candles[n - 1].high = 104.1;

        let q = advisor().evaluate(&candles, PositionSide::Long).unwrap();
        assert!(q.risk_reward < 1.5);
        assert!(!q.should_enter_now);
    }

    #[test]
    fn test_low_volume_forces_wait() {
        let mut candles = base_series(60);
        let n = candles.len();
        candles[n - 1].volume = 100.0;

        let q = advisor().evaluate(&candles, PositionSide::Long).unwrap();
        assert_eq!(q.timing, EntryTiming::WaitForVolume);
        assert!(!q.should_enter_now);
    }

    #[test]
    fn test_volume_spike_improves_timing() {
        let quiet = base_series(60);
        let mut spiked = base_series(60);
        let n = spiked.len();
        spiked[n - 1].volume = 2000.0;

        let q_quiet = advisor().evaluate(&quiet, PositionSide::Long).unwrap();
        let q_spiked = advisor().evaluate(&spiked, PositionSide::Long).unwrap();
        assert!(q_spiked.timing_score >= q_quiet.timing_score + 8.0);
    }

    #[test]
    fn test_pullback_pattern_detected() {
        let mut candles = base_series(60);
        let n = candles.len();
        // rally to 101, dip to 100.5, still above the 100.0 start
        candles[n - 3].close = 100.0;
        candles[n - 2].close = 101.0;
        candles[n - 1].close = 100.5;

        let (score, timing) = timing_score(&candles, PositionSide::Long);
        assert!(score >= 10.0);
        assert_eq!(timing, EntryTiming::OnPullback);
    }

    #[test]
    fn test_retrace_pattern_detected_for_short() {
        let mut candles = base_series(60);
        let n = candles.len();
        // drop to 100, bounce to 100.5, still below the 101.0 start
        candles[n - 3].close = 101.0;
        candles[n - 2].close = 100.0;
        candles[n - 1].close = 100.5;

        let (score, timing) = timing_score(&candles, PositionSide::Short);
        assert!(score >= 10.0);
        assert_eq!(timing, EntryTiming::OnRetrace);
    }

    #[test]
    fn test_recommended_entry_shades_toward_timing() {
        let mut pullback = base_series(60);
        let n = pullback.len();
        pullback[n - 3].close = 100.0;
        pullback[n - 2].close = 101.0;
        pullback[n - 1].close = 100.5;

        let q = advisor().evaluate(&pullback, PositionSide::Long).unwrap();
        assert_eq!(q.timing, EntryTiming::OnPullback);
        assert!((q.entry_price - 100.5 * 0.999).abs() < 1e-9);

        let mut retrace = base_series(60);
        retrace[n - 3].close = 101.0;
        retrace[n - 2].close = 100.0;
        retrace[n - 1].close = 100.5;

        let q = advisor().evaluate(&retrace, PositionSide::Short).unwrap();
        assert_eq!(q.timing, EntryTiming::OnRetrace);
        assert!((q.entry_price - 100.5 * 1.001).abs() < 1e-9);

        // No pattern: enter at the market
        let flat = base_series(60);
        let last = flat[n - 1].close;
        let q = advisor().evaluate(&flat, PositionSide::Long).unwrap();
        assert_eq!(q.timing, EntryTiming::Immediate);
        assert_eq!(q.entry_price, last);
    }

    #[test]
    fn test_order_flow_alignment() {
        // Ten bars all closing at their highs
        let bullish: Vec<Candle> = (0..20)
            .map(|i| candle(100.9, 100.0, 101.0, 1000.0, i))
            .collect();
        // close at top of range => (close - low) / range > 0.66
        assert_eq!(order_flow_score(&bullish, PositionSide::Long), 15.0);
        assert_eq!(order_flow_score(&bullish, PositionSide::Short), -10.0);
    }

    #[test]
    fn test_size_multiplier_scales_with_risk_reward() {
        let q_good = EntryQuality {
            quality: 80.0,
            volume_profile_score: 0.0,
            level_score: 0.0,
            order_flow_score: 0.0,
            risk_reward_score: 0.0,
            timing_score: 0.0,
            risk_reward: 3.0,
            stop_price: 0.0,
            target_price: 0.0,
            entry_price: 100.0,
            timing: EntryTiming::Immediate,
            should_enter_now: true,
            size_multiplier: ((0.5 + 0.8) * 1.2f64).clamp(0.6, 1.8),
        };

        let advisor = advisor();
        let size = advisor.position_size(&q_good, 1.0);
        assert!(size > EntryConfig::default().base_size_usdt);
    }

    #[test]
    fn test_regime_factor_scales_size() {
        let candles = base_series(60);
        let q = advisor().evaluate(&candles, PositionSide::Long).unwrap();

        let advisor = advisor();
        let neutral = advisor.position_size(&q, 1.0);
        assert!((advisor.position_size(&q, 0.6) - neutral * 0.6).abs() < 1e-9);
        assert!((advisor.position_size(&q, 1.5) - neutral * 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_data() {
        assert!(advisor().evaluate(&[], PositionSide::Long).is_none());
    }

    #[test]
    fn test_risk_reward_tiers() {
        assert_eq!(risk_reward_tier(3.5), 25.0);
        assert_eq!(risk_reward_tier(2.2), 20.0);
        assert_eq!(risk_reward_tier(1.7), 15.0);
        assert_eq!(risk_reward_tier(1.2), 5.0);
        assert_eq!(risk_reward_tier(0.5), -15.0);
    }
}
