/// Market regime detector over three timeframes
///
/// Combines a trend vote (1h/4h/1d lookbacks), a realized-volatility
/// percentile against the 4h history, and pivot-based support and
/// resistance breakout detection. Classification priority:
/// breakout > high volatility > trend > ranging/low volatility.

use crate::config::{RegimeConfig, ScoringConfig};
use crate::indicators::{average_volume, pivot_highs, pivot_lows};
use crate::models::Candle;
use crate::signal::ScoringAdjustments;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

// Lookback bars per timeframe for the trend vote
const SHORT_TF_LOOKBACK: usize = 4;
const MEDIUM_TF_LOOKBACK: usize = 6;
const LONG_TF_LOOKBACK: usize = 3;

const VOL_WINDOW: usize = 24;
const VOL_HIST_WINDOW: usize = 10;
const PIVOT_WINDOW: usize = 5;
const HISTORY_CAP: usize = 48;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketRegime {
    TrendingUp,
    TrendingDown,
    Ranging,
    HighVolatility,
    LowVolatility,
    BreakoutUp,
    BreakoutDown,
    Consolidation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakoutInfo {
    pub direction: TrendDirection,
    pub strength: f64,
    pub volume_confirmed: bool,
}

/// Full regime assessment for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeAssessment {
    pub symbol: String,
    pub regime: MarketRegime,
    pub confidence: f64,
    pub trend_direction: TrendDirection,
    pub trend_strength: f64,
    pub trend_consistency: f64,
    pub volatility_pct: f64,
    pub volatility_percentile: f64,
    pub volatility_expanding: bool,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub breakout: Option<BreakoutInfo>,
    pub timestamp: DateTime<Utc>,
}

impl RegimeAssessment {
    pub fn is_trending(&self) -> bool {
        matches!(
            self.regime,
            MarketRegime::TrendingUp | MarketRegime::TrendingDown
        )
    }

    /// Scoring overrides this regime recommends
    ///
    /// Returned as a value object applied per evaluation; the base
    /// configuration is never mutated.
    pub fn adjustments(&self, base: &ScoringConfig) -> ScoringAdjustments {
        let mut adj = ScoringAdjustments::neutral();

        match self.regime {
            MarketRegime::TrendingUp | MarketRegime::TrendingDown => {
                adj.min_score_long = Some((base.min_score_long - 1.0).max(3.0));
                adj.min_score_short = Some((base.min_score_short - 1.0).max(3.0));
                adj.size_factor = 1.2;
            }
            MarketRegime::HighVolatility => {
                adj.min_score_long = Some((base.min_score_long + 1.5).min(7.0));
                adj.min_score_short = Some((base.min_score_short + 1.5).min(7.0));
                adj.size_factor = 0.6;
            }
            MarketRegime::Ranging | MarketRegime::LowVolatility => {
                adj.rsi_oversold = Some(20.0);
                adj.rsi_overbought = Some(80.0);
                adj.size_factor = 0.8;
            }
            MarketRegime::BreakoutUp | MarketRegime::BreakoutDown => {
                adj.size_factor = 1.5;
            }
            MarketRegime::Consolidation => {}
        }

        adj
    }
}

pub struct RegimeDetector {
    config: RegimeConfig,
    history: HashMap<String, VecDeque<MarketRegime>>,
}

struct TrendVote {
    direction: TrendDirection,
    strength: f64,
    consistency: f64,
}

struct VolatilityRead {
    value: f64,
    percentile: f64,
    expanding: bool,
}

impl RegimeDetector {
    pub fn new(config: RegimeConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
        }
    }

    /// Classify the regime from hourly, 4-hour and daily candles
    pub fn assess(
        &mut self,
        symbol: &str,
        hourly: &[Candle],
        four_hour: &[Candle],
        daily: &[Candle],
    ) -> RegimeAssessment {
        let trend = self.trend_vote(hourly, four_hour, daily);
        let volatility = volatility_read(hourly, four_hour);
        let (support, resistance) = support_resistance(four_hour);
        let price = hourly.last().map(|c| c.close).unwrap_or(0.0);
        let breakout = self.breakout_check(price, support, resistance, hourly);

        let (regime, confidence) = classify(&trend, &volatility, &breakout);

        let entry = self.history.entry(symbol.to_string()).or_default();
        entry.push_back(regime);
        if entry.len() > HISTORY_CAP {
            entry.pop_front();
        }

        tracing::debug!(
            symbol,
            ?regime,
            confidence,
            trend_strength = trend.strength,
            volatility_pct = volatility.value,
            "regime assessed"
        );

        RegimeAssessment {
            symbol: symbol.to_string(),
            regime,
            confidence,
            trend_direction: trend.direction,
            trend_strength: trend.strength,
            trend_consistency: trend.consistency,
            volatility_pct: volatility.value,
            volatility_percentile: volatility.percentile,
            volatility_expanding: volatility.expanding,
            support,
            resistance,
            breakout,
            timestamp: Utc::now(),
        }
    }

    /// Consecutive assessments the current regime has persisted for
    pub fn regime_duration(&self, symbol: &str) -> usize {
        let Some(history) = self.history.get(symbol) else {
            return 0;
        };
        let Some(current) = history.back() else {
            return 0;
        };
        history.iter().rev().take_while(|r| *r == current).count()
    }

    fn trend_vote(&self, hourly: &[Candle], four_hour: &[Candle], daily: &[Candle]) -> TrendVote {
        let series = [
            (hourly, SHORT_TF_LOOKBACK),
            (four_hour, MEDIUM_TF_LOOKBACK),
            (daily, LONG_TF_LOOKBACK),
        ];

        let mut votes = Vec::new();
        for (candles, lookback) in series {
            if candles.len() <= lookback {
                continue;
            }
            let reference = candles[candles.len() - 1 - lookback].close;
            if reference == 0.0 {
                continue;
            }
            let change = (candles[candles.len() - 1].close - reference) / reference;
            let direction = if change > self.config.trend_threshold {
                TrendDirection::Up
            } else if change < -self.config.trend_threshold {
                TrendDirection::Down
            } else {
                TrendDirection::Neutral
            };
            let strength = (change.abs() / self.config.trend_threshold).min(3.0) / 3.0;
            votes.push((direction, strength));
        }

        if votes.is_empty() {
            return TrendVote {
                direction: TrendDirection::Neutral,
                strength: 0.0,
                consistency: 0.0,
            };
        }

        let total = votes.len();
        let ups = votes.iter().filter(|(d, _)| *d == TrendDirection::Up).count();
        let downs = votes
            .iter()
            .filter(|(d, _)| *d == TrendDirection::Down)
            .count();

        let (direction, majority) = if ups > downs && ups * 2 > total {
            (TrendDirection::Up, ups)
        } else if downs > ups && downs * 2 > total {
            (TrendDirection::Down, downs)
        } else {
            (TrendDirection::Neutral, total - ups - downs)
        };

        TrendVote {
            direction,
            strength: votes.iter().map(|(_, s)| s).sum::<f64>() / total as f64,
            consistency: majority as f64 / total as f64,
        }
    }

    fn breakout_check(
        &self,
        price: f64,
        support: Option<f64>,
        resistance: Option<f64>,
        hourly: &[Candle],
    ) -> Option<BreakoutInfo> {
        if price == 0.0 {
            return None;
        }
        let threshold = self.config.breakout_threshold;

        let (direction, level) = match (support, resistance) {
            (_, Some(r)) if price > r * (1.0 + threshold) => (TrendDirection::Up, r),
            (Some(s), _) if price < s * (1.0 - threshold) => (TrendDirection::Down, s),
            _ => return None,
        };

        let distance = (price - level).abs() / level;
        let strength = (distance / threshold).min(2.0);

        // Volume confirmation: recent burst vs the preceding baseline
        let volume_confirmed =
            match (average_volume(hourly, 3), baseline_volume(hourly, 3, 10)) {
                (Some(recent), Some(baseline)) => recent > baseline * 1.5,
                _ => false,
            };

        Some(BreakoutInfo {
            direction,
            strength,
            volume_confirmed,
        })
    }
}

fn classify(
    trend: &TrendVote,
    volatility: &VolatilityRead,
    breakout: &Option<BreakoutInfo>,
) -> (MarketRegime, f64) {
    // A level break without a volume burst is treated as a fakeout and
    // falls through to the other classifications
    if let Some(b) = breakout {
        if b.strength > 1.0 && b.volume_confirmed {
            let regime = match b.direction {
                TrendDirection::Up => MarketRegime::BreakoutUp,
                _ => MarketRegime::BreakoutDown,
            };
            return (regime, b.strength.min(2.0) / 2.0 * 0.8);
        }
    }

    if volatility.percentile > 0.8 && volatility.expanding {
        return (MarketRegime::HighVolatility, volatility.percentile * 0.7);
    }

    if trend.direction != TrendDirection::Neutral && trend.strength > 0.6 {
        let regime = match trend.direction {
            TrendDirection::Up => MarketRegime::TrendingUp,
            _ => MarketRegime::TrendingDown,
        };
        let confidence = (trend.strength * trend.consistency + trend.consistency) / 2.0;
        return (regime, confidence);
    }

    if trend.strength < 0.3 && volatility.percentile <= 0.8 {
        if volatility.percentile < 0.2 {
            return (MarketRegime::LowVolatility, (1.0 - trend.strength) * 0.8);
        }
        return (MarketRegime::Ranging, (1.0 - trend.strength) * 0.6);
    }

    (MarketRegime::Consolidation, 0.4)
}

fn returns(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .filter(|w| w[0].close != 0.0)
        .map(|w| (w[1].close - w[0].close) / w[0].close)
        .collect()
}

fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    Some(variance.sqrt())
}

fn volatility_read(hourly: &[Candle], four_hour: &[Candle]) -> VolatilityRead {
    let hourly_returns = returns(hourly);

    let current = hourly_returns
        .len()
        .checked_sub(VOL_WINDOW)
        .and_then(|start| std_dev(&hourly_returns[start..]))
        .map(|s| s * (VOL_WINDOW as f64).sqrt() * 100.0);

    let Some(value) = current else {
        return VolatilityRead {
            value: 0.0,
            percentile: 0.5,
            expanding: false,
        };
    };

    // Historical distribution from rolling windows on the slower series
    let medium_returns = returns(four_hour);
    let mut historical: Vec<f64> = medium_returns
        .windows(VOL_HIST_WINDOW)
        .filter_map(std_dev)
        .map(|s| s * 6f64.sqrt() * 100.0)
        .collect();

    let percentile = if historical.is_empty() {
        0.5
    } else {
        historical.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let below = historical.iter().filter(|v| **v < value).count();
        below as f64 / historical.len() as f64
    };

    let expanding = hourly_returns
        .len()
        .checked_sub(VOL_WINDOW * 2)
        .and_then(|start| {
            let prior = std_dev(&hourly_returns[start..start + VOL_WINDOW])?;
            let recent = std_dev(&hourly_returns[hourly_returns.len() - VOL_WINDOW..])?;
            Some(recent > prior * 1.2)
        })
        .unwrap_or(false);

    VolatilityRead {
        value,
        percentile,
        expanding,
    }
}

fn support_resistance(four_hour: &[Candle]) -> (Option<f64>, Option<f64>) {
    let mut highs = pivot_highs(four_hour, PIVOT_WINDOW);
    let mut lows = pivot_lows(four_hour, PIVOT_WINDOW);

    highs.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    lows.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let resistance = if highs.is_empty() {
        None
    } else {
        let top = &highs[..highs.len().min(3)];
        Some(top.iter().sum::<f64>() / top.len() as f64)
    };

    let support = if lows.is_empty() {
        None
    } else {
        let bottom = &lows[..lows.len().min(3)];
        Some(bottom.iter().sum::<f64>() / bottom.len() as f64)
    };

    (support, resistance)
}

/// Average volume over the `baseline` bars preceding the last `recent` bars
fn baseline_volume(candles: &[Candle], recent: usize, baseline: usize) -> Option<f64> {
    if candles.len() < recent + baseline {
        return None;
    }
    let end = candles.len() - recent;
    let window = &candles[end - baseline..end];
    Some(window.iter().map(|c| c.volume).sum::<f64>() / baseline as f64)
}
