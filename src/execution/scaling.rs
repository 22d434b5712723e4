use crate::config::RiskConfig;
use crate::execution::position_book::Position;
use crate::indicators::{average_volume, IndicatorSnapshot};
use crate::models::{Candle, PositionSide};
use crate::regime::{MarketRegime, RegimeAssessment, TrendDirection};

const SCALE_OUT_MIN_PNL_PCT: f64 = 0.8;
const SCALE_IN_MAX_LOSS_PCT: f64 = -1.5;
const SCALE_IN_MAX_AGE_MINUTES: i64 = 120;
const SCALE_IN_MIN_SCORE: f64 = 15.0;
const SCALE_OUT_MIN_CONFIDENCE: f64 = 0.6;

/// A sized scaling recommendation with its accumulated score
#[derive(Debug, Clone, PartialEq)]
pub struct ScalePlan {
    /// Fraction of the current size to add or remove
    pub fraction: f64,
    pub score: f64,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScalingDecision {
    Hold,
    ScaleOut(ScalePlan),
    ScaleIn(ScalePlan),
}

/// Scores partial take-profit against adding to a winner
///
/// Both sides are scored every cycle; the higher score wins, and each
/// side still has to clear its own execution threshold.
pub struct ScalingAnalyzer {
    config: RiskConfig,
}

impl ScalingAnalyzer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        position: &Position,
        snapshot: &IndicatorSnapshot,
        assessment: &RegimeAssessment,
        candles: &[Candle],
    ) -> ScalingDecision {
        let out = self.scale_out_plan(position, snapshot, assessment);
        let inn = self.scale_in_plan(position, snapshot, assessment, candles);

        let out_score = out.as_ref().map_or(0.0, |p| p.score);
        let in_score = inn.as_ref().map_or(0.0, |p| p.score);

        if out_score > in_score {
            if let Some(plan) = out {
                if plan.confidence >= SCALE_OUT_MIN_CONFIDENCE {
                    return ScalingDecision::ScaleOut(plan);
                }
            }
        } else if let Some(plan) = inn {
            if plan.score > SCALE_IN_MIN_SCORE {
                return ScalingDecision::ScaleIn(plan);
            }
        }

        ScalingDecision::Hold
    }

    fn scale_out_plan(
        &self,
        position: &Position,
        snapshot: &IndicatorSnapshot,
        assessment: &RegimeAssessment,
    ) -> Option<ScalePlan> {
        let pnl = position.pnl_pct(snapshot.current_price);
        if pnl < SCALE_OUT_MIN_PNL_PCT {
            return None;
        }

        let mut score = (pnl * 8.0).min(25.0);
        let mut reasons = vec![format!("pnl {pnl:.2}%")];

        let mut fraction: f64 = if pnl >= 3.0 {
            0.8
        } else if pnl >= 2.0 {
            0.6
        } else if pnl >= 1.5 {
            0.4
        } else {
            0.25
        };

        let rsi = snapshot.rsi_or_neutral();
        let bb = snapshot.bb_position_or_neutral();
        match position.side {
            PositionSide::Long => {
                if rsi > 75.0 {
                    score += 15.0;
                    reasons.push(format!("RSI stretched at {rsi:.0}"));
                }
                if bb > 0.9 {
                    score += 10.0;
                    reasons.push("price at the upper band".to_string());
                }
            }
            PositionSide::Short => {
                if rsi < 25.0 {
                    score += 15.0;
                    reasons.push(format!("RSI stretched at {rsi:.0}"));
                }
                if bb < 0.1 {
                    score += 10.0;
                    reasons.push("price at the lower band".to_string());
                }
            }
        }

        if snapshot.volatility_or_zero() > 4.0 && pnl > 1.0 {
            score += 12.0;
            fraction = (fraction * 1.3).min(self.config.max_scale_out_fraction);
            reasons.push("volatile market, take more off".to_string());
        }

        if matches!(
            assessment.regime,
            MarketRegime::Ranging | MarketRegime::LowVolatility
        ) {
            score += 10.0;
            reasons.push("ranging regime favors taking profit".to_string());
        }

        if let Some(macd) = &snapshot.macd {
            let fading = match position.side {
                PositionSide::Long => !macd.rising,
                PositionSide::Short => macd.rising,
            };
            if fading {
                score += 8.0;
                reasons.push("momentum fading".to_string());
            }
        }

        Some(ScalePlan {
            fraction,
            score,
            confidence: (score / 40.0).min(0.95),
            reason: reasons.join(", "),
        })
    }

    fn scale_in_plan(
        &self,
        position: &Position,
        snapshot: &IndicatorSnapshot,
        assessment: &RegimeAssessment,
        candles: &[Candle],
    ) -> Option<ScalePlan> {
        let pnl = position.pnl_pct(snapshot.current_price);
        if pnl < SCALE_IN_MAX_LOSS_PCT {
            return None;
        }
        if position.age_minutes() > SCALE_IN_MAX_AGE_MINUTES {
            return None;
        }

        let mut score = 0.0;
        let mut fraction: f64 = 0.0;
        let mut reasons = Vec::new();

        let volume_ratio = volume_ratio(candles);

        if let Some(depth) = pullback_depth(position, candles) {
            let rsi = snapshot.rsi_or_neutral();
            let rsi_supported = match position.side {
                PositionSide::Long => (25.0..=45.0).contains(&rsi),
                PositionSide::Short => (55.0..=75.0).contains(&rsi),
            };
            let recovering = snapshot.macd.as_ref().is_some_and(|m| match position.side {
                PositionSide::Long => m.rising,
                PositionSide::Short => !m.rising,
            });
            if (0.3..=3.0).contains(&depth) && rsi_supported && recovering {
                score += 20.0;
                fraction = fraction.max(0.3);
                reasons.push(format!("healthy pullback of {depth:.2}%"));
            }
        }

        let breakout_confirmed = volume_ratio >= 1.2
            && match position.side {
                PositionSide::Long => {
                    snapshot.bb_position_or_neutral() > 0.6
                        && snapshot.momentum.as_ref().is_some_and(|m| m.bullish)
                }
                PositionSide::Short => {
                    snapshot.bb_position_or_neutral() < 0.4
                        && snapshot.momentum.as_ref().is_some_and(|m| m.bearish)
                }
            };
        if breakout_confirmed {
            score += 25.0;
            fraction = fraction.max(0.4);
            reasons.push("breakout confirmed on volume".to_string());
        }

        if level_defended(position, assessment, snapshot.current_price) {
            score += 18.0;
            fraction = fraction.max(0.35);
            reasons.push("level defended".to_string());
        }

        if volume_ratio > 1.3 {
            score += 8.0;
            reasons.push(format!("volume {volume_ratio:.1}x average"));
        }

        let trend_favors = match (assessment.regime, position.side) {
            (MarketRegime::TrendingUp, PositionSide::Long) => true,
            (MarketRegime::TrendingDown, PositionSide::Short) => true,
            (MarketRegime::BreakoutUp, PositionSide::Long) => true,
            (MarketRegime::BreakoutDown, PositionSide::Short) => true,
            _ => false,
        };
        if trend_favors {
            score += 12.0;
            reasons.push("regime favors the position".to_string());
        }

        // Each add gets harder to justify than the last
        if position.scale_in_count >= 2 {
            score -= 15.0;
        } else if position.scale_in_count >= 1 {
            score -= 8.0;
        }

        if score <= 0.0 || fraction == 0.0 {
            return None;
        }

        Some(ScalePlan {
            fraction,
            score,
            confidence: (score / 30.0).min(0.90),
            reason: reasons.join(", "),
        })
    }
}

/// Last bar's volume against the average of the 20 bars before it
fn volume_ratio(candles: &[Candle]) -> f64 {
    if candles.len() < 2 {
        return 1.0;
    }
    let last = candles[candles.len() - 1].volume;
    let prior = &candles[..candles.len() - 1];
    let lookback = prior.len().min(20);
    match average_volume(&prior[prior.len() - lookback..], lookback) {
        Some(avg) if avg > 0.0 => last / avg,
        _ => 1.0,
    }
}

/// Retrace (percent) from the most favorable close of the last 10 bars
fn pullback_depth(position: &Position, candles: &[Candle]) -> Option<f64> {
    if candles.is_empty() {
        return None;
    }
    let lookback = candles.len().min(10);
    let recent = &candles[candles.len() - lookback..];
    let price = candles[candles.len() - 1].close;

    match position.side {
        PositionSide::Long => {
            let high = recent.iter().map(|c| c.close).fold(f64::MIN, f64::max);
            (high > 0.0).then(|| (high - price) / high * 100.0)
        }
        PositionSide::Short => {
            let low = recent.iter().map(|c| c.close).fold(f64::MAX, f64::min);
            (low > 0.0).then(|| (price - low) / low * 100.0)
        }
    }
}

/// Price holding within 1% of the level that protects the position
fn level_defended(position: &Position, assessment: &RegimeAssessment, price: f64) -> bool {
    let level = match position.side {
        PositionSide::Long => assessment.support,
        PositionSide::Short => assessment.resistance,
    };
    match level {
        Some(level) if level > 0.0 => {
            let held = match position.side {
                PositionSide::Long => price >= level,
                PositionSide::Short => price <= level,
            };
            held && ((price - level) / level * 100.0).abs() < 1.0
        }
        _ => false,
    }
}
