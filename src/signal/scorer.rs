use crate::config::{FilterConfig, ScoringConfig};
use crate::indicators::{EmaTrend, IndicatorSnapshot};
use crate::models::{PositionSide, SignalAction, SignalStrength, TradingSignal};
use chrono::{DateTime, Duration, Utc};

const DEFAULT_RSI_OVERSOLD: f64 = 30.0;
const DEFAULT_RSI_OVERBOUGHT: f64 = 70.0;

/// Per-evaluation overrides handed down by the regime detector
///
/// These never touch the configuration; they apply to one evaluation
/// and are rebuilt whenever the regime is refreshed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringAdjustments {
    pub min_score_long: Option<f64>,
    pub min_score_short: Option<f64>,
    /// Shift the RSI tier boundaries toward more extreme readings
    pub rsi_oversold: Option<f64>,
    pub rsi_overbought: Option<f64>,
    /// Position-size factor applied downstream of the signal
    pub size_factor: f64,
}

impl ScoringAdjustments {
    pub fn neutral() -> Self {
        Self {
            size_factor: 1.0,
            ..Default::default()
        }
    }
}

/// Additive entry/exit scorer over an indicator snapshot
///
/// Every indicator group votes points for each side independently; a
/// direction is emitted only when its total clears the minimum and
/// beats the opposite side by a margin. The scorer also owns the
/// startup warm-up and the post-signal cooldown.
pub struct SignalScorer {
    scoring: ScoringConfig,
    filters: FilterConfig,
    initial_wait: Duration,
    cooldown: Duration,
    started_at: DateTime<Utc>,
    last_signal_at: Option<DateTime<Utc>>,
}

impl SignalScorer {
    pub fn new(
        scoring: ScoringConfig,
        filters: FilterConfig,
        initial_wait_secs: u64,
        cooldown_secs: u64,
    ) -> Self {
        Self {
            scoring,
            filters,
            initial_wait: Duration::seconds(initial_wait_secs as i64),
            cooldown: Duration::seconds(cooldown_secs as i64),
            started_at: Utc::now(),
            last_signal_at: None,
        }
    }

    /// Evaluate an entry for a symbol with no open position
    pub fn evaluate_entry(
        &mut self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        adjustments: &ScoringAdjustments,
    ) -> TradingSignal {
        let now = Utc::now();

        let warmup_left = self.started_at + self.initial_wait - now;
        if warmup_left > Duration::zero() {
            return TradingSignal::hold(
                symbol,
                format!("warming up ({}s remaining)", warmup_left.num_seconds().max(1)),
            );
        }

        if let Some(last) = self.last_signal_at {
            let cooldown_left = last + self.cooldown - now;
            if cooldown_left > Duration::zero() {
                return TradingSignal::hold(
                    symbol,
                    format!("cooldown ({}s remaining)", cooldown_left.num_seconds().max(1)),
                );
            }
        }

        if snapshot.key_count() < 8 {
            return TradingSignal::hold(symbol, "insufficient indicators");
        }

        let long_score = score_long(snapshot, adjustments);
        let short_score = score_short(snapshot, adjustments);

        let min_long = adjustments.min_score_long.unwrap_or(self.scoring.min_score_long);
        let min_short = adjustments
            .min_score_short
            .unwrap_or(self.scoring.min_score_short);
        let margin = self.scoring.min_score_difference;

        let action = if long_score >= min_long && long_score > short_score + margin {
            SignalAction::Long
        } else if short_score >= min_short && short_score > long_score + margin {
            SignalAction::Short
        } else {
            return TradingSignal::hold(
                symbol,
                format!(
                    "no edge (long {:.1} vs short {:.1})",
                    long_score, short_score
                ),
            );
        };

        if self.filters.contradiction_check {
            let contradictions = count_contradictions(snapshot, action);
            if contradictions >= 2 {
                return TradingSignal::hold(
                    symbol,
                    format!("{} contradicting indicators, dropped {:?}", contradictions, action),
                );
            }
        }

        let score = long_score.max(short_score);
        let confidence = (0.45 + score * 0.08).min(0.95);

        tracing::info!(
            symbol,
            ?action,
            score,
            confidence,
            "entry signal (long {:.1} vs short {:.1})",
            long_score,
            short_score
        );

        self.last_signal_at = Some(now);

        TradingSignal {
            symbol: symbol.to_string(),
            action,
            strength: entry_strength(score),
            confidence,
            score,
            reason: format!("long {:.1} vs short {:.1}", long_score, short_score),
            timestamp: now,
        }
    }

    /// Evaluate closing an open position on technical grounds
    pub fn evaluate_exit(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        side: PositionSide,
    ) -> TradingSignal {
        let score = score_exit(snapshot, side);

        if score < self.scoring.min_exit_score {
            return TradingSignal::hold(symbol, format!("exit score {:.1} below minimum", score));
        }

        let action = match side {
            PositionSide::Long => SignalAction::CloseLong,
            PositionSide::Short => SignalAction::CloseShort,
        };

        TradingSignal {
            symbol: symbol.to_string(),
            action,
            strength: exit_strength(score),
            confidence: (0.50 + score * 0.08).min(0.92),
            score,
            reason: format!("technical exit score {:.1}", score),
            timestamp: Utc::now(),
        }
    }
}

fn entry_strength(score: f64) -> SignalStrength {
    if score >= 12.0 {
        SignalStrength::VeryStrong
    } else if score >= 8.0 {
        SignalStrength::Strong
    } else if score >= 5.0 {
        SignalStrength::Neutral
    } else {
        SignalStrength::Weak
    }
}

fn exit_strength(score: f64) -> SignalStrength {
    if score >= 8.0 {
        SignalStrength::Strong
    } else if score >= 5.0 {
        SignalStrength::Neutral
    } else {
        SignalStrength::Weak
    }
}

fn score_long(s: &IndicatorSnapshot, adj: &ScoringAdjustments) -> f64 {
    let mut score = 0.0;

    // More extreme oversold override shifts every tier down with it
    let offset = adj.rsi_oversold.unwrap_or(DEFAULT_RSI_OVERSOLD) - DEFAULT_RSI_OVERSOLD;

    if let Some(rsi) = s.rsi {
        score += if rsi.value < 20.0 + offset && rsi.avg_3 < 25.0 + offset {
            5.0
        } else if rsi.value < 25.0 + offset && rsi.avg_3 < 30.0 + offset {
            4.0
        } else if rsi.value < 30.0 + offset && rsi.rising {
            3.0
        } else if rsi.value < 35.0 + offset {
            2.0
        } else if rsi.value < 45.0 + offset {
            1.0
        } else {
            0.0
        };
    }

    if let Some(macd) = s.macd {
        score += if macd.bullish && macd.rising && macd.hist_avg_3 > 0.02 {
            4.0
        } else if macd.bullish && macd.rising {
            3.0
        } else if macd.bullish {
            2.0
        } else if macd.weak_bullish && macd.histogram > -0.05 {
            1.0
        } else {
            0.0
        };
    }

    if let Some(ema) = s.ema {
        score += match ema.trend {
            EmaTrend::StrongBullish => 4.0,
            EmaTrend::Bullish => 3.0,
            _ if ema.price_above_short => 1.0,
            _ => 0.0,
        };
    }

    if let Some(bb) = s.bollinger {
        score += if bb.oversold && bb.width_pct > 2.5 {
            3.0
        } else if bb.oversold {
            2.0
        } else if bb.position < 0.25 {
            1.0
        } else {
            0.0
        };
    }

    if let Some(m) = s.momentum {
        score += if m.bullish && m.strong {
            3.0
        } else if m.bullish {
            2.0
        } else if m.value > -0.5 {
            1.0
        } else {
            0.0
        };
    }

    score
}

fn score_short(s: &IndicatorSnapshot, adj: &ScoringAdjustments) -> f64 {
    let mut score = 0.0;

    let offset = adj.rsi_overbought.unwrap_or(DEFAULT_RSI_OVERBOUGHT) - DEFAULT_RSI_OVERBOUGHT;

    if let Some(rsi) = s.rsi {
        score += if rsi.value > 80.0 + offset && rsi.avg_3 > 75.0 + offset {
            5.0
        } else if rsi.value > 75.0 + offset && rsi.avg_3 > 70.0 + offset {
            4.0
        } else if rsi.value > 70.0 + offset && !rsi.rising {
            3.0
        } else if rsi.value > 65.0 + offset {
            2.0
        } else if rsi.value > 55.0 + offset {
            1.0
        } else {
            0.0
        };
    }

    if let Some(macd) = s.macd {
        score += if macd.bearish && !macd.rising && macd.hist_avg_3 < -0.02 {
            4.0
        } else if macd.bearish && !macd.rising {
            3.0
        } else if macd.bearish {
            2.0
        } else if macd.weak_bearish && macd.histogram < 0.05 {
            1.0
        } else {
            0.0
        };
    }

    if let Some(ema) = s.ema {
        score += match ema.trend {
            EmaTrend::StrongBearish => 4.0,
            EmaTrend::Bearish => 3.0,
            _ if !ema.price_above_short => 1.0,
            _ => 0.0,
        };
    }

    if let Some(bb) = s.bollinger {
        score += if bb.overbought && bb.width_pct > 2.5 {
            3.0
        } else if bb.overbought {
            2.0
        } else if bb.position > 0.75 {
            1.0
        } else {
            0.0
        };
    }

    if let Some(m) = s.momentum {
        score += if m.bearish && m.strong {
            3.0
        } else if m.bearish {
            2.0
        } else if m.value < 0.5 {
            1.0
        } else {
            0.0
        };
    }

    score
}

fn score_exit(s: &IndicatorSnapshot, side: PositionSide) -> f64 {
    let mut score = 0.0;

    match side {
        PositionSide::Long => {
            if let Some(rsi) = s.rsi {
                score += if rsi.value > 85.0 && rsi.avg_3 > 80.0 {
                    5.0
                } else if rsi.value > 80.0 {
                    4.0
                } else if rsi.value > 75.0 && !rsi.rising {
                    3.0
                } else if rsi.value > 70.0 {
                    2.0
                } else {
                    0.0
                };
            }
            if let Some(bb) = s.bollinger {
                score += if bb.position > 0.95 {
                    4.0
                } else if bb.position > 0.85 {
                    3.0
                } else if bb.position > 0.80 {
                    1.0
                } else {
                    0.0
                };
            }
            if let Some(macd) = s.macd {
                score += if macd.bearish && !macd.rising {
                    3.0
                } else if macd.bearish {
                    2.0
                } else {
                    0.0
                };
            }
            if let Some(ema) = s.ema {
                score += match ema.trend {
                    EmaTrend::StrongBearish => 3.0,
                    EmaTrend::Bearish => 2.0,
                    _ => 0.0,
                };
            }
            if let Some(m) = s.momentum {
                score += if m.bearish && m.strong {
                    3.0
                } else if m.bearish {
                    2.0
                } else {
                    0.0
                };
            }
        }
        PositionSide::Short => {
            if let Some(rsi) = s.rsi {
                score += if rsi.value < 15.0 && rsi.avg_3 < 20.0 {
                    5.0
                } else if rsi.value < 20.0 {
                    4.0
                } else if rsi.value < 25.0 && rsi.rising {
                    3.0
                } else if rsi.value < 30.0 {
                    2.0
                } else {
                    0.0
                };
            }
            if let Some(bb) = s.bollinger {
                score += if bb.position < 0.05 {
                    4.0
                } else if bb.position < 0.15 {
                    3.0
                } else if bb.position < 0.20 {
                    1.0
                } else {
                    0.0
                };
            }
            if let Some(macd) = s.macd {
                score += if macd.bullish && macd.rising {
                    3.0
                } else if macd.bullish {
                    2.0
                } else {
                    0.0
                };
            }
            if let Some(ema) = s.ema {
                score += match ema.trend {
                    EmaTrend::StrongBullish => 3.0,
                    EmaTrend::Bullish => 2.0,
                    _ => 0.0,
                };
            }
            if let Some(m) = s.momentum {
                score += if m.bullish && m.strong {
                    3.0
                } else if m.bullish {
                    2.0
                } else {
                    0.0
                };
            }
        }
    }

    score
}

/// Count indicators that strongly oppose the proposed direction
fn count_contradictions(s: &IndicatorSnapshot, action: SignalAction) -> usize {
    let mut count = 0;

    match action {
        SignalAction::Long => {
            if s.rsi.map(|r| r.value > 85.0).unwrap_or(false) {
                count += 1;
            }
            if s.macd
                .map(|m| m.bearish && m.histogram < -0.1)
                .unwrap_or(false)
            {
                count += 1;
            }
            if s.ema.map(|e| e.trend == EmaTrend::StrongBearish).unwrap_or(false) {
                count += 1;
            }
        }
        SignalAction::Short => {
            if s.rsi.map(|r| r.value < 15.0).unwrap_or(false) {
                count += 1;
            }
            if s.macd
                .map(|m| m.bullish && m.histogram > 0.1)
                .unwrap_or(false)
            {
                count += 1;
            }
            if s.ema.map(|e| e.trend == EmaTrend::StrongBullish).unwrap_or(false) {
                count += 1;
            }
        }
        _ => {}
    }

    count
}
