use crate::config::FilterConfig;
use crate::indicators::IndicatorSnapshot;
use crate::models::{SignalAction, TradingSignal};
use crate::regime::detector::{MarketRegime, RegimeAssessment, TrendDirection};

/// Regime-aware post-filter for entry signals
///
/// Runs after the scorer and may veto a signal, dampen its confidence,
/// or boost it when it lines up with a breakout. Exit and hold signals
/// pass through untouched.
pub struct RegimeFilter {
    config: FilterConfig,
}

impl RegimeFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn apply(
        &self,
        signal: TradingSignal,
        assessment: &RegimeAssessment,
        snapshot: &IndicatorSnapshot,
    ) -> TradingSignal {
        if !signal.action.is_entry() {
            return signal;
        }

        let mut signal = signal;
        let symbol = signal.symbol.clone();

        // Strong trends reject counter-trend entries outright
        if assessment.is_trending() && assessment.trend_strength > 0.6 {
            let against = matches!(
                (assessment.trend_direction, signal.action),
                (TrendDirection::Up, SignalAction::Short)
                    | (TrendDirection::Down, SignalAction::Long)
            );
            if against {
                tracing::info!(%symbol, action = ?signal.action, "rejected counter-trend entry");
                return TradingSignal::hold(
                    &symbol,
                    format!("counter-trend entry in {:?} regime", assessment.regime),
                );
            }
        }

        match assessment.regime {
            MarketRegime::HighVolatility => {
                signal.confidence *= 0.8;
                signal.reason.push_str("; dampened by high volatility");
                if signal.confidence < self.config.min_confidence * 0.9 {
                    return TradingSignal::hold(&symbol, "confidence lost to high volatility");
                }
            }
            MarketRegime::BreakoutUp | MarketRegime::BreakoutDown => {
                let breakout_side = if assessment.regime == MarketRegime::BreakoutUp {
                    SignalAction::Long
                } else {
                    SignalAction::Short
                };
                if signal.action == breakout_side {
                    signal.confidence = (signal.confidence * 1.2).min(0.95);
                    signal.reason.push_str("; aligned with breakout");
                } else if assessment.confidence > 0.8 {
                    return TradingSignal::hold(&symbol, "entry against a confirmed breakout");
                } else {
                    signal.confidence *= 0.7;
                    signal.reason.push_str("; against an unconfirmed breakout");
                }
            }
            MarketRegime::Ranging | MarketRegime::LowVolatility => {
                // Mean reversion only: fade entries that are not at an edge
                let supported = match signal.action {
                    SignalAction::Long => {
                        snapshot.rsi_or_neutral() < 35.0 || snapshot.bb_position_or_neutral() < 0.25
                    }
                    SignalAction::Short => {
                        snapshot.rsi_or_neutral() > 65.0 || snapshot.bb_position_or_neutral() > 0.75
                    }
                    _ => true,
                };
                if !supported {
                    signal.confidence *= 0.8;
                    signal.reason.push_str("; mid-range entry in a ranging market");
                }
            }
            _ => {}
        }

        if signal.confidence < self.config.min_confidence {
            return TradingSignal::hold(
                &symbol,
                format!(
                    "confidence {:.2} below minimum {:.2}",
                    signal.confidence, self.config.min_confidence
                ),
            );
        }

        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::snapshot::{BollingerGroup, RsiGroup};
    use crate::models::{SignalStrength, TradingSignal};
    use chrono::Utc;

    fn entry_signal(action: SignalAction, confidence: f64) -> TradingSignal {
        TradingSignal {
            symbol: "BTC-USDT".to_string(),
            action,
            strength: SignalStrength::Strong,
            confidence,
            score: 8.0,
            reason: "test".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn assessment(regime: MarketRegime, confidence: f64) -> RegimeAssessment {
        let (direction, strength) = match regime {
            MarketRegime::TrendingUp => (TrendDirection::Up, 0.9),
            MarketRegime::TrendingDown => (TrendDirection::Down, 0.9),
            _ => (TrendDirection::Neutral, 0.1),
        };
        RegimeAssessment {
            symbol: "BTC-USDT".to_string(),
            regime,
            confidence,
            trend_direction: direction,
            trend_strength: strength,
            trend_consistency: 1.0,
            volatility_pct: 1.0,
            volatility_percentile: 0.5,
            volatility_expanding: false,
            support: None,
            resistance: None,
            breakout: None,
            timestamp: Utc::now(),
        }
    }

    fn mid_range_snapshot() -> IndicatorSnapshot {
        let mut s = IndicatorSnapshot::empty(100.0);
        s.rsi = Some(RsiGroup {
            value: 50.0,
            avg_3: 50.0,
            rising: false,
            delta: 0.0,
        });
        s.bollinger = Some(BollingerGroup {
            position: 0.5,
            width_pct: 1.0,
            oversold: false,
            overbought: false,
        });
        s
    }

    fn filter() -> RegimeFilter {
        RegimeFilter::new(FilterConfig::default())
    }

    #[test]
    fn test_counter_trend_short_rejected() {
        let signal = entry_signal(SignalAction::Short, 0.9);
        let out = filter().apply(
            signal,
            &assessment(MarketRegime::TrendingUp, 0.8),
            &mid_range_snapshot(),
        );

        assert_eq!(out.action, SignalAction::Hold);
        assert!(out.reason.contains("counter-trend"));
    }

    #[test]
    fn test_trend_aligned_long_passes() {
        let signal = entry_signal(SignalAction::Long, 0.9);
        let out = filter().apply(
            signal,
            &assessment(MarketRegime::TrendingUp, 0.8),
            &mid_range_snapshot(),
        );

        assert_eq!(out.action, SignalAction::Long);
        assert_eq!(out.confidence, 0.9);
    }

    #[test]
    fn test_high_volatility_dampens() {
        let signal = entry_signal(SignalAction::Long, 0.9);
        let out = filter().apply(
            signal,
            &assessment(MarketRegime::HighVolatility, 0.6),
            &mid_range_snapshot(),
        );

        assert_eq!(out.action, SignalAction::Long);
        assert!((out.confidence - 0.72).abs() < 1e-9);
    }

    #[test]
    fn test_high_volatility_rejects_marginal_confidence() {
        // 0.55 * 0.8 = 0.44, below 0.9 * min_confidence (0.495)
        let signal = entry_signal(SignalAction::Long, 0.55);
        let out = filter().apply(
            signal,
            &assessment(MarketRegime::HighVolatility, 0.6),
            &mid_range_snapshot(),
        );

        assert_eq!(out.action, SignalAction::Hold);
    }

    #[test]
    fn test_breakout_aligned_boosted_and_capped() {
        let signal = entry_signal(SignalAction::Long, 0.9);
        let out = filter().apply(
            signal,
            &assessment(MarketRegime::BreakoutUp, 0.7),
            &mid_range_snapshot(),
        );

        assert_eq!(out.action, SignalAction::Long);
        assert_eq!(out.confidence, 0.95);
    }

    #[test]
    fn test_confirmed_breakout_rejects_counter_entry() {
        let signal = entry_signal(SignalAction::Short, 0.9);
        let out = filter().apply(
            signal,
            &assessment(MarketRegime::BreakoutUp, 0.85),
            &mid_range_snapshot(),
        );

        assert_eq!(out.action, SignalAction::Hold);
    }

    #[test]
    fn test_unconfirmed_breakout_dampens_counter_entry() {
        let signal = entry_signal(SignalAction::Short, 0.9);
        let out = filter().apply(
            signal,
            &assessment(MarketRegime::BreakoutUp, 0.6),
            &mid_range_snapshot(),
        );

        assert_eq!(out.action, SignalAction::Short);
        assert!((out.confidence - 0.63).abs() < 1e-9);
    }

    #[test]
    fn test_ranging_dampens_mid_range_long() {
        let signal = entry_signal(SignalAction::Long, 0.9);
        let out = filter().apply(
            signal,
            &assessment(MarketRegime::Ranging, 0.5),
            &mid_range_snapshot(),
        );

        assert_eq!(out.action, SignalAction::Long);
        assert!((out.confidence - 0.72).abs() < 1e-9);
        assert!(out.reason.contains("mid-range"));
    }

    #[test]
    fn test_ranging_keeps_edge_long() {
        let mut snapshot = mid_range_snapshot();
        snapshot.rsi = Some(RsiGroup {
            value: 28.0,
            avg_3: 30.0,
            rising: true,
            delta: 1.0,
        });

        let signal = entry_signal(SignalAction::Long, 0.9);
        let out = filter().apply(signal, &assessment(MarketRegime::Ranging, 0.5), &snapshot);

        assert_eq!(out.action, SignalAction::Long);
        assert_eq!(out.confidence, 0.9);
    }

    #[test]
    fn test_exit_signals_pass_through() {
        let mut signal = entry_signal(SignalAction::CloseLong, 0.4);
        signal.action = SignalAction::CloseLong;

        let out = filter().apply(
            signal,
            &assessment(MarketRegime::HighVolatility, 0.6),
            &mid_range_snapshot(),
        );

        assert_eq!(out.action, SignalAction::CloseLong);
        assert_eq!(out.confidence, 0.4);
    }

    #[test]
    fn test_final_confidence_floor() {
        let signal = entry_signal(SignalAction::Long, 0.5);
        let out = filter().apply(
            signal,
            &assessment(MarketRegime::Consolidation, 0.4),
            &mid_range_snapshot(),
        );

        assert_eq!(out.action, SignalAction::Hold);
        assert!(out.reason.contains("below minimum"));
    }
}
