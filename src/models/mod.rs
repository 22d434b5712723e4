use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OHLCV candlestick for one symbol and interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Direction of an open perpetual-futures position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

/// What the scorer wants done
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SignalAction {
    Long,
    Short,
    Hold,
    CloseLong,
    CloseShort,
}

impl SignalAction {
    /// Side this action would open, if any
    pub fn entry_side(&self) -> Option<PositionSide> {
        match self {
            SignalAction::Long => Some(PositionSide::Long),
            SignalAction::Short => Some(PositionSide::Short),
            _ => None,
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, SignalAction::Long | SignalAction::Short)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, SignalAction::CloseLong | SignalAction::CloseShort)
    }
}

/// Qualitative band derived from the raw score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalStrength {
    Weak,
    Neutral,
    Strong,
    VeryStrong,
}

/// Output of the signal scorer, consumed by the regime filter and engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: String,
    pub action: SignalAction,
    pub strength: SignalStrength,
    pub confidence: f64,
    pub score: f64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl TradingSignal {
    /// Hold signal with an explanation; score 0, weak, no confidence
    pub fn hold(symbol: &str, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            action: SignalAction::Hold,
            strength: SignalStrength::Weak,
            confidence: 0.0,
            score: 0.0,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Why a position (or part of one) was closed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    TakeProfit,
    MaxHoldTime,
    QuickProfit,
    TechnicalExit,
    ScaleOut,
    Manual,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "StopLoss",
            ExitReason::TrailingStop => "TrailingStop",
            ExitReason::TakeProfit => "TakeProfit",
            ExitReason::MaxHoldTime => "MaxHoldTime",
            ExitReason::QuickProfit => "QuickProfit",
            ExitReason::TechnicalExit => "TechnicalExit",
            ExitReason::ScaleOut => "ScaleOut",
            ExitReason::Manual => "Manual",
        }
    }
}

/// One executed fill, as recorded in the trade log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub symbol: String,
    pub side: PositionSide,
    pub action: TradeAction,
    pub size: f64,
    pub price: f64,
    pub fee: f64,
    pub pnl: Option<f64>,
    pub confidence: f64,
    pub exit_reason: Option<ExitReason>,
    pub timestamp: DateTime<Utc>,
}

/// Whether the fill opened, grew, shrank, or closed the position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeAction {
    Open,
    ScaleIn,
    ScaleOut,
    Close,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Open => "Open",
            TradeAction::ScaleIn => "ScaleIn",
            TradeAction::ScaleOut => "ScaleOut",
            TradeAction::Close => "Close",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_signal() {
        let signal = TradingSignal::hold("BTC-USDT", "warming up");

        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.reason, "warming up");
    }

    #[test]
    fn test_action_entry_side() {
        assert_eq!(SignalAction::Long.entry_side(), Some(PositionSide::Long));
        assert_eq!(SignalAction::Short.entry_side(), Some(PositionSide::Short));
        assert_eq!(SignalAction::Hold.entry_side(), None);
        assert_eq!(SignalAction::CloseLong.entry_side(), None);
    }

    #[test]
    fn test_strength_ordering() {
        assert!(SignalStrength::VeryStrong > SignalStrength::Strong);
        assert!(SignalStrength::Strong > SignalStrength::Neutral);
        assert!(SignalStrength::Neutral > SignalStrength::Weak);
    }

    #[test]
    fn test_trade_record_creation() {
        let trade = TradeRecord {
            id: Uuid::new_v4(),
            symbol: "ETH-USDT".to_string(),
            side: PositionSide::Short,
            action: TradeAction::Open,
            size: 0.5,
            price: 2500.0,
            fee: 0.625,
            pnl: None,
            confidence: 0.78,
            exit_reason: None,
            timestamp: Utc::now(),
        };

        assert_eq!(trade.side, PositionSide::Short);
        assert!(trade.pnl.is_none());
    }
}
