// External collaborator interfaces: market data, orders, trade records
pub mod bingx;
pub mod paper;

pub use bingx::BingxMarketData;
pub use paper::{NullTradeSink, PaperGateway};

use crate::models::{Candle, ExitReason, PositionSide, TradeAction, TradeRecord};
use async_trait::async_trait;

/// Read-only market data feed
///
/// Failures degrade rather than propagate: an unreachable venue yields
/// an empty candle series and a 0.0 price, and the caller skips the
/// symbol for that cycle.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: u32) -> Vec<Candle>;
    async fn current_price(&self, symbol: &str) -> f64;
}

/// An entry or scale-in order
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: PositionSide,
    pub action: TradeAction,
    /// Notional size in USDT
    pub size_usdt: f64,
    pub price: f64,
    pub leverage: u32,
    pub confidence: f64,
    pub reason: String,
}

/// A full close or scale-out order
#[derive(Debug, Clone)]
pub struct CloseRequest {
    pub symbol: String,
    pub side: PositionSide,
    pub action: TradeAction,
    /// Portion of the position being closed, in USDT
    pub size_usdt: f64,
    pub entry_price: f64,
    pub price: f64,
    pub exit_reason: ExitReason,
}

/// Result of an order attempt, never an Err
///
/// Gateways report failure in-band so the engine can decide what state
/// to keep; only `success: true` may mutate the position book.
#[derive(Debug, Clone, Default)]
pub struct OrderOutcome {
    pub success: bool,
    pub executed_price: f64,
    pub fee: f64,
    pub pnl: f64,
    pub error: Option<String>,
    /// The venue reports no such position for a close request
    pub position_missing: bool,
}

impl OrderOutcome {
    pub fn filled(executed_price: f64, fee: f64, pnl: f64) -> Self {
        Self {
            success: true,
            executed_price,
            fee,
            pnl,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn missing() -> Self {
        Self {
            position_missing: true,
            error: Some("position not found on venue".to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn open_position(&mut self, request: &OrderRequest) -> OrderOutcome;
    async fn close_position(&mut self, request: &CloseRequest) -> OrderOutcome;
}

/// Durable record of executed trades
#[async_trait]
pub trait TradeSink: Send + Sync {
    async fn record_trade(&self, record: &TradeRecord) -> anyhow::Result<()>;
}

#[async_trait]
impl TradeSink for Box<dyn TradeSink> {
    async fn record_trade(&self, record: &TradeRecord) -> anyhow::Result<()> {
        (**self).record_trade(record).await
    }
}
