use crate::api::{CloseRequest, OrderGateway, OrderOutcome, OrderRequest, TradeSink};
use crate::config::PaperConfig;
use crate::models::{PositionSide, TradeRecord};
use async_trait::async_trait;

/// Fill-everything paper gateway with a running balance and taker fees
///
/// Position accounting lives in the book; the gateway only simulates
/// fills, fees and realized pnl against a paper balance.
pub struct PaperGateway {
    balance: f64,
    fee_bps: f64,
}

impl PaperGateway {
    pub fn new(config: &PaperConfig) -> Self {
        Self {
            balance: config.initial_balance,
            fee_bps: config.fee_bps,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    fn fee(&self, size_usdt: f64) -> f64 {
        size_usdt * self.fee_bps / 10_000.0
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn open_position(&mut self, request: &OrderRequest) -> OrderOutcome {
        if request.price <= 0.0 || request.size_usdt <= 0.0 {
            return OrderOutcome::failed("invalid paper order");
        }

        let fee = self.fee(request.size_usdt);
        if fee >= self.balance {
            return OrderOutcome::failed("paper balance exhausted");
        }

        self.balance -= fee;
        tracing::info!(
            symbol = %request.symbol,
            side = ?request.side,
            size = request.size_usdt,
            price = request.price,
            balance = self.balance,
            "paper fill"
        );
        OrderOutcome::filled(request.price, fee, 0.0)
    }

    async fn close_position(&mut self, request: &CloseRequest) -> OrderOutcome {
        if request.entry_price <= 0.0 || request.price <= 0.0 {
            return OrderOutcome::failed("invalid paper close");
        }

        let move_pct = match request.side {
            PositionSide::Long => (request.price - request.entry_price) / request.entry_price,
            PositionSide::Short => (request.entry_price - request.price) / request.entry_price,
        };
        let fee = self.fee(request.size_usdt);
        let pnl = request.size_usdt * move_pct - fee;

        self.balance += pnl;
        tracing::info!(
            symbol = %request.symbol,
            reason = request.exit_reason.as_str(),
            pnl,
            balance = self.balance,
            "paper close"
        );
        OrderOutcome::filled(request.price, fee, pnl)
    }
}

/// Discards every record; for tests and dry runs without a database
pub struct NullTradeSink;

#[async_trait]
impl TradeSink for NullTradeSink {
    async fn record_trade(&self, _record: &TradeRecord) -> anyhow::Result<()> {
        Ok(())
    }
}
