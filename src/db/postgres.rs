use crate::api::TradeSink;
use crate::models::{ExitReason, PositionSide, TradeAction, TradeRecord};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

/// Postgres-backed trade journal
pub struct PostgresTradeSink {
    pool: PgPool,
}

impl PostgresTradeSink {
    /// Connect to Postgres and apply pending migrations
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres trade journal");

        Ok(Self { pool })
    }

    async fn insert_trade(&self, record: &TradeRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, symbol, side, action, size, price, fee,
                pnl, confidence, exit_reason, executed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(&record.symbol)
        .bind(record.side.as_str())
        .bind(record.action.as_str())
        .bind(record.size)
        .bind(record.price)
        .bind(record.fee)
        .bind(record.pnl)
        .bind(record.confidence)
        .bind(record.exit_reason.map(|r| r.as_str()))
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            symbol = %record.symbol,
            action = record.action.as_str(),
            "trade saved to Postgres"
        );

        Ok(())
    }

    /// Realized pnl across all recorded closes and scale-outs
    pub async fn total_pnl(&self) -> Result<f64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(pnl), 0.0) AS total_pnl
            FROM trades
            WHERE pnl IS NOT NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total_pnl"))
    }

    /// Load the most recent trades for a symbol, newest first
    pub async fn recent_trades(&self, symbol: &str, limit: i64) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, side, action, size, price, fee,
                   pnl, confidence, exit_reason, executed_at
            FROM trades
            WHERE symbol = $1
            ORDER BY executed_at DESC
            LIMIT $2
            "#,
        )
        .bind(symbol)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut trades = Vec::with_capacity(rows.len());
        for row in rows {
            let side_str: String = row.get("side");
            let action_str: String = row.get("action");
            let exit_reason_str: Option<String> = row.get("exit_reason");
            let executed_at: DateTime<Utc> = row.get("executed_at");
            let id: Uuid = row.get("id");

            let side = match side_str.as_str() {
                "LONG" => PositionSide::Long,
                "SHORT" => PositionSide::Short,
                other => return Err(format!("invalid trade side: {other}").into()),
            };

            let action = match action_str.as_str() {
                "Open" => TradeAction::Open,
                "ScaleIn" => TradeAction::ScaleIn,
                "ScaleOut" => TradeAction::ScaleOut,
                "Close" => TradeAction::Close,
                other => return Err(format!("invalid trade action: {other}").into()),
            };

            let exit_reason = match exit_reason_str.as_deref() {
                Some("StopLoss") => Some(ExitReason::StopLoss),
                Some("TrailingStop") => Some(ExitReason::TrailingStop),
                Some("TakeProfit") => Some(ExitReason::TakeProfit),
                Some("MaxHoldTime") => Some(ExitReason::MaxHoldTime),
                Some("QuickProfit") => Some(ExitReason::QuickProfit),
                Some("TechnicalExit") => Some(ExitReason::TechnicalExit),
                Some("ScaleOut") => Some(ExitReason::ScaleOut),
                Some("Manual") => Some(ExitReason::Manual),
                None => None,
                Some(other) => return Err(format!("invalid exit reason: {other}").into()),
            };

            trades.push(TradeRecord {
                id,
                symbol: row.get("symbol"),
                side,
                action,
                size: row.get("size"),
                price: row.get("price"),
                fee: row.get("fee"),
                pnl: row.get("pnl"),
                confidence: row.get("confidence"),
                exit_reason,
                timestamp: executed_at,
            });
        }

        Ok(trades)
    }

    #[cfg(test)]
    async fn clear_all_trades(&self) -> Result<()> {
        sqlx::query("DELETE FROM trades").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TradeSink for PostgresTradeSink {
    async fn record_trade(&self, record: &TradeRecord) -> anyhow::Result<()> {
        self.insert_trade(record)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get_test_db() -> PostgresTradeSink {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/perpbot_test".to_string());

        PostgresTradeSink::new(&database_url)
            .await
            .expect("Failed to connect to test database")
    }

    fn record(symbol: &str, action: TradeAction, pnl: Option<f64>) -> TradeRecord {
        TradeRecord {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side: PositionSide::Long,
            action,
            size: 100.0,
            price: 50000.0,
            fee: 0.05,
            pnl,
            confidence: 0.8,
            exit_reason: pnl.map(|_| ExitReason::TakeProfit),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    #[ignore] // Requires Postgres running
    async fn test_record_and_load_trades() {
        let db = get_test_db().await;
        db.clear_all_trades().await.unwrap();

        db.record_trade(&record("BTC-USDT", TradeAction::Open, None))
            .await
            .unwrap();
        db.record_trade(&record("BTC-USDT", TradeAction::Close, Some(1.95)))
            .await
            .unwrap();

        let trades = db.recent_trades("BTC-USDT", 10).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].action, TradeAction::Close);
        assert_eq!(trades[0].pnl, Some(1.95));
        assert_eq!(trades[0].exit_reason, Some(ExitReason::TakeProfit));

        db.clear_all_trades().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Postgres running
    async fn test_total_pnl() {
        let db = get_test_db().await;
        db.clear_all_trades().await.unwrap();

        db.record_trade(&record("BTC-USDT", TradeAction::Close, Some(5.0)))
            .await
            .unwrap();
        db.record_trade(&record("ETH-USDT", TradeAction::Close, Some(-2.0)))
            .await
            .unwrap();

        let total = db.total_pnl().await.unwrap();
        assert_eq!(total, 3.0);

        db.clear_all_trades().await.unwrap();
    }
}
