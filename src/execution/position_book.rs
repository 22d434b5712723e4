use crate::models::PositionSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum PositionBookError {
    #[error("position already open for {0}")]
    AlreadyOpen(String),
    #[error("no open position for {0}")]
    NotFound(String),
    #[error("scale rejected for {0}: {1}")]
    ScaleRejected(String, String),
}

/// Canonical record of one open position
///
/// Constructed only through [`PositionBook::open`]; every consumer
/// reads the same fields instead of carrying its own copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub side: PositionSide,
    /// Current notional size in USDT
    pub size: f64,
    /// Size at open, before any scaling
    pub original_size: f64,
    /// Weighted average entry price across open and scale-ins
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub scale_in_count: u32,
    /// Fraction of the original size already taken off
    pub scaled_out_fraction: f64,
}

impl Position {
    /// Signed profit percent at `price`
    pub fn pnl_pct(&self, price: f64) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        match self.side {
            PositionSide::Long => (price - self.entry_price) / self.entry_price * 100.0,
            PositionSide::Short => (self.entry_price - price) / self.entry_price * 100.0,
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.entry_time).num_minutes()
    }
}

/// At most one position per symbol
pub struct PositionBook {
    positions: HashMap<String, Position>,
    max_multiplier: f64,
    max_scale_out_fraction: f64,
}

impl PositionBook {
    pub fn new(max_multiplier: f64, max_scale_out_fraction: f64) -> Self {
        Self {
            positions: HashMap::new(),
            max_multiplier,
            max_scale_out_fraction,
        }
    }

    pub fn open(
        &mut self,
        symbol: &str,
        side: PositionSide,
        size: f64,
        price: f64,
    ) -> Result<&Position, PositionBookError> {
        if self.positions.contains_key(symbol) {
            return Err(PositionBookError::AlreadyOpen(symbol.to_string()));
        }

        let position = Position {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            size,
            original_size: size,
            entry_price: price,
            entry_time: Utc::now(),
            scale_in_count: 0,
            scaled_out_fraction: 0.0,
        };

        tracing::info!(symbol, ?side, size, price, "position opened");
        Ok(self.positions.entry(symbol.to_string()).or_insert(position))
    }

    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn is_open(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn open_symbols(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Grow the position, recomputing the weighted average entry
    pub fn scale_in(
        &mut self,
        symbol: &str,
        add_size: f64,
        price: f64,
    ) -> Result<&Position, PositionBookError> {
        let position = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| PositionBookError::NotFound(symbol.to_string()))?;

        let new_size = position.size + add_size;
        if new_size > position.original_size * self.max_multiplier {
            return Err(PositionBookError::ScaleRejected(
                symbol.to_string(),
                format!(
                    "size {:.2} would exceed {:.1}x the original",
                    new_size, self.max_multiplier
                ),
            ));
        }

        position.entry_price =
            (position.entry_price * position.size + price * add_size) / new_size;
        position.size = new_size;
        position.scale_in_count += 1;

        tracing::info!(symbol, add_size, price, new_size, "scaled in");
        Ok(position)
    }

    /// Take `fraction` of the current size off; returns the closed size
    pub fn scale_out(&mut self, symbol: &str, fraction: f64) -> Result<f64, PositionBookError> {
        let position = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| PositionBookError::NotFound(symbol.to_string()))?;

        if !(0.0..=1.0).contains(&fraction) {
            return Err(PositionBookError::ScaleRejected(
                symbol.to_string(),
                format!("invalid fraction {fraction}"),
            ));
        }

        let closed = position.size * fraction;
        let cumulative = position.scaled_out_fraction + closed / position.original_size;
        if cumulative > self.max_scale_out_fraction {
            return Err(PositionBookError::ScaleRejected(
                symbol.to_string(),
                format!("cumulative scale-out {:.0}% over cap", cumulative * 100.0),
            ));
        }

        position.size -= closed;
        position.scaled_out_fraction = cumulative;

        tracing::info!(symbol, closed, remaining = position.size, "scaled out");
        Ok(closed)
    }

    pub fn close(&mut self, symbol: &str) -> Result<Position, PositionBookError> {
        let position = self
            .positions
            .remove(symbol)
            .ok_or_else(|| PositionBookError::NotFound(symbol.to_string()))?;

        tracing::info!(symbol, size = position.size, "position closed");
        Ok(position)
    }

    /// Drop a position the exchange no longer reports, without pnl math
    pub fn force_remove(&mut self, symbol: &str) -> Option<Position> {
        let removed = self.positions.remove(symbol);
        if removed.is_some() {
            tracing::warn!(symbol, "position force-removed after exchange desync");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> PositionBook {
        PositionBook::new(2.0, 0.9)
    }

    #[test]
    fn test_open_and_get() {
        let mut book = book();
        book.open("BTC-USDT", PositionSide::Long, 100.0, 50000.0).unwrap();

        let p = book.get("BTC-USDT").unwrap();
        assert_eq!(p.side, PositionSide::Long);
        assert_eq!(p.size, 100.0);
        assert_eq!(p.entry_price, 50000.0);
        assert!(book.is_open("BTC-USDT"));
        assert!(!book.is_open("ETH-USDT"));
    }

    #[test]
    fn test_duplicate_open_rejected() {
        let mut book = book();
        book.open("BTC-USDT", PositionSide::Long, 100.0, 50000.0).unwrap();

        let err = book
            .open("BTC-USDT", PositionSide::Short, 50.0, 50000.0)
            .unwrap_err();
        assert_eq!(err, PositionBookError::AlreadyOpen("BTC-USDT".to_string()));

        // The original position is untouched
        assert_eq!(book.get("BTC-USDT").unwrap().side, PositionSide::Long);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_close_without_position_is_clean_error() {
        let mut book = book();
        let err = book.close("BTC-USDT").unwrap_err();
        assert_eq!(err, PositionBookError::NotFound("BTC-USDT".to_string()));
        assert!(book.is_empty());
    }

    #[test]
    fn test_scale_in_recomputes_weighted_entry() {
        let mut book = book();
        book.open("BTC-USDT", PositionSide::Long, 100.0, 50000.0).unwrap();

        let p = book.scale_in("BTC-USDT", 50.0, 47000.0).unwrap();
        assert_eq!(p.size, 150.0);
        assert_eq!(p.scale_in_count, 1);
        // (50000 * 100 + 47000 * 50) / 150
        assert!((p.entry_price - 49000.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_in_capped_at_multiplier() {
        let mut book = book();
        book.open("BTC-USDT", PositionSide::Long, 100.0, 50000.0).unwrap();

        let err = book.scale_in("BTC-USDT", 150.0, 50000.0).unwrap_err();
        assert!(matches!(err, PositionBookError::ScaleRejected(_, _)));
        assert_eq!(book.get("BTC-USDT").unwrap().size, 100.0);
    }

    #[test]
    fn test_scale_out_accumulates() {
        let mut book = book();
        book.open("BTC-USDT", PositionSide::Long, 100.0, 50000.0).unwrap();

        let closed = book.scale_out("BTC-USDT", 0.25).unwrap();
        assert_eq!(closed, 25.0);
        let p = book.get("BTC-USDT").unwrap();
        assert_eq!(p.size, 75.0);
        assert_eq!(p.scaled_out_fraction, 0.25);

        let closed = book.scale_out("BTC-USDT", 0.4).unwrap();
        assert_eq!(closed, 30.0);
        assert_eq!(book.get("BTC-USDT").unwrap().scaled_out_fraction, 0.55);
    }

    #[test]
    fn test_scale_out_cap_enforced() {
        let mut book = book();
        book.open("BTC-USDT", PositionSide::Long, 100.0, 50000.0).unwrap();

        book.scale_out("BTC-USDT", 0.8).unwrap();
        // 80% already off; another 80% of the remainder (16% of original)
        // would push the cumulative total past 90%
        let err = book.scale_out("BTC-USDT", 0.8).unwrap_err();
        assert!(matches!(err, PositionBookError::ScaleRejected(_, _)));
    }

    #[test]
    fn test_pnl_pct_by_side() {
        let mut book = book();
        book.open("BTC-USDT", PositionSide::Long, 100.0, 50000.0).unwrap();
        book.open("ETH-USDT", PositionSide::Short, 100.0, 2500.0).unwrap();

        assert!((book.get("BTC-USDT").unwrap().pnl_pct(51000.0) - 2.0).abs() < 1e-9);
        assert!((book.get("ETH-USDT").unwrap().pnl_pct(2450.0) - 2.0).abs() < 1e-9);
        assert!((book.get("ETH-USDT").unwrap().pnl_pct(2550.0) + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_force_remove() {
        let mut book = book();
        book.open("BTC-USDT", PositionSide::Long, 100.0, 50000.0).unwrap();

        assert!(book.force_remove("BTC-USDT").is_some());
        assert!(book.force_remove("BTC-USDT").is_none());
        assert!(book.is_empty());
    }
}
