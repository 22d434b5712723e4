// Position lifecycle and the trading engine
pub mod engine;
pub mod position_book;
pub mod scaling;

pub use engine::TradingEngine;
pub use position_book::{Position, PositionBook, PositionBookError};
pub use scaling::{ScalePlan, ScalingAnalyzer, ScalingDecision};
