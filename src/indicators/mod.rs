// Technical indicators module
// RSI, EMA, MACD, Bollinger, ATR and the combined snapshot

pub mod atr;
pub mod bollinger;
pub mod levels;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod snapshot;

pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, BollingerBands};
pub use levels::{average_volume, pivot_highs, pivot_lows, rolling_vwap};
pub use macd::{calculate_macd, macd_histogram_series, MacdOutput};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_sma};
pub use rsi::{calculate_rsi, rsi_series};
pub use snapshot::{EmaTrend, IndicatorSnapshot, PriceTrend};
