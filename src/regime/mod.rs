// Market regime detection module
pub mod detector;
pub mod filter;

pub use detector::{BreakoutInfo, MarketRegime, RegimeAssessment, RegimeDetector, TrendDirection};
pub use filter::RegimeFilter;
