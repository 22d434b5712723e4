// Signal scoring module
pub mod scorer;

pub use scorer::{ScoringAdjustments, SignalScorer};
