// Scoring evaluator: converts projections into fantasy points.

pub mod cache;
pub mod rule;

pub use cache::ScoreCache;
pub use rule::{ScoringRule, ThresholdBonus};
