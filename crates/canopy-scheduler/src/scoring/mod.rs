//! Request scoring
pub mod calculator;
pub mod strategy;

pub use self::calculator::{ProbabilityCalculator, ScoringFactor, ScoringWeights};
pub use self::strategy::{
    BusinessHoursTiming, CoherenceStrategy, DeclaredCoherence, FixedTiming, TimingStrategy,
};
