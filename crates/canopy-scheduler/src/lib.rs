//! # Canopy Scheduler
//!
//! Coherence-gated selection among competing collaboration requests.
//!
//! ## Scoring
//!
//! ```text
//! probability  = mean(trust, compatibility, max(0, 1 - resources/100), timing)
//! energy_yield = probability × coherence
//! ```
//!
//! The mean is weighted by [`ScoringWeights`] (all 1.0 by default), which is
//! the surface planted adaptations use to shift future scoring.
//!
//! ## Collapse
//!
//! Requests below the coherence threshold (0.85) are discarded. The survivor
//! with the strictly greatest energy yield wins; ties go to the earliest
//! submission.

pub mod entanglement;
pub mod filter;
pub mod scheduler;
pub mod scoring;

pub use filter::CoherencePolicy;
pub use scheduler::{RequestCoherenceScheduler, ScoredPath, Selection, SelectionStats};
pub use scoring::{
    BusinessHoursTiming, CoherenceStrategy, DeclaredCoherence, FixedTiming, ProbabilityCalculator,
    ScoringFactor, ScoringWeights, TimingStrategy,
};

use serde::{Deserialize, Serialize};

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum coherence for a request to stay eligible
    pub coherence_threshold: f64,
    /// Resource requirement that fully exhausts headroom
    pub resource_scale: f64,
    /// Timing alignment used when a request carries none
    pub default_timing_alignment: f64,
    /// Upper bound for any scoring weight
    pub max_factor_weight: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            coherence_threshold: canopy_common::COHERENCE_THRESHOLD,
            resource_scale: 100.0,
            default_timing_alignment: 1.0,
            max_factor_weight: 2.0,
        }
    }
}
