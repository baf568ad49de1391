//! # Canopy Adaptive
//!
//! Turns recurring friction signals into vetted, monitored adaptations.
//!
//! ## Fire Intensity
//!
//! ```text
//! intensity = Σ min(indicator, 5) / 25
//! ```
//!
//! over frustration count, attempts, help requests, urgency (5 when high or
//! critical) and error count.
//!
//! ## Lifecycle
//!
//! - Below the fire threshold a signal is classified, scored for viability and
//!   banked as a seed.
//! - At or above it, the best matching seeds germinate into candidate
//!   adaptations. A candidate is planted only if it clears the viability gate
//!   (`confidence > 0.6`, `complexity < 0.8`, `impact > 0.5`).
//! - Each planted adaptation gets a deferred health check. Health below 0.7
//!   flags it for review.

pub mod adaptation;
pub mod classify;
pub mod germination;
pub mod intensity;
pub mod monitor;
pub mod pipeline;
pub mod seed_bank;

pub use adaptation::{Adaptation, AdaptationStatus, InvalidTransition};
pub use classify::AdaptationType;
pub use germination::{AdaptationRejected, GerminationConditions, ViabilityGate};
pub use intensity::fire_intensity;
pub use monitor::{ConfidenceHealthProbe, HealthProbe, MonitorOutcome};
pub use pipeline::{AdaptiveSignalPipeline, MonitorListener, SignalOutcome};
pub use seed_bank::{Seed, SeedBank};

use serde::{Deserialize, Serialize};

/// Adaptive pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Intensity at which stored seeds germinate
    pub fire_threshold: f64,
    /// Conditions averaged into the germination success factor
    pub conditions: GerminationConditions,
    /// Thresholds a candidate must clear to be planted
    pub gate: ViabilityGate,
    /// Delay before a planted adaptation's health check
    pub monitor_delay_secs: u64,
    /// Health below which an adaptation is flagged for review
    pub health_review_threshold: f64,
    /// Seeds kept per adaptation type; oldest evicted first
    pub max_seeds_per_type: usize,
    /// Seconds a seed stays in the bank
    pub seed_ttl_secs: u64,
    /// Return seeds of rejected candidates to the bank
    pub restore_rejected_seeds: bool,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            fire_threshold: canopy_common::FIRE_THRESHOLD,
            conditions: GerminationConditions::default(),
            gate: ViabilityGate::default(),
            monitor_delay_secs: 60,
            health_review_threshold: canopy_common::HEALTH_REVIEW_THRESHOLD,
            max_seeds_per_type: 128,
            seed_ttl_secs: 7 * 24 * 60 * 60,
            restore_rejected_seeds: true,
        }
    }
}
