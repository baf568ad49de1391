//! Health probes for planted adaptations

use async_trait::async_trait;
use canopy_common::UnitScore;
use serde::{Deserialize, Serialize};

use crate::adaptation::Adaptation;

/// Measures the health of a planted adaptation
///
/// `None` means the probe could not take a reading; the pipeline treats that
/// as a monitoring failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn measure(&self, adaptation: &Adaptation) -> Option<f64>;
}

/// Health from the adaptation's own scores
///
/// `mean(confidence, expected_impact, 1 - implementation_complexity)`
#[derive(Debug, Clone, Default)]
pub struct ConfidenceHealthProbe;

#[async_trait]
impl HealthProbe for ConfidenceHealthProbe {
    async fn measure(&self, adaptation: &Adaptation) -> Option<f64> {
        let health = UnitScore::mean(&[
            adaptation.confidence,
            adaptation.expected_impact,
            1.0 - adaptation.implementation_complexity,
        ]);
        Some(health.value())
    }
}

/// Result of one health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MonitorOutcome {
    Healthy { health: f64 },
    FlaggedForReview { health: f64 },
    /// The check could not run; the adaptation, if it still exists, is flagged
    Failed { reason: String },
}

impl MonitorOutcome {
    pub fn health(&self) -> Option<f64> {
        match self {
            MonitorOutcome::Healthy { health } | MonitorOutcome::FlaggedForReview { health } => {
                Some(*health)
            }
            MonitorOutcome::Failed { .. } => None,
        }
    }

    pub fn is_flagged(&self) -> bool {
        !matches!(self, MonitorOutcome::Healthy { .. })
    }
}
