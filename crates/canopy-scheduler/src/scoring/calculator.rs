//! Probability calculation: weighted mean of four request factors

use canopy_common::{Request, UnitScore};
use serde::{Deserialize, Serialize};

/// Factors contributing to a request's selection probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringFactor {
    Trust,
    Compatibility,
    ResourceHeadroom,
    Timing,
}

/// Per-factor weights for the probability mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub trust: f64,
    pub compatibility: f64,
    pub resource_headroom: f64,
    pub timing: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            trust: 1.0,
            compatibility: 1.0,
            resource_headroom: 1.0,
            timing: 1.0,
        }
    }
}

impl ScoringWeights {
    pub fn get(&self, factor: ScoringFactor) -> f64 {
        match factor {
            ScoringFactor::Trust => self.trust,
            ScoringFactor::Compatibility => self.compatibility,
            ScoringFactor::ResourceHeadroom => self.resource_headroom,
            ScoringFactor::Timing => self.timing,
        }
    }

    /// Increase one weight by `delta`, capped at `max_weight`. Returns the new weight.
    pub fn reinforce(&mut self, factor: ScoringFactor, delta: f64, max_weight: f64) -> f64 {
        let slot = match factor {
            ScoringFactor::Trust => &mut self.trust,
            ScoringFactor::Compatibility => &mut self.compatibility,
            ScoringFactor::ResourceHeadroom => &mut self.resource_headroom,
            ScoringFactor::Timing => &mut self.timing,
        };
        if delta.is_finite() {
            *slot = (*slot + delta).clamp(0.0, max_weight);
        }
        *slot
    }
}

/// Probability calculator
pub struct ProbabilityCalculator;

impl ProbabilityCalculator {
    /// Headroom left after the request's resource needs: `max(0, 1 - resources / scale)`
    pub fn resource_headroom(resource_requirements: f64, resource_scale: f64) -> f64 {
        if resource_scale <= 0.0 {
            return 0.0;
        }
        (1.0 - resource_requirements / resource_scale).max(0.0)
    }

    /// Calculate probability for a request given its timing alignment
    pub fn calculate(
        request: &Request,
        timing_alignment: f64,
        weights: &ScoringWeights,
        resource_scale: f64,
    ) -> UnitScore {
        let headroom = Self::resource_headroom(request.resource_requirements(), resource_scale);
        UnitScore::weighted_mean(&[
            (request.trust_level(), weights.trust),
            (request.compatibility(), weights.compatibility),
            (headroom, weights.resource_headroom),
            (UnitScore::new(timing_alignment).value(), weights.timing),
        ])
    }
}
