//! Germination of seeds into candidate adaptations, and the viability gate

use canopy_common::UnitScore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adaptation::Adaptation;
use crate::seed_bank::Seed;

/// Environmental conditions averaged into the germination success factor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GerminationConditions {
    pub timing: f64,
    pub resources: f64,
    pub user_readiness: f64,
}

impl Default for GerminationConditions {
    fn default() -> Self {
        Self {
            timing: 0.9,
            resources: 0.9,
            user_readiness: 0.9,
        }
    }
}

impl GerminationConditions {
    pub fn success_factor(&self) -> f64 {
        UnitScore::mean(&[self.timing, self.resources, self.user_readiness]).value()
    }
}

/// Thresholds a candidate must clear to be planted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViabilityGate {
    /// Confidence must be strictly above
    pub min_confidence: f64,
    /// Complexity must be strictly below
    pub max_complexity: f64,
    /// Expected impact must be strictly above
    pub min_impact: f64,
}

impl Default for ViabilityGate {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            max_complexity: 0.8,
            min_impact: 0.5,
        }
    }
}

impl ViabilityGate {
    /// Reasons the candidate fails the gate; empty when it passes
    pub fn evaluate(&self, candidate: &Adaptation) -> Vec<String> {
        let mut reasons = Vec::new();
        if candidate.confidence <= self.min_confidence {
            reasons.push(format!(
                "confidence {:.3} not above {:.3}",
                candidate.confidence, self.min_confidence
            ));
        }
        if candidate.implementation_complexity >= self.max_complexity {
            reasons.push(format!(
                "complexity {:.3} not below {:.3}",
                candidate.implementation_complexity, self.max_complexity
            ));
        }
        if candidate.expected_impact <= self.min_impact {
            reasons.push(format!(
                "expected impact {:.3} not above {:.3}",
                candidate.expected_impact, self.min_impact
            ));
        }
        reasons
    }
}

/// A germinated candidate that did not clear the viability gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationRejected {
    pub seed_id: Uuid,
    pub reasons: Vec<String>,
    /// Whether the seed went back to the bank
    pub seed_restored: bool,
}

/// Germinate a candidate from a seed under the given pressure
pub(crate) fn germinate(seed: &Seed, intensity: f64, conditions: &GerminationConditions) -> Adaptation {
    let confidence = UnitScore::new(seed.viability)
        .product(UnitScore::new(conditions.success_factor()))
        .value();
    let expected_impact = UnitScore::mean(&[seed.viability, intensity]).value();

    Adaptation::candidate(seed, confidence, seed.complexity, expected_impact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::AdaptationType;
    use chrono::Utc;

    fn seed(kind: AdaptationType, viability: f64) -> Seed {
        Seed::new(kind, "test", viability, Utc::now())
    }

    #[test]
    fn test_default_success_factor() {
        assert!((GerminationConditions::default().success_factor() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_strong_seed_passes_gate() {
        let candidate = germinate(
            &seed(AdaptationType::GuidanceEnhancement, 0.9),
            0.6,
            &GerminationConditions::default(),
        );
        // 0.9 × 0.9, complexity 0.3, mean(0.9, 0.6)
        assert!((candidate.confidence - 0.81).abs() < 1e-12);
        assert!((candidate.implementation_complexity - 0.3).abs() < 1e-12);
        assert!((candidate.expected_impact - 0.75).abs() < 1e-12);
        assert!(ViabilityGate::default().evaluate(&candidate).is_empty());
    }

    #[test]
    fn test_weak_seed_rejected_with_reasons() {
        let candidate = germinate(
            &seed(AdaptationType::ErrorPrevention, 0.3),
            0.6,
            &GerminationConditions::default(),
        );
        let reasons = ViabilityGate::default().evaluate(&candidate);
        assert_eq!(reasons.len(), 2);
        assert!(reasons[0].starts_with("confidence"));
        assert!(reasons[1].starts_with("expected impact"));
    }

    #[test]
    fn test_complex_seed_rejected() {
        let mut complex = seed(AdaptationType::PerformanceOptimization, 0.95);
        complex.complexity = 0.85;
        let candidate = germinate(&complex, 1.0, &GerminationConditions::default());
        let reasons = ViabilityGate::default().evaluate(&candidate);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].starts_with("complexity"));
    }
}
