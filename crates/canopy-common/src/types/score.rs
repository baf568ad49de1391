//! UnitScore - scalar score bounded to `[0, 1]`
//!
//! Every probability, coherence, viability, confidence and health value in the
//! engine is a UnitScore. Construction clamps, so downstream arithmetic never
//! has to re-check the bounds.

use serde::{Deserialize, Serialize};

/// A score clamped to `[0, 1]`; NaN collapses to 0
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitScore(f64);

impl UnitScore {
    pub const ZERO: UnitScore = UnitScore(0.0);
    pub const ONE: UnitScore = UnitScore(1.0);

    /// Create a score, clamping into range
    #[inline]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Arithmetic mean of the given values, clamped. Empty input scores 0.
    pub fn mean(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::ZERO;
        }
        Self::new(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Weighted mean; weights that are non-positive or non-finite are ignored
    pub fn weighted_mean(pairs: &[(f64, f64)]) -> Self {
        let (sum, total_weight) = pairs
            .iter()
            .filter(|(_, w)| w.is_finite() && *w > 0.0)
            .fold((0.0, 0.0), |(s, tw), (v, w)| (s + v * w, tw + w));

        if total_weight == 0.0 {
            return Self::ZERO;
        }
        Self::new(sum / total_weight)
    }

    /// Product of two scores (stays in range by construction)
    #[inline]
    pub fn product(self, other: UnitScore) -> Self {
        Self(self.0 * other.0)
    }

    /// `1 - score`
    #[inline]
    pub fn complement(self) -> Self {
        Self(1.0 - self.0)
    }
}

impl From<UnitScore> for f64 {
    fn from(score: UnitScore) -> Self {
        score.0
    }
}

impl std::fmt::Display for UnitScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}
