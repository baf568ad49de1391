//! Adaptations and their lifecycle state machine

use canopy_common::CanopyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::classify::AdaptationType;
use crate::seed_bank::Seed;

/// Lifecycle status of an adaptation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationStatus {
    Stored,
    Germinating,
    Planted,
    Monitored,
    FlaggedForReview,
}

impl AdaptationStatus {
    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: AdaptationStatus) -> bool {
        use AdaptationStatus::*;
        matches!(
            (self, next),
            (Stored, Germinating)
                | (Germinating, Planted)
                | (Planted, Monitored)
                | (Planted, FlaggedForReview)
                | (Monitored, Monitored)
                | (Monitored, FlaggedForReview)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdaptationStatus::Stored => "stored",
            AdaptationStatus::Germinating => "germinating",
            AdaptationStatus::Planted => "planted",
            AdaptationStatus::Monitored => "monitored",
            AdaptationStatus::FlaggedForReview => "flagged_for_review",
        }
    }
}

impl std::fmt::Display for AdaptationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid adaptation transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: AdaptationStatus,
    pub to: AdaptationStatus,
}

impl From<InvalidTransition> for CanopyError {
    fn from(err: InvalidTransition) -> Self {
        CanopyError::Internal(err.to_string())
    }
}

/// A concrete behavioral change derived from a seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adaptation {
    pub id: Uuid,
    pub seed_id: Uuid,
    pub adaptation_type: AdaptationType,
    pub confidence: f64,
    pub implementation_complexity: f64,
    pub expected_impact: f64,
    pub status: AdaptationStatus,
    pub created_at: DateTime<Utc>,
    pub planted_at: Option<DateTime<Utc>>,
    /// Most recent health reading
    pub health: Option<f64>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Adaptation {
    /// New candidate in `Stored`, scores clamped to `[0, 1]`
    pub(crate) fn candidate(
        seed: &Seed,
        confidence: f64,
        implementation_complexity: f64,
        expected_impact: f64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            seed_id: seed.id,
            adaptation_type: seed.adaptation_type,
            confidence: confidence.clamp(0.0, 1.0),
            implementation_complexity: implementation_complexity.clamp(0.0, 1.0),
            expected_impact: expected_impact.clamp(0.0, 1.0),
            status: AdaptationStatus::Stored,
            created_at: Utc::now(),
            planted_at: None,
            health: None,
            last_checked_at: None,
        }
    }

    pub fn transition(&mut self, next: AdaptationStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if next == AdaptationStatus::Planted {
            self.planted_at = Some(Utc::now());
        }
        self.status = next;
        Ok(())
    }

    /// Planted, Monitored or FlaggedForReview
    pub fn is_planted(&self) -> bool {
        matches!(
            self.status,
            AdaptationStatus::Planted | AdaptationStatus::Monitored | AdaptationStatus::FlaggedForReview
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AdaptationStatus::*;

    fn candidate() -> Adaptation {
        let seed = Seed::new(AdaptationType::ErrorPrevention, "error", 0.9, Utc::now());
        Adaptation::candidate(&seed, 0.8, 0.4, 0.7)
    }

    #[test]
    fn test_happy_path() {
        let mut adaptation = candidate();
        assert_eq!(adaptation.status, Stored);
        for next in [Germinating, Planted, Monitored, Monitored, FlaggedForReview] {
            adaptation.transition(next).unwrap();
        }
        assert_eq!(adaptation.status, FlaggedForReview);
        assert!(adaptation.planted_at.is_some());
        assert!(adaptation.is_planted());
    }

    #[test]
    fn test_illegal_transitions() {
        let mut adaptation = candidate();
        let err = adaptation.transition(Planted).unwrap_err();
        assert_eq!(err, InvalidTransition { from: Stored, to: Planted });

        assert!(!FlaggedForReview.can_transition_to(Monitored));
        assert!(!Monitored.can_transition_to(Planted));
        assert!(!Germinating.can_transition_to(Monitored));
        assert!(Planted.can_transition_to(FlaggedForReview));
    }
}
