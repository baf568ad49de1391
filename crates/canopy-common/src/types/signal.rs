//! Friction signals: recurring failure and frustration reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Urgency reported with a friction signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyLevel {
    /// Parse the free-form level used by producers; blank means low
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "low" | "none" => Ok(UrgencyLevel::Low),
            "medium" | "normal" | "moderate" => Ok(UrgencyLevel::Medium),
            "high" | "urgent" => Ok(UrgencyLevel::High),
            "critical" | "emergency" => Ok(UrgencyLevel::Critical),
            other => Err(InputError::UnknownUrgency(other.to_string())),
        }
    }

    /// Urgent signals saturate the urgency indicator
    pub fn is_urgent(self) -> bool {
        matches!(self, UrgencyLevel::High | UrgencyLevel::Critical)
    }

    /// Severity weight in `[0, 1]`
    pub fn weight(self) -> f64 {
        match self {
            UrgencyLevel::Low => 0.25,
            UrgencyLevel::Medium => 0.5,
            UrgencyLevel::High => 0.85,
            UrgencyLevel::Critical => 1.0,
        }
    }
}

impl std::fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrgencyLevel::Low => write!(f, "low"),
            UrgencyLevel::Medium => write!(f, "medium"),
            UrgencyLevel::High => write!(f, "high"),
            UrgencyLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Raw friction signal as produced by an external collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrictionSignal {
    #[serde(default)]
    pub frustration_signals: Vec<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub help_requests: u32,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub urgency_level: String,
    pub resistance_type: String,
    #[serde(default)]
    pub pattern_strength: f64,
    #[serde(default)]
    pub occurrence_count: u32,
}

impl FrictionSignal {
    pub fn new(resistance_type: impl Into<String>) -> Self {
        Self {
            resistance_type: resistance_type.into(),
            ..Default::default()
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_errors(mut self, error_count: u32) -> Self {
        self.error_count = error_count;
        self
    }

    pub fn with_help_requests(mut self, help_requests: u32) -> Self {
        self.help_requests = help_requests;
        self
    }

    pub fn with_urgency(mut self, urgency: impl Into<String>) -> Self {
        self.urgency_level = urgency.into();
        self
    }

    pub fn with_frustration(mut self, signals: Vec<String>) -> Self {
        self.frustration_signals = signals;
        self
    }

    pub fn with_pattern(mut self, pattern_strength: f64, occurrence_count: u32) -> Self {
        self.pattern_strength = pattern_strength;
        self.occurrence_count = occurrence_count;
        self
    }

    /// Validate into a [`Signal`]
    pub fn validate(self) -> Result<Signal, InputError> {
        InputError::require_non_empty("resistance_type", &self.resistance_type)?;
        let pattern_strength = InputError::require_unit("pattern_strength", self.pattern_strength)?;
        let urgency = UrgencyLevel::parse(&self.urgency_level)?;

        Ok(Signal {
            category: self.resistance_type.trim().to_ascii_lowercase(),
            frustration_count: self.frustration_signals.len() as u32,
            attempts: self.attempts,
            help_requests: self.help_requests,
            error_count: self.error_count,
            urgency,
            pattern_strength,
            occurrence_count: self.occurrence_count,
            observed_at: Utc::now(),
        })
    }
}

/// Validated friction signal with indicator counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Normalized resistance type
    pub category: String,
    pub frustration_count: u32,
    pub attempts: u32,
    pub help_requests: u32,
    pub error_count: u32,
    pub urgency: UrgencyLevel,
    pub pattern_strength: f64,
    pub occurrence_count: u32,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_parse() {
        assert_eq!(UrgencyLevel::parse("HIGH").unwrap(), UrgencyLevel::High);
        assert_eq!(UrgencyLevel::parse("").unwrap(), UrgencyLevel::Low);
        assert!(UrgencyLevel::parse("whenever").is_err());
        assert!(UrgencyLevel::Critical.is_urgent());
        assert!(!UrgencyLevel::Medium.is_urgent());
    }

    #[test]
    fn test_validate_signal() {
        let signal = FrictionSignal::new("  Error ")
            .with_attempts(5)
            .with_frustration(vec!["sigh".into(), "rage click".into()])
            .with_pattern(0.4, 3)
            .validate()
            .unwrap();
        assert_eq!(signal.category, "error");
        assert_eq!(signal.frustration_count, 2);
        assert_eq!(signal.urgency, UrgencyLevel::Low);
    }

    #[test]
    fn test_pattern_strength_out_of_range() {
        let err = FrictionSignal::new("error").with_pattern(1.4, 1).validate().unwrap_err();
        assert!(matches!(err, InputError::OutOfRange { field: "pattern_strength", .. }));
    }

    #[test]
    fn test_missing_resistance_type() {
        let err = FrictionSignal::new("").validate().unwrap_err();
        assert_eq!(err, InputError::MissingField { field: "resistance_type" });
    }
}
