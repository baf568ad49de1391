//! Error types for the Canopy engine
//!
//! Only malformed input is a hard failure. Missing paths, rejected
//! adaptations and monitoring failures are ordinary domain outcomes and are
//! modelled as values by the crates that produce them.

use thiserror::Error;

/// Result type alias using CanopyError
pub type Result<T> = std::result::Result<T, CanopyError>;

/// Unified error type for Canopy operations
#[derive(Debug, Error)]
pub enum CanopyError {
    // Ingestion errors
    #[error("Malformed input: {0}")]
    MalformedInput(#[from] InputError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Metrics registry errors
    #[error("Metrics error: {0}")]
    Metrics(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CanopyError {
    /// Whether the error was caused by caller-supplied data
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, CanopyError::MalformedInput(_))
    }
}

/// Input validation errors, surfaced to the caller on ingestion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Field {field} is not a finite number")]
    NotFinite { field: &'static str },

    #[error("Field {field} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Field {field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("Duplicate identifier: {0}")]
    DuplicateId(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Transfer source and destination are both {0}")]
    SelfTransfer(String),

    #[error("Unknown urgency level: {0}")]
    UnknownUrgency(String),
}

impl InputError {
    /// Require a non-empty string field
    pub fn require_non_empty(field: &'static str, value: &str) -> std::result::Result<(), Self> {
        if value.trim().is_empty() {
            return Err(InputError::MissingField { field });
        }
        Ok(())
    }

    /// Require a finite value inside `[0, 1]`
    pub fn require_unit(field: &'static str, value: f64) -> std::result::Result<f64, Self> {
        if !value.is_finite() {
            return Err(InputError::NotFinite { field });
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(InputError::OutOfRange {
                field,
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(value)
    }

    /// Require a finite, non-negative value
    pub fn require_non_negative(field: &'static str, value: f64) -> std::result::Result<f64, Self> {
        if !value.is_finite() {
            return Err(InputError::NotFinite { field });
        }
        if value < 0.0 {
            return Err(InputError::Negative { field, value });
        }
        Ok(value)
    }
}

// Implement From for common external error types
impl From<serde_json::Error> for CanopyError {
    fn from(err: serde_json::Error) -> Self {
        CanopyError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for CanopyError {
    fn from(err: anyhow::Error) -> Self {
        CanopyError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CanopyError::MalformedInput(InputError::UnknownAgent("agent-7".to_string()));
        assert!(err.to_string().contains("agent-7"));
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_require_unit() {
        assert_eq!(InputError::require_unit("trust_level", 0.4), Ok(0.4));
        assert!(matches!(
            InputError::require_unit("trust_level", 1.2),
            Err(InputError::OutOfRange { field: "trust_level", .. })
        ));
        assert_eq!(
            InputError::require_unit("trust_level", f64::NAN),
            Err(InputError::NotFinite { field: "trust_level" })
        );
    }

    #[test]
    fn test_require_non_negative() {
        assert_eq!(InputError::require_non_negative("amount", 0.0), Ok(0.0));
        assert!(InputError::require_non_negative("amount", -1.0).is_err());
        assert!(InputError::require_non_negative("amount", f64::INFINITY).is_err());
    }
}
