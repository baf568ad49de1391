//! Agents participating in the resource mesh

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Raw agent description as produced by an external collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub processing_power: f64,
    pub specialization: String,
}

impl Agent {
    pub fn new(id: impl Into<String>, processing_power: f64, specialization: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            processing_power,
            specialization: specialization.into(),
        }
    }

    /// Validate into an [`AgentSpec`]
    pub fn validate(self) -> Result<AgentSpec, InputError> {
        InputError::require_non_empty("id", &self.id)?;
        let capacity = InputError::require_non_negative("processing_power", self.processing_power)?;
        let specialization = if self.specialization.trim().is_empty() {
            "generalist".to_string()
        } else {
            self.specialization
        };

        Ok(AgentSpec {
            id: self.id,
            capacity,
            specialization,
        })
    }
}

/// Validated agent: initial capacity and specialization tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: String,
    pub capacity: f64,
    pub specialization: String,
}
