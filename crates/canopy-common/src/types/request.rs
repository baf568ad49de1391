//! Collaboration requests competing for scheduler selection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Raw collaboration request as produced by an external collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationRequest {
    pub id: String,
    pub requester_id: String,
    pub trust_level: f64,
    pub ai_compatibility: f64,
    pub resource_requirements: f64,
    #[serde(rename = "type")]
    pub request_type: String,
    pub domain: String,
    /// Correlation signature; defaults to the requester id
    #[serde(default)]
    pub signature: Option<String>,
    /// Caller-supplied quality metric
    #[serde(default)]
    pub coherence: Option<f64>,
    /// Caller-supplied timing alignment
    #[serde(default)]
    pub timing_alignment: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CollaborationRequest {
    pub fn new(
        id: impl Into<String>,
        requester_id: impl Into<String>,
        trust_level: f64,
        ai_compatibility: f64,
        resource_requirements: f64,
    ) -> Self {
        Self {
            id: id.into(),
            requester_id: requester_id.into(),
            trust_level,
            ai_compatibility,
            resource_requirements,
            request_type: "collaboration".to_string(),
            domain: "general".to_string(),
            signature: None,
            coherence: None,
            timing_alignment: None,
            timestamp: None,
        }
    }

    pub fn with_kind(mut self, request_type: impl Into<String>, domain: impl Into<String>) -> Self {
        self.request_type = request_type.into();
        self.domain = domain.into();
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_coherence(mut self, coherence: f64) -> Self {
        self.coherence = Some(coherence);
        self
    }

    pub fn with_timing_alignment(mut self, alignment: f64) -> Self {
        self.timing_alignment = Some(alignment);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Validate and freeze into a [`Request`]
    pub fn validate(self) -> Result<Request, InputError> {
        InputError::require_non_empty("id", &self.id)?;
        InputError::require_non_empty("requester_id", &self.requester_id)?;
        InputError::require_non_empty("type", &self.request_type)?;
        InputError::require_non_empty("domain", &self.domain)?;

        let trust_level = InputError::require_unit("trust_level", self.trust_level)?;
        let compatibility = InputError::require_unit("ai_compatibility", self.ai_compatibility)?;
        let resource_requirements =
            InputError::require_non_negative("resource_requirements", self.resource_requirements)?;
        let coherence = self
            .coherence
            .map(|c| InputError::require_unit("coherence", c))
            .transpose()?;
        let timing_alignment = self
            .timing_alignment
            .map(|t| InputError::require_unit("timing_alignment", t))
            .transpose()?;

        let signature = match self.signature {
            Some(sig) if !sig.trim().is_empty() => sig,
            _ => self.requester_id.clone(),
        };

        Ok(Request {
            id: self.id,
            requester_id: self.requester_id,
            trust_level,
            compatibility,
            resource_requirements,
            request_type: self.request_type,
            domain: self.domain,
            signature,
            coherence,
            timing_alignment,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

/// Validated, immutable collaboration request
///
/// Fields are private so a `Request` can only come out of
/// [`CollaborationRequest::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    id: String,
    requester_id: String,
    trust_level: f64,
    compatibility: f64,
    resource_requirements: f64,
    request_type: String,
    domain: String,
    signature: String,
    coherence: Option<f64>,
    timing_alignment: Option<f64>,
    timestamp: DateTime<Utc>,
}

impl Request {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    pub fn trust_level(&self) -> f64 {
        self.trust_level
    }

    pub fn compatibility(&self) -> f64 {
        self.compatibility
    }

    pub fn resource_requirements(&self) -> f64 {
        self.resource_requirements
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn coherence(&self) -> Option<f64> {
        self.coherence
    }

    pub fn timing_alignment(&self) -> Option<f64> {
        self.timing_alignment
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Number of correlated attributes shared with another request
    pub fn shared_attributes(&self, other: &Request) -> usize {
        [
            self.request_type == other.request_type,
            self.domain == other.domain,
            self.signature == other.signature,
        ]
        .iter()
        .filter(|shared| **shared)
        .count()
    }
}
