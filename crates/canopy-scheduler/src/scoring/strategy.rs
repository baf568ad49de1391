//! Pluggable sources for timing alignment and coherence
//!
//! Neither value has a canonical derivation, so both are strategies. A value
//! supplied on the request itself always wins over the strategy.

use canopy_common::{Request, UnitScore};
use chrono::Timelike;

/// Derives a `[0, 1]` timing alignment for a request
pub trait TimingStrategy: Send + Sync {
    fn alignment(&self, request: &Request) -> f64;
}

/// Derives a `[0, 1]` coherence for a request
pub trait CoherenceStrategy: Send + Sync {
    fn coherence(&self, request: &Request) -> f64;
}

/// Same alignment for every request
#[derive(Debug, Clone, Copy)]
pub struct FixedTiming(pub f64);

impl TimingStrategy for FixedTiming {
    fn alignment(&self, request: &Request) -> f64 {
        request
            .timing_alignment()
            .unwrap_or_else(|| UnitScore::new(self.0).value())
    }
}

/// Alignment from the UTC hour the request was submitted
///
/// Core hours 09-17 score 1.0, shoulders 06-09 and 17-21 score 0.7,
/// night scores 0.4.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusinessHoursTiming;

impl TimingStrategy for BusinessHoursTiming {
    fn alignment(&self, request: &Request) -> f64 {
        if let Some(alignment) = request.timing_alignment() {
            return alignment;
        }
        match request.timestamp().hour() {
            9..=16 => 1.0,
            6..=8 | 17..=20 => 0.7,
            _ => 0.4,
        }
    }
}

/// Coherence declared by the producer, falling back to `sqrt(trust × compatibility)`
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredCoherence;

impl CoherenceStrategy for DeclaredCoherence {
    fn coherence(&self, request: &Request) -> f64 {
        request
            .coherence()
            .unwrap_or_else(|| UnitScore::new((request.trust_level() * request.compatibility()).sqrt()).value())
    }
}
