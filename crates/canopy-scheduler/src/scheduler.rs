//! Request coherence scheduler
//!
//! Scores a batch of requests, reports entanglement, drops incoherent
//! requests and collapses the remainder to a single selection.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use canopy_common::{CollaborationRequest, EngineEvent, EventBus, Request, Result};
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::entanglement;
use crate::filter::CoherencePolicy;
use crate::scoring::{
    CoherenceStrategy, DeclaredCoherence, FixedTiming, ProbabilityCalculator, ScoringFactor,
    ScoringWeights, TimingStrategy,
};
use crate::SchedulerConfig;

/// A scored candidate for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPath {
    pub request_id: String,
    pub requester_id: String,
    pub probability: f64,
    pub coherence: f64,
    pub energy_yield: f64,
    pub entangled_with: BTreeSet<String>,
    pub resource_requirements: f64,
    pub submitted_at: DateTime<Utc>,
}

/// Side-channel statistics for one scheduling cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectionStats {
    pub paths_processed: usize,
    pub coherent_paths: usize,
    pub processing_time: Duration,
}

/// Result of a scheduling cycle. `selected` is `None` when no request is viable.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub selected: Option<ScoredPath>,
    /// Every scored request, in batch order
    pub scored: Vec<ScoredPath>,
    pub stats: SelectionStats,
}

impl Selection {
    pub fn is_viable(&self) -> bool {
        self.selected.is_some()
    }
}

/// Scheduler selecting one optimal request per batch
pub struct RequestCoherenceScheduler {
    config: SchedulerConfig,
    policy: CoherencePolicy,
    weights: RwLock<ScoringWeights>,
    timing: Arc<dyn TimingStrategy>,
    coherence: Arc<dyn CoherenceStrategy>,
    events: Option<EventBus>,
}

impl RequestCoherenceScheduler {
    /// Create a scheduler with fixed timing and declared coherence
    pub fn new(config: SchedulerConfig) -> Self {
        let timing = Arc::new(FixedTiming(config.default_timing_alignment));
        Self {
            policy: CoherencePolicy::new(config.coherence_threshold),
            config,
            weights: RwLock::new(ScoringWeights::default()),
            timing,
            coherence: Arc::new(DeclaredCoherence),
            events: None,
        }
    }

    /// Set the timing alignment strategy
    pub fn with_timing(mut self, timing: Arc<dyn TimingStrategy>) -> Self {
        self.timing = timing;
        self
    }

    /// Set the coherence strategy
    pub fn with_coherence(mut self, coherence: Arc<dyn CoherenceStrategy>) -> Self {
        self.coherence = coherence;
        self
    }

    /// Publish `quantum_processing_complete` on this bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn weights(&self) -> ScoringWeights {
        *self.weights.read()
    }

    /// Shift one scoring weight; returns the new weight
    pub fn reinforce(&self, factor: ScoringFactor, delta: f64) -> f64 {
        let weight = self
            .weights
            .write()
            .reinforce(factor, delta, self.config.max_factor_weight);
        info!(factor = ?factor, delta, weight, "Scoring weight reinforced");
        weight
    }

    /// Validate raw requests, then select. Any malformed request rejects the batch.
    pub fn select_raw(&self, requests: Vec<CollaborationRequest>) -> Result<Selection> {
        let batch = requests
            .into_iter()
            .map(CollaborationRequest::validate)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(self.select_optimal(&batch))
    }

    /// Score, filter and collapse a batch, then announce the result
    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    pub fn select_optimal(&self, batch: &[Request]) -> Selection {
        let selection = self.evaluate(batch);
        self.announce(&selection);
        selection
    }

    /// Score, filter and collapse a batch without publishing anything
    pub fn evaluate(&self, batch: &[Request]) -> Selection {
        let started = Instant::now();
        let weights = self.weights();
        let links = entanglement::detect(batch);

        let scored: Vec<ScoredPath> = batch
            .iter()
            .zip(links)
            .map(|(request, entangled_with)| self.score(request, &weights, entangled_with))
            .collect();

        let coherent: Vec<&ScoredPath> = scored
            .iter()
            .filter(|path| self.policy.is_coherent(path.coherence))
            .collect();

        let selected = Self::collapse(&coherent).cloned();

        let stats = SelectionStats {
            paths_processed: scored.len(),
            coherent_paths: coherent.len(),
            processing_time: started.elapsed(),
        };

        match &selected {
            Some(path) => debug!(
                request_id = %path.request_id,
                energy_yield = path.energy_yield,
                coherent = stats.coherent_paths,
                "Collapsed to optimal request"
            ),
            None => debug!(processed = stats.paths_processed, "No viable path"),
        }

        Selection {
            selected,
            scored,
            stats,
        }
    }

    /// Publish `quantum_processing_complete` for a finished selection
    pub fn announce(&self, selection: &Selection) {
        if let Some(events) = &self.events {
            let selected = selection.selected.as_ref();
            events.publish(EngineEvent::QuantumProcessingComplete {
                paths_processed: selection.stats.paths_processed,
                coherent_paths: selection.stats.coherent_paths,
                processing_time_us: selection.stats.processing_time.as_micros() as u64,
                selected_request: selected.map(|p| p.request_id.clone()),
                energy_yield: selected.map(|p| p.energy_yield),
            });
        }
    }

    fn score(
        &self,
        request: &Request,
        weights: &ScoringWeights,
        entangled_with: BTreeSet<String>,
    ) -> ScoredPath {
        let timing = self.timing.alignment(request);
        let probability =
            ProbabilityCalculator::calculate(request, timing, weights, self.config.resource_scale)
                .value();
        let coherence = canopy_common::UnitScore::new(self.coherence.coherence(request)).value();

        ScoredPath {
            request_id: request.id().to_string(),
            requester_id: request.requester_id().to_string(),
            probability,
            coherence,
            energy_yield: probability * coherence,
            entangled_with,
            resource_requirements: request.resource_requirements(),
            submitted_at: request.timestamp(),
        }
    }

    /// Greatest energy yield wins; ties go to the earliest submission, then the smaller id
    fn collapse<'a>(candidates: &[&'a ScoredPath]) -> Option<&'a ScoredPath> {
        candidates.iter().copied().min_by(|a, b| {
            let key = |p: &ScoredPath| (Reverse(OrderedFloat(p.energy_yield)), p.submitted_at);
            key(a)
                .cmp(&key(b))
                .then_with(|| a.request_id.cmp(&b.request_id))
        })
    }
}

impl Default for RequestCoherenceScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
