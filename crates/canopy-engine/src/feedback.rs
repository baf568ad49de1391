//! Feedback between the mesh, the adaptive pipeline and the scheduler
//!
//! Unroutable transfers and rebalance imbalance are turned into friction
//! signals. Every adaptation the pipeline plants shifts one scheduler
//! weight by `expected_impact × weight_step`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use canopy_adaptive::{AdaptationType, AdaptiveSignalPipeline, SignalOutcome};
use canopy_common::{FrictionSignal, Result};
use canopy_mesh::RebalanceReport;
use canopy_scheduler::{RequestCoherenceScheduler, ScoringFactor};
use tracing::{debug, info};

use crate::config::FeedbackSettings;
use crate::metrics::EngineMetrics;

/// Resistance type of signals raised by unroutable transfers
pub const PARTITION_SIGNAL: &str = "network_partition";

/// Resistance type of signals raised by rebalance imbalance
pub const IMBALANCE_SIGNAL: &str = "resource_imbalance";

/// Unroutable transfers that saturate pattern strength
const PARTITION_PATTERN_SATURATION: u32 = 5;

/// Scheduler weight each adaptation type reinforces
pub fn reinforced_factor(kind: AdaptationType) -> ScoringFactor {
    match kind {
        AdaptationType::ErrorPrevention => ScoringFactor::Trust,
        AdaptationType::GuidanceEnhancement | AdaptationType::InterfaceSimplification => {
            ScoringFactor::Compatibility
        }
        AdaptationType::WorkflowOptimization => ScoringFactor::Timing,
        AdaptationType::PerformanceOptimization | AdaptationType::ResourceRebalancing => {
            ScoringFactor::ResourceHeadroom
        }
    }
}

/// Cheap to clone; clones share the partition counter
#[derive(Clone)]
pub struct FeedbackLoop {
    scheduler: Arc<RequestCoherenceScheduler>,
    pipeline: Arc<AdaptiveSignalPipeline>,
    metrics: Arc<EngineMetrics>,
    settings: FeedbackSettings,
    partition_failures: Arc<AtomicU32>,
}

impl FeedbackLoop {
    pub fn new(
        scheduler: Arc<RequestCoherenceScheduler>,
        pipeline: Arc<AdaptiveSignalPipeline>,
        metrics: Arc<EngineMetrics>,
        settings: FeedbackSettings,
    ) -> Self {
        Self {
            scheduler,
            pipeline,
            metrics,
            settings,
            partition_failures: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn scheduler(&self) -> &RequestCoherenceScheduler {
        &self.scheduler
    }

    pub fn pipeline(&self) -> &AdaptiveSignalPipeline {
        &self.pipeline
    }

    /// Unroutable transfers seen so far
    pub fn partition_failures(&self) -> u32 {
        self.partition_failures.load(Ordering::Relaxed)
    }

    /// Process a signal, record it and apply planted adaptations to the scheduler
    pub fn absorb(&self, signal: FrictionSignal) -> Result<SignalOutcome> {
        let outcome = self.pipeline.process_signal(signal)?;

        self.metrics.signals_processed.inc();
        if outcome.triggered {
            self.metrics.signals_triggered.inc();
        }
        if outcome.stored_seed.is_some() {
            self.metrics.seeds_stored.inc();
        }
        self.metrics.adaptations_planted.inc_by(outcome.planted.len() as u64);
        self.metrics.adaptations_rejected.inc_by(outcome.rejected.len() as u64);

        if self.settings.reinforce_weights {
            for adaptation in &outcome.planted {
                let factor = reinforced_factor(adaptation.adaptation_type);
                let delta = adaptation.expected_impact * self.settings.weight_step;
                let weight = self.scheduler.reinforce(factor, delta);
                debug!(adaptation_id = %adaptation.id, factor = ?factor, weight, "Adaptation applied to scoring");
            }
        }
        Ok(outcome)
    }

    /// Raise the signal for an unroutable transfer
    ///
    /// Pressure grows with the number of unroutable transfers seen so far:
    /// repeated failures turn urgent and eventually cross the fire threshold.
    pub fn partition(&self, from: &str, to: &str) -> Result<SignalOutcome> {
        let failures = self.partition_failures.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        let urgency = if failures >= 3 { "high" } else { "medium" };
        let pattern = (failures as f64 / PARTITION_PATTERN_SATURATION as f64).min(1.0);

        info!(from, to, failures, "Transfer unroutable, raising partition signal");
        self.absorb(
            FrictionSignal::new(PARTITION_SIGNAL)
                .with_attempts(failures)
                .with_errors(failures)
                .with_urgency(urgency)
                .with_pattern(pattern, failures),
        )
    }

    /// Raise a signal when a rebalance pass finds too many nodes outside the band
    pub fn imbalance(&self, report: &RebalanceReport) -> Result<Option<SignalOutcome>> {
        let ratio = report.imbalance_ratio();
        if report.is_balanced() || ratio < self.settings.imbalance_signal_threshold {
            return Ok(None);
        }

        let requesting = u32::try_from(report.requesting.len()).unwrap_or(u32::MAX);
        let urgency = if ratio >= 0.75 { "high" } else { "medium" };

        info!(ratio, requesting, "Mesh imbalance, raising signal");
        self.absorb(
            FrictionSignal::new(IMBALANCE_SIGNAL)
                .with_attempts(requesting)
                .with_help_requests(requesting)
                .with_urgency(urgency)
                .with_pattern(ratio, requesting),
        )
        .map(Some)
    }
}
