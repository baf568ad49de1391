//! # Canopy Engine
//!
//! One instance owns a request scheduler, a resource mesh, an adaptive
//! signal pipeline, an event bus and its metrics.
//!
//! ## Control Flow
//!
//! 1. A request batch is scored and collapsed to one selection.
//! 2. The provider transfers the selected request's resources to its
//!    requester across the mesh.
//! 3. Unroutable transfers and mesh imbalance become friction signals.
//! 4. Planted adaptations shift the scheduler's scoring weights.

pub mod config;
pub mod feedback;
pub mod metrics;

pub use config::{EngineConfig, FeedbackSettings};
pub use feedback::FeedbackLoop;
pub use metrics::EngineMetrics;

use std::sync::Arc;

use canopy_adaptive::{
    Adaptation, AdaptiveSignalPipeline, HealthProbe, MonitorOutcome, SignalOutcome,
};
use canopy_common::{
    Agent, CollaborationRequest, EngineEvent, EventBus, FrictionSignal, InputError, Request, Result,
    ScheduledTask,
};
use canopy_mesh::{AffinityModel, NetworkSummary, ResourceMeshNetwork, TransferOutcome};
use canopy_scheduler::{
    CoherenceStrategy, RequestCoherenceScheduler, Selection, SelectionStats, TimingStrategy,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Result of one coordination cycle
#[derive(Debug, Clone, Serialize)]
pub struct CoordinationOutcome {
    pub selection: Selection,
    pub stats: SelectionStats,
    /// `None` when nothing was selected or the requester is the provider
    pub transfer: Option<TransferOutcome>,
    /// Signal raised by an unroutable transfer
    pub friction: Option<SignalOutcome>,
}

/// Builder for [`CanopyEngine`] with pluggable strategies
pub struct EngineBuilder {
    config: EngineConfig,
    affinity: Option<Arc<dyn AffinityModel>>,
    probe: Option<Arc<dyn HealthProbe>>,
    timing: Option<Arc<dyn TimingStrategy>>,
    coherence: Option<Arc<dyn CoherenceStrategy>>,
}

impl EngineBuilder {
    pub fn with_affinity(mut self, affinity: Arc<dyn AffinityModel>) -> Self {
        self.affinity = Some(affinity);
        self
    }

    pub fn with_health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_timing(mut self, timing: Arc<dyn TimingStrategy>) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn with_coherence(mut self, coherence: Arc<dyn CoherenceStrategy>) -> Self {
        self.coherence = Some(coherence);
        self
    }

    pub fn build(self) -> Result<CanopyEngine> {
        self.config.validate()?;
        let events = EventBus::new(self.config.event_channel_capacity);
        let metrics = Arc::new(EngineMetrics::new()?);

        let mut scheduler =
            RequestCoherenceScheduler::new(self.config.scheduler.clone()).with_events(events.clone());
        if let Some(timing) = self.timing {
            scheduler = scheduler.with_timing(timing);
        }
        if let Some(coherence) = self.coherence {
            scheduler = scheduler.with_coherence(coherence);
        }

        let mut mesh = ResourceMeshNetwork::new(self.config.mesh.clone()).with_events(events.clone());
        if let Some(affinity) = self.affinity {
            mesh = mesh.with_affinity(affinity);
        }

        let flagged = metrics.adaptations_flagged.clone();
        let mut pipeline = AdaptiveSignalPipeline::new(self.config.adaptive.clone())
            .with_events(events.clone())
            .with_monitor_listener(Arc::new(move |_id: Uuid, outcome: &MonitorOutcome| {
                if outcome.is_flagged() {
                    flagged.inc();
                }
            }));
        if let Some(probe) = self.probe {
            pipeline = pipeline.with_probe(probe);
        }

        let feedback = FeedbackLoop::new(
            Arc::new(scheduler),
            Arc::new(pipeline),
            Arc::clone(&metrics),
            self.config.feedback.clone(),
        );

        info!(version = canopy_common::VERSION, "Canopy engine ready");
        Ok(CanopyEngine {
            config: self.config,
            events,
            mesh: Arc::new(mesh),
            feedback,
            metrics,
            rebalancer: Mutex::new(None),
        })
    }
}

/// Coordination engine
pub struct CanopyEngine {
    config: EngineConfig,
    events: EventBus,
    mesh: Arc<ResourceMeshNetwork>,
    feedback: FeedbackLoop,
    metrics: Arc<EngineMetrics>,
    rebalancer: Mutex<Option<ScheduledTask>>,
}

impl CanopyEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            affinity: None,
            probe: None,
            timing: None,
            coherence: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &RequestCoherenceScheduler {
        self.feedback.scheduler()
    }

    pub fn mesh(&self) -> &ResourceMeshNetwork {
        &self.mesh
    }

    pub fn pipeline(&self) -> &AdaptiveSignalPipeline {
        self.feedback.pipeline()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Build the mesh from `agents`, replacing any previous one
    pub fn establish_network(&self, agents: Vec<Agent>) -> Result<NetworkSummary> {
        let summary = self.mesh.establish_network(agents)?;
        self.metrics.mesh_density.set(summary.connection_density);
        Ok(summary)
    }

    /// Select one request and move its resources from `provider_id` to its requester
    ///
    /// Inputs and mesh membership are checked before anything is recorded or published.
    #[instrument(skip(self, requests), fields(batch_size = requests.len()))]
    pub fn coordinate(
        &self,
        requests: Vec<CollaborationRequest>,
        provider_id: &str,
        resource_type: &str,
    ) -> Result<CoordinationOutcome> {
        if !self.mesh.contains(provider_id) {
            return Err(InputError::UnknownAgent(provider_id.to_string()).into());
        }
        let batch = validate_batch(requests)?;
        let selection = self.feedback.scheduler().evaluate(&batch);
        if let Some(path) = &selection.selected {
            if !self.mesh.contains(&path.requester_id) {
                return Err(InputError::UnknownAgent(path.requester_id.clone()).into());
            }
        }
        self.record_selection(&selection, batch.len());
        let stats = selection.stats.clone();

        let (transfer, friction) = match &selection.selected {
            Some(path) if path.requester_id != provider_id => {
                let (outcome, friction) = self.route(
                    provider_id,
                    &path.requester_id,
                    resource_type,
                    path.resource_requirements,
                )?;
                (Some(outcome), friction)
            }
            Some(_) => {
                debug!(provider_id, "Selected requester is the provider, nothing to transfer");
                (None, None)
            }
            None => (None, None),
        };

        Ok(CoordinationOutcome {
            selection,
            stats,
            transfer,
            friction,
        })
    }

    /// Score and collapse a batch without touching the mesh
    pub fn select(&self, requests: Vec<CollaborationRequest>) -> Result<Selection> {
        let batch = validate_batch(requests)?;
        let selection = self.feedback.scheduler().evaluate(&batch);
        self.record_selection(&selection, batch.len());
        Ok(selection)
    }

    fn record_selection(&self, selection: &Selection, count: usize) {
        self.feedback.scheduler().announce(selection);
        self.metrics.batches_scored.inc();
        self.metrics.requests_scored.inc_by(count as u64);
        self.metrics
            .scoring_duration_seconds
            .observe(selection.stats.processing_time.as_secs_f64());
        if !selection.is_viable() {
            self.metrics.no_viable_path.inc();
        }
    }

    /// Transfer along the mesh; an unroutable transfer raises a friction signal
    pub fn transfer(
        &self,
        from: &str,
        to: &str,
        resource_type: &str,
        amount: f64,
    ) -> Result<TransferOutcome> {
        self.route(from, to, resource_type, amount)
            .map(|(outcome, _)| outcome)
    }

    fn route(
        &self,
        from: &str,
        to: &str,
        resource_type: &str,
        amount: f64,
    ) -> Result<(TransferOutcome, Option<SignalOutcome>)> {
        let outcome = self.mesh.transfer(from, to, resource_type, amount)?;
        let friction = match &outcome {
            TransferOutcome::Completed(receipt) => {
                self.metrics.transfers_completed.inc();
                self.metrics.transfer_efficiency.observe(receipt.efficiency);
                None
            }
            TransferOutcome::NoPath => {
                self.metrics.transfers_no_path.inc();
                Some(self.feedback.partition(from, to)?)
            }
        };
        Ok((outcome, friction))
    }

    /// Feed a friction signal to the adaptive pipeline
    pub fn process_signal(&self, signal: FrictionSignal) -> Result<SignalOutcome> {
        self.feedback.absorb(signal)
    }

    /// Run a health check now
    pub async fn monitor(&self, adaptation_id: Uuid) -> MonitorOutcome {
        self.feedback.pipeline().monitor(adaptation_id).await
    }

    pub fn cancel_monitor(&self, adaptation_id: &Uuid) -> bool {
        self.feedback.pipeline().cancel_monitor(adaptation_id)
    }

    pub fn retire_adaptation(&self, adaptation_id: &Uuid) -> Option<Adaptation> {
        self.feedback.pipeline().retire_adaptation(adaptation_id)
    }

    /// Unroutable transfers seen since startup
    pub fn partition_failures(&self) -> u32 {
        self.feedback.partition_failures()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn event_stream(&self) -> BroadcastStream<EngineEvent> {
        self.events.stream()
    }

    /// Start periodic rebalancing; replaces a running rebalancer
    pub fn start_rebalancer(&self) -> Result<()> {
        let feedback = self.feedback.clone();
        let task = self.mesh.start_rebalancer(move |report| {
            if let Err(e) = feedback.imbalance(&report) {
                warn!(error = %e, "Imbalance signal rejected");
            }
        })?;

        if let Some(previous) = self.rebalancer.lock().replace(task) {
            previous.cancel();
        }
        Ok(())
    }

    /// Cancel the rebalancer and every pending health check
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        if let Some(task) = self.rebalancer.lock().take() {
            task.cancel();
        }
        let monitors = self.feedback.pipeline().shutdown();
        info!(cancelled_monitors = monitors, "Canopy engine stopped");
    }
}

/// Any malformed request rejects the whole batch
fn validate_batch(requests: Vec<CollaborationRequest>) -> Result<Vec<Request>> {
    let batch = requests
        .into_iter()
        .map(CollaborationRequest::validate)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(batch)
}

impl Drop for CanopyEngine {
    fn drop(&mut self) {
        if let Some(task) = self.rebalancer.get_mut().take() {
            task.cancel();
        }
    }
}
