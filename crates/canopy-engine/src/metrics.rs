//! Prometheus metrics for the engine

use canopy_common::{CanopyError, Result};
use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, Registry};

/// Engine counters, gauges and histograms
///
/// Created unregistered; call [`EngineMetrics::register`] to expose them.
#[derive(Clone)]
pub struct EngineMetrics {
    pub batches_scored: IntCounter,
    pub requests_scored: IntCounter,
    pub no_viable_path: IntCounter,
    pub scoring_duration_seconds: Histogram,
    pub transfers_completed: IntCounter,
    pub transfers_no_path: IntCounter,
    pub transfer_efficiency: Histogram,
    pub mesh_density: Gauge,
    pub signals_processed: IntCounter,
    pub signals_triggered: IntCounter,
    pub seeds_stored: IntCounter,
    pub adaptations_planted: IntCounter,
    pub adaptations_rejected: IntCounter,
    pub adaptations_flagged: IntCounter,
}

impl EngineMetrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            batches_scored: counter("canopy_scheduler_batches_total", "Request batches scored")?,
            requests_scored: counter("canopy_scheduler_requests_total", "Requests scored")?,
            no_viable_path: counter(
                "canopy_scheduler_no_viable_path_total",
                "Batches with no request above the coherence threshold",
            )?,
            scoring_duration_seconds: histogram(
                HistogramOpts::new(
                    "canopy_scheduler_scoring_duration_seconds",
                    "Time to score, filter and collapse one batch",
                )
                .buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            )?,
            transfers_completed: counter("canopy_mesh_transfers_total", "Completed mesh transfers")?,
            transfers_no_path: counter(
                "canopy_mesh_transfer_no_path_total",
                "Transfers with no route between nodes",
            )?,
            transfer_efficiency: histogram(
                HistogramOpts::new("canopy_mesh_transfer_efficiency", "Efficiency of completed transfers")
                    .buckets(vec![0.1, 0.25, 0.5, 0.7, 0.8, 0.85, 0.9, 0.95]),
            )?,
            mesh_density: Gauge::new("canopy_mesh_connection_density", "Current mesh edge density")
                .map_err(metrics_error)?,
            signals_processed: counter("canopy_adaptive_signals_total", "Friction signals processed")?,
            signals_triggered: counter(
                "canopy_adaptive_signals_triggered_total",
                "Signals at or above the fire threshold",
            )?,
            seeds_stored: counter("canopy_adaptive_seeds_stored_total", "Seeds banked")?,
            adaptations_planted: counter(
                "canopy_adaptive_planted_total",
                "Adaptations that cleared the viability gate",
            )?,
            adaptations_rejected: counter(
                "canopy_adaptive_rejected_total",
                "Candidates rejected by the viability gate",
            )?,
            adaptations_flagged: counter(
                "canopy_adaptive_flagged_total",
                "Health checks that flagged an adaptation for review",
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(self.batches_scored.clone()),
            Box::new(self.requests_scored.clone()),
            Box::new(self.no_viable_path.clone()),
            Box::new(self.scoring_duration_seconds.clone()),
            Box::new(self.transfers_completed.clone()),
            Box::new(self.transfers_no_path.clone()),
            Box::new(self.transfer_efficiency.clone()),
            Box::new(self.mesh_density.clone()),
            Box::new(self.signals_processed.clone()),
            Box::new(self.signals_triggered.clone()),
            Box::new(self.seeds_stored.clone()),
            Box::new(self.adaptations_planted.clone()),
            Box::new(self.adaptations_rejected.clone()),
            Box::new(self.adaptations_flagged.clone()),
        ];
        for collector in collectors {
            registry.register(collector).map_err(metrics_error)?;
        }
        Ok(())
    }
}

fn counter(name: &str, help: &str) -> Result<IntCounter> {
    IntCounter::new(name, help).map_err(metrics_error)
}

fn histogram(opts: HistogramOpts) -> Result<Histogram> {
    Histogram::with_opts(opts).map_err(metrics_error)
}

fn metrics_error(err: prometheus::Error) -> CanopyError {
    CanopyError::Metrics(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_exposes_metrics() {
        let metrics = EngineMetrics::new().unwrap();
        let registry = Registry::new();
        metrics.register(&registry).unwrap();

        metrics.transfers_completed.inc();
        metrics.mesh_density.set(0.5);

        let families = registry.gather();
        assert_eq!(families.len(), 14);
        assert!(families
            .iter()
            .any(|f| f.get_name() == "canopy_mesh_transfers_total"));
    }

    #[test]
    fn test_double_registration_fails() {
        let metrics = EngineMetrics::new().unwrap();
        let registry = Registry::new();
        metrics.register(&registry).unwrap();
        let err = metrics.register(&registry).unwrap_err();
        assert!(matches!(err, CanopyError::Metrics(_)));
    }
}
