//! Periodic load rebalancing
//!
//! A rebalance pass compares each node with the mesh-wide average capacity
//! and raises support signals for nodes outside the
//! `[low_water_ratio, high_water_ratio]` band. It holds every node lock while
//! reading, so the snapshot never observes a half-applied transfer.

use std::sync::{Arc, Weak};
use std::time::Duration;

use canopy_common::{EngineEvent, Result, ScheduledTask};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::network::ResourceMeshNetwork;

/// A node outside the rebalance band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportSignal {
    pub node_id: String,
    pub capacity: f64,
    pub average_capacity: f64,
}

/// Result of one rebalance pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceReport {
    pub node_count: usize,
    pub average_capacity: f64,
    /// Nodes below the low-water mark
    pub requesting: Vec<SupportSignal>,
    /// Nodes above the high-water mark
    pub offering: Vec<SupportSignal>,
}

impl RebalanceReport {
    /// Fraction of nodes outside the band; 0 for an empty mesh
    pub fn imbalance_ratio(&self) -> f64 {
        if self.node_count == 0 {
            return 0.0;
        }
        (self.requesting.len() + self.offering.len()) as f64 / self.node_count as f64
    }

    pub fn is_balanced(&self) -> bool {
        self.requesting.is_empty() && self.offering.is_empty()
    }
}

impl ResourceMeshNetwork {
    /// Run one rebalance pass and publish its support signals
    #[instrument(skip(self))]
    pub fn rebalance(&self) -> RebalanceReport {
        let nodes = self.sorted_nodes();

        // id order, same as transfers
        let ledgers: Vec<_> = nodes.iter().map(|node| node.lock()).collect();
        let live: Vec<(&str, f64)> = nodes
            .iter()
            .zip(ledgers.iter())
            .filter(|(_, ledger)| !ledger.retired)
            .map(|(node, ledger)| (node.id(), ledger.capacity))
            .collect();

        let node_count = live.len();
        let average_capacity = if node_count == 0 {
            0.0
        } else {
            live.iter().map(|(_, capacity)| capacity).sum::<f64>() / node_count as f64
        };

        let low = average_capacity * self.config().low_water_ratio;
        let high = average_capacity * self.config().high_water_ratio;
        let signal = |id: &str, capacity: f64| SupportSignal {
            node_id: id.to_string(),
            capacity,
            average_capacity,
        };

        let requesting: Vec<SupportSignal> = live
            .iter()
            .filter(|(_, capacity)| *capacity < low)
            .map(|(id, capacity)| signal(id, *capacity))
            .collect();
        let offering: Vec<SupportSignal> = live
            .iter()
            .filter(|(_, capacity)| *capacity > high)
            .map(|(id, capacity)| signal(id, *capacity))
            .collect();

        drop(ledgers);

        for s in &requesting {
            self.publish(EngineEvent::SupportRequested {
                node_id: s.node_id.clone(),
                capacity: s.capacity,
                average_capacity,
            });
        }
        for s in &offering {
            self.publish(EngineEvent::SupportAvailable {
                node_id: s.node_id.clone(),
                capacity: s.capacity,
                average_capacity,
            });
        }

        let report = RebalanceReport {
            node_count,
            average_capacity,
            requesting,
            offering,
        };
        debug!(
            nodes = node_count,
            average_capacity,
            requesting = report.requesting.len(),
            offering = report.offering.len(),
            "Rebalance pass"
        );
        report
    }

    /// Rebalance every `rebalance_interval_secs` until the task is cancelled
    ///
    /// The task holds only a weak reference; it stops doing work once the
    /// mesh is dropped. `on_report` sees every report.
    pub fn start_rebalancer<F>(self: &Arc<Self>, on_report: F) -> Result<ScheduledTask>
    where
        F: Fn(RebalanceReport) + Send + Sync + 'static,
    {
        let period = Duration::from_secs(self.config().rebalance_interval_secs);
        let mesh: Weak<Self> = Arc::downgrade(self);
        let on_report = Arc::new(on_report);

        let task = ScheduledTask::every("mesh-rebalance", period, move || {
            let mesh = mesh.clone();
            let on_report = Arc::clone(&on_report);
            async move {
                if let Some(mesh) = mesh.upgrade() {
                    on_report(mesh.rebalance());
                }
            }
        })?;

        info!(period_secs = period.as_secs(), task_id = %task.id(), "Rebalancer started");
        Ok(task)
    }
}
