//! # Canopy Mesh
//!
//! Undirected compatibility graph over agents, with resource transfers along
//! shortest paths and periodic load rebalancing.
//!
//! ## Edges
//!
//! An edge joins two agents when `compatibility > 0.7` and
//! `network_distance <= max_depth` (6).
//!
//! ## Transfer Efficiency
//!
//! ```text
//! efficiency = max(floor, base - decay × (hops - 1))
//!            = max(0.1, 0.95 - 0.05 × (hops - 1))
//! ```
//!
//! ## Locking
//!
//! Each node is a single-writer resource behind its own mutex. A transfer
//! locks every node on its path in id order; disjoint transfers run in
//! parallel and there is no mesh-wide lock.

pub mod affinity;
pub mod graph;
pub mod network;
pub mod node;
pub mod rebalance;

pub use affinity::{AffinityModel, SpecializationAffinity, StaticAffinity};
pub use graph::{MeshGraph, MeshPath};
pub use network::{NetworkSummary, ResourceMeshNetwork, TransferOutcome, TransferReceipt};
pub use node::{MeshNode, NodeSnapshot};
pub use rebalance::{RebalanceReport, SupportSignal};

use serde::{Deserialize, Serialize};

/// Mesh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Compatibility an agent pair must exceed to be joined
    pub edge_compatibility_threshold: f64,
    /// Maximum network distance for an edge
    pub max_depth: u32,
    /// Efficiency of a single-hop transfer
    pub base_efficiency: f64,
    /// Efficiency lost per additional hop
    pub decay_rate: f64,
    /// Lower bound on efficiency
    pub floor_efficiency: f64,
    /// Seconds between rebalance ticks
    pub rebalance_interval_secs: u64,
    /// Fraction of average capacity below which a node requests support
    pub low_water_ratio: f64,
    /// Fraction of average capacity above which a node offers support
    pub high_water_ratio: f64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            edge_compatibility_threshold: canopy_common::EDGE_COMPATIBILITY_THRESHOLD,
            max_depth: canopy_common::MAX_NETWORK_DEPTH,
            base_efficiency: 0.95,
            decay_rate: 0.05,
            floor_efficiency: 0.1,
            rebalance_interval_secs: 30,
            low_water_ratio: 0.8,
            high_water_ratio: 1.2,
        }
    }
}

impl MeshConfig {
    /// Transfer efficiency for a path of `hops` edges
    ///
    /// Non-increasing in `hops` and never below `floor_efficiency`.
    pub fn efficiency(&self, hops: usize) -> f64 {
        let extra_hops = hops.saturating_sub(1) as f64;
        (self.base_efficiency - self.decay_rate * extra_hops).max(self.floor_efficiency)
    }
}
