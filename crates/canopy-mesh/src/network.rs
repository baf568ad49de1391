//! Resource mesh: edge construction, path search and hop-decayed transfers

use std::collections::HashSet;
use std::sync::Arc;

use canopy_common::{Agent, AgentSpec, EngineEvent, EventBus, InputError, Result};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::affinity::{AffinityModel, SpecializationAffinity};
use crate::graph::{MeshGraph, MeshPath};
use crate::node::{MeshNode, NodeSnapshot};
use crate::MeshConfig;

/// Attempts before a transfer racing topology changes gives up
const MAX_TRANSFER_ATTEMPTS: usize = 3;

/// Shape of the mesh after it was (re)built
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSummary {
    pub node_count: usize,
    /// Nodes with at least one edge
    pub agents_connected: usize,
    pub edges: usize,
    pub connection_density: f64,
}

/// A completed transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReceipt {
    pub from: String,
    pub to: String,
    pub resource_type: String,
    pub path: Vec<String>,
    pub hops: usize,
    pub efficiency: f64,
    /// Amount the caller asked for
    pub requested: f64,
    /// Amount debited from the source, capped by its capacity
    pub drawn: f64,
    /// Amount credited to the destination
    pub actual_amount: f64,
}

/// Result of a transfer request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferOutcome {
    Completed(TransferReceipt),
    /// Source and destination are in different components
    NoPath,
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed(_))
    }

    pub fn receipt(&self) -> Option<&TransferReceipt> {
        match self {
            TransferOutcome::Completed(receipt) => Some(receipt),
            TransferOutcome::NoPath => None,
        }
    }

    /// Amount that reached the destination; zero when no path exists
    pub fn actual_amount(&self) -> f64 {
        self.receipt().map(|r| r.actual_amount).unwrap_or(0.0)
    }
}

/// Undirected compatibility mesh over agents
///
/// Node capacities sit behind per-node locks. The adjacency graph sits
/// behind its own read-write lock which is never held while waiting on a
/// node lock, except for the short path revalidation a transfer does while
/// it already owns its nodes.
pub struct ResourceMeshNetwork {
    config: MeshConfig,
    nodes: DashMap<String, Arc<MeshNode>>,
    graph: RwLock<MeshGraph>,
    /// Serializes topology changes (establish / remove)
    topology: Mutex<()>,
    affinity: Arc<dyn AffinityModel>,
    events: Option<EventBus>,
}

impl ResourceMeshNetwork {
    pub fn new(config: MeshConfig) -> Self {
        Self {
            config,
            nodes: DashMap::new(),
            graph: RwLock::new(MeshGraph::new()),
            topology: Mutex::new(()),
            affinity: Arc::new(SpecializationAffinity::default()),
            events: None,
        }
    }

    pub fn with_affinity(mut self, affinity: Arc<dyn AffinityModel>) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Replace the mesh with one built from `agents`
    ///
    /// Every ordered pair is evaluated; a pair passing in either direction
    /// gets a symmetric edge. Nodes of the previous mesh are retired only
    /// after any transfer holding them has finished.
    #[instrument(skip(self, agents), fields(agent_count = agents.len()))]
    pub fn establish_network(&self, agents: Vec<Agent>) -> Result<NetworkSummary> {
        let mut specs: Vec<AgentSpec> = Vec::with_capacity(agents.len());
        let mut seen = HashSet::new();
        for agent in agents {
            let spec = agent.validate()?;
            if !seen.insert(spec.id.clone()) {
                return Err(InputError::DuplicateId(spec.id).into());
            }
            specs.push(spec);
        }

        let graph = self.build_graph(&specs);

        let _topology = self.topology.lock();
        let previous: Vec<Arc<MeshNode>> = self
            .nodes
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for node in &previous {
            node.retire();
        }

        *self.graph.write() = graph;
        self.nodes.clear();
        for spec in specs {
            self.nodes
                .insert(spec.id.clone(), Arc::new(MeshNode::new(spec)));
        }

        let summary = self.summary();
        info!(
            nodes = summary.node_count,
            agents_connected = summary.agents_connected,
            edges = summary.edges,
            density = summary.connection_density,
            retired = previous.len(),
            "Mesh established"
        );
        self.publish(EngineEvent::NetworkEstablished {
            agents_connected: summary.agents_connected,
            connection_density: summary.connection_density,
        });

        Ok(summary)
    }

    fn build_graph(&self, specs: &[AgentSpec]) -> MeshGraph {
        let mut graph = MeshGraph::new();
        for spec in specs {
            graph.add_node(&spec.id);
        }
        for a in specs {
            for b in specs {
                if a.id != b.id && self.is_edge(a, b) {
                    graph.connect(&a.id, &b.id);
                }
            }
        }
        graph
    }

    fn is_edge(&self, a: &AgentSpec, b: &AgentSpec) -> bool {
        self.affinity.compatibility(a, b) > self.config.edge_compatibility_threshold
            && self.affinity.distance(a, b) <= self.config.max_depth
    }

    /// Remove an agent and its edges, waiting for any transfer through it
    #[instrument(skip(self))]
    pub fn remove_agent(&self, id: &str) -> bool {
        let _topology = self.topology.lock();
        let Some(node) = self.nodes.get(id).map(|entry| Arc::clone(entry.value())) else {
            return false;
        };
        node.retire();
        self.graph.write().remove_node(id);
        self.nodes.remove(id);
        info!(node_id = %id, "Agent removed from mesh");
        true
    }

    /// Shortest acyclic path over the current edges
    pub fn find_path(&self, from: &str, to: &str) -> Option<MeshPath> {
        self.graph.read().find_path(from, to)
    }

    /// Move `amount` of a resource from `from` to `to` along the shortest path
    ///
    /// The source is debited `min(amount, capacity)` and the destination is
    /// credited that draw times the path efficiency. Every node on the path is
    /// locked in id order for the duration of the write.
    #[instrument(skip(self))]
    pub fn transfer(
        &self,
        from: &str,
        to: &str,
        resource_type: &str,
        amount: f64,
    ) -> Result<TransferOutcome> {
        let requested = InputError::require_non_negative("amount", amount)?;
        if from == to {
            return Err(InputError::SelfTransfer(from.to_string()).into());
        }
        for id in [from, to] {
            if !self.nodes.contains_key(id) {
                return Err(InputError::UnknownAgent(id.to_string()).into());
            }
        }

        for attempt in 1..=MAX_TRANSFER_ATTEMPTS {
            let Some(path) = self.find_path(from, to) else {
                debug!(from = %from, to = %to, "No mesh path");
                return Ok(TransferOutcome::NoPath);
            };

            let efficiency = self.config.efficiency(path.hops());
            let Some((drawn, actual_amount)) = self.apply(&path, requested, efficiency) else {
                debug!(attempt, "Mesh changed under transfer, retrying");
                continue;
            };

            let receipt = TransferReceipt {
                from: from.to_string(),
                to: to.to_string(),
                resource_type: resource_type.to_string(),
                hops: path.hops(),
                path: path.into_nodes(),
                efficiency,
                requested,
                drawn,
                actual_amount,
            };

            debug!(
                from = %from,
                to = %to,
                hops = receipt.hops,
                efficiency,
                actual_amount,
                "Transfer completed"
            );
            self.publish(EngineEvent::NutrientTransfer {
                from: receipt.from.clone(),
                to: receipt.to.clone(),
                resource_type: receipt.resource_type.clone(),
                requested,
                actual_amount,
                efficiency,
                hops: receipt.hops,
                path: receipt.path.clone(),
            });

            return Ok(TransferOutcome::Completed(receipt));
        }

        warn!(from = %from, to = %to, "Transfer abandoned after repeated topology changes");
        Ok(TransferOutcome::NoPath)
    }

    /// Lock the path, revalidate it and move capacity. `None` means the mesh
    /// changed since the path was found.
    fn apply(&self, path: &MeshPath, amount: f64, efficiency: f64) -> Option<(f64, f64)> {
        let mut members: Vec<Arc<MeshNode>> = Vec::with_capacity(path.nodes().len());
        for id in path.nodes() {
            members.push(Arc::clone(self.nodes.get(id)?.value()));
        }
        members.sort_by(|a, b| a.id().cmp(b.id()));

        let mut ledgers: Vec<_> = members.iter().map(|node| node.lock()).collect();
        if ledgers.iter().any(|ledger| ledger.retired) || !self.graph.read().is_valid_path(path) {
            return None;
        }

        let source = members.iter().position(|n| n.id() == path.source())?;
        let destination = members.iter().position(|n| n.id() == path.destination())?;

        let drawn = amount.min(ledgers[source].capacity);
        let actual = drawn * efficiency;
        ledgers[source].capacity -= drawn;
        ledgers[destination].capacity += actual;

        Some((drawn, actual))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn capacity(&self, id: &str) -> Option<f64> {
        let node = self.nodes.get(id).map(|entry| Arc::clone(entry.value()))?;
        Some(node.capacity())
    }

    pub fn neighbors(&self, id: &str) -> Option<Vec<String>> {
        self.graph
            .read()
            .neighbors(id)
            .map(|set| set.iter().cloned().collect())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.read().edge_count()
    }

    pub fn connection_density(&self) -> f64 {
        self.graph.read().density()
    }

    pub fn summary(&self) -> NetworkSummary {
        let graph = self.graph.read();
        NetworkSummary {
            node_count: graph.node_count(),
            agents_connected: graph.connected_count(),
            edges: graph.edge_count(),
            connection_density: graph.density(),
        }
    }

    /// Every node with its capacity and neighbors, sorted by id
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        // capacities first: node locks are never awaited under the graph lock
        let nodes: Vec<(Arc<MeshNode>, f64)> = self
            .sorted_nodes()
            .into_iter()
            .map(|node| {
                let capacity = node.capacity();
                (node, capacity)
            })
            .collect();
        let graph = self.graph.read();
        nodes
            .iter()
            .map(|(node, capacity)| NodeSnapshot {
                id: node.id().to_string(),
                capacity: *capacity,
                specialization: node.specialization().to_string(),
                neighbors: graph
                    .neighbors(node.id())
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Validated descriptions of the current agents
    pub fn agents(&self) -> Vec<AgentSpec> {
        self.sorted_nodes().iter().map(|node| node.spec()).collect()
    }

    pub(crate) fn sorted_nodes(&self) -> Vec<Arc<MeshNode>> {
        let mut nodes: Vec<Arc<MeshNode>> = self
            .nodes
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        nodes.sort_by(|a, b| a.id().cmp(b.id()));
        nodes
    }

    pub(crate) fn publish(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

impl Default for ResourceMeshNetwork {
    fn default() -> Self {
        Self::new(MeshConfig::default())
    }
}
