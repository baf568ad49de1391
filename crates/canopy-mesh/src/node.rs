//! Mesh nodes: one single-writer capacity ledger per agent

use canopy_common::AgentSpec;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

/// Mutable state of a node, guarded by the node's own lock
#[derive(Debug)]
pub(crate) struct NodeLedger {
    pub capacity: f64,
    /// Set once the node leaves the mesh; a retired ledger is never written again
    pub retired: bool,
}

/// An agent in the mesh
#[derive(Debug)]
pub struct MeshNode {
    id: String,
    specialization: String,
    ledger: Mutex<NodeLedger>,
}

impl MeshNode {
    pub fn new(spec: AgentSpec) -> Self {
        Self {
            id: spec.id,
            specialization: spec.specialization,
            ledger: Mutex::new(NodeLedger {
                capacity: spec.capacity,
                retired: false,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn specialization(&self) -> &str {
        &self.specialization
    }

    /// Current capacity (blocks while a transfer holds the node)
    pub fn capacity(&self) -> f64 {
        self.ledger.lock().capacity
    }

    pub fn is_retired(&self) -> bool {
        self.ledger.lock().retired
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, NodeLedger> {
        self.ledger.lock()
    }

    /// Wait for in-flight writers, then mark the node retired
    pub(crate) fn retire(&self) {
        self.ledger.lock().retired = true;
    }

    pub(crate) fn spec(&self) -> AgentSpec {
        AgentSpec {
            id: self.id.clone(),
            capacity: self.capacity(),
            specialization: self.specialization.clone(),
        }
    }
}

/// Point-in-time view of a node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub capacity: f64,
    pub specialization: String,
    pub neighbors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_from_spec() {
        let node = MeshNode::new(AgentSpec {
            id: "a".to_string(),
            capacity: 12.5,
            specialization: "nlp".to_string(),
        });
        assert_eq!(node.id(), "a");
        assert_eq!(node.specialization(), "nlp");
        assert_eq!(node.capacity(), 12.5);
        assert!(!node.is_retired());

        node.lock().capacity -= 2.5;
        assert_eq!(node.capacity(), 10.0);

        node.retire();
        assert!(node.is_retired());
    }
}
