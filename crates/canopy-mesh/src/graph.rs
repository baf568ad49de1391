//! Undirected adjacency graph and breadth-first path search

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;

/// Ordered, acyclic sequence of node ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshPath {
    nodes: Vec<String>,
}

impl MeshPath {
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Number of edges traversed
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn source(&self) -> &str {
        &self.nodes[0]
    }

    pub fn destination(&self) -> &str {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn into_nodes(self) -> Vec<String> {
        self.nodes
    }
}

/// Symmetric adjacency sets keyed by node id
///
/// BTree collections keep traversal order deterministic, so the same graph
/// always yields the same path.
#[derive(Debug, Clone, Default)]
pub struct MeshGraph {
    adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl MeshGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: &str) {
        self.adjacency.entry(id.to_string()).or_default();
    }

    /// Add a symmetric edge; self-loops are ignored
    pub fn connect(&mut self, a: &str, b: &str) -> bool {
        if a == b {
            return false;
        }
        let inserted = self
            .adjacency
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.adjacency
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
        inserted
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &str) -> bool {
        match self.adjacency.remove(id) {
            Some(neighbors) => {
                for neighbor in neighbors {
                    if let Some(set) = self.adjacency.get_mut(&neighbor) {
                        set.remove(id);
                    }
                }
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adjacency.contains_key(id)
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.adjacency
            .get(a)
            .map(|set| set.contains(b))
            .unwrap_or(false)
    }

    pub fn neighbors(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.adjacency.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Nodes with at least one neighbor
    pub fn connected_count(&self) -> usize {
        self.adjacency.values().filter(|set| !set.is_empty()).count()
    }

    /// existing_edges / max_possible_edges; 0 for fewer than two nodes
    pub fn density(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        let max_edges = n * (n - 1) / 2;
        self.edge_count() as f64 / max_edges as f64
    }

    /// Shortest hop path from `from` to `to`
    ///
    /// Breadth-first with a visited set, so no node is ever revisited and the
    /// returned path is acyclic by construction.
    pub fn find_path(&self, from: &str, to: &str) -> Option<MeshPath> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if from == to {
            return Some(MeshPath {
                nodes: vec![from.to_string()],
            });
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        visited.insert(from);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let Some(neighbors) = self.adjacency.get(current) else {
                continue;
            };
            for next in neighbors {
                if !visited.insert(next.as_str()) {
                    continue;
                }
                parent.insert(next.as_str(), current);
                if next == to {
                    return Some(Self::unwind(&parent, from, to));
                }
                queue.push_back(next.as_str());
            }
        }

        None
    }

    /// Whether every consecutive pair in `path` is still joined
    pub fn is_valid_path(&self, path: &MeshPath) -> bool {
        path.nodes.iter().all(|id| self.contains(id))
            && path.nodes.windows(2).all(|pair| self.has_edge(&pair[0], &pair[1]))
    }

    fn unwind(parent: &HashMap<&str, &str>, from: &str, to: &str) -> MeshPath {
        let mut nodes = vec![to.to_string()];
        let mut cursor = to;
        while cursor != from {
            match parent.get(cursor) {
                Some(&prev) => {
                    nodes.push(prev.to_string());
                    cursor = prev;
                }
                None => break,
            }
        }
        nodes.reverse();
        MeshPath { nodes }
    }
}
