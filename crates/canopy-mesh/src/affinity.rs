//! Pairwise compatibility and network distance between agents

use std::collections::HashMap;

use canopy_common::AgentSpec;

/// Source of pairwise compatibility and distance used to build edges
pub trait AffinityModel: Send + Sync {
    /// Compatibility in `[0, 1]`
    fn compatibility(&self, a: &AgentSpec, b: &AgentSpec) -> f64;

    /// Network distance in hops
    fn distance(&self, a: &AgentSpec, b: &AgentSpec) -> u32;
}

/// Compatibility from shared specialization and capacity balance
///
/// ```text
/// compatibility = 0.6 × specialization_match + 0.4 × min(cap) / max(cap)
/// ```
///
/// where `specialization_match` is 1.0 for equal tags and
/// `cross_specialization` otherwise. Every pair sits `distance` hops apart.
#[derive(Debug, Clone)]
pub struct SpecializationAffinity {
    pub cross_specialization: f64,
    pub distance: u32,
}

impl Default for SpecializationAffinity {
    fn default() -> Self {
        Self {
            cross_specialization: 0.6,
            distance: 1,
        }
    }
}

impl AffinityModel for SpecializationAffinity {
    fn compatibility(&self, a: &AgentSpec, b: &AgentSpec) -> f64 {
        let specialization_match = if a.specialization == b.specialization {
            1.0
        } else {
            self.cross_specialization
        };

        let (low, high) = if a.capacity <= b.capacity {
            (a.capacity, b.capacity)
        } else {
            (b.capacity, a.capacity)
        };
        let balance = if high == 0.0 { 1.0 } else { low / high };

        (0.6 * specialization_match + 0.4 * balance).clamp(0.0, 1.0)
    }

    fn distance(&self, _a: &AgentSpec, _b: &AgentSpec) -> u32 {
        self.distance
    }
}

/// Explicit pair table; unlisted pairs use the fallback
#[derive(Debug, Clone)]
pub struct StaticAffinity {
    pairs: HashMap<(String, String), (f64, u32)>,
    fallback: (f64, u32),
}

impl StaticAffinity {
    /// Every pair has the same compatibility and distance
    pub fn uniform(compatibility: f64, distance: u32) -> Self {
        Self {
            pairs: HashMap::new(),
            fallback: (compatibility, distance),
        }
    }

    /// No pair is compatible unless listed
    pub fn empty() -> Self {
        Self::uniform(0.0, u32::MAX)
    }

    /// Set a symmetric pair entry
    pub fn with_pair(mut self, a: &str, b: &str, compatibility: f64, distance: u32) -> Self {
        self.pairs.insert(Self::key(a, b), (compatibility, distance));
        self
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    fn lookup(&self, a: &AgentSpec, b: &AgentSpec) -> (f64, u32) {
        self.pairs
            .get(&Self::key(&a.id, &b.id))
            .copied()
            .unwrap_or(self.fallback)
    }
}

impl AffinityModel for StaticAffinity {
    fn compatibility(&self, a: &AgentSpec, b: &AgentSpec) -> f64 {
        self.lookup(a, b).0
    }

    fn distance(&self, a: &AgentSpec, b: &AgentSpec) -> u32 {
        self.lookup(a, b).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, capacity: f64, specialization: &str) -> AgentSpec {
        AgentSpec {
            id: id.to_string(),
            capacity,
            specialization: specialization.to_string(),
        }
    }

    #[test]
    fn test_same_specialization_equal_capacity() {
        let model = SpecializationAffinity::default();
        let c = model.compatibility(&spec("a", 10.0, "nlp"), &spec("b", 10.0, "nlp"));
        assert!((c - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cross_specialization_is_weaker() {
        let model = SpecializationAffinity::default();
        let same = model.compatibility(&spec("a", 10.0, "nlp"), &spec("b", 5.0, "nlp"));
        let cross = model.compatibility(&spec("a", 10.0, "nlp"), &spec("b", 5.0, "vision"));
        // 0.6 + 0.2 vs 0.36 + 0.2
        assert!((same - 0.8).abs() < 1e-12);
        assert!((cross - 0.56).abs() < 1e-12);
    }

    #[test]
    fn test_zero_capacity_pair_is_balanced() {
        let model = SpecializationAffinity::default();
        let c = model.compatibility(&spec("a", 0.0, "x"), &spec("b", 0.0, "x"));
        assert!((c - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_static_pairs_are_symmetric() {
        let model = StaticAffinity::empty().with_pair("b", "a", 0.9, 2);
        let a = spec("a", 1.0, "x");
        let b = spec("b", 1.0, "x");
        let c = spec("c", 1.0, "x");

        assert_eq!(model.compatibility(&a, &b), 0.9);
        assert_eq!(model.distance(&b, &a), 2);
        assert_eq!(model.compatibility(&a, &c), 0.0);
    }
}
