//! Seed bank: candidate improvements waiting for enough pressure
//!
//! Seeds are grouped by adaptation type. Each group is bounded by
//! `max_per_type` (oldest evicted first) and every seed expires after the
//! configured TTL.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::classify::AdaptationType;

/// A banked, not yet applied improvement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub id: Uuid,
    pub adaptation_type: AdaptationType,
    /// Resistance type of the signal the seed came from
    pub category: String,
    pub viability: f64,
    pub complexity: f64,
    pub stored_at: DateTime<Utc>,
}

impl Seed {
    pub fn new(
        adaptation_type: AdaptationType,
        category: impl Into<String>,
        viability: f64,
        stored_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            adaptation_type,
            category: category.into(),
            viability: viability.clamp(0.0, 1.0),
            complexity: adaptation_type.base_complexity(),
            stored_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.stored_at > ttl
    }
}

/// Seeds grouped by adaptation type
pub struct SeedBank {
    seeds: DashMap<AdaptationType, Vec<Seed>>,
    max_per_type: usize,
    ttl: Duration,
}

impl SeedBank {
    pub fn new(max_per_type: usize, ttl: Duration) -> Self {
        Self {
            seeds: DashMap::new(),
            max_per_type: max_per_type.max(1),
            ttl,
        }
    }

    /// Bank a seed. Returns seeds evicted to stay within the per-type bound.
    pub fn insert(&self, seed: Seed, now: DateTime<Utc>) -> Vec<Seed> {
        self.prune_expired(now);

        let mut group = self.seeds.entry(seed.adaptation_type).or_default();
        group.push(seed);

        let mut evicted = Vec::new();
        while group.len() > self.max_per_type {
            let Some(oldest) = group
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.stored_at)
                .map(|(idx, _)| idx)
            else {
                break;
            };
            evicted.push(group.remove(oldest));
        }

        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), "Evicted oldest seeds");
        }
        evicted
    }

    /// Remove and return up to `ceil(matching × intensity)` seeds of `kind`,
    /// most viable first
    pub fn take_best(&self, kind: AdaptationType, intensity: f64, now: DateTime<Utc>) -> Vec<Seed> {
        self.prune_expired(now);

        let Some(mut group) = self.seeds.get_mut(&kind) else {
            return Vec::new();
        };
        if group.is_empty() {
            return Vec::new();
        }

        let wanted = ((group.len() as f64) * intensity.clamp(0.0, 1.0)).ceil() as usize;
        let wanted = wanted.min(group.len());

        group.sort_by(|a, b| {
            OrderedFloat(b.viability)
                .cmp(&OrderedFloat(a.viability))
                .then_with(|| a.stored_at.cmp(&b.stored_at))
        });
        group.drain(..wanted).collect()
    }

    /// Return a seed taken by `take_best`; the per-type bound still applies
    pub fn restore(&self, seed: Seed) {
        let mut group = self.seeds.entry(seed.adaptation_type).or_default();
        group.push(seed);
        if group.len() > self.max_per_type {
            if let Some(oldest) = group
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.stored_at)
                .map(|(idx, _)| idx)
            {
                group.remove(oldest);
            }
        }
    }

    /// Drop seeds older than the TTL. Returns how many were removed.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let mut removed = 0;
        for mut group in self.seeds.iter_mut() {
            let before = group.len();
            group.retain(|seed| !seed.is_expired(now, ttl));
            removed += before - group.len();
        }
        if removed > 0 {
            debug!(removed, "Pruned expired seeds");
        }
        removed
    }

    pub fn count(&self, kind: AdaptationType) -> usize {
        self.seeds.get(&kind).map(|group| group.len()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.seeds.iter().map(|group| group.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the seeds of one type
    pub fn seeds(&self, kind: AdaptationType) -> Vec<Seed> {
        self.seeds
            .get(&kind)
            .map(|group| group.clone())
            .unwrap_or_default()
    }
}
