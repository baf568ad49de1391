//! Signal classification and seed viability

use canopy_common::{Signal, UnitScore};
use serde::{Deserialize, Serialize};

/// Kind of behavioral change a signal calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationType {
    ErrorPrevention,
    GuidanceEnhancement,
    InterfaceSimplification,
    WorkflowOptimization,
    PerformanceOptimization,
    ResourceRebalancing,
}

/// Keyword stems, checked in order. A stem matches the start of a word of the
/// resistance type; words are split on anything not alphanumeric.
const KEYWORDS: &[(AdaptationType, &[&str])] = &[
    (
        AdaptationType::ResourceRebalancing,
        &["resource", "imbalance", "capacity", "partition", "network"],
    ),
    (
        AdaptationType::PerformanceOptimization,
        &["performance", "latency", "slow", "timeout"],
    ),
    (
        AdaptationType::ErrorPrevention,
        &["error", "fail", "crash", "exception"],
    ),
    (
        AdaptationType::GuidanceEnhancement,
        &["help", "guidance", "confus", "onboarding", "documentation"],
    ),
    (
        AdaptationType::InterfaceSimplification,
        &["interface", "layout", "navigation", "click", "form"],
    ),
    (
        AdaptationType::WorkflowOptimization,
        &["workflow", "process", "step", "repeat"],
    ),
];

impl AdaptationType {
    pub const ALL: [AdaptationType; 6] = [
        AdaptationType::ErrorPrevention,
        AdaptationType::GuidanceEnhancement,
        AdaptationType::InterfaceSimplification,
        AdaptationType::WorkflowOptimization,
        AdaptationType::PerformanceOptimization,
        AdaptationType::ResourceRebalancing,
    ];

    /// Classify by resistance type keyword, else by the dominant indicator
    pub fn classify(signal: &Signal) -> Self {
        let words: Vec<&str> = signal
            .category
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();

        KEYWORDS
            .iter()
            .find(|(_, stems)| {
                stems
                    .iter()
                    .any(|stem| words.iter().any(|word| word.starts_with(stem)))
            })
            .map(|(kind, _)| *kind)
            .unwrap_or_else(|| Self::dominant_indicator(signal))
    }

    fn dominant_indicator(signal: &Signal) -> Self {
        // earlier entries win ties
        let ranked = [
            (signal.error_count, AdaptationType::ErrorPrevention),
            (signal.help_requests, AdaptationType::GuidanceEnhancement),
            (signal.frustration_count, AdaptationType::InterfaceSimplification),
            (signal.attempts, AdaptationType::WorkflowOptimization),
        ];

        let mut best = (0, AdaptationType::WorkflowOptimization);
        for (count, kind) in ranked {
            if count > best.0 {
                best = (count, kind);
            }
        }
        best.1
    }

    /// How readily this kind of change can be delivered
    pub fn solution_feasibility(self) -> f64 {
        match self {
            AdaptationType::ErrorPrevention => 0.8,
            AdaptationType::GuidanceEnhancement => 0.9,
            AdaptationType::InterfaceSimplification => 0.7,
            AdaptationType::WorkflowOptimization => 0.75,
            AdaptationType::PerformanceOptimization => 0.6,
            AdaptationType::ResourceRebalancing => 0.7,
        }
    }

    /// Base implementation complexity
    pub fn base_complexity(self) -> f64 {
        match self {
            AdaptationType::ErrorPrevention => 0.4,
            AdaptationType::GuidanceEnhancement => 0.3,
            AdaptationType::InterfaceSimplification => 0.6,
            AdaptationType::WorkflowOptimization => 0.5,
            AdaptationType::PerformanceOptimization => 0.7,
            AdaptationType::ResourceRebalancing => 0.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdaptationType::ErrorPrevention => "error_prevention",
            AdaptationType::GuidanceEnhancement => "guidance_enhancement",
            AdaptationType::InterfaceSimplification => "interface_simplification",
            AdaptationType::WorkflowOptimization => "workflow_optimization",
            AdaptationType::PerformanceOptimization => "performance_optimization",
            AdaptationType::ResourceRebalancing => "resource_rebalancing",
        }
    }
}

impl std::fmt::Display for AdaptationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Viability of banking `signal` as a seed of type `kind`
///
/// Mean of frequency, severity, persistence, pattern clarity and feasibility.
pub fn viability(signal: &Signal, kind: AdaptationType) -> UnitScore {
    let frequency = signal.occurrence_count.min(10) as f64 / 10.0;
    let severity = UnitScore::mean(&[
        signal.error_count.min(5) as f64 / 5.0,
        signal.urgency.weight(),
    ])
    .value();
    let persistence = if signal.attempts >= 3 { 1.0 } else { 0.0 };

    UnitScore::mean(&[
        frequency,
        severity,
        persistence,
        signal.pattern_strength,
        kind.solution_feasibility(),
    ])
}
