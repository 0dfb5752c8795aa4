//! Static explanations of how the engine works.
//!
//! Unknown topics fall back to the general overview rather than failing.

use crate::planner::PlannerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    General,
    MemoryOptimization,
    Vectorization,
    Workflow,
    GuidedAnalysis,
}

impl Topic {
    pub const ALL: [Self; 5] = [
        Self::General,
        Self::MemoryOptimization,
        Self::Vectorization,
        Self::Workflow,
        Self::GuidedAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::MemoryOptimization => "memory_optimization",
            Self::Vectorization => "vectorization",
            Self::Workflow => "workflow",
            Self::GuidedAnalysis => "guided_analysis",
        }
    }

    /// Total: anything unrecognised is [`Topic::General`].
    pub fn parse(topic: &str) -> Self {
        let normalized = topic.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .unwrap_or(Self::General)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub topic: Topic,
    /// What the caller asked for, before fallback.
    pub requested: String,
    pub approach: String,
    pub steps: Vec<String>,
    pub notes: Vec<String>,
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

/// Describe the engine's approach to `topic`.
///
/// Figures quoted for memory optimization come from the active planner
/// configuration so the explanation matches what a plan would do.
pub fn explain_methodology(topic: &str, planner: &PlannerConfig) -> Explanation {
    let resolved = Topic::parse(topic);
    let (approach, steps, notes) = match resolved {
        Topic::General => (
            "Optimize first, then explore".to_owned(),
            lines(&[
                "Profile every column: type, range, cardinality, nulls",
                "Plan the smallest safe representation per column",
                "Advise which operations to run as whole-column batches",
                "Explore the optimized view: correlations, outliers, distributions, segments",
                "Continue interactively with guided steps ranked by stated interest",
            ]),
            lines(&[
                "Estimated figures are always flagged as approximate",
                "Decisions that cannot be evaluated are reported as no change",
            ]),
        ),
        Topic::MemoryOptimization => (
            "Per-column representation planning".to_owned(),
            lines(&[
                "Integers: smallest of 1, 2, 4 or 8 bytes covering [min, max], unsigned when min >= 0",
                "Integers with nulls: widen one rank, or keep the width as a nullable column at the aggressive level",
                "Floats: 8 to 4 bytes only when every sampled value round-trips within epsilon",
                "Strings: dictionary encoding when distinct / total is below the threshold",
            ]),
            vec![
                format!("epsilon = {:e}", planner.epsilon),
                format!("dictionary ratio threshold = {}", planner.dictionary_ratio),
                format!(
                    "monthly cost = bytes saved / GiB x {} x replication {}",
                    planner.cost_per_gb_month, planner.replication_factor
                ),
                "Plans are pure: the same profile always yields the same plan".to_owned(),
            ],
        ),
        Topic::Vectorization => (
            "Heuristic speedup lookup with optional measurement".to_owned(),
            lines(&[
                "Classify the operation: aggregate, elementwise transform, join/groupby or row-wise",
                "Look up the expected speedup by class and row-count bucket (<10K, 10K-1M, >1M)",
                "Optionally time a batch and a row-by-row version on a bounded sample",
            ]),
            lines(&[
                "Measured ratios come from a sample and carry a caveat naming its size",
                "Row-wise operations are never reported as vectorizable",
            ]),
        ),
        Topic::Workflow => (
            "Three phases in fixed order".to_owned(),
            lines(&[
                "Memory optimization: profile and plan, then build the optimized view",
                "Vectorization advisory: advice for the configured operations",
                "Exploration: numeric summaries, strong correlations, IQR outliers, top categories",
            ]),
            lines(&[
                "Each phase has a time budget; overrunning it fails the phase",
                "After a failure or cancellation the remaining phases are skipped",
            ]),
        ),
        Topic::GuidedAnalysis => (
            "Multi-turn analysis over independent calls".to_owned(),
            lines(&[
                "Start: profile, plan and summarise the dataset",
                "Continue: classify the stated interest, run the most relevant uncovered area",
                "Once every area is covered, synthesise the earlier findings",
            ]),
            lines(&[
                "Sessions expire after an idle timeout",
                "A continuation against a different dataset is rejected",
                "Only one continuation per session runs at a time",
            ]),
        ),
    };

    Explanation {
        topic: resolved,
        requested: topic.to_owned(),
        approach,
        steps,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_topics_resolve() {
        assert_eq!(Topic::parse("memory_optimization"), Topic::MemoryOptimization);
        assert_eq!(Topic::parse("Memory Optimization"), Topic::MemoryOptimization);
        assert_eq!(Topic::parse("guided-analysis"), Topic::GuidedAnalysis);
    }

    #[test]
    fn test_unknown_topic_falls_back_to_general() {
        let explanation = explain_methodology("quantum", &PlannerConfig::default());
        assert_eq!(explanation.topic, Topic::General);
        assert_eq!(explanation.requested, "quantum");
        assert!(!explanation.steps.is_empty());
    }

    #[test]
    fn test_memory_explanation_quotes_config() {
        let config = PlannerConfig {
            epsilon: 1e-9,
            ..PlannerConfig::default()
        };
        let explanation = explain_methodology("memory_optimization", &config);
        assert!(explanation.notes.iter().any(|n| n.contains("1e-9")));
    }

    #[test]
    fn test_every_topic_has_content() {
        for topic in Topic::ALL {
            let explanation = explain_methodology(topic.as_str(), &PlannerConfig::default());
            assert_eq!(explanation.topic, topic);
            assert!(!explanation.approach.is_empty());
            assert!(!explanation.notes.is_empty());
        }
    }
}
