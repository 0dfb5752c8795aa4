//! Interest taxonomy and analysis areas.
//!
//! Free-text interests are mapped onto a closed set of categories by
//! [`classify_interest`], which is total: text that matches nothing is
//! [`Interest::General`]. Each interest ranks the explorable areas by
//! relevance; the session picks the first area not already covered.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interest {
    Correlation,
    Outliers,
    Trends,
    Distributions,
    Segments,
    MlReadiness,
    DataQuality,
    General,
}

/// Word stems per interest. A word matches when it starts with the stem.
const KEYWORDS: &[(Interest, &[&str])] = &[
    (
        Interest::Correlation,
        &["correlat", "relationship", "related", "relate", "associat", "depend", "connect", "link"],
    ),
    (
        Interest::Outliers,
        &["outlier", "anomal", "unusual", "extreme", "spike", "odd", "weird"],
    ),
    (
        Interest::Trends,
        &["trend", "time", "season", "growth", "grow", "forecast", "month", "year", "daily", "temporal"],
    ),
    (
        Interest::Distributions,
        &["distribut", "spread", "shape", "skew", "histogram", "normal", "variance", "range"],
    ),
    (
        Interest::Segments,
        &["segment", "group", "categor", "cluster", "customer", "region", "cohort", "compare"],
    ),
    (
        Interest::MlReadiness,
        &["ml", "machine", "model", "predict", "classif", "regress", "feature", "train"],
    ),
    (
        Interest::DataQuality,
        &["quality", "missing", "null", "clean", "duplicate", "error", "complete", "valid"],
    ),
];

impl Interest {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correlation => "correlation",
            Self::Outliers => "outliers",
            Self::Trends => "trends",
            Self::Distributions => "distributions",
            Self::Segments => "segments",
            Self::MlReadiness => "ml_readiness",
            Self::DataQuality => "data_quality",
            Self::General => "general",
        }
    }

    /// Explorable areas, most relevant first.
    pub fn ranking(&self) -> [AnalysisArea; 7] {
        use AnalysisArea as A;
        match self {
            Self::Correlation => [
                A::Correlation,
                A::Distributions,
                A::Outliers,
                A::Trends,
                A::Segments,
                A::MlReadiness,
                A::DataQuality,
            ],
            Self::Outliers => [
                A::Outliers,
                A::Distributions,
                A::DataQuality,
                A::Correlation,
                A::Segments,
                A::Trends,
                A::MlReadiness,
            ],
            Self::Trends => [
                A::Trends,
                A::Correlation,
                A::Distributions,
                A::Segments,
                A::Outliers,
                A::MlReadiness,
                A::DataQuality,
            ],
            Self::Distributions => [
                A::Distributions,
                A::Outliers,
                A::Correlation,
                A::DataQuality,
                A::Segments,
                A::Trends,
                A::MlReadiness,
            ],
            Self::Segments => [
                A::Segments,
                A::Distributions,
                A::Correlation,
                A::Trends,
                A::Outliers,
                A::MlReadiness,
                A::DataQuality,
            ],
            Self::MlReadiness => [
                A::MlReadiness,
                A::DataQuality,
                A::Correlation,
                A::Outliers,
                A::Distributions,
                A::Segments,
                A::Trends,
            ],
            Self::DataQuality => [
                A::DataQuality,
                A::Outliers,
                A::Distributions,
                A::Correlation,
                A::Segments,
                A::Trends,
                A::MlReadiness,
            ],
            Self::General => [
                A::DataQuality,
                A::Distributions,
                A::Correlation,
                A::Outliers,
                A::Segments,
                A::Trends,
                A::MlReadiness,
            ],
        }
    }
}

/// Map free text onto the closed interest taxonomy.
///
/// The category with the most keyword hits wins; ties go to the category
/// listed first. No hits at all is [`Interest::General`].
pub fn classify_interest(text: &str) -> Interest {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut best = (Interest::General, 0usize);
    for (interest, stems) in KEYWORDS {
        let hits = words
            .iter()
            .filter(|w| stems.iter().any(|s| w.starts_with(s)))
            .count();
        if hits > best.1 {
            best = (*interest, hits);
        }
    }
    best.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisArea {
    /// Initial profiling and optimization step.
    Overview,
    Correlation,
    Outliers,
    Distributions,
    Trends,
    Segments,
    MlReadiness,
    DataQuality,
    /// Closing synthesis once every area is covered.
    Insights,
}

impl AnalysisArea {
    pub const EXPLORABLE: [Self; 7] = [
        Self::Correlation,
        Self::Outliers,
        Self::Distributions,
        Self::Trends,
        Self::Segments,
        Self::MlReadiness,
        Self::DataQuality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Correlation => "correlation",
            Self::Outliers => "outliers",
            Self::Distributions => "distributions",
            Self::Trends => "trends",
            Self::Segments => "segments",
            Self::MlReadiness => "ml_readiness",
            Self::DataQuality => "data_quality",
            Self::Insights => "insights",
        }
    }

    /// Prompt offered when suggesting this area.
    pub fn question(&self) -> &'static str {
        match self {
            Self::Overview => "What type of business problem does this data represent?",
            Self::Correlation => "Are there strong correlations we should investigate?",
            Self::Outliers => "Do you see any outliers that need attention?",
            Self::Distributions => "Which variables show interesting patterns or distributions?",
            Self::Trends => "What trends or patterns have business implications?",
            Self::Segments => "Are there natural customer or product segments in the data?",
            Self::MlReadiness => "Are there opportunities for predictive modeling?",
            Self::DataQuality => "Is the data complete and clean enough to trust?",
            Self::Insights => "What are the most important findings so far?",
        }
    }
}

/// Next explorable area for an interest, skipping covered ones.
pub fn select_area(interest: Interest, covered: &[AnalysisArea]) -> AnalysisArea {
    interest
        .ranking()
        .into_iter()
        .find(|area| !covered.contains(area))
        .unwrap_or(AnalysisArea::Insights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_interests() {
        assert_eq!(classify_interest("correlation"), Interest::Correlation);
        assert_eq!(
            classify_interest("How are price and demand related?"),
            Interest::Correlation
        );
        assert_eq!(classify_interest("outliers"), Interest::Outliers);
        assert_eq!(classify_interest("Any anomalies?"), Interest::Outliers);
        assert_eq!(classify_interest("sales growth over time"), Interest::Trends);
        assert_eq!(classify_interest("could we train a model"), Interest::MlReadiness);
        assert_eq!(classify_interest("Missing values"), Interest::DataQuality);
        assert_eq!(classify_interest("customer segments"), Interest::Segments);
    }

    #[test]
    fn test_unknown_text_falls_back_to_general() {
        assert_eq!(classify_interest(""), Interest::General);
        assert_eq!(classify_interest("surprise me"), Interest::General);
        assert_eq!(classify_interest("🤔"), Interest::General);
    }

    #[test]
    fn test_rankings_are_permutations() {
        let all = [
            Interest::Correlation,
            Interest::Outliers,
            Interest::Trends,
            Interest::Distributions,
            Interest::Segments,
            Interest::MlReadiness,
            Interest::DataQuality,
            Interest::General,
        ];
        for interest in all {
            let ranking = interest.ranking();
            for area in AnalysisArea::EXPLORABLE {
                assert!(
                    ranking.contains(&area),
                    "{} ranking misses {}",
                    interest.as_str(),
                    area.as_str()
                );
            }
        }
    }

    #[test]
    fn test_select_area_skips_covered() {
        assert_eq!(
            select_area(Interest::Correlation, &[]),
            AnalysisArea::Correlation
        );
        assert_eq!(
            select_area(Interest::Correlation, &[AnalysisArea::Correlation]),
            AnalysisArea::Distributions
        );
        assert_eq!(
            select_area(Interest::General, &AnalysisArea::EXPLORABLE),
            AnalysisArea::Insights
        );
    }
}
