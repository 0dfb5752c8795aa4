//! Vectorization advice.
//!
//! Operations are classified by name into a small closed set of classes and
//! given a speedup estimate from a fixed lookup table keyed by class and row
//! bucket. That estimate is always labelled [`AdviceBasis::Heuristic`]. When a
//! live comparison is requested, both the per-row loop and the columnar
//! kernel are timed on a bounded sample and the result is labelled
//! [`AdviceBasis::Measured`] with a caveat naming the sample size.

use crate::dataset::Table;
use crate::error::{Error, Result};
use crate::profiler::DatasetProfile;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hint::black_box;
use std::time::{Duration, Instant};

const TIMING_RUNS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Time both code paths on a sample instead of using the lookup table.
    pub measure: bool,
    /// Rows used for a live comparison.
    pub sample_rows: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            measure: false,
            sample_rows: 10_000,
        }
    }
}

impl AdvisorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rows == 0 {
            return Err(Error::Validation(
                "advisor.sample_rows must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Aggregate,
    ElementwiseTransform,
    JoinGroupBy,
    /// Anything that has to look at one row at a time.
    RowWise,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::ElementwiseTransform => "elementwise_transform",
            Self::JoinGroupBy => "join_groupby",
            Self::RowWise => "row_wise",
        }
    }

    pub fn is_vectorizable(&self) -> bool {
        !matches!(self, Self::RowWise)
    }
}

const AGGREGATE_KEYWORDS: &[&str] = &[
    "sum", "mean", "avg", "average", "median", "std", "var", "min", "max", "count",
    "aggregate", "quantile", "describe", "total",
];
const ELEMENTWISE_KEYWORDS: &[&str] = &[
    "scale", "normalize", "normalise", "add", "subtract", "multiply", "divide", "log", "exp",
    "sqrt", "abs", "round", "clip", "arithmetic", "transform", "fillna", "fill", "cast",
];
const JOIN_KEYWORDS: &[&str] = &["join", "groupby", "group_by", "group", "merge", "pivot", "lookup"];

/// Classify an operation name. Total: unknown names are [`OperationClass::RowWise`].
pub fn classify_operation(name: &str) -> OperationClass {
    let lowered = name.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .collect();
    let hit = |keywords: &[&str]| {
        tokens
            .iter()
            .any(|t| keywords.iter().any(|k| t == k || t.starts_with(&format!("{k}_"))))
    };

    // Join keywords win so "groupby_sum" is a grouping, not a plain aggregate.
    if hit(JOIN_KEYWORDS) {
        OperationClass::JoinGroupBy
    } else if hit(AGGREGATE_KEYWORDS) {
        OperationClass::Aggregate
    } else if hit(ELEMENTWISE_KEYWORDS) {
        OperationClass::ElementwiseTransform
    } else {
        OperationClass::RowWise
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowBucket {
    #[serde(rename = "<10K")]
    Small,
    #[serde(rename = "10K-1M")]
    Medium,
    #[serde(rename = ">1M")]
    Large,
}

impl RowBucket {
    pub fn for_rows(rows: usize) -> Self {
        if rows < 10_000 {
            Self::Small
        } else if rows <= 1_000_000 {
            Self::Medium
        } else {
            Self::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "<10K",
            Self::Medium => "10K-1M",
            Self::Large => ">1M",
        }
    }
}

/// Lookup table of expected speedups.
pub fn heuristic_speedup(class: OperationClass, bucket: RowBucket) -> f64 {
    match (class, bucket) {
        (OperationClass::Aggregate, RowBucket::Small) => 5.0,
        (OperationClass::Aggregate, RowBucket::Medium) => 20.0,
        (OperationClass::Aggregate, RowBucket::Large) => 50.0,
        (OperationClass::ElementwiseTransform, RowBucket::Small) => 10.0,
        (OperationClass::ElementwiseTransform, RowBucket::Medium) => 50.0,
        (OperationClass::ElementwiseTransform, RowBucket::Large) => 100.0,
        (OperationClass::JoinGroupBy, RowBucket::Small) => 2.0,
        (OperationClass::JoinGroupBy, RowBucket::Medium) => 8.0,
        (OperationClass::JoinGroupBy, RowBucket::Large) => 15.0,
        (OperationClass::RowWise, _) => 1.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceBasis {
    Heuristic,
    Measured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizationAdvice {
    pub operation_name: String,
    pub operation_class: OperationClass,
    pub vectorizable: bool,
    pub estimated_speedup_factor: f64,
    pub basis: AdviceBasis,
    pub row_bucket: RowBucket,
    /// Always set for measured advice.
    pub caveat: Option<String>,
}

/// Advise on each requested operation for this table.
pub fn advise_vectorization<T: Table + ?Sized>(
    table: &T,
    profile: &DatasetProfile,
    operations: &[String],
    config: &AdvisorConfig,
) -> Result<Vec<VectorizationAdvice>> {
    config.validate()?;
    let bucket = RowBucket::for_rows(profile.row_count);

    let sample = if config.measure {
        numeric_sample(table, profile, config.sample_rows)?
    } else {
        None
    };

    let advice = operations
        .iter()
        .map(|operation| {
            let class = classify_operation(operation);
            let mut advice = VectorizationAdvice {
                operation_name: operation.clone(),
                operation_class: class,
                vectorizable: class.is_vectorizable(),
                estimated_speedup_factor: heuristic_speedup(class, bucket),
                basis: AdviceBasis::Heuristic,
                row_bucket: bucket,
                caveat: None,
            };

            if config.measure && class.is_vectorizable() {
                match sample.as_ref() {
                    Some((column, values)) => {
                        let ratio = measure(class, values)?;
                        advice.estimated_speedup_factor = (ratio * 10.0).round() / 10.0;
                        advice.basis = AdviceBasis::Measured;
                        advice.caveat = Some(if values.len() < profile.row_count {
                            format!(
                                "measured on the first {} rows of '{column}', not the full {} rows",
                                values.len(),
                                profile.row_count
                            )
                        } else {
                            format!(
                                "measured on all {} rows of '{column}'; timings on larger tables may differ",
                                values.len()
                            )
                        });
                    }
                    None => {
                        advice.caveat = Some(
                            "no numeric column to measure on; speedup is a heuristic estimate"
                                .to_owned(),
                        );
                    }
                }
            }

            tracing::debug!(
                operation = %advice.operation_name,
                class = class.as_str(),
                speedup = advice.estimated_speedup_factor,
                basis = ?advice.basis,
                "Vectorization advice"
            );
            Ok(advice)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(advice)
}

/// The first numeric column, cast to f64 and truncated to `rows`.
fn numeric_sample<T: Table + ?Sized>(
    table: &T,
    profile: &DatasetProfile,
    rows: usize,
) -> Result<Option<(String, Series)>> {
    let Some(column) = profile
        .columns
        .iter()
        .find(|c| c.semantic_type.is_numeric())
    else {
        return Ok(None);
    };

    let series = table
        .column(&column.name)?
        .as_materialized_series()
        .head(Some(rows))
        .cast(&DataType::Float64)?;
    Ok(Some((column.name.clone(), series)))
}

/// Loop time divided by kernel time, best of a few runs each.
fn measure(class: OperationClass, values: &Series) -> Result<f64> {
    let ca = values.f64()?;
    let loop_values: Vec<Option<f64>> = ca.into_iter().collect();

    let (looped, vectorized) = match class {
        OperationClass::ElementwiseTransform => (
            best_of(|| {
                let out: Vec<Option<f64>> = loop_values
                    .iter()
                    .map(|v| v.map(|x| x * 2.0 + 1.0))
                    .collect();
                black_box(out);
                Ok(())
            })?,
            best_of(|| {
                black_box(ca.apply_values(|x| x * 2.0 + 1.0));
                Ok(())
            })?,
        ),
        OperationClass::Aggregate => (
            best_of(|| {
                let mut total = 0.0;
                for x in loop_values.iter().flatten() {
                    total += x;
                }
                black_box(total);
                Ok(())
            })?,
            best_of(|| {
                black_box(ca.sum());
                Ok(())
            })?,
        ),
        OperationClass::JoinGroupBy => {
            let keys: Vec<Option<i64>> = loop_values
                .iter()
                .map(|v| v.map(|x| (x.abs() % 16.0) as i64))
                .collect();
            let frame = DataFrame::new(vec![
                Column::new("key".into(), keys.clone()),
                Column::new("value".into(), loop_values.clone()),
            ])?;
            (
                best_of(|| {
                    let mut groups: HashMap<Option<i64>, f64> = HashMap::new();
                    for (k, v) in keys.iter().zip(&loop_values) {
                        *groups.entry(*k).or_default() += v.unwrap_or(0.0);
                    }
                    black_box(groups);
                    Ok(())
                })?,
                best_of(|| {
                    let out = frame
                        .clone()
                        .lazy()
                        .group_by([col("key")])
                        .agg([col("value").sum()])
                        .collect()?;
                    black_box(out);
                    Ok(())
                })?,
            )
        }
        OperationClass::RowWise => return Ok(1.0),
    };

    let vectorized = vectorized.as_secs_f64().max(1e-9);
    Ok(looped.as_secs_f64() / vectorized)
}

fn best_of(mut run: impl FnMut() -> Result<()>) -> Result<Duration> {
    let mut best = Duration::MAX;
    for _ in 0..TIMING_RUNS {
        let start = Instant::now();
        run()?;
        best = best.min(start.elapsed());
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::{ProfilerConfig, profile};

    fn ops(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify_operation("mean"), OperationClass::Aggregate);
        assert_eq!(classify_operation("Rolling STD"), OperationClass::Aggregate);
        assert_eq!(classify_operation("scale"), OperationClass::ElementwiseTransform);
        assert_eq!(
            classify_operation("arithmetic_operations"),
            OperationClass::ElementwiseTransform
        );
        assert_eq!(classify_operation("groupby_sum"), OperationClass::JoinGroupBy);
        assert_eq!(classify_operation("merge"), OperationClass::JoinGroupBy);
        assert_eq!(classify_operation("custom python lambda"), OperationClass::RowWise);
        assert_eq!(classify_operation(""), OperationClass::RowWise);
    }

    #[test]
    fn test_row_buckets() {
        assert_eq!(RowBucket::for_rows(0), RowBucket::Small);
        assert_eq!(RowBucket::for_rows(9_999), RowBucket::Small);
        assert_eq!(RowBucket::for_rows(10_000), RowBucket::Medium);
        assert_eq!(RowBucket::for_rows(1_000_000), RowBucket::Medium);
        assert_eq!(RowBucket::for_rows(1_000_001), RowBucket::Large);
    }

    #[test]
    fn test_default_advice_is_heuristic() -> Result<()> {
        let df = df!("x" => &[1.0f64, 2.0, 3.0])?;
        let profile = profile(&df, &ProfilerConfig::default())?;
        let advice = advise_vectorization(
            &df,
            &profile,
            &ops(&["sum", "scale", "join", "iterrows"]),
            &AdvisorConfig::default(),
        )?;

        assert_eq!(advice.len(), 4);
        assert!(advice.iter().all(|a| a.basis == AdviceBasis::Heuristic));
        assert!(advice.iter().all(|a| a.caveat.is_none()));
        assert_eq!(advice[0].estimated_speedup_factor, 5.0);
        assert_eq!(advice[1].estimated_speedup_factor, 10.0);
        assert_eq!(advice[2].estimated_speedup_factor, 2.0);
        assert!(!advice[3].vectorizable);
        assert_eq!(advice[3].estimated_speedup_factor, 1.0);
        Ok(())
    }

    #[test]
    fn test_measured_advice_names_its_sample() -> Result<()> {
        let values: Vec<f64> = (0..20_000).map(f64::from).collect();
        let df = df!("x" => values)?;
        let profile = profile(&df, &ProfilerConfig::default())?;
        let config = AdvisorConfig {
            measure: true,
            sample_rows: 5_000,
        };
        let advice = advise_vectorization(&df, &profile, &ops(&["scale", "sum", "groupby"]), &config)?;

        for a in &advice {
            assert_eq!(a.basis, AdviceBasis::Measured);
            assert!(a.estimated_speedup_factor.is_finite());
            let caveat = a.caveat.as_deref().unwrap_or_default();
            assert!(caveat.contains("5000"), "caveat: {caveat}");
            assert!(caveat.contains("20000"), "caveat: {caveat}");
        }
        Ok(())
    }

    #[test]
    fn test_measured_caveat_when_sample_covers_table() -> Result<()> {
        let df = df!("x" => (0..300).map(f64::from).collect::<Vec<_>>())?;
        let profile = profile(&df, &ProfilerConfig::default())?;
        let config = AdvisorConfig {
            measure: true,
            sample_rows: 10_000,
        };
        let advice = advise_vectorization(&df, &profile, &ops(&["sum"]), &config)?;

        let caveat = advice[0].caveat.as_deref().unwrap_or_default();
        assert!(caveat.contains("all 300 rows"), "caveat: {caveat}");
        assert!(!caveat.contains("not the full"), "caveat: {caveat}");
        Ok(())
    }

    #[test]
    fn test_measure_without_numeric_column_stays_heuristic() -> Result<()> {
        let df = df!("label" => &["a", "b", "a"])?;
        let profile = profile(&df, &ProfilerConfig::default())?;
        let config = AdvisorConfig {
            measure: true,
            ..Default::default()
        };
        let advice = advise_vectorization(&df, &profile, &ops(&["sum"]), &config)?;
        assert_eq!(advice[0].basis, AdviceBasis::Heuristic);
        assert!(advice[0].caveat.is_some());
        Ok(())
    }

    #[test]
    fn test_zero_sample_rows_is_invalid() -> Result<()> {
        let df = df!("x" => &[1i64])?;
        let profile = profile(&df, &ProfilerConfig::default())?;
        let config = AdvisorConfig {
            measure: true,
            sample_rows: 0,
        };
        let err = advise_vectorization(&df, &profile, &ops(&["sum"]), &config).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        Ok(())
    }
}
