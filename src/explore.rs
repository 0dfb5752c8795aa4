//! Exploratory analyses run on the optimized view.
//!
//! [`explore`] produces the report of the workflow's Exploration phase. The
//! `*_step` functions are the individual areas a guided session can visit;
//! each returns a [`StepOutcome`] with a one-line summary, findings and an
//! optional chart request.

use crate::error::Result;
use crate::render::{ChartDescriptor, ChartKind};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Correlations stronger than this (absolute value) are reported.
pub const STRONG_CORRELATION: f64 = 0.7;

const IQR_MULTIPLIER: f64 = 1.5;
const MAX_CATEGORICAL_COLUMNS: usize = 5;
const TOP_VALUES: usize = 5;
const HIGH_MISSING_PCT: f64 = 10.0;
const TREND_THRESHOLD_PCT: f64 = 5.0;
const KPI_KEYWORDS: &[&str] = &["revenue", "profit", "cost", "amount", "price", "sales"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
    pub skew: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub left: String,
    pub right: String,
    pub r: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub column: String,
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub column: String,
    pub unique_count: usize,
    pub top_values: Vec<(String, usize)>,
    /// Share of rows taken by the most common value.
    pub concentration_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub row_count: usize,
    pub column_count: usize,
    pub dtype_counts: BTreeMap<String, usize>,
    pub numeric: Vec<NumericSummary>,
    pub strong_correlations: Vec<CorrelationPair>,
    pub outliers: Vec<OutlierSummary>,
    pub categorical: Vec<CategoricalSummary>,
}

impl ExplorationReport {
    pub fn summary(&self) -> String {
        format!(
            "{} numeric columns summarised, {} strong correlations, {} columns with outliers, {} categorical columns",
            self.numeric.len(),
            self.strong_correlations.len(),
            self.outliers.iter().filter(|o| o.count > 0).count(),
            self.categorical.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub summary: String,
    pub findings: Vec<String>,
    pub chart: Option<ChartDescriptor>,
}

/// Run the full exploration pass.
pub fn explore(df: &DataFrame) -> Result<ExplorationReport> {
    let numeric_cols = numeric_columns(df);

    let mut dtype_counts = BTreeMap::new();
    for column in df.get_columns() {
        *dtype_counts.entry(column.dtype().to_string()).or_insert(0) += 1;
    }

    let mut numeric = Vec::with_capacity(numeric_cols.len());
    let mut outliers = Vec::with_capacity(numeric_cols.len());
    for name in &numeric_cols {
        let values = f64_values(df.column(name)?)?;
        numeric.push(numeric_summary(name, &values));
        if let Some(o) = iqr_outliers(name, &values) {
            outliers.push(o);
        }
    }

    let categorical = categorical_columns(df)
        .iter()
        .take(MAX_CATEGORICAL_COLUMNS)
        .map(|name| categorical_summary(name, df.column(name)?))
        .collect::<Result<Vec<_>>>()?;

    Ok(ExplorationReport {
        row_count: df.height(),
        column_count: df.width(),
        dtype_counts,
        numeric,
        strong_correlations: strong_correlations(df, STRONG_CORRELATION)?,
        outliers,
        categorical,
    })
}

pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| c.dtype().is_primitive_numeric())
        .map(|c| c.name().to_string())
        .collect()
}

pub fn categorical_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::String | DataType::Categorical(_, _)))
        .map(|c| c.name().to_string())
        .collect()
}

fn temporal_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::Date | DataType::Datetime(_, _)))
        .map(|c| c.name().to_string())
        .collect()
}

fn f64_values(column: &Column) -> Result<Float64Chunked> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.clone())
}

pub fn numeric_summary(name: &str, ca: &Float64Chunked) -> NumericSummary {
    let mean = ca.mean();
    let median = ca.median();
    let std_dev = ca.std(1);
    let q1 = ca.quantile(0.25, QuantileMethod::Linear).unwrap_or(None);
    let q3 = ca.quantile(0.75, QuantileMethod::Linear).unwrap_or(None);

    NumericSummary {
        column: name.to_owned(),
        count: ca.len() - ca.null_count(),
        mean,
        std_dev,
        min: ca.min(),
        q1,
        median,
        q3,
        max: ca.max(),
        skew: calculate_skew(mean, median, q1, q3, std_dev),
    }
}

/// Average of Pearson's second skewness coefficient and Bowley's quartile
/// skew; Pearson alone when the IQR is zero.
pub fn calculate_skew(
    mean: Option<f64>,
    median: Option<f64>,
    q1: Option<f64>,
    q3: Option<f64>,
    std_dev: Option<f64>,
) -> Option<f64> {
    let (Some(m), Some(med), Some(s)) = (mean, median, std_dev) else {
        return None;
    };
    if s <= 0.0 {
        return None;
    }
    let pearson = 3.0 * (m - med) / s;
    match (q1, q3) {
        (Some(v1), Some(v3)) if v3 - v1 > 0.0 => {
            let bowley = (v3 + v1 - 2.0 * med) / (v3 - v1);
            Some(f64::midpoint(pearson, bowley))
        }
        _ => Some(pearson),
    }
}

/// Pearson correlation over the rows where both values are present.
pub fn pearson(a: &Float64Chunked, b: &Float64Chunked) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .into_iter()
        .zip(b)
        .filter_map(|(x, y)| Some((x?, y?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

pub fn strong_correlations(df: &DataFrame, threshold: f64) -> Result<Vec<CorrelationPair>> {
    let names = numeric_columns(df);
    let values = names
        .iter()
        .map(|name| f64_values(df.column(name)?))
        .collect::<Result<Vec<_>>>()?;

    let mut pairs = Vec::new();
    for (i, left) in values.iter().enumerate() {
        for (j, right) in values.iter().enumerate().skip(i + 1) {
            if let Some(r) = pearson(left, right)
                && r.abs() > threshold
            {
                pairs.push(CorrelationPair {
                    left: names.get(i).cloned().unwrap_or_default(),
                    right: names.get(j).cloned().unwrap_or_default(),
                    r: (r * 1000.0).round() / 1000.0,
                });
            }
        }
    }
    Ok(pairs)
}

pub fn iqr_outliers(name: &str, ca: &Float64Chunked) -> Option<OutlierSummary> {
    let q1 = ca.quantile(0.25, QuantileMethod::Linear).ok()??;
    let q3 = ca.quantile(0.75, QuantileMethod::Linear).ok()??;
    let iqr = q3 - q1;
    let lower_fence = q1 - IQR_MULTIPLIER * iqr;
    let upper_fence = q3 + IQR_MULTIPLIER * iqr;
    let count = ca
        .into_iter()
        .flatten()
        .filter(|&v| v < lower_fence || v > upper_fence)
        .count();
    Some(OutlierSummary {
        column: name.to_owned(),
        lower_fence,
        upper_fence,
        count,
    })
}

pub fn categorical_summary(name: &str, column: &Column) -> Result<CategoricalSummary> {
    let as_str = column.as_materialized_series().cast(&DataType::String)?;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in as_str.str()?.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // Most frequent first; ties alphabetical.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let rows = column.len();
    let concentration_pct = match (ranked.first(), rows) {
        (Some((_, top)), rows) if rows > 0 => (*top as f64 / rows as f64 * 10_000.0).round() / 100.0,
        _ => 0.0,
    };

    Ok(CategoricalSummary {
        column: name.to_owned(),
        unique_count: ranked.len(),
        top_values: ranked
            .iter()
            .take(TOP_VALUES)
            .map(|(label, count)| ((*label).to_owned(), *count))
            .collect(),
        concentration_pct,
    })
}

pub fn correlation_step(df: &DataFrame) -> Result<StepOutcome> {
    let numeric = numeric_columns(df);
    if numeric.len() < 2 {
        return Ok(StepOutcome {
            summary: "Correlation analysis needs at least two numeric columns".to_owned(),
            findings: vec![format!("Only {} numeric column(s) available", numeric.len())],
            chart: None,
        });
    }

    let pairs = strong_correlations(df, STRONG_CORRELATION)?;
    let mut findings: Vec<String> = pairs
        .iter()
        .map(|p| {
            let direction = if p.r > 0.0 { "positive" } else { "negative" };
            format!("{} and {}: strong {direction} correlation (r = {:.3})", p.left, p.right, p.r)
        })
        .collect();
    if findings.is_empty() {
        findings.push(format!(
            "No pair of numeric columns has |r| above {STRONG_CORRELATION}"
        ));
    }

    Ok(StepOutcome {
        summary: format!(
            "Found {} strong correlations across {} numeric columns",
            pairs.len(),
            numeric.len()
        ),
        findings,
        chart: Some(ChartDescriptor::new(
            ChartKind::Heatmap,
            "Correlation matrix",
            numeric,
        )),
    })
}

pub fn outliers_step(df: &DataFrame) -> Result<StepOutcome> {
    let numeric = numeric_columns(df);
    let mut findings = Vec::new();
    let mut flagged = Vec::new();
    for name in &numeric {
        let values = f64_values(df.column(name)?)?;
        if let Some(o) = iqr_outliers(name, &values)
            && o.count > 0
        {
            let pct = o.count as f64 / df.height().max(1) as f64 * 100.0;
            findings.push(format!(
                "{}: {} outliers ({pct:.1}%) outside [{:.2}, {:.2}]",
                o.column, o.count, o.lower_fence, o.upper_fence
            ));
            flagged.push(o.column);
        }
    }
    if findings.is_empty() {
        findings.push("No values fall outside 1.5 x IQR fences".to_owned());
    }

    Ok(StepOutcome {
        summary: format!(
            "{} of {} numeric columns contain IQR outliers",
            flagged.len(),
            numeric.len()
        ),
        findings,
        chart: (!numeric.is_empty()).then(|| {
            ChartDescriptor::new(ChartKind::BoxPlot, "Outlier box plots", numeric)
        }),
    })
}

pub fn distributions_step(df: &DataFrame) -> Result<StepOutcome> {
    let numeric = numeric_columns(df);
    let mut findings = Vec::new();
    let mut skewed = 0;
    for name in &numeric {
        let summary = numeric_summary(name, &f64_values(df.column(name)?)?);
        let shape = match summary.skew {
            Some(s) if s > 1.0 => {
                skewed += 1;
                "right-skewed"
            }
            Some(s) if s < -1.0 => {
                skewed += 1;
                "left-skewed"
            }
            Some(_) => "roughly symmetric",
            None => "constant or empty",
        };
        findings.push(format!(
            "{name}: mean {:.2}, std {:.2}, {shape}",
            summary.mean.unwrap_or(f64::NAN),
            summary.std_dev.unwrap_or(f64::NAN)
        ));
    }

    Ok(StepOutcome {
        summary: format!(
            "Distribution shapes for {} numeric columns; {skewed} strongly skewed",
            numeric.len()
        ),
        findings,
        chart: (!numeric.is_empty()).then(|| {
            ChartDescriptor::new(ChartKind::Histogram, "Distributions", numeric)
        }),
    })
}

pub fn trends_step(df: &DataFrame) -> Result<StepOutcome> {
    let Some(time_col) = temporal_columns(df).into_iter().next() else {
        return Ok(StepOutcome {
            summary: "No date or datetime column available for trend analysis".to_owned(),
            findings: vec!["Add a timestamp column to enable trend analysis".to_owned()],
            chart: None,
        });
    };

    let sorted = df.sort([time_col.as_str()], SortMultipleOptions::default())?;
    let half = sorted.height() / 2;
    let numeric = numeric_columns(&sorted);
    let mut findings = Vec::new();

    for name in &numeric {
        let values = f64_values(sorted.column(name)?)?;
        let first = values.slice(0, half).mean();
        let second = values.slice(half as i64, values.len() - half).mean();
        if let (Some(a), Some(b)) = (first, second)
            && a != 0.0
        {
            let change = (b - a) / a.abs() * 100.0;
            let direction = if change > TREND_THRESHOLD_PCT {
                "upward"
            } else if change < -TREND_THRESHOLD_PCT {
                "downward"
            } else {
                "flat"
            };
            findings.push(format!("{name}: {direction} ({change:+.1}% second half vs first)"));
        }
    }

    let mut columns = vec![time_col.clone()];
    columns.extend(numeric);
    Ok(StepOutcome {
        summary: format!("Trends over '{time_col}' for {} numeric columns", columns.len() - 1),
        findings,
        chart: Some(ChartDescriptor::new(ChartKind::LineChart, "Trends over time", columns)),
    })
}

pub fn segments_step(df: &DataFrame) -> Result<StepOutcome> {
    let mut findings = Vec::new();
    let mut segment_cols = Vec::new();
    for name in categorical_columns(df) {
        let summary = categorical_summary(&name, df.column(&name)?)?;
        if (2..20).contains(&summary.unique_count) {
            let top: Vec<String> = summary
                .top_values
                .iter()
                .map(|(label, count)| format!("{label} ({count})"))
                .collect();
            findings.push(format!(
                "{name}: {} segments, top {}",
                summary.unique_count,
                top.join(", ")
            ));
            segment_cols.push(name);
        }
    }

    let kpis: Vec<String> = df
        .get_column_names()
        .iter()
        .filter(|name| {
            let lowered = name.to_lowercase();
            KPI_KEYWORDS.iter().any(|k| lowered.contains(k))
        })
        .map(|name| name.to_string())
        .collect();
    if !kpis.is_empty() {
        findings.push(format!("Potential KPIs to compare across segments: {}", kpis.join(", ")));
    }

    Ok(StepOutcome {
        summary: format!("Found {} potential segmentation variables", segment_cols.len()),
        findings,
        chart: (!segment_cols.is_empty()).then(|| {
            ChartDescriptor::new(ChartKind::BarChart, "Segment sizes", segment_cols)
        }),
    })
}

pub fn ml_readiness_step(df: &DataFrame) -> Result<StepOutcome> {
    let numeric = numeric_columns(df).len();
    let categorical = categorical_columns(df).len();

    let mut tests = Vec::new();
    if numeric >= 2 {
        tests.push("Correlation significance testing");
    }
    if categorical >= 1 && numeric >= 1 {
        tests.push("Group comparison tests (t-test/ANOVA)");
    }
    if categorical >= 2 {
        tests.push("Chi-square independence tests");
    }

    let mut opportunities = Vec::new();
    if numeric >= 2 {
        opportunities.push("Regression modeling for prediction");
    }
    if categorical >= 1 {
        opportunities.push("Classification modeling");
    }
    if df.height() > 1000 {
        opportunities.push("Clustering for segmentation");
        opportunities.push("Anomaly detection");
    }

    let missing: usize = df.get_columns().iter().map(Column::null_count).sum();
    let mut findings: Vec<String> = tests
        .iter()
        .map(|t| format!("Statistical test: {t}"))
        .chain(opportunities.iter().map(|o| format!("ML opportunity: {o}")))
        .collect();
    if missing > 0 {
        findings.push(format!("{missing} missing cells need imputation before modeling"));
    }

    Ok(StepOutcome {
        summary: format!(
            "{} statistical tests and {} ML opportunities identified",
            tests.len(),
            opportunities.len()
        ),
        findings,
        chart: None,
    })
}

pub fn data_quality_step(df: &DataFrame) -> Result<StepOutcome> {
    let rows = df.height();
    let mut findings = Vec::new();
    let mut flagged = Vec::new();

    for column in df.get_columns() {
        let name = column.name().to_string();
        let null_pct = if rows == 0 {
            0.0
        } else {
            column.null_count() as f64 / rows as f64 * 100.0
        };
        if null_pct > HIGH_MISSING_PCT {
            findings.push(format!("{name}: {null_pct:.1}% missing"));
            flagged.push(name);
        } else if rows > 1 && column.as_materialized_series().n_unique()? == 1 {
            findings.push(format!("{name}: constant column"));
            flagged.push(name);
        }
    }

    let total_cells = rows * df.width();
    let missing: usize = df.get_columns().iter().map(Column::null_count).sum();
    let score = if total_cells == 0 {
        10.0
    } else {
        ((1.0 - missing as f64 / total_cells as f64) * 100.0).round() / 10.0
    };
    if findings.is_empty() {
        findings.push("Good data quality: minimal missing values".to_owned());
    }

    Ok(StepOutcome {
        summary: format!(
            "Quality score {score:.1}/10; {} columns need attention",
            flagged.len()
        ),
        findings,
        chart: (missing > 0).then(|| {
            ChartDescriptor::new(
                ChartKind::MissingValueMatrix,
                "Missing values",
                df.get_column_names().iter().map(|n| n.to_string()).collect(),
            )
        }),
    })
}

/// Closing synthesis over what earlier steps found.
pub fn insights_step(df: &DataFrame, earlier: &[String]) -> StepOutcome {
    let rows = df.height();
    let missing: usize = df.get_columns().iter().map(Column::null_count).sum();
    let quality = if (missing as f64) < rows as f64 * 0.05 {
        "good"
    } else {
        "needs attention"
    };

    let mut findings = vec![
        format!("Dataset contains {rows} records across {} variables", df.width()),
        format!("Data quality is {quality}"),
    ];
    findings.extend(earlier.iter().map(|s| format!("Earlier: {s}")));
    findings.push("Recommendation: implement regular data quality monitoring".to_owned());
    findings.push(format!(
        "Recommendation: keep the optimized layout (currently {:.1} MB in memory)",
        df.estimated_size() as f64 / (1024.0 * 1024.0)
    ));

    StepOutcome {
        summary: format!("Synthesised insights from {} earlier steps", earlier.len()),
        findings,
        chart: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skew_matches_symmetric_data() {
        assert_eq!(
            calculate_skew(Some(5.0), Some(5.0), Some(3.0), Some(7.0), Some(2.0)),
            Some(0.0)
        );
        assert_eq!(calculate_skew(Some(5.0), Some(5.0), None, None, Some(0.0)), None);
    }

    #[test]
    fn test_pearson_perfect_and_inverse() {
        let a = Float64Chunked::from_slice("a".into(), &[1.0, 2.0, 3.0]);
        let b = Float64Chunked::from_slice("b".into(), &[2.0, 4.0, 6.0]);
        let c = Float64Chunked::from_slice("c".into(), &[3.0, 2.0, 1.0]);
        assert!((pearson(&a, &b).unwrap_or_default() - 1.0).abs() < 1e-12);
        assert!((pearson(&a, &c).unwrap_or_default() + 1.0).abs() < 1e-12);

        let flat = Float64Chunked::from_slice("f".into(), &[1.0, 1.0, 1.0]);
        assert_eq!(pearson(&a, &flat), None);
    }

    #[test]
    fn test_explore_report() -> Result<()> {
        let df = df!(
            "x" => &[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 100.0],
            "y" => &[2.0f64, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 200.0],
            "region" => &["n", "s", "n", "n", "s", "e", "n", "s"]
        )?;
        let report = explore(&df)?;
        assert_eq!(report.numeric.len(), 2);
        assert_eq!(report.strong_correlations.len(), 1);
        assert_eq!(report.strong_correlations[0].r, 1.0);

        let x_outliers = report.outliers.iter().find(|o| o.column == "x");
        assert_eq!(x_outliers.map(|o| o.count), Some(1));

        let region = &report.categorical[0];
        assert_eq!(region.unique_count, 3);
        assert_eq!(region.top_values[0], ("n".to_owned(), 4));
        assert_eq!(region.concentration_pct, 50.0);
        Ok(())
    }

    #[test]
    fn test_categorical_summary_reads_dictionary_columns() -> Result<()> {
        let column = Column::new("c".into(), &["a", "b", "a"])
            .cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;
        let summary = categorical_summary("c", &column)?;
        assert_eq!(summary.unique_count, 2);
        assert_eq!(summary.top_values[0], ("a".to_owned(), 2));
        Ok(())
    }

    #[test]
    fn test_correlation_step_needs_two_numeric_columns() -> Result<()> {
        let df = df!("x" => &[1i64, 2, 3], "label" => &["a", "b", "c"])?;
        let step = correlation_step(&df)?;
        assert!(step.chart.is_none());
        assert!(step.summary.contains("at least two"));
        Ok(())
    }

    #[test]
    fn test_trends_without_time_column() -> Result<()> {
        let df = df!("x" => &[1i64, 2, 3])?;
        let step = trends_step(&df)?;
        assert!(step.chart.is_none());
        Ok(())
    }

    #[test]
    fn test_trends_detect_growth() -> Result<()> {
        let days: Vec<i32> = (0..10).collect();
        let sales: Vec<f64> = (0..10).map(|i| 100.0 + f64::from(i) * 20.0).collect();
        let date = Column::new("day".into(), days).cast(&DataType::Date)?;
        let df = DataFrame::new(vec![date, Column::new("sales".into(), sales)])?;

        let step = trends_step(&df)?;
        assert!(step.findings.iter().any(|f| f.starts_with("sales: upward")));
        Ok(())
    }

    #[test]
    fn test_data_quality_flags_missing_and_constant() -> Result<()> {
        let df = df!(
            "sparse" => &[Some(1i64), None, None, Some(4)],
            "constant" => &[7i64, 7, 7, 7],
            "fine" => &[1i64, 2, 3, 4]
        )?;
        let step = data_quality_step(&df)?;
        assert!(step.findings.iter().any(|f| f.starts_with("sparse")));
        assert!(step.findings.iter().any(|f| f == "constant: constant column"));
        assert!(step.summary.contains("2 columns"));
        Ok(())
    }

    #[test]
    fn test_ml_readiness_opportunities() -> Result<()> {
        let df = df!(
            "a" => &[1.0f64, 2.0],
            "b" => &[3.0f64, 4.0],
            "c" => &["x", "y"]
        )?;
        let step = ml_readiness_step(&df)?;
        assert!(step.findings.iter().any(|f| f.contains("Regression")));
        assert!(step.findings.iter().any(|f| f.contains("Classification")));
        assert!(!step.findings.iter().any(|f| f.contains("Clustering")));
        Ok(())
    }

    #[test]
    fn test_segments_and_kpis() -> Result<()> {
        let df = df!(
            "region" => &["n", "s", "n", "s"],
            "revenue" => &[10.0f64, 20.0, 30.0, 40.0]
        )?;
        let step = segments_step(&df)?;
        assert!(step.summary.starts_with("Found 1"));
        assert!(step.findings.iter().any(|f| f.contains("revenue")));
        Ok(())
    }
}
