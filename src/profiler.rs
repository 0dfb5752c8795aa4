//! Per-column statistics extraction.
//!
//! The profiler walks the table once per column and produces a
//! [`ColumnProfile`] for every column, in source order. It never mutates the
//! table. Numeric bounds come from a single pass; distinct counts are exact
//! up to [`ProfilerConfig::distinct_exact_threshold`] rows and come from a
//! [`HyperLogLog`] sketch above it.
//!
//! Profiling honours a cooperative deadline. When the deadline passes between
//! two columns the profile is returned early with `complete == false` and
//! only the columns finished so far.

pub mod cardinality;

use crate::cancel::CancellationFlag;
use crate::dataset::{Table, fingerprint};
use crate::error::{Error, Result, ResultExt as _};
use cardinality::HyperLogLog;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Row count at or above which distinct counts switch to the sketch.
    pub distinct_exact_threshold: usize,
    /// Non-null float values kept per column for the round-trip check.
    pub float_sample_size: usize,
    /// String columns whose distinct/total ratio is below this are
    /// categorical, the rest are free text.
    pub categorical_ratio: f64,
    /// Cooperative profiling budget in seconds.
    pub timeout_secs: u64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            distinct_exact_threshold: 1_000_000,
            float_sample_size: 10_000,
            categorical_ratio: 0.5,
            timeout_secs: 30,
        }
    }
}

impl ProfilerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.distinct_exact_threshold == 0 {
            return Err(Error::Validation(
                "profiler.distinct_exact_threshold must be positive".to_owned(),
            ));
        }
        if !(self.categorical_ratio > 0.0 && self.categorical_ratio <= 1.0) {
            return Err(Error::Validation(format!(
                "profiler.categorical_ratio must be in (0, 1], got {}",
                self.categorical_ratio
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Validation(
                "profiler.timeout_secs must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Integer,
    Float,
    Categorical,
    Datetime,
    Text,
    Boolean,
    Other,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Other => "other",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub semantic_type: SemanticType,
    /// Storage type of the source column, e.g. `i64` or `str`.
    pub dtype: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub distinct_count: usize,
    pub distinct_is_estimate: bool,
    pub null_count: usize,
    pub total_count: usize,
    /// Bytes per value; the rounded-up average label length for strings.
    pub current_byte_width: usize,
    pub avg_label_bytes: Option<f64>,
    /// Source column is already dictionary encoded.
    pub already_encoded: bool,
    #[serde(skip)]
    pub float_sample: Vec<f64>,
}

impl ColumnProfile {
    pub fn null_pct(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            (self.null_count as f64 / self.total_count as f64) * 100.0
        }
    }

    pub fn uniqueness_ratio(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.distinct_count as f64 / self.total_count as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySummary {
    pub total_missing: usize,
    pub missing_pct: f64,
    /// 0-10, one decimal.
    pub score: f64,
    pub rating: String,
}

impl QualitySummary {
    fn from_columns(columns: &[ColumnProfile], row_count: usize) -> Self {
        let total_cells = row_count * columns.len();
        let total_missing: usize = columns.iter().map(|c| c.null_count).sum();
        let missing_ratio = if total_cells == 0 {
            0.0
        } else {
            total_missing as f64 / total_cells as f64
        };
        let score = ((1.0 - missing_ratio) * 100.0).round() / 10.0;
        let rating = if score >= 9.0 {
            "Excellent"
        } else if score >= 7.0 {
            "Good"
        } else {
            "Needs Attention"
        };
        Self {
            total_missing,
            missing_pct: (missing_ratio * 10_000.0).round() / 100.0,
            score,
            rating: rating.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub fingerprint: String,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnProfile>,
    /// False when the deadline cut profiling short.
    pub complete: bool,
    pub quality: QualitySummary,
    pub elapsed_ms: u64,
}

impl DatasetProfile {
    /// Whether any figure in this profile is an estimate.
    pub fn is_approximate(&self) -> bool {
        !self.complete || self.columns.iter().any(|c| c.distinct_is_estimate)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Profile a table with the configured timeout.
pub fn profile<T: Table + ?Sized>(table: &T, config: &ProfilerConfig) -> Result<DatasetProfile> {
    profile_until(
        table,
        config,
        Instant::now() + config.timeout(),
        &CancellationFlag::new(),
    )
}

/// Profile a table, stopping early at `deadline` or on cancellation.
pub fn profile_until<T: Table + ?Sized>(
    table: &T,
    config: &ProfilerConfig,
    deadline: Instant,
    cancel: &CancellationFlag,
) -> Result<DatasetProfile> {
    let start = Instant::now();
    let row_count = table.row_count();
    let names = table.column_names();
    let fingerprint = fingerprint(table)?;

    let mut columns = Vec::with_capacity(names.len());
    let mut complete = true;

    for name in &names {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled(format!(
                "profiling stopped before column '{name}'"
            )));
        }
        if Instant::now() >= deadline {
            tracing::warn!(
                profiled = columns.len(),
                total = names.len(),
                "Profiling deadline reached, returning partial profile"
            );
            complete = false;
            break;
        }

        let column = table.column(name)?;
        if column.len() != row_count {
            return Err(Error::DataAccess(format!(
                "Column '{name}' has {} values but the table declares {row_count} rows",
                column.len()
            )));
        }

        let profile = profile_column(name, column, config)
            .with_context(|| format!("Profiling failed for column '{name}'"))?;
        tracing::debug!(
            column = %name,
            semantic_type = profile.semantic_type.as_str(),
            distinct = profile.distinct_count,
            nulls = profile.null_count,
            "Profiled column"
        );
        columns.push(profile);
    }

    let quality = QualitySummary::from_columns(&columns, row_count);
    Ok(DatasetProfile {
        fingerprint,
        row_count,
        column_count: names.len(),
        columns,
        complete,
        quality,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}

fn profile_column(name: &str, column: &Column, config: &ProfilerConfig) -> Result<ColumnProfile> {
    let dtype = column.dtype();
    let series = column.as_materialized_series();
    let total_count = series.len();
    let null_count = series.null_count();

    let mut profile = ColumnProfile {
        name: name.to_owned(),
        semantic_type: SemanticType::Other,
        dtype: dtype.to_string(),
        min: None,
        max: None,
        distinct_count: 0,
        distinct_is_estimate: false,
        null_count,
        total_count,
        current_byte_width: fixed_width(dtype).unwrap_or(0),
        avg_label_bytes: None,
        already_encoded: false,
        float_sample: Vec::new(),
    };

    if dtype.is_bool() {
        profile.semantic_type = SemanticType::Boolean;
        profile.current_byte_width = 1;
        profile.distinct_count = series.n_unique()?;
    } else if dtype.is_integer() || dtype.is_float() {
        profile.semantic_type = if dtype.is_integer() {
            SemanticType::Integer
        } else {
            SemanticType::Float
        };
        let sample_size = if dtype.is_float() {
            config.float_sample_size
        } else {
            0
        };
        let scan = scan_numeric(series, total_count >= config.distinct_exact_threshold, sample_size)?;
        profile.min = scan.min;
        profile.max = scan.max;
        profile.distinct_count = scan.distinct;
        profile.distinct_is_estimate = scan.estimated;
        profile.float_sample = scan.sample;
    } else if dtype.is_temporal() {
        profile.semantic_type = SemanticType::Datetime;
        let physical = series.to_physical_repr();
        let scan = scan_numeric(&physical, total_count >= config.distinct_exact_threshold, 0)?;
        profile.min = scan.min;
        profile.max = scan.max;
        profile.distinct_count = scan.distinct;
        profile.distinct_is_estimate = scan.estimated;
    } else if matches!(dtype, DataType::String) {
        let scan = scan_strings(series, total_count >= config.distinct_exact_threshold)?;
        profile.distinct_count = scan.distinct;
        profile.distinct_is_estimate = scan.estimated;
        profile.avg_label_bytes = scan.avg_bytes;
        profile.current_byte_width = scan.avg_bytes.map_or(0, |avg| avg.ceil() as usize);
        profile.semantic_type = if total_count > 0
            && (scan.distinct as f64 / total_count as f64) < config.categorical_ratio
        {
            SemanticType::Categorical
        } else {
            SemanticType::Text
        };
    } else if matches!(dtype, DataType::Categorical(_, _) | DataType::Enum(_, _)) {
        profile.semantic_type = SemanticType::Categorical;
        profile.already_encoded = true;
        profile.current_byte_width = 4;
        profile.distinct_count = series.n_unique()?;
    }

    Ok(profile)
}

struct NumericScan {
    min: Option<f64>,
    max: Option<f64>,
    distinct: usize,
    estimated: bool,
    sample: Vec<f64>,
}

fn scan_numeric(series: &Series, approximate: bool, sample_size: usize) -> Result<NumericScan> {
    let as_f64 = series.cast(&DataType::Float64)?;
    let ca = as_f64.f64()?;

    let mut min: Option<f64> = None;
    let mut max: Option<f64> = None;
    let mut sample = Vec::with_capacity(sample_size.min(ca.len()));
    let mut sketch = approximate.then(HyperLogLog::new);

    for value in ca.into_iter().flatten() {
        min = Some(min.map_or(value, |m| m.min(value)));
        max = Some(max.map_or(value, |m| m.max(value)));
        if sample.len() < sample_size {
            sample.push(value);
        }
        if let Some(sketch) = sketch.as_mut() {
            sketch.insert(&value.to_bits());
        }
    }

    let (distinct, estimated) = match sketch {
        Some(sketch) => (sketch.estimate(), true),
        None => (series.n_unique()?, false),
    };

    Ok(NumericScan {
        min,
        max,
        distinct,
        estimated,
        sample,
    })
}

struct StringScan {
    distinct: usize,
    estimated: bool,
    avg_bytes: Option<f64>,
}

fn scan_strings(series: &Series, approximate: bool) -> Result<StringScan> {
    let ca = series.str()?;
    let mut total_bytes = 0usize;
    let mut non_null = 0usize;
    let mut exact: HashSet<&str> = HashSet::new();
    let mut sketch = HyperLogLog::new();

    for value in ca.into_iter().flatten() {
        total_bytes += value.len();
        non_null += 1;
        if approximate {
            sketch.insert(value);
        } else {
            exact.insert(value);
        }
    }

    let (distinct, estimated) = if approximate {
        (sketch.estimate(), true)
    } else {
        (exact.len(), false)
    };

    Ok(StringScan {
        distinct,
        estimated,
        avg_bytes: (non_null > 0).then(|| total_bytes as f64 / non_null as f64),
    })
}

/// Bytes per value for fixed-width storage types.
pub fn fixed_width(dtype: &DataType) -> Option<usize> {
    match dtype {
        DataType::Boolean | DataType::Int8 | DataType::UInt8 => Some(1),
        DataType::Int16 | DataType::UInt16 => Some(2),
        DataType::Int32 | DataType::UInt32 | DataType::Float32 | DataType::Date => Some(4),
        DataType::Int64
        | DataType::UInt64
        | DataType::Float64
        | DataType::Datetime(_, _)
        | DataType::Duration(_)
        | DataType::Time => Some(8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_preserves_column_order() -> Result<()> {
        let df = df!(
            "zeta" => &[1i64, 2, 3],
            "alpha" => &["a", "b", "c"],
            "mid" => &[1.5f64, 2.5, 3.5]
        )?;
        let profile = profile(&df, &ProfilerConfig::default())?;
        let names: Vec<_> = profile.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(profile.complete);
        Ok(())
    }

    #[test]
    fn test_integer_bounds_and_nulls() -> Result<()> {
        let df = df!("n" => &[Some(-5i64), None, Some(300), Some(7)])?;
        let profile = profile(&df, &ProfilerConfig::default())?;
        let col = &profile.columns[0];
        assert_eq!(col.semantic_type, SemanticType::Integer);
        assert_eq!(col.min, Some(-5.0));
        assert_eq!(col.max, Some(300.0));
        assert_eq!(col.null_count, 1);
        assert_eq!(col.total_count, 4);
        assert_eq!(col.current_byte_width, 8);
        Ok(())
    }

    #[test]
    fn test_string_classification() -> Result<()> {
        let regions: Vec<&str> = (0..100)
            .map(|i| ["north", "south"][i % 2])
            .collect();
        let ids: Vec<String> = (0..100).map(|i| format!("id-{i}")).collect();
        let df = df!("region" => regions, "id" => ids)?;

        let profile = profile(&df, &ProfilerConfig::default())?;
        let region = profile.column("region").expect("region profiled");
        assert_eq!(region.semantic_type, SemanticType::Categorical);
        assert_eq!(region.distinct_count, 2);
        assert_eq!(region.avg_label_bytes, Some(5.0));
        assert!(!region.distinct_is_estimate);

        let id = profile.column("id").expect("id profiled");
        assert_eq!(id.semantic_type, SemanticType::Text);
        assert_eq!(id.distinct_count, 100);
        Ok(())
    }

    #[test]
    fn test_large_columns_use_sketch() -> Result<()> {
        let values: Vec<String> = (0..5_000).map(|i| format!("v{}", i % 1_000)).collect();
        let df = df!("v" => values)?;
        let config = ProfilerConfig {
            distinct_exact_threshold: 1_000,
            ..Default::default()
        };
        let profile = profile(&df, &config)?;
        let col = &profile.columns[0];
        assert!(col.distinct_is_estimate);
        assert!(profile.is_approximate());
        let rel = (col.distinct_count as f64 - 1_000.0).abs() / 1_000.0;
        assert!(rel < 4.0 * cardinality::RELATIVE_ERROR);
        Ok(())
    }

    #[test]
    fn test_float_sample_is_bounded() -> Result<()> {
        let values: Vec<f64> = (0..50).map(f64::from).collect();
        let df = df!("f" => values)?;
        let config = ProfilerConfig {
            float_sample_size: 10,
            ..Default::default()
        };
        let profile = profile(&df, &config)?;
        assert_eq!(profile.columns[0].float_sample.len(), 10);
        Ok(())
    }

    #[test]
    fn test_expired_deadline_yields_incomplete_profile() -> Result<()> {
        let df = df!("a" => &[1i64, 2], "b" => &[3i64, 4])?;
        let profile = profile_until(
            &df,
            &ProfilerConfig::default(),
            Instant::now(),
            &CancellationFlag::new(),
        )?;
        assert!(!profile.complete);
        assert!(profile.columns.is_empty());
        assert_eq!(profile.column_count, 2);
        assert!(profile.is_approximate());
        Ok(())
    }

    #[test]
    fn test_cancelled_profile_fails() -> Result<()> {
        let df = df!("a" => &[1i64, 2])?;
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let err = profile_until(
            &df,
            &ProfilerConfig::default(),
            Instant::now() + Duration::from_secs(30),
            &cancel,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "cancelled");
        Ok(())
    }

    struct RaggedTable {
        columns: Vec<Column>,
        rows: usize,
    }

    impl Table for RaggedTable {
        fn column_names(&self) -> Vec<String> {
            self.columns.iter().map(|c| c.name().to_string()).collect()
        }

        fn row_count(&self) -> usize {
            self.rows
        }

        fn column(&self, name: &str) -> Result<&Column> {
            self.columns
                .iter()
                .find(|c| c.name().as_str() == name)
                .ok_or_else(|| Error::DataAccess(format!("no column {name}")))
        }
    }

    #[test]
    fn test_length_mismatch_is_data_access_error() {
        let table = RaggedTable {
            columns: vec![
                Column::new("a".into(), &[1i64, 2, 3]),
                Column::new("b".into(), &[1i64, 2]),
            ],
            rows: 3,
        };
        let err = profile(&table, &ProfilerConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "data_access_error");
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_quality_summary() -> Result<()> {
        let df = df!(
            "a" => &[Some(1i64), None, Some(3), Some(4)],
            "b" => &[Some(1i64), Some(2), Some(3), Some(4)]
        )?;
        let profile = profile(&df, &ProfilerConfig::default())?;
        assert_eq!(profile.quality.total_missing, 1);
        assert_eq!(profile.quality.missing_pct, 12.5);
        assert_eq!(profile.quality.score, 8.8);
        assert_eq!(profile.quality.rating, "Good");
        Ok(())
    }
}
