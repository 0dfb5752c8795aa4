//! Per-column representation planning.
//!
//! Given a [`DatasetProfile`], the planner picks the smallest representation
//! that still encodes every observed value, and estimates what that saves.
//! Planning is a pure function of the profile and the config: the same input
//! always produces the same [`OptimizationPlan`]. Anything the planner cannot
//! evaluate safely is reported as [`PlanOutcome::NoChange`].

pub mod apply;

pub use apply::{apply_plan, restore};

use crate::error::{Error, Result};
use crate::profiler::cardinality::RELATIVE_ERROR;
use crate::profiler::{ColumnProfile, DatasetProfile, SemanticType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// How far the planner is allowed to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    /// Integer and dictionary rules only; floats are left alone.
    Conservative,
    /// All rules; nullable integers widen by one rank.
    #[default]
    Production,
    /// All rules; nullable integers keep their narrow width.
    Aggressive,
}

impl OptimizationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Production => "production",
            Self::Aggressive => "aggressive",
        }
    }
}

impl FromStr for OptimizationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "production" => Ok(Self::Production),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(Error::Validation(format!(
                "Unknown optimization level '{other}' (expected conservative, production or aggressive)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Largest relative error tolerated by a float64 to float32 downcast.
    pub epsilon: f64,
    /// Dictionary encoding is considered below this distinct/total ratio.
    pub dictionary_ratio: f64,
    /// Fewest sampled floats needed before the round-trip check is trusted.
    pub min_float_sample: usize,
    pub level: OptimizationLevel,
    /// Storage price in currency units per GiB-month.
    pub cost_per_gb_month: f64,
    /// Number of stored copies.
    pub replication_factor: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            dictionary_ratio: 0.5,
            min_float_sample: 1,
            level: OptimizationLevel::Production,
            cost_per_gb_month: 0.023,
            replication_factor: 2.0,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epsilon.is_nan() || self.epsilon < 0.0 {
            return Err(Error::Validation(format!(
                "planner.epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }
        if !(self.dictionary_ratio > 0.0 && self.dictionary_ratio <= 1.0) {
            return Err(Error::Validation(format!(
                "planner.dictionary_ratio must be in (0, 1], got {}",
                self.dictionary_ratio
            )));
        }
        if self.min_float_sample == 0 {
            return Err(Error::Validation(
                "planner.min_float_sample must be at least 1".to_owned(),
            ));
        }
        if !(self.cost_per_gb_month >= 0.0) || !(self.replication_factor >= 0.0) {
            return Err(Error::Validation(
                "planner cost factors must be non-negative".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Fixed storage widths, ordered by rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ByteWidth {
    One,
    Two,
    Four,
    Eight,
}

impl ByteWidth {
    pub fn bytes(&self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            8 => Some(Self::Eight),
            _ => None,
        }
    }

    /// The next wider width, saturating at eight bytes.
    pub fn next_rank(&self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::Four,
            Self::Four | Self::Eight => Self::Eight,
        }
    }

    /// Smallest width whose unsigned range holds `max`.
    fn unsigned_for(max: f64) -> Self {
        if max <= f64::from(u8::MAX) {
            Self::One
        } else if max <= f64::from(u16::MAX) {
            Self::Two
        } else if max <= f64::from(u32::MAX) {
            Self::Four
        } else {
            Self::Eight
        }
    }

    /// Smallest width whose signed range holds `[min, max]`.
    fn signed_for(min: f64, max: f64) -> Self {
        let fits = |lo: f64, hi: f64| min >= lo && max <= hi;
        if fits(f64::from(i8::MIN), f64::from(i8::MAX)) {
            Self::One
        } else if fits(f64::from(i16::MIN), f64::from(i16::MAX)) {
            Self::Two
        } else if fits(f64::from(i32::MIN), f64::from(i32::MAX)) {
            Self::Four
        } else {
            Self::Eight
        }
    }

    /// Smallest unsigned index width that can address `codes` distinct codes.
    fn index_for(codes: usize) -> Self {
        if codes <= 1 << 8 {
            Self::One
        } else if codes <= 1 << 16 {
            Self::Two
        } else if codes as u64 <= 1u64 << 32 {
            Self::Four
        } else {
            Self::Eight
        }
    }
}

/// Recommended storage for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Representation {
    Int { width: ByteWidth, signed: bool },
    Float { width: ByteWidth },
    Dictionary { index_width: ByteWidth },
    /// Leave the column in its source type.
    Keep { dtype: String },
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int { width, signed } => {
                let prefix = if *signed { "int" } else { "uint" };
                write!(f, "{prefix}{}", width.bytes() * 8)
            }
            Self::Float { width } => write!(f, "float{}", width.bytes() * 8),
            Self::Dictionary { index_width } => {
                write!(f, "dictionary<uint{}>", index_width.bytes() * 8)
            }
            Self::Keep { dtype } => write!(f, "{dtype}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOutcome {
    Downcast,
    Dictionary,
    NotSafelyReducible,
    NoChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPlan {
    pub column: String,
    pub semantic_type: SemanticType,
    pub target_representation: Representation,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub outcome: PlanOutcome,
    pub note: Option<String>,
    /// The target relies on a validity bitmap for nulls.
    pub nullable: bool,
    /// Sizes were derived from an estimated distinct count.
    pub approximate: bool,
}

impl ColumnPlan {
    fn keep(profile: &ColumnProfile, bytes: u64, outcome: PlanOutcome, note: impl Into<String>) -> Self {
        Self {
            column: profile.name.clone(),
            semantic_type: profile.semantic_type,
            target_representation: Representation::Keep {
                dtype: profile.dtype.clone(),
            },
            bytes_before: bytes,
            bytes_after: bytes,
            outcome,
            note: Some(note.into()),
            nullable: profile.null_count > 0,
            approximate: false,
        }
    }

    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationPlan {
    pub fingerprint: String,
    pub level: OptimizationLevel,
    pub columns: Vec<ColumnPlan>,
    pub total_bytes_before: u64,
    pub total_bytes_after: u64,
    /// In `[0, 100]`.
    pub percent_reduction: f64,
    /// Positive when the plan saves money.
    pub monthly_cost_delta: f64,
    pub approximate: bool,
}

impl OptimizationPlan {
    pub fn column(&self, name: &str) -> Option<&ColumnPlan> {
        self.columns.iter().find(|c| c.column == name)
    }

    pub fn bytes_saved(&self) -> u64 {
        self.total_bytes_before.saturating_sub(self.total_bytes_after)
    }

    pub fn changed_columns(&self) -> impl Iterator<Item = &ColumnPlan> {
        self.columns
            .iter()
            .filter(|c| matches!(c.outcome, PlanOutcome::Downcast | PlanOutcome::Dictionary))
    }

    pub fn summary(&self) -> String {
        format!(
            "{} of {} columns can shrink; {:.1}% smaller ({} -> {} bytes){}",
            self.changed_columns().count(),
            self.columns.len(),
            self.percent_reduction,
            self.total_bytes_before,
            self.total_bytes_after,
            if self.approximate { " (approximate)" } else { "" }
        )
    }
}

/// Build an optimization plan from a profile.
pub fn plan_optimization(profile: &DatasetProfile, config: &PlannerConfig) -> Result<OptimizationPlan> {
    config.validate()?;

    let columns: Vec<ColumnPlan> = profile
        .columns
        .iter()
        .map(|column| plan_column(column, config))
        .collect();

    let total_bytes_before: u64 = columns.iter().map(|c| c.bytes_before).sum();
    let total_bytes_after: u64 = columns.iter().map(|c| c.bytes_after).sum();
    let saved = total_bytes_before.saturating_sub(total_bytes_after);

    let percent_reduction = if total_bytes_before == 0 {
        0.0
    } else {
        (saved as f64 / total_bytes_before as f64 * 100.0).clamp(0.0, 100.0)
    };
    let monthly_cost_delta =
        saved as f64 / GIB * config.cost_per_gb_month * config.replication_factor;

    let approximate = !profile.complete || columns.iter().any(|c| c.approximate);

    tracing::info!(
        level = config.level.as_str(),
        columns = columns.len(),
        total_bytes_before,
        total_bytes_after,
        percent_reduction,
        approximate,
        "Optimization plan computed"
    );

    Ok(OptimizationPlan {
        fingerprint: profile.fingerprint.clone(),
        level: config.level,
        columns,
        total_bytes_before,
        total_bytes_after,
        percent_reduction,
        monthly_cost_delta,
        approximate,
    })
}

/// Decide the representation of a single column.
pub fn plan_column(profile: &ColumnProfile, config: &PlannerConfig) -> ColumnPlan {
    let plan = match profile.semantic_type {
        SemanticType::Integer => plan_integer(profile, config),
        SemanticType::Float => plan_float(profile, config),
        SemanticType::Categorical | SemanticType::Text => plan_strings(profile, config),
        SemanticType::Datetime | SemanticType::Boolean | SemanticType::Other => ColumnPlan::keep(
            profile,
            fixed_bytes(profile),
            PlanOutcome::NoChange,
            format!("{} columns are kept as-is", profile.semantic_type.as_str()),
        ),
    };
    tracing::debug!(
        column = %plan.column,
        target = %plan.target_representation,
        outcome = ?plan.outcome,
        bytes_before = plan.bytes_before,
        bytes_after = plan.bytes_after,
        "Planned column"
    );
    plan
}

fn fixed_bytes(profile: &ColumnProfile) -> u64 {
    (profile.total_count * profile.current_byte_width) as u64
}

fn plan_integer(profile: &ColumnProfile, config: &PlannerConfig) -> ColumnPlan {
    let before = fixed_bytes(profile);
    let (Some(min), Some(max)) = (profile.min, profile.max) else {
        return ColumnPlan::keep(profile, before, PlanOutcome::NoChange, "no non-null values");
    };
    let Some(current) = ByteWidth::from_bytes(profile.current_byte_width) else {
        return ColumnPlan::keep(profile, before, PlanOutcome::NoChange, "unknown source width");
    };

    let signed = min < 0.0;
    let mut width = if signed {
        ByteWidth::signed_for(min, max)
    } else {
        ByteWidth::unsigned_for(max)
    };

    let has_nulls = profile.null_count > 0;
    let mut note = None;
    if has_nulls && config.level != OptimizationLevel::Aggressive {
        width = width.next_rank();
        note = Some(format!(
            "widened to {} bytes to leave room for {} nulls",
            width.bytes(),
            profile.null_count
        ));
    }

    let source_signed = !profile.dtype.starts_with('u');
    if width > current || (width == current && (signed || !source_signed)) {
        return ColumnPlan::keep(
            profile,
            before,
            PlanOutcome::NoChange,
            "already at the smallest covering width",
        );
    }
    if width == current {
        // Non-negative values in a signed column: same size, unsigned type.
        return ColumnPlan {
            column: profile.name.clone(),
            semantic_type: profile.semantic_type,
            target_representation: Representation::Int { width, signed: false },
            bytes_before: before,
            bytes_after: before,
            outcome: PlanOutcome::Downcast,
            note: Some(note.unwrap_or_else(|| "non-negative values stored unsigned".to_owned())),
            nullable: has_nulls,
            approximate: false,
        };
    }

    ColumnPlan {
        column: profile.name.clone(),
        semantic_type: profile.semantic_type,
        target_representation: Representation::Int { width, signed },
        bytes_before: before,
        bytes_after: (profile.total_count * width.bytes()) as u64,
        outcome: PlanOutcome::Downcast,
        note,
        nullable: has_nulls,
        approximate: false,
    }
}

fn plan_float(profile: &ColumnProfile, config: &PlannerConfig) -> ColumnPlan {
    let before = fixed_bytes(profile);
    if config.level == OptimizationLevel::Conservative {
        return ColumnPlan::keep(
            profile,
            before,
            PlanOutcome::NoChange,
            "floats are left untouched at the conservative level",
        );
    }
    if profile.current_byte_width <= 4 {
        return ColumnPlan::keep(profile, before, PlanOutcome::NoChange, "already float32");
    }
    // The sample only covers a prefix; the range covers every value.
    let out_of_range = [profile.min, profile.max]
        .into_iter()
        .flatten()
        .any(|v| v.abs() > f64::from(f32::MAX));
    if out_of_range {
        tracing::warn!(
            column = %profile.name,
            min = ?profile.min,
            max = ?profile.max,
            "Float column exceeds the float32 range"
        );
        return ColumnPlan::keep(
            profile,
            before,
            PlanOutcome::NotSafelyReducible,
            "values exceed the float32 range",
        );
    }
    if profile.float_sample.is_empty() || profile.float_sample.len() < config.min_float_sample {
        return ColumnPlan::keep(
            profile,
            before,
            PlanOutcome::NoChange,
            format!(
                "sample of {} values is too small to evaluate",
                profile.float_sample.len()
            ),
        );
    }

    let max_error = profile
        .float_sample
        .iter()
        .map(|&v| f32_round_trip_error(v))
        .fold(0.0_f64, f64::max);

    if max_error == 0.0 || max_error < config.epsilon {
        ColumnPlan {
            column: profile.name.clone(),
            semantic_type: profile.semantic_type,
            target_representation: Representation::Float {
                width: ByteWidth::Four,
            },
            bytes_before: before,
            bytes_after: (profile.total_count * 4) as u64,
            outcome: PlanOutcome::Downcast,
            note: Some(format!("max relative round-trip error {max_error:.3e}")),
            nullable: profile.null_count > 0,
            approximate: false,
        }
    } else {
        tracing::warn!(
            column = %profile.name,
            max_error,
            epsilon = config.epsilon,
            "Float column is not safely reducible"
        );
        ColumnPlan::keep(
            profile,
            before,
            PlanOutcome::NotSafelyReducible,
            format!(
                "float32 round-trip error {max_error:.3e} exceeds epsilon {:.3e}",
                config.epsilon
            ),
        )
    }
}

/// Relative error of storing `v` as float32 and reading it back.
fn f32_round_trip_error(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    let back = f64::from(v as f32);
    if v.is_infinite() {
        return if back == v { 0.0 } else { f64::INFINITY };
    }
    if back.is_infinite() {
        return f64::INFINITY;
    }
    if v == 0.0 {
        back.abs()
    } else {
        ((back - v) / v).abs()
    }
}

fn plan_strings(profile: &ColumnProfile, config: &PlannerConfig) -> ColumnPlan {
    let avg = profile.avg_label_bytes.unwrap_or(0.0);
    let total = profile.total_count as f64;

    if profile.already_encoded {
        return ColumnPlan::keep(
            profile,
            fixed_bytes(profile),
            PlanOutcome::NoChange,
            "already dictionary encoded",
        );
    }

    let before = (total * avg).round() as u64;
    if profile.total_count == 0 || profile.avg_label_bytes.is_none() {
        return ColumnPlan::keep(profile, before, PlanOutcome::NoChange, "no non-null labels");
    }

    let ratio = profile.uniqueness_ratio();
    if ratio >= config.dictionary_ratio {
        return ColumnPlan::keep(
            profile,
            before,
            PlanOutcome::NoChange,
            format!(
                "distinct ratio {ratio:.3} is above the dictionary threshold {}",
                config.dictionary_ratio
            ),
        );
    }

    // Sketch estimates are pushed up by four standard errors so the index
    // width and dictionary size are never understated.
    let approximate = profile.distinct_is_estimate;
    let distinct = if approximate {
        (profile.distinct_count as f64 * (1.0 + 4.0 * RELATIVE_ERROR)).ceil() as usize
    } else {
        profile.distinct_count
    };

    let index_width = ByteWidth::index_for(distinct);
    let after = (distinct as f64 * avg + total * index_width.bytes() as f64).round() as u64;

    if after >= before {
        return ColumnPlan::keep(
            profile,
            before,
            PlanOutcome::NoChange,
            "dictionary would not be smaller",
        );
    }

    ColumnPlan {
        column: profile.name.clone(),
        semantic_type: profile.semantic_type,
        target_representation: Representation::Dictionary { index_width },
        bytes_before: before,
        bytes_after: after,
        outcome: PlanOutcome::Dictionary,
        note: approximate.then(|| format!("distinct count estimated at about {distinct}")),
        nullable: profile.null_count > 0,
        approximate,
    }
}
