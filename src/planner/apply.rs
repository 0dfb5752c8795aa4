//! Materializing a plan as an optimized view, and casting it back.

use super::{ByteWidth, OptimizationPlan, Representation};
use crate::dataset::{Table, fingerprint};
use crate::error::{Error, Result, ResultExt as _};
use polars::prelude::*;

fn int_dtype(width: ByteWidth, signed: bool) -> DataType {
    match (width, signed) {
        (ByteWidth::One, true) => DataType::Int8,
        (ByteWidth::Two, true) => DataType::Int16,
        (ByteWidth::Four, true) => DataType::Int32,
        (ByteWidth::Eight, true) => DataType::Int64,
        (ByteWidth::One, false) => DataType::UInt8,
        (ByteWidth::Two, false) => DataType::UInt16,
        (ByteWidth::Four, false) => DataType::UInt32,
        (ByteWidth::Eight, false) => DataType::UInt64,
    }
}

/// Storage type a representation is materialized as. `None` keeps the column.
///
/// Dictionary columns become polars categoricals, whose physical codes are
/// always 32-bit; the planned index width is the size estimate, not the
/// in-memory code width.
pub fn target_dtype(representation: &Representation) -> Option<DataType> {
    match representation {
        Representation::Int { width, signed } => Some(int_dtype(*width, *signed)),
        Representation::Float {
            width: ByteWidth::Four,
        } => Some(DataType::Float32),
        Representation::Float { .. } => Some(DataType::Float64),
        Representation::Dictionary { .. } => Some(DataType::Categorical(
            None,
            CategoricalOrdering::Physical,
        )),
        Representation::Keep { .. } => None,
    }
}

/// Apply a plan to a table, producing the optimized view.
///
/// Casts are strict: a value that does not fit its planned type is an error,
/// never a silent null. Columns the plan does not mention pass through.
pub fn apply_plan<T: Table + ?Sized>(table: &T, plan: &OptimizationPlan) -> Result<DataFrame> {
    let actual = fingerprint(table)?;
    if actual != plan.fingerprint {
        return Err(Error::ContextMismatch {
            expected: plan.fingerprint.clone(),
            actual,
        });
    }

    let mut columns = Vec::new();
    for name in table.column_names() {
        let column = table.column(&name)?;
        let target = plan
            .column(&name)
            .and_then(|p| target_dtype(&p.target_representation));

        let column = match target {
            Some(dtype) => column
                .as_materialized_series()
                .strict_cast(&dtype)
                .with_context(|| format!("Failed to cast '{name}' to {dtype}"))?
                .into_column(),
            None => column.clone(),
        };
        columns.push(column);
    }

    let view = DataFrame::new(columns).context("Failed to assemble optimized view")?;
    tracing::debug!(
        columns = view.width(),
        bytes = view.estimated_size(),
        "Optimized view materialized"
    );
    Ok(view)
}

/// Cast an optimized view back to the storage types of `original`.
pub fn restore<T: Table + ?Sized>(view: &DataFrame, original: &T) -> Result<DataFrame> {
    let mut columns = Vec::new();
    for name in original.column_names() {
        let dtype = original.column(&name)?.dtype().clone();
        let column = Table::column(view, &name)?;
        let restored = if column.dtype() == &dtype {
            column.clone()
        } else {
            column
                .as_materialized_series()
                .strict_cast(&dtype)
                .with_context(|| format!("Failed to restore '{name}' to {dtype}"))?
                .into_column()
        };
        columns.push(restored);
    }
    DataFrame::new(columns).context("Failed to assemble restored table")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{PlannerConfig, plan_optimization};
    use crate::profiler::{ProfilerConfig, profile};

    fn plan_for(df: &DataFrame) -> Result<OptimizationPlan> {
        let profile = profile(df, &ProfilerConfig::default())?;
        plan_optimization(&profile, &PlannerConfig::default())
    }

    #[test]
    fn test_view_uses_planned_types() -> Result<()> {
        let labels: Vec<&str> = (0..30).map(|i| ["red", "green", "blue"][i % 3]).collect();
        let ids: Vec<i64> = (0..30).collect();
        let df = df!("id" => ids, "colour" => labels)?;

        let view = apply_plan(&df, &plan_for(&df)?)?;
        assert_eq!(view.column("id")?.dtype(), &DataType::UInt8);
        assert!(matches!(
            view.column("colour")?.dtype(),
            DataType::Categorical(_, _)
        ));
        assert_eq!(view.height(), df.height());
        Ok(())
    }

    #[test]
    fn test_round_trip_is_exact_for_ints_and_labels() -> Result<()> {
        let labels: Vec<&str> = (0..40).map(|i| ["a", "bb", "ccc", "dddd"][i % 4]).collect();
        let df = df!(
            "small" => &[Some(1i64), None, Some(250), Some(7)].repeat(10),
            "neg" => (0..40).map(|i| i64::from(i) - 20).collect::<Vec<_>>(),
            "label" => labels
        )?;

        let view = apply_plan(&df, &plan_for(&df)?)?;
        let back = restore(&view, &df)?;
        assert!(back.equals_missing(&df));
        Ok(())
    }

    #[test]
    fn test_round_trip_floats_within_epsilon() -> Result<()> {
        let values: Vec<f64> = (0..100).map(|i| f64::from(i) * 0.37 + 0.001).collect();
        let df = df!("f" => values.clone())?;

        let plan = plan_for(&df)?;
        let view = apply_plan(&df, &plan)?;
        assert_eq!(view.column("f")?.dtype(), &DataType::Float32);

        let back = restore(&view, &df)?;
        let restored: Vec<f64> = back
            .column("f")?
            .as_materialized_series()
            .f64()?
            .into_no_null_iter()
            .collect();
        for (orig, got) in values.iter().zip(&restored) {
            let rel = if *orig == 0.0 {
                got.abs()
            } else {
                ((got - orig) / orig).abs()
            };
            assert!(rel < PlannerConfig::default().epsilon, "{orig} -> {got}");
        }
        Ok(())
    }

    #[test]
    fn test_mismatched_plan_is_rejected() -> Result<()> {
        let df = df!("a" => &[1i64, 2, 3])?;
        let other = df!("a" => &[1i64, 2, 3, 4])?;
        let err = apply_plan(&other, &plan_for(&df)?).unwrap_err();
        assert_eq!(err.kind(), "context_mismatch_error");
        Ok(())
    }
}
