//! Table access, fingerprinting and loading.
//!
//! The engine reads tables through the [`Table`] trait so profiling never
//! depends on where the data came from. A polars [`DataFrame`] implements it
//! directly; loading files into one is a thin adapter ([`load_df`]) kept here
//! so the CLI can drive the engine end to end.

use crate::error::{Error, Result, ResultExt as _};
use polars::prelude::*;
use sha2::{Digest as _, Sha256};
use std::path::Path;

/// Read-only access to an in-memory table.
pub trait Table {
    /// Column names in source order.
    fn column_names(&self) -> Vec<String>;

    /// Declared number of rows.
    fn row_count(&self) -> usize;

    /// Typed accessor for a single column.
    fn column(&self, name: &str) -> Result<&Column>;
}

impl Table for DataFrame {
    fn column_names(&self) -> Vec<String> {
        self.get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    fn row_count(&self) -> usize {
        self.height()
    }

    fn column(&self, name: &str) -> Result<&Column> {
        Self::column(self, name).map_err(|e| Error::DataAccess(e.to_string()))
    }
}

/// Stable identifier of a table: SHA-256 over the ordered schema
/// (`name:dtype` pairs) and the row count, hex encoded.
pub fn fingerprint<T: Table + ?Sized>(table: &T) -> Result<String> {
    let mut hasher = Sha256::new();
    for name in table.column_names() {
        let column = table.column(&name)?;
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(column.dtype().to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(table.row_count().to_le_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Gather the columns of any [`Table`] into an owned `DataFrame`.
pub fn to_frame<T: Table + ?Sized>(table: &T) -> Result<DataFrame> {
    let columns = table
        .column_names()
        .iter()
        .map(|name| table.column(name).cloned())
        .collect::<Result<Vec<_>>>()?;
    DataFrame::new(columns).context("Failed to assemble table")
}

/// Load a CSV, Parquet or JSON file into memory.
pub fn load_df(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(Error::DataAccess(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let df = match ext.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10_000))
            .with_has_header(true)
            .with_try_parse_dates(true)
            .finish()?
            .collect()
            .context("Failed to read CSV")?,
        "parquet" => ParquetReader::new(std::fs::File::open(path)?)
            .finish()
            .context("Failed to read Parquet")?,
        "json" => JsonReader::new(std::fs::File::open(path)?)
            .finish()
            .context("Failed to read JSON")?,
        _ => {
            return Err(Error::DataAccess(format!(
                "Unsupported file extension: {ext}"
            )));
        }
    };

    tracing::info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Loaded dataset"
    );
    Ok(df)
}
