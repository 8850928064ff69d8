//! Combination export: occurrence counts of distinct
//! (municipality, school type, scores) rows written back to CSV.

use crate::data::{drop_missing, project, SchemaError};
use crate::stats::COUNT_COLUMN;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Distinct combinations of `columns` with their occurrence count.
///
/// Rows with a null in any key column are left out. Output is sorted by the
/// key columns, with the count as the trailing column.
pub fn combinations(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, ExportError> {
    let projected = project(df, columns)?;
    let complete = drop_missing(&projected, columns)?;

    let keys: Vec<Expr> = columns.iter().map(|name| col(*name)).collect();
    let grouped = complete
        .lazy()
        .group_by(keys.clone())
        .agg([len().alias(COUNT_COLUMN)])
        .sort_by_exprs(keys, SortMultipleOptions::default())
        .collect()?;
    Ok(grouped)
}

/// Write [`combinations`] of `columns` as comma-delimited CSV with a header.
/// Returns the number of combinations written.
pub fn export_combinations(
    df: &DataFrame,
    columns: &[&str],
    output: &Path,
) -> Result<usize, ExportError> {
    let mut grouped = combinations(df, columns)?;

    let mut file = File::create(output).map_err(|source| ExportError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut grouped)?;

    info!(
        path = %output.display(),
        combinations = grouped.height(),
        "Exported combinations"
    );
    Ok(grouped.height())
}
