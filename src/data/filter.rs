//! Row and column filtering for the microdata table.

use super::{MUNICIPALITY_COLUMN, SCHOOL_TYPE_COLUMN, SCORE_COLUMNS, SELECTED_COLUMNS};
use polars::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Column '{0}' not found in table")]
    MissingColumn(String),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Maps school-type codes to readable labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolTypeMapping {
    labels: BTreeMap<i64, String>,
}

impl Default for SchoolTypeMapping {
    fn default() -> Self {
        Self::new([
            (1, "did not respond"),
            (2, "public"),
            (3, "private"),
        ])
    }
}

impl SchoolTypeMapping {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (i64, &'a str)>) -> Self {
        Self {
            labels: pairs
                .into_iter()
                .map(|(code, label)| (code, label.to_string()))
                .collect(),
        }
    }

    /// Label for a code in its textual form, if the code is mapped.
    ///
    /// Integral floats ("2.0") count as their integer code, since the column
    /// is read as Float64 whenever it has gaps or decimals.
    pub fn label(&self, code: &str) -> Option<&str> {
        let code = code.trim();
        let code = match code.parse::<i64>() {
            Ok(code) => code,
            Err(_) => {
                let value = code.parse::<f64>().ok()?;
                if value.fract() != 0.0 || !value.is_finite() {
                    return None;
                }
                value as i64
            }
        };
        self.labels.get(&code).map(String::as_str)
    }
}

fn require_column(df: &DataFrame, name: &str) -> Result<(), SchemaError> {
    if df.get_column_index(name).is_none() {
        return Err(SchemaError::MissingColumn(name.to_string()));
    }
    Ok(())
}

/// Keep exactly `columns`, in that order.
pub fn project(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, SchemaError> {
    for name in columns {
        require_column(df, name)?;
    }
    Ok(df.select(columns.iter().copied())?)
}

/// Keep rows whose `column` equals `value` exactly.
pub fn restrict_to_municipality(
    df: &DataFrame,
    column: &str,
    value: &str,
) -> Result<DataFrame, SchemaError> {
    require_column(df, column)?;

    let filtered = df
        .clone()
        .lazy()
        .filter(col(column).eq(lit(value)))
        .collect()?;

    debug!(
        municipality = value,
        kept = filtered.height(),
        dropped = df.height() - filtered.height(),
        "Restricted to municipality"
    );
    Ok(filtered)
}

/// Listwise deletion: drop rows with a null in any of `columns`.
pub fn drop_missing(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, SchemaError> {
    for name in columns {
        require_column(df, name)?;
    }

    let Some(predicate) = columns
        .iter()
        .map(|name| col(*name).is_not_null())
        .reduce(|acc, expr| acc.and(expr))
    else {
        return Ok(df.clone());
    };

    let complete = df.clone().lazy().filter(predicate).collect()?;
    debug!(
        dropped = df.height() - complete.height(),
        "Dropped rows with missing scores"
    );
    Ok(complete)
}

/// Replace school-type codes with labels. Unmapped codes keep their text.
pub fn map_school_types(
    df: &DataFrame,
    column: &str,
    mapping: &SchoolTypeMapping,
) -> Result<DataFrame, SchemaError> {
    require_column(df, column)?;

    let codes = df.column(column)?.cast(&DataType::String)?;
    let labels: StringChunked = codes
        .str()?
        .into_iter()
        .map(|code| code.map(|c| mapping.label(c).unwrap_or(c)))
        .collect();

    let mut mapped = df.clone();
    mapped.with_column(labels.with_name(column.into()).into_series())?;
    Ok(mapped)
}

/// Cast the score columns to Float64 so integer-only files aggregate the same
/// way as files with fractional scores.
pub fn scores_as_float(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, SchemaError> {
    for name in columns {
        require_column(df, name)?;
    }
    let casts: Vec<Expr> = columns
        .iter()
        .map(|name| col(*name).cast(DataType::Float64))
        .collect();
    Ok(df.clone().lazy().with_columns(casts).collect()?)
}

/// Standard filter chain: project the analysis columns, keep one
/// municipality, drop incomplete score rows and label school types.
pub fn municipality_scores(
    df: &DataFrame,
    municipality: &str,
    mapping: &SchoolTypeMapping,
) -> Result<DataFrame, SchemaError> {
    let projected = project(df, &SELECTED_COLUMNS)?;
    let projected = scores_as_float(&projected, &SCORE_COLUMNS)?;
    let local = restrict_to_municipality(&projected, MUNICIPALITY_COLUMN, municipality)?;
    let complete = drop_missing(&local, &SCORE_COLUMNS)?;
    map_school_types(&complete, SCHOOL_TYPE_COLUMN, mapping)
}
