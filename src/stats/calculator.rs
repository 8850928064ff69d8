//! Statistics Calculator Module
//! Group-by aggregation of exam scores and per-area descriptive statistics.

use crate::data::{LongRecord, SchemaError};
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use statrs::statistics::{Data, Distribution, Max, Median, Min, OrderStatistics};
use std::collections::HashMap;
use tracing::debug;

/// Name of the row-count column produced by the group-by.
pub const COUNT_COLUMN: &str = "count";

/// How group means are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeanMode {
    /// Arithmetic mean of the group.
    #[default]
    Plain,
    /// Group mean divided by the group's own row count.
    Normalized,
}

/// Row count and per-score means of one school-type group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub label: String,
    pub count: usize,
    /// `(score column, mean)` in score-column order.
    pub means: Vec<(String, f64)>,
}

impl GroupSummary {
    pub fn mean(&self, column: &str) -> Option<f64> {
        self.means
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| *value)
    }
}

/// Number of rows carrying a given label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentCount {
    pub label: String,
    pub count: usize,
}

/// Descriptive statistics for the values of one (label, area) cell.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaDistribution {
    pub label: String,
    pub area: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub q1: f64,
    pub q3: f64,
    pub min: f64,
    pub max: f64,
    /// Lowest value within 1.5 IQR below q1.
    pub whisker_low: f64,
    /// Highest value within 1.5 IQR above q3.
    pub whisker_high: f64,
}

fn require_column(df: &DataFrame, name: &str) -> Result<(), SchemaError> {
    if df.get_column_index(name).is_none() {
        return Err(SchemaError::MissingColumn(name.to_string()));
    }
    Ok(())
}

/// Group rows by `label_col` and average each score column.
///
/// Means skip null values. Rows with a null label form no group. Output is
/// sorted by label.
pub fn summarize(
    df: &DataFrame,
    label_col: &str,
    score_cols: &[&str],
    mode: MeanMode,
) -> Result<Vec<GroupSummary>, SchemaError> {
    require_column(df, label_col)?;
    for name in score_cols {
        require_column(df, name)?;
    }

    let mut aggs = vec![len().alias(COUNT_COLUMN)];
    aggs.extend(
        score_cols
            .iter()
            .map(|name| col(*name).cast(DataType::Float64).mean()),
    );

    let grouped = df
        .clone()
        .lazy()
        .with_column(col(label_col).cast(DataType::String))
        .filter(col(label_col).is_not_null())
        .group_by([col(label_col)])
        .agg(aggs)
        .collect()?;

    let labels = grouped.column(label_col)?.str()?.clone();
    let counts = grouped.column(COUNT_COLUMN)?.cast(&DataType::UInt64)?;
    let counts = counts.u64()?;
    let mean_columns = score_cols
        .iter()
        .map(|name| Ok(grouped.column(name)?.f64()?.clone()))
        .collect::<Result<Vec<Float64Chunked>, SchemaError>>()?;

    let mut summaries = Vec::with_capacity(grouped.height());
    for i in 0..grouped.height() {
        let (Some(label), Some(count)) = (labels.get(i), counts.get(i)) else {
            continue;
        };
        let count = count as usize;
        if count == 0 {
            continue;
        }

        let means = score_cols
            .iter()
            .zip(&mean_columns)
            .map(|(name, ca)| {
                let mean = ca.get(i).unwrap_or(f64::NAN);
                let mean = match mode {
                    MeanMode::Plain => mean,
                    MeanMode::Normalized => mean / count as f64,
                };
                (name.to_string(), mean)
            })
            .collect();

        summaries.push(GroupSummary {
            label: label.to_string(),
            count,
            means,
        });
    }

    summaries.sort_by(|a, b| a.label.cmp(&b.label));
    debug!(groups = summaries.len(), ?mode, "Summarized scores");
    Ok(summaries)
}

/// Count rows per label, sorted by label. Null labels are not counted.
pub fn count_by_label(df: &DataFrame, label_col: &str) -> Result<Vec<StudentCount>, SchemaError> {
    require_column(df, label_col)?;

    let grouped = df
        .clone()
        .lazy()
        .select([col(label_col).cast(DataType::String)])
        .filter(col(label_col).is_not_null())
        .group_by([col(label_col)])
        .agg([len().alias(COUNT_COLUMN)])
        .collect()?;

    let labels = grouped.column(label_col)?.str()?.clone();
    let counts = grouped.column(COUNT_COLUMN)?.cast(&DataType::UInt64)?;
    let counts = counts.u64()?;

    let mut result: Vec<StudentCount> = labels
        .into_iter()
        .zip(counts.into_iter())
        .filter_map(|(label, count)| {
            Some(StudentCount {
                label: label?.to_string(),
                count: count? as usize,
            })
        })
        .collect();
    result.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(result)
}

/// Divide every score by the number of rows sharing that row's label.
///
/// Per-row counterpart of [`MeanMode::Normalized`]; feeds the normalized
/// box plot.
pub fn normalize_rows_by_group_count(
    df: &DataFrame,
    label_col: &str,
    score_cols: &[&str],
) -> Result<DataFrame, SchemaError> {
    let counts: HashMap<String, usize> = count_by_label(df, label_col)?
        .into_iter()
        .map(|c| (c.label, c.count))
        .collect();

    let label_series = df.column(label_col)?.cast(&DataType::String)?;
    let labels = label_series.str()?;

    let mut normalized = df.clone();
    for name in score_cols {
        require_column(df, name)?;
        let values = df.column(name)?.cast(&DataType::Float64)?;
        let scaled: Float64Chunked = labels
            .into_iter()
            .zip(values.f64()?.into_iter())
            .map(|(label, value)| {
                let count = counts.get(label?)?;
                Some(value? / *count as f64)
            })
            .collect();
        normalized.with_column(scaled.with_name((*name).into()).into_series())?;
    }
    Ok(normalized)
}

/// Compute descriptive statistics for an array of values.
pub fn describe(label: &str, area: &str, values: &[f64]) -> Option<AreaDistribution> {
    if values.is_empty() {
        return None;
    }

    let mut data = Data::new(values.to_vec());
    let q1 = data.lower_quartile();
    let q3 = data.upper_quartile();
    let iqr = q3 - q1;
    let min = data.min();
    let max = data.max();

    let whisker_low = values
        .iter()
        .copied()
        .filter(|&v| v >= q1 - 1.5 * iqr)
        .fold(f64::INFINITY, f64::min);
    let whisker_high = values
        .iter()
        .copied()
        .filter(|&v| v <= q3 + 1.5 * iqr)
        .fold(f64::NEG_INFINITY, f64::max);

    Some(AreaDistribution {
        label: label.to_string(),
        area: area.to_string(),
        count: values.len(),
        mean: data.mean().unwrap_or(f64::NAN),
        median: data.median(),
        std: data.std_dev().filter(|s| s.is_finite()).unwrap_or(0.0),
        q1,
        q3,
        min,
        max,
        whisker_low: if whisker_low.is_finite() { whisker_low } else { q1 },
        whisker_high: if whisker_high.is_finite() { whisker_high } else { q3 },
    })
}

/// Statistics for every (area, label) cell of a long-format record set.
///
/// Areas are processed in parallel. Output keeps the first-seen order of
/// areas and, within an area, of labels.
pub fn area_distributions(records: &[LongRecord]) -> Vec<AreaDistribution> {
    let mut areas: Vec<(&str, Vec<(&str, Vec<f64>)>)> = Vec::new();
    for record in records {
        let pos = match areas.iter().position(|(area, _)| *area == record.area) {
            Some(pos) => pos,
            None => {
                areas.push((record.area.as_str(), Vec::new()));
                areas.len() - 1
            }
        };
        let labels = &mut areas[pos].1;
        match labels.iter_mut().find(|(label, _)| *label == record.label) {
            Some((_, values)) => values.push(record.value),
            None => labels.push((record.label.as_str(), vec![record.value])),
        }
    }

    // Use rayon for parallel computation
    areas
        .par_iter()
        .flat_map_iter(|(area, labels)| {
            labels
                .iter()
                .filter_map(move |(label, values)| describe(label, area, values))
        })
        .collect()
}
