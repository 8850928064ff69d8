//! Analysis commands: filter → aggregate → reshape → chart.
//!
//! Each command takes an already loaded table so the stages can be driven
//! from the binary or from tests with in-memory data.

use crate::charts::{Chart, ChartError, ChartKind, ChartSink};
use crate::config::ConfigError;
use crate::data::{
    map_school_types, municipality_scores, project, restrict_to_municipality, summaries_to_long,
    summary_table, table_to_long, LongRecord, ReadError, SchemaError, SchoolTypeMapping,
    MUNICIPALITY_COLUMN, SCHOOL_TYPE_COLUMN, SCORE_COLUMNS, SELECTED_COLUMNS,
};
use crate::export::{export_combinations, ExportError};
use crate::stats::{
    count_by_label, normalize_rows_by_group_count, summarize, GroupSummary, MeanMode,
    StudentCount,
};
use polars::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Result of the plain-means analysis.
#[derive(Debug)]
pub struct MeansReport {
    /// Rows left after filtering.
    pub rows: usize,
    pub summaries: Vec<GroupSummary>,
    /// Means with display headers.
    pub table: DataFrame,
}

/// Result of the normalized-means analysis.
#[derive(Debug)]
pub struct NormalizedReport {
    pub rows: usize,
    pub summaries: Vec<GroupSummary>,
}

/// Hand a chart to the sink, skipping charts with nothing to draw.
fn present(sink: &mut dyn ChartSink, chart: Chart) -> Result<(), ChartError> {
    if chart.records.is_empty() {
        warn!(title = %chart.title, "No data to chart, skipping");
        return Ok(());
    }
    sink.render(&chart)
}

/// Group means per school type, a bar chart of the means and a box plot of
/// the individual scores.
pub fn run_means(
    df: &DataFrame,
    municipality: &str,
    sink: &mut dyn ChartSink,
) -> Result<MeansReport, PipelineError> {
    let local = municipality_scores(df, municipality, &SchoolTypeMapping::default())?;
    info!(municipality, rows = local.height(), "Filtered scores");

    let summaries = summarize(&local, SCHOOL_TYPE_COLUMN, &SCORE_COLUMNS, MeanMode::Plain)?;
    let table = summary_table(&summaries)?;

    present(
        sink,
        Chart::new(
            ChartKind::Bar,
            format!("Mean Scores by School Type - {municipality}"),
            summaries_to_long(&summaries),
        )
        .with_axes("Knowledge Area", "Mean Score"),
    )?;
    present(
        sink,
        Chart::new(
            ChartKind::BoxPlot,
            format!("Score Distribution by Knowledge Area and School Type - {municipality}"),
            table_to_long(&local, SCHOOL_TYPE_COLUMN, &SCORE_COLUMNS)?,
        )
        .with_axes("Knowledge Area", "Score"),
    )?;

    Ok(MeansReport {
        rows: local.height(),
        summaries,
        table,
    })
}

/// Number of participants per school type and a bar chart of the totals.
///
/// Rows are not required to have complete scores here.
pub fn run_counts(
    df: &DataFrame,
    municipality: &str,
    sink: &mut dyn ChartSink,
) -> Result<Vec<StudentCount>, PipelineError> {
    let projected = project(df, &[MUNICIPALITY_COLUMN, SCHOOL_TYPE_COLUMN])?;
    let local = restrict_to_municipality(&projected, MUNICIPALITY_COLUMN, municipality)?;
    let labeled = map_school_types(&local, SCHOOL_TYPE_COLUMN, &SchoolTypeMapping::default())?;
    let counts = count_by_label(&labeled, SCHOOL_TYPE_COLUMN)?;

    for c in &counts {
        info!(school_type = %c.label, students = c.count, "Student count");
    }

    let records = counts
        .iter()
        .map(|c| LongRecord {
            label: "Students".to_string(),
            area: c.label.clone(),
            value: c.count as f64,
        })
        .collect();
    present(
        sink,
        Chart::new(
            ChartKind::Bar,
            format!("Students by School Type - {municipality}"),
            records,
        )
        .with_axes("School Type", "Students"),
    )?;

    Ok(counts)
}

/// Means divided by group size, as a line chart, plus a box plot of the
/// per-row normalized scores.
pub fn run_normalized(
    df: &DataFrame,
    municipality: &str,
    sink: &mut dyn ChartSink,
) -> Result<NormalizedReport, PipelineError> {
    let local = municipality_scores(df, municipality, &SchoolTypeMapping::default())?;
    let summaries = summarize(
        &local,
        SCHOOL_TYPE_COLUMN,
        &SCORE_COLUMNS,
        MeanMode::Normalized,
    )?;

    present(
        sink,
        Chart::new(
            ChartKind::Line,
            format!("Normalized Means by School Type and Knowledge Area - {municipality}"),
            summaries_to_long(&summaries),
        )
        .with_axes("Knowledge Area", "Normalized Mean"),
    )?;

    let scaled = normalize_rows_by_group_count(&local, SCHOOL_TYPE_COLUMN, &SCORE_COLUMNS)?;
    present(
        sink,
        Chart::new(
            ChartKind::BoxPlot,
            format!("Normalized Score Distribution by Knowledge Area and School Type - {municipality}"),
            table_to_long(&scaled, SCHOOL_TYPE_COLUMN, &SCORE_COLUMNS)?,
        )
        .with_axes("Knowledge Area", "Normalized Score"),
    )?;

    Ok(NormalizedReport {
        rows: local.height(),
        summaries,
    })
}

/// Write the occurrence count of every distinct analysis-column combination.
pub fn run_export(df: &DataFrame, output: &Path) -> Result<usize, PipelineError> {
    Ok(export_combinations(df, &SELECTED_COLUMNS, output)?)
}
