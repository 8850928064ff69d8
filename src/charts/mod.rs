//! Charts module - Chart rendering

mod renderer;

pub use renderer::PngChartRenderer;

use crate::data::LongRecord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Nothing to plot for '{0}'")]
    Empty(String),
    #[error("Chart backend error: {0}")]
    Backend(String),
    #[error("Failed to write chart: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind of chart to draw from long-format records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// One bar per (area, label), grouped by area.
    Bar,
    /// Distribution of values per (area, label).
    BoxPlot,
    /// One line per label across areas.
    Line,
}

/// A chart request handed to a [`ChartSink`].
///
/// Records are plotted with `area` on the x axis and one series per `label`.
#[derive(Debug, Clone)]
pub struct Chart {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub records: Vec<LongRecord>,
}

impl Chart {
    pub fn new(kind: ChartKind, title: impl Into<String>, records: Vec<LongRecord>) -> Self {
        Self {
            kind,
            title: title.into(),
            x_label: "Knowledge Area".to_string(),
            y_label: "Score".to_string(),
            records,
        }
    }

    pub fn with_axes(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    /// Distinct areas in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        distinct(self.records.iter().map(|r| r.area.as_str()))
    }

    /// Distinct labels in first-seen order.
    pub fn series(&self) -> Vec<&str> {
        distinct(self.records.iter().map(|r| r.label.as_str()))
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen: Vec<&str> = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

/// Consumer of finished charts.
pub trait ChartSink {
    fn render(&mut self, chart: &Chart) -> Result<(), ChartError>;
}

/// Keeps charts in memory instead of drawing them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub charts: Vec<Chart>,
}

impl ChartSink for RecordingSink {
    fn render(&mut self, chart: &Chart) -> Result<(), ChartError> {
        self.charts.push(chart.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str, area: &str) -> LongRecord {
        LongRecord {
            label: label.into(),
            area: area.into(),
            value: 1.0,
        }
    }

    #[test]
    fn test_categories_and_series_keep_first_seen_order() {
        let chart = Chart::new(
            ChartKind::Line,
            "Means",
            vec![
                record("public", "Mathematics"),
                record("private", "Mathematics"),
                record("public", "Essay"),
            ],
        );
        assert_eq!(chart.categories(), vec!["Mathematics", "Essay"]);
        assert_eq!(chart.series(), vec!["public", "private"]);
    }

    #[test]
    fn test_recording_sink_keeps_charts() {
        let mut sink = RecordingSink::default();
        let chart = Chart::new(ChartKind::Bar, "Students", vec![record("public", "Students")])
            .with_axes("School Type", "Students");
        sink.render(&chart).unwrap();
        assert_eq!(sink.charts.len(), 1);
        assert_eq!(sink.charts[0].y_label, "Students");
    }
}
