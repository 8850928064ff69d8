//! Static Chart Renderer
//! Draws bar, box and line charts to PNG files with plotters.
//!
//! Layout shared by every chart kind:
//! 1. Title centered on top
//! 2. Knowledge areas along the x axis, one slot per area
//! 3. One series per school type inside each slot, colored from a fixed palette
//! 4. Legend in the upper right corner

use super::{Chart, ChartError, ChartKind, ChartSink};
use crate::stats::{area_distributions, AreaDistribution};
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::info;

type Frame<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const PALETTE: [RGBColor; 6] = [
    RGBColor(91, 155, 213),  // Blue
    RGBColor(237, 125, 49),  // Orange
    RGBColor(112, 173, 71),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
];

/// Share of an x slot covered by the series inside it.
const SLOT_WIDTH: f64 = 0.8;

const DEFAULT_SIZE: (u32, u32) = (1400, 800);

/// Writes each chart to `<output_dir>/<title slug>.png`.
pub struct PngChartRenderer {
    output_dir: PathBuf,
    size: (u32, u32),
    written: Vec<PathBuf>,
}

impl PngChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            size: DEFAULT_SIZE,
            written: Vec::new(),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Paths of the charts written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Output path for a chart title.
    pub fn path_for(&self, title: &str) -> PathBuf {
        self.output_dir.join(format!("{}.png", slug(title)))
    }

    fn draw(&self, path: &Path, chart: &Chart) -> Result<(), ChartError> {
        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        match chart.kind {
            ChartKind::Bar => draw_bars(&root, chart)?,
            ChartKind::BoxPlot => draw_boxes(&root, chart)?,
            ChartKind::Line => draw_lines(&root, chart)?,
        }

        root.present().map_err(backend)?;
        Ok(())
    }
}

impl ChartSink for PngChartRenderer {
    fn render(&mut self, chart: &Chart) -> Result<(), ChartError> {
        if chart.records.is_empty() {
            return Err(ChartError::Empty(chart.title.clone()));
        }

        fs::create_dir_all(&self.output_dir)?;
        let path = self.path_for(&chart.title);
        self.draw(&path, chart)?;

        info!(path = %path.display(), kind = ?chart.kind, "Chart written");
        self.written.push(path);
        Ok(())
    }
}

fn backend(err: impl std::fmt::Display) -> ChartError {
    ChartError::Backend(err.to_string())
}

/// Lowercase file-name form of a title.
fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        "chart".to_string()
    } else {
        trimmed.to_string()
    }
}

fn series_color(idx: usize) -> RGBColor {
    PALETTE[idx % PALETTE.len()]
}

/// Left edge and width of a series inside the slot centered on `slot`.
fn series_offset(slot: usize, series: usize, n_series: usize) -> (f64, f64) {
    let width = SLOT_WIDTH / n_series.max(1) as f64;
    let left = slot as f64 - SLOT_WIDTH / 2.0 + series as f64 * width;
    (left, width)
}

fn category_at(categories: &[&str], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    categories
        .get(idx as usize)
        .map(|c| c.to_string())
        .unwrap_or_default()
}

/// Value range for bar and line charts; always includes zero.
fn value_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (mut min, mut max) = (0.0f64, 0.0f64);
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if max <= min {
        max = min + 1.0;
    }
    let pad = (max - min) * 0.1;
    (if min < 0.0 { min - pad } else { 0.0 })..(max + pad)
}

/// Value range for box plots with 15% headroom on both sides.
fn distribution_range(dists: &[AreaDistribution]) -> Range<f64> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for d in dists {
        min = min.min(d.min);
        max = max.max(d.max);
    }
    if !min.is_finite() || !max.is_finite() {
        return 0.0..100.0;
    }
    let pad = ((max - min) * 0.15).max(1e-6);
    (min - pad)..(max + pad)
}

fn build_frame<'a, 'b: 'a>(
    root: &'a DrawingArea<BitMapBackend<'b>, Shift>,
    chart: &Chart,
    categories: &[&str],
    y_range: Range<f64>,
) -> Result<Frame<'a, 'b>, ChartError> {
    let x_range = -0.5..(categories.len() as f64 - 0.5);
    let mut frame = ChartBuilder::on(root)
        .caption(&chart.title, ("sans-serif", 28).into_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)
        .map_err(backend)?;

    let formatter = |x: &f64| category_at(categories, *x);
    frame
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(categories.len() * 2 + 1)
        .x_label_formatter(&formatter)
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .draw()
        .map_err(backend)?;

    Ok(frame)
}

fn draw_legend<'a, 'b: 'a>(frame: &mut Frame<'a, 'b>) -> Result<(), ChartError> {
    frame
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(backend)
}

fn value_of(chart: &Chart, area: &str, label: &str) -> Option<f64> {
    chart
        .records
        .iter()
        .find(|r| r.area == area && r.label == label)
        .map(|r| r.value)
}

fn draw_bars<'a, 'b: 'a>(
    root: &'a DrawingArea<BitMapBackend<'b>, Shift>,
    chart: &Chart,
) -> Result<(), ChartError> {
    let categories = chart.categories();
    let series = chart.series();
    let y_range = value_range(chart.records.iter().map(|r| r.value));
    let mut frame = build_frame(root, chart, &categories, y_range)?;

    for (s, label) in series.iter().enumerate() {
        let color = series_color(s);
        let bars: Vec<Rectangle<(f64, f64)>> = categories
            .iter()
            .enumerate()
            .filter_map(|(slot, area)| {
                let value = value_of(chart, area, label)?;
                let (left, width) = series_offset(slot, s, series.len());
                Some(Rectangle::new(
                    [(left, 0.0), (left + width * 0.9, value)],
                    color.filled(),
                ))
            })
            .collect();

        frame
            .draw_series(bars)
            .map_err(backend)?
            .label(*label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    draw_legend(&mut frame)
}

fn draw_lines<'a, 'b: 'a>(
    root: &'a DrawingArea<BitMapBackend<'b>, Shift>,
    chart: &Chart,
) -> Result<(), ChartError> {
    let categories = chart.categories();
    let series = chart.series();
    let y_range = value_range(chart.records.iter().map(|r| r.value));
    let mut frame = build_frame(root, chart, &categories, y_range)?;

    for (s, label) in series.iter().enumerate() {
        let color = series_color(s);
        let points: Vec<(f64, f64)> = categories
            .iter()
            .enumerate()
            .filter_map(|(slot, area)| Some((slot as f64, value_of(chart, area, label)?)))
            .collect();

        frame
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
            .map_err(backend)?
            .label(*label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        frame
            .draw_series(points.into_iter().map(|p| Circle::new(p, 4, color.filled())))
            .map_err(backend)?;
    }

    draw_legend(&mut frame)
}

fn draw_boxes<'a, 'b: 'a>(
    root: &'a DrawingArea<BitMapBackend<'b>, Shift>,
    chart: &Chart,
) -> Result<(), ChartError> {
    let categories = chart.categories();
    let series = chart.series();
    let dists = area_distributions(&chart.records);
    let mut frame = build_frame(root, chart, &categories, distribution_range(&dists))?;

    for (s, label) in series.iter().enumerate() {
        let color = series_color(s);
        let mut boxes: Vec<Rectangle<(f64, f64)>> = Vec::new();
        let mut outlines: Vec<Rectangle<(f64, f64)>> = Vec::new();
        let mut strokes: Vec<PathElement<(f64, f64)>> = Vec::new();

        for (slot, area) in categories.iter().enumerate() {
            let Some(d) = dists.iter().find(|d| d.area == *area && d.label == *label) else {
                continue;
            };
            let (left, width) = series_offset(slot, s, series.len());
            let (x0, x1) = (left + width * 0.1, left + width * 0.9);
            let cx = left + width / 2.0;
            let cap = width * 0.2;

            boxes.push(Rectangle::new([(x0, d.q1), (x1, d.q3)], color.mix(0.3).filled()));
            outlines.push(Rectangle::new([(x0, d.q1), (x1, d.q3)], color.stroke_width(2)));
            // Median
            strokes.push(PathElement::new(vec![(x0, d.median), (x1, d.median)], color.stroke_width(2)));
            // Whiskers and caps
            strokes.push(PathElement::new(vec![(cx, d.whisker_low), (cx, d.q1)], color.stroke_width(1)));
            strokes.push(PathElement::new(vec![(cx, d.q3), (cx, d.whisker_high)], color.stroke_width(1)));
            strokes.push(PathElement::new(
                vec![(cx - cap, d.whisker_low), (cx + cap, d.whisker_low)],
                color.stroke_width(1),
            ));
            strokes.push(PathElement::new(
                vec![(cx - cap, d.whisker_high), (cx + cap, d.whisker_high)],
                color.stroke_width(1),
            ));
        }

        frame
            .draw_series(boxes)
            .map_err(backend)?
            .label(*label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.mix(0.3).filled()));
        frame.draw_series(outlines).map_err(backend)?;
        frame.draw_series(strokes).map_err(backend)?;
    }

    draw_legend(&mut frame)
}
