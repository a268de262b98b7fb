use anyhow::Context;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

pub(crate) mod fonts;
mod table;

pub(crate) use table::{draw_summary_table, TableStyle};

pub(crate) type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
pub(crate) type Chart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

pub(crate) const ORANGE: RGBColor = RGBColor(255, 165, 0);
const DASH_COUNT: usize = 40;

/// Size and grid of a dashboard figure
#[derive(Debug, Clone, PartialEq)]
pub struct FigureLayout {
    pub title: &'static str,
    pub width_in: f64,
    pub height_in: f64,
    pub rows: usize,
    pub cols: usize,
}

impl FigureLayout {
    pub fn pixel_size(&self, dpi: u32) -> (u32, u32) {
        (
            (self.width_in * dpi as f64).round() as u32,
            (self.height_in * dpi as f64).round() as u32,
        )
    }
}

/// Font sizes and line widths in points, scaled to the output resolution.
///
/// When no font could be registered all text is skipped and the charts are drawn without titles,
/// tick labels or legends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Typography {
    text: bool,
    px_per_pt: f64,
}

impl Typography {
    pub fn new(text: bool, dpi: u32) -> Self {
        Self {
            text,
            px_per_pt: dpi as f64 / 72.0,
        }
    }

    pub fn has_text(&self) -> bool {
        self.text
    }

    pub fn px(&self, points: f64) -> f64 {
        points * self.px_per_pt
    }

    pub fn px_u32(&self, points: f64) -> u32 {
        self.px(points).round().max(1.0) as u32
    }

    pub fn px_i32(&self, points: f64) -> i32 {
        self.px(points).round().max(1.0) as i32
    }

    pub fn regular(&self, points: f64) -> TextStyle<'static> {
        FontDesc::new(FontFamily::SansSerif, self.px(points), FontStyle::Normal).color(&BLACK)
    }

    pub fn bold(&self, points: f64) -> TextStyle<'static> {
        FontDesc::new(FontFamily::SansSerif, self.px(points), FontStyle::Bold).color(&BLACK)
    }

    /// A line of the given width in points
    pub fn line<C: Color>(&self, color: &C, points: f64) -> ShapeStyle {
        color.stroke_width(self.px_u32(points))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub dpi: u32,
    pub typography: Typography,
}

/// A titled drawing split into a grid of panels, written to disk by [`Figure::finish`].
pub(crate) struct Figure<'a> {
    root: Panel<'a>,
    panels: Vec<Panel<'a>>,
}

impl<'a> Figure<'a> {
    pub fn new(
        path: &'a Path,
        layout: &FigureLayout,
        options: &RenderOptions,
    ) -> anyhow::Result<Self> {
        let typography = &options.typography;
        let size = layout.pixel_size(options.dpi);
        log::debug!(
            "Drawing {}x{} figure to {}",
            size.0,
            size.1,
            path.display()
        );

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let margin = typography.px_i32(6.0);
        let body = root.margin(margin, margin, margin, margin);
        let body = if typography.has_text() {
            body.titled(layout.title, typography.bold(16.0))?
        } else {
            body
        };

        let gap = typography.px_i32(10.0);
        let panels = body
            .split_evenly((layout.rows, layout.cols))
            .into_iter()
            .map(|panel| panel.margin(gap, gap, gap, gap))
            .collect();

        Ok(Self { root, panels })
    }

    pub fn panel(&self, index: usize) -> anyhow::Result<&Panel<'a>> {
        self.panels
            .get(index)
            .with_context(|| format!("No panel {index} in figure"))
    }

    pub fn finish(self) -> anyhow::Result<()> {
        self.root.present().context("Failed to write image")?;
        Ok(())
    }
}

/// Titles of a chart panel
pub(crate) struct Axes<'t> {
    pub title: &'t str,
    pub x_label: &'t str,
    pub y_label: &'t str,
}

pub(crate) fn build_chart<'a, 'b>(
    panel: &'a Panel<'b>,
    typography: &Typography,
    axes: &Axes<'_>,
    x: Range<f64>,
    y: Range<f64>,
) -> anyhow::Result<Chart<'a, 'b>> {
    let mut builder = ChartBuilder::on(panel);
    builder.margin(typography.px_u32(6.0));
    if typography.has_text() {
        builder
            .caption(axes.title, typography.bold(13.0))
            .x_label_area_size(typography.px_u32(30.0))
            .y_label_area_size(typography.px_u32(52.0));
    }

    Ok(builder.build_cartesian_2d(x, y)?)
}

pub(crate) fn draw_mesh(
    chart: &mut Chart<'_, '_>,
    typography: &Typography,
    axes: &Axes<'_>,
    y_formatter: Option<&dyn Fn(&f64) -> String>,
) -> anyhow::Result<()> {
    let mut mesh = chart.configure_mesh();
    mesh.light_line_style(BLACK.mix(0.04))
        .bold_line_style(BLACK.mix(0.15))
        .axis_style(BLACK.mix(0.6).stroke_width(typography.px_u32(0.8)));

    if typography.has_text() {
        mesh.x_desc(axes.x_label)
            .y_desc(axes.y_label)
            .axis_desc_style(typography.bold(11.0))
            .label_style(typography.regular(9.0));
        if let Some(formatter) = y_formatter {
            mesh.y_label_formatter(formatter);
        }
    } else {
        mesh.x_labels(0).y_labels(0);
    }

    mesh.draw()?;
    Ok(())
}

pub(crate) fn draw_legend<'a, 'b: 'a>(
    chart: &mut Chart<'a, 'b>,
    typography: &Typography,
    position: SeriesLabelPosition,
) -> anyhow::Result<()> {
    if !typography.has_text() {
        return Ok(());
    }

    chart
        .configure_series_labels()
        .position(position)
        .margin(typography.px_u32(6.0))
        .legend_area_size(typography.px_u32(20.0))
        .background_style(WHITE.mix(0.8).filled())
        .border_style(BLACK.mix(0.3).stroke_width(1))
        .label_font(typography.regular(9.0))
        .draw()?;

    Ok(())
}

fn legend_entry(
    color: RGBAColor,
    stroke_width: u32,
    length: i32,
) -> impl Fn((i32, i32)) -> PathElement<(i32, i32)> {
    move |(x, y)| PathElement::new(vec![(x, y), (x + length, y)], color.stroke_width(stroke_width))
}

pub(crate) fn draw_line(
    chart: &mut Chart<'_, '_>,
    typography: &Typography,
    points: &[(f64, f64)],
    style: ShapeStyle,
    label: Option<&str>,
) -> anyhow::Result<()> {
    let series = chart.draw_series(LineSeries::new(finite(points), style))?;
    if let Some(label) = label {
        series.label(label).legend(legend_entry(
            style.color,
            style.stroke_width,
            typography.px_i32(16.0),
        ));
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker {
    Circle,
    Square,
    Triangle,
}

pub(crate) fn draw_markers(
    chart: &mut Chart<'_, '_>,
    points: &[(f64, f64)],
    marker: Marker,
    color: RGBColor,
    size: u32,
) -> anyhow::Result<()> {
    let style = color.filled();
    let size_i32 = size as i32;
    match marker {
        Marker::Circle => {
            chart.draw_series(finite(points).map(|p| Circle::new(p, size, style)))?;
        }
        Marker::Triangle => {
            chart.draw_series(finite(points).map(|p| TriangleMarker::new(p, size, style)))?;
        }
        Marker::Square => {
            chart.draw_series(finite(points).map(|p| {
                EmptyElement::at(p)
                    + Rectangle::new([(-size_i32, -size_i32), (size_i32, size_i32)], style)
            }))?;
        }
    }

    Ok(())
}

/// Draw a straight dashed line between two points.
pub(crate) fn draw_dashed(
    chart: &mut Chart<'_, '_>,
    typography: &Typography,
    from: (f64, f64),
    to: (f64, f64),
    style: ShapeStyle,
    label: Option<&str>,
) -> anyhow::Result<()> {
    let steps = (2 * DASH_COUNT - 1) as f64;
    let at = |t: f64| (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
    let dashes = (0..DASH_COUNT).map(|i| {
        let start = (2 * i) as f64 / steps;
        let end = (2 * i + 1) as f64 / steps;
        PathElement::new(vec![at(start), at(end)], style)
    });

    let series = chart.draw_series(dashes)?;
    if let Some(label) = label {
        series.label(label).legend(legend_entry(
            style.color,
            style.stroke_width,
            typography.px_i32(16.0),
        ));
    }

    Ok(())
}

/// Fill the region between a lower and an upper bound, skipping points where either is missing.
pub(crate) fn draw_band(
    chart: &mut Chart<'_, '_>,
    typography: &Typography,
    x: &[f64],
    lower: &[Option<f64>],
    upper: &[Option<f64>],
    color: RGBAColor,
    label: Option<&str>,
) -> anyhow::Result<()> {
    let bounds = x
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .filter_map(|(x, (lower, upper))| Some((*x, (*lower)?, (*upper)?)))
        .filter(|(x, lower, upper)| x.is_finite() && lower.is_finite() && upper.is_finite())
        .collect::<Vec<_>>();
    if bounds.is_empty() {
        return Ok(());
    }

    let outline = bounds
        .iter()
        .map(|(x, _, upper)| (*x, *upper))
        .chain(bounds.iter().rev().map(|(x, lower, _)| (*x, *lower)))
        .collect::<Vec<_>>();

    let series = chart.draw_series(std::iter::once(Polygon::new(outline, color.filled())))?;
    if let Some(label) = label {
        let length = typography.px_i32(16.0);
        let height = typography.px_i32(4.0);
        series.label(label).legend(move |(x, y)| {
            Rectangle::new([(x, y - height), (x + length, y + height)], color.filled())
        });
    }

    Ok(())
}

/// Fill between a series and zero, outlined by the series itself.
pub(crate) fn draw_area(
    chart: &mut Chart<'_, '_>,
    points: &[(f64, f64)],
    fill: RGBAColor,
    border: ShapeStyle,
) -> anyhow::Result<()> {
    chart.draw_series(AreaSeries::new(finite(points), 0.0, fill.filled()).border_style(border))?;
    Ok(())
}

/// Axis range covering every finite value with a small margin on both sides.
pub(crate) fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
            (min.min(v), max.max(v))
        });
    if min > max {
        return 0.0..1.0;
    }

    let span = max - min;
    let pad = if span > 0.0 {
        span * 0.05
    } else {
        min.abs().max(1.0) * 0.05
    };

    (min - pad)..(max + pad)
}

pub(crate) fn zip_points(x: &[f64], y: &[f64]) -> Vec<(f64, f64)> {
    x.iter().copied().zip(y.iter().copied()).collect()
}

fn finite(points: &[(f64, f64)]) -> impl Iterator<Item = (f64, f64)> + '_ {
    points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
}
