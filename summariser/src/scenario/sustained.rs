use crate::analyze::{linear_trend, rolling_stats, standard_ratio_stats, RollingStats};
use crate::frame::float_values;
use crate::render::{
    build_chart, draw_area, draw_band, draw_dashed, draw_legend, draw_line, draw_mesh,
    draw_summary_table, padded_range, zip_points, Axes, Figure, Panel, RenderOptions, TableStyle,
    Typography, ORANGE,
};
use crate::report::{format_ops_axis, group_thousands, SummaryRow};
use crate::scenario::{
    Benchmark, CUMULATIVE_ERROR_RATE, CUMULATIVE_OPS, ELAPSED_SECS, ERROR_RATE, LATENCY_P50,
    LATENCY_P95, LATENCY_P99, WINDOW_THROUGHPUT,
};
use anyhow::Context;
use plotters::prelude::*;
use polars::frame::DataFrame;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use tables_stress_summary_model::{
    ErrorRateStats, LatencyProgression, LinearTrend, SustainedSummary,
};

const X_LABEL: &str = "Elapsed Time (minutes)";
const THROUGHPUT_LABEL: &str = "Throughput (ops/sec)";
const MAX_ROLLING_WINDOW: usize = 5;

/// Samples in the centered rolling window, never more than there are rows.
pub(crate) fn rolling_window(rows: usize) -> usize {
    rows.min(MAX_ROLLING_WINDOW)
}

fn last_value(values: &[f64], column: &str) -> anyhow::Result<f64> {
    values
        .last()
        .copied()
        .with_context(|| format!("No data points in column {column}"))
}

pub(crate) fn summarize_sustained(frame: &DataFrame) -> anyhow::Result<SustainedSummary> {
    let elapsed = float_values(frame, ELAPSED_SECS)?;
    let window_throughput =
        standard_ratio_stats(frame, WINDOW_THROUGHPUT).context("Window throughput stats")?;
    let p99 = standard_ratio_stats(frame, LATENCY_P99).context("P99 latency stats")?;
    let p99_values = float_values(frame, LATENCY_P99)?;
    let error_rate = standard_ratio_stats(frame, ERROR_RATE).context("Error rate stats")?;

    let final_elapsed_secs = last_value(&elapsed, ELAPSED_SECS)?;
    let total_ops = last_value(&float_values(frame, CUMULATIVE_OPS)?, CUMULATIVE_OPS)?;
    let avg_throughput = if final_elapsed_secs > 0.0 {
        total_ops / final_elapsed_secs
    } else {
        0.0
    };

    Ok(SustainedSummary {
        data_points: frame.height(),
        max_elapsed_secs: elapsed.iter().copied().fold(f64::NAN, f64::max),
        final_elapsed_secs,
        total_ops,
        avg_throughput,
        throughput_cv: window_throughput.coefficient_of_variation(),
        window_throughput,
        throughput_trend: linear_trend(&elapsed, &float_values(frame, WINDOW_THROUGHPUT)?),
        latency_p99: LatencyProgression {
            first: p99_values.first().copied().unwrap_or(f64::NAN),
            last: last_value(&p99_values, LATENCY_P99)?,
            mean: p99.mean,
            max: p99.max,
        },
        latency_p99_trend: linear_trend(&elapsed, &p99_values),
        error_rate: ErrorRateStats {
            mean_pct: error_rate.mean * 100.0,
            max_pct: error_rate.max * 100.0,
            final_cumulative_pct: last_value(
                &float_values(frame, CUMULATIVE_ERROR_RATE)?,
                CUMULATIVE_ERROR_RATE,
            )? * 100.0,
        },
    })
}

pub(crate) fn write_sustained_load_report<W: Write>(
    out: &mut W,
    source: &Path,
    summary: &SustainedSummary,
) -> std::io::Result<()> {
    writeln!(
        out,
        "Loaded {} data points from {}",
        summary.data_points,
        source.display()
    )?;
    writeln!(
        out,
        "Test duration: {:.0} seconds ({:.1} minutes)",
        summary.max_elapsed_secs,
        summary.max_elapsed_secs / 60.0
    )
}

pub(crate) fn write_sustained_report<W: Write>(
    out: &mut W,
    summary: &SustainedSummary,
) -> std::io::Result<()> {
    let throughput = &summary.window_throughput;
    writeln!(out, "\nThroughput Stability Analysis:")?;
    writeln!(out, "  Mean throughput: {:.2} ops/sec", throughput.mean)?;
    writeln!(out, "  Std deviation: {:.2} ops/sec", throughput.std)?;
    writeln!(out, "  Coefficient of variation: {:.1}%", summary.throughput_cv)?;
    writeln!(
        out,
        "  Trend slope: {:.4} ops/sec per minute",
        summary.throughput_trend.slope_per_minute()
    )?;
    writeln!(out, "  R-squared: {:.4}", summary.throughput_trend.r_squared)?;

    let p99 = &summary.latency_p99;
    writeln!(out, "\nLatency Trend Analysis:")?;
    writeln!(out, "  Initial P99: {:.0}ms", p99.first)?;
    writeln!(out, "  Final P99: {:.0}ms", p99.last)?;
    writeln!(out, "  Mean P99: {:.0}ms", p99.mean)?;
    writeln!(out, "  Max P99: {:.0}ms", p99.max)?;
    writeln!(
        out,
        "  Trend slope: {:.2} ms/minute",
        summary.latency_p99_trend.slope_per_minute()
    )?;

    let errors = &summary.error_rate;
    writeln!(out, "\nError Rate Analysis:")?;
    writeln!(out, "  Mean error rate: {:.2}%", errors.mean_pct)?;
    writeln!(out, "  Max error rate: {:.2}%", errors.max_pct)?;
    writeln!(out, "  Final cumulative: {:.2}%", errors.final_cumulative_pct)
}

pub(crate) fn sustained_rows(summary: &SustainedSummary) -> Vec<SummaryRow> {
    vec![
        SummaryRow::new(
            "Test Duration",
            format!("{:.1} minutes", summary.final_elapsed_secs / 60.0),
        ),
        SummaryRow::new("Total Operations", group_thousands(summary.total_ops)),
        SummaryRow::new(
            "Avg Throughput",
            format!("{:.1} ops/sec", summary.avg_throughput),
        ),
        SummaryRow::new("Throughput CV", format!("{:.1}%", summary.throughput_cv)),
        SummaryRow::new(
            "Mean P99 Latency",
            format!("{:.0} ms", summary.latency_p99.mean),
        ),
        SummaryRow::new(
            "Max P99 Latency",
            format!("{:.0} ms", summary.latency_p99.max),
        ),
        SummaryRow::new(
            "Final Error Rate",
            format!("{:.2}%", summary.error_rate.final_cumulative_pct),
        ),
    ]
}

/// Render the six panel sustained load dashboard to `path`.
///
/// Time is shown in minutes while trends are fitted per second, so the trend line is evaluated at
/// the elapsed seconds of the first and last sample and plotted at the matching minute.
pub(crate) fn render_sustained(
    frame: &DataFrame,
    summary: &SustainedSummary,
    path: &Path,
    options: &RenderOptions,
) -> anyhow::Result<()> {
    let typography = &options.typography;
    let figure = Figure::new(path, &Benchmark::Sustained.layout(), options)?;

    let elapsed = float_values(frame, ELAPSED_SECS)?;
    let minutes = elapsed.iter().map(|secs| secs / 60.0).collect::<Vec<_>>();
    let x_range = padded_range(minutes.iter().copied());
    let throughput = float_values(frame, WINDOW_THROUGHPUT)?;

    draw_throughput_trend(
        figure.panel(0)?,
        typography,
        x_range.clone(),
        &zip_points(&minutes, &throughput),
        &elapsed,
        &summary.throughput_trend,
    )
    .context("Throughput panel")?;

    draw_latency(
        figure.panel(1)?,
        typography,
        x_range.clone(),
        &minutes,
        [
            float_values(frame, LATENCY_P50)?,
            float_values(frame, LATENCY_P95)?,
            float_values(frame, LATENCY_P99)?,
        ],
    )
    .context("Latency panel")?;

    let error_pct = float_values(frame, ERROR_RATE)?
        .into_iter()
        .map(|rate| rate * 100.0)
        .collect::<Vec<_>>();
    draw_filled(
        figure.panel(2)?,
        typography,
        &Axes {
            title: "Error Rate Over Time",
            x_label: X_LABEL,
            y_label: "Error Rate (%)",
        },
        x_range.clone(),
        &zip_points(&minutes, &error_pct),
        (RED, 0.3, 1.5),
        None,
    )
    .context("Error rate panel")?;

    draw_filled(
        figure.panel(3)?,
        typography,
        &Axes {
            title: "Total Operations Over Time",
            x_label: X_LABEL,
            y_label: "Cumulative Operations",
        },
        x_range.clone(),
        &zip_points(&minutes, &float_values(frame, CUMULATIVE_OPS)?),
        (BLUE, 0.2, 2.0),
        Some(&|value: &f64| format_ops_axis(*value)),
    )
    .context("Cumulative operations panel")?;

    let rolling = rolling_stats(frame, WINDOW_THROUGHPUT, rolling_window(frame.height()))
        .context("Rolling throughput")?;
    draw_rolling(
        figure.panel(4)?,
        typography,
        x_range,
        &minutes,
        &throughput,
        &rolling,
    )
    .context("Rolling throughput panel")?;

    draw_summary_table(
        figure.panel(5)?,
        typography,
        TableStyle {
            font_pt: 10.0,
            row_scale: 2.0,
        },
        &sustained_rows(summary),
    )
    .context("Summary table")?;

    figure.finish()
}

fn draw_throughput_trend(
    panel: &Panel<'_>,
    typography: &Typography,
    x_range: Range<f64>,
    throughput: &[(f64, f64)],
    elapsed: &[f64],
    trend: &LinearTrend,
) -> anyhow::Result<()> {
    let axes = Axes {
        title: "Throughput Over Time",
        x_label: X_LABEL,
        y_label: THROUGHPUT_LABEL,
    };

    let finite = elapsed.iter().copied().filter(|secs| secs.is_finite());
    let first = finite.clone().fold(f64::INFINITY, f64::min);
    let last = finite.fold(f64::NEG_INFINITY, f64::max);
    let trend_line = [
        (first / 60.0, trend.predict(first)),
        (last / 60.0, trend.predict(last)),
    ];

    let y_range = padded_range(
        throughput
            .iter()
            .chain(trend_line.iter())
            .map(|(_, y)| *y),
    );

    let mut chart = build_chart(panel, typography, &axes, x_range, y_range)?;
    draw_mesh(&mut chart, typography, &axes, None)?;
    draw_line(
        &mut chart,
        typography,
        throughput,
        typography.line(&BLUE.mix(0.7), 1.0),
        Some("Window throughput"),
    )?;
    if first <= last {
        draw_dashed(
            &mut chart,
            typography,
            trend_line[0],
            trend_line[1],
            typography.line(&RED, 2.0),
            Some(&format!("Trend ({:.2} ops/min)", trend.slope_per_minute())),
        )?;
    }

    draw_legend(&mut chart, typography, SeriesLabelPosition::LowerRight)
}

fn draw_latency(
    panel: &Panel<'_>,
    typography: &Typography,
    x_range: Range<f64>,
    minutes: &[f64],
    [p50, p95, p99]: [Vec<f64>; 3],
) -> anyhow::Result<()> {
    let axes = Axes {
        title: "Latency Percentiles Over Time",
        x_label: X_LABEL,
        y_label: "Latency (ms)",
    };
    let y_range = padded_range(p50.iter().chain(&p95).chain(&p99).copied());

    let mut chart = build_chart(panel, typography, &axes, x_range, y_range)?;
    draw_mesh(&mut chart, typography, &axes, None)?;

    let to_option = |values: &[f64]| values.iter().map(|v| Some(*v)).collect::<Vec<_>>();
    draw_band(
        &mut chart,
        typography,
        minutes,
        &to_option(p50.as_slice()),
        &to_option(p99.as_slice()),
        RED.mix(0.3),
        Some("P50-P99 range"),
    )?;

    for (values, label, color) in [(&p50, "P50", GREEN), (&p95, "P95", ORANGE), (&p99, "P99", RED)]
    {
        draw_line(
            &mut chart,
            typography,
            &zip_points(minutes, values),
            typography.line(&color, 1.5),
            Some(label),
        )?;
    }

    draw_legend(&mut chart, typography, SeriesLabelPosition::UpperLeft)
}

/// A series filled down to zero, with `(color, fill opacity, line width)`.
fn draw_filled(
    panel: &Panel<'_>,
    typography: &Typography,
    axes: &Axes<'_>,
    x_range: Range<f64>,
    points: &[(f64, f64)],
    (color, opacity, width): (RGBColor, f64, f64),
    y_formatter: Option<&dyn Fn(&f64) -> String>,
) -> anyhow::Result<()> {
    let y_range = padded_range(
        points
            .iter()
            .map(|(_, y)| *y)
            .chain(std::iter::once(0.0)),
    );

    let mut chart = build_chart(panel, typography, axes, x_range, y_range)?;
    draw_mesh(&mut chart, typography, axes, y_formatter)?;
    draw_area(
        &mut chart,
        points,
        color.mix(opacity),
        typography.line(&color, width),
    )
}

fn draw_rolling(
    panel: &Panel<'_>,
    typography: &Typography,
    x_range: Range<f64>,
    minutes: &[f64],
    throughput: &[f64],
    rolling: &RollingStats,
) -> anyhow::Result<()> {
    let axes = Axes {
        title: "Smoothed Throughput with Confidence Band",
        x_label: X_LABEL,
        y_label: THROUGHPUT_LABEL,
    };

    let bounds = rolling
        .mean
        .iter()
        .zip(&rolling.std)
        .map(|(mean, std)| match (mean, std) {
            (Some(mean), Some(std)) => (Some(mean - std), Some(mean + std)),
            _ => (None, None),
        })
        .collect::<Vec<_>>();
    let lower = bounds.iter().map(|(lower, _)| *lower).collect::<Vec<_>>();
    let upper = bounds.iter().map(|(_, upper)| *upper).collect::<Vec<_>>();
    let mean = rolling
        .mean
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect::<Vec<_>>();

    let y_range = padded_range(
        throughput
            .iter()
            .copied()
            .chain(lower.iter().chain(&upper).flatten().copied()),
    );

    let mut chart = build_chart(panel, typography, &axes, x_range, y_range)?;
    draw_mesh(&mut chart, typography, &axes, None)?;
    draw_line(
        &mut chart,
        typography,
        &zip_points(minutes, throughput),
        typography.line(&BLUE.mix(0.3), 1.0),
        Some("Raw"),
    )?;
    draw_line(
        &mut chart,
        typography,
        &zip_points(minutes, &mean),
        typography.line(&BLUE, 2.0),
        Some(&format!("Rolling avg ({} samples)", rolling.window)),
    )?;
    draw_band(
        &mut chart,
        typography,
        minutes,
        &lower,
        &upper,
        BLUE.mix(0.2),
        Some("+/- 1 std dev"),
    )?;

    draw_legend(&mut chart, typography, SeriesLabelPosition::LowerRight)
}
