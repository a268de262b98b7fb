use crate::analyze::{range_stats, standard_ratio_stats, with_ratio};
use crate::frame::float_values;
use crate::render::{
    build_chart, draw_dashed, draw_legend, draw_line, draw_markers, draw_mesh,
    draw_summary_table, padded_range, zip_points, Axes, Figure, Marker, Panel, RenderOptions,
    TableStyle, Typography, ORANGE,
};
use crate::report::SummaryRow;
use crate::scenario::{
    Benchmark, CONCURRENT_CLIENTS, LATENCY_P50, LATENCY_P95, LATENCY_P99, THROUGHPUT,
    THROUGHPUT_PER_CLIENT,
};
use anyhow::Context;
use plotters::prelude::*;
use polars::frame::DataFrame;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use tables_stress_summary_model::SaturationSummary;

const X_LABEL: &str = "Concurrent Clients";

pub(crate) fn summarize_saturation(frame: &DataFrame) -> anyhow::Result<SaturationSummary> {
    let frame = with_ratio(frame, THROUGHPUT, CONCURRENT_CLIENTS, THROUGHPUT_PER_CLIENT)
        .context("Throughput per client")?;

    let per_client_stats = standard_ratio_stats(&frame, THROUGHPUT_PER_CLIENT)
        .context("Throughput per client stats")?;

    Ok(SaturationSummary {
        data_points: frame.height(),
        clients: range_stats(&frame, CONCURRENT_CLIENTS).context("Client range")?,
        peak_throughput: range_stats(&frame, THROUGHPUT)
            .context("Peak throughput")?
            .max,
        throughput_per_client: float_values(&frame, THROUGHPUT_PER_CLIENT)?,
        scaling_cv: per_client_stats.coefficient_of_variation(),
        throughput_per_client_stats: per_client_stats,
        latency_p50: range_stats(&frame, LATENCY_P50).context("P50 latency range")?,
        latency_p95: range_stats(&frame, LATENCY_P95).context("P95 latency range")?,
        latency_p99: range_stats(&frame, LATENCY_P99).context("P99 latency range")?,
    })
}

pub(crate) fn write_saturation_load_report<W: Write>(
    out: &mut W,
    source: &Path,
    summary: &SaturationSummary,
) -> std::io::Result<()> {
    writeln!(
        out,
        "Loaded {} data points from {}",
        summary.data_points,
        source.display()
    )?;
    writeln!(
        out,
        "Client range: {:.0} to {:.0}",
        summary.clients.min, summary.clients.max
    )
}

pub(crate) fn write_saturation_report<W: Write>(
    out: &mut W,
    summary: &SaturationSummary,
) -> std::io::Result<()> {
    let per_client = &summary.throughput_per_client_stats;
    writeln!(out, "\nScaling Analysis:")?;
    writeln!(
        out,
        "  Mean throughput/client: {:.2} ops/sec/client",
        per_client.mean
    )?;
    writeln!(out, "  Std deviation: {:.2}", per_client.std)?;
    writeln!(out, "  Coefficient of variation: {:.1}%", summary.scaling_cv)?;

    writeln!(out, "\nLatency Analysis:")?;
    for (name, range) in [
        ("P50", &summary.latency_p50),
        ("P95", &summary.latency_p95),
        ("P99", &summary.latency_p99),
    ] {
        writeln!(
            out,
            "  {name} range: {:.0} - {:.0} ms",
            range.min, range.max
        )?;
    }

    Ok(())
}

pub(crate) fn saturation_rows(summary: &SaturationSummary) -> Vec<SummaryRow> {
    vec![
        SummaryRow::new(
            "Client Range",
            format!("{:.0} - {:.0}", summary.clients.min, summary.clients.max),
        ),
        SummaryRow::new(
            "Peak Throughput",
            format!("{:.1} ops/s", summary.peak_throughput),
        ),
        SummaryRow::new(
            "P50 Latency Range",
            format!(
                "{:.0} - {:.0} ms",
                summary.latency_p50.min, summary.latency_p50.max
            ),
        ),
        SummaryRow::new(
            "P99 Latency Range",
            format!(
                "{:.0} - {:.0} ms",
                summary.latency_p99.min, summary.latency_p99.max
            ),
        ),
        SummaryRow::new(
            "Throughput/Client",
            format!(
                "{:.2} ops/s/client",
                summary.throughput_per_client_stats.mean
            ),
        ),
        SummaryRow::new("Scaling CV", format!("{:.1}%", summary.scaling_cv)),
    ]
}

/// Render the four panel saturation dashboard to `path`.
pub(crate) fn render_saturation(
    frame: &DataFrame,
    summary: &SaturationSummary,
    path: &Path,
    options: &RenderOptions,
) -> anyhow::Result<()> {
    let typography = &options.typography;
    let figure = Figure::new(path, &Benchmark::Saturation.layout(), options)?;

    let clients = float_values(frame, CONCURRENT_CLIENTS)?;
    let x_range = padded_range(clients.iter().copied());

    draw_throughput(
        figure.panel(0)?,
        typography,
        x_range.clone(),
        &zip_points(&clients, &float_values(frame, THROUGHPUT)?),
    )
    .context("Throughput panel")?;

    draw_latency(
        figure.panel(1)?,
        typography,
        x_range.clone(),
        [
            zip_points(&clients, &float_values(frame, LATENCY_P50)?),
            zip_points(&clients, &float_values(frame, LATENCY_P95)?),
            zip_points(&clients, &float_values(frame, LATENCY_P99)?),
        ],
    )
    .context("Latency panel")?;

    draw_scaling_efficiency(
        figure.panel(2)?,
        typography,
        x_range,
        &zip_points(&clients, &summary.throughput_per_client),
        summary.throughput_per_client_stats.mean,
    )
    .context("Scaling efficiency panel")?;

    draw_summary_table(
        figure.panel(3)?,
        typography,
        TableStyle {
            font_pt: 11.0,
            row_scale: 2.2,
        },
        &saturation_rows(summary),
    )
    .context("Summary table")?;

    figure.finish()
}

fn draw_throughput(
    panel: &Panel<'_>,
    typography: &Typography,
    x_range: Range<f64>,
    throughput: &[(f64, f64)],
) -> anyhow::Result<()> {
    let axes = Axes {
        title: "Throughput vs Concurrent Clients",
        x_label: X_LABEL,
        y_label: "Throughput (ops/sec)",
    };
    let y_range = padded_range(throughput.iter().map(|(_, y)| *y));

    let mut chart = build_chart(panel, typography, &axes, x_range, y_range)?;
    draw_mesh(&mut chart, typography, &axes, None)?;
    draw_line(
        &mut chart,
        typography,
        throughput,
        typography.line(&BLUE, 2.0),
        None,
    )?;
    draw_markers(
        &mut chart,
        throughput,
        Marker::Circle,
        BLUE,
        typography.px_u32(3.0),
    )?;

    Ok(())
}

fn draw_latency(
    panel: &Panel<'_>,
    typography: &Typography,
    x_range: Range<f64>,
    percentiles: [Vec<(f64, f64)>; 3],
) -> anyhow::Result<()> {
    let axes = Axes {
        title: "Latency Percentiles",
        x_label: X_LABEL,
        y_label: "Latency (ms)",
    };
    let y_range = padded_range(percentiles.iter().flatten().map(|(_, y)| *y));

    let mut chart = build_chart(panel, typography, &axes, x_range, y_range)?;
    draw_mesh(&mut chart, typography, &axes, None)?;

    let styles = [
        ("P50", GREEN, Marker::Circle),
        ("P95", ORANGE, Marker::Square),
        ("P99", RED, Marker::Triangle),
    ];
    for (points, (label, color, marker)) in percentiles.iter().zip(styles) {
        draw_line(
            &mut chart,
            typography,
            points,
            typography.line(&color, 2.0),
            Some(label),
        )?;
        draw_markers(&mut chart, points, marker, color, typography.px_u32(2.5))?;
    }

    draw_legend(&mut chart, typography, SeriesLabelPosition::UpperLeft)
}

fn draw_scaling_efficiency(
    panel: &Panel<'_>,
    typography: &Typography,
    x_range: Range<f64>,
    per_client: &[(f64, f64)],
    mean: f64,
) -> anyhow::Result<()> {
    let axes = Axes {
        title: "Scaling Efficiency",
        x_label: X_LABEL,
        y_label: "Throughput per Client (ops/sec)",
    };
    let y_range = padded_range(
        per_client
            .iter()
            .map(|(_, y)| *y)
            .chain(std::iter::once(mean)),
    );

    let mut chart = build_chart(panel, typography, &axes, x_range.clone(), y_range)?;
    draw_mesh(&mut chart, typography, &axes, None)?;
    draw_line(
        &mut chart,
        typography,
        per_client,
        typography.line(&MAGENTA, 2.0),
        None,
    )?;
    draw_markers(
        &mut chart,
        per_client,
        Marker::Circle,
        MAGENTA,
        typography.px_u32(3.0),
    )?;
    draw_dashed(
        &mut chart,
        typography,
        (x_range.start, mean),
        (x_range.end, mean),
        typography.line(&BLUE.mix(0.7), 1.5),
        Some(&format!("Mean: {mean:.2}")),
    )?;

    draw_legend(&mut chart, typography, SeriesLabelPosition::UpperRight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::fonts::{register_fonts, test_font};
    use polars::prelude::df;

    fn five_levels() -> anyhow::Result<DataFrame> {
        Ok(df! [
            "concurrent_clients" => [1i64, 2, 4, 8, 16],
            "throughput" => [100.0, 190.0, 370.0, 700.0, 1300.0],
            "latency_p50_ms" => [10i64, 12, 15, 25, 50],
            "latency_p95_ms" => [20i64, 24, 30, 55, 110],
            "latency_p99_ms" => [30i64, 35, 45, 80, 160],
        ]?)
    }

    #[test]
    fn throughput_per_client_of_five_levels() -> anyhow::Result<()> {
        let summary = summarize_saturation(&five_levels()?)?;

        assert_eq!(5, summary.data_points);
        pretty_assertions::assert_eq!(
            vec![100.0, 95.0, 92.5, 87.5, 81.25],
            summary.throughput_per_client
        );
        assert!((summary.throughput_per_client_stats.mean - 91.25).abs() < 1e-9);
        assert_eq!(81.25, summary.throughput_per_client_stats.min);
        assert_eq!(100.0, summary.throughput_per_client_stats.max);
        assert_eq!(1300.0, summary.peak_throughput);
        assert_eq!(1.0, summary.clients.min);
        assert_eq!(16.0, summary.clients.max);

        let std = summary.throughput_per_client_stats.std;
        assert!((std - 51.5625_f64.sqrt()).abs() < 1e-9);
        assert!((summary.scaling_cv - std / 91.25 * 100.0).abs() < 1e-9);

        Ok(())
    }

    #[test]
    fn latency_ranges_match_columns() -> anyhow::Result<()> {
        let summary = summarize_saturation(&five_levels()?)?;

        assert_eq!((10.0, 50.0), (summary.latency_p50.min, summary.latency_p50.max));
        assert_eq!((20.0, 110.0), (summary.latency_p95.min, summary.latency_p95.max));
        assert_eq!((30.0, 160.0), (summary.latency_p99.min, summary.latency_p99.max));

        Ok(())
    }

    #[test]
    fn linear_scaling_has_zero_cv() -> anyhow::Result<()> {
        let frame = df! [
            "concurrent_clients" => [1i64, 2, 4],
            "throughput" => [50.0, 100.0, 200.0],
            "latency_p50_ms" => [5i64, 5, 5],
            "latency_p95_ms" => [9i64, 9, 9],
            "latency_p99_ms" => [12i64, 12, 12],
        ]?;

        let summary = summarize_saturation(&frame)?;
        assert_eq!(50.0, summary.throughput_per_client_stats.mean);
        assert_eq!(0.0, summary.scaling_cv);

        Ok(())
    }

    #[test]
    fn missing_latency_column_is_an_error() -> anyhow::Result<()> {
        let frame = df! [
            "concurrent_clients" => [1i64, 2],
            "throughput" => [50.0, 100.0],
        ]?;

        let err = summarize_saturation(&frame).unwrap_err();
        assert!(format!("{err:#}").contains("P50 latency range"));

        Ok(())
    }

    #[test]
    fn report_lists_scaling_and_latency() -> anyhow::Result<()> {
        let summary = summarize_saturation(&five_levels()?)?;

        let mut out = Vec::new();
        write_saturation_report(&mut out, &summary)?;
        let out = String::from_utf8(out)?;

        assert!(out.contains("Scaling Analysis:"));
        assert!(out.contains("  Mean throughput/client: 91.25 ops/sec/client"));
        assert!(out.contains("  Std deviation: 7.18"));
        assert!(out.contains("  Coefficient of variation: 7.9%"));
        assert!(out.contains("  P50 range: 10 - 50 ms"));
        assert!(out.contains("  P95 range: 20 - 110 ms"));
        assert!(out.contains("  P99 range: 30 - 160 ms"));

        Ok(())
    }

    #[test]
    fn load_report_shows_client_range() -> anyhow::Result<()> {
        let summary = summarize_saturation(&five_levels()?)?;

        let mut out = Vec::new();
        write_saturation_load_report(&mut out, Path::new("saturation.csv"), &summary)?;

        pretty_assertions::assert_eq!(
            "Loaded 5 data points from saturation.csv\nClient range: 1 to 16\n",
            String::from_utf8(out)?
        );

        Ok(())
    }

    #[test]
    fn table_rows() -> anyhow::Result<()> {
        let summary = summarize_saturation(&five_levels()?)?;

        pretty_assertions::assert_eq!(
            vec![
                SummaryRow::new("Client Range", "1 - 16"),
                SummaryRow::new("Peak Throughput", "1300.0 ops/s"),
                SummaryRow::new("P50 Latency Range", "10 - 50 ms"),
                SummaryRow::new("P99 Latency Range", "30 - 160 ms"),
                SummaryRow::new("Throughput/Client", "91.25 ops/s/client"),
                SummaryRow::new("Scaling CV", "7.9%"),
            ],
            saturation_rows(&summary)
        );

        Ok(())
    }

    #[test]
    fn renders_without_text() -> anyhow::Result<()> {
        let frame = five_levels()?;
        let summary = summarize_saturation(&frame)?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("saturation.png");

        render_saturation(
            &frame,
            &summary,
            &path,
            &RenderOptions {
                dpi: 20,
                typography: Typography::new(false, 20),
            },
        )?;

        assert!(std::fs::metadata(&path)?.len() > 0);

        Ok(())
    }

    #[test]
    fn renders_with_text() -> anyhow::Result<()> {
        assert!(register_fonts(Some(&test_font()))?);

        let frame = five_levels()?;
        let summary = summarize_saturation(&frame)?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("saturation.png");

        render_saturation(
            &frame,
            &summary,
            &path,
            &RenderOptions {
                dpi: 30,
                typography: Typography::new(true, 30),
            },
        )?;

        assert!(std::fs::metadata(&path)?.len() > 0);

        Ok(())
    }
}
