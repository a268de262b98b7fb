use crate::cli::PlotArgs;
use crate::frame::load_csv;
use crate::render::{fonts, RenderOptions, Typography};
use crate::report::{write_banner, write_section_banner, write_summary_table};
use crate::scenario::*;
use anyhow::Context;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tables_stress_summary_model::{store_summary_output, SummaryOutput};

mod analyze;
pub mod cli;
pub mod frame;
mod render;
pub mod report;
pub mod scenario;
mod viewer;

pub use render::FigureLayout;

/// Summarise the results of a stress test, report to stdout and render the dashboard image.
pub fn run(benchmark: Benchmark, args: &PlotArgs) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_with_writer(benchmark, args, &mut out)?;

    if !args.no_show {
        viewer::show(&args.output(benchmark));
    }

    Ok(())
}

/// Produce the report and dashboard for `benchmark`, writing the report to `out`.
///
/// The image is never shown, see [`run`] for that.
pub fn run_with_writer<W: Write>(
    benchmark: Benchmark,
    args: &PlotArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let source = args.csv_file(benchmark);
    let image = args.output(benchmark);

    write_banner(out, benchmark.title())?;

    let frame = load_csv(&source, benchmark)?;

    let has_text = fonts::register_fonts(args.font.as_deref()).context("Register fonts")?;
    let options = RenderOptions {
        dpi: args.dpi,
        typography: Typography::new(has_text, args.dpi),
    };

    let output = match benchmark {
        Benchmark::Saturation => {
            let summary = summarize_saturation(&frame).context("Saturation summary")?;
            write_saturation_load_report(out, &source, &summary)?;
            write_saturation_report(out, &summary)?;
            write_summary_table(out, &saturation_rows(&summary))?;

            write_generating(out)?;
            render_saturation(&frame, &summary, &image, &options)
                .context("Render saturation dashboard")?;

            SummaryOutput::new(benchmark.name(), &source, &image, summary)?
        }
        Benchmark::Sustained => {
            let summary = summarize_sustained(&frame).context("Sustained load summary")?;
            write_sustained_load_report(out, &source, &summary)?;
            write_sustained_report(out, &summary)?;
            write_summary_table(out, &sustained_rows(&summary))?;

            write_generating(out)?;
            render_sustained(&frame, &summary, &image, &options)
                .context("Render sustained load dashboard")?;

            SummaryOutput::new(benchmark.name(), &source, &image, summary)?
        }
    };

    writeln!(out, "\nVisualization saved to: {}", image.display())?;

    if let Some(path) = &args.summary_json {
        write_summary_json(path, &output)?;
        writeln!(out, "Summary written to: {}", path.display())?;
    }

    write_section_banner(out, "Analysis Complete!")?;

    Ok(())
}

fn write_generating<W: Write>(out: &mut W) -> std::io::Result<()> {
    write_section_banner(out, "Generating Visualizations...")
}

fn write_summary_json(path: &Path, output: &SummaryOutput) -> anyhow::Result<()> {
    log::debug!("Writing summary to {}", path.display());

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create summary file {}", path.display()))?;
    store_summary_output(output, &mut file)?;
    writeln!(file)?;

    Ok(())
}
