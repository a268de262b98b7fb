use crate::frame::LoadError;
use crate::report::write_missing_input;
use crate::scenario::Benchmark;
use clap::Parser;
use std::path::PathBuf;

/// Summarise a stress test CSV file and render it as a dashboard image
#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct PlotArgs {
    /// CSV file written by the stress test, defaults to the file the test writes
    pub csv_file: Option<PathBuf>,

    /// Path of the dashboard image
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Resolution of the dashboard image
    #[arg(long, default_value_t = 300)]
    pub dpi: u32,

    /// Do not open the image once it is written
    #[arg(long)]
    pub no_show: bool,

    /// Also write the computed summary as JSON to this path
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// TrueType font for chart text, searched for in the system font directories if not set
    #[arg(long)]
    pub font: Option<PathBuf>,
}

impl PlotArgs {
    pub fn csv_file(&self, benchmark: Benchmark) -> PathBuf {
        self.csv_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(benchmark.default_csv()))
    }

    pub fn output(&self, benchmark: Benchmark) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(benchmark.default_output()))
    }
}

/// Run a dashboard binary, exiting with status `1` on failure.
///
/// A missing input file is reported on stdout with a hint on how to produce it, any other error
/// is printed to stderr with its context chain.
pub fn run_or_exit(benchmark: Benchmark, args: &PlotArgs) {
    let Err(e) = crate::run(benchmark, args) else {
        return;
    };

    if let Some(LoadError::MissingInput { path, producer }) = e.downcast_ref::<LoadError>() {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = write_missing_input(&mut stdout, path, producer) {
            log::error!("Failed to write error message: {e}");
        }
    } else {
        eprintln!("Error: {e:?}");
    }

    std::process::exit(1);
}
