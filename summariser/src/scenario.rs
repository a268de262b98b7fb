use crate::render::FigureLayout;
use std::fmt::{Display, Formatter};

mod saturation;
mod sustained;

pub(crate) use saturation::{
    render_saturation, saturation_rows, summarize_saturation, write_saturation_load_report,
    write_saturation_report,
};
pub(crate) use sustained::{
    render_sustained, summarize_sustained, sustained_rows, write_sustained_load_report,
    write_sustained_report,
};

pub(crate) const CONCURRENT_CLIENTS: &str = "concurrent_clients";
pub(crate) const THROUGHPUT: &str = "throughput";
pub(crate) const THROUGHPUT_PER_CLIENT: &str = "throughput_per_client";
pub(crate) const ELAPSED_SECS: &str = "elapsed_secs";
pub(crate) const WINDOW_THROUGHPUT: &str = "window_throughput";
pub(crate) const CUMULATIVE_OPS: &str = "cumulative_ops";
pub(crate) const ERROR_RATE: &str = "error_rate";
pub(crate) const CUMULATIVE_ERROR_RATE: &str = "cumulative_error_rate";
pub(crate) const LATENCY_P50: &str = "latency_p50_ms";
pub(crate) const LATENCY_P95: &str = "latency_p95_ms";
pub(crate) const LATENCY_P99: &str = "latency_p99_ms";

/// The stress test whose results are being summarised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Benchmark {
    /// Sweep of concurrent clients, one row per concurrency level
    Saturation,
    /// Fixed concurrency over time, one row per sampling window
    Sustained,
}

impl Benchmark {
    pub fn name(&self) -> &'static str {
        match self {
            Benchmark::Saturation => "throughput_saturation",
            Benchmark::Sustained => "sustained_load",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Benchmark::Saturation => "S3 Tables Throughput Saturation Analysis",
            Benchmark::Sustained => "S3 Tables Sustained Load Analysis",
        }
    }

    pub fn default_csv(&self) -> &'static str {
        match self {
            Benchmark::Saturation => "tables_throughput_saturation.csv",
            Benchmark::Sustained => "tables_sustained_load.csv",
        }
    }

    pub fn default_output(&self) -> &'static str {
        match self {
            Benchmark::Saturation => "tables_saturation_analysis.png",
            Benchmark::Sustained => "tables_sustained_load_analysis.png",
        }
    }

    /// The example that runs the stress test and writes the CSV file
    pub fn producer(&self) -> &'static str {
        match self {
            Benchmark::Saturation => "tables_stress_throughput_saturation",
            Benchmark::Sustained => "tables_stress_sustained_load",
        }
    }

    pub fn layout(&self) -> FigureLayout {
        match self {
            Benchmark::Saturation => FigureLayout {
                title: self.title(),
                width_in: 14.0,
                height_in: 10.0,
                rows: 2,
                cols: 2,
            },
            Benchmark::Sustained => FigureLayout {
                title: self.title(),
                width_in: 16.0,
                height_in: 12.0,
                rows: 3,
                cols: 2,
            },
        }
    }
}

impl Display for Benchmark {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
