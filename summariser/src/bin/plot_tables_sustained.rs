use clap::Parser;
use tables_stress_summariser::cli::{run_or_exit, PlotArgs};
use tables_stress_summariser::scenario::Benchmark;

fn main() {
    env_logger::init();

    let args = PlotArgs::parse();
    run_or_exit(Benchmark::Sustained, &args);
}
