use crate::scenario::Benchmark;
use anyhow::Context;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("CSV file '{}' not found", path.display())]
    MissingInput {
        path: PathBuf,
        /// The stress test example that writes this file
        producer: &'static str,
    },
}

/// Load the results written by a stress test into a [`DataFrame`].
///
/// Only the existence of the file is checked up front. A file that does not parse, or that lacks
/// the columns a summary needs, fails later with the underlying polars error.
pub fn load_csv(path: &Path, benchmark: Benchmark) -> anyhow::Result<DataFrame> {
    if !path.exists() {
        return Err(LoadError::MissingInput {
            path: path.to_path_buf(),
            producer: benchmark.producer(),
        }
        .into());
    }

    log::debug!("Loading {benchmark} results from {}", path.display());

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("Failed to parse CSV file {}", path.display()))?;

    log::debug!(
        "Loaded {} rows with columns {:?}",
        frame.height(),
        frame.get_column_names()
    );

    Ok(frame)
}

/// Get a numeric column as [`Float64Chunked`], whatever numeric type it was parsed as.
///
/// The stress tests write latencies as integers and rates as decimals, so every column is cast
/// before use.
pub(crate) fn float_column(frame: &DataFrame, column: &str) -> anyhow::Result<Float64Chunked> {
    let series = frame
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .with_context(|| format!("Column {column} is not numeric"))?;

    Ok(series.f64()?.clone())
}

/// Get a numeric column as a vector of values, with nulls as `NaN`.
pub(crate) fn float_values(frame: &DataFrame, column: &str) -> anyhow::Result<Vec<f64>> {
    Ok(float_column(frame, column)?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Get a numeric column as a vector of optional values, keeping nulls.
pub(crate) fn optional_values(
    frame: &DataFrame,
    column: &str,
) -> anyhow::Result<Vec<Option<f64>>> {
    Ok(float_column(frame, column)?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;
    use std::io::Write;

    #[test]
    fn missing_file_names_path_and_producer() {
        let path = Path::new("does/not/exist/tables_sustained_load.csv");
        let err = load_csv(path, Benchmark::Sustained).unwrap_err();

        let Some(LoadError::MissingInput { path: missing, producer }) =
            err.downcast_ref::<LoadError>()
        else {
            panic!("Expected a missing input error, got {err:?}");
        };
        assert_eq!(path, missing.as_path());
        assert_eq!("tables_stress_sustained_load", *producer);
        assert!(err.to_string().contains("does/not/exist/tables_sustained_load.csv"));
    }

    #[test]
    fn load_csv_reads_header_and_rows() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::with_suffix(".csv")?;
        writeln!(file, "concurrent_clients,throughput,latency_p50_ms")?;
        writeln!(file, "1,100.50,12")?;
        writeln!(file, "2,190.25,14")?;
        file.flush()?;

        let frame = load_csv(file.path(), Benchmark::Saturation)?;
        assert_eq!(2, frame.height());
        assert_eq!(vec![12.0, 14.0], float_values(&frame, "latency_p50_ms")?);
        assert_eq!(vec![100.5, 190.25], float_values(&frame, "throughput")?);

        Ok(())
    }

    #[test]
    fn unknown_column_is_an_error() {
        let frame = df! [
            "throughput" => [1.0, 2.0],
        ]
        .unwrap();

        assert!(float_values(&frame, "latency_p99_ms").is_err());
    }

    #[test]
    fn nulls_are_kept_as_none() -> anyhow::Result<()> {
        let frame = df! [
            "value" => [Some(1.0), None, Some(3.0)],
        ]?;

        assert_eq!(vec![Some(1.0), None, Some(3.0)], optional_values(&frame, "value")?);
        let values = float_values(&frame, "value")?;
        assert!(values[1].is_nan());

        Ok(())
    }
}
