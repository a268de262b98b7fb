use serde::{Deserialize, Deserializer, Serialize};
use sha3::Digest;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Mean, spread and bounds of a numeric series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StandardRatioStats {
    #[serde(deserialize_with = "f64_or_nan")]
    pub mean: f64,
    /// Sample standard deviation.
    ///
    /// A series with a single value has no sample deviation, this is reported as `0.0`.
    #[serde(deserialize_with = "f64_or_nan")]
    pub std: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub min: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub max: f64,
}

impl StandardRatioStats {
    /// The coefficient of variation, `std / mean`, as a percentage.
    ///
    /// Reported as `0.0` when the mean is not positive rather than dividing by it.
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean > 0.0 {
            (self.std / self.mean) * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RangeStats {
    #[serde(deserialize_with = "f64_or_nan")]
    pub min: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub max: f64,
}

/// Ordinary least squares fit of `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LinearTrend {
    /// Change in `y` per unit of `x`, which is per second for all the time series here.
    #[serde(deserialize_with = "f64_or_nan")]
    pub slope: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub intercept: f64,
    /// Coefficient of determination of the fit
    #[serde(deserialize_with = "f64_or_nan")]
    pub r_squared: f64,
}

impl LinearTrend {
    pub fn slope_per_minute(&self) -> f64 {
        self.slope * 60.0
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Summary of a throughput saturation sweep, one data point per concurrency level
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaturationSummary {
    pub data_points: usize,
    pub clients: RangeStats,
    #[serde(deserialize_with = "f64_or_nan")]
    pub peak_throughput: f64,
    /// `throughput / concurrent_clients` for each data point, in input order
    #[serde(deserialize_with = "f64s_or_nan")]
    pub throughput_per_client: Vec<f64>,
    pub throughput_per_client_stats: StandardRatioStats,
    /// Coefficient of variation of the throughput per client, as a percentage
    #[serde(deserialize_with = "f64_or_nan")]
    pub scaling_cv: f64,
    pub latency_p50: RangeStats,
    pub latency_p95: RangeStats,
    pub latency_p99: RangeStats,
}

/// First, last and aggregate values of the P99 latency over a sustained run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatencyProgression {
    #[serde(deserialize_with = "f64_or_nan")]
    pub first: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub last: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub mean: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub max: f64,
}

/// Error rates over a sustained run, all as percentages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ErrorRateStats {
    #[serde(deserialize_with = "f64_or_nan")]
    pub mean_pct: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub max_pct: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub final_cumulative_pct: f64,
}

/// Summary of a sustained load run, one data point per sampling window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SustainedSummary {
    pub data_points: usize,
    #[serde(deserialize_with = "f64_or_nan")]
    pub max_elapsed_secs: f64,
    /// Elapsed time of the last sampling window
    #[serde(deserialize_with = "f64_or_nan")]
    pub final_elapsed_secs: f64,
    /// Cumulative operation count at the last sampling window
    #[serde(deserialize_with = "f64_or_nan")]
    pub total_ops: f64,
    /// Operations per second over the whole run.
    ///
    /// This is `0.0` if the last window reports no elapsed time.
    #[serde(deserialize_with = "f64_or_nan")]
    pub avg_throughput: f64,
    pub window_throughput: StandardRatioStats,
    /// Coefficient of variation of the window throughput, as a percentage
    #[serde(deserialize_with = "f64_or_nan")]
    pub throughput_cv: f64,
    pub throughput_trend: LinearTrend,
    pub latency_p99: LatencyProgression,
    pub latency_p99_trend: LinearTrend,
    pub error_rate: ErrorRateStats,
}

/// The output of one dashboard run, suitable for storing alongside the rendered image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryOutput {
    /// Name of the benchmark the input was produced by
    pub benchmark: String,
    /// Path of the CSV file that was summarised
    pub source: PathBuf,
    /// Fingerprint of the CSV content, see [fingerprint_source]
    pub source_fingerprint: String,
    /// Path of the rendered dashboard image
    pub image: PathBuf,
    /// RFC 3339 timestamp of when the summary was produced
    pub generated_at: String,
    pub data: serde_json::Value,
}

impl SummaryOutput {
    pub fn new<V>(
        benchmark: impl Into<String>,
        source: &Path,
        image: &Path,
        data: V,
    ) -> anyhow::Result<Self>
    where
        V: serde::Serialize,
    {
        Ok(Self {
            benchmark: benchmark.into(),
            source: source.to_path_buf(),
            source_fingerprint: fingerprint_source(source)?,
            image: image.to_path_buf(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Deserialize the summary data into its typed form
    pub fn data_as<V>(&self) -> anyhow::Result<V>
    where
        V: serde::de::DeserializeOwned,
    {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Read a float written by `serde_json`, which stores NaN and infinities as `null`.
///
/// Non-finite values come back as NaN.
fn f64_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn f64s_or_nan<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Vec::<Option<f64>>::deserialize(deserializer)?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Compute a fingerprint of a source file
///
/// The fingerprint identifies the data set a summary was computed from, so that two summaries can
/// be compared knowing whether they describe the same run. It is computed using
/// [sha3::Sha3_256] over the file content.
pub fn fingerprint_source(path: &Path) -> anyhow::Result<String> {
    let content = std::fs::read(path)?;
    let mut hasher = sha3::Sha3_256::new();
    Digest::update(&mut hasher, &content);

    Ok(format!("{:x}", hasher.finalize()))
}

/// Serialize the summary output to a writer as pretty printed JSON
pub fn store_summary_output<W: Write>(
    output: &SummaryOutput,
    writer: &mut W,
) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(writer, output)?;
    Ok(())
}

/// Load a summary output from a reader
pub fn load_summary_output<R: Read>(reader: R) -> anyhow::Result<SummaryOutput> {
    let reader = std::io::BufReader::new(reader);
    let output: SummaryOutput = serde_json::from_reader(reader)?;
    Ok(output)
}
