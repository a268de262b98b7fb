use crate::frame::{float_column, optional_values};
use anyhow::Context;
use polars::frame::DataFrame;
use polars::prelude::*;
use tables_stress_summary_model::{LinearTrend, RangeStats, StandardRatioStats};

pub(crate) fn standard_ratio_stats(
    frame: &DataFrame,
    column: &str,
) -> anyhow::Result<StandardRatioStats> {
    let values = float_column(frame, column)?;
    if values.is_empty() {
        anyhow::bail!("No data points in column {column}");
    }

    let mean = values.mean().context("Mean")?;
    // A single data point has no sample deviation
    let std = values.std(1).filter(|std| std.is_finite()).unwrap_or(0.0);
    let min = values.min().context("Min")?;
    let max = values.max().context("Max")?;

    Ok(StandardRatioStats {
        mean,
        std,
        min,
        max,
    })
}

pub(crate) fn range_stats(frame: &DataFrame, column: &str) -> anyhow::Result<RangeStats> {
    let values = float_column(frame, column)?;

    Ok(RangeStats {
        min: values
            .min()
            .with_context(|| format!("No minimum for column {column}"))?,
        max: values
            .max()
            .with_context(|| format!("No maximum for column {column}"))?,
    })
}

/// Add a column with the row-wise ratio of two numeric columns.
pub(crate) fn with_ratio(
    frame: &DataFrame,
    numerator: &str,
    denominator: &str,
    alias: &str,
) -> anyhow::Result<DataFrame> {
    let out = frame
        .clone()
        .lazy()
        .with_column(
            (col(numerator).cast(DataType::Float64) / col(denominator).cast(DataType::Float64))
                .alias(alias),
        )
        .collect()?;

    Ok(out)
}

/// Least squares fit of `y` against `x`.
///
/// Pairs where either value is not finite are skipped. When `x` has no spread the slope is `0`,
/// and when `y` has no spread the fit explains nothing so `r_squared` is `0`.
pub(crate) fn linear_trend(x: &[f64], y: &[f64]) -> LinearTrend {
    let points = x
        .iter()
        .zip(y.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect::<Vec<_>>();

    if points.is_empty() {
        return LinearTrend {
            slope: 0.0,
            intercept: 0.0,
            r_squared: 0.0,
        };
    }

    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let numerator: f64 = points
        .iter()
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let denominator: f64 = points.iter().map(|(x, _)| (x - x_mean).powi(2)).sum();

    let slope = if within_rounding(denominator, points.iter().map(|(x, _)| *x)) {
        0.0
    } else {
        numerator / denominator
    };
    let intercept = y_mean - slope * x_mean;

    let ss_res: f64 = points
        .iter()
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let ss_tot: f64 = points.iter().map(|(_, y)| (y - y_mean).powi(2)).sum();

    let r_squared = if within_rounding(ss_tot, points.iter().map(|(_, y)| *y)) {
        0.0
    } else {
        1.0 - (ss_res / ss_tot)
    };

    LinearTrend {
        slope,
        intercept,
        r_squared,
    }
}

/// Whether a sum of squared deviations from the mean is only rounding error, relative to the
/// magnitude of the values it was computed from.
fn within_rounding(sum_of_squares: f64, values: impl Iterator<Item = f64>) -> bool {
    let (count, largest) = values.fold((0.0, 0.0_f64), |(count, largest), v| {
        (count + 1.0, largest.max(v.abs()))
    });
    let tolerance = count * f64::EPSILON * largest;

    sum_of_squares <= count * tolerance * tolerance
}

/// Centered rolling mean and sample standard deviation of a column.
///
/// A value is only produced where the full window fits, so the first and last `window / 2` rows
/// are `None`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RollingStats {
    pub window: usize,
    pub mean: Vec<Option<f64>>,
    pub std: Vec<Option<f64>>,
}

pub(crate) fn rolling_stats(
    frame: &DataFrame,
    column: &str,
    window: usize,
) -> anyhow::Result<RollingStats> {
    let window = window.max(1);
    let options = RollingOptionsFixedWindow {
        window_size: window,
        min_periods: window,
        center: true,
        ..Default::default()
    };

    let out = frame
        .clone()
        .lazy()
        .select([
            col(column)
                .cast(DataType::Float64)
                .rolling_mean(options.clone())
                .alias("rolling_mean"),
            col(column)
                .cast(DataType::Float64)
                .rolling_std(options)
                .alias("rolling_std"),
        ])
        .collect()
        .with_context(|| format!("Rolling window over {column}"))?;

    Ok(RollingStats {
        window,
        mean: optional_values(&out, "rolling_mean")?,
        std: optional_values(&out, "rolling_std")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;

    #[test]
    fn ratio_stats_match_column() -> anyhow::Result<()> {
        let frame = df! [
            "value" => [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0],
        ]?;

        let stats = standard_ratio_stats(&frame, "value")?;
        assert_eq!(5.0, stats.mean);
        // Sample deviation, sum of squares is 32 over 7 degrees of freedom
        assert!((stats.std - (32.0_f64 / 7.0).sqrt()).abs() < 1e-9);
        assert_eq!(2.0, stats.min);
        assert_eq!(9.0, stats.max);

        Ok(())
    }

    #[test]
    fn ratio_stats_of_integer_column() -> anyhow::Result<()> {
        let frame = df! [
            "latency_p99_ms" => [30i64, 10, 20],
        ]?;

        let stats = standard_ratio_stats(&frame, "latency_p99_ms")?;
        assert_eq!(20.0, stats.mean);
        assert_eq!(10.0, stats.min);
        assert_eq!(30.0, stats.max);

        Ok(())
    }

    #[test]
    fn single_value_has_zero_std() -> anyhow::Result<()> {
        let frame = df! [
            "value" => [42.0],
        ]?;

        let stats = standard_ratio_stats(&frame, "value")?;
        assert_eq!(42.0, stats.mean);
        assert_eq!(0.0, stats.std);

        Ok(())
    }

    #[test]
    fn identical_values_have_zero_cv() -> anyhow::Result<()> {
        let frame = df! [
            "value" => [12.5, 12.5, 12.5, 12.5],
        ]?;

        let stats = standard_ratio_stats(&frame, "value")?;
        assert_eq!(0.0, stats.std);
        assert_eq!(0.0, stats.coefficient_of_variation());

        Ok(())
    }

    #[test]
    fn empty_column_is_an_error() -> anyhow::Result<()> {
        let frame = df! [
            "value" => Vec::<f64>::new(),
        ]?;

        assert!(standard_ratio_stats(&frame, "value").is_err());
        assert!(range_stats(&frame, "value").is_err());

        Ok(())
    }

    #[test]
    fn range_matches_min_and_max() -> anyhow::Result<()> {
        let frame = df! [
            "latency_p50_ms" => [14i64, 9, 31, 22, 9],
        ]?;

        let range = range_stats(&frame, "latency_p50_ms")?;
        assert_eq!(9.0, range.min);
        assert_eq!(31.0, range.max);

        Ok(())
    }

    #[test]
    fn ratio_column_is_row_wise() -> anyhow::Result<()> {
        let frame = df! [
            "throughput" => [100.0, 190.0, 370.0],
            "concurrent_clients" => [1i64, 2, 4],
        ]?;

        let frame = with_ratio(&frame, "throughput", "concurrent_clients", "per_client")?;
        let values = frame
            .column("per_client")?
            .f64()?
            .into_iter()
            .map(|v| v.unwrap())
            .collect::<Vec<_>>();
        assert_eq!(vec![100.0, 95.0, 92.5], values);

        Ok(())
    }

    #[test]
    fn trend_of_exact_line() {
        let x = [0.0, 10.0, 20.0, 30.0];
        let y = [5.0, 25.0, 45.0, 65.0];

        let trend = linear_trend(&x, &y);
        assert!((trend.slope - 2.0).abs() < 1e-9);
        assert!((trend.intercept - 5.0).abs() < 1e-9);
        assert!((trend.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn trend_of_flat_line() {
        let x = [10.0, 20.0, 30.0, 40.0, 50.0];
        let y = [250.0; 5];

        let trend = linear_trend(&x, &y);
        assert!(trend.slope.abs() < 1e-12);
        assert_eq!(0.0, trend.r_squared);
        assert!((trend.intercept - 250.0).abs() < 1e-9);
    }

    #[test]
    fn trend_with_no_spread_in_x() {
        let trend = linear_trend(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]);
        assert_eq!(0.0, trend.slope);
        assert_eq!(2.0, trend.intercept);
        assert_eq!(0.0, trend.r_squared);
    }

    #[test]
    fn trend_of_small_magnitudes() {
        let trend = linear_trend(&[0.0, 1.0, 2.0, 3.0], &[0.0, 2e-12, 4e-12, 6e-12]);
        assert!((trend.slope / 2e-12 - 1.0).abs() < 1e-9);
        assert!((trend.r_squared - 1.0).abs() < 1e-9);

        let trend = linear_trend(&[0.0, 1e-9, 2e-9, 3e-9], &[1.0, 3.0, 5.0, 7.0]);
        assert!((trend.slope / 2e9 - 1.0).abs() < 1e-9);
        assert!((trend.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn trend_of_small_spread_around_large_values() {
        let trend = linear_trend(&[1.0, 2.0, 3.0], &[1e9, 1e9 + 1.0, 1e9 + 2.0]);
        assert!((trend.slope - 1.0).abs() < 1e-6);
        assert!((trend.r_squared - 1.0).abs() < 1e-6);
    }

    #[test]
    fn trend_of_inexact_constant_is_flat() {
        let trend = linear_trend(&[1.0, 2.0, 3.0], &[0.1, 0.1, 0.1]);
        assert!(trend.slope.abs() < 1e-12);
        assert_eq!(0.0, trend.r_squared);

        let trend = linear_trend(&[0.0, 0.0], &[0.0, 0.0]);
        assert_eq!(0.0, trend.slope);
        assert_eq!(0.0, trend.r_squared);
    }

    #[test]
    fn trend_skips_missing_values() {
        let x = [0.0, 1.0, f64::NAN, 3.0];
        let y = [1.0, 3.0, 100.0, 7.0];

        let trend = linear_trend(&x, &y);
        assert!((trend.slope - 2.0).abs() < 1e-9);
        assert!((trend.intercept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn trend_of_unordered_x_still_fits() {
        let x = [30.0, 10.0, 20.0, 0.0];
        let y = [65.0, 25.0, 45.0, 5.0];

        let trend = linear_trend(&x, &y);
        assert!((trend.slope - 2.0).abs() < 1e-9);
    }

    #[test]
    fn trend_of_nothing() {
        let trend = linear_trend(&[], &[]);
        assert_eq!(0.0, trend.slope);
        assert_eq!(0.0, trend.r_squared);
    }

    #[test]
    fn rolling_window_is_centered() -> anyhow::Result<()> {
        let frame = df! [
            "window_throughput" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
        ]?;

        let rolling = rolling_stats(&frame, "window_throughput", 5)?;
        assert_eq!(5, rolling.window);
        assert_eq!(
            vec![None, None, Some(3.0), Some(4.0), Some(5.0), None, None],
            rolling.mean
        );
        let std = rolling.std[3].unwrap();
        assert!((std - 2.5_f64.sqrt()).abs() < 1e-9);
        assert_eq!(None, rolling.std[0]);

        Ok(())
    }

    #[test]
    fn rolling_window_over_every_row() -> anyhow::Result<()> {
        let frame = df! [
            "window_throughput" => [10.0, 20.0, 30.0],
        ]?;

        let rolling = rolling_stats(&frame, "window_throughput", 3)?;
        assert_eq!(vec![None, Some(20.0), None], rolling.mean);

        Ok(())
    }
}
