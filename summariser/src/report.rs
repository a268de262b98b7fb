use std::io::Write;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};

const SEPARATOR_WIDTH: usize = 70;

/// One metric of the summary table, shown both on stdout and in the dashboard image.
#[derive(Tabled, Debug, Clone, PartialEq)]
pub struct SummaryRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl SummaryRow {
    pub fn new(metric: &str, value: impl Into<String>) -> Self {
        Self {
            metric: metric.to_string(),
            value: value.into(),
        }
    }
}

/// Write a title framed by separator lines.
pub fn write_banner<W: Write>(out: &mut W, title: &str) -> std::io::Result<()> {
    let separator = "=".repeat(SEPARATOR_WIDTH);
    writeln!(out, "{separator}")?;
    writeln!(out, "{title}")?;
    writeln!(out, "{separator}")
}

/// Write a banner separated from the previous output by a blank line.
pub fn write_section_banner<W: Write>(out: &mut W, title: &str) -> std::io::Result<()> {
    writeln!(out)?;
    write_banner(out, title)
}

pub fn write_summary_table<W: Write>(out: &mut W, rows: &[SummaryRow]) -> std::io::Result<()> {
    let mut table = Table::new(rows);
    table.with(Style::modern());

    writeln!(out, "\nSummary Statistics")?;
    writeln!(out, "{table}")
}

pub fn write_missing_input<W: Write>(
    out: &mut W,
    path: &Path,
    producer: &str,
) -> std::io::Result<()> {
    writeln!(out, "Error: CSV file '{}' not found.", path.display())?;
    writeln!(out, "Run the stress test first:")?;
    writeln!(out, "  cargo run --example {producer}")
}

/// Format a count with comma separated thousands, rounded to a whole number.
pub fn group_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    if !value.is_finite() {
        return digits;
    }

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if value < 0.0 && digits != "0" {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Short axis label for large operation counts, `250K` or `1.5M`.
pub fn format_ops_axis(value: f64) -> String {
    if value < 1e6 {
        format!("{:.0}K", value / 1000.0)
    } else {
        format!("{:.1}M", value / 1e6)
    }
}
