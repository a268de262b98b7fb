use crate::render::{Panel, Typography};
use crate::report::SummaryRow;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

const HEADER_FILL: RGBColor = RGBColor(0x4C, 0xAF, 0x50);
const SPACER_FILL: RGBColor = RGBColor(0xF0, 0xF0, 0xF0);
const METRIC_WIDTH: f64 = 0.6;

/// Text size and row height of a summary table, rows are `row_scale` times the text height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TableStyle {
    pub font_pt: f64,
    pub row_scale: f64,
}

/// Draw the metric table that closes every dashboard.
///
/// The header is followed by an empty spacer row before the metrics.
pub(crate) fn draw_summary_table(
    panel: &Panel<'_>,
    typography: &Typography,
    table: TableStyle,
    rows: &[SummaryRow],
) -> anyhow::Result<()> {
    let (width, height) = panel.dim_in_pixel();
    let (width, height) = (width as i32, height as i32);

    let mut top = typography.px_i32(4.0);
    if typography.has_text() {
        panel.draw(&Text::new(
            "Summary Statistics",
            (width / 2, top),
            typography
                .bold(13.0)
                .pos(Pos::new(HPos::Center, VPos::Top)),
        ))?;
        top += typography.px_i32(26.0);
    }

    let row_height = (typography.px(table.font_pt) * table.row_scale).round().max(2.0) as i32;
    let left = width / 20;
    let right = width - left;
    let split = left + ((right - left) as f64 * METRIC_WIDTH).round() as i32;
    let padding = typography.px_i32(6.0);
    let border = BLACK.mix(0.4).stroke_width(1);

    let draw_row = |index: i32,
                    fill: RGBColor,
                    cells: Option<(&str, &str)>,
                    style: &TextStyle<'static>|
     -> anyhow::Result<()> {
        let y0 = top + index * row_height;
        let y1 = (y0 + row_height).min(height - 1);
        if y0 >= height {
            log::warn!("Summary table does not fit its panel, dropping rows");
            return Ok(());
        }

        for (x0, x1) in [(left, split), (split, right)] {
            panel.draw(&Rectangle::new([(x0, y0), (x1, y1)], fill.filled()))?;
            panel.draw(&Rectangle::new([(x0, y0), (x1, y1)], border))?;
        }

        if let (Some((metric, value)), true) = (cells, typography.has_text()) {
            let middle = (y0 + y1) / 2;
            let style = style.pos(Pos::new(HPos::Left, VPos::Center));
            panel.draw(&Text::new(metric, (left + padding, middle), style.clone()))?;
            panel.draw(&Text::new(value, (split + padding, middle), style))?;
        }

        Ok(())
    };

    let header = typography.bold(table.font_pt).color(&WHITE);
    let body = typography.regular(table.font_pt);

    draw_row(0, HEADER_FILL, Some(("Metric", "Value")), &header)?;
    draw_row(1, SPACER_FILL, None, &body)?;
    for (i, row) in rows.iter().enumerate() {
        draw_row(
            i as i32 + 2,
            WHITE,
            Some((row.metric.as_str(), row.value.as_str())),
            &body,
        )?;
    }

    Ok(())
}
