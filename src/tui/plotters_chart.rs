//! Plotters-powered price chart widget for Ratatui.
//!
//! Plotters gives nicer axes than Ratatui's built-in `Chart` widget; its output
//! is drawn into the Ratatui buffer through `plotters-ratatui-backend`.

use chrono::NaiveDate;
use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Render-only chart description. x is the bar index into `dates`.
pub struct PricePlottersChart<'a> {
    /// Daily closes.
    pub close: &'a [(f64, f64)],
    pub sma_short: &'a [(f64, f64)],
    pub sma_long: &'a [(f64, f64)],
    /// Horizontal YTD-low level.
    pub ytd_low: f64,
    pub dates: &'a [NaiveDate],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub y_label: &'a str,
}

impl<'a> Widget for PricePlottersChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to build a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let x0 = self.x_bounds[0];
        let x1 = self.x_bounds[1];
        let y0 = self.y_bounds[0];
        let y1 = self.y_bounds[1];

        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let dates = self.dates;
        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            // Mesh lines are noise at terminal resolution.
            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc("date")
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| date_label(dates, *v))
                .y_label_formatter(&|v| format!("{v:.0}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let close_color = WHITE;
            let short_color = RGBColor(0, 255, 255); // cyan
            let long_color = RGBColor(255, 255, 0); // yellow
            let low_color = RGBColor(255, 0, 0); // red

            chart.draw_series(LineSeries::new(
                [(x0, self.ytd_low), (x1, self.ytd_low)],
                &low_color,
            ))?;
            chart.draw_series(LineSeries::new(self.sma_long.iter().copied(), &long_color))?;
            chart.draw_series(LineSeries::new(self.sma_short.iter().copied(), &short_color))?;
            chart.draw_series(LineSeries::new(self.close.iter().copied(), &close_color))?;

            Ok(())
        });

        widget.render(area, buf);
    }
}

/// `MM-DD` of the bar nearest to `x`.
pub fn date_label(dates: &[NaiveDate], x: f64) -> String {
    if dates.is_empty() || !x.is_finite() {
        return String::new();
    }
    let idx = (x.round().max(0.0) as usize).min(dates.len() - 1);
    dates[idx].format("%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_label_clamps_to_history() {
        let d0 = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let dates = vec![d0, d0.succ_opt().unwrap(), NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()];
        assert_eq!(date_label(&dates, 0.4), "03-03");
        assert_eq!(date_label(&dates, 1.0), "03-04");
        assert_eq!(date_label(&dates, 99.0), "03-05");
        assert_eq!(date_label(&dates, -3.0), "03-03");
        assert_eq!(date_label(&[], 1.0), "");
    }
}
