//! ASCII price charts for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements, in drawing priority:
//! - closes: `*`
//! - simple moving average: `.`
//! - YTD-low level: `_`

use crate::analysis::{clean_history, ytd_summary};
use crate::domain::PriceBar;
use crate::math::sma_series;

/// Render closes, their SMA and the YTD-low level on a `width` x `height` grid.
pub fn render_price_chart(history: &[PriceBar], sma_window: usize, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let bars = clean_history(history);
    let (Some(first), Some(last), Some(summary)) = (bars.first(), bars.last(), ytd_summary(&bars)) else {
        return "Chart: no price history\n".to_string();
    };

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let close_path: Vec<(f64, f64)> = closes.iter().enumerate().map(|(i, &c)| (i as f64, c)).collect();
    let sma_path: Vec<(f64, f64)> = sma_series(&closes, sma_window)
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect();

    let x_max = (closes.len() as f64 - 1.0).max(1.0);
    let (y_min, y_max) = y_range(
        close_path
            .iter()
            .chain(sma_path.iter())
            .map(|&(_, y)| y)
            .chain(std::iter::once(summary.ytd_low)),
    );
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    let frame = Frame {
        x_max,
        y_min,
        y_max,
        width,
        height,
    };

    draw_path(&mut grid, &close_path, &frame, '*');
    draw_path(&mut grid, &sma_path, &frame, '.');
    let low_row = frame.row(summary.ytd_low);
    for cell in grid[low_row].iter_mut() {
        if *cell == ' ' {
            *cell = '_';
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Chart: {} .. {} | price=[{y_min:.2}, {y_max:.2}] | * close  . SMA{sma_window}  _ YTD low {:.2}\n",
        first.date, last.date, summary.ytd_low
    ));
    for row in grid {
        let line: String = row.into_iter().collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Data-to-grid mapping. x runs over bar indices `0..=x_max`.
struct Frame {
    x_max: f64,
    y_min: f64,
    y_max: f64,
    width: usize,
    height: usize,
}

impl Frame {
    fn col(&self, x: f64) -> usize {
        let u = (x / self.x_max).clamp(0.0, 1.0);
        (u * (self.width as f64 - 1.0)).round() as usize
    }

    fn row(&self, y: f64) -> usize {
        let u = ((y - self.y_min) / (self.y_max - self.y_min)).clamp(0.0, 1.0);
        // y max is row 0
        (self.height as f64 - 1.0 - (u * (self.height as f64 - 1.0))).round() as usize
    }
}

fn y_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for y in values.filter(|y| y.is_finite()) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if !(min_y.is_finite() && max_y.is_finite()) {
        return (0.0, 1.0);
    }
    if max_y <= min_y {
        return (min_y - 1.0, max_y + 1.0);
    }
    (min_y, max_y)
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

/// Connect consecutive points; only blank cells are written.
fn draw_path(grid: &mut [Vec<char>], path: &[(f64, f64)], frame: &Frame, ch: char) {
    let mut prev: Option<(usize, usize)> = None;
    for &(x, y) in path {
        let cell = (frame.col(x), frame.row(y));
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, cell.0, cell.1, ch),
            None => draw_line(grid, cell.0, cell.1, cell.0, cell.1, ch),
        }
        prev = Some(cell);
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c + 0.5,
                low: c - 1.0,
                close: c,
                volume: 100,
            })
            .collect()
    }

    #[test]
    fn chart_golden_snapshot_small() {
        let txt = render_price_chart(&bars(&[10.0, 12.0, 11.0, 14.0, 13.0]), 2, 10, 5);
        let expected = concat!(
            "Chart: 2025-01-06 .. 2025-01-10 | price=[8.75, 14.25] | * close  . SMA2  _ YTD low 9.00\n",
            "       *\n",
            "      *.**\n",
            " *****\n",
            "*\n",
            "__________\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn empty_history_renders_placeholder() {
        assert_eq!(render_price_chart(&[], 20, 40, 10), "Chart: no price history\n");
    }

    #[test]
    fn chart_has_requested_height() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let txt = render_price_chart(&bars(&closes), 20, 60, 12);
        assert_eq!(txt.lines().count(), 13);
        assert!(txt.lines().skip(1).all(|l| l.chars().count() <= 60));
    }
}
