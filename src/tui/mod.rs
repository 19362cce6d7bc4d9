//! Ratatui-based terminal UI.
//!
//! Browses a ranked recovery run: the list of scored stocks on the left, the
//! selected stock's metrics and factor breakdown plus a price chart on the right.

use std::io;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Terminal,
};

use crate::analysis::{clean_history, ytd_summary, SMA_LONG, SMA_SHORT};
use crate::app::pipeline::{run_low_analysis, LowRun};
use crate::data::{MarketData, SampleMarket};
use crate::domain::{AnalysisConfig, ScoredStock};
use crate::error::AppError;
use crate::math::sma_series;
use crate::report::{describe_recovery_filter, fmt_opt, fmt_pct, truncate};

mod plotters_chart;

use plotters_chart::{date_label, PricePlottersChart};

/// Start the TUI.
pub fn run(config: AnalysisConfig) -> Result<(), AppError> {
    let source = crate::app::build_source(&config)?;

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(config, source)?;
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    config: AnalysisConfig,
    source: Box<dyn MarketData>,
    run: Option<LowRun>,
    selected: usize,
    status: String,
}

impl App {
    fn new(config: AnalysisConfig, source: Box<dyn MarketData>) -> Result<Self, AppError> {
        let mut app = Self {
            config,
            source,
            run: None,
            selected: 0,
            status: String::new(),
        };
        app.run = Some(run_low_analysis(app.source.as_ref(), &app.config)?);
        app.status = format!("Loaded from {}.", app.source.name());
        Ok(app)
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                let n = self.visible().len();
                if self.selected + 1 < n {
                    self.selected += 1;
                }
            }
            KeyCode::Char('f') => {
                let next = next_min_score(self.config.recovery_filter.min_score);
                self.config.recovery_filter.min_score = next;
                self.selected = 0;
                self.status = match next {
                    Some(v) => format!("min score: {v}"),
                    None => "min score: off".to_string(),
                };
            }
            KeyCode::Char('r') => self.refetch(),
            KeyCode::Char('d') => {
                if let Some(run) = &self.run {
                    match crate::debug::write_debug_bundle(run, &self.config) {
                        Ok(path) => {
                            self.status = format!("Wrote debug bundle: {}", path.display());
                        }
                        Err(err) => {
                            self.status = format!("Debug write failed: {err}");
                        }
                    }
                } else {
                    self.status = "No run available.".to_string();
                }
            }
            _ => {}
        }
        false
    }

    /// Fetch again; synthetic runs move to the next seed.
    fn refetch(&mut self) {
        if self.config.sample {
            self.config.sample_seed = self.config.sample_seed.wrapping_add(1);
            self.source = Box::new(SampleMarket::new(self.config.sample_seed));
        }
        match run_low_analysis(self.source.as_ref(), &self.config) {
            Ok(run) => {
                self.run = Some(run);
                self.selected = 0;
                self.status = if self.config.sample {
                    format!("Resampled (seed {}).", self.config.sample_seed)
                } else {
                    "Refetched.".to_string()
                };
            }
            Err(err) => {
                self.status = format!("Refetch failed: {err}");
            }
        }
    }

    fn visible(&self) -> Vec<&ScoredStock> {
        match &self.run {
            Some(run) => run.filtered(&self.config.recovery_filter),
            None => Vec::new(),
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("ytd", Style::default().fg(Color::Cyan)),
            Span::raw(" | YTD-low recovery screener"),
        ]));

        let (source, listings, scored, skipped) = match &self.run {
            Some(r) => (r.source.as_str(), r.listings.len(), r.scored.len(), r.skipped.len()),
            None => ("-", 0, 0, 0),
        };
        lines.push(Line::from(Span::styled(
            format!(
                "source: {source} | listings: {listings} | scored: {scored} | shown: {} | skipped: {skipped} | filter: {}",
                self.visible().len(),
                describe_recovery_filter(&self.config.recovery_filter),
            ),
            Style::default().fg(Color::Gray),
        )));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(38), Constraint::Min(0)])
            .split(area);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(15), Constraint::Min(0)])
            .split(cols[1]);

        let visible = self.visible();
        let current = visible.get(self.selected).copied();

        self.draw_list(frame, cols[0], &visible);
        self.draw_detail(frame, right[0], current);
        self.draw_chart(frame, right[1], current);
    }

    fn draw_list(&self, frame: &mut ratatui::Frame<'_>, area: Rect, visible: &[&ScoredStock]) {
        let items: Vec<ListItem> = visible
            .iter()
            .enumerate()
            .map(|(i, s)| {
                ListItem::new(format!(
                    "{:>3} {:<6} {:<14} {:>3} {}",
                    i + 1,
                    s.metrics.code,
                    truncate(&s.listing.name, 14),
                    s.score.score,
                    s.score.grade.display_name()
                ))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Ranking").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        if !visible.is_empty() {
            state.select(Some(self.selected.min(visible.len() - 1)));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_detail(&self, frame: &mut ratatui::Frame<'_>, area: Rect, stock: Option<&ScoredStock>) {
        let block = Block::default().title("Detail").borders(Borders::ALL);
        let Some(s) = stock else {
            let msg = Paragraph::new("No stock matches the filter.")
                .style(Style::default().fg(Color::Yellow))
                .block(block);
            frame.render_widget(msg, area);
            return;
        };

        let p = Paragraph::new(Text::from(detail_lines(s))).block(block);
        frame.render_widget(p, area);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect, stock: Option<&ScoredStock>) {
        let block = Block::default().title("Price").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(series) = stock.and_then(chart_series) else {
            let msg = Paragraph::new("No price history.").style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let (chart_rect, insets) = chart_layout(inner);
        let widget = PricePlottersChart {
            close: &series.close,
            sma_short: &series.sma_short,
            sma_long: &series.sma_long,
            ytd_low: series.ytd_low,
            dates: &series.dates,
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
            y_label: "price",
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, &series);
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  f min-score  r refetch  d debug  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// off -> 60 -> 70 -> 80 -> off
fn next_min_score(cur: Option<u8>) -> Option<u8> {
    match cur {
        None => Some(60),
        Some(v) if v < 70 => Some(70),
        Some(v) if v < 80 => Some(80),
        Some(_) => None,
    }
}

fn detail_lines(s: &ScoredStock) -> Vec<Line<'static>> {
    let m = &s.metrics;
    let label = Style::default().fg(Color::Gray);
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} {}", m.code, s.listing.name),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!(
                "{} | {}",
                s.listing.market_label(),
                s.fundamentals.sector.as_deref().unwrap_or("-")
            ),
            label,
        )),
        Line::from(format!(
            "score {} ({}) | raw {}",
            s.score.score,
            s.score.grade.display_name(),
            s.score.raw_total
        )),
        Line::from(format!(
            "price {:.2} | low {:.2} | recovery {:.2}%",
            m.current_price, m.ytd_low, m.recovery_from_low_pct
        )),
        Line::from(format!(
            "PBR {} | PER {} | div {:.2}%",
            fmt_opt(m.pb_ratio, 2),
            fmt_opt(m.pe_ratio, 2),
            m.dividend_yield_pct
        )),
        Line::from(format!(
            "SMA20 {} | SMA50 {} | vol {} | dd {}",
            fmt_opt(m.sma_20, 2),
            fmt_opt(m.sma_50, 2),
            fmt_pct(m.volatility_pct),
            fmt_pct(m.max_drawdown_pct)
        )),
    ];
    for f in &s.score.factors {
        lines.push(Line::from(Span::styled(format!("  +{:<3}{}", f.points, f.label), label)));
    }
    lines
}

/// Chart data for one stock. `None` without usable history.
struct ChartSeries {
    close: Vec<(f64, f64)>,
    sma_short: Vec<(f64, f64)>,
    sma_long: Vec<(f64, f64)>,
    ytd_low: f64,
    dates: Vec<NaiveDate>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

fn chart_series(stock: &ScoredStock) -> Option<ChartSeries> {
    let bars = clean_history(&stock.history);
    let summary = ytd_summary(&bars)?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let indexed = |values: Vec<Option<f64>>| -> Vec<(f64, f64)> {
        values
            .into_iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
            .collect()
    };
    let close = indexed(closes.iter().copied().map(Some).collect());
    let sma_short = indexed(sma_series(&closes, SMA_SHORT));
    let sma_long = indexed(sma_series(&closes, SMA_LONG));

    let x_bounds = [0.0, (closes.len() as f64 - 1.0).max(1.0)];

    let (mut y_min, mut y_max) = (summary.ytd_low, summary.ytd_low);
    for &(_, y) in close.iter().chain(&sma_short).chain(&sma_long) {
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if y_max <= y_min {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let pad = ((y_max - y_min).abs() * 0.05).max(1e-12);

    Some(ChartSeries {
        close,
        sma_short,
        sma_long,
        ytd_low: summary.ytd_low,
        dates: bars.iter().map(|b| b.date).collect(),
        x_bounds,
        y_bounds: [y_min - pad, y_max + pad],
    })
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10
        || inner.height <= insets.top + insets.bottom + 5
    {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    series: &ChartSeries,
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);
    let [x0, x1] = series.x_bounds;
    let [y0, y1] = series.y_bounds;

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = date_label(&series.dates, x0 + u * (x1 - x0));
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label.clone()).style(style),
            Rect {
                x: start,
                y,
                width: label.len() as u16,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = format!("{:.0}", y0 + u * (y1 - y0));
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label.clone()).style(style),
            Rect {
                x: start,
                y,
                width: label.len() as u16,
                height: 1,
            },
        );
    }

    let legend = Paragraph::new(format!("close  SMA{SMA_SHORT} cyan  SMA{SMA_LONG} yellow  YTD low red"))
        .alignment(Alignment::Center)
        .style(style);
    let legend_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if legend_rect.y < inner.y + inner.height {
        frame.render_widget(legend, legend_rect);
    }

    let y_label = Paragraph::new("price").style(style.add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::run_low_analysis;

    #[test]
    fn min_score_cycles_through_thresholds() {
        let mut cur = None;
        let mut seen = Vec::new();
        for _ in 0..5 {
            cur = next_min_score(cur);
            seen.push(cur);
        }
        assert_eq!(seen, vec![Some(60), Some(70), Some(80), None, Some(60)]);
    }

    #[test]
    fn chart_series_covers_history_and_low() {
        let market = SampleMarket::with_end_date(5, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        let config = AnalysisConfig {
            pages: 1,
            detail_limit: 2,
            ..AnalysisConfig::default()
        };
        let run = run_low_analysis(&market, &config).unwrap();
        let stock = &run.scored[0];
        let series = chart_series(stock).unwrap();

        assert_eq!(series.close.len(), stock.history.len());
        assert_eq!(series.dates.len(), stock.history.len());
        assert_eq!(series.sma_short.len(), stock.history.len() - SMA_SHORT + 1);
        assert_eq!(series.sma_long.len(), stock.history.len() - SMA_LONG + 1);
        assert!(series.y_bounds[0] < series.ytd_low && series.ytd_low < series.y_bounds[1]);
        assert!((series.ytd_low - stock.metrics.ytd_low).abs() < 1e-9);
    }

    #[test]
    fn chart_series_is_none_without_history() {
        let market = SampleMarket::with_end_date(5, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        let config = AnalysisConfig {
            pages: 1,
            detail_limit: 1,
            ..AnalysisConfig::default()
        };
        let mut run = run_low_analysis(&market, &config).unwrap();
        run.scored[0].history.clear();
        assert!(chart_series(&run.scored[0]).is_none());
    }
}
