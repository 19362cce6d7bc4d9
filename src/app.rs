//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - picks the market data source (Yahoo! Finance or the synthetic market)
//! - runs the analysis pipeline
//! - prints reports/plots
//! - writes optional exports and debug bundles

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{
    ChartArgs, Command, HighArgs, ListArgs, LowArgs, RecoveryFilterArgs, ScoreArgs, ShowArgs, SourceArgs,
};
use crate::data::{MarketData, SampleMarket, YahooClient};
use crate::domain::{AnalysisConfig, HighFilter, ListingKind, RecoveryFilter, ScoredStock};
use crate::error::AppError;

pub mod pipeline;

use pipeline::LowRun;

/// Log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "ytd_screener=info";

/// Entry point for the `ytd` binary.
pub fn run() -> Result<(), AppError> {
    // `.env` may carry RUST_LOG as well as the YTD_* settings.
    let _ = dotenvy::dotenv();

    // `ytd` and `ytd --sample ...` behave like `ytd low ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    // The TUI owns the terminal; stray log lines would corrupt the screen.
    let tui = matches!(cli.command, Command::Tui(_));
    init_tracing(if tui { "off" } else { DEFAULT_LOG_FILTER });

    match cli.command {
        Command::Low(args) => handle_low(args),
        Command::High(args) => handle_high(args),
        Command::List(args) => handle_list(args),
        Command::Score(args) => handle_score(args),
        Command::Show(args) => handle_show(args),
        Command::Chart(args) => handle_chart(args),
        Command::Tui(args) => crate::tui::run(low_config(&args)),
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// The synthetic market for `--sample`, Yahoo! Finance otherwise.
pub fn build_source(config: &AnalysisConfig) -> Result<Box<dyn MarketData>, AppError> {
    if config.sample {
        info!(seed = config.sample_seed, "using synthetic market");
        return Ok(Box::new(SampleMarket::new(config.sample_seed)));
    }
    Ok(Box::new(YahooClient::from_env()?))
}

fn handle_low(args: LowArgs) -> Result<(), AppError> {
    let config = low_config(&args);
    let source = build_source(&config)?;
    let run = pipeline::run_low_analysis(source.as_ref(), &config)?;

    let filtered = run.filtered(&config.recovery_filter);
    let shown = &filtered[..filtered.len().min(config.top_n)];
    println!("{}", crate::report::format_low_header(&run, &config, shown.len()));
    print_low_report(&run, &filtered, &config);

    if config.plot {
        if let Some(top) = shown.first() {
            println!("{} {}", top.metrics.code, top.listing.name);
            println!(
                "{}",
                crate::plot::render_price_chart(
                    &top.history,
                    crate::analysis::SMA_SHORT,
                    config.plot_width,
                    config.plot_height
                )
            );
        }
    }

    write_low_exports(&run, &filtered, &config)?;

    if config.debug {
        let path = crate::debug::write_debug_bundle(&run, &config)?;
        println!("Wrote debug bundle: {}", path.display());
    }
    Ok(())
}

fn handle_high(args: HighArgs) -> Result<(), AppError> {
    let config = high_config(&args);
    let source = build_source(&config)?;
    let run = pipeline::run_high_analysis(source.as_ref(), &config)?;

    let shown = &run.stocks[..run.stocks.len().min(config.top_n)];
    println!("{}", crate::report::format_high_header(&run, &config));
    println!("{}", crate::report::format_high_table(shown));
    println!(
        "{}",
        crate::report::format_high_summary(&crate::report::summarize_high(&run.stocks))
    );
    let skipped = crate::report::format_skipped(&run.skipped);
    if !skipped.is_empty() {
        println!("{skipped}");
    }

    if let Some(path) = &config.export_csv {
        crate::io::write_high_csv(path, &run.stocks)?;
        info!(path = %path.display(), rows = run.stocks.len(), "wrote CSV export");
    }
    Ok(())
}

fn handle_list(args: ListArgs) -> Result<(), AppError> {
    let config = AnalysisConfig {
        kind: args.kind,
        market: args.market,
        term: args.term,
        pages: args.pages,
        sample: args.sample,
        sample_seed: args.seed,
        export_csv: args.export.clone(),
        ..AnalysisConfig::default()
    };
    let source = build_source(&config)?;
    let rows = pipeline::run_listing(source.as_ref(), &config)?;

    let summary = crate::report::summarize_listing(&rows, config.kind.is_stop());
    println!("{}", crate::report::format_listing(config.kind, &rows, &summary));

    if let Some(path) = &config.export_csv {
        crate::io::write_listing_csv(path, &rows)?;
        info!(path = %path.display(), rows = rows.len(), "wrote CSV export");
    }
    Ok(())
}

fn handle_score(args: ScoreArgs) -> Result<(), AppError> {
    let path = match &args.file {
        Some(path) => crate::cli::picker::validate_csv_path(path)?,
        None => crate::cli::picker::prompt_for_metrics_csv()?,
    };
    let data = crate::io::load_metrics_csv(&path)?;
    let run = pipeline::score_ingested(&path.display().to_string(), data);

    let config = AnalysisConfig {
        top_n: args.report.top,
        explain: args.report.explain,
        recovery_filter: recovery_filter(&args.filter),
        export_csv: args.report.export.clone(),
        export_json: args.report.export_json.clone(),
        ..AnalysisConfig::default()
    };
    report_offline(&run, &config);
    write_low_exports(&run, &run.filtered(&config.recovery_filter), &config)
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let snapshot = crate::io::read_snapshot_json(&args.file)?;
    if snapshot.kind != ListingKind::YtdLow {
        return Err(AppError::new(
            2,
            format!("Unsupported snapshot kind: {}", snapshot.kind.display_name()),
        ));
    }

    let mut scored = snapshot.scored;
    crate::score::rank_by_score(&mut scored);
    let run = LowRun {
        source: format!("{} ({} {})", args.file.display(), snapshot.tool, snapshot.generated),
        listings: scored.iter().map(|s| s.listing.clone()).collect(),
        scored,
        skipped: snapshot.skipped,
        requests: None,
    };

    let config = AnalysisConfig {
        top_n: args.top,
        explain: args.explain,
        recovery_filter: recovery_filter(&args.filter),
        ..AnalysisConfig::default()
    };
    report_offline(&run, &config);
    Ok(())
}

fn handle_chart(args: ChartArgs) -> Result<(), AppError> {
    let config = AnalysisConfig {
        sample: args.sample,
        sample_seed: args.seed,
        ..AnalysisConfig::default()
    };
    let source = build_source(&config)?;

    let history = source.fetch_history(&args.code)?;
    if history.is_empty() {
        return Err(AppError::new(3, format!("No price history for {}.", args.code)));
    }
    let name = source
        .fetch_fundamentals(&args.code)
        .ok()
        .and_then(|f| f.long_name)
        .unwrap_or_default();

    println!("{} {name}", args.code);
    println!(
        "{}",
        crate::plot::render_price_chart(&history, crate::analysis::SMA_SHORT, args.width, args.height)
    );
    Ok(())
}

fn report_offline(run: &LowRun, config: &AnalysisConfig) {
    let filtered = run.filtered(&config.recovery_filter);
    let shown = filtered.len().min(config.top_n);
    println!(
        "{}",
        crate::report::format_offline_header(run, &config.recovery_filter, shown)
    );
    print_low_report(run, &filtered, config);
}

/// Ranking table, breakdowns, worst performers, summary and skipped stocks.
fn print_low_report(run: &LowRun, filtered: &[&ScoredStock], config: &AnalysisConfig) {
    let shown = &filtered[..filtered.len().min(config.top_n)];
    println!("{}", crate::report::format_recovery_table(shown));

    if config.explain {
        for s in shown {
            println!("{}", crate::report::format_factor_breakdown(s));
        }
    }

    // Offline rows carry no YTD detail to rank by.
    if run.scored.iter().any(|s| s.detail.is_some()) {
        let worst = crate::score::worst_performers(&run.scored, config.top_n);
        println!("{}", crate::report::format_worst_performers(&worst));
    }

    println!(
        "{}",
        crate::report::format_low_summary(&crate::report::summarize_low(filtered))
    );
    let skipped = crate::report::format_skipped(&run.skipped);
    if !skipped.is_empty() {
        println!("{skipped}");
    }
}

fn write_low_exports(run: &LowRun, filtered: &[&ScoredStock], config: &AnalysisConfig) -> Result<(), AppError> {
    if let Some(path) = &config.export_csv {
        crate::io::write_recovery_csv(path, filtered)?;
        info!(path = %path.display(), rows = filtered.len(), "wrote CSV export");
    }
    if let Some(path) = &config.export_json {
        let snapshot = crate::io::build_snapshot(ListingKind::YtdLow, &run.scored, &run.skipped);
        crate::io::write_snapshot_json(path, &snapshot)?;
        info!(path = %path.display(), "wrote JSON snapshot");
    }
    Ok(())
}

fn source_config(src: &SourceArgs) -> AnalysisConfig {
    AnalysisConfig {
        market: src.market,
        term: src.term,
        pages: src.pages,
        sample: src.sample,
        sample_seed: src.seed,
        ..AnalysisConfig::default()
    }
}

fn recovery_filter(args: &RecoveryFilterArgs) -> RecoveryFilter {
    RecoveryFilter {
        min_score: args.min_score,
        min_recovery_from_low: args.min_recovery,
        max_pb_ratio: args.max_pb,
        min_dividend_yield: args.min_dividend,
        sectors: args.sectors.clone(),
    }
}

pub fn low_config(args: &LowArgs) -> AnalysisConfig {
    let base = source_config(&args.source);
    AnalysisConfig {
        kind: ListingKind::YtdLow,
        detail_limit: args.source.detail_limit.unwrap_or(base.detail_limit),
        top_n: args.report.top,
        recovery_filter: recovery_filter(&args.filter),
        explain: args.report.explain,
        plot: args.plot,
        plot_width: args.width,
        plot_height: args.height,
        debug: args.debug,
        export_csv: args.report.export.clone(),
        export_json: args.report.export_json.clone(),
        ..base
    }
}

pub fn high_config(args: &HighArgs) -> AnalysisConfig {
    AnalysisConfig {
        kind: ListingKind::YtdHigh,
        detail_limit: args
            .source
            .detail_limit
            .unwrap_or(pipeline::DEFAULT_HIGH_DETAIL_LIMIT),
        top_n: args.top,
        high_filter: HighFilter {
            min_ytd_return: args.min_ytd_return,
            min_high_return: args.min_high_return,
            min_market_cap: args.min_market_cap,
            sectors: args.sectors.clone(),
        },
        export_csv: args.export.clone(),
        ..source_config(&args.source)
    }
}

/// Rewrite argv so `ytd` defaults to `ytd low`.
///
/// Rules:
/// - `ytd`                       -> `ytd low`
/// - `ytd --sample ...`          -> `ytd low --sample ...`
/// - `ytd --help/--version/-h`   -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("low".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(
        arg1.as_str(),
        "low" | "high" | "list" | "score" | "show" | "chart" | "tui"
    );
    if is_subcommand {
        return argv;
    }

    // A leading flag is a `low` flag.
    if arg1.starts_with('-') {
        argv.insert(1, "low".to_string());
    }
    argv
}
