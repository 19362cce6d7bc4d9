//! Debug bundle writer for auditing a recovery run factor by factor.

use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::app::pipeline::LowRun;
use crate::domain::{AnalysisConfig, ListingKind};
use crate::error::AppError;
use crate::report::describe_recovery_filter;
use crate::score::MAX_SCORE;

/// Write `debug/ytd_debug_{kind}_{timestamp}.md` under the working directory.
pub fn write_debug_bundle(run: &LowRun, config: &AnalysisConfig) -> Result<PathBuf, AppError> {
    write_debug_bundle_in(Path::new("debug"), run, config)
}

pub fn write_debug_bundle_in(dir: &Path, run: &LowRun, config: &AnalysisConfig) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::new(2, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("ytd_debug_{}_{ts}.md", ListingKind::YtdLow.file_tag()));

    let mut file = File::create(&path)
        .map_err(|e| AppError::new(2, format!("Failed to create debug file: {e}")))?;
    write_bundle(&mut file, run, config).map_err(|e| AppError::new(2, format!("Failed to write debug: {e}")))?;

    Ok(path)
}

fn write_bundle(out: &mut impl Write, run: &LowRun, config: &AnalysisConfig) -> std::io::Result<()> {
    writeln!(out, "# ytd debug bundle")?;
    writeln!(out, "- generated: {}", Local::now().to_rfc3339())?;
    writeln!(out, "- source: {}", run.source)?;
    writeln!(
        out,
        "- query: kind={}, market={}, term={}, pages={}, detail_limit={}",
        ListingKind::YtdLow.slug(),
        config.market.as_param(),
        config.term.as_param(),
        config.pages,
        config.detail_limit
    )?;
    if config.sample {
        writeln!(out, "- sample_seed: {}", config.sample_seed)?;
    }
    writeln!(out, "- filter: {}", describe_recovery_filter(&config.recovery_filter))?;
    writeln!(
        out,
        "- counts: listings={}, scored={}, skipped={}",
        run.listings.len(),
        run.scored.len(),
        run.skipped.len()
    )?;
    if let Some(req) = &run.requests {
        writeln!(
            out,
            "- requests: {} ({} ok, {} failed), {:.2}s total",
            req.requests, req.successes, req.failures, req.total_secs
        )?;
    }

    for (idx, s) in run.scored.iter().enumerate() {
        let m = &s.metrics;
        writeln!(out, "\n## {}. {} {}", idx + 1, m.code, s.listing.name)?;
        writeln!(out, "| metric | value |")?;
        writeln!(out, "| - | - |")?;
        writeln!(out, "| current_price | {:.2} |", m.current_price)?;
        writeln!(out, "| ytd_low | {:.2} |", m.ytd_low)?;
        writeln!(out, "| recovery_from_low_pct | {:.2} |", m.recovery_from_low_pct)?;
        writeln!(out, "| pe_ratio | {} |", fmt_opt(m.pe_ratio))?;
        writeln!(out, "| pb_ratio | {} |", fmt_opt(m.pb_ratio))?;
        writeln!(out, "| dividend_yield_pct | {:.2} |", m.dividend_yield_pct)?;
        writeln!(out, "| sma_20 | {} |", fmt_opt(m.sma_20))?;
        writeln!(out, "| sma_50 | {} |", fmt_opt(m.sma_50))?;
        writeln!(out, "| volatility_pct | {} |", fmt_opt(m.volatility_pct))?;
        writeln!(out, "| max_drawdown_pct | {} |", fmt_opt(m.max_drawdown_pct))?;
        if let Some(d) = &s.detail {
            writeln!(out, "| ytd_low_date | {} |", d.ytd_low_date)?;
            writeln!(out, "| ytd_high | {:.2} ({}) |", d.ytd_high, d.ytd_high_date)?;
            writeln!(out, "| year_start_price | {:.2} |", d.year_start_price)?;
            writeln!(out, "| low_decline_pct | {:.2} |", d.low_decline_pct)?;
        }

        writeln!(out, "\n| factor | rule | points |")?;
        writeln!(out, "| - | - | - |")?;
        for f in &s.score.factors {
            writeln!(out, "| {} | {} | +{} |", f.category.display_name(), f.label, f.points)?;
        }
        writeln!(
            out,
            "raw total {} -> score {}/{} ({})",
            s.score.raw_total,
            s.score.score,
            MAX_SCORE,
            s.score.grade.display_name()
        )?;
    }

    writeln!(out, "\n## Skipped")?;
    if run.skipped.is_empty() {
        writeln!(out, "none")?;
    }
    for s in &run.skipped {
        writeln!(out, "- {} {}: {}", s.code, s.name, s.reason)?;
    }

    out.flush()
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.3}"),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::run_low_analysis;
    use crate::data::SampleMarket;
    use chrono::NaiveDate;

    #[test]
    fn bundle_lists_every_scored_and_skipped_stock() {
        let market = SampleMarket::with_end_date(11, NaiveDate::from_ymd_opt(2025, 6, 13).unwrap());
        let config = AnalysisConfig {
            pages: 1,
            detail_limit: 4,
            sample: true,
            sample_seed: 11,
            ..AnalysisConfig::default()
        };
        let mut run = run_low_analysis(&market, &config).unwrap();
        run.skipped.push(crate::domain::SkippedStock {
            code: "9999".to_string(),
            name: "Ghost".to_string(),
            reason: "empty price history".to_string(),
        });

        let dir = tempfile::tempdir().unwrap();
        let path = write_debug_bundle_in(dir.path(), &run, &config).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ytd_debug_ytd_low_"));
        assert!(name.ends_with(".md"));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("- sample_seed: 11"));
        for s in &run.scored {
            assert!(text.contains(&format!("{} {}", s.metrics.code, s.listing.name)));
            assert!(text.contains(&format!("raw total {} -> score {}", s.score.raw_total, s.score.score)));
        }
        assert!(text.contains("| base | base | +50 |"));
        assert!(text.contains("- 9999 Ghost: empty price history"));
    }
}
