//! Read/write JSON run snapshots.
//!
//! A snapshot is the portable record of a recovery run: listing kind,
//! every scored stock (metrics + factor breakdown) and every skipped stock.
//! Price histories are not persisted. The schema is `domain::RunSnapshot`.

use std::fs::File;
use std::path::Path;

use chrono::Local;

use crate::domain::{ListingKind, RunSnapshot, ScoredStock, SkippedStock};
use crate::error::AppError;
use crate::io::ensure_parent_dir;

pub const TOOL_NAME: &str = "ytd-screener";

pub fn build_snapshot(kind: ListingKind, scored: &[ScoredStock], skipped: &[SkippedStock]) -> RunSnapshot {
    RunSnapshot {
        tool: TOOL_NAME.to_string(),
        generated: Local::now().to_rfc3339(),
        kind,
        scored: scored.to_vec(),
        skipped: skipped.to_vec(),
    }
}

/// Write a snapshot JSON file.
pub fn write_snapshot_json(path: &Path, snapshot: &RunSnapshot) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create snapshot JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, snapshot)
        .map_err(|e| AppError::new(2, format!("Failed to write snapshot JSON: {e}")))?;
    Ok(())
}

/// Read a snapshot JSON file.
pub fn read_snapshot_json(path: &Path) -> Result<RunSnapshot, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open snapshot JSON '{}': {e}", path.display())))?;
    let snapshot: RunSnapshot =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid snapshot JSON: {e}")))?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::run_low_analysis;
    use crate::data::SampleMarket;
    use crate::domain::AnalysisConfig;
    use chrono::NaiveDate;

    #[test]
    fn snapshot_survives_disk_without_histories() {
        let market = SampleMarket::with_end_date(3, NaiveDate::from_ymd_opt(2025, 5, 30).unwrap());
        let config = AnalysisConfig {
            pages: 1,
            detail_limit: 3,
            ..AnalysisConfig::default()
        };
        let run = run_low_analysis(&market, &config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs/low.json");
        let snapshot = build_snapshot(ListingKind::YtdLow, &run.scored, &run.skipped);
        write_snapshot_json(&path, &snapshot).unwrap();

        let loaded = read_snapshot_json(&path).unwrap();
        assert_eq!(loaded.tool, TOOL_NAME);
        assert_eq!(loaded.kind, ListingKind::YtdLow);
        assert_eq!(loaded.scored.len(), run.scored.len());
        assert!(loaded.scored.iter().all(|s| s.history.is_empty()));
        assert_eq!(loaded.scored[0].score, run.scored[0].score);
        assert_eq!(loaded.scored[0].metrics.code, run.scored[0].metrics.code);
    }

    #[test]
    fn garbage_json_is_exit_code_2() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(read_snapshot_json(&path).unwrap_err().exit_code(), 2);
    }
}
