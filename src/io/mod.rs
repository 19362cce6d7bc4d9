//! Input/output helpers.
//!
//! - result exports (CSV) (`export`)
//! - offline metrics CSV ingest + validation (`ingest`)
//! - JSON run snapshots (`snapshot`)

use std::fs;
use std::path::Path;

use crate::error::AppError;

pub mod export;
pub mod ingest;
pub mod snapshot;

pub use export::*;
pub use ingest::*;
pub use snapshot::*;

/// Create the parent directory of `path` if it has one.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .map_err(|e| AppError::new(2, format!("Failed to create directory '{}': {e}", dir.display()))),
        _ => Ok(()),
    }
}
