//! Interactive metrics CSV picker for `ytd score`.
//!
//! clap handles structured flags; the picker covers "run `ytd score` and choose
//! a file". Candidates are `*.csv` files under the working directory; the
//! ones whose header carries the required metrics columns are listed first.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Directory recursion depth when looking for CSV files.
const DEFAULT_SEARCH_DEPTH: usize = 4;

const METRICS_COLUMNS: [&str; 3] = ["stock_code", "current_price", "ytd_low"];

/// A discovered CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvCandidate {
    pub path: PathBuf,
    /// Header has every required metrics column.
    pub metrics: bool,
}

/// Prompt for a metrics CSV: a number from the list, an explicit path, or `q`.
pub fn prompt_for_metrics_csv() -> Result<PathBuf, AppError> {
    let candidates = discover_csv_files();
    if candidates.is_empty() {
        return Err(AppError::new(
            2,
            "No .csv files found. Provide one with `ytd score -f <metrics.csv>`.",
        ));
    }

    println!("Found {} CSV file(s):", candidates.len());
    for (idx, c) in candidates.iter().enumerate() {
        let tag = if c.metrics { "" } else { "  (no metrics header)" };
        println!("{:>3}) {}{tag}", idx + 1, pretty_path(&c.path));
    }

    let stdin = io::stdin();
    loop {
        print!("Select a file (1-{}), type a path, or q to quit: ", candidates.len());
        io::stdout()
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

        let mut input = String::new();
        let bytes = stdin
            .lock()
            .read_line(&mut input)
            .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;
        if bytes == 0 {
            return Err(AppError::new(
                2,
                "No input received. Provide a CSV path with `ytd score -f <metrics.csv>`.",
            ));
        }

        match resolve_choice(input.trim(), &candidates) {
            Choice::Quit => return Err(AppError::new(2, "Canceled.")),
            Choice::Path(path) => match validate_csv_path(&path) {
                Ok(path) => return Ok(path),
                Err(err) => println!("{err}"),
            },
            Choice::OutOfRange(n) => {
                println!("Invalid choice: {n}. Enter a number between 1 and {}.", candidates.len());
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Choice {
    Quit,
    Path(PathBuf),
    OutOfRange(usize),
}

fn resolve_choice(input: &str, candidates: &[CsvCandidate]) -> Choice {
    if input.eq_ignore_ascii_case("q") {
        return Choice::Quit;
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=candidates.len()).contains(&n) => Choice::Path(candidates[n - 1].path.clone()),
        Ok(n) => Choice::OutOfRange(n),
        Err(_) => Choice::Path(PathBuf::from(input)),
    }
}

/// The path must be an existing `.csv` file.
pub fn validate_csv_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(2, format!("CSV file not found: {}", path.display())));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    if !has_csv_extension(path) {
        return Err(AppError::new(
            2,
            format!("Expected a .csv file (got: {}). Use -f to pass a CSV path.", path.display()),
        ));
    }
    Ok(path.to_path_buf())
}

/// `*.csv` files under the working directory, metrics files first.
pub fn discover_csv_files() -> Vec<CsvCandidate> {
    find_csv_files(Path::new("."), DEFAULT_SEARCH_DEPTH)
}

fn find_csv_files(root: &Path, max_depth: usize) -> Vec<CsvCandidate> {
    let mut paths = Vec::new();
    walk(root, 0, max_depth, &mut paths);

    let mut out: Vec<CsvCandidate> = paths
        .into_iter()
        .map(|path| CsvCandidate {
            metrics: has_metrics_header(&path),
            path,
        })
        .collect();
    out.sort_by(|a, b| {
        b.metrics
            .cmp(&a.metrics)
            .then_with(|| pretty_path(&a.path).cmp(&pretty_path(&b.path)))
    });
    out
}

fn walk(dir: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if !should_skip_dir(&path) {
                walk(&path, depth + 1, max_depth, out);
            }
        } else if file_type.is_file() && has_csv_extension(&path) {
            out.push(path);
        }
    }
}

/// Peek at the first line; header names are compared like the ingest does.
fn has_metrics_header(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut first = String::new();
    if BufReader::new(file).read_line(&mut first).is_err() {
        return false;
    }
    let names: Vec<String> = first
        .split(',')
        .map(|h| h.trim().trim_start_matches('\u{feff}').trim_matches('"').to_ascii_lowercase())
        .collect();
    METRICS_COLUMNS.iter().all(|c| names.iter().any(|n| n == c))
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules" | "debug")
}

fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_files_sort_first_and_build_dirs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("runs/2025")).unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::write(root.join("a.csv"), "date,value\n").unwrap();
        fs::write(
            root.join("runs/2025/metrics.CSV"),
            "\u{feff}Stock_Code,\"current_price\",ytd_low,pb_ratio\n",
        )
        .unwrap();
        fs::write(root.join("target/ignored.csv"), "stock_code,current_price,ytd_low\n").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let found = find_csv_files(root, DEFAULT_SEARCH_DEPTH);
        let names: Vec<(String, bool)> = found
            .iter()
            .map(|c| (c.path.strip_prefix(root).unwrap().display().to_string(), c.metrics))
            .collect();
        assert_eq!(
            names,
            vec![
                ("runs/2025/metrics.CSV".to_string(), true),
                ("a.csv".to_string(), false),
            ]
        );
    }

    #[test]
    fn choices_resolve_numbers_paths_and_quit() {
        let candidates = vec![CsvCandidate {
            path: PathBuf::from("m.csv"),
            metrics: true,
        }];
        assert_eq!(resolve_choice("Q", &candidates), Choice::Quit);
        assert_eq!(resolve_choice("1", &candidates), Choice::Path(PathBuf::from("m.csv")));
        assert_eq!(resolve_choice("4", &candidates), Choice::OutOfRange(4));
        assert_eq!(resolve_choice("x/y.csv", &candidates), Choice::Path(PathBuf::from("x/y.csv")));
    }

    #[test]
    fn validate_rejects_missing_dirs_and_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("metrics.txt");
        fs::write(&txt, "").unwrap();
        let csv = dir.path().join("metrics.csv");
        fs::write(&csv, "").unwrap();

        assert_eq!(validate_csv_path(&dir.path().join("nope.csv")).unwrap_err().exit_code(), 2);
        assert!(validate_csv_path(dir.path()).is_err());
        assert!(validate_csv_path(&txt).is_err());
        assert_eq!(validate_csv_path(&csv).unwrap(), csv);
    }
}
