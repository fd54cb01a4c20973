//! Crash log discovery and game detection.
//!
//! Finds crash logs written by the crash generator (`crash-<timestamp>.log`)
//! in the scan directories, and identifies the game and VR build from a log's
//! header lines without parsing the whole file.
//!
//! # Examples
//!
//! ```ignore
//! use autoscan::services::game_detection::{find_crash_logs, detect_game_from_log};
//! use camino::Utf8PathBuf;
//!
//! let logs = find_crash_logs(&[Utf8PathBuf::from("Crash Logs")])?;
//! let game = detect_game_from_log(&logs[0])?;
//! ```

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Suffix of report files written next to each log.
pub const REPORT_SUFFIX: &str = "-AUTOSCAN";

/// Header lines searched before giving up on detection.
const HEADER_SCAN_LINES: usize = 20;

/// Whether a file name looks like a crash generator log.
pub fn is_crash_log_name(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.starts_with("crash-")
        && (lower.ends_with(".log") || lower.ends_with(".txt"))
        && !lower.contains(&REPORT_SUFFIX.to_lowercase())
}

/// Crash logs in the given directories, sorted and without duplicates.
///
/// Directories that do not exist are skipped with a warning. The search is
/// not recursive.
pub fn find_crash_logs(directories: &[Utf8PathBuf]) -> Result<Vec<Utf8PathBuf>> {
    let mut logs = Vec::new();

    for directory in directories {
        if !directory.is_dir() {
            tracing::warn!("Scan directory does not exist: {}", directory);
            continue;
        }

        let entries = directory
            .read_dir_utf8()
            .with_context(|| format!("Failed to read scan directory: {}", directory))?;

        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to read entry in {}", directory))?;
            if entry.file_type().is_ok_and(|t| t.is_file()) && is_crash_log_name(entry.file_name()) {
                logs.push(entry.into_path());
            }
        }
    }

    logs.sort();
    logs.dedup();
    tracing::info!("Found {} crash logs in {} directories", logs.len(), directories.len());
    Ok(logs)
}

/// Report path for a crash log: `<stem>-AUTOSCAN.<extension>`.
pub fn report_path(log_path: &Utf8Path, extension: &str) -> Utf8PathBuf {
    let stem = log_path.file_stem().unwrap_or("crash");
    log_path.with_file_name(format!("{}{}.{}", stem, REPORT_SUFFIX, extension))
}

/// Game identity read from the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedGame {
    /// Short game id, e.g. `Fallout4` or `SkyrimSE`
    pub game: String,
    pub vr: bool,
}

/// Maps a header line prefix to a game id.
const GAME_HEADERS: &[(&str, &str)] = &[
    ("Fallout 4", "Fallout4"),
    ("Skyrim SE", "SkyrimSE"),
    ("Skyrim Special Edition", "SkyrimSE"),
    ("Skyrim VR", "SkyrimSE"),
];

/// Identify the game from the first lines of a crash log.
///
/// Reads at most a few header lines. A `VR` marker in the game version line
/// selects the VR build.
pub fn detect_game_from_log(log_path: &Utf8Path) -> Result<Option<DetectedGame>> {
    let file = File::open(log_path)
        .with_context(|| format!("Failed to open crash log: {}", log_path))?;

    let reader = BufReader::new(file);

    for line_result in reader.split(b'\n').take(HEADER_SCAN_LINES) {
        let bytes = line_result.context("Failed to read line from crash log")?;
        let line = String::from_utf8_lossy(&bytes);
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        for (prefix, game) in GAME_HEADERS {
            if line.starts_with(prefix) {
                let vr = line
                    .split_whitespace()
                    .any(|word| word.eq_ignore_ascii_case("VR"));
                tracing::debug!("Detected {} (VR: {}) from {}", game, vr, log_path);
                return Ok(Some(DetectedGame {
                    game: game.to_string(),
                    vr,
                }));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_crash_log_names() {
        assert!(is_crash_log_name("crash-2024-01-01-12-00-00.log"));
        assert!(is_crash_log_name("Crash-2024.txt"));
        assert!(!is_crash_log_name("crash-2024-AUTOSCAN.md"));
        assert!(!is_crash_log_name("crash-2024-AUTOSCAN.txt"));
        assert!(!is_crash_log_name("f4se.log"));
    }

    #[test]
    fn test_find_crash_logs_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        for name in ["crash-2.log", "crash-1.log", "notes.txt", "crash-1-AUTOSCAN.md"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let logs = find_crash_logs(&[dir.clone(), dir.clone(), dir.join("missing")]).unwrap();
        let names: Vec<_> = logs.iter().filter_map(|p| p.file_name()).collect();
        assert_eq!(names, vec!["crash-1.log", "crash-2.log"]);
    }

    #[test]
    fn test_report_path() {
        assert_eq!(
            report_path(Utf8Path::new("logs/crash-1.log"), "md"),
            Utf8PathBuf::from("logs/crash-1-AUTOSCAN.md")
        );
    }

    #[test]
    fn test_detect_fallout4() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Fallout 4 v1.10.163").unwrap();
        writeln!(temp_file, "Buffout 4 v1.28.6").unwrap();

        let temp_path = Utf8Path::from_path(temp_file.path()).unwrap();
        let detected = detect_game_from_log(temp_path).unwrap().unwrap();
        assert_eq!(detected.game, "Fallout4");
        assert!(!detected.vr);
    }

    #[test]
    fn test_detect_vr() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file).unwrap();
        writeln!(temp_file, "Fallout 4 VR v1.2.72").unwrap();

        let temp_path = Utf8Path::from_path(temp_file.path()).unwrap();
        let detected = detect_game_from_log(temp_path).unwrap().unwrap();
        assert!(detected.vr);
    }

    #[test]
    fn test_unknown_game() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Some other log").unwrap();

        let temp_path = Utf8Path::from_path(temp_file.path()).unwrap();
        assert_eq!(detect_game_from_log(temp_path).unwrap(), None);
    }

    #[test]
    fn test_missing_log_is_error() {
        assert!(detect_game_from_log(Utf8Path::new("/nonexistent/crash-1.log")).is_err());
    }
}
