//! Extended file checks (FCX mode).
//!
//! The checks look at the user's game and mod files rather than the crash
//! log, so they run at most once per batch and every log gets the same
//! cached result.

use crate::models::FcxCheckResults;
use camino::Utf8PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// File integrity checks run in FCX mode. Each returns report lines.
pub trait IntegrityChecker: Send + Sync {
    /// Checks of the scanner's own files and the script extender setup
    fn check_main_files(&self) -> Vec<String>;

    /// Checks of the game installation
    fn check_game_files(&self) -> Vec<String>;
}

/// Checks that a list of files exists under the game directory.
#[derive(Debug, Clone)]
pub struct FilePresenceChecker {
    game_dir: Utf8PathBuf,
    main_files: Vec<String>,
    game_files: Vec<String>,
}

impl FilePresenceChecker {
    pub fn new(game_dir: Utf8PathBuf, xse_acronym: &str, game_name: &str) -> Self {
        let xse = xse_acronym.to_lowercase();
        Self {
            game_dir,
            main_files: vec![
                format!("{}_loader.exe", xse),
                format!("Data/{}/Plugins/Buffout4.dll", xse.to_uppercase()),
                format!("Data/{}/Plugins/Buffout4.toml", xse.to_uppercase()),
            ],
            game_files: vec![
                format!("{}.exe", game_name),
                format!("Data/{}.esm", game_name),
                format!("Data/{} - Textures1.ba2", game_name),
            ],
        }
    }

    fn check(&self, files: &[String]) -> Vec<String> {
        files
            .iter()
            .map(|file| {
                if self.game_dir.join(file).exists() {
                    format!("✔️ {} is present", file)
                } else {
                    format!("❌ {} is missing from {}", file, self.game_dir)
                }
            })
            .collect()
    }
}

impl IntegrityChecker for FilePresenceChecker {
    fn check_main_files(&self) -> Vec<String> {
        self.check(&self.main_files)
    }

    fn check_game_files(&self) -> Vec<String> {
        self.check(&self.game_files)
    }
}

/// Runs the integrity checks once and hands out the cached result.
pub struct FcxHandler {
    enabled: bool,
    checker: Option<Arc<dyn IntegrityChecker>>,
    cache: Mutex<Option<FcxCheckResults>>,
}

impl FcxHandler {
    pub fn new(enabled: bool, checker: Option<Arc<dyn IntegrityChecker>>) -> Self {
        Self {
            enabled,
            checker,
            cache: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check results, running the checks on first use.
    ///
    /// Concurrent callers wait on the lock, so the checks never run twice.
    pub async fn results(&self) -> FcxCheckResults {
        if !self.enabled {
            return FcxCheckResults::default();
        }

        let mut cache = self.cache.lock().await;
        if let Some(results) = cache.as_ref() {
            return results.clone();
        }

        let results = match &self.checker {
            Some(checker) => {
                let checker = Arc::clone(checker);
                let joined = tokio::task::spawn_blocking(move || {
                    (checker.check_main_files(), checker.check_game_files())
                })
                .await;
                match joined {
                    Ok((main_files, game_files)) => FcxCheckResults {
                        enabled: true,
                        main_files,
                        game_files,
                    },
                    Err(e) => {
                        tracing::error!("File integrity checks panicked: {}", e);
                        FcxCheckResults {
                            enabled: true,
                            main_files: vec!["❌ File integrity checks could not be completed".to_string()],
                            game_files: Vec::new(),
                        }
                    }
                }
            }
            None => {
                tracing::warn!("FCX mode is enabled but no integrity checker is configured");
                FcxCheckResults {
                    enabled: true,
                    ..Default::default()
                }
            }
        };

        tracing::info!(
            "FCX checks finished: {} main file lines, {} game file lines",
            results.main_files.len(),
            results.game_files.len()
        );
        *cache = Some(results.clone());
        results
    }

    /// Forget cached results so the next batch runs the checks again.
    pub async fn reset(&self) {
        *self.cache.lock().await = None;
    }
}
