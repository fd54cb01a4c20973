//! AutoScan - crash log scanner for Bethesda games
//!
//! Command line entry point.
//!
//! # Execution Flow
//!
//! 1. Parse arguments and initialize logging → `<data-dir>/logs/autoscan.<date>`
//! 2. Load `AutoScan Settings.yaml` and apply command line overrides
//! 3. Create a multi-thread tokio runtime
//! 4. Load `AutoScan Database.yaml` (packaged database if missing)
//! 5. Find crash logs, read an optional `loadorder.txt`, optionally fix
//!    crash generator settings
//! 6. Scan the batch, writing `<stem>-AUTOSCAN.md` next to each log
//! 7. Print the batch summary and a game hint
//!
//! Ctrl-C cancels the batch; reports already written stay on disk.

use anyhow::{Context, Result};
use autoscan::batch::{BatchOptions, BatchScanner, BatchSummary};
use autoscan::config::{ConfigValueReader, TomlConfigFile};
use autoscan::messaging::{Message, Sink};
use autoscan::report::ReportOptions;
use autoscan::report::sections::pick_hint;
use autoscan::services::{
    Analyzer, FcxHandler, FilePresenceChecker, detect_game_from_log, find_crash_logs,
    read_load_order_file,
};
use autoscan::{APP_NAME, ConfigManager, ScanSettings, VERSION};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "autoscan", version, about = "Scan Bethesda game crash logs and write AUTOSCAN reports")]
struct Cli {
    /// Directory to search for crash logs (repeatable, default: current directory)
    #[arg(long, value_name = "DIR")]
    scan_path: Vec<Utf8PathBuf>,

    /// Directory holding the settings and database YAML files
    #[arg(long, value_name = "DIR", default_value = "AutoScan Data")]
    data_dir: Utf8PathBuf,

    /// Run extended file checks and write Advanced reports
    #[arg(long)]
    fcx_mode: bool,

    /// Always write Enhanced reports
    #[arg(long)]
    enhanced: bool,

    /// Look up FormID values
    #[arg(long)]
    show_formid_values: bool,

    /// Also write <stem>-AUTOSCAN.json
    #[arg(long)]
    json: bool,

    /// Logs come from the VR build of the game
    #[arg(long)]
    vr: bool,

    /// Processing strategy
    #[arg(long, value_parser = ["auto", "sequential", "parallel", "pipeline"])]
    strategy: Option<String>,

    /// Crash generator TOML file to validate instead of the settings echoed in each log
    #[arg(long, value_name = "FILE")]
    crashgen_toml: Option<Utf8PathBuf>,

    /// Correct mismatched settings in --crashgen-toml before scanning
    #[arg(long, requires = "crashgen_toml")]
    fix_settings: bool,

    /// Game installation directory used by the extended file checks
    #[arg(long, value_name = "DIR")]
    game_dir: Option<Utf8PathBuf>,

    /// Verbose logging, also to the terminal
    #[arg(long)]
    debug: bool,
}

impl Cli {
    /// Command line switches only ever turn settings on.
    fn apply(&self, settings: &mut ScanSettings) {
        settings.fcx_mode |= self.fcx_mode;
        settings.enhanced_report |= self.enhanced;
        settings.show_formid_values |= self.show_formid_values;
        settings.write_json |= self.json;
        settings.vr_mode |= self.vr;
        settings.debug_mode |= self.debug;
        if let Some(strategy) = &self.strategy {
            settings.processing_strategy = strategy.clone();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Held until exit so buffered log lines are flushed
    let _log_guard = autoscan::logging::setup_logging_with_console(
        &cli.data_dir.join("logs"),
        "autoscan",
        cli.debug,
        cli.debug,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config_manager = ConfigManager::new(&cli.data_dir)?;
    let mut settings = config_manager.load_settings()?;
    cli.apply(&mut settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("autoscan-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(run(&cli, &config_manager, &settings));

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    let summary = result?;
    tracing::info!(
        "Batch finished: {} total, {} scanned, {} incomplete, {} failed",
        summary.total,
        summary.successful,
        summary.partial,
        summary.failed
    );
    Ok(())
}

async fn run(cli: &Cli, config_manager: &ConfigManager, settings: &ScanSettings) -> Result<BatchSummary> {
    let sink = Sink::Console;
    let database = Arc::new(config_manager.load_database());

    let mut directories = if cli.scan_path.is_empty() {
        vec![Utf8PathBuf::from(".")]
    } else {
        cli.scan_path.clone()
    };
    if !settings.scan_custom_path.is_empty() {
        directories.push(Utf8PathBuf::from(&settings.scan_custom_path));
    }
    let logs = find_crash_logs(&directories)?;

    let mut analyzer = Analyzer::new(Arc::clone(&database), settings);

    if let Some(game_dir) = &cli.game_dir {
        let checker = FilePresenceChecker::new(
            game_dir.clone(),
            &database.game.xse_acronym,
            &analyzer.context().game,
        );
        analyzer = analyzer.with_fcx(Arc::new(FcxHandler::new(settings.fcx_mode, Some(Arc::new(checker)))));
    } else if settings.fcx_mode {
        sink.send(Message::warning(
            "FCX mode is on but --game-dir was not given, file checks will be empty",
        ));
    }

    let load_order_path = config_manager.load_order_path();
    if load_order_path.is_file() {
        match read_load_order_file(&load_order_path) {
            Ok(list) => {
                sink.send(Message::info(format!(
                    "Using {} plugins from {} instead of each log's plugin list",
                    list.plugins.len(),
                    load_order_path
                )));
                analyzer = analyzer.with_load_order(list);
            }
            Err(e) => sink.send(Message::warning("loadorder.txt could not be read").with_details(e.to_string())),
        }
    }

    // Crash logs sort by timestamp, so the last one is the newest
    if let Some(newest) = logs.last() {
        check_game_build(newest, settings, &sink);
    }

    if let Some(toml_path) = &cli.crashgen_toml {
        if cli.fix_settings {
            match logs.last() {
                Some(newest) => {
                    if let Err(e) = fix_crashgen_settings(&analyzer, toml_path, newest, &sink).await {
                        sink.send(Message::error("Failed to fix crash generator settings").with_details(format!("{:#}", e)));
                    }
                }
                None => sink.send(Message::warning("No crash log to take installed mods from, settings left unchanged")),
            }
        }

        match TomlConfigFile::load(toml_path) {
            Ok(file) => analyzer = analyzer.with_settings_reader(Arc::new(file)),
            Err(e) => sink.send(
                Message::warning("Crash generator TOML could not be read, using settings from each log")
                    .with_details(e.to_string()),
            ),
        }
    }

    let report = ReportOptions {
        fcx_mode: settings.fcx_mode,
        enhanced: settings.enhanced_report,
        crashgen_name: database.game.crashgen_name.clone(),
        xse_acronym: database.game.xse_acronym.clone(),
        hints: database.hints.clone(),
    };
    let options = BatchOptions::from_settings(settings, report);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, cancelling scan");
            let _ = cancel_tx.send(true);
        }
    });

    let scanner = BatchScanner::new(Arc::new(analyzer), options).with_cancellation(cancel_rx);
    let summary = scanner.scan(logs, &sink).await;

    let seed = chrono::Utc::now().to_rfc3339();
    if let Some(hint) = pick_hint(&database.hints, &seed) {
        sink.send(Message::info(format!("\n{}", hint)));
    }

    Ok(summary)
}

/// Warn when the newest log comes from a different build than configured.
fn check_game_build(log_path: &Utf8Path, settings: &ScanSettings, sink: &Sink) {
    match detect_game_from_log(log_path) {
        Ok(Some(detected)) if detected.vr != settings.vr_mode => {
            let build = if detected.vr { "VR" } else { "non-VR" };
            sink.send(Message::warning(format!(
                "{} looks like a {} {} log, but VR mode is {}",
                log_path.file_name().unwrap_or(log_path.as_str()),
                build,
                detected.game,
                if settings.vr_mode { "on" } else { "off" }
            )));
        }
        Ok(Some(detected)) => tracing::info!("Newest log is from {}", detected.game),
        Ok(None) => tracing::debug!("Could not detect the game from {}", log_path),
        Err(e) => tracing::warn!("Game detection failed: {:#}", e),
    }
}

async fn fix_crashgen_settings(
    analyzer: &Analyzer,
    toml_path: &Utf8Path,
    newest_log: &Utf8Path,
    sink: &Sink,
) -> Result<()> {
    let mut file = TomlConfigFile::load(toml_path)?;
    let log = analyzer.parse_crash_log(newest_log).await?;
    let result = analyzer.fix_settings(&mut file, &log)?;

    let fixed: Vec<_> = result.issues.iter().filter(|issue| issue.fixed).collect();
    if fixed.is_empty() {
        sink.send(Message::success(format!("{} needed no changes", file.path())));
    }
    for issue in fixed {
        sink.send(Message::success(format!(
            "Changed {} to {} in {}",
            issue.key,
            issue.expected,
            file.path()
        )));
    }
    for issue in result.issues.iter().filter(|issue| !issue.fixed) {
        sink.send(Message::warning(issue.message.clone()).with_details(issue.fix.clone()));
    }
    tracing::debug!("{} settings checked", file.entries().len());
    Ok(())
}
