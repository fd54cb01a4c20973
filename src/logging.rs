use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Where and how scanner logs are written.
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    pub log_dir: &'a Utf8Path,
    /// File name prefix for the daily log files
    pub prefix: &'a str,
    pub debug_mode: bool,
    /// Also log to the terminal
    pub console: bool,
    /// Write the log file as JSON lines
    pub json: bool,
}

/// Filter from `RUST_LOG` when set, otherwise `info` (or `debug`).
fn env_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug_mode { "debug" } else { "info" }))
}

fn create_log_dir(log_dir: &Utf8Path) -> Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }
    Ok(())
}

/// Setup logging with a daily rotating file appender.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(log_dir: &Utf8Path, log_prefix: &str, debug_mode: bool) -> Result<WorkerGuard> {
    setup_logging_with_options(&LogOptions {
        log_dir,
        prefix: log_prefix,
        debug_mode,
        console: false,
        json: false,
    })
}

/// Setup logging to file and, for interactive runs, the terminal.
pub fn setup_logging_with_console(
    log_dir: &Utf8Path,
    log_prefix: &str,
    debug_mode: bool,
    console_output: bool,
) -> Result<WorkerGuard> {
    setup_logging_with_options(&LogOptions {
        log_dir,
        prefix: log_prefix,
        debug_mode,
        console: console_output,
        json: false,
    })
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed in this process.
pub fn setup_logging_with_options(options: &LogOptions<'_>) -> Result<WorkerGuard> {
    create_log_dir(options.log_dir)?;

    let file_appender = rolling::daily(options.log_dir, options.prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);
    let file_layer = if options.json {
        file_layer.json().boxed()
    } else {
        file_layer.boxed()
    };

    // Console output stays terse; reports carry the details
    let console_layer = options.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter(options.debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Logging is already initialized")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        options.log_dir,
        options.prefix,
        options.debug_mode,
        options.console,
        options.json
    );

    Ok(guard)
}
