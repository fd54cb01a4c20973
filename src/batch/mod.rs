//! Batch scanning of crash logs.
//!
//! [`BatchScanner`] runs the analyzer over a list of logs, writes one report
//! per log next to it, and keeps per-batch counts. Logs are independent: a
//! failure in one never stops the others. Cancellation is cooperative through
//! a `watch` channel checked at every await boundary; reports already written
//! stay on disk.
//!
//! Three execution modes are available:
//! - sequential, one log at a time
//! - parallel, one task per log bounded by a resizable semaphore
//! - pipeline, a reader task feeding analysis workers through a bounded queue

pub mod cache;
pub mod monitor;

pub use cache::ResultCache;
pub use monitor::{ResourceMonitor, ResourceSample, WorkerLimiter, recommend_workers};

use crate::config::ScanSettings;
use crate::error::ScanError;
use crate::messaging::{Message, Sink};
use crate::metrics::ScanMetrics;
use crate::models::{CrashLog, CrashLogAnalysisResult};
use crate::report::{ReportOptions, render_report};
use crate::services::{Analyzer, report_path};
use crate::state::{LogOutcome, StateManager};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use monitor::{MonitorTargets, spawn_monitor};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc, watch};

/// Batches this small always run sequentially.
pub const SEQUENTIAL_MAX_FILES: usize = 5;
/// Batches this large use the pipeline.
pub const PIPELINE_MIN_FILES: usize = 50;
/// Queue slots per analysis worker in the pipeline.
const PIPELINE_QUEUE_FACTOR: usize = 2;

pub const NO_LOGS_MESSAGE: &str = "AutoScan found no crash logs to scan or the scan failed.";

/// Requested processing strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessingStrategy {
    /// Choose from batch size and machine load
    #[default]
    Auto,
    Sequential,
    Parallel,
    Pipeline,
}

impl ProcessingStrategy {
    /// Execution mode for a batch of `file_count` logs.
    ///
    /// Auto runs sequentially for small batches or a busy machine, uses the
    /// pipeline for large batches, and runs in parallel otherwise.
    pub fn resolve(self, file_count: usize, sample: &ResourceSample) -> ExecutionMode {
        match self {
            ProcessingStrategy::Sequential => ExecutionMode::Sequential,
            ProcessingStrategy::Parallel => ExecutionMode::Parallel,
            ProcessingStrategy::Pipeline => ExecutionMode::Pipeline,
            ProcessingStrategy::Auto => {
                if file_count <= SEQUENTIAL_MAX_FILES || sample.under_pressure() {
                    ExecutionMode::Sequential
                } else if file_count >= PIPELINE_MIN_FILES {
                    ExecutionMode::Pipeline
                } else {
                    ExecutionMode::Parallel
                }
            }
        }
    }
}

impl FromStr for ProcessingStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(ProcessingStrategy::Auto),
            "sequential" => Ok(ProcessingStrategy::Sequential),
            "parallel" => Ok(ProcessingStrategy::Parallel),
            "pipeline" => Ok(ProcessingStrategy::Pipeline),
            other => anyhow::bail!("Unknown processing strategy: {}", other),
        }
    }
}

/// How a batch actually runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
    Pipeline,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Initial worker count: one per processor, doubled on an idle machine,
/// capped by `max_workers` when set.
pub fn initial_workers(sample: &ResourceSample, max_workers: usize) -> usize {
    let mut workers = num_cpus::get().max(1);
    if sample.is_light() {
        workers *= 2;
    }
    if max_workers > 0 {
        workers = workers.min(max_workers);
    }
    workers
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub strategy: ProcessingStrategy,
    /// Worker ceiling, 0 for automatic
    pub max_workers: usize,
    /// Cached results, 0 disables the cache
    pub cache_size: usize,
    /// Also write `<stem>-AUTOSCAN.json`
    pub write_json: bool,
    /// Sample system load to pick and resize the worker pool
    pub monitor_resources: bool,
    pub report: ReportOptions,
}

impl BatchOptions {
    pub fn from_settings(settings: &ScanSettings, report: ReportOptions) -> Self {
        let strategy = settings
            .processing_strategy
            .parse::<ProcessingStrategy>()
            .unwrap_or_else(|e: anyhow::Error| {
                tracing::warn!("{}, using auto", e);
                ProcessingStrategy::Auto
            });

        Self {
            strategy,
            max_workers: settings.max_workers,
            cache_size: settings.cache_size,
            write_json: settings.write_json,
            monitor_resources: true,
            report,
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            strategy: ProcessingStrategy::Auto,
            max_workers: 0,
            cache_size: 0,
            write_json: false,
            monitor_resources: true,
            report: ReportOptions::default(),
        }
    }
}

/// Aggregate outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    /// Scanned with every stage succeeding
    pub successful: usize,
    /// Scanned with a degraded stage, usually a missing plugin list
    pub partial: usize,
    pub failed: usize,
    pub failed_logs: Vec<String>,
    pub cancelled: bool,
    pub mode: Option<ExecutionMode>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.successful + self.partial + self.failed
    }

    /// Messages shown to the user once the batch ends.
    pub fn messages(&self) -> Vec<Message> {
        if self.total == 0 {
            return vec![Message::warning(NO_LOGS_MESSAGE)];
        }

        let mut messages = Vec::new();
        if !self.failed_logs.is_empty() {
            messages.push(
                Message::warning("NOTICE : AUTOSCAN WAS UNABLE TO PROPERLY SCAN THE FOLLOWING LOG(S):")
                    .with_details(self.failed_logs.join("\n")),
            );
            messages.push(Message::info(
                "Most common reason for this are logs being incomplete or in the wrong format.",
            ));
        }
        if self.cancelled {
            messages.push(Message::warning(format!(
                "Scan cancelled after {} of {} logs. Reports already written are kept.",
                self.processed(),
                self.total
            )));
        } else {
            messages.push(Message::success(
                "SCAN COMPLETE! (IT MIGHT TAKE SEVERAL SECONDS FOR SCAN RESULTS TO APPEAR)",
            ));
            messages.push(Message::info(
                "SCAN RESULTS ARE AVAILABLE IN FILES NAMED crash-date-and-time-AUTOSCAN.md",
            ));
        }
        messages.push(Message::info(format!(
            "Scanned all available logs in {:.2} seconds.",
            self.elapsed.as_secs_f64()
        )));
        messages.push(Message::info(format!(
            "Number of Scanned Logs (No Autoscan Errors): {}",
            self.successful
        )));
        messages.push(Message::info(format!(
            "Number of Incomplete Logs (No Plugins List): {}",
            self.partial
        )));
        messages.push(Message::info(format!(
            "Number of Failed Logs (Autoscan Can't Scan): {}",
            self.failed
        )));
        messages
    }
}

/// Resolves once the cancel flag is set. Never resolves if the sender is gone.
pub(crate) async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

fn log_name(path: &Utf8Path) -> String {
    path.file_name().unwrap_or(path.as_str()).to_string()
}

/// A log read from disk, or a result already in the cache.
enum Loaded {
    Cached(Arc<CrashLogAnalysisResult>),
    Parsed(Box<CrashLog>),
    Unreadable(ScanError),
}

/// State shared by every task of a batch.
struct Shared {
    analyzer: Arc<Analyzer>,
    options: BatchOptions,
    state: StateManager,
    metrics: Arc<ScanMetrics>,
    cache: Arc<ResultCache>,
}

impl Shared {
    async fn load(&self, path: &Utf8Path) -> Loaded {
        self.state.start_log(&log_name(path));

        if let Some(result) = self.cache.get(path) {
            tracing::debug!("Using cached result for {}", path);
            self.metrics.record_cache_hit();
            return Loaded::Cached(result);
        }

        match self.analyzer.parse_crash_log(path).await {
            Ok(log) => Loaded::Parsed(Box::new(log)),
            Err(e) => Loaded::Unreadable(e),
        }
    }

    async fn complete(&self, path: &Utf8Path, loaded: Loaded) -> LogOutcome {
        let name = log_name(path);

        let result = match loaded {
            Loaded::Cached(result) => result,
            Loaded::Parsed(log) => {
                let started = Instant::now();
                let result = Arc::new(self.analyzer.analyze(&log).await);
                self.metrics.record_analysis_time(started.elapsed());
                if !result.is_failed() {
                    self.cache.put(path.to_path_buf(), Arc::clone(&result));
                }
                result
            }
            Loaded::Unreadable(e) => {
                tracing::error!("Skipping {}: {}", name, e);
                return self.finish(&name, LogOutcome::Failed);
            }
        };

        let outcome = if result.is_failed() {
            tracing::warn!("{} could not be scanned: no recognizable sections", name);
            LogOutcome::Failed
        } else {
            match self.write_reports(path, &result).await {
                Ok(()) if result.is_partial() => LogOutcome::Partial,
                Ok(()) => LogOutcome::Scanned,
                Err(e) => {
                    tracing::error!("{:#}", e);
                    LogOutcome::Failed
                }
            }
        };

        self.finish(&name, outcome)
    }

    /// Load and complete one log, stopping early if cancelled.
    async fn process(&self, path: &Utf8Path, cancel_rx: &watch::Receiver<bool>) -> Option<LogOutcome> {
        if is_cancelled(cancel_rx) {
            return None;
        }
        let loaded = self.load(path).await;
        if is_cancelled(cancel_rx) {
            tracing::debug!("Cancelled before analyzing {}", path);
            return None;
        }
        Some(self.complete(path, loaded).await)
    }

    fn finish(&self, name: &str, outcome: LogOutcome) -> LogOutcome {
        match outcome {
            LogOutcome::Scanned => self.metrics.record_scanned(),
            LogOutcome::Partial => self.metrics.record_partial(),
            LogOutcome::Failed => self.metrics.record_failed(),
        }
        self.state.finish_log(name, outcome);
        outcome
    }

    async fn write_reports(&self, path: &Utf8Path, result: &CrashLogAnalysisResult) -> Result<()> {
        let report = render_report(result, &self.options.report).await;
        let report_file = report_path(path, "md");
        tokio::fs::write(&report_file, report)
            .await
            .with_context(|| format!("Failed to write report: {}", report_file))?;
        self.metrics.record_report_written();

        if self.options.write_json {
            let json =
                serde_json::to_string_pretty(result).context("Failed to serialize analysis result")?;
            let json_file = report_path(path, "json");
            tokio::fs::write(&json_file, json)
                .await
                .with_context(|| format!("Failed to write JSON report: {}", json_file))?;
        }

        tracing::debug!("Wrote report {}", report_file);
        Ok(())
    }
}

/// Scans batches of crash logs.
pub struct BatchScanner {
    shared: Arc<Shared>,
    cancel_rx: watch::Receiver<bool>,
}

impl BatchScanner {
    pub fn new(analyzer: Arc<Analyzer>, options: BatchOptions) -> Self {
        // No sender: never cancelled unless a receiver is supplied
        let (_, cancel_rx) = watch::channel(false);
        let cache = Arc::new(ResultCache::new(options.cache_size));

        Self {
            shared: Arc::new(Shared {
                analyzer,
                options,
                state: StateManager::new(),
                metrics: Arc::new(ScanMetrics::new()),
                cache,
            }),
            cancel_rx,
        }
    }

    /// Stop the batch when `true` is sent on the paired sender.
    pub fn with_cancellation(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = cancel_rx;
        self
    }

    /// Report progress through an existing state manager.
    pub fn with_state(mut self, state: StateManager) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.state = state;
        }
        self
    }

    pub fn state(&self) -> &StateManager {
        &self.shared.state
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.shared.metrics
    }

    pub fn cache(&self) -> &ResultCache {
        &self.shared.cache
    }

    /// Scan every log, write reports, and send the summary to `sink`.
    pub async fn scan(&self, logs: Vec<Utf8PathBuf>, sink: &Sink) -> BatchSummary {
        let started = Instant::now();

        if logs.is_empty() {
            tracing::warn!("No crash logs to scan");
            let summary = BatchSummary::default();
            for message in summary.messages() {
                sink.send(message);
            }
            return summary;
        }

        // Integrity checks run once per batch, on first use
        self.shared.analyzer.fcx().reset().await;

        let options = &self.shared.options;
        let mut monitor = options.monitor_resources.then(ResourceMonitor::new);
        let sample = match monitor.as_mut() {
            Some(monitor) => monitor.settled_sample().await,
            None => ResourceSample::default(),
        };

        let mode = options.strategy.resolve(logs.len(), &sample);
        let workers = match mode {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel | ExecutionMode::Pipeline => {
                initial_workers(&sample, options.max_workers)
            }
        };
        let limiter = Arc::new(WorkerLimiter::new(workers));
        let total = logs.len();

        tracing::info!(
            "Scanning {} crash logs ({} mode, {} workers, cpu {:.1}%, memory {:.1}%)",
            total,
            mode,
            limiter.size(),
            sample.cpu_percent,
            sample.memory_percent
        );
        self.shared.state.start_batch(total, mode.as_str(), limiter.size());

        let monitor_task = match (mode, monitor) {
            (ExecutionMode::Sequential, _) | (_, None) => None,
            (_, Some(monitor)) => Some(spawn_monitor(
                monitor,
                MonitorTargets {
                    limiter: Arc::clone(&limiter),
                    cache: Arc::clone(&self.shared.cache),
                    state: self.shared.state.clone(),
                    metrics: Arc::clone(&self.shared.metrics),
                },
                self.cancel_rx.clone(),
            )),
        };

        match mode {
            ExecutionMode::Sequential => self.run_sequential(logs).await,
            ExecutionMode::Parallel => self.run_parallel(logs, &limiter).await,
            ExecutionMode::Pipeline => self.run_pipeline(logs, &limiter).await,
        }

        if let Some(task) = monitor_task {
            task.abort();
        }

        let was_cancelled = is_cancelled(&self.cancel_rx);
        if was_cancelled {
            tracing::warn!("Batch cancelled");
            self.shared.state.cancel();
        }
        self.shared.state.finish_batch();
        self.shared.metrics.log_summary();

        let state = self.shared.state.snapshot();
        let summary = BatchSummary {
            total,
            successful: state.scanned_logs.len(),
            partial: state.partial_logs.len(),
            failed: state.failed_logs.len(),
            failed_logs: state.failed_logs,
            cancelled: was_cancelled,
            mode: Some(mode),
            elapsed: started.elapsed(),
        };

        for message in summary.messages() {
            sink.send(message);
        }
        summary
    }

    async fn run_sequential(&self, logs: Vec<Utf8PathBuf>) {
        for path in logs {
            if self.shared.process(&path, &self.cancel_rx).await.is_none() {
                break;
            }
        }
    }

    async fn run_parallel(&self, logs: Vec<Utf8PathBuf>, limiter: &WorkerLimiter) {
        let semaphore = limiter.semaphore();
        let mut tasks = Vec::with_capacity(logs.len());

        // Every log gets a task up front; they queue on the semaphore so a
        // cancel releases all of them at once.
        for path in logs {
            let shared = Arc::clone(&self.shared);
            let semaphore = Arc::clone(&semaphore);
            let mut cancel_rx = self.cancel_rx.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel_rx) => {
                        tracing::debug!("Cancelled before scanning {}", path);
                        return;
                    }
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(e) => {
                            tracing::error!("Worker pool closed: {}", e);
                            return;
                        }
                    },
                };
                shared.process(&path, &cancel_rx).await;
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("Scan task join error: {}", e);
            }
        }
    }

    async fn run_pipeline(&self, logs: Vec<Utf8PathBuf>, limiter: &WorkerLimiter) {
        let (tx, rx) = mpsc::channel::<(Utf8PathBuf, Loaded)>(limiter.ceiling() * PIPELINE_QUEUE_FACTOR);

        let producer = {
            let shared = Arc::clone(&self.shared);
            let mut cancel_rx = self.cancel_rx.clone();
            tokio::spawn(async move {
                for path in logs {
                    if is_cancelled(&cancel_rx) {
                        break;
                    }
                    let loaded = shared.load(&path).await;
                    tokio::select! {
                        biased;
                        _ = cancelled(&mut cancel_rx) => break,
                        sent = tx.send((path, loaded)) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            })
        };

        let rx = Arc::new(Mutex::new(rx));
        let semaphore = limiter.semaphore();
        let consumers: Vec<_> = (0..limiter.ceiling())
            .map(|_| {
                let shared = Arc::clone(&self.shared);
                let rx = Arc::clone(&rx);
                let semaphore = Arc::clone(&semaphore);
                let mut cancel_rx = self.cancel_rx.clone();

                tokio::spawn(async move {
                    loop {
                        let next = {
                            let mut rx = rx.lock().await;
                            tokio::select! {
                                biased;
                                _ = cancelled(&mut cancel_rx) => None,
                                item = rx.recv() => item,
                            }
                        };
                        let Some((path, loaded)) = next else {
                            break;
                        };

                        let _permit = tokio::select! {
                            biased;
                            _ = cancelled(&mut cancel_rx) => break,
                            permit = semaphore.acquire() => match permit {
                                Ok(permit) => permit,
                                Err(_) => break,
                            },
                        };
                        shared.complete(&path, loaded).await;
                    }
                })
            })
            .collect();

        if let Err(e) = producer.await {
            tracing::error!("Log reader task join error: {}", e);
        }
        for consumer in consumers {
            if let Err(e) = consumer.await {
                tracing::error!("Analysis worker join error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> ResourceSample {
        ResourceSample {
            cpu_percent: 10.0,
            memory_percent: 30.0,
            ..Default::default()
        }
    }

    fn busy() -> ResourceSample {
        ResourceSample {
            cpu_percent: 95.0,
            memory_percent: 30.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_auto_strategy_by_batch_size() {
        let auto = ProcessingStrategy::Auto;
        assert_eq!(auto.resolve(5, &idle()), ExecutionMode::Sequential);
        assert_eq!(auto.resolve(6, &idle()), ExecutionMode::Parallel);
        assert_eq!(auto.resolve(PIPELINE_MIN_FILES, &idle()), ExecutionMode::Pipeline);
    }

    #[test]
    fn test_auto_strategy_under_pressure() {
        assert_eq!(
            ProcessingStrategy::Auto.resolve(200, &busy()),
            ExecutionMode::Sequential
        );
        // Explicit choice wins
        assert_eq!(
            ProcessingStrategy::Parallel.resolve(200, &busy()),
            ExecutionMode::Parallel
        );
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("".parse::<ProcessingStrategy>().unwrap(), ProcessingStrategy::Auto);
        assert_eq!(
            " Pipeline ".parse::<ProcessingStrategy>().unwrap(),
            ProcessingStrategy::Pipeline
        );
        assert!("fastest".parse::<ProcessingStrategy>().is_err());
    }

    #[test]
    fn test_initial_workers() {
        let cpus = num_cpus::get().max(1);
        assert_eq!(initial_workers(&idle(), 0), cpus * 2);
        assert_eq!(initial_workers(&busy(), 0), cpus);
        assert_eq!(initial_workers(&idle(), 1), 1);
    }

    #[test]
    fn test_summary_messages() {
        let summary = BatchSummary {
            total: 3,
            successful: 1,
            partial: 1,
            failed: 1,
            failed_logs: vec!["crash-bad.log".to_string()],
            ..Default::default()
        };
        let messages = summary.messages();
        assert!(messages[0].content.contains("UNABLE TO PROPERLY SCAN"));
        assert_eq!(messages[0].details.as_deref(), Some("crash-bad.log"));
        assert!(messages.iter().any(|m| m.content == "Number of Failed Logs (Autoscan Can't Scan): 1"));
        assert!(messages.iter().any(|m| m.content.starts_with("SCAN COMPLETE!")));
    }

    #[test]
    fn test_empty_summary_message() {
        let messages = BatchSummary::default().messages();
        assert_eq!(messages, vec![Message::warning(NO_LOGS_MESSAGE)]);
    }

    #[tokio::test]
    async fn test_cancelled_resolves_when_set() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        cancelled(&mut rx).await;
        assert!(is_cancelled(&rx));
    }
}
