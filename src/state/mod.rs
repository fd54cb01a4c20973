// Scan state management
//
// StateManager wraps the batch state with thread-safe access using
// Arc<RwLock<T>> and emits ScanEvents so callers can follow progress without
// polling.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_BUFFER: usize = 256;

/// How one log came out of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOutcome {
    /// Every stage succeeded
    Scanned,
    /// Report written, some stages degraded
    Partial,
    /// Unreadable or unparseable, or the report could not be written
    Failed,
}

/// Progress of the current batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanState {
    pub is_scanning: bool,
    pub cancelled: bool,
    pub strategy: String,
    pub total_logs: usize,
    pub processed: usize,
    pub current_log: Option<String>,
    pub workers: usize,
    pub scanned_logs: Vec<String>,
    pub partial_logs: Vec<String>,
    pub failed_logs: Vec<String>,
}

impl ScanState {
    pub fn record(&mut self, file_name: String, outcome: LogOutcome) {
        self.processed += 1;
        match outcome {
            LogOutcome::Scanned => self.scanned_logs.push(file_name),
            LogOutcome::Partial => self.partial_logs.push(file_name),
            LogOutcome::Failed => self.failed_logs.push(file_name),
        }
    }
}

/// Events emitted when the scan state changes.
#[derive(Clone, Debug, PartialEq)]
pub enum ScanEvent {
    BatchStarted {
        total_logs: usize,
        strategy: String,
    },

    LogStarted {
        file_name: String,
    },

    LogFinished {
        file_name: String,
        outcome: LogOutcome,
    },

    ProgressUpdated {
        current: usize,
        total: usize,
    },

    WorkersResized {
        from: usize,
        to: usize,
    },

    Cancelled,

    BatchFinished {
        scanned: usize,
        partial: usize,
        failed: usize,
    },
}

/// Thread-safe scan state with event emission.
///
/// - [`read()`](Self::read) for reading state
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to [`ScanEvent`]s
pub struct StateManager {
    state: Arc<RwLock<ScanState>>,
    event_tx: broadcast::Sender<ScanEvent>,
}

impl StateManager {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: Arc::new(RwLock::new(ScanState::default())),
            event_tx,
        }
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> ScanState {
        self.read(Clone::clone)
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ScanState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Apply an update and emit the events it caused.
    pub fn update<F>(&self, update_fn: F) -> Vec<ScanEvent>
    where
        F: FnOnce(&mut ScanState),
    {
        let changes = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let old_state = state.clone();
            update_fn(&mut state);
            Self::detect_changes(&old_state, &state)
        };

        for change in &changes {
            self.emit(change.clone());
        }
        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: ScanEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn detect_changes(old: &ScanState, new: &ScanState) -> Vec<ScanEvent> {
        let mut changes = Vec::new();

        if !old.is_scanning && new.is_scanning {
            changes.push(ScanEvent::BatchStarted {
                total_logs: new.total_logs,
                strategy: new.strategy.clone(),
            });
        }

        if !old.cancelled && new.cancelled {
            changes.push(ScanEvent::Cancelled);
        }

        if old.workers != new.workers && old.workers != 0 && new.workers != 0 {
            changes.push(ScanEvent::WorkersResized {
                from: old.workers,
                to: new.workers,
            });
        }

        if old.processed != new.processed || old.total_logs != new.total_logs {
            changes.push(ScanEvent::ProgressUpdated {
                current: new.processed,
                total: new.total_logs,
            });
        }

        if old.is_scanning && !new.is_scanning {
            changes.push(ScanEvent::BatchFinished {
                scanned: new.scanned_logs.len(),
                partial: new.partial_logs.len(),
                failed: new.failed_logs.len(),
            });
        }

        changes
    }

    pub fn start_batch(&self, total_logs: usize, strategy: &str, workers: usize) -> Vec<ScanEvent> {
        self.update(|state| {
            *state = ScanState {
                is_scanning: true,
                strategy: strategy.to_string(),
                total_logs,
                workers,
                ..Default::default()
            };
        })
    }

    pub fn start_log(&self, file_name: &str) {
        self.update(|state| state.current_log = Some(file_name.to_string()));
        self.emit(ScanEvent::LogStarted {
            file_name: file_name.to_string(),
        });
    }

    pub fn finish_log(&self, file_name: &str, outcome: LogOutcome) -> Vec<ScanEvent> {
        self.emit(ScanEvent::LogFinished {
            file_name: file_name.to_string(),
            outcome,
        });
        self.update(|state| {
            if state.current_log.as_deref() == Some(file_name) {
                state.current_log = None;
            }
            state.record(file_name.to_string(), outcome);
        })
    }

    pub fn set_workers(&self, workers: usize) -> Vec<ScanEvent> {
        self.update(|state| state.workers = workers)
    }

    pub fn cancel(&self) -> Vec<ScanEvent> {
        self.update(|state| state.cancelled = true)
    }

    pub fn finish_batch(&self) -> Vec<ScanEvent> {
        self.update(|state| {
            state.is_scanning = false;
            state.current_log = None;
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.read(|state| state.cancelled)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StateManager {
    /// Shares the same state and channel
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            event_tx: self.event_tx.clone(),
        }
    }
}
