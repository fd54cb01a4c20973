//! Integration tests for StateManager with scan events
//!
//! These tests verify that the StateManager correctly:
//! - Emits events through a whole batch scan
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple threads

use autoscan::batch::{BatchOptions, BatchScanner, ProcessingStrategy};
use autoscan::messaging::Sink;
use autoscan::{Analyzer, LogOutcome, ScanDatabase, ScanEvent, ScanSettings, StateManager};
use camino::Utf8PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{Duration, timeout};

fn drain(rx: &mut tokio::sync::broadcast::Receiver<ScanEvent>) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            Err(TryRecvError::Lagged(skipped)) => panic!("Lagged by {} events", skipped),
        }
    }
    events
}

#[tokio::test]
async fn test_batch_emits_lifecycle_events() {
    let temp_dir = TempDir::new().unwrap();
    let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let log = dir.join("crash-2024-02-02-10-00-00.log");
    std::fs::write(
        &log,
        "Fallout 4 v1.10.163\nBuffout 4 v1.31.1\nUnhandled exception \"EXCEPTION_STACK_OVERFLOW\"\n\
         PROBABLE CALL STACK:\n\t[0] Fallout4.exe+1\nPLUGINS:\n\t[00]     Fallout4.esm\n",
    )
    .unwrap();

    let state = StateManager::new();
    let mut rx = state.subscribe();

    let analyzer = Analyzer::new(Arc::new(ScanDatabase::packaged()), &ScanSettings::default());
    let options = BatchOptions {
        strategy: ProcessingStrategy::Sequential,
        monitor_resources: false,
        ..BatchOptions::default()
    };
    let scanner = BatchScanner::new(Arc::new(analyzer), options).with_state(state.clone());
    scanner.scan(vec![log], &Sink::collect()).await;

    let events = drain(&mut rx);
    assert_eq!(
        events.first(),
        Some(&ScanEvent::BatchStarted {
            total_logs: 1,
            strategy: "sequential".to_string()
        })
    );
    assert!(events.contains(&ScanEvent::LogStarted {
        file_name: "crash-2024-02-02-10-00-00.log".to_string()
    }));
    assert!(events.contains(&ScanEvent::LogFinished {
        file_name: "crash-2024-02-02-10-00-00.log".to_string(),
        outcome: LogOutcome::Scanned
    }));
    assert!(events.contains(&ScanEvent::ProgressUpdated { current: 1, total: 1 }));
    assert_eq!(
        events.last(),
        Some(&ScanEvent::BatchFinished {
            scanned: 1,
            partial: 0,
            failed: 0
        })
    );

    // The caller's manager saw the same state
    assert_eq!(state.snapshot().scanned_logs, vec!["crash-2024-02-02-10-00-00.log"]);
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = StateManager::new();
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();

    state.start_batch(3, "parallel", 4);

    for rx in [&mut rx1, &mut rx2] {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");
        assert!(
            matches!(event, ScanEvent::BatchStarted { total_logs: 3, .. }),
            "Expected BatchStarted event, got: {:?}",
            event
        );
    }
}

#[test]
fn test_concurrent_log_completion() {
    let state = Arc::new(StateManager::new());
    state.start_batch(40, "parallel", 8);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                for i in 0..10 {
                    let outcome = if i % 5 == 0 {
                        LogOutcome::Failed
                    } else {
                        LogOutcome::Scanned
                    };
                    state.finish_log(&format!("crash-{worker}-{i}.log"), outcome);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = state.snapshot();
    assert_eq!(snapshot.processed, 40);
    assert_eq!(snapshot.failed_logs.len(), 8);
    assert_eq!(snapshot.scanned_logs.len(), 32);
}

#[tokio::test]
async fn test_events_without_subscribers() {
    // Emitting with nobody listening must not fail
    let state = StateManager::new();
    state.start_batch(1, "sequential", 1);
    state.finish_log("crash.log", LogOutcome::Partial);
    state.finish_batch();

    assert!(!state.snapshot().is_scanning);
    assert_eq!(state.snapshot().partial_logs, vec!["crash.log"]);
}
