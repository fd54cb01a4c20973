//! Integration tests for crash log analysis and batch scanning
//!
//! These tests verify:
//! - Plugin suspects flow from the call stack into the report
//! - Crash suspects are rendered by severity
//! - Report strategy switches on crash complexity
//! - Batch outcomes, report files and summary messages
//! - Cancellation and the result cache

use autoscan::batch::{BatchOptions, BatchScanner, NO_LOGS_MESSAGE, ProcessingStrategy};
use autoscan::messaging::{MessageKind, Sink};
use autoscan::models::PluginSuspect;
use autoscan::report::sections::PLUGIN_SUSPECTS_TITLE;
use autoscan::report::{ReportOptions, ReportStrategy, render_report};
use autoscan::{Analyzer, ScanDatabase, ScanSettings};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

const HEADER: &str = "Fallout 4 v1.10.163\n\
Buffout 4 v1.31.1\n\
\n\
Unhandled exception \"EXCEPTION_STACK_OVERFLOW\" at 0x7FF6A1B2C3D4 Fallout4.exe+0123456\n\
\n";

fn crash_log(call_stack: &[&str], plugins: Option<&[&str]>) -> String {
    let mut log = String::from(HEADER);
    log.push_str("PROBABLE CALL STACK:\n");
    for (i, line) in call_stack.iter().enumerate() {
        log.push_str(&format!("\t[{i}] 0x7FF6A1B2C3D4 {line}\n"));
    }
    if let Some(plugins) = plugins {
        log.push_str("PLUGINS:\n");
        for plugin in plugins {
            log.push_str(&format!("\t{plugin}\n"));
        }
    }
    log
}

fn analyzer() -> Analyzer {
    Analyzer::new(Arc::new(ScanDatabase::packaged()), &ScanSettings::default())
}

fn create_scan_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, dir)
}

/// One complete log, one without a plugin list, one with nothing recognizable.
fn write_batch(dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    let complete = dir.join("crash-2024-01-01-10-00-00.log");
    fs::write(
        &complete,
        crash_log(
            &["Fallout4.exe+1 SomeMod.esp"],
            Some(&["[00]     Fallout4.esm", "[05]     SomeMod.esp"]),
        ),
    )
    .unwrap();

    let incomplete = dir.join("crash-2024-01-01-11-00-00.log");
    fs::write(&incomplete, crash_log(&["Fallout4.exe+1"], None)).unwrap();

    let garbage = dir.join("crash-2024-01-01-12-00-00.log");
    fs::write(&garbage, "this is not\na crash log\n").unwrap();

    vec![complete, incomplete, garbage]
}

fn batch_options(strategy: ProcessingStrategy) -> BatchOptions {
    BatchOptions {
        strategy,
        monitor_resources: false,
        ..BatchOptions::default()
    }
}

#[tokio::test]
async fn test_plugin_suspect_end_to_end() {
    let analyzer = analyzer();
    let text = crash_log(
        &[
            "Fallout4.exe+1 SomeMod.esp",
            "Fallout4.exe+2 BSResource::Create2DTexture",
            "Fallout4.exe+3 DefaultTexture",
        ],
        Some(&["[00]     Fallout4.esm", "[05]     SomeMod.esp"]),
    );
    let log = analyzer.parse_text(Utf8PathBuf::from("crash-e2e.log"), &text);
    let result = analyzer.analyze(&log).await;

    assert_eq!(
        result.plugin_suspects,
        vec![PluginSuspect {
            plugin: "SomeMod.esp".to_string(),
            load_order: "05".to_string(),
            occurrences: 1,
        }]
    );

    let report = render_report(&result, &ReportOptions::default()).await;
    let title = report.find(PLUGIN_SUSPECTS_TITLE).expect("plugin suspects section");
    let entry = report.find("- [05] SomeMod.esp | 1").expect("plugin suspect entry");
    assert!(title < entry);
}

#[tokio::test]
async fn test_crash_suspects_rendered_by_severity() {
    let analyzer = analyzer();
    let text = crash_log(
        &[
            "BSResource::Create2DTexture",
            "DefaultTexture",
            "BGSCombinedCellGeometryDB",
            "BGSPrecomputedGeometryDB",
            "SysWindowCompileAndRun",
            "ConsoleLogPrinter",
        ],
        None,
    );
    let log = analyzer.parse_text(Utf8PathBuf::from("crash-order.log"), &text);
    let result = analyzer.analyze(&log).await;
    let report = render_report(&result, &ReportOptions::default()).await;

    let position = |name: &str| {
        report
            .find(&format!("Checking for {name} SUSPECT FOUND!"))
            .unwrap_or_else(|| panic!("{name} missing from report"))
    };
    let console = position("Console Command Crash");
    let overflow = position("Stack Overflow Crash");
    let texture = position("Texture (DDS) Crash");
    let precombines = position("Precombines Crash");

    assert!(console < overflow);
    assert!(overflow < texture);
    // Equal severity keeps detection order
    assert!(texture < precombines);
}

#[tokio::test]
async fn test_strategy_switches_at_five_suspects() {
    let analyzer = analyzer();
    let four = [
        "Create2DTexture DefaultTexture",
        "BGSCombinedCellGeometryDB BGSPrecomputedGeometryDB",
        "SysWindowCompileAndRun ConsoleLogPrinter",
    ];
    let five = [
        "Create2DTexture DefaultTexture",
        "BGSCombinedCellGeometryDB BGSPrecomputedGeometryDB",
        "SysWindowCompileAndRun ConsoleLogPrinter",
        "BSScript::Internal::VirtualMachine BSScript::IFunction",
    ];
    let options = ReportOptions::default();

    let log = analyzer.parse_text(Utf8PathBuf::from("crash-four.log"), &crash_log(&four, None));
    let result = analyzer.analyze(&log).await;
    assert_eq!(result.suspects().len(), 4);
    assert_eq!(ReportStrategy::select(&result, &options), ReportStrategy::Standard);
    assert!(!render_report(&result, &options).await.contains("EXECUTIVE SUMMARY"));

    let log = analyzer.parse_text(Utf8PathBuf::from("crash-five.log"), &crash_log(&five, None));
    let result = analyzer.analyze(&log).await;
    assert_eq!(result.suspects().len(), 5);
    assert_eq!(ReportStrategy::select(&result, &options), ReportStrategy::Enhanced);
    assert!(render_report(&result, &options).await.contains("EXECUTIVE SUMMARY"));
}

#[tokio::test]
async fn test_batch_outcomes_and_reports() {
    let (_temp_dir, dir) = create_scan_dir();
    let logs = write_batch(&dir);

    let options = BatchOptions {
        write_json: true,
        ..batch_options(ProcessingStrategy::Parallel)
    };
    let scanner = BatchScanner::new(Arc::new(analyzer()), options);
    let sink = Sink::collect();
    let summary = scanner.scan(logs, &sink).await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.partial, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_logs, vec!["crash-2024-01-01-12-00-00.log"]);
    assert!(!summary.cancelled);

    assert!(dir.join("crash-2024-01-01-10-00-00-AUTOSCAN.md").exists());
    assert!(dir.join("crash-2024-01-01-11-00-00-AUTOSCAN.md").exists());
    // Unscannable logs get no report
    assert!(!dir.join("crash-2024-01-01-12-00-00-AUTOSCAN.md").exists());

    let json = fs::read_to_string(dir.join("crash-2024-01-01-10-00-00-AUTOSCAN.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["crash_log"]["file_name"], "crash-2024-01-01-10-00-00.log");

    let messages = sink.collected();
    assert!(messages.iter().any(|m| m.kind == MessageKind::Success));
    assert!(
        messages
            .iter()
            .any(|m| m.content == "Number of Incomplete Logs (No Plugins List): 1")
    );
}

#[tokio::test]
async fn test_pipeline_matches_sequential() {
    for strategy in [ProcessingStrategy::Sequential, ProcessingStrategy::Pipeline] {
        let (_temp_dir, dir) = create_scan_dir();
        let logs = write_batch(&dir);

        let scanner = BatchScanner::new(Arc::new(analyzer()), batch_options(strategy));
        let summary = scanner.scan(logs, &Sink::collect()).await;

        assert_eq!(
            (summary.successful, summary.partial, summary.failed),
            (1, 1, 1),
            "strategy {:?}",
            strategy
        );
    }
}

#[tokio::test]
async fn test_report_write_failure_counts_as_failed() {
    let (_temp_dir, dir) = create_scan_dir();
    let logs = write_batch(&dir);
    // A directory where the report file should go
    fs::create_dir(dir.join("crash-2024-01-01-10-00-00-AUTOSCAN.md")).unwrap();

    let scanner = BatchScanner::new(Arc::new(analyzer()), batch_options(ProcessingStrategy::Sequential));
    let summary = scanner.scan(logs, &Sink::collect()).await;

    assert_eq!(summary.successful, 0);
    assert_eq!(summary.failed, 2);
    assert!(
        summary
            .failed_logs
            .contains(&"crash-2024-01-01-10-00-00.log".to_string())
    );
    // The other logs still got their reports
    assert!(dir.join("crash-2024-01-01-11-00-00-AUTOSCAN.md").exists());
}

#[tokio::test]
async fn test_cancelled_batch_writes_nothing() {
    let (_temp_dir, dir) = create_scan_dir();
    let logs = write_batch(&dir);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).unwrap();

    let scanner = BatchScanner::new(Arc::new(analyzer()), batch_options(ProcessingStrategy::Parallel))
        .with_cancellation(cancel_rx);
    let sink = Sink::collect();
    let summary = scanner.scan(logs, &sink).await;

    assert!(summary.cancelled);
    assert_eq!(summary.processed(), 0);
    assert!(!dir.join("crash-2024-01-01-10-00-00-AUTOSCAN.md").exists());
    assert!(scanner.state().is_cancelled());
    assert!(
        sink.collected()
            .iter()
            .any(|m| m.content.starts_with("Scan cancelled"))
    );
}

#[tokio::test]
async fn test_second_scan_uses_cache() {
    let (_temp_dir, dir) = create_scan_dir();
    let logs = write_batch(&dir);

    let options = BatchOptions {
        cache_size: 8,
        ..batch_options(ProcessingStrategy::Sequential)
    };
    let scanner = BatchScanner::new(Arc::new(analyzer()), options);

    scanner.scan(logs.clone(), &Sink::collect()).await;
    // Failed results are not cached
    assert_eq!(scanner.cache().len(), 2);

    let summary = scanner.scan(logs, &Sink::collect()).await;
    assert_eq!(summary.successful, 1);
    assert_eq!(
        scanner
            .metrics()
            .cache_hits
            .load(std::sync::atomic::Ordering::Relaxed),
        2
    );
}

#[tokio::test]
async fn test_empty_batch() {
    let scanner = BatchScanner::new(Arc::new(analyzer()), batch_options(ProcessingStrategy::Auto));
    let sink = Sink::collect();
    let summary = scanner.scan(Vec::new(), &sink).await;

    assert_eq!(summary.total, 0);
    let messages = sink.collected();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, NO_LOGS_MESSAGE);
}
