// AutoScan - crash log scanner for Bethesda games
//
// This is the library crate: parsing, analysis, report rendering and batch
// scanning. The binary crate (main.rs) provides the command line entry point.

pub mod batch;
pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod report;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use batch::{BatchOptions, BatchScanner, BatchSummary, ProcessingStrategy};
pub use config::{ConfigManager, ScanSettings};
pub use error::{ScanError, ScanResult};
pub use messaging::{Message, MessageKind, Sink};
pub use models::{CrashLog, CrashLogAnalysisResult, GameContext, ScanDatabase};
pub use report::{ReportOptions, ReportStrategy, render_report};
pub use services::Analyzer;
pub use state::{LogOutcome, ScanEvent, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
