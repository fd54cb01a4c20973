//! Data models for the crash log scanner.
//!
//! - [`CrashLog`]: one parsed log, split into [`Segments`]
//! - [`Plugin`], [`FormId`], [`Suspect`], [`ModConflictResult`]: what analysis extracts
//! - [`CrashLogAnalysisResult`]: the aggregate handed to the report renderer
//! - [`ScanDatabase`]: suspect patterns, mod tables and game info from YAML
//! - [`GameContext`]: game identity passed explicitly through the pipeline
//!
//! All models derive `Serialize` so results can be written out as JSON.

pub mod analysis;
pub mod context;
pub mod crash_log;
pub mod database;
pub mod form_id;
pub mod mod_conflict;
pub mod plugin;
pub mod suspect;

pub use analysis::{
    AnalysisStage, CrashLogAnalysisResult, FcxCheckResults, GpuInfo, NamedRecord, PluginSuspect,
    ScanStatistics, SettingIssue, SettingIssueKind, SettingsValidationResult, StageError,
    VersionInfo,
};
pub use context::{GameContext, parse_version};
pub use crash_log::{CrashLog, SegmentKind, Segments};
pub use database::{
    GameInfo, GpuVendor, ModConflictDatabase, ModEntry, RecordLists, ScanDatabase,
    SuspectPatternDatabase,
};
pub use form_id::{FormId, FormIdHit, UNKNOWN_FORM_TYPE};
pub use mod_conflict::{ConflictSeverity, ConflictType, ModCompatibility, ModConflictResult};
pub use plugin::{
    Plugin, PluginKind, PluginLimitStatus, PluginLimits, PluginSource, PluginStatus,
};
pub use suspect::{Severity, Suspect, SuspectType};
