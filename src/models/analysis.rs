use crate::models::context::parse_version;
use crate::models::{
    CrashLog, FormIdHit, GpuVendor, ModCompatibility, PluginLimitStatus, Suspect,
};
use serde::{Deserialize, Serialize};

/// Per-log pipeline stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnalysisStage {
    #[default]
    Parsed,
    Segmented,
    Extracted,
    Matched,
    Validated,
    Assembled,
    Success,
    Failed,
}

impl AnalysisStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStage::Parsed => "parsed",
            AnalysisStage::Segmented => "segmented",
            AnalysisStage::Extracted => "extracted",
            AnalysisStage::Matched => "matched",
            AnalysisStage::Validated => "validated",
            AnalysisStage::Assembled => "assembled",
            AnalysisStage::Success => "success",
            AnalysisStage::Failed => "failed",
        }
    }
}

/// A non-fatal failure recorded while a stage ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: AnalysisStage,
    pub message: String,
}

/// Counters collected for one log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    pub total_lines: usize,
    pub segment_count: usize,
    pub call_stack_lines: usize,
    pub plugin_count: usize,
    pub light_plugin_count: usize,
    pub form_id_count: usize,
    pub named_record_count: usize,
    pub suspect_count: usize,
    pub analysis_time_ms: u64,
}

/// A plugin named in the call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSuspect {
    pub plugin: String,
    /// Load-order label from the plugin list, e.g. `05` or `FE:001`
    pub load_order: String,
    pub occurrences: usize,
}

/// A named record (object, file or script name) seen in the stack dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRecord {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub vendor: GpuVendor,
    pub rival: Option<GpuVendor>,
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingIssueKind {
    /// Value differs from the expected one
    Mismatch,
    /// Two mods provide the same memory management
    Redundant,
}

/// A crash generator setting that needs attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingIssue {
    pub section: String,
    pub key: String,
    pub expected: String,
    pub actual: Option<String>,
    pub kind: SettingIssueKind,
    /// 1-6, same scale as suspects
    pub severity: u8,
    pub message: String,
    pub fix: String,
    /// Set when the live-fix pass wrote the expected value back
    pub fixed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsValidationResult {
    pub issues: Vec<SettingIssue>,
    /// Checks whose trigger held and whose value was already correct
    pub passed: Vec<String>,
    /// Settings that are disabled and not on the ignore list
    pub disabled: Vec<String>,
    /// False when no settings source was available
    pub checked: bool,
}

impl SettingsValidationResult {
    pub fn max_severity(&self) -> u8 {
        self.issues.iter().map(|i| i.severity).max().unwrap_or(0)
    }
}

/// Output of the extended file checks, shared by every log in a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcxCheckResults {
    pub enabled: bool,
    pub main_files: Vec<String>,
    pub game_files: Vec<String>,
}

/// Versions seen in the log next to the known-latest ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub game_version: String,
    pub crashgen_version: String,
    pub latest_crashgen: String,
    pub latest_crashgen_vr: String,
}

impl VersionInfo {
    /// Below both the regular and the VR latest release.
    ///
    /// An unparseable detected version is never reported as outdated.
    pub fn is_outdated(&self) -> bool {
        let Some(detected) = parse_version(&self.crashgen_version) else {
            return false;
        };
        let below = |latest: &str| parse_version(latest).is_none_or(|latest| detected < latest);
        below(&self.latest_crashgen) && below(&self.latest_crashgen_vr)
    }
}

/// Everything known about one crash log after analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashLogAnalysisResult {
    /// The parsed log with `plugins` and `suspects` filled in
    pub crash_log: CrashLog,
    pub stage: AnalysisStage,
    pub statistics: ScanStatistics,
    pub plugin_suspects: Vec<PluginSuspect>,
    pub form_id_suspects: Vec<FormIdHit>,
    pub named_records: Vec<NamedRecord>,
    pub settings: SettingsValidationResult,
    pub plugin_limit: PluginLimitStatus,
    pub mod_compatibility: ModCompatibility,
    pub gpu: GpuInfo,
    pub xse_modules: Vec<String>,
    pub versions: VersionInfo,
    /// Main error mentions a DLL
    pub dll_involved: bool,
    pub fcx: Option<FcxCheckResults>,
    pub errors: Vec<StageError>,
}

impl CrashLogAnalysisResult {
    /// Empty result around a log, every contribution at its zero value.
    pub fn new(crash_log: CrashLog) -> Self {
        Self {
            crash_log,
            stage: AnalysisStage::Parsed,
            statistics: ScanStatistics::default(),
            plugin_suspects: Vec::new(),
            form_id_suspects: Vec::new(),
            named_records: Vec::new(),
            settings: SettingsValidationResult::default(),
            plugin_limit: PluginLimitStatus::default(),
            mod_compatibility: ModCompatibility::default(),
            gpu: GpuInfo::default(),
            xse_modules: Vec::new(),
            versions: VersionInfo::default(),
            dll_involved: false,
            fcx: None,
            errors: Vec::new(),
        }
    }

    pub fn suspects(&self) -> &[Suspect] {
        &self.crash_log.suspects
    }

    pub fn is_outdated(&self) -> bool {
        self.versions.is_outdated()
    }

    pub fn is_failed(&self) -> bool {
        self.stage == AnalysisStage::Failed
    }

    /// Finished, but at least one stage degraded.
    pub fn is_partial(&self) -> bool {
        !self.is_failed() && !self.errors.is_empty()
    }

    pub fn record_error(&mut self, stage: AnalysisStage, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(
            "{}: {} stage degraded: {}",
            self.crash_log.file_name,
            stage.as_str(),
            message
        );
        self.errors.push(StageError { stage, message });
    }
}
