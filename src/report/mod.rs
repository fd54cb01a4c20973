//! Report rendering.
//!
//! A report is a fixed sequence of [`Section`]s; the [`ReportStrategy`]
//! decides which optional sections are included. Rendering is a pure
//! function of the analysis result, the strategy and the options.

pub mod sections;
pub mod template;

pub use sections::Section;
pub use template::ReportWriter;

use crate::models::CrashLogAnalysisResult;
use serde::{Deserialize, Serialize};

/// Crash suspects at which a report switches to Enhanced.
pub const COMPLEX_SUSPECT_COUNT: usize = 5;
/// Mod compatibility issues at which a report switches to Enhanced.
pub const COMPLEX_MOD_ISSUE_COUNT: usize = 3;
/// Setting issue severity at which a report switches to Enhanced.
pub const COMPLEX_SETTING_SEVERITY: u8 = 4;
/// Plugin suspects at which a report switches to Enhanced.
pub const COMPLEX_PLUGIN_SUSPECT_COUNT: usize = 10;

/// Report detail level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStrategy {
    Standard,
    Enhanced,
    /// Enhanced plus the extended file check results
    Advanced,
}

impl ReportStrategy {
    /// Pick the strategy for one result.
    ///
    /// FCX mode always means Advanced. Otherwise Enhanced is used when asked
    /// for, or when the crash looks complex enough to need the summary.
    pub fn select(result: &CrashLogAnalysisResult, options: &ReportOptions) -> Self {
        if options.fcx_mode {
            return ReportStrategy::Advanced;
        }
        if options.enhanced || is_complex(result) {
            ReportStrategy::Enhanced
        } else {
            ReportStrategy::Standard
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStrategy::Standard => "standard",
            ReportStrategy::Enhanced => "enhanced",
            ReportStrategy::Advanced => "advanced",
        }
    }

    /// Sections in render order.
    pub fn sections(self) -> Vec<Section> {
        let detailed = self != ReportStrategy::Standard;
        let advanced = self == ReportStrategy::Advanced;

        let mut sections = vec![Section::Header];
        if advanced {
            sections.push(Section::FcxNotice);
        }
        if detailed {
            sections.push(Section::ExecutiveSummary);
        }
        sections.extend([
            Section::MainError,
            Section::CrashSuspects,
            Section::SettingsValidation,
            Section::PluginSuspects,
            Section::FormIdSuspects,
            Section::NamedRecords,
        ]);
        if detailed {
            sections.extend([Section::PerformanceMetrics, Section::GameHints]);
        }
        if advanced {
            sections.push(Section::FcxFileChecks);
        }
        sections.push(Section::Footer);
        sections
    }
}

fn is_complex(result: &CrashLogAnalysisResult) -> bool {
    result.suspects().len() >= COMPLEX_SUSPECT_COUNT
        || result.mod_compatibility.issues.len() >= COMPLEX_MOD_ISSUE_COUNT
        || result.settings.max_severity() >= COMPLEX_SETTING_SEVERITY
        || result.plugin_suspects.len() >= COMPLEX_PLUGIN_SUSPECT_COUNT
}

/// Everything a report needs besides the result itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportOptions {
    pub fcx_mode: bool,
    /// Enhanced report requested regardless of complexity
    pub enhanced: bool,
    pub crashgen_name: String,
    pub xse_acronym: String,
    pub hints: Vec<String>,
}

/// Render with the strategy chosen by [`ReportStrategy::select`].
pub async fn render_report(result: &CrashLogAnalysisResult, options: &ReportOptions) -> String {
    let strategy = ReportStrategy::select(result, options);
    tracing::debug!(
        "Rendering {} report for {}",
        strategy.as_str(),
        result.crash_log.file_name
    );
    render(result, strategy, options)
}

/// Render one result with an explicit strategy.
pub fn render(
    result: &CrashLogAnalysisResult,
    strategy: ReportStrategy,
    options: &ReportOptions,
) -> String {
    let mut writer = ReportWriter::new();
    for section in strategy.sections() {
        section.render(&mut writer, result, options);
    }
    writer.finish()
}
