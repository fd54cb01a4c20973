//! Per-log analysis pipeline.
//!
//! [`Analyzer`] owns every compiled matcher and the read-only database for a
//! batch. Each log runs through the stages in [`AnalysisStage`] order; a stage
//! that fails records a [`StageError`](crate::models::StageError) and leaves
//! its contribution empty, so one bad segment never costs the whole report.

use crate::config::{
    ConfigValueError, ConfigValueReader, ConfigValueWriter, LogSettingsReader, ScanSettings,
};
use crate::error::{ScanError, ScanResult};
use crate::models::{
    AnalysisStage, CrashLog, CrashLogAnalysisResult, FcxCheckResults, GameContext, PluginLimits,
    PluginSuspect, ScanDatabase, SegmentKind, SettingsValidationResult, VersionInfo,
};
use crate::services::fcx::FcxHandler;
use crate::services::form_ids::{FormIdExtractor, FormIdLookup, count_form_ids, resolve_form_ids};
use crate::services::mod_conflicts::{InstalledMods, detect_mod_conflicts};
use crate::services::plugins::{PluginExtractor, PluginList, find_plugin_suspects};
use crate::services::records::{detect_gpu, find_named_records};
use crate::services::segments::{SegmentParser, extract_header};
use crate::services::settings_validator::SettingsValidator;
use crate::services::suspects::{SuspectMatcher, dll_involved};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Crash log analysis service.
///
/// Build one per batch and share it behind an `Arc`; every method takes
/// `&self` and the database is never modified.
pub struct Analyzer {
    database: Arc<ScanDatabase>,
    context: GameContext,

    segment_parser: SegmentParser,
    plugin_extractor: PluginExtractor,
    form_id_extractor: FormIdExtractor,
    suspect_matcher: SuspectMatcher,
    settings_validator: SettingsValidator,

    /// Consulted only when FormID values are requested
    form_id_lookup: Option<Arc<dyn FormIdLookup>>,
    /// Crash generator settings from disk; the log's own copy is used otherwise
    settings_reader: Option<Arc<dyn ConfigValueReader>>,
    fcx: Arc<FcxHandler>,
    show_formid_values: bool,
    /// Plugins from `loadorder.txt`, used instead of each log's list
    load_order: Option<Arc<PluginList>>,
    /// Database ignore list plus the user's
    plugin_ignore: Vec<String>,
}

impl Analyzer {
    pub fn new(database: Arc<ScanDatabase>, settings: &ScanSettings) -> Self {
        let context = GameContext::new(&database.game, settings.vr_mode, PluginLimits::default());
        let suspect_matcher = SuspectMatcher::new(&database.suspects);
        let settings_validator =
            SettingsValidator::new(&database.game.crashgen_name, &database.game.crashgen_ignore);

        let mut plugin_ignore = database.plugins_ignore.clone();
        for plugin in &settings.ignore_list {
            if !plugin_ignore.iter().any(|p| p.eq_ignore_ascii_case(plugin)) {
                plugin_ignore.push(plugin.clone());
            }
        }

        tracing::info!(
            "Analyzer ready for {} with {} suspect patterns",
            context.game,
            suspect_matcher.len()
        );

        Self {
            database,
            context,
            segment_parser: SegmentParser::new(),
            plugin_extractor: PluginExtractor::new(),
            form_id_extractor: FormIdExtractor::new(),
            suspect_matcher,
            settings_validator,
            form_id_lookup: None,
            settings_reader: None,
            fcx: Arc::new(FcxHandler::new(settings.fcx_mode, None)),
            show_formid_values: settings.show_formid_values,
            load_order: None,
            plugin_ignore,
        }
    }

    pub fn with_form_id_lookup(mut self, lookup: Arc<dyn FormIdLookup>) -> Self {
        self.form_id_lookup = Some(lookup);
        self
    }

    pub fn with_settings_reader(mut self, reader: Arc<dyn ConfigValueReader>) -> Self {
        self.settings_reader = Some(reader);
        self
    }

    /// Take plugins from a `loadorder.txt` list instead of each log's segment.
    pub fn with_load_order(mut self, list: PluginList) -> Self {
        self.load_order = Some(Arc::new(list));
        self
    }

    pub fn with_fcx(mut self, handler: Arc<FcxHandler>) -> Self {
        self.fcx = handler;
        self
    }

    pub fn context(&self) -> &GameContext {
        &self.context
    }

    pub fn database(&self) -> &ScanDatabase {
        &self.database
    }

    pub fn fcx(&self) -> &FcxHandler {
        &self.fcx
    }

    /// Read a crash log from disk and segment it.
    ///
    /// Only I/O errors are returned. A file without any recognizable section
    /// still parses; [`Analyzer::analyze`] reports it as failed.
    pub async fn parse_crash_log(&self, path: &Utf8Path) -> ScanResult<CrashLog> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ScanError::io(path, e))?;
        let text = String::from_utf8_lossy(&bytes);

        let created = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from),
            Err(e) => {
                tracing::debug!("No metadata for {}: {}", path, e);
                None
            }
        };

        let mut log = self.parse_text(path.to_path_buf(), &text);
        log.created = created;
        Ok(log)
    }

    /// Segment crash log text that is already in memory.
    pub fn parse_text(&self, path: Utf8PathBuf, text: &str) -> CrashLog {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let segments = self.segment_parser.split(&lines);
        let header = extract_header(
            segments
                .get(&SegmentKind::Header)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            &self.context.root_name,
            &self.context.crashgen_name,
        );

        tracing::debug!(
            "Parsed {}: {} lines, {} segments",
            path,
            lines.len(),
            segments.len()
        );

        CrashLog {
            file_name: path.file_name().unwrap_or(path.as_str()).to_string(),
            path,
            created: None,
            game_version: header.game_version,
            crashgen_version: header.crashgen_version,
            main_error: header.main_error,
            lines,
            segments,
            plugins: Vec::new(),
            suspects: Vec::new(),
        }
    }

    /// Run every analysis stage on a parsed log.
    ///
    /// Waits for the batch's extended file checks when FCX mode is on.
    pub async fn analyze(&self, log: &CrashLog) -> CrashLogAnalysisResult {
        let fcx = if self.fcx.is_enabled() {
            Some(self.fcx.results().await)
        } else {
            None
        };
        self.analyze_with(log, fcx)
    }

    /// Synchronous core of [`Analyzer::analyze`].
    pub fn analyze_with(&self, log: &CrashLog, fcx: Option<FcxCheckResults>) -> CrashLogAnalysisResult {
        let started = Instant::now();
        let mut result = CrashLogAnalysisResult::new(log.clone());
        result.fcx = fcx;
        result.statistics.total_lines = log.lines.len();
        result.versions = VersionInfo {
            game_version: log.game_version.clone(),
            crashgen_version: log.crashgen_version.clone(),
            latest_crashgen: self.context.latest_crashgen.clone(),
            latest_crashgen_vr: self.context.latest_crashgen_vr.clone(),
        };

        if !log.is_parseable() {
            let error = ScanError::ParseFailure(log.path.clone());
            result.record_error(AnalysisStage::Segmented, error.to_string());
            result.stage = AnalysisStage::Failed;
            result.statistics.analysis_time_ms = started.elapsed().as_millis() as u64;
            return result;
        }
        result.stage = AnalysisStage::Segmented;
        result.statistics.segment_count = log.segments.len();
        result.statistics.call_stack_lines = log.segment(SegmentKind::CallStack).len();

        self.extract(log, &mut result);
        result.stage = AnalysisStage::Extracted;

        self.match_suspects(log, &mut result);
        result.stage = AnalysisStage::Matched;

        self.validate(log, &mut result);
        result.stage = AnalysisStage::Validated;

        let statistics = &mut result.statistics;
        statistics.plugin_count = result.crash_log.plugins.len();
        statistics.light_plugin_count = result.crash_log.plugins.iter().filter(|p| p.is_light()).count();
        statistics.form_id_count = result.form_id_suspects.iter().map(|h| h.count).sum();
        statistics.named_record_count = result.named_records.len();
        statistics.suspect_count = result.crash_log.suspects.len();
        result.stage = AnalysisStage::Assembled;

        result.statistics.analysis_time_ms = started.elapsed().as_millis() as u64;
        result.stage = AnalysisStage::Success;
        tracing::debug!(
            "Analyzed {} in {}ms: {} suspects, {} stage errors",
            log.file_name,
            result.statistics.analysis_time_ms,
            result.statistics.suspect_count,
            result.errors.len()
        );
        result
    }

    /// Correct crash generator settings on disk for the mods installed in `log`.
    ///
    /// Returns the validation with every corrected issue marked `fixed`.
    pub fn fix_settings<W: ConfigValueWriter>(
        &self,
        writer: &mut W,
        log: &CrashLog,
    ) -> Result<SettingsValidationResult, ConfigValueError> {
        let modules = self
            .plugin_extractor
            .xse_modules(log.segment(SegmentKind::XsePlugins));
        let result = self.settings_validator.validate_and_fix(writer, &modules)?;
        tracing::info!(
            "Fixed {} crash generator settings using {}",
            result.issues.iter().filter(|i| i.fixed).count(),
            log.file_name
        );
        Ok(result)
    }

    fn extract(&self, log: &CrashLog, result: &mut CrashLogAnalysisResult) {
        let extracted = match &self.load_order {
            Some(list) => Ok(list.as_ref().clone()),
            None => self.plugin_extractor.extract(
                log.segments.get(&SegmentKind::Plugins).map(Vec::as_slice),
                &self.context,
                &log.game_version,
                &log.crashgen_version,
            ),
        };
        match extracted {
            Ok(list) => {
                if !list.limit.plugins_loaded {
                    let error = ScanError::partial("plugin", "the log has no plugin list");
                    result.record_error(AnalysisStage::Extracted, error.to_string());
                }
                result.crash_log.plugins = list.plugins;
                result.plugin_limit = list.limit;
            }
            Err(e) => result.record_error(AnalysisStage::Extracted, e.to_string()),
        }

        result.xse_modules = self
            .plugin_extractor
            .xse_modules(log.segment(SegmentKind::XsePlugins));

        let mut form_ids = self.form_id_extractor.extract(log);
        resolve_form_ids(&mut form_ids, &result.crash_log.plugins);
        let lookup = if self.show_formid_values {
            self.form_id_lookup.as_deref()
        } else {
            None
        };
        result.form_id_suspects = count_form_ids(form_ids, lookup);

        result.named_records = find_named_records(log.stack_lines(), &self.database.records);
        result.gpu = detect_gpu(log.segment(SegmentKind::SystemSpecs));

        result.plugin_suspects = find_plugin_suspects(
            log.segment(SegmentKind::CallStack),
            &result.crash_log.plugins,
            &self.plugin_ignore,
        )
        .into_iter()
        .map(|(plugin, occurrences)| PluginSuspect {
            plugin: plugin.file_name.clone(),
            load_order: plugin.load_order_label(),
            occurrences,
        })
        .collect();
    }

    fn match_suspects(&self, log: &CrashLog, result: &mut CrashLogAnalysisResult) {
        if log.main_error.is_empty() {
            result.record_error(AnalysisStage::Matched, "no main error line in the log header");
        }
        result.crash_log.suspects = self
            .suspect_matcher
            .find_suspects(&log.main_error, &log.stack_text());
        result.dll_involved = dll_involved(&log.main_error);
    }

    fn validate(&self, log: &CrashLog, result: &mut CrashLogAnalysisResult) {
        // Without a plugin list every core mod would look missing
        if result.plugin_limit.plugins_loaded {
            let installed = InstalledMods::new(&result.crash_log.plugins, &result.xse_modules);
            result.mod_compatibility =
                detect_mod_conflicts(&self.database.mods, &installed, result.gpu.vendor);
        } else {
            tracing::debug!("No plugin list in {}, mod checks skipped", log.file_name);
        }

        result.settings = match &self.settings_reader {
            Some(reader) => self.settings_validator.validate(reader.as_ref(), &result.xse_modules),
            None => {
                let reader = LogSettingsReader::from_lines(log.segment(SegmentKind::CrashgenSettings));
                self.settings_validator.validate(&reader, &result.xse_modules)
            }
        };
    }
}
