use crate::models::{
    ConflictType, CrashLogAnalysisResult, ModConflictResult, SettingIssue, Severity, Suspect,
};
use crate::report::{ReportOptions, ReportWriter};
use crate::{APP_NAME, VERSION};

/// One block of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    FcxNotice,
    ExecutiveSummary,
    MainError,
    CrashSuspects,
    SettingsValidation,
    PluginSuspects,
    FormIdSuspects,
    NamedRecords,
    PerformanceMetrics,
    GameHints,
    FcxFileChecks,
    Footer,
}

pub const NO_CRASH_SUSPECTS: &str = "FOUND NO CRASH SUSPECTS THAT MATCH THE CURRENT DATABASE";
pub const NO_PLUGIN_SUSPECTS: &str = "COULDN'T FIND ANY PLUGIN SUSPECTS";
pub const NO_PLUGIN_LIST: &str = "COULDN'T LOAD THE PLUGIN LIST, THIS LOG IS INCOMPLETE OR HAS NO PLUGINS";
pub const NO_FORM_ID_SUSPECTS: &str = "COULDN'T FIND ANY FORM ID SUSPECTS";
pub const NO_NAMED_RECORDS: &str = "COULDN'T FIND ANY NAMED RECORDS";
pub const NO_MOD_ISSUES: &str = "FOUND NO PROBLEMATIC MODS IN THE PLUGIN LIST";
pub const FCX_DISABLED_CHECK: &str = "❌ FCX Mode is disabled, skipping game files check...";

pub const PLUGIN_SUSPECTS_TITLE: &str = "LIST OF (POSSIBLE) PLUGIN SUSPECTS";
pub const FORM_ID_SUSPECTS_TITLE: &str = "LIST OF (POSSIBLE) FORM ID SUSPECTS";
pub const NAMED_RECORDS_TITLE: &str = "LIST OF DETECTED (NAMED) RECORDS";
pub const CRASH_SUSPECTS_TITLE: &str = "CHECKING IF LOG MATCHES ANY KNOWN CRASH SUSPECTS...";

impl Section {
    pub fn render(self, writer: &mut ReportWriter, result: &CrashLogAnalysisResult, options: &ReportOptions) {
        match self {
            Section::Header => header(writer, result),
            Section::FcxNotice => fcx_notice(writer),
            Section::ExecutiveSummary => executive_summary(writer, result),
            Section::MainError => main_error(writer, result, options),
            Section::CrashSuspects => crash_suspects(writer, result),
            Section::SettingsValidation => settings_validation(writer, result, options),
            Section::PluginSuspects => plugin_suspects(writer, result, options),
            Section::FormIdSuspects => form_id_suspects(writer, result, options),
            Section::NamedRecords => named_records(writer, result),
            Section::PerformanceMetrics => performance_metrics(writer, result),
            Section::GameHints => game_hints(writer, result, options),
            Section::FcxFileChecks => fcx_file_checks(writer, result),
            Section::Footer => footer(writer, options),
        }
    }
}

fn crashgen(options: &ReportOptions) -> &str {
    if options.crashgen_name.is_empty() {
        "the crash generator"
    } else {
        &options.crashgen_name
    }
}

fn header(writer: &mut ReportWriter, result: &CrashLogAnalysisResult) {
    writer
        .line(format!(
            "{} -> AUTOSCAN REPORT GENERATED BY {} v{}",
            result.crash_log.file_name, APP_NAME, VERSION
        ))
        .line("# FOR BEST VIEWING EXPERIENCE OPEN THIS FILE IN NOTEPAD++ OR SIMILAR #")
        .line("# PLEASE READ EVERYTHING CAREFULLY AND BEWARE OF FALSE POSITIVES #");

    if result.is_failed() {
        writer.line("❌ NOTICE : THIS LOG COULD NOT BE SCANNED. IT IS INCOMPLETE OR IN THE WRONG FORMAT.");
    } else if result.is_partial() {
        writer.line("⚠️ NOTICE : PARTS OF THIS LOG COULD NOT BE ANALYZED:");
        for error in &result.errors {
            writer.bullet(format_args!("{}: {}", error.stage.as_str(), error.message));
        }
    }
    writer.blank();
}

fn fcx_notice(writer: &mut ReportWriter) {
    writer
        .line("* NOTICE: FCX MODE IS ENABLED. AUTOSCAN MUST BE RUN BY THE ORIGINAL USER FOR CORRECT DETECTION *")
        .line("[ To disable mod & game files detection, disable FCX Mode in AutoScan Settings.yaml ]")
        .blank();
}

fn executive_summary(writer: &mut ReportWriter, result: &CrashLogAnalysisResult) {
    writer.section("EXECUTIVE SUMMARY");

    let suspects = result.suspects();
    match suspects.iter().map(|s| s.severity_score).max() {
        Some(top) => writer.bullet(format_args!(
            "Crash suspects: {} (highest severity {} {})",
            suspects.len(),
            Severity::icon(top),
            top
        )),
        None => writer.bullet("Crash suspects: 0"),
    };
    writer
        .bullet(format_args!(
            "Mod compatibility issues: {}",
            result.mod_compatibility.issues.len()
        ))
        .bullet(format_args!("Settings issues: {}", result.settings.issues.len()))
        .bullet(format_args!("Plugin suspects: {}", result.plugin_suspects.len()))
        .bullet(format_args!("Form ID suspects: {}", result.form_id_suspects.len()));

    let version_state = if result.versions.crashgen_version.is_empty() {
        "unknown"
    } else if result.is_outdated() {
        "❌ outdated"
    } else {
        "✔️ up to date"
    };
    writer.bullet(format_args!("Crash generator: {}", version_state)).blank();
}

fn main_error(writer: &mut ReportWriter, result: &CrashLogAnalysisResult, options: &ReportOptions) {
    let log = &result.crash_log;
    let crashgen = crashgen(options);

    if log.main_error.is_empty() {
        writer.line("Main Error: UNKNOWN");
    } else {
        writer.line(format!("Main Error: {}", log.main_error));
    }
    if !log.game_version.is_empty() {
        writer.line(format!("Detected Game Version: {}", log.game_version));
    }
    if !log.crashgen_version.is_empty() {
        writer
            .line(format!("Detected {} Version: {}", crashgen, log.crashgen_version))
            .line(format!(
                "LATEST {} VERSION: {} (VR: {})",
                crashgen.to_uppercase(),
                result.versions.latest_crashgen,
                result.versions.latest_crashgen_vr
            ));
        if result.is_outdated() {
            writer.line(format!(
                "* ❌ CAUTION : YOUR {} IS OUT OF DATE! UPDATE IT TO THE LATEST VERSION *",
                crashgen.to_uppercase()
            ));
        } else {
            writer.line(format!("* ✔️ You have the latest version of {}! *", crashgen));
        }
    }
    writer.blank();
}

/// Suspects by severity, highest first; ties keep database order.
pub fn ordered_suspects(suspects: &[Suspect]) -> Vec<&Suspect> {
    let mut ordered: Vec<&Suspect> = suspects.iter().collect();
    ordered.sort_by(|a, b| b.severity_score.cmp(&a.severity_score));
    ordered
}

fn crash_suspects(writer: &mut ReportWriter, result: &CrashLogAnalysisResult) {
    writer.section(CRASH_SUSPECTS_TITLE);

    if result.dll_involved {
        writer
            .line("* NOTICE : MAIN ERROR REPORTS THAT A DLL FILE WAS INVOLVED IN THIS CRASH! *")
            .line("If that dll file belongs to a mod, that mod is a prime suspect for the crash.")
            .divider();
    }

    if result.suspects().is_empty() {
        writer.notice(NO_CRASH_SUSPECTS);
        return;
    }

    for suspect in ordered_suspects(result.suspects()) {
        writer.line(format!(
            "{} # Checking for {} SUSPECT FOUND! > Severity : {} #",
            Severity::icon(suspect.severity_score),
            suspect.name,
            suspect.severity_score
        ));
        if !suspect.evidence.is_empty() {
            writer.line(format!("  {}: {}", suspect.category, suspect.evidence));
        }
        if !suspect.recommendation.is_empty() {
            writer.line(format!("  {}", suspect.recommendation));
        }
        writer.divider();
    }
    writer.blank();
}

fn setting_issue(writer: &mut ReportWriter, issue: &SettingIssue) {
    writer.line(format!(
        "# {} CAUTION : {} #",
        Severity::icon(issue.severity),
        issue.message
    ));
    if !issue.fix.is_empty() {
        writer.line(format!("  FIX: {}", issue.fix));
    }
    if issue.fixed {
        writer.line(format!("  ✔️ {} was set to {} automatically", issue.key, issue.expected));
    }
    writer.divider();
}

fn conflict_label(conflict_type: ConflictType) -> &'static str {
    match conflict_type {
        ConflictType::FrequentCrash => "FREQUENT CRASHES",
        ConflictType::ModPairConflict => "CONFLICT",
        ConflictType::MissingImportant => "MISSING",
        ConflictType::GpuIncompatible => "WRONG GPU",
        ConflictType::LoadOrderIssue => "LOAD ORDER",
        ConflictType::HasSolution => "HAS SOLUTION",
    }
}

fn mod_issue(writer: &mut ReportWriter, issue: &ModConflictResult) {
    let plugin = if issue.plugin_id.is_empty() {
        String::new()
    } else {
        format!(" [{}]", issue.plugin_id)
    };
    writer.line(format!(
        "{} [{}]{} {}",
        issue.severity.icon(),
        conflict_label(issue.conflict_type),
        plugin,
        issue.mod_name
    ));
    if !issue.warning.is_empty() {
        writer.line(format!("  {}", issue.warning.trim()));
    }
    if !issue.solution.is_empty() {
        writer.line(format!("  Solution: {}", issue.solution.trim()));
    }
    writer.divider();
}

fn settings_validation(writer: &mut ReportWriter, result: &CrashLogAnalysisResult, options: &ReportOptions) {
    let crashgen = crashgen(options);
    let settings = &result.settings;
    writer.section("CHECKING IF NECESSARY FILES/SETTINGS ARE CORRECT...");

    if !settings.checked {
        writer.notice(&format!(
            "COULDN'T READ {} SETTINGS, SKIPPING SETTINGS CHECKS",
            crashgen.to_uppercase()
        ));
    } else {
        for passed in &settings.passed {
            writer.line(format!("✔️ {}", passed)).divider();
        }
        let mut issues: Vec<&SettingIssue> = settings.issues.iter().collect();
        issues.sort_by(|a, b| b.severity.cmp(&a.severity));
        for issue in issues {
            setting_issue(writer, issue);
        }
        if settings.issues.is_empty() {
            writer
                .line(format!("✔️ No problems found with your {} settings", crashgen))
                .divider();
        }
        for key in &settings.disabled {
            writer
                .line(format!(
                    "* NOTICE : {} is disabled in your {} settings, is this intentional? *",
                    key, crashgen
                ))
                .divider();
        }
        writer.blank();
    }

    writer.section("CHECKING FOR MODS THAT ARE INCOMPATIBLE, MISSING OR PRONE TO CRASHES...");
    if !result.plugin_limit.plugins_loaded {
        writer.notice(NO_PLUGIN_LIST);
        return;
    }
    let compatibility = &result.mod_compatibility;
    for name in &compatibility.installed_important {
        writer.line(format!("✔️ {} is installed", name));
    }
    if !compatibility.installed_important.is_empty() {
        writer.divider();
    }
    if compatibility.issues.is_empty() {
        writer.notice(NO_MOD_ISSUES);
        return;
    }
    for issue in &compatibility.issues {
        mod_issue(writer, issue);
    }
    writer.blank();
}

fn plugin_suspects(writer: &mut ReportWriter, result: &CrashLogAnalysisResult, options: &ReportOptions) {
    writer.section(PLUGIN_SUSPECTS_TITLE);

    if result.crash_log.plugins.iter().any(|p| !p.has_known_index()) {
        writer
            .line("* ✔️ LOADORDER.TXT FILE FOUND IN THE DATA FOLDER! *")
            .line("AutoScan ignores the plugin list in every crash log and only uses the plugins in this file.")
            .line("[ To disable this, remove loadorder.txt from the AutoScan data folder. ]")
            .blank();
    }

    let limit = &result.plugin_limit;
    if limit.reached_limit {
        writer
            .line("# 💀 CAUTION : THE PLUGIN LIMIT WAS REACHED! THE GAME CANNOT LOAD ANY MORE PLUGINS #")
            .line("  Disable or merge plugins until the load order is below the limit.")
            .divider();
    } else if limit.limit_check_disabled {
        writer
            .line(format!(
                "* NOTICE : This {} version reports the plugin limit incorrectly on this game version, limit check skipped *",
                crashgen(options)
            ))
            .divider();
    }

    if !limit.plugins_loaded {
        writer.notice(NO_PLUGIN_LIST);
        return;
    }
    if result.plugin_suspects.is_empty() {
        writer.notice(NO_PLUGIN_SUSPECTS);
        return;
    }

    writer.line("The following PLUGINS were found in the CRASH STACK:");
    for suspect in &result.plugin_suspects {
        writer.bullet(format_args!(
            "[{}] {} | {}",
            suspect.load_order, suspect.plugin, suspect.occurrences
        ));
    }
    writer
        .blank()
        .line("[Last number counts how many times each Plugin Suspect shows up in the crash log.]")
        .line(format!(
            "These Plugins were caught by {} and some of them might be responsible for this crash.",
            crashgen(options)
        ))
        .line("You can try disabling these plugins and check if the game still crashes, though this method can be unreliable.")
        .blank();
}

fn form_id_suspects(writer: &mut ReportWriter, result: &CrashLogAnalysisResult, options: &ReportOptions) {
    writer.section(FORM_ID_SUSPECTS_TITLE);

    if result.form_id_suspects.is_empty() {
        writer.notice(NO_FORM_ID_SUSPECTS);
        return;
    }

    for hit in &result.form_id_suspects {
        let form_id = &hit.form_id;
        let plugin = if form_id.is_resolved() {
            form_id.plugin_name.as_str()
        } else {
            "Unknown plugin"
        };
        match &hit.description {
            Some(description) => writer.bullet(format_args!(
                "Form ID: {} | [{}] | {} | {}",
                form_id.raw, plugin, description, hit.count
            )),
            None => writer.bullet(format_args!(
                "Form ID: {} | [{}] | {}",
                form_id.raw, plugin, hit.count
            )),
        };
    }
    writer
        .blank()
        .line("[Last number counts how many times each Form ID shows up in the crash log.]")
        .line(format!(
            "These Form IDs were caught by {} and some of them might be related to this crash.",
            crashgen(options)
        ))
        .line("You can try searching any listed Form IDs in xEdit and see if they lead to relevant records.")
        .blank();
}

fn named_records(writer: &mut ReportWriter, result: &CrashLogAnalysisResult) {
    writer.section(NAMED_RECORDS_TITLE);

    if result.named_records.is_empty() {
        writer.notice(NO_NAMED_RECORDS);
        return;
    }

    for record in &result.named_records {
        writer.bullet(format_args!("{} | {}", record.name, record.count));
    }
    writer
        .blank()
        .line("[Last number counts how many times each Named Record shows up in the crash log.]")
        .line("These records were caught in the crash stack and some of them might be related to this crash.")
        .line("Named records should give extra info on involved game objects, record types or mod files.")
        .blank();
}

fn performance_metrics(writer: &mut ReportWriter, result: &CrashLogAnalysisResult) {
    let stats = &result.statistics;
    writer
        .section("SCAN STATISTICS")
        .bullet(format_args!("Lines: {}", stats.total_lines))
        .bullet(format_args!("Segments: {}", stats.segment_count))
        .bullet(format_args!("Call stack lines: {}", stats.call_stack_lines))
        .bullet(format_args!(
            "Plugins: {} ({} light)",
            stats.plugin_count, stats.light_plugin_count
        ))
        .bullet(format_args!("Script extender modules: {}", result.xse_modules.len()))
        .bullet(format_args!("Form IDs: {}", stats.form_id_count))
        .bullet(format_args!("Named records: {}", stats.named_record_count))
        .bullet(format_args!("Crash suspects: {}", stats.suspect_count));

    if let Some(primary) = &result.gpu.primary {
        writer.bullet(format_args!("GPU: {} ({})", primary, result.gpu.vendor.as_str()));
    }
    writer
        .bullet(format_args!("Analysis time: {} ms", stats.analysis_time_ms))
        .blank();
}

/// Hint for a log, stable for a given file name.
pub fn pick_hint<'a>(hints: &'a [String], file_name: &str) -> Option<&'a str> {
    if hints.is_empty() {
        return None;
    }
    let seed: usize = file_name.bytes().map(usize::from).sum();
    hints.get(seed % hints.len()).map(String::as_str)
}

fn game_hints(writer: &mut ReportWriter, result: &CrashLogAnalysisResult, options: &ReportOptions) {
    writer.section("GAME HINT");
    match pick_hint(&options.hints, &result.crash_log.file_name) {
        Some(hint) => writer.line(hint).blank(),
        None => writer.notice("NO GAME HINTS AVAILABLE"),
    };
}

fn fcx_file_checks(writer: &mut ReportWriter, result: &CrashLogAnalysisResult) {
    let Some(fcx) = result.fcx.as_ref().filter(|f| f.enabled) else {
        writer.section("MAIN FILES CHECK").line(FCX_DISABLED_CHECK).blank();
        return;
    };

    writer.section("MAIN FILES CHECK");
    if fcx.main_files.is_empty() {
        writer.notice("NO MAIN FILE CHECK RESULTS");
    } else {
        for line in &fcx.main_files {
            writer.line(line);
        }
        writer.blank();
    }

    writer.section("GAME FILES CHECK");
    if fcx.game_files.is_empty() {
        writer.notice("NO GAME FILE CHECK RESULTS");
    } else {
        for line in &fcx.game_files {
            writer.line(line);
        }
        writer.blank();
    }
}

fn footer(writer: &mut ReportWriter, options: &ReportOptions) {
    if !options.fcx_mode {
        writer
            .line("* NOTICE: FCX MODE IS DISABLED. YOU CAN ENABLE IT TO DETECT PROBLEMS IN YOUR MOD & GAME FILES *")
            .line("[ FCX Mode can be enabled with --fcx-mode or in AutoScan Settings.yaml ]")
            .blank();
    }
    writer
        .rule()
        .line(format!("{} v{} | END OF AUTOSCAN REPORT", APP_NAME, VERSION));
}
