use crate::models::{Plugin, Suspect};
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Named sections of a crash log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Lines before the first recognized anchor (versions, main error)
    Header,
    /// Crash generator settings echoed into the log
    CrashgenSettings,
    SystemSpecs,
    CallStack,
    Registers,
    /// Raw stack dump; this is where most named records live
    Stack,
    Modules,
    /// Script extender plugin DLLs (`F4SE PLUGINS:`, `SKSE PLUGINS:`)
    XsePlugins,
    Plugins,
}

impl SegmentKind {
    /// Segments searched for suspects, FormIDs and named records.
    pub const STACK_TEXT: [SegmentKind; 3] =
        [SegmentKind::CallStack, SegmentKind::Registers, SegmentKind::Stack];

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Header => "header",
            SegmentKind::CrashgenSettings => "crashgen settings",
            SegmentKind::SystemSpecs => "system specs",
            SegmentKind::CallStack => "call stack",
            SegmentKind::Registers => "registers",
            SegmentKind::Stack => "stack",
            SegmentKind::Modules => "modules",
            SegmentKind::XsePlugins => "xse plugins",
            SegmentKind::Plugins => "plugins",
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Segment name to ordered lines, in order of first appearance.
pub type Segments = IndexMap<SegmentKind, Vec<String>>;

/// One parsed crash log file.
///
/// Built once by [`crate::services::Analyzer::parse_crash_log`] and never
/// mutated afterwards; analysis only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashLog {
    pub file_name: String,
    pub path: Utf8PathBuf,
    pub created: Option<DateTime<Utc>>,
    pub game_version: String,
    pub crashgen_version: String,
    pub main_error: String,
    #[serde(skip_serializing, default)]
    pub lines: Vec<String>,
    pub segments: Segments,
    pub plugins: Vec<Plugin>,
    pub suspects: Vec<Suspect>,
}

impl CrashLog {
    /// A log with no content, named after the last path component.
    pub fn empty(path: Utf8PathBuf) -> Self {
        Self {
            file_name: path.file_name().unwrap_or_default().to_string(),
            path,
            created: None,
            game_version: String::new(),
            crashgen_version: String::new(),
            main_error: String::new(),
            lines: Vec::new(),
            segments: Segments::default(),
            plugins: Vec::new(),
            suspects: Vec::new(),
        }
    }

    /// Lines of one segment, empty if the segment is absent.
    pub fn segment(&self, kind: SegmentKind) -> &[String] {
        self.segments.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Absent and present-but-empty segments are reported differently.
    pub fn has_segment(&self, kind: SegmentKind) -> bool {
        self.segments.contains_key(&kind)
    }

    /// Lines of the call stack, registers and stack dump, in log order.
    pub fn stack_lines(&self) -> impl Iterator<Item = &String> {
        SegmentKind::STACK_TEXT
            .iter()
            .flat_map(move |kind| self.segment(*kind).iter())
    }

    /// The stack text joined into one string for substring matching.
    pub fn stack_text(&self) -> String {
        let mut text = String::new();
        for line in self.stack_lines() {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    pub fn is_parseable(&self) -> bool {
        !self.segments.is_empty()
    }
}
