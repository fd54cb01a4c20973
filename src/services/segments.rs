//! Crash log segmentation.
//!
//! A crash log is a sequence of sections introduced by anchor lines such as
//! `PLUGINS:` or `PROBABLE CALL STACK:`. [`SegmentParser::split`] assigns
//! every non-anchor line to the section it follows; lines before the first
//! anchor form the [`SegmentKind::Header`].

use crate::models::{SegmentKind, Segments};
use regex::Regex;

/// Prefix of the main error line.
pub const MAIN_ERROR_PREFIX: &str = "Unhandled exception";

/// Classification of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Known(SegmentKind),
    /// Looks like a section header but is not one we track
    Unknown,
}

/// Version and error lines from the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogHeader {
    pub game_version: String,
    pub crashgen_version: String,
    pub main_error: String,
}

pub struct SegmentParser {
    anchors: Vec<(Regex, SegmentKind)>,
    generic_anchor: Regex,
}

impl Default for SegmentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentParser {
    pub fn new() -> Self {
        let anchor = |pattern: &str, kind| (Regex::new(pattern).expect("Invalid anchor regex"), kind);
        Self {
            anchors: vec![
                anchor(r"^\s*\[Compatibility\]$", SegmentKind::CrashgenSettings),
                anchor(r"^SETTINGS:$", SegmentKind::CrashgenSettings),
                anchor(r"^SYSTEM SPECS:$", SegmentKind::SystemSpecs),
                anchor(r"^PROBABLE CALL STACK:$", SegmentKind::CallStack),
                anchor(r"^REGISTERS:$", SegmentKind::Registers),
                anchor(r"^STACK:$", SegmentKind::Stack),
                anchor(r"^MODULES:$", SegmentKind::Modules),
                anchor(r"^[A-Z0-9]+SE PLUGINS:$", SegmentKind::XsePlugins),
                anchor(r"^PLUGINS:$", SegmentKind::Plugins),
            ],
            generic_anchor: Regex::new(r"^[A-Z][A-Z0-9 ]*:$").expect("Invalid generic anchor regex"),
        }
    }

    /// Whether `line` opens a section.
    pub fn classify(&self, line: &str) -> Option<Anchor> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some((_, kind)) = self.anchors.iter().find(|(re, _)| re.is_match(line)) {
            return Some(Anchor::Known(*kind));
        }
        self.generic_anchor.is_match(line).then_some(Anchor::Unknown)
    }

    /// Split lines into segments.
    ///
    /// Returns an empty map when no known anchor is present. A repeated
    /// anchor continues the existing segment. Lines are kept verbatim.
    pub fn split<S: AsRef<str>>(&self, lines: &[S]) -> Segments {
        let mut segments = Segments::new();
        let mut header = Vec::new();
        let mut current: Option<SegmentKind> = None;

        for line in lines {
            let line = line.as_ref();
            match self.classify(line) {
                Some(Anchor::Known(kind)) => {
                    current = Some(kind);
                    segments.entry(kind).or_default();
                    continue;
                }
                Some(Anchor::Unknown) => {
                    tracing::trace!("Skipping unrecognized section header: {}", line);
                    continue;
                }
                None => {}
            }

            match current {
                Some(kind) => segments.entry(kind).or_default().push(line.to_string()),
                None => header.push(line.to_string()),
            }
        }

        if segments.is_empty() {
            return segments;
        }
        if !header.is_empty() {
            segments.shift_insert(0, SegmentKind::Header, header);
        }
        segments
    }
}

/// Pull the version lines and main error out of the header.
///
/// The main error keeps its text but the first `|` becomes a line break,
/// matching how the crash generator separates the exception from its address.
pub fn extract_header<S: AsRef<str>>(
    header_lines: &[S],
    root_name: &str,
    crashgen_name: &str,
) -> LogHeader {
    let mut header = LogHeader::default();

    // A later matching line replaces an earlier one
    for line in header_lines {
        let line = line.as_ref().trim();
        if !root_name.is_empty() && line.starts_with(root_name) {
            header.game_version = line.to_string();
        }
        if !crashgen_name.is_empty() && line.starts_with(crashgen_name) {
            header.crashgen_version = line.to_string();
        }
        if line.starts_with(MAIN_ERROR_PREFIX) {
            header.main_error = line.replacen('|', "\n", 1);
        }
    }

    header
}
