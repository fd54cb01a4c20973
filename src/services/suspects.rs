//! Known crash signature matching.
//!
//! Database entries are compiled once per batch. Error entries look for a
//! case-sensitive substring in the main error. Stack entries need every plain
//! item present in the call stack (case-insensitive, any order), with these
//! item modifiers:
//!
//! | Item         | Meaning                                                    |
//! |--------------|------------------------------------------------------------|
//! | `ME-REQ\|x`  | main error must contain `x`                                |
//! | `ME-OPT\|x`  | main error contains `x`; matches only if nothing is required |
//! | `NOT\|x`     | entry never matches when the stack contains `x`            |
//! | `N\|x`       | `x` appears at least `N` times in the stack                 |

use crate::models::database::split_key;
use crate::models::{Severity, Suspect, SuspectPatternDatabase, SuspectType};

pub const ERROR_CATEGORY: &str = "Main Error";
pub const STACK_CATEGORY: &str = "Call Stack";

#[derive(Debug, Clone, PartialEq, Eq)]
enum StackItem {
    Plain(String),
    MinCount(usize, String),
    ErrorRequired(String),
    ErrorOptional(String),
    Not(String),
}

impl StackItem {
    fn parse(raw: &str) -> Option<Self> {
        let item = match raw.split_once('|') {
            Some(("ME-REQ", text)) => StackItem::ErrorRequired(text.to_lowercase()),
            Some(("ME-OPT", text)) => StackItem::ErrorOptional(text.to_lowercase()),
            Some(("NOT", text)) => StackItem::Not(text.to_lowercase()),
            Some((count, text)) if !count.is_empty() && count.bytes().all(|b| b.is_ascii_digit()) => {
                StackItem::MinCount(count.parse().ok()?, text.to_lowercase())
            }
            _ => StackItem::Plain(raw.to_lowercase()),
        };
        let text = match &item {
            StackItem::Plain(t)
            | StackItem::MinCount(_, t)
            | StackItem::ErrorRequired(t)
            | StackItem::ErrorOptional(t)
            | StackItem::Not(t) => t,
        };
        (!text.is_empty()).then_some(item)
    }

    fn is_mandatory(&self) -> bool {
        matches!(
            self,
            StackItem::Plain(_) | StackItem::MinCount(..) | StackItem::ErrorRequired(_)
        )
    }

    fn holds(&self, main_error: &str, stack: &str) -> bool {
        match self {
            StackItem::Plain(t) => stack.contains(t.as_str()),
            StackItem::MinCount(n, t) => stack.matches(t.as_str()).count() >= *n,
            StackItem::ErrorRequired(t) | StackItem::ErrorOptional(t) => {
                main_error.contains(t.as_str())
            }
            StackItem::Not(t) => stack.contains(t.as_str()),
        }
    }

    fn describe(&self) -> String {
        match self {
            StackItem::Plain(t) => t.clone(),
            StackItem::MinCount(n, t) => format!("{} (x{})", t, n),
            StackItem::ErrorRequired(t) | StackItem::ErrorOptional(t) => format!("main error: {}", t),
            StackItem::Not(t) => format!("not {}", t),
        }
    }
}

#[derive(Debug, Clone)]
struct ErrorEntry {
    severity: u8,
    label: String,
    needle: String,
}

#[derive(Debug, Clone)]
struct StackEntry {
    severity: u8,
    label: String,
    items: Vec<StackItem>,
}

impl StackEntry {
    fn matches(&self, main_error: &str, stack: &str) -> bool {
        let mut mandatory = self.items.iter().filter(|i| i.is_mandatory()).peekable();
        let vetoed = self
            .items
            .iter()
            .any(|i| matches!(i, StackItem::Not(_)) && i.holds(main_error, stack));
        if vetoed {
            return false;
        }

        if mandatory.peek().is_some() {
            mandatory.all(|i| i.holds(main_error, stack))
        } else {
            self.items
                .iter()
                .any(|i| matches!(i, StackItem::ErrorOptional(_)) && i.holds(main_error, stack))
        }
    }

    fn evidence(&self) -> String {
        self.items
            .iter()
            .filter(|i| !matches!(i, StackItem::Not(_)))
            .map(StackItem::describe)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parse `"<severity> | <label>"`.
fn parse_entry_key(key: &str) -> Option<(u8, String)> {
    let (severity, label) = split_key(key)?;
    let severity: u8 = severity.parse().ok()?;
    (Severity::MIN_SCORE..=Severity::MAX_SCORE)
        .contains(&severity)
        .then(|| (severity, label.to_string()))
}

pub struct SuspectMatcher {
    errors: Vec<ErrorEntry>,
    stack: Vec<StackEntry>,
}

impl SuspectMatcher {
    /// Compile the pattern database, skipping malformed entries with a warning.
    pub fn new(database: &SuspectPatternDatabase) -> Self {
        let mut errors = Vec::new();
        for (key, needle) in &database.errors {
            let Some((severity, label)) = parse_entry_key(key) else {
                tracing::warn!("Skipping error check with malformed key: {:?}", key);
                continue;
            };
            if needle.is_empty() {
                tracing::warn!("Skipping error check '{}' with empty pattern", label);
                continue;
            }
            errors.push(ErrorEntry {
                severity,
                label,
                needle: needle.clone(),
            });
        }

        let mut stack = Vec::new();
        for (key, raw_items) in &database.stack {
            let Some((severity, label)) = parse_entry_key(key) else {
                tracing::warn!("Skipping stack check with malformed key: {:?}", key);
                continue;
            };
            let items: Vec<StackItem> = raw_items.iter().filter_map(|i| StackItem::parse(i)).collect();
            if items.len() != raw_items.len() {
                tracing::warn!("Skipping stack check '{}' with an empty item", label);
                continue;
            }
            let has_positive = items.iter().any(|i| !matches!(i, StackItem::Not(_)));
            if !has_positive {
                tracing::warn!("Skipping stack check '{}' with nothing to match", label);
                continue;
            }
            stack.push(StackEntry {
                severity,
                label,
                items,
            });
        }

        tracing::debug!(
            "Compiled {} error checks and {} stack checks",
            errors.len(),
            stack.len()
        );
        Self { errors, stack }
    }

    pub fn len(&self) -> usize {
        self.errors.len() + self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Error entries whose pattern appears in the main error, database order.
    pub fn match_errors(&self, main_error: &str) -> Vec<Suspect> {
        self.errors
            .iter()
            .filter(|e| main_error.contains(&e.needle))
            .map(|e| {
                Suspect::new(&e.label, ERROR_CATEGORY, SuspectType::Unknown, e.severity)
                    .with_evidence(format!("Main error contains \"{}\"", e.needle))
            })
            .collect()
    }

    /// Stack entries satisfied by the call stack text, database order.
    pub fn match_stack(&self, main_error: &str, stack_text: &str) -> Vec<Suspect> {
        let main_error = main_error.to_lowercase();
        let stack_text = stack_text.to_lowercase();
        self.stack
            .iter()
            .filter(|e| e.matches(&main_error, &stack_text))
            .map(|e| {
                Suspect::new(&e.label, STACK_CATEGORY, SuspectType::Unknown, e.severity)
                    .with_evidence(e.evidence())
            })
            .collect()
    }

    /// Both passes, error entries first.
    pub fn find_suspects(&self, main_error: &str, stack_text: &str) -> Vec<Suspect> {
        let mut suspects = self.match_errors(main_error);
        suspects.extend(self.match_stack(main_error, stack_text));
        suspects
    }
}

/// Main error names a DLL other than the game's allocator.
pub fn dll_involved(main_error: &str) -> bool {
    let lower = main_error.to_lowercase();
    lower.contains(".dll") && !lower.contains("tbbmalloc")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn database(stack: &[(&str, &[&str])]) -> SuspectPatternDatabase {
        let mut errors = IndexMap::new();
        errors.insert(
            "5 | Stack Overflow Crash".to_string(),
            "EXCEPTION_STACK_OVERFLOW".to_string(),
        );
        let stack = stack
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect();
        SuspectPatternDatabase { errors, stack }
    }

    #[test]
    fn test_error_pass_is_case_sensitive() {
        let matcher = SuspectMatcher::new(&database(&[]));
        assert_eq!(
            matcher
                .match_errors("Unhandled exception \"EXCEPTION_STACK_OVERFLOW\"")
                .len(),
            1
        );
        assert!(matcher.match_errors("exception_stack_overflow").is_empty());
    }

    #[test]
    fn test_stack_and_semantics_any_order_any_case() {
        let matcher = SuspectMatcher::new(&database(&[(
            "4 | Texture Crash",
            &["Create2DTexture", "DefaultTexture"],
        )]));
        assert_eq!(matcher.match_stack("", "defaulttexture\nCREATE2DTEXTURE").len(), 1);
        assert!(matcher.match_stack("", "Create2DTexture only").is_empty());
    }

    #[test]
    fn test_not_vetoes() {
        let matcher = SuspectMatcher::new(&database(&[(
            "5 | Animation Crash",
            &["hkbBehaviorGraph", "NOT|hkbStateMachine"],
        )]));
        assert_eq!(matcher.match_stack("", "hkbBehaviorGraph").len(), 1);
        assert!(
            matcher
                .match_stack("", "hkbBehaviorGraph hkbStateMachine")
                .is_empty()
        );
    }

    #[test]
    fn test_min_count() {
        let matcher = SuspectMatcher::new(&database(&[("5 | Pathing", &["3|PathingCell"])]));
        assert!(matcher.match_stack("", "PathingCell PathingCell").is_empty());
        assert_eq!(
            matcher
                .match_stack("", "PathingCell PathingCell PathingCell")
                .len(),
            1
        );
    }

    #[test]
    fn test_main_error_modifiers() {
        let matcher = SuspectMatcher::new(&database(&[
            ("6 | Required", &["ME-REQ|LooseFileAsyncStream", "LooseFileStream"]),
            ("3 | Optional Only", &["ME-OPT|tbbmalloc.dll"]),
            ("4 | Optional With Stack", &["ME-OPT|xaudio", "CompressedAudioStream"]),
        ]));

        let found = matcher.match_stack("LooseFileAsyncStream at tbbmalloc.dll", "LooseFileStream");
        let names: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Required", "Optional Only"]);

        // ME-OPT alone cannot satisfy an entry that has stack items
        assert!(
            matcher
                .match_stack("xaudio", "nothing relevant")
                .iter()
                .all(|s| s.name != "Optional With Stack")
        );
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let matcher = SuspectMatcher::new(&database(&[
            ("no severity", &["a"]),
            ("9 | Out Of Range", &["a"]),
            ("3 | Empty List", &[]),
            ("3 | Only Not", &["NOT|a"]),
            ("3 | Empty Item", &["a", ""]),
            ("3 | Valid", &["a"]),
        ]));
        assert_eq!(matcher.len(), 2);
    }

    #[test]
    fn test_severity_taken_from_key() {
        let matcher = SuspectMatcher::new(&database(&[]));
        let suspects = matcher.find_suspects("EXCEPTION_STACK_OVERFLOW", "");
        assert_eq!(suspects[0].severity_score, 5);
        assert_eq!(suspects[0].category, ERROR_CATEGORY);
    }

    #[test]
    fn test_dll_involved() {
        assert!(dll_involved("Unhandled exception at 0x1 SomeMod.dll+1234"));
        assert!(!dll_involved("Unhandled exception at 0x1 tbbmalloc.dll+12"));
        assert!(!dll_involved("Unhandled exception at 0x1 Fallout4.exe+12"));
    }
}
