use crate::models::ConflictSeverity;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Packaged database shipped inside the binary.
pub const PACKAGED_DATABASE: &str = include_str!("../../data/default_database.yaml");

/// Everything the analysis pipeline looks up, loaded once per batch.
///
/// Read-only after load; share it behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDatabase {
    #[serde(rename = "Game_Info")]
    pub game: GameInfo,

    #[serde(rename = "Suspects", default)]
    pub suspects: SuspectPatternDatabase,

    #[serde(rename = "Mods", default)]
    pub mods: ModConflictDatabase,

    #[serde(rename = "Records", default)]
    pub records: RecordLists,

    /// Plugins never reported as suspects (base game masters, DLC)
    #[serde(rename = "Plugins_Ignore", default)]
    pub plugins_ignore: Vec<String>,

    #[serde(rename = "Game_Hints", default)]
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInfo {
    /// Short game id, e.g. `Fallout4`
    pub name: String,
    /// Prefix of the game version line, e.g. `Fallout 4`
    pub root_name: String,
    pub xse_acronym: String,
    pub crashgen_name: String,
    pub crashgen_latest: String,
    #[serde(default)]
    pub crashgen_latest_vr: String,
    #[serde(default)]
    pub game_version: String,
    #[serde(default)]
    pub game_version_vr: String,
    /// First version of the new-generation release
    #[serde(default)]
    pub game_version_new: String,
    /// Crash generator settings that are expected to be disabled
    #[serde(default)]
    pub crashgen_ignore: Vec<String>,
}

/// Known crash signatures, keyed by `"<severity> | <label>"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuspectPatternDatabase {
    /// Label to a substring of the main error line
    #[serde(rename = "Error_Check", default)]
    pub errors: IndexMap<String, String>,

    /// Label to the substrings that must all appear in the call stack
    #[serde(rename = "Stack_Check", default)]
    pub stack: IndexMap<String, Vec<String>>,
}

/// GPU manufacturer as reported in SYSTEM SPECS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    #[default]
    Unknown,
}

impl GpuVendor {
    pub fn rival(self) -> Option<GpuVendor> {
        match self {
            GpuVendor::Nvidia => Some(GpuVendor::Amd),
            GpuVendor::Amd => Some(GpuVendor::Nvidia),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GpuVendor::Nvidia => "Nvidia",
            GpuVendor::Amd => "AMD",
            GpuVendor::Intel => "Intel",
            GpuVendor::Unknown => "Unknown",
        }
    }
}

/// A mod database value: either plain warning text or a detailed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModEntry {
    Warning(String),
    Detailed {
        warning: String,
        #[serde(default)]
        solution: Option<String>,
        #[serde(default)]
        gpu: Option<GpuVendor>,
        #[serde(default)]
        severity: Option<ConflictSeverity>,
    },
}

impl ModEntry {
    pub fn warning(&self) -> &str {
        match self {
            ModEntry::Warning(text) => text,
            ModEntry::Detailed { warning, .. } => warning,
        }
    }

    pub fn solution(&self) -> Option<&str> {
        match self {
            ModEntry::Warning(_) => None,
            ModEntry::Detailed { solution, .. } => solution.as_deref(),
        }
    }

    pub fn gpu(&self) -> Option<GpuVendor> {
        match self {
            ModEntry::Warning(_) => None,
            ModEntry::Detailed { gpu, .. } => *gpu,
        }
    }

    pub fn severity(&self) -> Option<ConflictSeverity> {
        match self {
            ModEntry::Warning(_) => None,
            ModEntry::Detailed { severity, .. } => *severity,
        }
    }
}

/// Mod tables. Keys are `"<detection key> | <display name>"`, except
/// `conflicts` and `load_order` which key on `"<mod a> | <mod b>"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModConflictDatabase {
    #[serde(rename = "Core", default)]
    pub core: IndexMap<String, ModEntry>,

    #[serde(rename = "Frequent", default)]
    pub frequent: IndexMap<String, ModEntry>,

    #[serde(rename = "Conflicts", default)]
    pub conflicts: IndexMap<String, ModEntry>,

    #[serde(rename = "Solutions", default)]
    pub solutions: IndexMap<String, ModEntry>,

    #[serde(rename = "Load_Order", default)]
    pub load_order: IndexMap<String, ModEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordLists {
    /// Markers that make a stack line a named record
    #[serde(rename = "Check", default)]
    pub check: Vec<String>,

    /// Markers that disqualify a stack line
    #[serde(rename = "Exclude", default)]
    pub exclude: Vec<String>,
}

impl ScanDatabase {
    /// The database embedded in the binary.
    ///
    /// Falls back to [`ScanDatabase::minimal`] if the embedded YAML does not
    /// parse, so scanning can always proceed.
    pub fn packaged() -> Self {
        match serde_yaml_ng::from_str(PACKAGED_DATABASE) {
            Ok(database) => database,
            Err(e) => {
                tracing::error!("Packaged database is invalid, using minimal defaults: {}", e);
                Self::minimal()
            }
        }
    }

    /// Smallest database that still identifies the game and crash generator.
    pub fn minimal() -> Self {
        Self {
            game: GameInfo {
                name: "Fallout4".to_string(),
                root_name: "Fallout 4".to_string(),
                xse_acronym: "F4SE".to_string(),
                crashgen_name: "Buffout 4".to_string(),
                crashgen_latest: "1.28.6".to_string(),
                crashgen_latest_vr: "1.31.1".to_string(),
                game_version: "1.10.163".to_string(),
                game_version_vr: "1.2.72".to_string(),
                game_version_new: "1.10.980".to_string(),
                crashgen_ignore: Vec::new(),
            },
            suspects: SuspectPatternDatabase::default(),
            mods: ModConflictDatabase::default(),
            records: RecordLists::default(),
            plugins_ignore: vec!["Fallout4.esm".to_string()],
            hints: Vec::new(),
        }
    }
}

/// Split a `"<left> | <right>"` database key.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let (left, right) = key.split_once('|')?;
    let (left, right) = (left.trim(), right.trim());
    (!left.is_empty() && !right.is_empty()).then_some((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packaged_database_parses() {
        let database: ScanDatabase = serde_yaml_ng::from_str(PACKAGED_DATABASE).unwrap();
        assert_eq!(database.game.crashgen_name, "Buffout 4");
        assert!(!database.suspects.errors.is_empty());
        assert!(!database.suspects.stack.is_empty());
        assert!(!database.mods.core.is_empty());
        assert!(!database.records.check.is_empty());
    }

    #[test]
    fn test_mod_entry_plain_and_detailed() {
        let yaml = r#"
plain: "Just a warning"
detailed:
  warning: "Needs attention"
  solution: "Install the patch"
  gpu: nvidia
  severity: severe
"#;
        let entries: IndexMap<String, ModEntry> = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(entries["plain"].warning(), "Just a warning");
        assert_eq!(entries["plain"].gpu(), None);
        assert_eq!(entries["detailed"].solution(), Some("Install the patch"));
        assert_eq!(entries["detailed"].gpu(), Some(GpuVendor::Nvidia));
        assert_eq!(entries["detailed"].severity(), Some(ConflictSeverity::Severe));
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("5 | Stack Overflow"), Some(("5", "Stack Overflow")));
        assert_eq!(split_key("no separator"), None);
        assert_eq!(split_key(" | missing left"), None);
    }

    #[test]
    fn test_gpu_rival() {
        assert_eq!(GpuVendor::Nvidia.rival(), Some(GpuVendor::Amd));
        assert_eq!(GpuVendor::Intel.rival(), None);
    }
}
