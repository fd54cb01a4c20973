use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Info,
    Low,
    Medium,
    High,
    Severe,
}

impl ConflictSeverity {
    pub fn icon(self) -> &'static str {
        match self {
            ConflictSeverity::Info => "ℹ️",
            ConflictSeverity::Low | ConflictSeverity::Medium => "⚠️",
            ConflictSeverity::High => "❌",
            ConflictSeverity::Severe => "💀",
        }
    }
}

/// Database category a conflict hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictType {
    FrequentCrash,
    ModPairConflict,
    MissingImportant,
    GpuIncompatible,
    LoadOrderIssue,
    HasSolution,
}

impl ConflictType {
    pub fn default_severity(self) -> ConflictSeverity {
        match self {
            ConflictType::FrequentCrash => ConflictSeverity::High,
            ConflictType::ModPairConflict => ConflictSeverity::Severe,
            ConflictType::MissingImportant => ConflictSeverity::Medium,
            ConflictType::GpuIncompatible => ConflictSeverity::High,
            ConflictType::LoadOrderIssue => ConflictSeverity::Medium,
            ConflictType::HasSolution => ConflictSeverity::Low,
        }
    }
}

/// One mod database hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModConflictResult {
    pub mod_name: String,
    /// Load-order label of the matching plugin, empty for DLLs and missing mods
    pub plugin_id: String,
    pub warning: String,
    pub solution: String,
    pub severity: ConflictSeverity,
    pub conflict_type: ConflictType,
}

/// Mod compatibility outcome for one crash log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModCompatibility {
    pub issues: Vec<ModConflictResult>,
    /// Important mods that were found and need no action
    pub installed_important: Vec<String>,
}
