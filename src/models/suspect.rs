use serde::{Deserialize, Serialize};

/// What a suspect points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspectType {
    Plugin,
    FormId,
    Setting,
    ModConflict,
    CorruptFile,
    MissingFile,
    VersionMismatch,
    Unknown,
}

/// Coarse view of the 1-6 severity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const MIN_SCORE: u8 = 1;
    pub const MAX_SCORE: u8 = 6;

    pub fn from_score(score: u8) -> Self {
        match score {
            0..=2 => Severity::Low,
            3 => Severity::Medium,
            4 => Severity::High,
            _ => Severity::Critical,
        }
    }

    /// Report glyph for a severity score.
    pub fn icon(score: u8) -> &'static str {
        match score {
            6.. => "💀",
            4..=5 => "❌",
            2..=3 => "⚠️",
            _ => "ℹ️",
        }
    }
}

/// A named, severity-scored hypothesis about the cause of a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suspect {
    pub name: String,
    pub category: String,
    pub suspect_type: SuspectType,
    /// 1-6, 6 most critical; drives report ordering
    pub severity_score: u8,
    pub evidence: String,
    pub recommendation: String,
    pub related_files: Vec<String>,
    pub related_form_ids: Vec<String>,
    /// Informational only
    pub confidence: f32,
}

impl Suspect {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        suspect_type: SuspectType,
        severity_score: u8,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            suspect_type,
            severity_score: severity_score.clamp(Severity::MIN_SCORE, Severity::MAX_SCORE),
            evidence: String::new(),
            recommendation: String::new(),
            related_files: Vec::new(),
            related_form_ids: Vec::new(),
            confidence: 1.0,
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn severity(&self) -> Severity {
        Severity::from_score(self.severity_score)
    }
}
