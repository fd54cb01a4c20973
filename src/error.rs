use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors produced while scanning a single crash log.
///
/// None of these cross a file boundary: the batch scanner converts every
/// variant into a per-file outcome and keeps going.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No recognizable segments in crash log: {0}")]
    ParseFailure(Utf8PathBuf),

    #[error("{stage} extraction failed: {reason}")]
    PartialExtraction { stage: &'static str, reason: String },

    #[error("Failed to load database {path}: {reason}")]
    DatabaseLoad { path: Utf8PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan cancelled")]
    Cancelled,
}

impl ScanError {
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn partial(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::PartialExtraction {
            stage,
            reason: reason.into(),
        }
    }
}

pub type ScanResult<T> = std::result::Result<T, ScanError>;
