use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Record source error: {0}")]
    Source(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// One unreadable entry in an otherwise readable source. `reason` is
    /// built from positions and categories only, never from the raw input.
    #[error("Malformed record: {reason}")]
    MalformedRecord { location: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot write {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuditError {
    pub fn artifact(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AuditError::Artifact {
            path: path.into(),
            source,
        }
    }

    /// Where a single bad entry sits, for errors that only spoil that entry.
    pub fn record_location(&self) -> Option<&str> {
        match self {
            AuditError::MalformedRecord { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Artifact I/O is the only category that should abort a run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuditError::Artifact { .. } | AuditError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
