//! Error types shared by every toolkit component

use std::io;
use std::path::Path;

use thiserror::Error;

/// Errors raised by the toolkit components
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// A path or evidence identifier does not exist
    #[error("{kind} not found: {target}")]
    NotFound { kind: &'static str, target: String },

    /// An evidence identifier was registered twice
    #[error("Evidence item already registered: {0}")]
    DuplicateIdentifier(String),

    /// Underlying file system failure, passed through unchanged
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Ledger export could not be written or read back
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An imported ledger breaks the custody log rules
    #[error("Corrupt ledger entry {identifier}: {reason}")]
    CorruptLedger { identifier: String, reason: String },

    /// String scanner pattern could not be compiled
    #[error("Invalid scan pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl ToolkitError {
    pub(crate) fn missing_path(kind: &'static str, path: &Path) -> Self {
        Self::NotFound {
            kind,
            target: path.display().to_string(),
        }
    }

    /// True for the `NotFound` family of errors
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolkitError>;
