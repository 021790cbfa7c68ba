//! Error types for the session persistence layer.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the session and memory stores.
///
/// Read-path problems (`CorruptRecord`) are normally logged and skipped by the
/// reader; they only surface as values when a caller asks for a single record.
/// Write-path problems (`Persistence`) always reach the caller.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No session matched the given id or id fragment
    #[error("Session not found: '{id}'")]
    NotFound { id: String },

    /// A single line or file could not be parsed
    #[error("Corrupt record in {}{}: {message}", .path.display(), line_suffix(.line))]
    CorruptRecord {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    /// Writing to durable storage failed
    #[error("Failed to persist {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The permission check refused the operation
    #[error("Operation not permitted: {operation}")]
    PermissionDenied { operation: String },
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" (line {l})")).unwrap_or_default()
}

impl SessionError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn corrupt(path: &Path, line: Option<usize>, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    pub fn persistence(path: &Path, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn permission_denied(operation: impl Into<String>) -> Self {
        Self::PermissionDenied {
            operation: operation.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptRecord { .. })
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
