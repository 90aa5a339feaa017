//! Error types for keydeck-core

use std::path::PathBuf;

use thiserror::Error;

use crate::credential::Inconsistency;

/// Result type alias for keydeck operations
pub type Result<T> = std::result::Result<T, KeydeckError>;

/// Broad class of a failure, used by callers to decide how to report it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the user; nothing was changed
    UserInput,
    /// On-disk state needs repair before risky operations can run
    StateConsistency,
    /// A file could not be read or written
    Io,
    /// An existing document could not be parsed
    Structural,
}

/// Keydeck error types
#[derive(Error, Debug)]
pub enum KeydeckError {
    #[error("Key '{0}' already exists")]
    DuplicateKey(String),

    #[error("Invalid key name '{0}': names must be non-empty and contain no whitespace or '='")]
    InvalidName(String),

    #[error("Invalid secret for '{0}': value must not be empty")]
    InvalidSecret(String),

    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("No active key - run `keydeck use <NAME>` first")]
    NoActiveKey,

    #[error("Key '{record}' belongs to provider '{record_provider}', not '{profile_provider}'")]
    ProviderMismatch {
        record: String,
        record_provider: String,
        profile_provider: String,
    },

    #[error("Secret for '{name}' was removed but its metadata could not be: {reason}. Run `keydeck doctor --repair`")]
    PartialDeleteInconsistency { name: String, reason: String },

    #[error("Key store needs repair ({}). Run `keydeck doctor --repair`", summarize(.0))]
    StateInconsistent(Vec<Inconsistency>),

    #[error("Store file {path} is corrupt: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("Cannot write settings to {path}: {source}. Check that the directory exists and is writable, or point KEYDECK_SETTINGS_PATH elsewhere")]
    TargetUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup of existing settings to {path} failed, nothing was written: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Existing settings at {path} are not a valid document: {reason}")]
    MalformedExisting { path: PathBuf, reason: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl KeydeckError {
    /// Build an [`KeydeckError::Io`] for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Taxonomy class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateKey(_)
            | Self::InvalidName(_)
            | Self::InvalidSecret(_)
            | Self::UnknownProvider(_)
            | Self::NotFound(_)
            | Self::NoActiveKey
            | Self::ProviderMismatch { .. }
            | Self::Config(_) => ErrorKind::UserInput,
            Self::PartialDeleteInconsistency { .. }
            | Self::StateInconsistent(_)
            | Self::CorruptStore { .. } => ErrorKind::StateConsistency,
            Self::TargetUnwritable { .. }
            | Self::BackupFailed { .. }
            | Self::Io { .. }
            | Self::Serialization(_) => ErrorKind::Io,
            Self::MalformedExisting { .. } => ErrorKind::Structural,
        }
    }
}

fn summarize(issues: &[Inconsistency]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
