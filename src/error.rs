//! Error types for configuration file set operations.
//!
//! "No root file" and "no include configured" are not errors; they surface as
//! `None` from the discovery methods. Everything here is a hard failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Failure while discovering, reading, or merging configuration files.
///
/// Cloneable so a single failed cache computation can be handed to every
/// waiter that was attached to it.
#[derive(Debug, Clone, Error)]
pub enum FileSetError {
    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A configuration file is not valid YAML, or holds YAML that cannot be
    /// represented as a configuration document.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Arc<serde_yaml::Error>,
    },

    /// A root or include pattern is not a valid glob.
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The blocking directory scan could not be joined.
    #[error("file expansion failed: {0}")]
    Expansion(String),

    /// The shared merge computation ended without producing a result.
    #[error("merged configuration computation was abandoned")]
    ComputationAbandoned,
}

impl FileSetError {
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source: Arc::new(err),
        }
    }

    pub fn parse(path: &Path, err: serde_yaml::Error) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            source: Arc::new(err),
        }
    }

    pub fn pattern(pattern: &str, err: globset::Error) -> Self {
        Self::Pattern {
            pattern: pattern.to_string(),
            source: err,
        }
    }

    /// The file this error concerns, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            FileSetError::Io { path, .. } | FileSetError::Parse { path, .. } => Some(path),
            _ => None,
        }
    }

    /// True for failures caused by file content rather than the environment.
    pub fn is_parse(&self) -> bool {
        matches!(self, FileSetError::Parse { .. })
    }
}

/// Result type for file set operations.
pub type Result<T> = std::result::Result<T, FileSetError>;
