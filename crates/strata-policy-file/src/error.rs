//! Error types for policy files.

use std::path::PathBuf;

use strata_authz::PolicySourceError;

/// Errors raised while reading, parsing or watching a policy file.
#[derive(Debug, thiserror::Error)]
pub enum PolicyFileError {
    /// The file could not be read.
    #[error("Failed to read policy file {path:?}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A section header names no known section.
    #[error("line {line}: unknown section [{section}]")]
    UnknownSection {
        /// 1-based line number.
        line: usize,
        /// The section name as written.
        section: String,
    },

    /// An entry appears before the first section header.
    #[error("line {line}: entry outside of any section")]
    OutsideSection {
        /// 1-based line number.
        line: usize,
    },

    /// A line is neither a header, an entry nor a comment.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What is wrong with the line.
        message: String,
    },

    /// TOML parse failure.
    #[error("Invalid TOML policy: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file watcher could not be started.
    #[error("Failed to watch {path:?}: {source}")]
    Watch {
        /// Watched path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: notify::Error,
    },
}

impl PolicyFileError {
    /// Line the error was found on, for INI parse errors.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::UnknownSection { line, .. }
            | Self::OutsideSection { line }
            | Self::Syntax { line, .. } => Some(*line),
            Self::Toml(_) | Self::Io { .. } | Self::Watch { .. } => None,
        }
    }

    /// Convert into the engine's source error, classifying read failures
    /// as unavailable and everything else as malformed.
    #[must_use]
    pub fn into_source_error(self, source_name: &str) -> PolicySourceError {
        match self {
            Self::Io { .. } | Self::Watch { .. } => {
                PolicySourceError::unavailable(source_name, self.to_string())
            }
            _ => PolicySourceError::malformed(source_name, self.to_string()),
        }
    }
}

/// Type alias for policy file results.
pub type Result<T> = std::result::Result<T, PolicyFileError>;
