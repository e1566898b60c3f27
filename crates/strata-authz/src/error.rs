//! Authorization engine error types.
//!
//! A denied operation is not an error: it is a [`Decision`] value. The types
//! here describe infrastructure and policy failures that prevent a decision
//! from being made at all.
//!
//! [`Decision`]: crate::policy::engine::Decision

use std::fmt;

use crate::config::ConfigError;
use crate::model::{Action, PrivilegeParseError};

/// Errors that can occur while loading policy or authorizing a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The policy could not be turned into a snapshot.
    ///
    /// Fatal to the reload attempt only; the previously published snapshot
    /// keeps serving requests.
    #[error(transparent)]
    PolicyLoad(#[from] PolicyLoadError),

    /// The policy source could not produce a document.
    #[error(transparent)]
    PolicySource(#[from] PolicySourceError),

    /// The group resolution collaborator failed or timed out.
    #[error(transparent)]
    GroupResolution(#[from] GroupResolutionError),

    /// The engine configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl AuthzError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the category of this error for logging and monitoring.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PolicyLoad(_) => ErrorCategory::Policy,
            Self::PolicySource(PolicySourceError::Malformed { .. }) => ErrorCategory::Policy,
            Self::PolicySource(PolicySourceError::Unavailable { .. }) => {
                ErrorCategory::Infrastructure
            }
            Self::GroupResolution(_) => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }

    /// Returns `true` if retrying the failed operation could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PolicySource(PolicySourceError::Unavailable { .. }) | Self::GroupResolution(_)
        )
    }
}

impl From<ConfigError> for AuthzError {
    fn from(e: ConfigError) -> Self {
        Self::configuration(e.to_string())
    }
}

// =============================================================================
// Policy Load Errors
// =============================================================================

/// Errors raised while building a policy snapshot from raw entries.
///
/// Any of these fails the entire reload; no partial snapshot is published.
#[derive(Debug, thiserror::Error)]
pub enum PolicyLoadError {
    /// A privilege entry of a role could not be parsed.
    #[error("Role '{role}' has invalid privilege '{entry}': {source}")]
    InvalidPrivilege {
        /// Role declaring the privilege.
        role: String,
        /// The raw privilege entry.
        entry: String,
        /// Why the entry was rejected.
        #[source]
        source: PrivilegeParseError,
    },

    /// A group references a role that is not defined in the same policy.
    #[error("Group '{group}' references unknown role '{role}'")]
    UnknownRole {
        /// The referencing group.
        group: String,
        /// The missing role.
        role: String,
    },

    /// A privilege uses an action that is not enabled for this engine.
    #[error("Role '{role}' uses action '{action}' which is not enabled")]
    ActionNotEnabled {
        /// Role declaring the privilege.
        role: String,
        /// The disabled action.
        action: Action,
    },

    /// The policy is structurally invalid.
    #[error("Malformed policy: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },
}

impl PolicyLoadError {
    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

// =============================================================================
// Policy Source Errors
// =============================================================================

/// Errors reported by a [`PolicySource`](crate::policy::source::PolicySource).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PolicySourceError {
    /// The source could not be read (missing file, I/O failure, ...).
    #[error("Policy source '{source_name}' unavailable: {message}")]
    Unavailable {
        /// Name of the source.
        source_name: String,
        /// Description of the failure.
        message: String,
    },

    /// The source was read but its content could not be parsed.
    #[error("Policy source '{source_name}' is malformed: {message}")]
    Malformed {
        /// Name of the source.
        source_name: String,
        /// Description of the parse failure.
        message: String,
    },
}

impl PolicySourceError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Group Resolution Errors
// =============================================================================

/// Failure of the external group resolution collaborator.
///
/// Distinct from a denial: it is an infrastructure failure, not a security
/// decision.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GroupResolutionError {
    /// The resolver reported an error.
    #[error("Failed to resolve groups for '{subject}': {message}")]
    Failed {
        /// The subject being resolved.
        subject: String,
        /// Description of the failure.
        message: String,
    },

    /// The resolver did not answer within the configured timeout.
    #[error("Group resolution for '{subject}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The subject being resolved.
        subject: String,
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },
}

impl GroupResolutionError {
    /// Creates a new `Failed` error.
    #[must_use]
    pub fn failed(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Error Category
// =============================================================================

/// Categories of engine errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid or inconsistent policy content.
    Policy,
    /// Collaborator or I/O failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy => write!(f, "policy"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}
