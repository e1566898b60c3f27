//! Privileges: the atomic unit of permission.
//!
//! Privileges are written in policy as `->`-separated `key=value` parts:
//!
//! ```text
//! server=server1                                  ALL on the whole server
//! server=server1->db=db1                          ALL on db1
//! server=server1->db=db1->table=t1->action=select SELECT on db1.t1
//! server=server1->uri=hdfs://nn/landing           ALL on a location
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::action::{Action, UnknownAction};
use super::scope::{ScopeLevel, ScopeName, ScopePath};
use super::uri::{UriError, UriScope};

/// Errors that can occur while parsing a privilege string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrivilegeParseError {
    /// The privilege string is empty.
    #[error("Empty privilege")]
    Empty,

    /// A part is not of the form `key=value`.
    #[error("Malformed part '{0}', expected key=value")]
    MalformedPart(String),

    /// A part has an empty value.
    #[error("Empty value for '{0}'")]
    EmptyValue(String),

    /// A part uses an unknown key.
    #[error("Unknown key '{0}'")]
    UnknownKey(String),

    /// A key appears more than once.
    #[error("Duplicate key '{0}'")]
    DuplicateKey(String),

    /// A level appears before its parent level.
    #[error("'{0}' must follow its parent level")]
    OutOfOrder(String),

    /// No server part was given.
    #[error("Privilege must start with a server")]
    MissingServer,

    /// A URI was combined with database/table/column parts.
    #[error("A uri privilege cannot name databases, tables or columns")]
    UriWithCatalogLevels,

    /// `action` was not the last part.
    #[error("'action' must be the last part")]
    ActionNotLast,

    /// The action keyword is unknown.
    #[error(transparent)]
    UnknownAction(#[from] UnknownAction),

    /// The URI could not be parsed.
    #[error(transparent)]
    InvalidUri(#[from] UriError),
}

/// The two disjoint kinds of privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeKind {
    /// Catalog scope (server/database/table/column).
    Scope,
    /// Filesystem or object-store location.
    Uri,
}

/// A granted or required permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Privilege {
    /// An action on a catalog scope.
    Scope {
        /// The catalog path.
        path: ScopePath,
        /// The granted or required action.
        action: Action,
    },
    /// An action on a location.
    Uri {
        /// Server the location privilege belongs to.
        server: ScopeName,
        /// The normalized location.
        uri: UriScope,
        /// The granted or required action.
        action: Action,
    },
}

impl Privilege {
    /// A catalog-scope privilege.
    #[must_use]
    pub fn scope(path: ScopePath, action: Action) -> Self {
        Self::Scope { path, action }
    }

    /// A location privilege on a server.
    #[must_use]
    pub fn uri(server: impl Into<ScopeName>, uri: UriScope, action: Action) -> Self {
        Self::Uri {
            server: server.into(),
            uri,
            action,
        }
    }

    /// The privilege's action.
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Scope { action, .. } | Self::Uri { action, .. } => *action,
        }
    }

    /// The privilege's kind.
    #[must_use]
    pub fn kind(&self) -> PrivilegeKind {
        match self {
            Self::Scope { .. } => PrivilegeKind::Scope,
            Self::Uri { .. } => PrivilegeKind::Uri,
        }
    }

    /// The catalog path, for scope privileges.
    #[must_use]
    pub fn path(&self) -> Option<&ScopePath> {
        match self {
            Self::Scope { path, .. } => Some(path),
            Self::Uri { .. } => None,
        }
    }

    /// Parse a policy privilege string.
    ///
    /// # Errors
    ///
    /// Returns [`PrivilegeParseError`] describing the first problem found.
    pub fn parse(value: &str) -> Result<Self, PrivilegeParseError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(PrivilegeParseError::Empty);
        }

        let mut path = ScopePath::default();
        let mut uri: Option<UriScope> = None;
        let mut action: Option<Action> = None;
        let mut deepest: Option<ScopeLevel> = None;

        for part in value.split("->") {
            if action.is_some() {
                return Err(PrivilegeParseError::ActionNotLast);
            }

            let (key, raw) = part
                .split_once('=')
                .ok_or_else(|| PrivilegeParseError::MalformedPart(part.trim().to_string()))?;
            let key = key.trim().to_lowercase();
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(PrivilegeParseError::EmptyValue(key));
            }

            let level = match key.as_str() {
                "server" => ScopeLevel::Server,
                "db" | "database" => ScopeLevel::Database,
                "table" | "view" => ScopeLevel::Table,
                "column" => ScopeLevel::Column,
                "uri" => {
                    if uri.is_some() {
                        return Err(PrivilegeParseError::DuplicateKey(key));
                    }
                    match deepest {
                        None => return Err(PrivilegeParseError::MissingServer),
                        Some(ScopeLevel::Server) => {}
                        Some(_) => return Err(PrivilegeParseError::UriWithCatalogLevels),
                    }
                    uri = Some(UriScope::parse(raw)?);
                    continue;
                }
                "action" => {
                    action = Some(raw.parse()?);
                    continue;
                }
                _ => return Err(PrivilegeParseError::UnknownKey(key)),
            };

            if uri.is_some() {
                return Err(PrivilegeParseError::UriWithCatalogLevels);
            }
            if path.get(level).is_some() {
                return Err(PrivilegeParseError::DuplicateKey(key));
            }
            let expected_parent = ScopeLevel::ALL
                .into_iter()
                .take_while(|l| *l < level)
                .last();
            if deepest != expected_parent {
                return Err(match deepest {
                    None => PrivilegeParseError::MissingServer,
                    Some(_) => PrivilegeParseError::OutOfOrder(key),
                });
            }

            path.set(level, ScopeName::new(raw));
            deepest = Some(level);
        }

        if path.server.is_none() {
            return Err(PrivilegeParseError::MissingServer);
        }

        let action = action.unwrap_or(Action::All);
        Ok(match uri {
            Some(uri) => Self::Uri {
                server: path.server.ok_or(PrivilegeParseError::MissingServer)?,
                uri,
                action,
            },
            None => Self::Scope { path, action },
        })
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scope { path, action } => write!(f, "{path}->action={action}"),
            Self::Uri {
                server,
                uri,
                action,
            } => write!(f, "server={server}->uri={uri}->action={action}"),
        }
    }
}

impl FromStr for Privilege {
    type Err = PrivilegeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Privilege {
    type Error = PrivilegeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Privilege> for String {
    fn from(value: Privilege) -> Self {
        value.to_string()
    }
}
