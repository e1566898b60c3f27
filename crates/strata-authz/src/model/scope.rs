//! Hierarchical catalog scopes.
//!
//! A [`ScopePath`] addresses `server -> database -> table -> column`. Each
//! level is either a concrete name, a wildcard, or absent. A grant constrains
//! only the levels it names; absent lower levels mean "everything below".

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Scope Level
// =============================================================================

/// Levels of the catalog hierarchy, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeLevel {
    /// The server (catalog instance).
    Server,
    /// A database within a server.
    Database,
    /// A table or view within a database.
    Table,
    /// A column within a table.
    Column,
}

impl ScopeLevel {
    /// All levels in hierarchy order.
    pub const ALL: [ScopeLevel; 4] = [Self::Server, Self::Database, Self::Table, Self::Column];

    /// Key used for this level in policy strings.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Database => "db",
            Self::Table => "table",
            Self::Column => "column",
        }
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// Scope Name
// =============================================================================

/// The value of one level of a scope path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ScopeName {
    /// A concrete, lower-cased name.
    Named(String),
    /// `*`, matching any name at this level.
    Wildcard,
}

impl ScopeName {
    /// Create a scope name, normalizing case. `*` becomes [`ScopeName::Wildcard`].
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref().trim();
        if name == "*" {
            Self::Wildcard
        } else {
            Self::Named(name.to_lowercase())
        }
    }

    /// Returns `true` for the wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    /// The concrete name, if any.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Wildcard => None,
        }
    }

    /// Whether a granted level value covers a requested one.
    ///
    /// A wildcard covers anything, including an absent level. A concrete
    /// name covers only the same concrete name.
    pub(crate) fn covers(granted: Option<&Self>, requested: Option<&Self>) -> bool {
        match granted {
            None | Some(Self::Wildcard) => true,
            Some(Self::Named(g)) => matches!(requested, Some(Self::Named(r)) if r == g),
        }
    }

    /// Whether two level values can denote the same object.
    fn compatible(a: Option<&Self>, b: Option<&Self>) -> bool {
        match (a, b) {
            (Some(Self::Named(a)), Some(Self::Named(b))) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

impl From<String> for ScopeName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ScopeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ScopeName> for String {
    fn from(value: ScopeName) -> Self {
        value.to_string()
    }
}

// =============================================================================
// Scope Path
// =============================================================================

/// A partially specified address in the catalog hierarchy.
///
/// Build with [`ScopePath::server`] and the chained level setters:
///
/// ```
/// use strata_authz::model::ScopePath;
///
/// let table = ScopePath::server("server1").database("db1").table("t1");
/// let db = ScopePath::server("server1").database("db1");
/// assert!(db.covers(&table));
/// assert!(!table.covers(&db));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopePath {
    /// Server level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ScopeName>,
    /// Database level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<ScopeName>,
    /// Table level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<ScopeName>,
    /// Column level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<ScopeName>,
}

impl ScopePath {
    /// A path scoped to an entire server.
    #[must_use]
    pub fn server(name: impl Into<ScopeName>) -> Self {
        Self {
            server: Some(name.into()),
            ..Self::default()
        }
    }

    /// Narrow to a database.
    #[must_use]
    pub fn database(mut self, name: impl Into<ScopeName>) -> Self {
        self.database = Some(name.into());
        self
    }

    /// Narrow to a table or view.
    #[must_use]
    pub fn table(mut self, name: impl Into<ScopeName>) -> Self {
        self.table = Some(name.into());
        self
    }

    /// Narrow to a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<ScopeName>) -> Self {
        self.column = Some(name.into());
        self
    }

    /// Value at a level.
    #[must_use]
    pub fn get(&self, level: ScopeLevel) -> Option<&ScopeName> {
        match level {
            ScopeLevel::Server => self.server.as_ref(),
            ScopeLevel::Database => self.database.as_ref(),
            ScopeLevel::Table => self.table.as_ref(),
            ScopeLevel::Column => self.column.as_ref(),
        }
    }

    pub(crate) fn set(&mut self, level: ScopeLevel, name: ScopeName) {
        let slot = match level {
            ScopeLevel::Server => &mut self.server,
            ScopeLevel::Database => &mut self.database,
            ScopeLevel::Table => &mut self.table,
            ScopeLevel::Column => &mut self.column,
        };
        *slot = Some(name);
    }

    /// The deepest level that is present, if any.
    #[must_use]
    pub fn depth(&self) -> Option<ScopeLevel> {
        ScopeLevel::ALL
            .iter()
            .rev()
            .copied()
            .find(|level| self.get(*level).is_some())
    }

    /// Returns `true` when no level is present below an absent one.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let mut seen_absent = false;
        for level in ScopeLevel::ALL {
            match self.get(level) {
                Some(_) if seen_absent => return false,
                Some(_) => {}
                None => seen_absent = true,
            }
        }
        true
    }

    /// The enclosing path one level up, or `None` for a server-level path.
    #[must_use]
    pub fn parent(&self) -> Option<ScopePath> {
        let mut parent = self.clone();
        match self.depth()? {
            ScopeLevel::Server => return None,
            ScopeLevel::Database => parent.database = None,
            ScopeLevel::Table => parent.table = None,
            ScopeLevel::Column => parent.column = None,
        }
        Some(parent)
    }

    /// Truncate the path to `level` and everything above it.
    #[must_use]
    pub fn truncate(&self, level: ScopeLevel) -> ScopePath {
        let mut path = ScopePath::default();
        for current in ScopeLevel::ALL.into_iter().filter(|l| *l <= level) {
            if let Some(name) = self.get(current) {
                path.set(current, name.clone());
            }
        }
        path
    }

    /// Whether this (granted) path covers the requested path.
    ///
    /// Compared level by level: a granted level that is absent or wildcard
    /// covers anything; a concrete granted level requires the same concrete
    /// name in the request. Coarser grants therefore cover finer resources,
    /// while a grant on a database never covers a server-scope request.
    #[must_use]
    pub fn covers(&self, requested: &ScopePath) -> bool {
        ScopeLevel::ALL
            .into_iter()
            .all(|level| ScopeName::covers(self.get(level), requested.get(level)))
    }

    /// Whether the two paths can address a common object.
    ///
    /// True when one covers the other or they share a subtree: every level
    /// where both carry concrete names must agree.
    #[must_use]
    pub fn overlaps(&self, other: &ScopePath) -> bool {
        ScopeLevel::ALL
            .into_iter()
            .all(|level| ScopeName::compatible(self.get(level), other.get(level)))
    }

    /// Number of leading levels on which both paths hold the same value.
    #[must_use]
    pub fn common_prefix_len(&self, other: &ScopePath) -> usize {
        ScopeLevel::ALL
            .into_iter()
            .take_while(|level| {
                let (a, b) = (self.get(*level), other.get(*level));
                a.is_some() && a == b
            })
            .count()
    }

    /// Parse a dotted shorthand such as `server1.db1.t1`.
    ///
    /// Used by tooling; policy entries use the `key=value` grammar.
    #[must_use]
    pub fn parse_dotted(value: &str) -> Option<ScopePath> {
        let mut path = ScopePath::default();
        let mut parts = value.split('.');
        for level in ScopeLevel::ALL {
            match parts.next() {
                Some(part) if !part.trim().is_empty() => path.set(level, ScopeName::new(part)),
                Some(_) => return None,
                None => break,
            }
        }
        if parts.next().is_some() || path.server.is_none() {
            return None;
        }
        Some(path)
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for level in ScopeLevel::ALL {
            if let Some(name) = self.get(level) {
                if !first {
                    f.write_str("->")?;
                }
                write!(f, "{}={}", level.key(), name)?;
                first = false;
            }
        }
        Ok(())
    }
}
