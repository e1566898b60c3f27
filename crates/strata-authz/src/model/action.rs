//! Actions and their implication order.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An action that a privilege grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read rows or metadata.
    Select,
    /// Write rows.
    Insert,
    /// Create child objects.
    Create,
    /// Drop the object.
    Drop,
    /// Change the object's structure.
    Alter,
    /// Manage indexes.
    Index,
    /// Take or release locks.
    Lock,
    /// Every action.
    All,
}

impl Action {
    /// Every action, in declaration order.
    pub const VARIANTS: [Action; 8] = [
        Self::Select,
        Self::Insert,
        Self::Create,
        Self::Drop,
        Self::Alter,
        Self::Index,
        Self::Lock,
        Self::All,
    ];

    /// Whether a granted action satisfies a required one.
    ///
    /// `ALL` implies every action; otherwise only the identical action
    /// satisfies. There are no other implication chains.
    #[must_use]
    pub fn implies(self, required: Action) -> bool {
        self == Self::All || self == required
    }

    /// Keyword used in policy strings.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Create => "create",
            Self::Drop => "drop",
            Self::Alter => "alter",
            Self::Index => "index",
            Self::Lock => "lock",
            Self::All => "all",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Error returned for unknown action keywords.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    /// Parse an action keyword, case-insensitively. `*` means `ALL`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keyword = s.trim().to_lowercase();
        if keyword == "*" {
            return Ok(Self::All);
        }
        Self::VARIANTS
            .into_iter()
            .find(|action| action.keyword() == keyword)
            .ok_or_else(|| UnknownAction(s.trim().to_string()))
    }
}

// =============================================================================
// Action Set
// =============================================================================

/// The closed set of actions an engine accepts in policy.
///
/// Configured once and fixed for every snapshot built with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSet(BTreeSet<Action>);

impl ActionSet {
    /// Create a set from the given actions.
    #[must_use]
    pub fn new(actions: impl IntoIterator<Item = Action>) -> Self {
        Self(actions.into_iter().collect())
    }

    /// Returns `true` if the action is enabled.
    #[must_use]
    pub fn contains(&self, action: Action) -> bool {
        self.0.contains(&action)
    }

    /// Returns `true` if no action is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the enabled actions.
    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        self.0.iter().copied()
    }
}

impl Default for ActionSet {
    fn default() -> Self {
        Self::new(Action::VARIANTS)
    }
}
