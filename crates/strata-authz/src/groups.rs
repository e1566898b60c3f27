//! Group resolution.
//!
//! Subjects are mapped to groups by an external directory. The engine calls
//! the resolver once per authorization, holding its snapshot `Arc` but no
//! lock, and bounds the call with the configured timeout.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use crate::error::GroupResolutionError;
use crate::policy::snapshot::PolicySnapshot;

/// Maps a subject to the set of groups it belongs to.
#[async_trait]
pub trait GroupResolver: Send + Sync {
    /// Resolve the groups of `subject`.
    ///
    /// `snapshot` is the policy the current decision is made against.
    /// Directory-backed resolvers may ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`GroupResolutionError`] when the directory cannot answer.
    /// Unknown subjects resolve to an empty set, not an error.
    async fn resolve_groups(
        &self,
        subject: &str,
        snapshot: &PolicySnapshot,
    ) -> Result<BTreeSet<String>, GroupResolutionError>;
}

/// Resolves groups from the `[users]` section of the policy itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalGroupResolver;

#[async_trait]
impl GroupResolver for LocalGroupResolver {
    async fn resolve_groups(
        &self,
        subject: &str,
        snapshot: &PolicySnapshot,
    ) -> Result<BTreeSet<String>, GroupResolutionError> {
        Ok(snapshot.user_groups(subject).cloned().unwrap_or_default())
    }
}

/// Resolves groups from a fixed map.
#[derive(Debug, Clone, Default)]
pub struct StaticGroupResolver {
    users: HashMap<String, BTreeSet<String>>,
}

impl StaticGroupResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign groups to a user.
    #[must_use]
    pub fn with_user<I, S>(mut self, user: &str, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users
            .entry(user.to_string())
            .or_default()
            .extend(groups.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl GroupResolver for StaticGroupResolver {
    async fn resolve_groups(
        &self,
        subject: &str,
        _snapshot: &PolicySnapshot,
    ) -> Result<BTreeSet<String>, GroupResolutionError> {
        Ok(self.users.get(subject).cloned().unwrap_or_default())
    }
}
