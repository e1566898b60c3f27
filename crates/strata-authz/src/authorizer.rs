//! The authorization facade.
//!
//! [`Authorizer`] ties the pieces together for one request: it takes the
//! current snapshot once, resolves the subject's groups (bounded by a
//! timeout), evaluates, and logs the decision. Everything after group
//! resolution is synchronous and lock-free.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata_authz::prelude::*;
//!
//! let store = Arc::new(PolicyStore::new(config.snapshot_options()));
//! store.reload_from(&source).await?;
//! let authorizer = Authorizer::new(store, Arc::new(LocalGroupResolver), &config)?;
//!
//! let decision = authorizer.authorize_operation("user1", &operation).await?;
//! if decision.is_allowed() {
//!     // Execute the statement
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::AuthzResult;
use crate::config::AuthzConfig;
use crate::error::GroupResolutionError;
use crate::groups::GroupResolver;
use crate::model::ScopePath;
use crate::operation::{MapperConfig, Operation, required_privileges};
use crate::policy::engine::{Decision, EvaluationResult, PolicyEvaluator, PrivilegeRequest};
use crate::policy::filter::retain_visible;
use crate::policy::snapshot::{EffectivePrivileges, PolicySnapshot};
use crate::policy::store::PolicyStore;

// =============================================================================
// Privilege Cache
// =============================================================================

/// Effective privileges per (snapshot version, group set).
///
/// Entries are keyed by version, so an entry computed against one snapshot
/// is never served for another. Entries of older versions are dropped the
/// first time a newer version is seen.
struct PrivilegeCache {
    entries: DashMap<(u64, BTreeSet<String>), Arc<EffectivePrivileges>>,
    version: AtomicU64,
}

impl PrivilegeCache {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
            version: AtomicU64::new(0),
        }
    }

    fn get_or_compute(
        &self,
        snapshot: &PolicySnapshot,
        groups: &BTreeSet<String>,
    ) -> Arc<EffectivePrivileges> {
        let version = snapshot.version();
        let previous = self.version.fetch_max(version, Ordering::AcqRel);
        if previous < version {
            self.entries.retain(|(v, _), _| *v >= version);
            tracing::debug!(
                previous_version = previous,
                version,
                "Privilege cache reset for new snapshot"
            );
        }

        let key = (version, groups.clone());
        if let Some(entry) = self.entries.get(&key) {
            return entry.clone();
        }
        let effective = Arc::new(snapshot.effective_privileges(groups));
        if self.is_stale(version) {
            return effective;
        }
        self.entries.insert(key.clone(), effective.clone());
        // A newer version may have pruned between the check and the insert.
        if self.is_stale(version) {
            self.entries.remove(&key);
        }
        effective
    }

    fn is_stale(&self, version: u64) -> bool {
        self.version.load(Ordering::Acquire) > version
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Authorizer
// =============================================================================

/// Async authorization facade over a [`PolicyStore`] and a [`GroupResolver`].
pub struct Authorizer {
    store: Arc<PolicyStore>,
    resolver: Arc<dyn GroupResolver>,
    mapper: MapperConfig,
    group_resolution_timeout: Duration,
    log_decisions: bool,
    cache: Option<PrivilegeCache>,
}

impl Authorizer {
    /// Create an authorizer.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Configuration`](crate::AuthzError::Configuration)
    /// if `config` does not pass [`AuthzConfig::validate`].
    pub fn new(
        store: Arc<PolicyStore>,
        resolver: Arc<dyn GroupResolver>,
        config: &AuthzConfig,
    ) -> AuthzResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            resolver,
            mapper: config.mapper_config(),
            group_resolution_timeout: config.group_resolution_timeout,
            log_decisions: config.log_decisions,
            cache: config.privilege_cache.then(PrivilegeCache::new),
        })
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// The operation mapper settings.
    #[must_use]
    pub fn mapper_config(&self) -> &MapperConfig {
        &self.mapper
    }

    /// Number of cached privilege sets.
    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.cache.as_ref().map_or(0, PrivilegeCache::len)
    }

    /// Decide a privilege request for `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::GroupResolution`](crate::AuthzError::GroupResolution)
    /// if the subject's groups cannot be resolved in time. A denial is
    /// `Ok(Decision::Deny(..))`.
    pub async fn authorize(&self, subject: &str, request: &PrivilegeRequest) -> AuthzResult<Decision> {
        Ok(self.authorize_with_audit(subject, request).await?.decision)
    }

    /// Decide a privilege request and return the audit details.
    ///
    /// # Errors
    ///
    /// See [`authorize`](Self::authorize).
    pub async fn authorize_with_audit(
        &self,
        subject: &str,
        request: &PrivilegeRequest,
    ) -> AuthzResult<EvaluationResult> {
        let (snapshot, groups) = self.resolve(subject).await?;

        let result = if snapshot.is_admin(&groups) {
            PolicyEvaluator.evaluate_with_audit(&snapshot, &groups, request)
        } else {
            let effective = self.effective_for(&snapshot, &groups);
            PolicyEvaluator.evaluate_privileges(snapshot.version(), &effective, request)
        };

        if self.log_decisions {
            log_decision(subject, &result);
        }
        Ok(result)
    }

    /// Map an operation to its requirements and decide it.
    ///
    /// # Errors
    ///
    /// See [`authorize`](Self::authorize).
    pub async fn authorize_operation(
        &self,
        subject: &str,
        operation: &Operation,
    ) -> AuthzResult<Decision> {
        let request = required_privileges(operation, &self.mapper);
        tracing::trace!(
            subject,
            operation = operation.kind(),
            requirements = request.requirements.len(),
            "Operation mapped"
        );
        self.authorize(subject, &request).await
    }

    /// The candidates `subject` may see, in their original order.
    ///
    /// # Errors
    ///
    /// See [`authorize`](Self::authorize).
    pub async fn filter_visible<I>(&self, subject: &str, candidates: I) -> AuthzResult<Vec<ScopePath>>
    where
        I: IntoIterator<Item = ScopePath>,
    {
        let (snapshot, groups) = self.resolve(subject).await?;
        if snapshot.is_admin(&groups) {
            return Ok(candidates.into_iter().collect());
        }
        let effective = self.effective_for(&snapshot, &groups);
        Ok(retain_visible(&effective, candidates))
    }

    /// The privileges `subject` holds under the current snapshot.
    ///
    /// # Errors
    ///
    /// See [`authorize`](Self::authorize).
    pub async fn effective_privileges(&self, subject: &str) -> AuthzResult<Arc<EffectivePrivileges>> {
        let (snapshot, groups) = self.resolve(subject).await?;
        Ok(self.effective_for(&snapshot, &groups))
    }

    /// Take the current snapshot and resolve the subject's groups against it.
    async fn resolve(&self, subject: &str) -> AuthzResult<(Arc<PolicySnapshot>, BTreeSet<String>)> {
        let snapshot = self.store.current();
        let groups = tokio::time::timeout(
            self.group_resolution_timeout,
            self.resolver.resolve_groups(subject, &snapshot),
        )
        .await
        .map_err(|_| GroupResolutionError::Timeout {
            subject: subject.to_string(),
            timeout_ms: self.group_resolution_timeout.as_millis() as u64,
        })?
        .inspect_err(|e| tracing::warn!(subject, error = %e, "Group resolution failed"))?;
        Ok((snapshot, groups))
    }

    fn effective_for(
        &self,
        snapshot: &PolicySnapshot,
        groups: &BTreeSet<String>,
    ) -> Arc<EffectivePrivileges> {
        match &self.cache {
            Some(cache) => cache.get_or_compute(snapshot, groups),
            None => Arc::new(snapshot.effective_privileges(groups)),
        }
    }
}

fn log_decision(subject: &str, result: &EvaluationResult) {
    match &result.decision {
        Decision::Allow => tracing::debug!(
            subject,
            version = result.snapshot_version,
            admin = result.admin_bypass,
            "Access allowed"
        ),
        Decision::Deny(reason) => tracing::info!(
            subject,
            version = result.snapshot_version,
            code = %reason.code,
            object = %reason.object,
            "Access denied"
        ),
    }
}

// =============================================================================
// Tests
// =============================================================================
