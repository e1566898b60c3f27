//! The atomically published policy snapshot.
//!
//! Readers call [`PolicyStore::current`], a single lock-free load, and keep
//! the returned `Arc` for the whole decision. Reloads build the next snapshot
//! off the hot path and publish it with one atomic swap, so a decision never
//! sees a mix of two policies.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use time::OffsetDateTime;

use crate::AuthzResult;
use crate::policy::document::PolicyDocument;
use crate::policy::snapshot::{PolicySnapshot, SnapshotOptions};
use crate::policy::source::PolicySource;

/// Statistics about the store.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Version of the published snapshot (0 before the first publish).
    pub version: u64,
    /// When the published snapshot was built.
    pub loaded_at: OffsetDateTime,
    /// Roles in the published snapshot.
    pub roles: usize,
    /// Groups in the published snapshot.
    pub groups: usize,
    /// Users in the published snapshot.
    pub users: usize,
    /// Number of successful loads.
    pub successful_reloads: u64,
    /// Number of failed loads.
    pub failed_reloads: u64,
}

/// Holder of the current [`PolicySnapshot`].
pub struct PolicyStore {
    /// Current snapshot (lock-free reads).
    current: ArcSwap<PolicySnapshot>,
    /// Options applied to every snapshot built by this store.
    options: SnapshotOptions,
    successful_reloads: AtomicU64,
    failed_reloads: AtomicU64,
}

impl PolicyStore {
    /// Create a store serving an empty snapshot until the first publish.
    #[must_use]
    pub fn new(options: SnapshotOptions) -> Self {
        let empty = PolicySnapshot::empty(options.admin_groups.clone());
        Self {
            current: ArcSwap::from_pointee(empty),
            options,
            successful_reloads: AtomicU64::new(0),
            failed_reloads: AtomicU64::new(0),
        }
    }

    /// Options used when building snapshots.
    #[must_use]
    pub fn options(&self) -> &SnapshotOptions {
        &self.options
    }

    /// The currently published snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    /// Version of the currently published snapshot.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.load().version()
    }

    /// Publish a snapshot, replacing the current one.
    ///
    /// The snapshot is assigned the next version. Returns that version.
    pub fn publish(&self, snapshot: PolicySnapshot) -> u64 {
        let previous = self.current.rcu(|current| {
            Arc::new(snapshot.clone().with_version(current.version() + 1))
        });
        let version = previous.version() + 1;
        let stats = snapshot.stats();
        tracing::info!(
            version,
            roles = stats.roles,
            groups = stats.groups,
            users = stats.users,
            privileges = stats.privileges,
            "Policy snapshot published"
        );
        version
    }

    /// Validate a document and publish it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::PolicyLoad`](crate::AuthzError::PolicyLoad) if
    /// the document is invalid. The current snapshot stays published.
    pub fn publish_document(&self, document: &PolicyDocument) -> AuthzResult<u64> {
        match PolicySnapshot::build(document, &self.options) {
            Ok(snapshot) => {
                self.successful_reloads.fetch_add(1, Ordering::Relaxed);
                Ok(self.publish(snapshot))
            }
            Err(e) => {
                self.failed_reloads.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    error = %e,
                    version = self.version(),
                    "Rejected policy, keeping current snapshot"
                );
                Err(e.into())
            }
        }
    }

    /// Load from a source and publish the result.
    ///
    /// # Errors
    ///
    /// Returns the source or validation error. The current snapshot stays
    /// published.
    pub async fn reload_from(&self, source: &dyn PolicySource) -> AuthzResult<u64> {
        let document = match source.load().await {
            Ok(document) => document,
            Err(e) => {
                self.failed_reloads.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    source = source.name(),
                    error = %e,
                    "Policy source failed, keeping current snapshot"
                );
                return Err(e.into());
            }
        };
        self.publish_document(&document)
    }

    /// Store statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let snapshot = self.current.load();
        let stats = snapshot.stats();
        StoreStats {
            version: stats.version,
            loaded_at: stats.loaded_at,
            roles: stats.roles,
            groups: stats.groups,
            users: stats.users,
            successful_reloads: self.successful_reloads.load(Ordering::Relaxed),
            failed_reloads: self.failed_reloads.load(Ordering::Relaxed),
        }
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(SnapshotOptions::default())
    }
}
