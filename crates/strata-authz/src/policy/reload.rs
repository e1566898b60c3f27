//! Policy hot reload.
//!
//! # Architecture
//!
//! - [`PolicyChange`] - Events announcing that the policy may have changed
//! - [`PolicyChangeNotifier`] - Broadcast channel for change notifications
//! - [`PolicyReloadService`] - Reloads the store from its source with
//!   debouncing, periodic refresh and retry
//!
//! A failed reload never disturbs the published snapshot.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata_authz::policy::reload::{PolicyChange, PolicyChangeNotifier, PolicyReloadService};
//!
//! let notifier = Arc::new(PolicyChangeNotifier::new(64));
//! let service = Arc::new(PolicyReloadService::new(
//!     store,
//!     source,
//!     notifier.clone(),
//!     config.reload.clone(),
//! ));
//!
//! let handle = tokio::spawn({
//!     let service = service.clone();
//!     async move { service.run().await }
//! });
//!
//! notifier.notify(PolicyChange::BulkReload);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, broadcast};
use tokio::time::{Duration, Instant};

use crate::AuthzResult;
use crate::policy::source::PolicySource;
use crate::policy::store::PolicyStore;

// =============================================================================
// Policy Change Types
// =============================================================================

/// Events that can trigger a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyChange {
    /// The content behind a source changed.
    SourceModified {
        /// Name of the modified source.
        source: String,
    },
    /// Request to reload unconditionally.
    BulkReload,
}

impl PolicyChange {
    /// The source name, if this change names one.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::SourceModified { source } => Some(source),
            Self::BulkReload => None,
        }
    }

    /// Check if this is a bulk reload request.
    #[must_use]
    pub fn is_bulk_reload(&self) -> bool {
        matches!(self, Self::BulkReload)
    }
}

// =============================================================================
// Policy Change Notifier
// =============================================================================

/// Broadcast channel for policy change notifications.
///
/// Multiple producers can send notifications, and multiple consumers can
/// subscribe to receive them.
pub struct PolicyChangeNotifier {
    sender: broadcast::Sender<PolicyChange>,
}

impl PolicyChangeNotifier {
    /// Create a notifier holding at most `capacity` pending notifications.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Notify all subscribers. Dropped silently when nobody listens.
    pub fn notify(&self, change: PolicyChange) {
        let _ = self.sender.send(change);
    }

    /// Subscribe to future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PolicyChange> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PolicyChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

// =============================================================================
// Reload Configuration
// =============================================================================

/// Configuration for the policy reload service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Quiet period after the last notification before reloading.
    /// Rapid changes are batched into a single reload.
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,

    /// Periodic refresh interval. Zero disables periodic refresh.
    #[serde(with = "humantime_serde")]
    pub periodic_refresh: Duration,

    /// Maximum number of attempts per reload.
    pub max_retry_attempts: usize,

    /// Initial retry backoff, doubled on each retry.
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            periodic_refresh: Duration::from_secs(300),
            max_retry_attempts: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl ReloadConfig {
    /// Create a configuration with no periodic refresh.
    #[must_use]
    pub fn without_periodic_refresh() -> Self {
        Self {
            periodic_refresh: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Create a configuration for testing with fast timeouts.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            debounce: Duration::from_millis(10),
            periodic_refresh: Duration::ZERO,
            max_retry_attempts: 3,
            retry_backoff: Duration::from_millis(10),
        }
    }
}

// =============================================================================
// Reload Statistics
// =============================================================================

/// Statistics about the reload service.
#[derive(Debug, Clone, Default)]
pub struct ReloadStats {
    /// Total number of reload attempts.
    pub reload_attempts: u64,
    /// Number of successful reloads.
    pub successful_reloads: u64,
    /// Number of failed reloads.
    pub failed_reloads: u64,
    /// Number of notifications received.
    pub notifications_received: u64,
    /// Number of notifications folded into a pending reload.
    pub notifications_debounced: u64,
}

// =============================================================================
// Policy Reload Service
// =============================================================================

/// Service that reloads the policy store from its source.
///
/// The service:
/// - Listens for change notifications
/// - Debounces rapid changes
/// - Periodically refreshes (optional)
/// - Retries unavailable sources with exponential backoff; malformed
///   policies are not retried
pub struct PolicyReloadService {
    store: Arc<PolicyStore>,
    source: Arc<dyn PolicySource>,
    notifier: Arc<PolicyChangeNotifier>,
    config: ReloadConfig,

    /// Flag to signal shutdown.
    shutdown: AtomicBool,
    shutdown_signal: Notify,

    /// Statistics counters.
    reload_attempts: AtomicU64,
    successful_reloads: AtomicU64,
    failed_reloads: AtomicU64,
    notifications_received: AtomicU64,
    notifications_debounced: AtomicU64,
}

impl PolicyReloadService {
    /// Create a new policy reload service.
    #[must_use]
    pub fn new(
        store: Arc<PolicyStore>,
        source: Arc<dyn PolicySource>,
        notifier: Arc<PolicyChangeNotifier>,
        config: ReloadConfig,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            config,
            shutdown: AtomicBool::new(false),
            shutdown_signal: Notify::new(),
            reload_attempts: AtomicU64::new(0),
            successful_reloads: AtomicU64::new(0),
            failed_reloads: AtomicU64::new(0),
            notifications_received: AtomicU64::new(0),
            notifications_debounced: AtomicU64::new(0),
        }
    }

    /// Run the reload service until [`shutdown`](Self::shutdown) is called
    /// or the notification channel closes.
    pub async fn run(&self) {
        let mut receiver = self.notifier.subscribe();
        let debounce = self.config.debounce;
        let periodic = (!self.config.periodic_refresh.is_zero()).then_some(self.config.periodic_refresh);

        let mut pending_reload = false;
        let mut last_notification = Instant::now();
        let mut last_refresh = Instant::now();

        loop {
            if self.is_shutting_down() {
                tracing::info!("Policy reload service shutting down");
                break;
            }

            let periodic_remaining = periodic
                .map(|d| d.saturating_sub(last_refresh.elapsed()))
                .unwrap_or(Duration::MAX);

            let timeout = if pending_reload {
                debounce
                    .saturating_sub(last_notification.elapsed())
                    .min(periodic_remaining)
            } else {
                periodic_remaining
            };

            tokio::select! {
                result = receiver.recv() => {
                    match result {
                        Ok(change) => {
                            tracing::debug!(change = ?change, "Policy change received");
                            self.notifications_received.fetch_add(1, Ordering::Relaxed);
                            if pending_reload {
                                self.notifications_debounced.fetch_add(1, Ordering::Relaxed);
                            }
                            pending_reload = true;
                            last_notification = Instant::now();
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(missed = n, "Missed policy change notifications");
                            self.notifications_debounced.fetch_add(n, Ordering::Relaxed);
                            pending_reload = true;
                            last_notification = Instant::now();
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Policy change channel closed");
                            break;
                        }
                    }
                }

                _ = tokio::time::sleep(timeout) => {
                    if pending_reload && last_notification.elapsed() >= debounce {
                        pending_reload = false;
                        self.perform_reload().await;
                        last_refresh = Instant::now();
                    } else if periodic.is_some_and(|d| last_refresh.elapsed() >= d) {
                        tracing::debug!("Periodic policy refresh");
                        self.perform_reload().await;
                        last_refresh = Instant::now();
                    }
                }

                _ = self.shutdown_signal.notified() => {}
            }
        }
    }

    async fn perform_reload(&self) {
        if let Err(e) = self.reload_with_retry().await {
            tracing::error!(
                source = self.source.name(),
                error = %e,
                version = self.store.version(),
                "Policy reload failed, keeping current snapshot"
            );
        }
    }

    /// Reload with retry and exponential backoff.
    ///
    /// Returns the published version.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted, or immediately
    /// for errors that retrying cannot fix.
    pub async fn reload_with_retry(&self) -> AuthzResult<u64> {
        let mut attempts = 0;
        let mut backoff = self.config.retry_backoff;

        loop {
            self.reload_attempts.fetch_add(1, Ordering::Relaxed);

            match self.store.reload_from(self.source.as_ref()).await {
                Ok(version) => {
                    self.successful_reloads.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        source = self.source.name(),
                        version,
                        "Policy reloaded successfully"
                    );
                    return Ok(version);
                }
                Err(e) => {
                    attempts += 1;
                    if !e.is_transient() || attempts >= self.config.max_retry_attempts {
                        self.failed_reloads.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }

                    tracing::warn!(
                        attempt = attempts,
                        max_attempts = self.config.max_retry_attempts,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Policy reload failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
            }
        }
    }

    /// Trigger a reload by sending a `BulkReload` notification.
    pub fn trigger_reload(&self) {
        self.notifier.notify(PolicyChange::BulkReload);
    }

    /// Signal the service to shut down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.shutdown_signal.notify_one();
    }

    /// Check if the service is shutting down.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Get reload statistics.
    #[must_use]
    pub fn stats(&self) -> ReloadStats {
        ReloadStats {
            reload_attempts: self.reload_attempts.load(Ordering::Relaxed),
            successful_reloads: self.successful_reloads.load(Ordering::Relaxed),
            failed_reloads: self.failed_reloads.load(Ordering::Relaxed),
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            notifications_debounced: self.notifications_debounced.load(Ordering::Relaxed),
        }
    }

    /// The store this service publishes to.
    #[must_use]
    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// The notifier this service listens on.
    #[must_use]
    pub fn notifier(&self) -> &Arc<PolicyChangeNotifier> {
        &self.notifier
    }
}

// =============================================================================
// Tests
// =============================================================================
