//! Policy file watching.
//!
//! Watches the directory containing the policy file, so editors that replace
//! the file instead of writing it in place are still seen, and forwards
//! debounced changes to a [`PolicyChangeNotifier`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use strata_authz::policy::{PolicyChange, PolicyChangeNotifier};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{PolicyFileError, Result};

/// Settings of a [`PolicyFileWatcher`].
#[derive(Debug, Clone)]
pub struct FileWatcherConfig {
    /// Path to the policy file.
    pub path: PathBuf,
    /// Quiet period the watcher waits for before reporting a change.
    pub debounce: Duration,
}

impl FileWatcherConfig {
    /// Watch `path` with the default debounce.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            debounce: Duration::from_millis(250),
        }
    }

    /// Set the debounce duration.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// Emits [`PolicyChange::SourceModified`] when the policy file changes.
pub struct PolicyFileWatcher {
    config: FileWatcherConfig,
    notifier: Arc<PolicyChangeNotifier>,
}

impl PolicyFileWatcher {
    /// Create a watcher reporting to `notifier`.
    pub fn new(config: FileWatcherConfig, notifier: Arc<PolicyChangeNotifier>) -> Self {
        Self { config, notifier }
    }

    /// Start watching. The watcher runs until the handle is stopped or
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyFileError::Watch`] if the directory cannot be watched.
    pub fn start(self) -> Result<WatchHandle> {
        let path = self.config.path.clone();
        let watch_dir = watch_dir(&path);
        let source_name = path.display().to_string();

        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(self.config.debounce, move |result| {
            let _ = events_tx.send(result);
        })
        .map_err(|source| PolicyFileError::Watch {
            path: watch_dir.clone(),
            source,
        })?;
        debouncer
            .watcher()
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|source| PolicyFileError::Watch {
                path: watch_dir.clone(),
                source,
            })?;

        info!(path = %path.display(), "Watching policy file");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let notifier = self.notifier;
        let handle = tokio::spawn(async move {
            // Dropping the debouncer stops the underlying watcher
            let _debouncer = debouncer;
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!(path = %path.display(), "Policy file watcher shutting down");
                        break;
                    }
                    received = events_rx.recv() => {
                        let Some(result) = received else { break };
                        match result {
                            Ok(events) => {
                                if events.iter().any(|event| is_same_file(&event.path, &path)) {
                                    debug!(path = %path.display(), "Policy file changed");
                                    notifier.notify(PolicyChange::SourceModified {
                                        source: source_name.clone(),
                                    });
                                }
                            }
                            Err(e) => error!(error = %e, "Policy file watcher error"),
                        }
                    }
                }
            }
        });

        Ok(WatchHandle {
            handle,
            shutdown: shutdown_tx,
        })
    }
}

/// Handle of a running [`PolicyFileWatcher`].
pub struct WatchHandle {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl WatchHandle {
    /// Stop the watcher and wait for its task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn is_same_file(event_path: &Path, watched: &Path) -> bool {
    event_path.file_name() == watched.file_name()
}
