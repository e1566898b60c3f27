//! # strata-policy-file
//!
//! Policy files for `strata-authz`: INI and TOML parsers, a
//! [`FilePolicySource`] that re-reads the file on every load, and a
//! [`PolicyFileWatcher`] that reports edits to the reload service.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata_authz::prelude::*;
//! use strata_policy_file::{FilePolicySource, FileWatcherConfig, PolicyFileWatcher};
//!
//! let source = Arc::new(FilePolicySource::new("/etc/strata/policy.ini"));
//! let store = Arc::new(PolicyStore::default());
//! let notifier = Arc::new(PolicyChangeNotifier::default());
//!
//! let service = Arc::new(PolicyReloadService::new(
//!     store.clone(),
//!     source.clone(),
//!     notifier.clone(),
//!     ReloadConfig::default(),
//! ));
//! service.reload_with_retry().await?;
//! let watcher = PolicyFileWatcher::new(FileWatcherConfig::new(source.path()), notifier).start()?;
//! tokio::spawn(async move { service.run().await });
//! ```

pub mod error;
pub mod parser;
pub mod source;
pub mod watch;

pub use error::{PolicyFileError, Result};
pub use parser::{parse_ini, parse_toml};
pub use source::{FilePolicySource, PolicyFormat};
pub use watch::{FileWatcherConfig, PolicyFileWatcher, WatchHandle};
