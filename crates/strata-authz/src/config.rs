//! Authorization engine configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! server_name = "server1"
//! admin_groups = ["admin"]
//! ddl_policy = "server-only"
//! group_resolution_timeout = "2s"
//!
//! [reload]
//! debounce = "250ms"
//! periodic_refresh = "5m"
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::ActionSet;
use crate::operation::{DdlPolicy, MapperConfig};
use crate::policy::reload::ReloadConfig;
use crate::policy::snapshot::SnapshotOptions;

/// Root configuration of the authorization engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Name of the server this engine guards.
    /// Every catalog request is addressed under this server.
    pub server_name: String,

    /// Groups whose members bypass all checks.
    pub admin_groups: BTreeSet<String>,

    /// Actions that policy entries may use.
    /// Entries naming any other action fail the load.
    pub enabled_actions: ActionSet,

    /// Privilege required for administrative DDL
    /// (rename, set properties, set location).
    pub ddl_policy: DdlPolicy,

    /// Upper bound on one call to the group resolver.
    #[serde(with = "humantime_serde")]
    pub group_resolution_timeout: Duration,

    /// Cache effective privileges per snapshot and group set.
    pub privilege_cache: bool,

    /// Emit a tracing event for every decision.
    pub log_decisions: bool,

    /// Hot reload settings.
    pub reload: ReloadConfig,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            server_name: "server1".to_string(),
            admin_groups: BTreeSet::new(),
            enabled_actions: ActionSet::default(),
            ddl_policy: DdlPolicy::default(),
            group_resolution_timeout: Duration::from_secs(5),
            privilege_cache: true,
            log_decisions: true,
            reload: ReloadConfig::default(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthzConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `server_name` is empty or contains policy separators
    /// - no action is enabled
    /// - the group resolution timeout is zero
    /// - reload retry attempts are zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = self.server_name.trim();
        if server.is_empty() {
            return Err(ConfigError::Missing("server_name".to_string()));
        }
        if server.contains("->") || server.contains('=') || server == "*" {
            return Err(ConfigError::InvalidValue(format!(
                "server_name '{}' must be a plain name",
                self.server_name
            )));
        }

        if self.admin_groups.iter().any(|g| g.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "admin_groups cannot contain empty names".to_string(),
            ));
        }

        if self.enabled_actions.is_empty() {
            return Err(ConfigError::InvalidValue(
                "enabled_actions cannot be empty".to_string(),
            ));
        }

        if self.group_resolution_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "group_resolution_timeout must be > 0".to_string(),
            ));
        }

        if self.reload.max_retry_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "reload.max_retry_attempts must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Options used when building snapshots.
    #[must_use]
    pub fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            enabled_actions: self.enabled_actions.clone(),
            admin_groups: self.admin_groups.clone(),
        }
    }

    /// Options used by the operation mapper.
    #[must_use]
    pub fn mapper_config(&self) -> MapperConfig {
        MapperConfig {
            server: self.server_name.clone(),
            ddl_policy: self.ddl_policy,
        }
    }
}
