use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use strata_authz::AuthzConfig;

const DEFAULT_CONFIG: &str = "strata.toml";

/// Load the engine configuration.
///
/// Sources, later ones winning: the given file (or `strata.toml` in the
/// working directory when present), then environment overrides such as
/// `STRATA__SERVER_NAME=server2` or `STRATA__RELOAD__DEBOUNCE=1s`.
pub fn load(path: Option<&Path>) -> Result<AuthzConfig> {
    let mut builder = Config::builder();
    match path {
        Some(path) => {
            anyhow::ensure!(path.exists(), "Config file {} does not exist", path.display());
            builder = builder.add_source(File::from(path.to_path_buf()));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG);
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix("STRATA")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("admin_groups")
            .with_list_parse_key("enabled_actions"),
    );

    let config: AuthzConfig = builder
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    config.validate()?;
    tracing::debug!(server = %config.server_name, "Configuration loaded");
    Ok(config)
}
