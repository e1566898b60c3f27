pub mod check;
pub mod privileges;
pub mod validate;
pub mod visible;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use strata_authz::prelude::*;
use strata_policy_file::FilePolicySource;

/// Load a policy file into a fresh store.
pub async fn load_store(policy: &Path, config: &AuthzConfig) -> Result<Arc<PolicyStore>> {
    let store = Arc::new(PolicyStore::new(config.snapshot_options()));
    store
        .reload_from(&FilePolicySource::new(policy))
        .await
        .with_context(|| format!("Failed to load policy {}", policy.display()))?;
    Ok(store)
}

/// An authorizer resolving groups from the policy's own `[users]` section.
pub async fn local_authorizer(policy: &Path, config: &AuthzConfig) -> Result<Authorizer> {
    let store = load_store(policy, config).await?;
    Ok(Authorizer::new(store, Arc::new(LocalGroupResolver), config)?)
}
