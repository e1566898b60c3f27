use anyhow::Result;
use serde_json::json;
use strata_authz::AuthzConfig;
use time::format_description::well_known::Rfc3339;

use crate::cli::{OutputFormat, PolicyArgs};
use crate::output::{print_field, print_json, print_success};

pub async fn validate(args: &PolicyArgs, config: &AuthzConfig, format: OutputFormat) -> Result<()> {
    let store = super::load_store(&args.policy, config).await?;
    let stats = store.current().stats();
    let loaded_at = stats.loaded_at.format(&Rfc3339)?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "policy": args.policy.display().to_string(),
            "valid": true,
            "loadedAt": loaded_at,
            "roles": stats.roles,
            "groups": stats.groups,
            "users": stats.users,
            "privileges": stats.privileges,
        }))?,
        OutputFormat::Table => {
            print_success(&format!("{} is valid", args.policy.display()));
            print_field("Roles", stats.roles);
            print_field("Groups", stats.groups);
            print_field("Users", stats.users);
            print_field("Privileges", stats.privileges);
        }
    }
    Ok(())
}
