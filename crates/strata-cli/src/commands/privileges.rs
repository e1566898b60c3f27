use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use strata_authz::prelude::*;

use crate::cli::{OutputFormat, UserArgs};
use crate::output::{print_field, print_json, print_table};

pub async fn privileges(args: &UserArgs, config: &AuthzConfig, format: OutputFormat) -> Result<()> {
    let store = super::load_store(&args.policy.policy, config).await?;
    let snapshot = store.current();
    let groups = snapshot.user_groups(&args.user).cloned().unwrap_or_default();
    let admin = snapshot.is_admin(&groups);

    let authorizer = Authorizer::new(store, Arc::new(LocalGroupResolver), config)?;
    let effective = authorizer.effective_privileges(&args.user).await?;

    match format {
        OutputFormat::Json => {
            let privileges: Vec<String> = effective.iter().map(ToString::to_string).collect();
            print_json(&json!({
                "user": args.user,
                "groups": groups,
                "admin": admin,
                "roles": effective.roles,
                "privileges": privileges,
            }))?;
        }
        OutputFormat::Table => {
            let groups: Vec<&str> = groups.iter().map(String::as_str).collect();
            print_field("User", &args.user);
            print_field("Groups", groups.join(", "));
            print_field("Roles", effective.roles.join(", "));
            if admin {
                print_field("Admin", "yes (all checks bypassed)");
            }
            let rows = effective
                .iter()
                .map(|privilege| {
                    [
                        kind_label(privilege.kind()).to_string(),
                        privilege.action().to_string(),
                        privilege.to_string(),
                    ]
                })
                .collect();
            print_table(["Kind", "Action", "Privilege"], rows);
        }
    }
    Ok(())
}

fn kind_label(kind: PrivilegeKind) -> &'static str {
    match kind {
        PrivilegeKind::Scope => "scope",
        PrivilegeKind::Uri => "uri",
    }
}
