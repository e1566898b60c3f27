use anyhow::{Context, Result};
use serde_json::json;
use strata_authz::prelude::*;

use crate::cli::{CheckArgs, OutputFormat};
use crate::output::{print_denied, print_field, print_json, print_success, print_table};

/// Decide the operation. Returns whether it was allowed.
pub async fn check(args: &CheckArgs, config: &AuthzConfig, format: OutputFormat) -> Result<bool> {
    let operation = read_operation(args)?;
    let authorizer = super::local_authorizer(&args.subject.policy.policy, config).await?;
    let user = args.subject.user.as_str();

    let request = required_privileges(&operation, authorizer.mapper_config());
    let result = authorizer.authorize_with_audit(user, &request).await?;
    let allowed = result.decision.is_allowed();

    match format {
        OutputFormat::Json => print_json(&json!({
            "user": user,
            "operation": operation.kind(),
            "required": request.requirements,
            "result": result,
        }))?,
        OutputFormat::Table => {
            match result.decision.deny_reason() {
                None if result.admin_bypass => {
                    print_success(&format!("ALLOW {} for {user} (admin)", operation.kind()));
                }
                None => print_success(&format!("ALLOW {} for {user}", operation.kind())),
                Some(reason) => {
                    print_denied(&format!("DENY {} for {user}: {}", operation.kind(), reason.message));
                    if let Some(nearest) = &reason.nearest_grant {
                        print_field("Nearest grant", nearest);
                    }
                }
            }
            let rows = result
                .outcomes
                .iter()
                .map(|outcome| {
                    let mark = if outcome.satisfied { "✓" } else { "✗" };
                    [outcome.object.clone(), mark.to_string()]
                })
                .collect();
            print_table(["Object", "Satisfied"], rows);
        }
    }
    Ok(allowed)
}

fn read_operation(args: &CheckArgs) -> Result<Operation> {
    let text = match (&args.operation, &args.operation_file) {
        (Some(json), _) => json.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("Either --operation or --operation-file is required"),
    };
    serde_json::from_str(&text).context("Invalid operation JSON")
}
