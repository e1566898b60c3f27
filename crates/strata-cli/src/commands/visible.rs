use anyhow::Result;
use serde_json::json;
use strata_authz::prelude::*;

use crate::cli::{OutputFormat, VisibleArgs};
use crate::output::{print_json, print_table};

pub async fn visible(args: &VisibleArgs, config: &AuthzConfig, format: OutputFormat) -> Result<()> {
    let candidates = args
        .objects
        .iter()
        .map(|object| {
            ScopePath::parse_dotted(object).ok_or_else(|| {
                anyhow::anyhow!("Invalid object '{object}', expected server.db[.table[.column]]")
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let authorizer = super::local_authorizer(&args.subject.policy.policy, config).await?;
    let visible = authorizer
        .filter_visible(&args.subject.user, candidates.iter().cloned())
        .await?;

    match format {
        OutputFormat::Json => {
            let visible: Vec<String> = visible.iter().map(ToString::to_string).collect();
            print_json(&json!({ "user": args.subject.user, "visible": visible }))?;
        }
        OutputFormat::Table => {
            let rows = candidates
                .iter()
                .map(|candidate| {
                    let shown = if visible.contains(candidate) { "yes" } else { "no" };
                    [candidate.to_string(), shown.to_string()]
                })
                .collect();
            print_table(["Object", "Visible"], rows);
        }
    }
    Ok(())
}
