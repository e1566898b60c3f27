use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use strata_authz::prelude::*;
use strata_policy_file::{FilePolicySource, FileWatcherConfig, PolicyFileWatcher};

use crate::cli::PolicyArgs;
use crate::output::{print_denied, print_success};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Keep the policy loaded and report reloads until interrupted.
pub async fn watch(args: &PolicyArgs, config: &AuthzConfig) -> Result<()> {
    let store = Arc::new(PolicyStore::new(config.snapshot_options()));
    let notifier = Arc::new(PolicyChangeNotifier::default());
    let service = Arc::new(PolicyReloadService::new(
        store.clone(),
        Arc::new(FilePolicySource::new(&args.policy)),
        notifier.clone(),
        config.reload.clone(),
    ));

    let version = service.reload_with_retry().await?;
    print_success(&format!("Loaded {} as version {version}", args.policy.display()));

    let watcher = PolicyFileWatcher::new(
        FileWatcherConfig::new(&args.policy).with_debounce(config.reload.debounce),
        notifier,
    )
    .start()?;
    let runner = {
        let service = service.clone();
        tokio::spawn(async move { service.run().await })
    };
    println!("{}", "Watching for changes, press Ctrl-C to stop".dimmed());

    report_reloads(&store, &service, version, tokio::signal::ctrl_c()).await;

    service.shutdown();
    watcher.stop().await;
    runner.await?;
    Ok(())
}

/// Print a line per published version or failed reload until `shutdown`
/// completes. Returns the last version seen.
async fn report_reloads<F: Future>(
    store: &PolicyStore,
    service: &PolicyReloadService,
    mut seen_version: u64,
    shutdown: F,
) -> u64 {
    let mut seen_failures = service.stats().failed_reloads;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let stats = store.stats();
                if stats.version != seen_version {
                    seen_version = stats.version;
                    print_success(&format!(
                        "Reloaded version {} ({} roles, {} groups, {} users)",
                        stats.version, stats.roles, stats.groups, stats.users
                    ));
                }
                let failures = service.stats().failed_reloads;
                if failures != seen_failures {
                    seen_failures = failures;
                    print_denied(&format!(
                        "Reload failed, still serving version {seen_version} (see logs)"
                    ));
                }
            }
        }
    }
    seen_version
}
