//! Policy file edits flowing through the watcher into the store.

use std::sync::Arc;
use std::time::Duration;

use strata_authz::prelude::*;
use strata_policy_file::{FilePolicySource, FileWatcherConfig, PolicyFileWatcher};
use tempfile::TempDir;

const GRANTED: &str = "\
[groups]
user_group = db1_all

[roles]
db1_all = server=server1->db=db1

[users]
user1 = user_group
";

const REVOKED: &str = "\
[groups]
user_group = db1_read

[roles]
db1_read = server=server1->db=db1->table=t1->action=select

[users]
user1 = user_group
";

async fn wait_for_version(store: &PolicyStore, version: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.version() < version {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("Timeout waiting for reload");
}

#[tokio::test]
async fn test_edit_is_picked_up_and_broken_edit_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("policy.ini");
    std::fs::write(&path, GRANTED).unwrap();

    let store = Arc::new(PolicyStore::default());
    let notifier = Arc::new(PolicyChangeNotifier::default());
    let service = Arc::new(PolicyReloadService::new(
        store.clone(),
        Arc::new(FilePolicySource::new(&path)),
        notifier.clone(),
        ReloadConfig::for_testing(),
    ));
    let first = service.reload_with_retry().await.unwrap();

    let authorizer = Authorizer::new(
        store.clone(),
        Arc::new(LocalGroupResolver),
        &AuthzConfig::default(),
    )
    .unwrap();
    let create = Operation::CreateTable {
        table: CatalogObject::table("db1", "t2"),
    };
    assert!(authorizer.authorize_operation("user1", &create).await.unwrap().is_allowed());

    let watcher = PolicyFileWatcher::new(
        FileWatcherConfig::new(&path).with_debounce(Duration::from_millis(50)),
        notifier,
    )
    .start()
    .unwrap();
    let runner = {
        let service = service.clone();
        tokio::spawn(async move { service.run().await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    // A dangling role fails the build and keeps the current snapshot
    std::fs::write(&path, "[groups]\nuser_group = missing_role\n").unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while service.stats().failed_reloads == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("Timeout waiting for failed reload");
    assert_eq!(store.version(), first);
    assert!(authorizer.authorize_operation("user1", &create).await.unwrap().is_allowed());

    std::fs::write(&path, REVOKED).unwrap();
    wait_for_version(&store, first + 1).await;
    assert!(authorizer.authorize_operation("user1", &create).await.unwrap().is_denied());

    service.shutdown();
    watcher.stop().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn test_toml_policy_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("policy.toml");
    std::fs::write(
        &path,
        r#"
[groups]
admin_group = ["admin_role"]

[roles]
admin_role = ["server=server1"]

[users]
admin = ["admin_group"]
"#,
    )
    .unwrap();

    let store = PolicyStore::default();
    store.reload_from(&FilePolicySource::new(&path)).await.unwrap();
    let snapshot = store.current();
    assert!(snapshot.role("admin_role").is_some());
    assert!(snapshot.user_groups("admin").unwrap().contains("admin_group"));
}
