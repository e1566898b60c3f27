//! End-to-end authorization scenarios for sandboxed users.
//!
//! Each test builds a policy, publishes it to a store and asks an
//! [`Authorizer`] about the statements a sandboxed user would run.

use std::collections::BTreeSet;
use std::sync::Arc;

use strata_authz::operation::parse_location;
use strata_authz::prelude::*;

// =============================================================================
// Helpers
// =============================================================================

const ALLOWED_DIR: &str = "/tmp/sandbox/allowed";
const RESTRICTED_DIR: &str = "/tmp/sandbox/restricted";

fn t(db: &str, table: &str) -> CatalogObject {
    CatalogObject::table(db, table)
}

fn loc(value: &str) -> UriScope {
    parse_location(value).unwrap()
}

fn db(name: &str) -> ScopePath {
    ScopePath::server("server1").database(name)
}

fn base_policy() -> PolicyDocument {
    PolicyDocument::new()
        .add_privileges_to_role("admin_role", ["server=server1"])
        .add_roles_to_group("admin_group", ["admin_role"])
        .add_groups_to_user("admin", ["admin_group"])
}

fn authorizer_for(document: &PolicyDocument, ddl_policy: DdlPolicy) -> Authorizer {
    let config = AuthzConfig {
        admin_groups: BTreeSet::from(["admin_group".to_string()]),
        ddl_policy,
        ..Default::default()
    };
    let store = Arc::new(PolicyStore::new(config.snapshot_options()));
    store.publish_document(document).unwrap();
    Authorizer::new(store, Arc::new(LocalGroupResolver), &config).unwrap()
}

fn authorizer(document: &PolicyDocument) -> Authorizer {
    authorizer_for(document, DdlPolicy::ServerOnly)
}

async fn allowed(authorizer: &Authorizer, user: &str, op: Operation) -> bool {
    authorizer
        .authorize_operation(user, &op)
        .await
        .unwrap()
        .is_allowed()
}

async fn assert_denied(authorizer: &Authorizer, user: &str, op: Operation) {
    let kind = op.kind();
    let decision = authorizer.authorize_operation(user, &op).await.unwrap();
    assert!(decision.is_denied(), "{user} should be denied {kind}");
}

// =============================================================================
// Database Owners
// =============================================================================

fn two_users_with_all_db() -> PolicyDocument {
    base_policy()
        .add_privileges_to_role("db1_all", ["server=server1->db=db1"])
        .add_privileges_to_role("db2_all", ["server=server1->db=db2"])
        .add_roles_to_group("user_group", ["db1_all", "db2_all"])
        .add_groups_to_user("user1", ["user_group"])
        .add_groups_to_user("user2", ["user_group"])
}

#[tokio::test]
async fn test_database_owner_creates_tables_but_not_databases() {
    let authz = authorizer(&two_users_with_all_db());

    for user in ["user1", "user2"] {
        for database in ["db1", "db2"] {
            let table = t(database, &format!("{user}_tab1"));
            assert!(
                allowed(&authz, user, Operation::UseDatabase { database: database.to_string() }).await
            );
            assert!(allowed(&authz, user, Operation::CreateTable { table: table.clone() }).await);
            assert!(
                allowed(&authz, user, Operation::Query { inputs: vec![table.clone()] }).await
            );

            // No URI grant for the data file
            assert_denied(
                &authz,
                user,
                Operation::LoadData {
                    source: loc("/tmp/data/kv1.dat"),
                    target: table,
                },
            )
            .await;
            assert_denied(
                &authz,
                user,
                Operation::CreateDatabase {
                    database: format!("{user}_db"),
                },
            )
            .await;
        }
    }
}

#[tokio::test]
async fn test_load_denial_names_the_location() {
    let authz = authorizer(&two_users_with_all_db());
    let op = Operation::LoadData {
        source: loc("/tmp/data/kv1.dat"),
        target: t("db1", "t1"),
    };

    let decision = authz.authorize_operation("user1", &op).await.unwrap();
    let reason = decision.deny_reason().unwrap();
    assert_eq!(reason.code, "missing-privilege");
    assert_eq!(reason.object, "file:///tmp/data/kv1.dat");
}

// =============================================================================
// Select-only Users
// =============================================================================

fn select_only_policy() -> PolicyDocument {
    base_policy()
        .add_privileges_to_role("db1_all", ["server=server1->db=db1"])
        .add_privileges_to_role(
            "db1_tab1_select",
            ["server=server1->db=db1->table=table_1->action=select"],
        )
        .add_roles_to_group("user_group1", ["db1_all"])
        .add_roles_to_group("user_group2", ["db1_tab1_select"])
        .add_groups_to_user("user1", ["user_group1"])
        .add_groups_to_user("user2", ["user_group2"])
}

#[tokio::test]
async fn test_select_only_user_cannot_modify_anything() {
    let authz = authorizer(&select_only_policy());
    let user = "user2";

    assert!(allowed(&authz, user, Operation::Query { inputs: vec![t("db1", "table_1")] }).await);

    let denied = vec![
        Operation::AlterTable {
            table: t("db1", "table_1"),
            change: AlterTableChange::AddColumns,
        },
        Operation::DropDatabase {
            database: "db1".to_string(),
        },
        Operation::CreateIndex {
            table: t("db1", "table_1"),
            handler: Some("org.apache.hadoop.hive.ql.index.compact.CompactIndexHandler".to_string()),
        },
        Operation::CreateFunction {
            name: "strip".to_string(),
            class: Some("org.apache.hadoop.hive.ql.udf.generic.GenericUDFTrim".to_string()),
        },
        Operation::CreateTableAsSelect {
            table: t("db1", "c_tab_2"),
            inputs: vec![t("db1", "table_1")],
        },
        Operation::AlterDatabase {
            database: "db1".to_string(),
            change: AlterDatabaseChange::SetProperties,
        },
        Operation::AlterTable {
            table: t("db1", "view_1"),
            change: AlterTableChange::SetProperties,
        },
        Operation::DropView {
            view: t("db1", "view_1"),
        },
        Operation::CreateTable {
            table: t("db1", "table_5"),
        },
        Operation::AlterTable {
            table: t("db1", "table_1"),
            change: AlterTableChange::Rename {
                to: t("db1", "table_99"),
            },
        },
        Operation::Insert {
            target: t("db1", "table_1"),
            inputs: vec![t("db1", "table_1")],
            overwrite: true,
        },
        Operation::AlterTable {
            table: t("db1", "table_1"),
            change: AlterTableChange::AddPartition { location: None },
        },
        Operation::AlterTable {
            table: t("db1", "table_1"),
            change: AlterTableChange::SetLocation {
                location: loc("file:///tmp/part"),
            },
        },
        Operation::ExportDirectory {
            inputs: vec![t("db1", "table_1")],
            destination: loc(ALLOWED_DIR),
        },
    ];
    for op in denied {
        assert_denied(&authz, user, op).await;
    }
}

#[tokio::test]
async fn test_select_and_show_indexes_need_table_grant() {
    let mut document = base_policy()
        .add_privileges_to_role("all_db1", ["server=server1->db=db_1"])
        .add_roles_to_group("group1", ["all_db1"])
        .add_groups_to_user("user1", ["group1"]);
    let select = Operation::Query {
        inputs: vec![t("db_1", "tb_1")],
    };
    let show_indexes = Operation::ShowIndexes {
        table: t("db_1", "tb_1"),
    };

    let authz = authorizer(&document);
    assert_denied(&authz, "user2", select.clone()).await;
    assert_denied(&authz, "user2", show_indexes.clone()).await;

    document.merge(
        PolicyDocument::new()
            .add_privileges_to_role(
                "select_tb1",
                ["server=server1->db=db_1->table=tb_1->action=select"],
            )
            .add_roles_to_group("group2", ["select_tb1"])
            .add_groups_to_user("user2", ["group2"]),
    );
    let authz = authorizer(&document);
    assert!(allowed(&authz, "user2", select).await);
    assert!(allowed(&authz, "user2", show_indexes).await);
}

// =============================================================================
// Server-scoped Operations
// =============================================================================

fn db_owner_and_table_reader() -> PolicyDocument {
    base_policy()
        .add_privileges_to_role("all_db1", ["server=server1->db=db_1"])
        .add_privileges_to_role("load_data", ["server=server1->uri=file:/tmp/data/kv1.dat"])
        .add_privileges_to_role(
            "select_tb1",
            ["server=server1->db=db_1->table=tb_1->action=select"],
        )
        .add_roles_to_group("group1", ["all_db1", "load_data"])
        .add_roles_to_group("group2", ["select_tb1"])
        .add_groups_to_user("user1", ["group1"])
        .add_groups_to_user("user2", ["group2"])
}

#[tokio::test]
async fn test_database_owner_needs_server_scope_for_admin_ddl() {
    let authz = authorizer(&db_owner_and_table_reader());
    let user = "user1";

    // The location grant covers the exact file
    assert!(
        allowed(
            &authz,
            user,
            Operation::LoadData {
                source: loc("/tmp/data/kv1.dat"),
                target: t("db_1", "tb_1"),
            }
        )
        .await
    );

    let denied = vec![
        Operation::CreateDatabase {
            database: "db_3".to_string(),
        },
        Operation::DropDatabase {
            database: "db_1".to_string(),
        },
        Operation::AlterTable {
            table: t("db_1", "tb_1"),
            change: AlterTableChange::AddPartition {
                location: Some(loc("/tmp/data")),
            },
        },
        Operation::AlterTable {
            table: t("db_1", "tb_1"),
            change: AlterTableChange::SetLocation {
                location: loc("/tmp/data"),
            },
        },
        Operation::CreateExternalTable {
            table: t("db_1", "tb_3"),
            location: Some(loc("/tmp/data")),
        },
        Operation::AddResource {
            path: "/usr/lib/hive/lib/hbase.jar".to_string(),
        },
        Operation::Transform {
            inputs: vec![t("db_1", "tb_1")],
            script: "/bin/cat".to_string(),
        },
        Operation::ShowLocks,
    ];
    for op in denied {
        assert_denied(&authz, user, op).await;
    }
}

#[tokio::test]
async fn test_table_reader_denied_on_other_tables() {
    let authz = authorizer(&db_owner_and_table_reader());
    let user = "user2";
    let tb2 = t("db_1", "tb_2");

    assert!(allowed(&authz, user, Operation::UseDatabase { database: "db_1".to_string() }).await);

    let query = Operation::Query {
        inputs: vec![tb2.clone()],
    };
    let denied = vec![
        query.clone(),
        Operation::Explain {
            operation: Box::new(query),
        },
        Operation::Describe { object: tb2.clone() },
        Operation::LoadData {
            source: loc("/tmp/data/kv1.dat"),
            target: tb2.clone(),
        },
        Operation::AnalyzeTable { table: tb2.clone() },
        Operation::Query {
            inputs: vec![t("db_1", "tb_1"), tb2],
        },
    ];
    for op in denied {
        assert_denied(&authz, user, op).await;
    }
}

#[tokio::test]
async fn test_show_databases_is_filtered() {
    let authz = authorizer(&db_owner_and_table_reader());
    let candidates = [db("db_1"), db("db_2"), db("default")];

    assert!(allowed(&authz, "user2", Operation::ShowDatabases).await);
    assert_eq!(
        authz.filter_visible("user2", candidates.clone()).await.unwrap(),
        vec![db("db_1")]
    );
    assert_eq!(
        authz.filter_visible("admin", candidates.clone()).await.unwrap(),
        candidates.to_vec()
    );
    assert!(authz.filter_visible("nobody", candidates).await.unwrap().is_empty());
}

// =============================================================================
// Locations
// =============================================================================

fn location_policy() -> PolicyDocument {
    base_policy()
        .add_privileges_to_role("all_db1", ["server=server1->db=db_1"])
        .add_privileges_to_role(
            "load_data",
            [
                format!("server=server1->uri=file://{ALLOWED_DIR}"),
                "server=server1->uri=hdfs://namenode:8020/user/hive/allowed".to_string(),
            ],
        )
        .add_roles_to_group("group1", ["all_db1", "load_data"])
        .add_groups_to_user("user1", ["group1"])
}

#[tokio::test]
async fn test_export_and_load_limited_to_granted_locations() {
    let authz = authorizer(&location_policy());
    let user = "user1";
    let tb1 = t("db_1", "tb_1");

    for destination in [
        format!("file://{ALLOWED_DIR}"),
        "hdfs://namenode:8020/user/hive/allowed/out".to_string(),
    ] {
        let op = Operation::ExportDirectory {
            inputs: vec![tb1.clone()],
            destination: loc(&destination),
        };
        assert!(allowed(&authz, user, op).await, "{destination}");
    }
    assert!(
        allowed(
            &authz,
            user,
            Operation::LoadData {
                source: loc(&format!("{ALLOWED_DIR}/kv1.dat")),
                target: tb1.clone(),
            }
        )
        .await
    );

    for destination in [
        format!("file://{RESTRICTED_DIR}"),
        "hdfs://namenode:8020/user/hive/restricted".to_string(),
        // Sibling sharing a name prefix
        format!("file://{ALLOWED_DIR}2"),
    ] {
        assert_denied(
            &authz,
            user,
            Operation::ExportDirectory {
                inputs: vec![tb1.clone()],
                destination: loc(&destination),
            },
        )
        .await;
    }
    assert_denied(
        &authz,
        user,
        Operation::LoadData {
            source: loc(RESTRICTED_DIR),
            target: tb1,
        },
    )
    .await;
}

// =============================================================================
// Views Across Databases
// =============================================================================

#[tokio::test]
async fn test_view_over_other_database_requires_select_there() {
    let document = base_policy()
        .add_privileges_to_role("group1_role", ["server=server1->db=db_1"])
        .add_roles_to_group("group1", ["group1_role"])
        .add_groups_to_user("user1", ["group1"]);
    let view_over = |table: &str| Operation::CreateView {
        view: t("db_1", "view_2"),
        inputs: vec![t("db_2", table)],
    };

    let authz = authorizer(&document);
    assert_denied(&authz, "user1", view_over("tb_2")).await;

    let document = document.add_privileges_to_role(
        "group1_role",
        ["server=server1->db=db_2->table=tb_2->action=select"],
    );
    let authz = authorizer(&document);
    assert!(allowed(&authz, "user1", view_over("tb_2")).await);
    assert_denied(&authz, "user1", view_over("tb_3")).await;
}

// =============================================================================
// Administrative DDL Policy
// =============================================================================

#[tokio::test]
async fn test_owning_database_policy_allows_db_owner_ddl() {
    let document = base_policy()
        .add_privileges_to_role("all_db1", ["server=server1->db=db_1"])
        .add_privileges_to_role("warehouse", ["server=server1->uri=hdfs://nn:8020/warehouse"])
        .add_roles_to_group("group1", ["all_db1", "warehouse"])
        .add_groups_to_user("user1", ["group1"]);
    let rename = Operation::AlterTable {
        table: t("db_1", "tb_1"),
        change: AlterTableChange::Rename {
            to: t("db_1", "tb_9"),
        },
    };
    let move_out = Operation::AlterTable {
        table: t("db_1", "tb_1"),
        change: AlterTableChange::Rename {
            to: t("db_2", "tb_1"),
        },
    };
    let relocate = |location: &str| Operation::AlterTable {
        table: t("db_1", "tb_1"),
        change: AlterTableChange::SetLocation {
            location: loc(location),
        },
    };

    let strict = authorizer_for(&document, DdlPolicy::ServerOnly);
    assert_denied(&strict, "user1", rename.clone()).await;
    assert_denied(&strict, "user1", relocate("hdfs://nn:8020/warehouse/tb_1")).await;

    let lenient = authorizer_for(&document, DdlPolicy::OwningDatabase);
    assert!(allowed(&lenient, "user1", rename).await);
    assert!(allowed(&lenient, "user1", relocate("hdfs://nn:8020/warehouse/tb_1")).await);
    assert_denied(&lenient, "user1", relocate("hdfs://nn:8020/elsewhere")).await;
    assert_denied(&lenient, "user1", move_out).await;
}

#[tokio::test]
async fn test_index_handlers() {
    let document = base_policy()
        .add_privileges_to_role("all_db1", ["server=server1->db=db_1"])
        .add_roles_to_group("group1", ["all_db1"])
        .add_groups_to_user("user1", ["group1"]);
    let authz = authorizer(&document);
    let index = |handler: Option<&str>| Operation::CreateIndex {
        table: t("db_1", "tb_1"),
        handler: handler.map(str::to_string),
    };

    assert!(allowed(&authz, "user1", index(None)).await);
    assert!(allowed(&authz, "user1", index(Some("COMPACT"))).await);
    assert!(
        allowed(
            &authz,
            "user1",
            index(Some("org.apache.hadoop.hive.ql.index.bitmap.BitmapIndexHandler"))
        )
        .await
    );
    assert_denied(&authz, "user1", index(Some("com.example.CustomHandler"))).await;
    assert!(allowed(&authz, "admin", index(Some("com.example.CustomHandler"))).await);
}

// =============================================================================
// Admins and Reload
// =============================================================================

#[tokio::test]
async fn test_admin_bypasses_every_check() {
    let authz = authorizer(&base_policy());
    for op in [
        Operation::CreateDatabase {
            database: "db9".to_string(),
        },
        Operation::AddResource {
            path: "/tmp/udf.jar".to_string(),
        },
        Operation::LoadData {
            source: loc("/anywhere/at/all"),
            target: t("db9", "t"),
        },
    ] {
        assert!(allowed(&authz, "admin", op).await);
    }

    let request = required_privileges(&Operation::ShowLocks, authz.mapper_config());
    let result = authz.authorize_with_audit("admin", &request).await.unwrap();
    assert!(result.admin_bypass);
}

#[tokio::test]
async fn test_reload_swaps_policy_for_new_requests_only() {
    let granted = base_policy()
        .add_privileges_to_role("db1_all", ["server=server1->db=db1"])
        .add_roles_to_group("user_group", ["db1_all"])
        .add_groups_to_user("user1", ["user_group"]);
    let source = StaticPolicySource::new(granted.clone());

    let config = AuthzConfig::default();
    let store = Arc::new(PolicyStore::new(config.snapshot_options()));
    let first = store.reload_from(&source).await.unwrap();
    let authz = Authorizer::new(store.clone(), Arc::new(LocalGroupResolver), &config).unwrap();

    let create = Operation::CreateTable { table: t("db1", "t1") };
    assert!(allowed(&authz, "user1", create.clone()).await);
    let held = store.current();

    source
        .replace(granted.remove_privileges_from_role("db1_all", &["server=server1->db=db1"]))
        .await;
    let second = store.reload_from(&source).await.unwrap();
    assert!(second > first);

    assert_denied(&authz, "user1", create.clone()).await;

    // A snapshot taken before the reload still decides with the old policy
    let request = required_privileges(&create, authz.mapper_config());
    let groups = BTreeSet::from(["user_group".to_string()]);
    assert!(PolicyEvaluator.evaluate(&held, &groups, &request).is_allowed());
    assert_eq!(held.version(), first);
}

fn select_on(database: &str) -> RequiredPrivilege {
    RequiredPrivilege::new(
        format!("{database}.t1"),
        Privilege::scope(db(database).table("t1"), Action::Select),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_decisions_during_reloads_see_exactly_one_version() {
    // Odd versions grant db1 only, even versions grant db2 only.
    let only = |database: &str| {
        base_policy()
            .add_privileges_to_role("r", [format!("server=server1->db={database}")])
            .add_roles_to_group("user_group", ["r"])
            .add_groups_to_user("user1", ["user_group"])
    };
    let (odd, even) = (only("db1"), only("db2"));

    let authz = Arc::new(authorizer(&odd));
    let writer = {
        let store = authz.store().clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                store.publish_document(&even).unwrap();
                tokio::task::yield_now().await;
                store.publish_document(&odd).unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let authz = authz.clone();
            tokio::spawn(async move {
                let db1 = PrivilegeRequest::all([select_on("db1")]);
                let both = PrivilegeRequest::all([select_on("db1"), select_on("db2")]);
                let either = PrivilegeRequest::any([select_on("db1"), select_on("db2")]);
                for _ in 0..200 {
                    let result = authz.authorize_with_audit("user1", &db1).await.unwrap();
                    let odd_version = result.snapshot_version % 2 == 1;
                    assert_eq!(
                        result.decision.is_allowed(),
                        odd_version,
                        "version {} decided against another version's policy",
                        result.snapshot_version
                    );
                    let result = authz.authorize_with_audit("user1", &both).await.unwrap();
                    assert!(result.decision.is_denied(), "mixed versions granted both");
                    let result = authz.authorize_with_audit("user1", &either).await.unwrap();
                    assert!(result.decision.is_allowed(), "no version granted either");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(authz.store().version(), 401);
}
