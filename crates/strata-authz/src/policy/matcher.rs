//! Privilege matching.
//!
//! [`matches`] decides whether one granted privilege satisfies one required
//! privilege. It is pure and total: every privilege reaching it was validated
//! when the snapshot was built.
//!
//! # Usage
//!
//! ```
//! use strata_authz::model::{Action, Privilege, ScopePath};
//! use strata_authz::policy::matcher::matches;
//!
//! let granted = Privilege::parse("server=server1->db=db1").unwrap();
//! let required = Privilege::scope(
//!     ScopePath::server("server1").database("db1").table("t1"),
//!     Action::Select,
//! );
//! assert!(matches(&granted, &required));
//! ```

use crate::model::{Privilege, ScopeName, ScopePath};

/// Whether `granted` satisfies `required`.
///
/// Both must be of the same kind, the granted resource must cover the
/// required one, and the granted action must imply the required action.
#[must_use]
pub fn matches(granted: &Privilege, required: &Privilege) -> bool {
    match (granted, required) {
        (
            Privilege::Scope {
                path: granted_path,
                action: granted_action,
            },
            Privilege::Scope {
                path: required_path,
                action: required_action,
            },
        ) => granted_path.covers(required_path) && granted_action.implies(*required_action),
        (
            Privilege::Uri {
                server: granted_server,
                uri: granted_uri,
                action: granted_action,
            },
            Privilege::Uri {
                server: required_server,
                uri: required_uri,
                action: required_action,
            },
        ) => {
            ScopeName::covers(Some(granted_server), Some(required_server))
                && granted_uri.covers(required_uri)
                && granted_action.implies(*required_action)
        }
        _ => false,
    }
}

/// Whether `granted` makes `scope` visible.
///
/// Any catalog privilege on the scope, above it or beneath it reveals the
/// scope's name, whatever its action.
#[must_use]
pub fn reveals(granted: &Privilege, scope: &ScopePath) -> bool {
    granted.path().is_some_and(|path| path.overlaps(scope))
}

/// The subject's own grant that comes closest to satisfying `required`.
///
/// Only grants of the same kind that do not satisfy the requirement are
/// considered. Closeness is the number of leading levels (or path
/// components) shared with the requirement; ties go to the earliest grant.
/// Used for diagnostics only.
#[must_use]
pub fn nearest_grant<'a, I>(effective: I, required: &Privilege) -> Option<&'a Privilege>
where
    I: IntoIterator<Item = &'a Privilege>,
{
    let mut best: Option<(usize, &'a Privilege)> = None;
    for granted in effective {
        if granted.kind() != required.kind() || matches(granted, required) {
            continue;
        }
        let score = closeness(granted, required);
        if score > 0 && best.is_none_or(|(top, _)| score > top) {
            best = Some((score, granted));
        }
    }
    best.map(|(_, granted)| granted)
}

fn closeness(granted: &Privilege, required: &Privilege) -> usize {
    match (granted, required) {
        (Privilege::Scope { path: g, .. }, Privilege::Scope { path: r, .. }) => {
            g.common_prefix_len(r)
        }
        (
            Privilege::Uri {
                server: gs, uri: g, ..
            },
            Privilege::Uri {
                server: rs, uri: r, ..
            },
        ) => {
            if ScopeName::covers(Some(gs), Some(rs)) {
                g.common_prefix_len(r)
            } else {
                0
            }
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, UriScope};

    fn p(value: &str) -> Privilege {
        Privilege::parse(value).unwrap()
    }

    fn table(db: &str, table: &str, action: Action) -> Privilege {
        Privilege::scope(ScopePath::server("server1").database(db).table(table), action)
    }

    fn uri(location: &str, action: Action) -> Privilege {
        Privilege::uri("server1", UriScope::parse(location).unwrap(), action)
    }

    // -------------------------------------------------------------------------
    // matches
    // -------------------------------------------------------------------------

    #[test]
    fn test_database_all_covers_tables_and_columns() {
        let granted = p("server=server1->db=db1");
        assert!(matches(&granted, &table("db1", "t1", Action::Select)));
        assert!(matches(&granted, &table("db1", "t1", Action::Insert)));
        assert!(matches(
            &granted,
            &Privilege::scope(
                ScopePath::server("server1").database("db1").table("t1").column("c"),
                Action::Select
            )
        ));
        assert!(!matches(&granted, &table("db2", "t1", Action::Select)));
    }

    #[test]
    fn test_database_all_does_not_cover_server_scope() {
        let granted = p("server=server1->db=db1");
        let required = Privilege::scope(ScopePath::server("server1"), Action::Create);
        assert!(!matches(&granted, &required));
        assert!(matches(&p("server=server1"), &required));
    }

    #[test]
    fn test_select_does_not_imply_insert() {
        let granted = p("server=server1->db=db1->table=t1->action=select");
        assert!(matches(&granted, &table("db1", "t1", Action::Select)));
        assert!(!matches(&granted, &table("db1", "t1", Action::Insert)));

        let granted = p("server=server1->db=db1->table=t1->action=insert");
        assert!(!matches(&granted, &table("db1", "t1", Action::Select)));
    }

    #[test]
    fn test_uri_prefix_boundary() {
        let granted = p("server=server1->uri=file:///a/b");
        assert!(matches(&granted, &uri("file:///a/b/c", Action::Select)));
        assert!(matches(&granted, &uri("file:///a/b", Action::Insert)));
        assert!(!matches(&granted, &uri("file:///a/bc", Action::Select)));
    }

    #[test]
    fn test_uri_server_must_match() {
        let granted = p("server=server2->uri=file:///a");
        assert!(!matches(&granted, &uri("file:///a/b", Action::Select)));
        let granted = p("server=*->uri=file:///a");
        assert!(matches(&granted, &uri("file:///a/b", Action::Select)));
    }

    #[test]
    fn test_kinds_never_match_each_other() {
        assert!(!matches(&p("server=server1"), &uri("file:///a", Action::Select)));
        assert!(!matches(
            &p("server=server1->uri=file:///"),
            &table("db1", "t1", Action::Select)
        ));
    }

    // -------------------------------------------------------------------------
    // reveals
    // -------------------------------------------------------------------------

    #[test]
    fn test_reveals_above_and_below() {
        let db1 = ScopePath::server("server1").database("db1");
        assert!(reveals(&p("server=server1->db=db1->table=t1->action=select"), &db1));
        assert!(reveals(&p("server=server1"), &db1));
        assert!(!reveals(&p("server=server1->db=db2"), &db1));
        assert!(!reveals(&p("server=server1->uri=file:///a"), &db1));
    }

    // -------------------------------------------------------------------------
    // nearest_grant
    // -------------------------------------------------------------------------

    #[test]
    fn test_nearest_grant_prefers_longest_prefix() {
        let grants = vec![
            p("server=server1->db=db2"),
            p("server=server1->db=db1->table=t2"),
            p("server=server1->db=db1->table=t1->action=insert"),
        ];
        let required = table("db1", "t1", Action::Select);
        assert_eq!(nearest_grant(&grants, &required), Some(&grants[2]));
    }

    #[test]
    fn test_nearest_grant_ignores_other_kind_and_satisfying_grants() {
        let grants = vec![p("server=server1->uri=file:///a"), p("server=server1")];
        let required = table("db1", "t1", Action::Select);
        assert_eq!(nearest_grant(&grants, &required), None);
    }
}
