//! Raw policy entries as produced by a policy source.
//!
//! A document is the unvalidated input to
//! [`PolicySnapshot::build`](super::snapshot::PolicySnapshot::build). It has
//! three sections: group → roles, role → privilege strings, user → groups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unvalidated policy entries.
///
/// ```
/// use strata_authz::policy::PolicyDocument;
///
/// let doc = PolicyDocument::new()
///     .add_privileges_to_role("db1_all", ["server=server1->db=db1"])
///     .add_roles_to_group("analysts", ["db1_all"])
///     .add_groups_to_user("user1", ["analysts"]);
/// assert_eq!(doc.roles["db1_all"].len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDocument {
    /// Group name → role names.
    pub groups: BTreeMap<String, Vec<String>>,
    /// Role name → privilege strings.
    pub roles: BTreeMap<String, Vec<String>>,
    /// User name → group names.
    pub users: BTreeMap<String, Vec<String>>,
}

impl PolicyDocument {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append roles to a group.
    #[must_use]
    pub fn add_roles_to_group<I, S>(mut self, group: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append(&mut self.groups, group, roles);
        self
    }

    /// Append privilege strings to a role.
    #[must_use]
    pub fn add_privileges_to_role<I, S>(mut self, role: &str, privileges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append(&mut self.roles, role, privileges);
        self
    }

    /// Append groups to a user.
    #[must_use]
    pub fn add_groups_to_user<I, S>(mut self, user: &str, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append(&mut self.users, user, groups);
        self
    }

    /// Remove the given privilege strings from a role, if present.
    #[must_use]
    pub fn remove_privileges_from_role(mut self, role: &str, privileges: &[&str]) -> Self {
        if let Some(entries) = self.roles.get_mut(role) {
            entries.retain(|entry| !privileges.contains(&entry.as_str()));
        }
        self
    }

    /// Merge another document into this one, appending entries.
    pub fn merge(&mut self, other: PolicyDocument) {
        for (group, roles) in other.groups {
            append(&mut self.groups, &group, roles);
        }
        for (role, privileges) in other.roles {
            append(&mut self.roles, &role, privileges);
        }
        for (user, groups) in other.users {
            append(&mut self.users, &user, groups);
        }
    }

    /// Returns `true` if the document has no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.roles.is_empty() && self.users.is_empty()
    }
}

fn append<I, S>(section: &mut BTreeMap<String, Vec<String>>, key: &str, values: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    section
        .entry(key.to_string())
        .or_default()
        .extend(values.into_iter().map(Into::into));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_appends() {
        let doc = PolicyDocument::new()
            .add_roles_to_group("g1", ["r1"])
            .add_roles_to_group("g1", ["r2"]);
        assert_eq!(doc.groups["g1"], vec!["r1", "r2"]);
    }

    #[test]
    fn test_remove_privileges() {
        let doc = PolicyDocument::new()
            .add_privileges_to_role("r1", ["server=s->db=a", "server=s->db=b"])
            .remove_privileges_from_role("r1", &["server=s->db=b"]);
        assert_eq!(doc.roles["r1"], vec!["server=s->db=a"]);
    }

    #[test]
    fn test_merge() {
        let mut doc = PolicyDocument::new().add_groups_to_user("u1", ["g1"]);
        doc.merge(PolicyDocument::new().add_groups_to_user("u1", ["g2"]));
        assert_eq!(doc.users["u1"], vec!["g1", "g2"]);
        assert!(!doc.is_empty());
        assert!(PolicyDocument::new().is_empty());
    }
}
