//! Immutable, point-in-time view of the policy.
//!
//! A [`PolicySnapshot`] is built from a [`PolicyDocument`] in one pass. Every
//! entry is validated up front: a single malformed privilege, unknown action
//! or dangling role reference fails the whole build, so a published snapshot
//! never needs runtime error handling.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use time::OffsetDateTime;

use crate::error::PolicyLoadError;
use crate::model::{ActionSet, Privilege};
use crate::policy::document::PolicyDocument;

// =============================================================================
// Roles and Groups
// =============================================================================

/// A named bundle of privileges. Roles are the unit of grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Role name.
    pub name: String,
    /// Privileges in declaration order, without duplicates.
    pub privileges: Vec<Privilege>,
}

/// A named bundle of roles, referenced by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Names of roles granted to the group.
    pub roles: Vec<String>,
}

/// Options applied while building a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    /// Actions policy entries may use.
    pub enabled_actions: ActionSet,
    /// Groups whose members bypass all checks.
    pub admin_groups: BTreeSet<String>,
}

// =============================================================================
// Effective Privileges
// =============================================================================

/// The union of privileges a set of groups holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectivePrivileges {
    /// Roles contributing privileges, sorted.
    pub roles: Vec<String>,
    /// Privileges, deduplicated, in role order.
    pub privileges: Vec<Privilege>,
}

impl EffectivePrivileges {
    /// Iterate over the privileges.
    pub fn iter(&self) -> std::slice::Iter<'_, Privilege> {
        self.privileges.iter()
    }

    /// Number of privileges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.privileges.len()
    }

    /// Returns `true` if no privilege is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.privileges.is_empty()
    }
}

// =============================================================================
// Policy Snapshot
// =============================================================================

/// Immutable aggregate of roles, groups, user assignments and admin groups.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    version: u64,
    loaded_at: OffsetDateTime,
    roles: HashMap<String, Arc<Role>>,
    groups: HashMap<String, Group>,
    users: HashMap<String, BTreeSet<String>>,
    admin_groups: BTreeSet<String>,
}

/// Summary counters of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStats {
    /// Snapshot version.
    pub version: u64,
    /// When the snapshot was built.
    pub loaded_at: OffsetDateTime,
    /// Number of roles.
    pub roles: usize,
    /// Number of groups.
    pub groups: usize,
    /// Number of users with local group assignments.
    pub users: usize,
    /// Total privileges across all roles.
    pub privileges: usize,
}

impl PolicySnapshot {
    /// A snapshot granting nothing. Used before the first successful load.
    #[must_use]
    pub fn empty(admin_groups: BTreeSet<String>) -> Self {
        Self {
            version: 0,
            loaded_at: OffsetDateTime::now_utc(),
            roles: HashMap::new(),
            groups: HashMap::new(),
            users: HashMap::new(),
            admin_groups,
        }
    }

    /// Validate a document and build a snapshot from it.
    ///
    /// The returned snapshot has version 0; the store assigns the published
    /// version.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyLoadError`] for the first invalid entry found, in
    /// sorted role then group order.
    pub fn build(
        document: &PolicyDocument,
        options: &SnapshotOptions,
    ) -> Result<Self, PolicyLoadError> {
        let mut roles = HashMap::with_capacity(document.roles.len());
        for (name, entries) in &document.roles {
            let name = check_name("role", name, &roles)?;
            let role = build_role(name, entries, &options.enabled_actions)?;
            roles.insert(name.to_string(), Arc::new(role));
        }

        let mut groups = HashMap::with_capacity(document.groups.len());
        for (name, role_names) in &document.groups {
            let name = check_name("group", name, &groups)?;
            let mut seen = HashSet::new();
            let mut group_roles = Vec::with_capacity(role_names.len());
            for role in role_names.iter().map(|r| r.trim()) {
                if !roles.contains_key(role) {
                    return Err(PolicyLoadError::UnknownRole {
                        group: name.to_string(),
                        role: role.to_string(),
                    });
                }
                if seen.insert(role) {
                    group_roles.push(role.to_string());
                }
            }
            groups.insert(
                name.to_string(),
                Group {
                    name: name.to_string(),
                    roles: group_roles,
                },
            );
        }

        let mut users = HashMap::with_capacity(document.users.len());
        for (user, user_groups) in &document.users {
            let user = check_name("user", user, &users)?;
            let user_groups: BTreeSet<String> =
                user_groups.iter().map(|g| g.trim().to_string()).collect();
            for group in &user_groups {
                if !groups.contains_key(group) && !options.admin_groups.contains(group) {
                    tracing::warn!(
                        user = %user,
                        group = %group,
                        "User assigned to a group with no roles"
                    );
                }
            }
            users.insert(user.to_string(), user_groups);
        }

        Ok(Self {
            version: 0,
            loaded_at: OffsetDateTime::now_utc(),
            roles,
            groups,
            users,
            admin_groups: options.admin_groups.clone(),
        })
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Version assigned when the snapshot was published.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// When the snapshot was built.
    #[must_use]
    pub fn loaded_at(&self) -> OffsetDateTime {
        self.loaded_at
    }

    /// Look up a role.
    #[must_use]
    pub fn role(&self, name: &str) -> Option<&Arc<Role>> {
        self.roles.get(name)
    }

    /// Look up a group.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Groups assigned to a user by the policy's own user section.
    #[must_use]
    pub fn user_groups(&self, user: &str) -> Option<&BTreeSet<String>> {
        self.users.get(user)
    }

    /// The configured admin groups.
    #[must_use]
    pub fn admin_groups(&self) -> &BTreeSet<String> {
        &self.admin_groups
    }

    /// Returns `true` if any of the groups is an admin group.
    #[must_use]
    pub fn is_admin(&self, groups: &BTreeSet<String>) -> bool {
        !self.admin_groups.is_disjoint(groups)
    }

    /// Union of privileges held through the given groups.
    ///
    /// Unknown groups contribute nothing.
    #[must_use]
    pub fn effective_privileges(&self, groups: &BTreeSet<String>) -> EffectivePrivileges {
        let role_names: BTreeSet<&str> = groups
            .iter()
            .filter_map(|g| self.groups.get(g))
            .flat_map(|g| g.roles.iter().map(String::as_str))
            .collect();

        let mut seen = HashSet::new();
        let mut privileges = Vec::new();
        for role in role_names.iter().filter_map(|r| self.roles.get(*r)) {
            for privilege in &role.privileges {
                if seen.insert(privilege) {
                    privileges.push(privilege.clone());
                }
            }
        }

        EffectivePrivileges {
            roles: role_names.into_iter().map(str::to_string).collect(),
            privileges,
        }
    }

    /// Summary counters.
    #[must_use]
    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            version: self.version,
            loaded_at: self.loaded_at,
            roles: self.roles.len(),
            groups: self.groups.len(),
            users: self.users.len(),
            privileges: self.roles.values().map(|r| r.privileges.len()).sum(),
        }
    }
}

/// The trimmed name, rejected when empty or already defined.
fn check_name<'a, V>(
    kind: &str,
    name: &'a str,
    defined: &HashMap<String, V>,
) -> Result<&'a str, PolicyLoadError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PolicyLoadError::malformed(format!("empty {kind} name")));
    }
    if defined.contains_key(name) {
        return Err(PolicyLoadError::malformed(format!(
            "{kind} '{name}' is defined more than once"
        )));
    }
    Ok(name)
}

fn build_role(
    name: &str,
    entries: &[String],
    enabled_actions: &ActionSet,
) -> Result<Role, PolicyLoadError> {
    let mut privileges: Vec<Privilege> = Vec::with_capacity(entries.len());
    for entry in entries {
        let privilege =
            Privilege::parse(entry).map_err(|source| PolicyLoadError::InvalidPrivilege {
                role: name.to_string(),
                entry: entry.clone(),
                source,
            })?;
        if !enabled_actions.contains(privilege.action()) {
            return Err(PolicyLoadError::ActionNotEnabled {
                role: name.to_string(),
                action: privilege.action(),
            });
        }
        if !privileges.contains(&privilege) {
            privileges.push(privilege);
        }
    }
    Ok(Role {
        name: name.to_string(),
        privileges,
    })
}
