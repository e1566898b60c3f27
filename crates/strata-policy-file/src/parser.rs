//! Policy file parsers.
//!
//! Two formats produce the same [`PolicyDocument`]:
//!
//! ```ini
//! # INI: comma-separated values, repeated keys append
//! [groups]
//! analysts = db1_all, load_data
//!
//! [roles]
//! db1_all = server=server1->db=db1
//! load_data = server=server1->uri=hdfs://nn:8020/landing
//!
//! [users]
//! alice = analysts
//! ```
//!
//! ```toml
//! [groups]
//! analysts = ["db1_all", "load_data"]
//!
//! [roles]
//! db1_all = ["server=server1->db=db1"]
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use strata_authz::PolicyDocument;

use crate::error::{PolicyFileError, Result};

#[derive(Debug, Clone, Copy)]
enum Section {
    Groups,
    Roles,
    Users,
}

impl Section {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "groups" => Some(Self::Groups),
            "roles" => Some(Self::Roles),
            "users" => Some(Self::Users),
            _ => None,
        }
    }
}

/// Parse an INI policy.
///
/// # Errors
///
/// Returns a [`PolicyFileError`] carrying the 1-based line number for an
/// unknown section, an entry before the first section, a malformed header
/// or a line without `=`.
pub fn parse_ini(text: &str) -> Result<PolicyDocument> {
    let mut document = PolicyDocument::new();
    let mut section = None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('[') {
            let name = header
                .strip_suffix(']')
                .ok_or_else(|| PolicyFileError::Syntax {
                    line,
                    message: format!("unterminated section header '{trimmed}'"),
                })?
                .trim();
            section = Some(Section::from_name(name).ok_or_else(|| {
                PolicyFileError::UnknownSection {
                    line,
                    section: name.to_string(),
                }
            })?);
            continue;
        }

        let current = section.ok_or(PolicyFileError::OutsideSection { line })?;
        let (key, value) = trimmed.split_once('=').ok_or_else(|| PolicyFileError::Syntax {
            line,
            message: format!("expected 'key = value', got '{trimmed}'"),
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(PolicyFileError::Syntax {
                line,
                message: "missing key before '='".to_string(),
            });
        }
        let values = value.split(',').map(str::trim).filter(|v| !v.is_empty());

        document = match current {
            Section::Groups => document.add_roles_to_group(key, values),
            Section::Roles => document.add_privileges_to_role(key, values),
            Section::Users => document.add_groups_to_user(key, values),
        };
    }

    tracing::trace!(
        groups = document.groups.len(),
        roles = document.roles.len(),
        users = document.users.len(),
        "Parsed INI policy"
    );
    Ok(document)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlPolicy {
    groups: BTreeMap<String, Vec<String>>,
    roles: BTreeMap<String, Vec<String>>,
    users: BTreeMap<String, Vec<String>>,
}

/// Parse a TOML policy with `[groups]`, `[roles]` and `[users]` tables of
/// string arrays.
///
/// # Errors
///
/// Returns [`PolicyFileError::Toml`] for invalid TOML or unknown tables.
pub fn parse_toml(text: &str) -> Result<PolicyDocument> {
    let parsed: TomlPolicy = toml::from_str(text)?;
    Ok(PolicyDocument {
        groups: parsed.groups,
        roles: parsed.roles,
        users: parsed.users,
    })
}
