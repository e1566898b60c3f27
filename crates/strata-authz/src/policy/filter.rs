//! Metadata filtering.
//!
//! Listing databases, tables or indexes must never reveal names of objects
//! the subject holds no privilege on. The filter keeps the candidates that a
//! visibility requirement would allow, in their original order.

use std::collections::BTreeSet;

use crate::model::ScopePath;
use crate::policy::matcher::reveals;
use crate::policy::snapshot::{EffectivePrivileges, PolicySnapshot};

/// The order-preserving subsequence of `candidates` visible to a subject
/// belonging to `groups`.
///
/// Admins see every candidate.
#[must_use]
pub fn filter_visible<I>(
    snapshot: &PolicySnapshot,
    groups: &BTreeSet<String>,
    candidates: I,
) -> Vec<ScopePath>
where
    I: IntoIterator<Item = ScopePath>,
{
    if snapshot.is_admin(groups) {
        return candidates.into_iter().collect();
    }
    let effective = snapshot.effective_privileges(groups);
    retain_visible(&effective, candidates)
}

/// Like [`filter_visible`] for an already computed privilege set.
///
/// Admin membership must be checked by the caller.
#[must_use]
pub fn retain_visible<I>(effective: &EffectivePrivileges, candidates: I) -> Vec<ScopePath>
where
    I: IntoIterator<Item = ScopePath>,
{
    candidates
        .into_iter()
        .filter(|candidate| is_visible(effective, candidate))
        .collect()
}

/// Whether any of the privileges reveals `scope`.
#[must_use]
pub fn is_visible(effective: &EffectivePrivileges, scope: &ScopePath) -> bool {
    effective.iter().any(|granted| reveals(granted, scope))
}
