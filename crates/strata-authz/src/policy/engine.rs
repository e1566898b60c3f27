//! Decision engine.
//!
//! The evaluator is a pure function of a snapshot, the subject's groups and a
//! [`PrivilegeRequest`]. It never suspends, takes no locks and never fails:
//! a denial is a [`Decision`] value, not an error.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use strata_authz::model::{Action, Privilege, ScopePath};
//! use strata_authz::policy::{
//!     PolicyDocument, PolicyEvaluator, PolicySnapshot, PrivilegeRequest, RequiredPrivilege,
//!     SnapshotOptions,
//! };
//!
//! let doc = PolicyDocument::new()
//!     .add_privileges_to_role("db1_all", ["server=server1->db=db1"])
//!     .add_roles_to_group("g1", ["db1_all"]);
//! let snapshot = PolicySnapshot::build(&doc, &SnapshotOptions::default()).unwrap();
//! let groups = BTreeSet::from(["g1".to_string()]);
//!
//! let request = PrivilegeRequest::all([RequiredPrivilege::new(
//!     "db1.t1",
//!     Privilege::scope(ScopePath::server("server1").database("db1").table("t1"), Action::Select),
//! )]);
//! assert!(PolicyEvaluator.evaluate(&snapshot, &groups, &request).is_allowed());
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{Privilege, ScopePath};
use crate::policy::matcher::{matches, nearest_grant, reveals};
use crate::policy::snapshot::{EffectivePrivileges, PolicySnapshot};

// =============================================================================
// Requests
// =============================================================================

/// What one requirement asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Requirement {
    /// Satisfied when any one of the privileges is matched by a grant.
    AnyOf(Vec<Privilege>),
    /// Satisfied when any grant reveals the scope, whatever its action.
    Visibility(ScopePath),
}

/// A requirement tagged with the object it protects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredPrivilege {
    /// Object description, as named in the subject's own request.
    pub object: String,
    /// The requirement.
    pub requirement: Requirement,
}

impl RequiredPrivilege {
    /// A single required privilege.
    #[must_use]
    pub fn new(object: impl Into<String>, privilege: Privilege) -> Self {
        Self::any_of(object, vec![privilege])
    }

    /// Alternatives, any one of which suffices.
    #[must_use]
    pub fn any_of(object: impl Into<String>, privileges: Vec<Privilege>) -> Self {
        Self {
            object: object.into(),
            requirement: Requirement::AnyOf(privileges),
        }
    }

    /// Visibility of a scope.
    #[must_use]
    pub fn visibility(object: impl Into<String>, scope: ScopePath) -> Self {
        Self {
            object: object.into(),
            requirement: Requirement::Visibility(scope),
        }
    }

    fn is_satisfied_by(&self, effective: &EffectivePrivileges) -> bool {
        match &self.requirement {
            Requirement::AnyOf(alternatives) => alternatives
                .iter()
                .any(|required| effective.iter().any(|granted| matches(granted, required))),
            Requirement::Visibility(scope) => effective.iter().any(|granted| reveals(granted, scope)),
        }
    }
}

/// How the requirements of a request combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Every requirement must hold.
    #[default]
    All,
    /// At least one requirement must hold.
    Any,
}

/// An ordered list of requirements and how they combine.
///
/// Order is significant: the first failing requirement is the one reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeRequest {
    /// Requirements in evaluation order.
    pub requirements: Vec<RequiredPrivilege>,
    /// Combination rule.
    #[serde(default)]
    pub combinator: Combinator,
}

impl PrivilegeRequest {
    /// A request where every requirement must hold.
    #[must_use]
    pub fn all(requirements: impl IntoIterator<Item = RequiredPrivilege>) -> Self {
        Self {
            requirements: requirements.into_iter().collect(),
            combinator: Combinator::All,
        }
    }

    /// A request where any requirement suffices.
    #[must_use]
    pub fn any(requirements: impl IntoIterator<Item = RequiredPrivilege>) -> Self {
        Self {
            requirements: requirements.into_iter().collect(),
            combinator: Combinator::Any,
        }
    }

    /// Returns `true` if the request has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

// =============================================================================
// Decision
// =============================================================================

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    /// The request is authorized.
    Allow,
    /// The request is denied.
    Deny(DenyReason),
}

impl Decision {
    /// Returns `true` if access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if access was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    /// Get the deny reason if access was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Deny(reason) => Some(reason),
            Self::Allow => None,
        }
    }
}

/// Why a request was denied.
///
/// Only names the object from the subject's own request, the privilege that
/// was missing and, when there is one, the subject's own closest grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyReason {
    /// Code for programmatic handling.
    pub code: String,

    /// Human-readable message.
    pub message: String,

    /// The object the failing requirement protects.
    pub object: String,

    /// Privileges any one of which would have satisfied the requirement.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<Privilege>,

    /// The subject's closest grant that fell short.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_grant: Option<Privilege>,
}

impl DenyReason {
    /// Denial for a privilege requirement nothing matched.
    #[must_use]
    pub fn missing_privilege(
        requirement: &RequiredPrivilege,
        effective: &EffectivePrivileges,
    ) -> Self {
        match &requirement.requirement {
            Requirement::AnyOf(alternatives) => {
                let nearest = alternatives
                    .iter()
                    .find_map(|required| nearest_grant(effective.iter(), required))
                    .cloned();
                let wanted = alternatives
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" or ");
                Self {
                    code: "missing-privilege".to_string(),
                    message: format!(
                        "Missing privilege on '{}': requires {}",
                        requirement.object, wanted
                    ),
                    object: requirement.object.clone(),
                    required: alternatives.clone(),
                    nearest_grant: nearest,
                }
            }
            Requirement::Visibility(_) => Self {
                code: "not-visible".to_string(),
                message: format!("No privilege on '{}'", requirement.object),
                object: requirement.object.clone(),
                required: Vec::new(),
                nearest_grant: None,
            },
        }
    }

    /// Denial for an any-of request with no requirements.
    #[must_use]
    pub fn empty_request() -> Self {
        Self {
            code: "empty-request".to_string(),
            message: "No requirement to satisfy".to_string(),
            object: String::new(),
            required: Vec::new(),
            nearest_grant: None,
        }
    }
}

// =============================================================================
// Evaluation Result
// =============================================================================

/// Outcome of one requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementOutcome {
    /// Object the requirement protects.
    pub object: String,
    /// Whether it was satisfied.
    pub satisfied: bool,
}

/// Complete result of an evaluation with audit information.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// The final decision.
    pub decision: Decision,

    /// Whether the subject bypassed checks as an admin.
    pub admin_bypass: bool,

    /// Version of the snapshot the decision was made against.
    pub snapshot_version: u64,

    /// Per-requirement outcomes, in request order. Empty on admin bypass.
    pub outcomes: Vec<RequirementOutcome>,

    /// Time taken to evaluate (milliseconds).
    pub evaluation_time_ms: f64,
}

// =============================================================================
// Policy Evaluator
// =============================================================================

/// Evaluates privilege requests against a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEvaluator;

impl PolicyEvaluator {
    /// Decide a request for a subject belonging to `groups`.
    #[must_use]
    pub fn evaluate(
        &self,
        snapshot: &PolicySnapshot,
        groups: &BTreeSet<String>,
        request: &PrivilegeRequest,
    ) -> Decision {
        self.evaluate_with_audit(snapshot, groups, request).decision
    }

    /// Decide a request and report how each requirement fared.
    #[must_use]
    pub fn evaluate_with_audit(
        &self,
        snapshot: &PolicySnapshot,
        groups: &BTreeSet<String>,
        request: &PrivilegeRequest,
    ) -> EvaluationResult {
        if snapshot.is_admin(groups) {
            return EvaluationResult {
                decision: Decision::Allow,
                admin_bypass: true,
                snapshot_version: snapshot.version(),
                outcomes: Vec::new(),
                evaluation_time_ms: 0.0,
            };
        }

        let effective = snapshot.effective_privileges(groups);
        self.evaluate_privileges(snapshot.version(), &effective, request)
    }

    /// Decide a request against an already computed privilege set.
    ///
    /// Admin membership must be checked by the caller.
    #[must_use]
    pub fn evaluate_privileges(
        &self,
        snapshot_version: u64,
        effective: &EffectivePrivileges,
        request: &PrivilegeRequest,
    ) -> EvaluationResult {
        let start = std::time::Instant::now();

        let outcomes: Vec<RequirementOutcome> = request
            .requirements
            .iter()
            .map(|requirement| RequirementOutcome {
                object: requirement.object.clone(),
                satisfied: requirement.is_satisfied_by(effective),
            })
            .collect();

        let decision = match request.combinator {
            Combinator::All => match outcomes.iter().position(|o| !o.satisfied) {
                None => Decision::Allow,
                Some(index) => Decision::Deny(DenyReason::missing_privilege(
                    &request.requirements[index],
                    effective,
                )),
            },
            Combinator::Any => {
                if outcomes.iter().any(|o| o.satisfied) {
                    Decision::Allow
                } else {
                    match request.requirements.first() {
                        Some(first) => {
                            Decision::Deny(DenyReason::missing_privilege(first, effective))
                        }
                        None => Decision::Deny(DenyReason::empty_request()),
                    }
                }
            }
        };

        EvaluationResult {
            decision,
            admin_bypass: false,
            snapshot_version,
            outcomes,
            evaluation_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, UriScope};
    use crate::policy::document::PolicyDocument;
    use crate::policy::snapshot::SnapshotOptions;

    // -------------------------------------------------------------------------
    // Helper Functions
    // -------------------------------------------------------------------------

    fn snapshot() -> PolicySnapshot {
        let doc = PolicyDocument::new()
            .add_privileges_to_role("db1_all", ["server=server1->db=db1"])
            .add_privileges_to_role(
                "t2_select",
                ["server=server1->db=db2->table=t2->action=select"],
            )
            .add_privileges_to_role("ld", ["server=server1->uri=file:///allowed"])
            .add_roles_to_group("g1", ["db1_all", "ld"])
            .add_roles_to_group("g2", ["t2_select"]);
        let options = SnapshotOptions {
            admin_groups: groups(&["admin"]),
            ..Default::default()
        };
        PolicySnapshot::build(&doc, &options).unwrap()
    }

    fn groups(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn select(db: &str, table: &str) -> RequiredPrivilege {
        RequiredPrivilege::new(
            format!("{db}.{table}"),
            Privilege::scope(
                ScopePath::server("server1").database(db).table(table),
                Action::Select,
            ),
        )
    }

    fn server_create() -> RequiredPrivilege {
        RequiredPrivilege::new(
            "server1",
            Privilege::scope(ScopePath::server("server1"), Action::Create),
        )
    }

    fn uri_select(location: &str) -> RequiredPrivilege {
        RequiredPrivilege::new(
            location,
            Privilege::uri("server1", UriScope::parse(location).unwrap(), Action::Select),
        )
    }

    // -------------------------------------------------------------------------
    // Combinator Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_database_all_allows_table_select() {
        let decision = PolicyEvaluator.evaluate(
            &snapshot(),
            &groups(&["g1"]),
            &PrivilegeRequest::all([select("db1", "t1")]),
        );
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_database_all_denies_server_create() {
        let decision = PolicyEvaluator.evaluate(
            &snapshot(),
            &groups(&["g1"]),
            &PrivilegeRequest::all([server_create()]),
        );
        let reason = decision.deny_reason().unwrap();
        assert_eq!(reason.code, "missing-privilege");
        assert_eq!(reason.object, "server1");
        assert_eq!(
            reason.nearest_grant.as_ref().map(ToString::to_string).as_deref(),
            Some("server=server1->db=db1->action=all")
        );
    }

    #[test]
    fn test_all_reports_first_failing_requirement() {
        let request = PrivilegeRequest::all([
            select("db1", "t1"),
            select("db3", "t1"),
            select("db4", "t1"),
        ]);
        let result = PolicyEvaluator.evaluate_with_audit(&snapshot(), &groups(&["g1"]), &request);
        assert_eq!(result.decision.deny_reason().unwrap().object, "db3.t1");
        assert_eq!(
            result.outcomes.iter().map(|o| o.satisfied).collect::<Vec<_>>(),
            vec![true, false, false]
        );
        assert!(!result.admin_bypass);
    }

    #[test]
    fn test_any_combinator() {
        let snapshot = snapshot();
        let g1 = groups(&["g1"]);

        let request = PrivilegeRequest::any([select("db3", "t1"), select("db1", "t1")]);
        assert!(PolicyEvaluator.evaluate(&snapshot, &g1, &request).is_allowed());

        let request = PrivilegeRequest::any([select("db3", "t1"), select("db4", "t1")]);
        let decision = PolicyEvaluator.evaluate(&snapshot, &g1, &request);
        assert_eq!(decision.deny_reason().unwrap().object, "db3.t1");
    }

    #[test]
    fn test_empty_requests() {
        let snapshot = snapshot();
        let nobody = groups(&[]);
        assert!(
            PolicyEvaluator
                .evaluate(&snapshot, &nobody, &PrivilegeRequest::all([]))
                .is_allowed()
        );
        let decision = PolicyEvaluator.evaluate(&snapshot, &nobody, &PrivilegeRequest::any([]));
        assert_eq!(decision.deny_reason().unwrap().code, "empty-request");
    }

    #[test]
    fn test_any_of_alternatives() {
        let requirement = RequiredPrivilege::any_of(
            "db2.t2",
            vec![
                Privilege::scope(ScopePath::server("server1"), Action::All),
                Privilege::scope(
                    ScopePath::server("server1").database("db2").table("t2"),
                    Action::Select,
                ),
            ],
        );
        let decision = PolicyEvaluator.evaluate(
            &snapshot(),
            &groups(&["g2"]),
            &PrivilegeRequest::all([requirement]),
        );
        assert!(decision.is_allowed());
    }

    // -------------------------------------------------------------------------
    // Admin and URI Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_admin_bypass() {
        let request = PrivilegeRequest::all([server_create(), select("db9", "t9")]);
        let result = PolicyEvaluator.evaluate_with_audit(&snapshot(), &groups(&["admin"]), &request);
        assert!(result.decision.is_allowed());
        assert!(result.admin_bypass);
        assert!(result.outcomes.is_empty());

        let result = PolicyEvaluator.evaluate_with_audit(
            &snapshot(),
            &groups(&["admin"]),
            &PrivilegeRequest::any([]),
        );
        assert!(result.decision.is_allowed());
    }

    #[test]
    fn test_uri_coverage() {
        let snapshot = snapshot();
        let g1 = groups(&["g1"]);
        let allowed = PrivilegeRequest::all([uri_select("file:///allowed/sub/file.dat")]);
        assert!(PolicyEvaluator.evaluate(&snapshot, &g1, &allowed).is_allowed());

        let restricted = PrivilegeRequest::all([uri_select("file:///restricted/file.dat")]);
        assert!(PolicyEvaluator.evaluate(&snapshot, &g1, &restricted).is_denied());
    }

    #[test]
    fn test_visibility_requirement() {
        let snapshot = snapshot();
        let db2 = RequiredPrivilege::visibility("db2", ScopePath::server("server1").database("db2"));
        let request = PrivilegeRequest::all([db2]);

        assert!(PolicyEvaluator.evaluate(&snapshot, &groups(&["g2"]), &request).is_allowed());
        let decision = PolicyEvaluator.evaluate(&snapshot, &groups(&["g1"]), &request);
        assert_eq!(decision.deny_reason().unwrap().code, "not-visible");
    }

    #[test]
    fn test_decision_serializes_with_tag() {
        let decision = PolicyEvaluator.evaluate(
            &snapshot(),
            &groups(&["g2"]),
            &PrivilegeRequest::all([select("db2", "t1")]),
        );
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["object"], "db2.t1");
        assert_eq!(
            json["required"][0],
            "server=server1->db=db2->table=t1->action=select"
        );
        assert_eq!(
            json["nearestGrant"],
            "server=server1->db=db2->table=t2->action=select"
        );

        let allow = serde_json::to_value(Decision::Allow).unwrap();
        assert_eq!(allow["decision"], "allow");
    }
}
