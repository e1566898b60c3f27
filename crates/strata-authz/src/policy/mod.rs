//! Policy snapshots and the decision engine.
//!
//! - [`document`] - Raw, unvalidated policy entries
//! - [`snapshot`] - Validated, immutable policy view
//! - [`store`] - Atomically published current snapshot
//! - [`source`] - Where documents come from
//! - [`matcher`] - Grant-versus-requirement matching
//! - [`engine`] - Requests, decisions and the evaluator
//! - [`filter`] - Metadata visibility filtering
//! - [`reload`] - Hot reload with debouncing and retry
//!
//! # Snapshots
//!
//! A [`PolicySnapshot`] is built from a [`PolicyDocument`] in one pass and
//! never changes afterwards. Any invalid entry fails the whole build:
//!
//! ```
//! use strata_authz::policy::{PolicyDocument, PolicySnapshot, SnapshotOptions};
//!
//! let doc = PolicyDocument::new().add_roles_to_group("g1", ["missing_role"]);
//! assert!(PolicySnapshot::build(&doc, &SnapshotOptions::default()).is_err());
//! ```
//!
//! # Publishing
//!
//! ```ignore
//! use strata_authz::policy::{PolicyStore, StaticPolicySource};
//!
//! let store = PolicyStore::new(config.snapshot_options());
//! store.reload_from(&StaticPolicySource::new(document)).await?;
//! let snapshot = store.current();
//! ```

pub mod document;
pub mod engine;
pub mod filter;
pub mod matcher;
pub mod reload;
pub mod snapshot;
pub mod source;
pub mod store;

pub use document::PolicyDocument;

pub use engine::{
    Combinator, Decision, DenyReason, EvaluationResult, PolicyEvaluator, PrivilegeRequest,
    RequiredPrivilege, Requirement, RequirementOutcome,
};

pub use filter::{filter_visible, is_visible, retain_visible};

pub use matcher::{matches, nearest_grant, reveals};

pub use reload::{
    PolicyChange, PolicyChangeNotifier, PolicyReloadService, ReloadConfig, ReloadStats,
};

pub use snapshot::{EffectivePrivileges, Group, PolicySnapshot, Role, SnapshotOptions, SnapshotStats};

pub use source::{PolicySource, StaticPolicySource};

pub use store::{PolicyStore, StoreStats};
