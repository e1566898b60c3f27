//! # strata-authz
//!
//! Authorization decision engine for a hierarchical data catalog.
//!
//! Resources are addressed as `server -> database -> table -> column`, plus
//! filesystem and object-store locations. Subjects belong to groups, groups
//! hold roles and roles hold privileges. Given a subject and the privileges
//! a statement requires, the engine answers ALLOW or DENY.
//!
//! ## Modules
//!
//! - [`model`] - Scopes, locations, actions and privileges
//! - [`policy`] - Snapshots, the snapshot store, matching, evaluation,
//!   metadata filtering and hot reload
//! - [`operation`] - Statement kinds and the privileges they require
//! - [`groups`] - Subject-to-group resolution
//! - [`authorizer`] - Async facade combining all of the above
//! - [`config`] - Engine configuration
//! - [`error`] - Error types
//!
//! ## Decisions are values
//!
//! A denial is [`Decision::Deny`], never an `Err`. Errors are reserved for
//! failures that prevent a decision: an unusable policy, an unreachable
//! policy source or a group directory that did not answer.

pub mod authorizer;
pub mod config;
pub mod error;
pub mod groups;
pub mod model;
pub mod operation;
pub mod policy;

pub use authorizer::Authorizer;
pub use config::{AuthzConfig, ConfigError};
pub use error::{
    AuthzError, ErrorCategory, GroupResolutionError, PolicyLoadError, PolicySourceError,
};
pub use groups::{GroupResolver, LocalGroupResolver, StaticGroupResolver};
pub use model::{Action, ActionSet, Privilege, PrivilegeKind, ScopeLevel, ScopeName, ScopePath, UriScope};
pub use operation::{
    AlterDatabaseChange, AlterTableChange, CatalogObject, DdlPolicy, MapperConfig, Operation,
    required_privileges,
};
pub use policy::{
    Combinator, Decision, DenyReason, EffectivePrivileges, EvaluationResult, PolicyDocument,
    PolicyEvaluator, PolicySnapshot, PolicySource, PolicyStore, PrivilegeRequest,
    RequiredPrivilege, Requirement, SnapshotOptions,
};

/// Type alias for authorization results.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use strata_authz::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthzResult;
    pub use crate::authorizer::Authorizer;
    pub use crate::config::{AuthzConfig, ConfigError};
    pub use crate::error::{
        AuthzError, ErrorCategory, GroupResolutionError, PolicyLoadError, PolicySourceError,
    };
    pub use crate::groups::{GroupResolver, LocalGroupResolver, StaticGroupResolver};
    pub use crate::model::{
        Action, ActionSet, Privilege, PrivilegeKind, ScopeLevel, ScopeName, ScopePath, UriScope,
    };
    pub use crate::operation::{
        AlterDatabaseChange, AlterTableChange, CatalogObject, DdlPolicy, MapperConfig, Operation,
        required_privileges,
    };
    pub use crate::policy::{
        Combinator, Decision, DenyReason, EffectivePrivileges, EvaluationResult, PolicyChange,
        PolicyChangeNotifier, PolicyDocument, PolicyEvaluator, PolicyReloadService, PolicySnapshot,
        PolicySource, PolicyStore, PrivilegeRequest, ReloadConfig, RequiredPrivilege, Requirement,
        SnapshotOptions, StaticPolicySource,
    };
}
