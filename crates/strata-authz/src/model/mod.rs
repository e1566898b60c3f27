//! Resource model: catalog scopes, locations, actions and privileges.

pub mod action;
pub mod privilege;
pub mod scope;
pub mod uri;

pub use action::{Action, ActionSet, UnknownAction};
pub use privilege::{Privilege, PrivilegeKind, PrivilegeParseError};
pub use scope::{ScopeLevel, ScopeName, ScopePath};
pub use uri::{UriError, UriScope};
