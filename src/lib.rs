//! Authorization decision engine combining role, attribute and time-based grants.
//!
//! A decision answers whether a user may exercise a permission
//! (`resource_type:action`) on a resource at an instant. Three grant sources are
//! consulted in order and unioned: roles (with single-parent inheritance),
//! attribute-gated [`ConditionalPermission`]s and time-windowed
//! [`TimeBasedPermission`]s. The model is additive and deny-by-default; any
//! internal error denies. Data comes from collaborator traits ([`Store`],
//! [`AttributeProvider`]); the engine never writes.
//!
//! # Examples
//!
//! Deciding a request against the in-memory store (enable `memory-store`):
//! ```no_run
//! use rs_grant::{DecisionRequest, EngineBuilder, PermissionName, UserId};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use rs_grant::MemoryStore;
//! let store = MemoryStore::new();
//! let engine = EngineBuilder::new(store.clone(), store).build();
//! let user = UserId::try_from("user_1").unwrap();
//! let permission = PermissionName::try_from("flows:read").unwrap();
//! let _ = engine.decide(&DecisionRequest::new(user, permission));
//! # }
//! ```
//!
//! Building a condition for a conditional grant:
//! ```
//! use rs_grant::{AttributeRef, Expression};
//! let rule = Expression::all([
//!     Expression::eq(AttributeRef::user("region"), "EU"),
//!     Expression::neq(AttributeRef::environment("maintenance"), true),
//! ]);
//! assert!(rule.validate().is_ok());
//! ```
#![forbid(unsafe_code)]

mod attribute;
mod conditional;
mod engine;
mod error;
mod expression;
mod hierarchy;
mod permission;
mod resource;
mod role;
mod store;
mod temporal;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

pub use crate::attribute::{
    AttributeContext, AttributeKind, AttributeProvider, AttributeRef, AttributeSource,
    AttributeValue,
};
pub use crate::conditional::ConditionalPermission;
pub use crate::engine::{
    Decision, DecisionReason, DecisionRequest, Engine, EngineBuilder, GrantPath,
};
pub use crate::error::{Error, FailureKind, Result, StoreError};
pub use crate::expression::{ComparisonOperator, Expression, LogicalOperator};
pub use crate::hierarchy::{ResolvedRole, RoleHierarchy};
pub use crate::permission::{
    DefaultPermissionValidator, Permission, PermissionName, PermissionValidator, ScopeLevel,
};
pub use crate::resource::Resource;
pub use crate::role::{CustomRole, Role, RoleScope, UserRole};
pub use crate::store::{GrantStore, PermissionStore, RoleStore, Store};
pub use crate::temporal::{Schedule, TimeBasedPermission, TimeGrantKind};
pub use crate::types::{
    GrantId, OrganizationId, PermissionId, ResourceId, ResourceType, RoleId, UserId, WorkspaceId,
};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
