use crate::conditional::ConditionalPermission;
use crate::error::StoreError;
use crate::permission::{Permission, PermissionName};
use crate::role::{Role, UserRole};
use crate::temporal::TimeBasedPermission;
use crate::types::{PermissionId, RoleId, UserId};
use async_trait::async_trait;

/// Store interface for roles and role assignments.
#[async_trait]
pub trait RoleStore {
    /// Returns every role assignment of a user, workspace-scoped or not.
    async fn user_roles(&self, user: &UserId) -> std::result::Result<Vec<UserRole>, StoreError>;

    /// Returns a role by id.
    async fn role(&self, role: &RoleId) -> std::result::Result<Option<Role>, StoreError>;
}

/// Store interface for the permission catalog.
#[async_trait]
pub trait PermissionStore {
    /// Resolves a permission by canonical name.
    async fn permission_by_name(
        &self,
        name: &PermissionName,
    ) -> std::result::Result<Option<Permission>, StoreError>;

    /// Returns permissions granted unconditionally to a role.
    async fn role_permissions(
        &self,
        role: &RoleId,
    ) -> std::result::Result<Vec<PermissionId>, StoreError>;
}

/// Store interface for standing conditional and time-based grants.
#[async_trait]
pub trait GrantStore {
    /// Returns conditional grants of a permission to a user, active or not.
    async fn conditional_permissions(
        &self,
        user: &UserId,
        permission: &PermissionId,
    ) -> std::result::Result<Vec<ConditionalPermission>, StoreError>;

    /// Returns time-based grants of a permission to a user, active or not.
    async fn time_based_permissions(
        &self,
        user: &UserId,
        permission: &PermissionId,
    ) -> std::result::Result<Vec<TimeBasedPermission>, StoreError>;
}

/// Composite store trait.
pub trait Store: RoleStore + PermissionStore + GrantStore + Send + Sync {}

impl<T> Store for T where T: RoleStore + PermissionStore + GrantStore + Send + Sync {}
