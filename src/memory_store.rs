use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use async_trait::async_trait;
use crate::attribute::{AttributeProvider, AttributeValue};
use crate::conditional::ConditionalPermission;
use crate::error::StoreError;
use crate::permission::{Permission, PermissionName};
use crate::role::{Role, UserRole};
use crate::store::{GrantStore, PermissionStore, RoleStore};
use crate::temporal::TimeBasedPermission;
use crate::types::{
    GrantId, OrganizationId, PermissionId, ResourceId, ResourceType, RoleId, UserId, WorkspaceId,
};

type EnvironmentKey = (Option<OrganizationId>, Option<WorkspaceId>, String);

/// In-memory store implementation for tests and demos.
///
/// Implements every store trait and [`AttributeProvider`]; clones share data.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    roles: RwLock<HashMap<RoleId, Role>>,
    user_roles: RwLock<HashMap<UserId, HashSet<UserRole>>>,
    permissions: RwLock<HashMap<PermissionName, Permission>>,
    role_permissions: RwLock<HashMap<RoleId, HashSet<PermissionId>>>,
    conditional: RwLock<HashMap<(UserId, PermissionId), Vec<ConditionalPermission>>>,
    temporal: RwLock<HashMap<(UserId, PermissionId), Vec<TimeBasedPermission>>>,
    resource_attributes: RwLock<HashMap<(ResourceType, ResourceId, String), AttributeValue>>,
    user_attributes: RwLock<HashMap<(UserId, String), AttributeValue>>,
    environment_attributes: RwLock<HashMap<EnvironmentKey, AttributeValue>>,
}

fn read<T>(lock: &RwLock<T>) -> std::result::Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read().map_err(|_| StoreError::from("memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a role.
    pub fn add_role(&self, role: Role) {
        write(&self.inner.roles).insert(role.id.clone(), role);
    }

    /// Assigns a role to a user.
    pub fn assign_role(&self, assignment: UserRole) {
        write(&self.inner.user_roles)
            .entry(assignment.user.clone())
            .or_default()
            .insert(assignment);
    }

    /// Removes a role assignment.
    pub fn revoke_role(&self, assignment: &UserRole) {
        if let Some(assignments) = write(&self.inner.user_roles).get_mut(&assignment.user) {
            assignments.remove(assignment);
        }
    }

    /// Inserts or replaces a catalog permission.
    pub fn add_permission(&self, permission: Permission) {
        write(&self.inner.permissions).insert(permission.name.clone(), permission);
    }

    /// Grants a permission to a role unconditionally.
    pub fn add_role_permission(&self, role: RoleId, permission: PermissionId) {
        write(&self.inner.role_permissions)
            .entry(role)
            .or_default()
            .insert(permission);
    }

    /// Adds a conditional grant.
    pub fn add_conditional_permission(&self, grant: ConditionalPermission) {
        write(&self.inner.conditional)
            .entry((grant.user.clone(), grant.permission.clone()))
            .or_default()
            .push(grant);
    }

    /// Adds a time-based grant.
    pub fn add_time_based_permission(&self, grant: TimeBasedPermission) {
        write(&self.inner.temporal)
            .entry((grant.user.clone(), grant.permission.clone()))
            .or_default()
            .push(grant);
    }

    /// Soft-activates or deactivates a conditional or time-based grant.
    ///
    /// Returns whether a grant with that id exists.
    pub fn set_grant_active(&self, grant: &GrantId, is_active: bool) -> bool {
        let mut found = false;
        for row in write(&self.inner.conditional)
            .values_mut()
            .flatten()
            .filter(|row| &row.id == grant)
        {
            row.is_active = is_active;
            found = true;
        }
        for row in write(&self.inner.temporal)
            .values_mut()
            .flatten()
            .filter(|row| &row.id == grant)
        {
            row.is_active = is_active;
            found = true;
        }
        found
    }

    /// Sets an attribute of a resource instance.
    pub fn set_resource_attribute(
        &self,
        resource_type: ResourceType,
        resource_id: ResourceId,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) {
        write(&self.inner.resource_attributes)
            .insert((resource_type, resource_id, key.into()), value.into());
    }

    /// Sets an attribute of a user.
    pub fn set_user_attribute(
        &self,
        user: UserId,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) {
        write(&self.inner.user_attributes).insert((user, key.into()), value.into());
    }

    /// Sets an environment attribute, optionally narrowed to an organization or workspace.
    pub fn set_environment_attribute(
        &self,
        key: impl Into<String>,
        organization: Option<OrganizationId>,
        workspace: Option<WorkspaceId>,
        value: impl Into<AttributeValue>,
    ) {
        write(&self.inner.environment_attributes)
            .insert((organization, workspace, key.into()), value.into());
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn user_roles(&self, user: &UserId) -> std::result::Result<Vec<UserRole>, StoreError> {
        let guard = read(&self.inner.user_roles)?;
        Ok(guard
            .get(user)
            .map(|assignments| assignments.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn role(&self, role: &RoleId) -> std::result::Result<Option<Role>, StoreError> {
        let guard = read(&self.inner.roles)?;
        Ok(guard.get(role).cloned())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn permission_by_name(
        &self,
        name: &PermissionName,
    ) -> std::result::Result<Option<Permission>, StoreError> {
        let guard = read(&self.inner.permissions)?;
        Ok(guard.get(name).cloned())
    }

    async fn role_permissions(
        &self,
        role: &RoleId,
    ) -> std::result::Result<Vec<PermissionId>, StoreError> {
        let guard = read(&self.inner.role_permissions)?;
        Ok(guard
            .get(role)
            .map(|perms| perms.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn conditional_permissions(
        &self,
        user: &UserId,
        permission: &PermissionId,
    ) -> std::result::Result<Vec<ConditionalPermission>, StoreError> {
        let guard = read(&self.inner.conditional)?;
        Ok(guard
            .get(&(user.clone(), permission.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn time_based_permissions(
        &self,
        user: &UserId,
        permission: &PermissionId,
    ) -> std::result::Result<Vec<TimeBasedPermission>, StoreError> {
        let guard = read(&self.inner.temporal)?;
        Ok(guard
            .get(&(user.clone(), permission.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl AttributeProvider for MemoryStore {
    async fn resource_attribute(
        &self,
        resource_type: &ResourceType,
        resource_id: &ResourceId,
        key: &str,
    ) -> std::result::Result<Option<AttributeValue>, StoreError> {
        let guard = read(&self.inner.resource_attributes)?;
        Ok(guard
            .get(&(resource_type.clone(), resource_id.clone(), key.to_string()))
            .cloned())
    }

    async fn user_attribute(
        &self,
        user: &UserId,
        key: &str,
    ) -> std::result::Result<Option<AttributeValue>, StoreError> {
        let guard = read(&self.inner.user_attributes)?;
        Ok(guard.get(&(user.clone(), key.to_string())).cloned())
    }

    async fn environment_attribute(
        &self,
        key: &str,
        organization: Option<&OrganizationId>,
        workspace: Option<&WorkspaceId>,
    ) -> std::result::Result<Option<AttributeValue>, StoreError> {
        let guard = read(&self.inner.environment_attributes)?;
        // Most specific entry wins: workspace, then organization, then global.
        let candidates = [
            (organization.cloned(), workspace.cloned()),
            (organization.cloned(), None),
            (None, None),
        ];
        Ok(candidates
            .into_iter()
            .find_map(|(organization, workspace)| {
                guard.get(&(organization, workspace, key.to_string())).cloned()
            }))
    }
}
