use crate::error::{Error, Result};
use crate::role::Role;
use crate::store::RoleStore;
use crate::types::{RoleId, UserId, WorkspaceId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Role in a user's effective role set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRole {
    /// The role row.
    pub role: Role,
    /// Priority taken from the role's own definition.
    pub priority: i32,
}

/// Expands role assignments into the transitive closure of inherited roles.
#[derive(Debug)]
pub struct RoleHierarchy<'a, S: ?Sized> {
    store: &'a S,
    max_inherit_depth: usize,
}

impl<'a, S> RoleHierarchy<'a, S>
where
    S: RoleStore + Sync + ?Sized,
{
    /// Creates a resolver reading from `store`.
    pub fn new(store: &'a S, max_inherit_depth: usize) -> Self {
        Self {
            store,
            max_inherit_depth,
        }
    }

    /// Resolves the effective role set of `user` in `workspace`.
    ///
    /// Unscoped assignments always apply; workspace-scoped ones only in their
    /// workspace. The result holds each role once, highest priority first,
    /// ties ordered by role id.
    pub async fn resolve(
        &self,
        user: &UserId,
        workspace: Option<&WorkspaceId>,
    ) -> Result<Vec<ResolvedRole>> {
        let assignments = self.store.user_roles(user).await.map_err(Error::from)?;

        let mut collected = HashMap::new();
        for assignment in assignments
            .iter()
            .filter(|assignment| &assignment.user == user && assignment.applies_to(workspace))
        {
            if collected.contains_key(&assignment.role) {
                continue;
            }
            self.walk(assignment.role.clone(), &mut collected).await?;
        }

        let mut roles: Vec<ResolvedRole> = collected.into_values().collect();
        roles.sort_by(|left, right| {
            right
                .priority
                .cmp(&left.priority)
                .then_with(|| left.role.id.cmp(&right.role.id))
        });
        debug!(user = %user, roles = roles.len(), "resolved effective roles");
        Ok(roles)
    }

    async fn walk(
        &self,
        start: RoleId,
        collected: &mut HashMap<RoleId, ResolvedRole>,
    ) -> Result<()> {
        let mut path = HashSet::new();
        let mut current = Some(start);
        let mut depth = 0;

        while let Some(role_id) = current.take() {
            if !path.insert(role_id.clone()) {
                return Err(Error::RoleHierarchyCycle { role: role_id });
            }
            // Ancestors of an already collected role were collected with it.
            if collected.contains_key(&role_id) {
                break;
            }
            if depth > self.max_inherit_depth {
                return Err(Error::RoleDepthExceeded {
                    role: role_id,
                    max_depth: self.max_inherit_depth,
                });
            }

            let Some(role) = self.store.role(&role_id).await.map_err(Error::from)? else {
                warn!(role = %role_id, "role referenced by assignment or parent is missing");
                break;
            };
            current = role.parent().cloned();
            collected.insert(
                role_id,
                ResolvedRole {
                    priority: role.priority(),
                    role,
                },
            );
            depth += 1;
        }

        Ok(())
    }
}
