use crate::error::{Error, Result};
use crate::types::{OrganizationId, RoleId, UserId, WorkspaceId};

/// Inheritance and ordering attributes of a custom role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CustomRole {
    /// Single parent this role inherits from.
    pub parent: Option<RoleId>,
    /// Higher priority wins tie-breaks.
    pub priority: i32,
    /// Revision counter maintained by the role administrator.
    pub version: u32,
    /// Template this role was instantiated from.
    pub template: Option<RoleId>,
    /// Whether this role is itself a template.
    pub is_template: bool,
}

/// Role scope tag.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RoleScope {
    /// Built-in role, never inherits.
    System,
    /// Administrator-defined role.
    Custom(CustomRole),
}

/// Role catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Role {
    /// Role identifier.
    pub id: RoleId,
    /// Display name.
    pub name: String,
    /// System or custom.
    pub scope: RoleScope,
    /// Owning organization, if any.
    pub organization: Option<OrganizationId>,
}

impl Role {
    /// Creates a system role.
    pub fn system(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            scope: RoleScope::System,
            organization: None,
        }
    }

    /// Creates a custom role.
    pub fn custom(id: RoleId, name: impl Into<String>, custom: CustomRole) -> Self {
        Self {
            id,
            name: name.into(),
            scope: RoleScope::Custom(custom),
            organization: None,
        }
    }

    /// Sets the owning organization.
    pub fn with_organization(mut self, organization: OrganizationId) -> Self {
        self.organization = Some(organization);
        self
    }

    /// Returns custom attributes for custom roles.
    pub fn as_custom(&self) -> Option<&CustomRole> {
        match &self.scope {
            RoleScope::System => None,
            RoleScope::Custom(custom) => Some(custom),
        }
    }

    /// Returns the parent role. System roles never have one.
    pub fn parent(&self) -> Option<&RoleId> {
        self.as_custom().and_then(|custom| custom.parent.as_ref())
    }

    /// Returns the role's own priority. System roles rank at zero.
    pub fn priority(&self) -> i32 {
        self.as_custom().map_or(0, |custom| custom.priority)
    }

    /// Returns whether the role is a template.
    pub fn is_template(&self) -> bool {
        self.as_custom().is_some_and(|custom| custom.is_template)
    }

    /// Instantiates a new custom role copying this template's shape.
    ///
    /// The new role keeps the template's parent and priority, starts at
    /// version 1 and records the template it came from.
    pub fn instantiate(&self, id: RoleId, name: impl Into<String>) -> Result<Role> {
        let Some(template) = self.as_custom().filter(|custom| custom.is_template) else {
            return Err(Error::NotATemplate {
                role: self.id.clone(),
            });
        };
        Ok(Role {
            id,
            name: name.into(),
            scope: RoleScope::Custom(CustomRole {
                parent: template.parent.clone(),
                priority: template.priority,
                version: 1,
                template: Some(self.id.clone()),
                is_template: false,
            }),
            organization: self.organization.clone(),
        })
    }
}

/// Assignment of a role to a user, optionally limited to a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserRole {
    /// Assigned user.
    pub user: UserId,
    /// Assigned role.
    pub role: RoleId,
    /// Workspace the assignment is limited to; `None` applies everywhere.
    pub workspace: Option<WorkspaceId>,
}

impl UserRole {
    /// Creates an unscoped assignment.
    pub fn global(user: UserId, role: RoleId) -> Self {
        Self {
            user,
            role,
            workspace: None,
        }
    }

    /// Creates a workspace-scoped assignment.
    pub fn in_workspace(user: UserId, role: RoleId, workspace: WorkspaceId) -> Self {
        Self {
            user,
            role,
            workspace: Some(workspace),
        }
    }

    /// Returns whether the assignment applies in the requested workspace.
    pub fn applies_to(&self, workspace: Option<&WorkspaceId>) -> bool {
        match &self.workspace {
            None => true,
            Some(scoped) => workspace == Some(scoped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role_id(value: &str) -> RoleId {
        RoleId::try_from(value).unwrap()
    }

    #[test]
    fn system_role_should_have_no_parent() {
        let role = Role::system(role_id("admin"), "Admin");
        assert!(role.parent().is_none());
        assert_eq!(role.priority(), 0);
    }

    #[test]
    fn instantiate_should_copy_template_shape() {
        let template = Role::custom(
            role_id("tpl_editor"),
            "Editor template",
            CustomRole {
                parent: Some(role_id("viewer")),
                priority: 40,
                version: 7,
                template: None,
                is_template: true,
            },
        );

        let role = template
            .instantiate(role_id("editor_eu"), "Editor EU")
            .unwrap();

        assert_eq!(role.parent(), Some(&role_id("viewer")));
        assert_eq!(role.priority(), 40);
        assert!(!role.is_template());
        let custom = role.as_custom().unwrap();
        assert_eq!(custom.version, 1);
        assert_eq!(custom.template, Some(role_id("tpl_editor")));
    }

    #[test]
    fn instantiate_should_reject_non_template() {
        let role = Role::custom(role_id("editor"), "Editor", CustomRole::default());
        let result = role.instantiate(role_id("copy"), "Copy");
        assert!(matches!(result, Err(Error::NotATemplate { .. })));
    }

    #[test]
    fn workspace_assignment_should_only_apply_in_its_workspace() {
        let user = UserId::try_from("user_1").unwrap();
        let ws = WorkspaceId::try_from("ws_1").unwrap();
        let other = WorkspaceId::try_from("ws_2").unwrap();
        let scoped = UserRole::in_workspace(user.clone(), role_id("editor"), ws.clone());
        let global = UserRole::global(user, role_id("viewer"));

        assert!(scoped.applies_to(Some(&ws)));
        assert!(!scoped.applies_to(Some(&other)));
        assert!(!scoped.applies_to(None));
        assert!(global.applies_to(None));
        assert!(global.applies_to(Some(&other)));
    }
}
