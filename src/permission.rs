use crate::error::{Error, Result};
use crate::types::{PermissionId, ResourceType};
use std::borrow::Borrow;
use std::fmt;

/// Canonical permission name (`resource_type:action`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PermissionName(String);

impl PermissionName {
    /// Parses and validates a permission name using the default validator.
    ///
    /// This trims whitespace and normalizes to lowercase.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        Self::new_with(value, &DefaultPermissionValidator)
    }

    /// Parses and validates a permission name with a custom validator.
    ///
    /// The value is trimmed and lowercased before validation so that lookups
    /// against the catalog are case-insensitive.
    pub fn new_with(value: impl AsRef<str>, validator: &dyn PermissionValidator) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPermission(
                "permission must not be empty".to_string(),
            ));
        }
        let normalized = trimmed.to_ascii_lowercase();
        validator.validate(&normalized)?;
        Ok(Self(normalized))
    }

    /// Builds a permission name from its resource type and action.
    pub fn from_parts(resource_type: &ResourceType, action: impl AsRef<str>) -> Result<Self> {
        Self::new(format!("{}:{}", resource_type.as_str(), action.as_ref()))
    }

    /// Creates a permission name from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the resource type half of the name.
    pub fn resource_type(&self) -> &str {
        split_permission(&self.0).map_or("", |(resource, _)| resource)
    }

    /// Returns the action half of the name.
    pub fn action(&self) -> &str {
        split_permission(&self.0).map_or("", |(_, action)| action)
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PermissionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PermissionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for PermissionName {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<String> for PermissionName {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

/// Permission validator interface for custom rules.
pub trait PermissionValidator: Send + Sync {
    /// Validates a normalized permission string.
    fn validate(&self, value: &str) -> Result<()>;
}

/// Default strict permission validator.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPermissionValidator;

impl PermissionValidator for DefaultPermissionValidator {
    fn validate(&self, value: &str) -> Result<()> {
        let (resource, action) = split_permission(value).ok_or_else(|| {
            Error::InvalidPermission("permission must be in resource:action format".to_string())
        })?;
        if resource.is_empty() || action.is_empty() {
            return Err(Error::InvalidPermission(
                "permission must not have empty segments".to_string(),
            ));
        }
        for segment in resource.split(':') {
            if !is_valid_segment(segment) {
                return Err(Error::InvalidPermission(
                    "resource segment contains invalid characters".to_string(),
                ));
            }
        }
        if !is_valid_segment(action) {
            return Err(Error::InvalidPermission(
                "action segment contains invalid characters".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|ch| matches!(ch, 'a'..='z' | '0'..='9' | '_' | '-'))
}

fn split_permission(value: &str) -> Option<(&str, &str)> {
    value.rsplit_once(':')
}

/// Specificity of a permission, ordered `System < Organization < Workspace < Resource`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScopeLevel {
    /// Applies across the whole installation.
    #[default]
    System,
    /// Applies within one organization.
    Organization,
    /// Applies within one workspace.
    Workspace,
    /// Applies to a single resource.
    Resource,
}

/// Permission catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permission {
    /// Catalog identifier.
    pub id: PermissionId,
    /// Canonical `resource_type:action` name, unique in the catalog.
    pub name: PermissionName,
    /// Scope level the permission applies at.
    pub scope: ScopeLevel,
}

impl Permission {
    /// Creates a catalog row, deriving the canonical name from its parts.
    pub fn new(
        id: PermissionId,
        resource_type: &ResourceType,
        action: impl AsRef<str>,
        scope: ScopeLevel,
    ) -> Result<Self> {
        Ok(Self {
            id,
            name: PermissionName::from_parts(resource_type, action)?,
            scope,
        })
    }

    /// Returns the resource type the permission governs.
    pub fn resource_type(&self) -> &str {
        self.name.resource_type()
    }

    /// Returns the action the permission governs.
    pub fn action(&self) -> &str {
        self.name.action()
    }

    /// Returns whether a grant of this permission covers a request at `requested` scope.
    pub fn covers_scope(&self, requested: ScopeLevel) -> bool {
        self.scope >= requested
    }
}
