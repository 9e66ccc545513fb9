use crate::permission::ScopeLevel;
use crate::types::{ResourceId, ResourceType};

/// Resource a decision is requested for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resource {
    /// Type of the resource, if the request names one.
    pub resource_type: Option<ResourceType>,
    /// Instance identifier, if the request names one.
    pub resource_id: Option<ResourceId>,
    /// Scope level the request is made at.
    pub scope: ScopeLevel,
}

impl Resource {
    /// Request not tied to a resource, at system scope.
    pub fn any() -> Self {
        Self::default()
    }

    /// Request for one resource instance.
    pub fn instance(resource_type: ResourceType, resource_id: ResourceId) -> Self {
        Self {
            resource_type: Some(resource_type),
            resource_id: Some(resource_id),
            scope: ScopeLevel::System,
        }
    }

    /// Returns whether a grant narrowed to (`resource_type`, `resource_id`) applies.
    ///
    /// Unset grant fields match anything; set fields must equal the request.
    pub(crate) fn admits(
        &self,
        resource_type: Option<&ResourceType>,
        resource_id: Option<&ResourceId>,
    ) -> bool {
        let type_matches =
            resource_type.is_none_or(|granted| self.resource_type.as_ref() == Some(granted));
        let id_matches =
            resource_id.is_none_or(|granted| self.resource_id.as_ref() == Some(granted));
        type_matches && id_matches
    }
}
