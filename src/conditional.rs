use crate::attribute::{AttributeContext, AttributeProvider};
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::resource::Resource;
use crate::store::GrantStore;
use crate::types::{GrantId, PermissionId, ResourceId, ResourceType, UserId};
use tracing::{debug, warn};

/// Standing attribute-gated grant of a permission to a user.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionalPermission {
    /// Grant identifier.
    pub id: GrantId,
    /// Grantee.
    pub user: UserId,
    /// Granted permission.
    pub permission: PermissionId,
    /// Resource type the grant is narrowed to.
    pub resource_type: Option<ResourceType>,
    /// Resource instance the grant is narrowed to.
    pub resource_id: Option<ResourceId>,
    /// Condition that must hold for the grant to apply.
    pub expression: Expression,
    /// Soft-deactivation flag.
    pub is_active: bool,
    /// Free-form description.
    pub description: Option<String>,
    /// Who created the grant.
    pub created_by: Option<UserId>,
}

impl ConditionalPermission {
    /// Creates an active, global grant.
    pub fn new(id: GrantId, user: UserId, permission: PermissionId, expression: Expression) -> Self {
        Self {
            id,
            user,
            permission,
            resource_type: None,
            resource_id: None,
            expression,
            is_active: true,
            description: None,
            created_by: None,
        }
    }

    /// Narrows the grant to one resource.
    pub fn for_resource(mut self, resource_type: ResourceType, resource_id: ResourceId) -> Self {
        self.resource_type = Some(resource_type);
        self.resource_id = Some(resource_id);
        self
    }

    /// Sets the active flag.
    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    fn applies_to(&self, resource: &Resource) -> bool {
        self.is_active && resource.admits(self.resource_type.as_ref(), self.resource_id.as_ref())
    }
}

/// Evaluates attribute-gated grants.
pub(crate) async fn evaluate<S, P>(
    store: &S,
    provider: &P,
    user: &UserId,
    permission: &PermissionId,
    resource: &Resource,
    context: &mut AttributeContext<'_>,
) -> Result<Option<GrantId>>
where
    S: GrantStore + Sync + ?Sized,
    P: AttributeProvider + ?Sized,
{
    let rows = store
        .conditional_permissions(user, permission)
        .await
        .map_err(Error::from)?;

    let mut candidates = Vec::new();
    for row in rows.iter().filter(|row| row.applies_to(resource)) {
        match row.expression.validate() {
            Ok(()) => candidates.push(row),
            Err(error) => {
                warn!(grant = %row.id, error = %error, "skipping conditional grant");
            }
        }
    }
    if candidates.is_empty() {
        return Ok(None);
    }

    context
        .load(
            provider,
            candidates.iter().flat_map(|row| row.expression.attributes()),
        )
        .await;

    let mut granted = None;
    for row in candidates {
        match row.expression.try_evaluate(&*context) {
            Ok(true) => {
                granted = Some(row.id.clone());
                break;
            }
            Ok(false) => {}
            Err(attribute) => return Err(context.lookup_error(attribute)),
        }
    }
    debug!(user = %user, permission = %permission, granted = ?granted, "evaluated conditional grants");
    Ok(granted)
}
