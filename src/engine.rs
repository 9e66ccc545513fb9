use crate::attribute::{AttributeContext, AttributeProvider};
use crate::conditional;
use crate::error::{Error, FailureKind, Result};
use crate::hierarchy::{ResolvedRole, RoleHierarchy};
use crate::permission::{Permission, PermissionName, ScopeLevel};
use crate::resource::Resource;
use crate::store::Store;
use crate::temporal;
use crate::types::{
    GrantId, OrganizationId, PermissionId, ResourceId, ResourceType, RoleId, UserId, WorkspaceId,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{debug, instrument, warn};

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DecisionReason {
    /// A role in the effective role set grants the permission.
    RoleGrant,
    /// A conditional grant's expression holds.
    ConditionalGrant,
    /// A time-based grant is in its window.
    TemporalGrant,
    /// Nothing grants the permission.
    NoGrant,
    /// Evaluation failed; access is denied.
    Failure(FailureKind),
}

impl DecisionReason {
    /// Returns the stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleGrant => "role_grant",
            Self::ConditionalGrant => "conditional_grant",
            Self::TemporalGrant => "temporal_grant",
            Self::NoGrant => "no_grant",
            Self::Failure(kind) => kind.as_str(),
        }
    }
}

/// The grant that satisfied an allowed decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GrantPath {
    /// Highest-priority role granting the permission.
    Role(RoleId),
    /// Conditional grant row.
    Conditional(GrantId),
    /// Time-based grant row.
    Temporal(GrantId),
}

/// Authorization decision.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    /// Whether access is granted.
    pub allowed: bool,
    /// Rationale.
    pub reason: DecisionReason,
    /// Satisfying grant for allowed decisions.
    pub grant: Option<GrantPath>,
}

impl Decision {
    /// Allowed decision via `grant`.
    pub fn allow(grant: GrantPath) -> Self {
        let reason = match grant {
            GrantPath::Role(_) => DecisionReason::RoleGrant,
            GrantPath::Conditional(_) => DecisionReason::ConditionalGrant,
            GrantPath::Temporal(_) => DecisionReason::TemporalGrant,
        };
        Self {
            allowed: true,
            reason,
            grant: Some(grant),
        }
    }

    /// Denied decision, nothing grants.
    pub fn deny() -> Self {
        Self {
            allowed: false,
            reason: DecisionReason::NoGrant,
            grant: None,
        }
    }

    /// Denied decision caused by `error`.
    pub fn failed(error: &Error) -> Self {
        Self {
            allowed: false,
            reason: DecisionReason::Failure(error.failure_kind()),
            grant: None,
        }
    }
}

/// Decision query.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecisionRequest {
    /// Requesting user.
    pub user: UserId,
    /// Requested permission.
    pub permission: PermissionName,
    /// Resource the permission is exercised on.
    pub resource: Resource,
    /// Active organization.
    pub organization: Option<OrganizationId>,
    /// Active workspace; selects workspace-scoped role assignments.
    pub workspace: Option<WorkspaceId>,
    /// Evaluation instant for time-based grants.
    pub at: DateTime<Utc>,
}

impl DecisionRequest {
    /// Creates a request evaluated now, not tied to a resource.
    pub fn new(user: UserId, permission: PermissionName) -> Self {
        Self {
            user,
            permission,
            resource: Resource::any(),
            organization: None,
            workspace: None,
            at: Utc::now(),
        }
    }

    /// Creates a request from a resource type and action.
    pub fn for_action(
        user: UserId,
        resource_type: ResourceType,
        action: impl AsRef<str>,
    ) -> Result<Self> {
        let permission = PermissionName::from_parts(&resource_type, action)?;
        Ok(Self::new(user, permission).with_resource(Resource {
            resource_type: Some(resource_type),
            ..Resource::any()
        }))
    }

    /// Targets one resource instance, keeping the requested scope level.
    pub fn resource(mut self, resource_type: ResourceType, resource_id: ResourceId) -> Self {
        self.resource.resource_type = Some(resource_type);
        self.resource.resource_id = Some(resource_id);
        self
    }

    /// Replaces the resource descriptor.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = resource;
        self
    }

    /// Sets the scope level the request is made at.
    pub fn scope(mut self, scope: ScopeLevel) -> Self {
        self.resource.scope = scope;
        self
    }

    /// Sets the active organization.
    pub fn organization(mut self, organization: OrganizationId) -> Self {
        self.organization = Some(organization);
        self
    }

    /// Sets the active workspace.
    pub fn workspace(mut self, workspace: WorkspaceId) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Sets the evaluation instant.
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// Decision engine over a grant store and an attribute provider.
#[derive(Debug)]
pub struct Engine<S, A> {
    store: S,
    attributes: A,
    max_inherit_depth: usize,
    eager_evaluation: bool,
}

/// Builder for [`Engine`].
pub struct EngineBuilder<S, A> {
    store: S,
    attributes: A,
    max_inherit_depth: usize,
    eager_evaluation: bool,
}

impl<S, A> EngineBuilder<S, A> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S, attributes: A) -> Self {
        Self {
            store,
            attributes,
            max_inherit_depth: 16,
            eager_evaluation: false,
        }
    }

    /// Sets maximum inheritance depth.
    pub fn max_inherit_depth(mut self, depth: usize) -> Self {
        self.max_inherit_depth = depth;
        self
    }

    /// Evaluates role, conditional and time-based grants concurrently.
    ///
    /// The outcome is the same as sequential evaluation: sources are still
    /// consulted in order and a later source's failure is ignored once an
    /// earlier source grants.
    pub fn eager_evaluation(mut self, on: bool) -> Self {
        self.eager_evaluation = on;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Engine<S, A> {
        Engine {
            store: self.store,
            attributes: self.attributes,
            max_inherit_depth: self.max_inherit_depth,
            eager_evaluation: self.eager_evaluation,
        }
    }
}

impl<S, A> Engine<S, A>
where
    S: Store,
    A: AttributeProvider,
{
    /// Decides a request, denying on any internal error.
    pub async fn decide(&self, request: &DecisionRequest) -> Decision {
        match self.evaluate(request).await {
            Ok(decision) => decision,
            Err(error) => {
                warn!(
                    user = %request.user,
                    permission = %request.permission,
                    error = %error,
                    "authorization failed closed"
                );
                Decision::failed(&error)
            }
        }
    }

    /// Returns whether the request is allowed.
    pub async fn is_allowed(&self, request: &DecisionRequest) -> bool {
        self.decide(request).await.allowed
    }

    /// Evaluates a request, returning collaborator and integrity errors.
    ///
    /// Unknown permissions are denied with [`DecisionReason::NoGrant`].
    #[instrument(skip_all, fields(user = %request.user, permission = %request.permission))]
    pub async fn evaluate(&self, request: &DecisionRequest) -> Result<Decision> {
        let Some(permission) = self
            .store
            .permission_by_name(&request.permission)
            .await
            .map_err(Error::from)?
        else {
            debug!("permission not in catalog");
            return Ok(Decision::deny());
        };

        let mut context = AttributeContext::new(request);
        let decision = if self.eager_evaluation {
            self.evaluate_eager(request, &permission, &mut context)
                .await?
        } else {
            self.evaluate_sequential(request, &permission, &mut context)
                .await?
        };
        debug!(
            allowed = decision.allowed,
            reason = decision.reason.as_str(),
            "authorization decided"
        );
        Ok(decision)
    }

    /// Returns the user's effective role set in `workspace`.
    pub async fn effective_roles(
        &self,
        user: &UserId,
        workspace: Option<&WorkspaceId>,
    ) -> Result<Vec<ResolvedRole>> {
        self.hierarchy().resolve(user, workspace).await
    }

    /// Returns permissions held through roles alone, sorted and deduplicated.
    pub async fn effective_permissions(
        &self,
        user: &UserId,
        workspace: Option<&WorkspaceId>,
    ) -> Result<Vec<PermissionId>> {
        let mut permissions = BTreeSet::new();
        for resolved in self.effective_roles(user, workspace).await? {
            let granted = self
                .store
                .role_permissions(&resolved.role.id)
                .await
                .map_err(Error::from)?;
            permissions.extend(granted);
        }
        Ok(permissions.into_iter().collect())
    }

    async fn evaluate_sequential(
        &self,
        request: &DecisionRequest,
        permission: &Permission,
        context: &mut AttributeContext<'_>,
    ) -> Result<Decision> {
        if let Some(role) = self.role_grant(request, permission).await? {
            return Ok(Decision::allow(GrantPath::Role(role)));
        }
        if let Some(grant) = conditional::evaluate(
            &self.store,
            &self.attributes,
            &request.user,
            &permission.id,
            &request.resource,
            context,
        )
        .await?
        {
            return Ok(Decision::allow(GrantPath::Conditional(grant)));
        }
        if let Some(grant) = temporal::evaluate(
            &self.store,
            &request.user,
            &permission.id,
            &request.resource,
            request.at,
        )
        .await?
        {
            return Ok(Decision::allow(GrantPath::Temporal(grant)));
        }
        Ok(Decision::deny())
    }

    async fn evaluate_eager(
        &self,
        request: &DecisionRequest,
        permission: &Permission,
        context: &mut AttributeContext<'_>,
    ) -> Result<Decision> {
        let (role, conditional, temporal) = futures::join!(
            self.role_grant(request, permission),
            conditional::evaluate(
                &self.store,
                &self.attributes,
                &request.user,
                &permission.id,
                &request.resource,
                context,
            ),
            temporal::evaluate(
                &self.store,
                &request.user,
                &permission.id,
                &request.resource,
                request.at,
            ),
        );

        if let Some(role) = role? {
            return Ok(Decision::allow(GrantPath::Role(role)));
        }
        if let Some(grant) = conditional? {
            return Ok(Decision::allow(GrantPath::Conditional(grant)));
        }
        if let Some(grant) = temporal? {
            return Ok(Decision::allow(GrantPath::Temporal(grant)));
        }
        Ok(Decision::deny())
    }

    async fn role_grant(
        &self,
        request: &DecisionRequest,
        permission: &Permission,
    ) -> Result<Option<RoleId>> {
        let roles = self
            .hierarchy()
            .resolve(&request.user, request.workspace.as_ref())
            .await?;
        if !permission.covers_scope(request.resource.scope) {
            return Ok(None);
        }

        // Roles arrive highest priority first, so the first hit is reported.
        for resolved in roles {
            let granted = self
                .store
                .role_permissions(&resolved.role.id)
                .await
                .map_err(Error::from)?;
            if granted.contains(&permission.id) {
                return Ok(Some(resolved.role.id));
            }
        }
        Ok(None)
    }

    fn hierarchy(&self) -> RoleHierarchy<'_, S> {
        RoleHierarchy::new(&self.store, self.max_inherit_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeRef, AttributeValue};
    use crate::conditional::ConditionalPermission;
    use crate::error::StoreError;
    use crate::expression::Expression;
    use crate::role::{CustomRole, Role, UserRole};
    use crate::store::{GrantStore, PermissionStore, RoleStore};
    use crate::temporal::{TimeBasedPermission, TimeGrantKind};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use futures::executor::block_on;
    use std::collections::HashMap;

    #[derive(Default, Clone)]
    struct TestStore {
        permissions: HashMap<PermissionName, Permission>,
        roles: HashMap<RoleId, Role>,
        assignments: Vec<UserRole>,
        role_permissions: HashMap<RoleId, Vec<PermissionId>>,
        conditional: Vec<ConditionalPermission>,
        temporal: Vec<TimeBasedPermission>,
        user_attributes: HashMap<String, AttributeValue>,
        fail_attributes: bool,
        fail_resource_attributes: bool,
    }

    impl TestStore {
        fn permission(&mut self, name: &str, scope: ScopeLevel) -> PermissionId {
            let name = PermissionName::try_from(name).unwrap();
            let id = PermissionId::from_string(name.as_str().replace(':', "_"));
            self.permissions.insert(
                name.clone(),
                Permission {
                    id: id.clone(),
                    name,
                    scope,
                },
            );
            id
        }

        fn custom_role(&mut self, id: &str, parent: Option<&str>, priority: i32) -> RoleId {
            let role = Role::custom(
                role(id),
                id,
                CustomRole {
                    parent: parent.map(role),
                    priority,
                    ..CustomRole::default()
                },
            );
            let id = role.id.clone();
            self.roles.insert(id.clone(), role);
            id
        }

        fn grant_role(&mut self, role: &RoleId, permission: &PermissionId) {
            self.role_permissions
                .entry(role.clone())
                .or_default()
                .push(permission.clone());
        }

        fn assign(&mut self, role: &RoleId) {
            self.assignments.push(UserRole::global(user(), role.clone()));
        }
    }

    #[async_trait]
    impl RoleStore for TestStore {
        async fn user_roles(
            &self,
            _user: &UserId,
        ) -> std::result::Result<Vec<UserRole>, StoreError> {
            Ok(self.assignments.clone())
        }

        async fn role(&self, role: &RoleId) -> std::result::Result<Option<Role>, StoreError> {
            Ok(self.roles.get(role).cloned())
        }
    }

    #[async_trait]
    impl PermissionStore for TestStore {
        async fn permission_by_name(
            &self,
            name: &PermissionName,
        ) -> std::result::Result<Option<Permission>, StoreError> {
            Ok(self.permissions.get(name).cloned())
        }

        async fn role_permissions(
            &self,
            role: &RoleId,
        ) -> std::result::Result<Vec<PermissionId>, StoreError> {
            Ok(self.role_permissions.get(role).cloned().unwrap_or_default())
        }
    }

    #[async_trait]
    impl GrantStore for TestStore {
        async fn conditional_permissions(
            &self,
            _user: &UserId,
            permission: &PermissionId,
        ) -> std::result::Result<Vec<ConditionalPermission>, StoreError> {
            Ok(self
                .conditional
                .iter()
                .filter(|row| &row.permission == permission)
                .cloned()
                .collect())
        }

        async fn time_based_permissions(
            &self,
            _user: &UserId,
            permission: &PermissionId,
        ) -> std::result::Result<Vec<TimeBasedPermission>, StoreError> {
            Ok(self
                .temporal
                .iter()
                .filter(|row| &row.permission == permission)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl AttributeProvider for TestStore {
        async fn resource_attribute(
            &self,
            _resource_type: &ResourceType,
            _resource_id: &ResourceId,
            _key: &str,
        ) -> std::result::Result<Option<AttributeValue>, StoreError> {
            if self.fail_resource_attributes {
                return Err("resource directory unavailable".into());
            }
            Ok(None)
        }

        async fn user_attribute(
            &self,
            _user: &UserId,
            key: &str,
        ) -> std::result::Result<Option<AttributeValue>, StoreError> {
            if self.fail_attributes {
                return Err("attribute service unavailable".into());
            }
            Ok(self.user_attributes.get(key).cloned())
        }

        async fn environment_attribute(
            &self,
            _key: &str,
            _organization: Option<&OrganizationId>,
            _workspace: Option<&WorkspaceId>,
        ) -> std::result::Result<Option<AttributeValue>, StoreError> {
            Ok(None)
        }
    }

    fn user() -> UserId {
        UserId::try_from("user_1").unwrap()
    }

    fn role(value: &str) -> RoleId {
        RoleId::try_from(value).unwrap()
    }

    fn engine(store: TestStore) -> Engine<TestStore, TestStore> {
        EngineBuilder::new(store.clone(), store).build()
    }

    fn request(permission: &str) -> DecisionRequest {
        DecisionRequest::new(user(), PermissionName::try_from(permission).unwrap())
            .at(Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).single().unwrap())
    }

    fn acct_request(resource_id: &str) -> DecisionRequest {
        request("billing:export").resource(
            ResourceType::try_from("billing").unwrap(),
            ResourceId::try_from(resource_id).unwrap(),
        )
    }

    fn billing_store(region: &str) -> TestStore {
        let mut store = TestStore::default();
        let export = store.permission("billing:export", ScopeLevel::Resource);
        store.permission("flows:read", ScopeLevel::Workspace);
        store.conditional.push(
            ConditionalPermission::new(
                GrantId::try_from("cp_1").unwrap(),
                user(),
                export,
                Expression::eq(AttributeRef::user("region"), "EU"),
            )
            .for_resource(
                ResourceType::try_from("billing").unwrap(),
                ResourceId::try_from("acct-1").unwrap(),
            ),
        );
        store
            .user_attributes
            .insert("region".to_string(), AttributeValue::from(region));
        store
    }

    #[test]
    fn unknown_permission_should_deny_with_no_grant() {
        let engine = engine(TestStore::default());
        let decision = block_on(engine.evaluate(&request("reports:delete"))).unwrap();
        assert_eq!(decision, Decision::deny());
        assert_eq!(decision.reason.as_str(), "no_grant");
    }

    #[test]
    fn inherited_role_should_grant_permission() {
        let mut store = TestStore::default();
        let read = store.permission("flows:read", ScopeLevel::Workspace);
        let c1 = store.custom_role("c1", None, 10);
        let c2 = store.custom_role("c2", Some("c1"), 20);
        store.grant_role(&c1, &read);
        store.assign(&c2);
        let engine = engine(store);

        let roles = block_on(engine.effective_roles(&user(), None)).unwrap();
        let decision = block_on(engine.evaluate(&request("flows:read"))).unwrap();

        assert_eq!(roles.len(), 2);
        assert_eq!(decision, Decision::allow(GrantPath::Role(c1)));
        assert_eq!(decision.reason, DecisionReason::RoleGrant);
    }

    #[test]
    fn highest_priority_granting_role_should_be_reported() {
        let mut store = TestStore::default();
        let read = store.permission("flows:read", ScopeLevel::System);
        let low = store.custom_role("low", None, 1);
        let high = store.custom_role("high", None, 99);
        store.grant_role(&low, &read);
        store.grant_role(&high, &read);
        store.assign(&low);
        store.assign(&high);

        let decision = block_on(engine(store).evaluate(&request("flows:read"))).unwrap();

        assert_eq!(decision.grant, Some(GrantPath::Role(high)));
    }

    #[test]
    fn role_grant_should_respect_requested_scope() {
        let mut store = TestStore::default();
        let read = store.permission("flows:read", ScopeLevel::Workspace);
        let editor = store.custom_role("editor", None, 1);
        store.grant_role(&editor, &read);
        store.assign(&editor);
        let engine = engine(store);

        let workspace = block_on(engine.evaluate(&request("flows:read").scope(ScopeLevel::Workspace)))
            .unwrap();
        let resource = block_on(engine.evaluate(&request("flows:read").scope(ScopeLevel::Resource)))
            .unwrap();

        assert!(workspace.allowed);
        assert_eq!(resource, Decision::deny());
    }

    #[test]
    fn cycle_should_error_and_decide_deny() {
        let mut store = TestStore::default();
        store.permission("flows:read", ScopeLevel::System);
        let a = store.custom_role("a", Some("b"), 1);
        store.custom_role("b", Some("a"), 1);
        store.assign(&a);
        let engine = engine(store);

        let result = block_on(engine.evaluate(&request("flows:read")));
        let decision = block_on(engine.decide(&request("flows:read")));

        assert!(matches!(result, Err(Error::RoleHierarchyCycle { .. })));
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason,
            DecisionReason::Failure(FailureKind::RoleHierarchyCycle)
        );
    }

    #[test]
    fn conditional_grant_should_follow_user_attribute() {
        let eu = engine(billing_store("EU"));
        let us = engine(billing_store("US"));

        let allowed = block_on(eu.decide(&acct_request("acct-1")));
        let denied = block_on(us.decide(&acct_request("acct-1")));

        assert_eq!(
            allowed,
            Decision::allow(GrantPath::Conditional(GrantId::try_from("cp_1").unwrap()))
        );
        assert_eq!(denied, Decision::deny());
    }

    #[test]
    fn conditional_grant_should_not_leak_to_other_resource() {
        let decision = block_on(engine(billing_store("EU")).decide(&acct_request("acct-2")));
        assert_eq!(decision, Decision::deny());
    }

    #[test]
    fn attribute_failure_should_deny_instead_of_treating_as_absent() {
        let mut store = billing_store("EU");
        store.fail_attributes = true;
        store.conditional[0].expression = Expression::neq(AttributeRef::user("region"), "US");
        let engine = engine(store);

        let decision = block_on(engine.decide(&acct_request("acct-1")));

        assert!(!decision.allowed);
        assert_eq!(
            decision.reason,
            DecisionReason::Failure(FailureKind::AttributeLookupFailure)
        );
    }

    fn unreachable_owner_store(expressions: Vec<Expression>) -> TestStore {
        let mut store = billing_store("EU");
        let export = store.conditional[0].permission.clone();
        store.conditional = expressions
            .into_iter()
            .enumerate()
            .map(|(index, expression)| {
                ConditionalPermission::new(
                    GrantId::try_from(format!("g{index}").as_str()).unwrap(),
                    user(),
                    export.clone(),
                    expression,
                )
            })
            .collect();
        store.fail_resource_attributes = true;
        store
    }

    fn owner_is_user() -> Expression {
        Expression::eq(AttributeRef::resource("owner"), "u")
    }

    #[test]
    fn short_circuited_or_should_ignore_failed_attribute() {
        let store = unreachable_owner_store(vec![Expression::any([
            Expression::eq(AttributeRef::user("region"), "EU"),
            owner_is_user(),
        ])]);

        let decision = block_on(engine(store).decide(&acct_request("acct-1")));

        assert_eq!(
            decision,
            Decision::allow(GrantPath::Conditional(GrantId::try_from("g0").unwrap()))
        );
    }

    #[test]
    fn earlier_granting_row_should_ignore_failed_attribute_of_later_row() {
        let store = unreachable_owner_store(vec![
            Expression::eq(AttributeRef::user("region"), "EU"),
            owner_is_user(),
        ]);

        let decision = block_on(engine(store).decide(&acct_request("acct-1")));

        assert_eq!(
            decision,
            Decision::allow(GrantPath::Conditional(GrantId::try_from("g0").unwrap()))
        );
    }

    #[test]
    fn failed_attribute_read_by_evaluation_should_fail_closed() {
        let store = unreachable_owner_store(vec![
            Expression::eq(AttributeRef::user("region"), "US"),
            owner_is_user(),
        ]);

        let decision = block_on(engine(store).decide(&acct_request("acct-1")));

        assert_eq!(
            decision.reason,
            DecisionReason::Failure(FailureKind::AttributeLookupFailure)
        );
    }

    #[test]
    fn temporal_grant_should_allow_inside_window_only() {
        let mut store = TestStore::default();
        let write = store.permission("flows:write", ScopeLevel::System);
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).single().unwrap();
        store.temporal.push(
            TimeBasedPermission::new(
                GrantId::try_from("tb_1").unwrap(),
                user(),
                write,
                TimeGrantKind::Temporary,
                t0,
            )
            .until(t0 + Duration::hours(1)),
        );
        let engine = engine(store);

        let inside = block_on(engine.decide(&request("flows:write").at(t0 + Duration::minutes(30))));
        let after = block_on(engine.decide(
            &request("flows:write").at(t0 + Duration::hours(1) + Duration::seconds(1)),
        ));

        assert_eq!(
            inside,
            Decision::allow(GrantPath::Temporal(GrantId::try_from("tb_1").unwrap()))
        );
        assert_eq!(after, Decision::deny());
    }

    #[test]
    fn role_grant_should_take_precedence_over_other_sources() {
        let mut store = billing_store("EU");
        let export = store.permissions[&PermissionName::try_from("billing:export").unwrap()]
            .id
            .clone();
        let finance = store.custom_role("finance", None, 5);
        store.grant_role(&finance, &export);
        store.assign(&finance);

        let decision = block_on(engine(store).decide(&acct_request("acct-1")));

        assert_eq!(decision.reason, DecisionReason::RoleGrant);
    }

    #[test]
    fn repeated_evaluation_should_be_identical() {
        let engine = engine(billing_store("EU"));
        let request = acct_request("acct-1");

        let first = block_on(engine.decide(&request));
        let second = block_on(engine.decide(&request));

        assert_eq!(first, second);
    }

    #[test]
    fn eager_evaluation_should_match_sequential() {
        let mut failing = billing_store("EU");
        failing.fail_attributes = true;
        let export = failing.permissions[&PermissionName::try_from("billing:export").unwrap()]
            .id
            .clone();
        let finance = failing.custom_role("finance", None, 5);
        failing.grant_role(&finance, &export);
        failing.assign(&finance);

        for store in [billing_store("EU"), billing_store("US"), failing] {
            let sequential = EngineBuilder::new(store.clone(), store.clone()).build();
            let eager = EngineBuilder::new(store.clone(), store)
                .eager_evaluation(true)
                .build();
            for request in [acct_request("acct-1"), acct_request("acct-2")] {
                assert_eq!(
                    block_on(sequential.decide(&request)),
                    block_on(eager.decide(&request))
                );
            }
        }
    }

    #[test]
    fn effective_permissions_should_union_inherited_grants() {
        let mut store = TestStore::default();
        let read = store.permission("flows:read", ScopeLevel::System);
        let write = store.permission("flows:write", ScopeLevel::System);
        let viewer = store.custom_role("viewer", None, 1);
        let editor = store.custom_role("editor", Some("viewer"), 2);
        store.grant_role(&viewer, &read);
        store.grant_role(&editor, &write);
        store.grant_role(&editor, &read);
        store.assign(&editor);

        let permissions = block_on(engine(store).effective_permissions(&user(), None)).unwrap();

        assert_eq!(permissions, vec![read, write]);
    }

    #[test]
    fn for_action_should_build_canonical_permission() {
        let request = DecisionRequest::for_action(
            user(),
            ResourceType::try_from("flows").unwrap(),
            "Read",
        )
        .unwrap();
        assert_eq!(request.permission.as_str(), "flows:read");
        assert_eq!(request.resource.resource_type.unwrap().as_str(), "flows");
    }
}
