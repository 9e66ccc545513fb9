use crate::engine::DecisionRequest;
use crate::error::{Error, Result, StoreError};
use crate::types::{OrganizationId, ResourceId, ResourceType, UserId, WorkspaceId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Which collaborator owns an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeKind {
    /// Attribute of the requested resource.
    Resource,
    /// Attribute of the requesting user.
    User,
    /// Attribute of the organization/workspace environment.
    Environment,
}

impl AttributeKind {
    /// Returns the prefix used in textual attribute references.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::User => "user",
            Self::Environment => "environment",
        }
    }
}

/// Reference to one attribute, written `kind.key` (for example `user.region`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct AttributeRef {
    /// Owner of the attribute.
    pub kind: AttributeKind,
    /// Attribute key within its owner.
    pub key: String,
}

impl AttributeRef {
    /// Creates a reference to a resource attribute.
    pub fn resource(key: impl Into<String>) -> Self {
        Self {
            kind: AttributeKind::Resource,
            key: key.into(),
        }
    }

    /// Creates a reference to a user attribute.
    pub fn user(key: impl Into<String>) -> Self {
        Self {
            kind: AttributeKind::User,
            key: key.into(),
        }
    }

    /// Creates a reference to an environment attribute.
    pub fn environment(key: impl Into<String>) -> Self {
        Self {
            kind: AttributeKind::Environment,
            key: key.into(),
        }
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind.as_str(), self.key)
    }
}

impl FromStr for AttributeRef {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let (prefix, key) = value.trim().split_once('.').ok_or_else(|| {
            Error::MalformedExpression(format!("attribute `{value}` must be written kind.key"))
        })?;
        if key.is_empty() {
            return Err(Error::MalformedExpression(format!(
                "attribute `{value}` has an empty key"
            )));
        }
        let kind = match prefix {
            "resource" => AttributeKind::Resource,
            "user" => AttributeKind::User,
            "environment" | "env" => AttributeKind::Environment,
            other => {
                return Err(Error::MalformedExpression(format!(
                    "unknown attribute kind `{other}`"
                )));
            }
        };
        Ok(Self {
            kind,
            key: key.to_string(),
        })
    }
}

impl TryFrom<String> for AttributeRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AttributeRef> for String {
    fn from(value: AttributeRef) -> Self {
        value.to_string()
    }
}

/// Attribute or literal value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum AttributeValue {
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// String value. RFC 3339 strings also compare as timestamps.
    String(String),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// List of values.
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Builds a list value.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Returns the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the numeric payload.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a timestamp, parsing RFC 3339 strings.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(value) => Some(*value),
            Self::String(value) => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|parsed| parsed.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Returns the list payload.
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// External collaborator resolving attribute values.
#[async_trait]
pub trait AttributeProvider: Send + Sync {
    /// Returns an attribute of a resource instance.
    async fn resource_attribute(
        &self,
        resource_type: &ResourceType,
        resource_id: &ResourceId,
        key: &str,
    ) -> std::result::Result<Option<AttributeValue>, StoreError>;

    /// Returns an attribute of a user.
    async fn user_attribute(
        &self,
        user: &UserId,
        key: &str,
    ) -> std::result::Result<Option<AttributeValue>, StoreError>;

    /// Returns an environment attribute, optionally narrowed to an organization or workspace.
    async fn environment_attribute(
        &self,
        key: &str,
        organization: Option<&OrganizationId>,
        workspace: Option<&WorkspaceId>,
    ) -> std::result::Result<Option<AttributeValue>, StoreError>;
}

/// Synchronous attribute lookup used by the expression evaluator.
pub trait AttributeSource {
    /// Returns the attribute value, or `None` when it is absent.
    fn attribute(&self, attribute: &AttributeRef) -> Option<&AttributeValue>;

    /// Returns whether looking up `attribute` failed.
    fn failed(&self, _attribute: &AttributeRef) -> bool {
        false
    }
}

impl AttributeSource for HashMap<AttributeRef, AttributeValue> {
    fn attribute(&self, attribute: &AttributeRef) -> Option<&AttributeValue> {
        self.get(attribute)
    }
}

/// Attribute cache scoped to one decision.
///
/// Each attribute is fetched from the provider at most once; absent values
/// are remembered as absent and failed lookups as failed. A failure only
/// matters once an expression reads the attribute. The context is dropped
/// with the decision.
#[derive(Debug)]
pub struct AttributeContext<'a> {
    user: &'a UserId,
    resource_type: Option<&'a ResourceType>,
    resource_id: Option<&'a ResourceId>,
    organization: Option<&'a OrganizationId>,
    workspace: Option<&'a WorkspaceId>,
    resolved: HashMap<AttributeRef, Option<AttributeValue>>,
    failed: HashMap<AttributeRef, StoreError>,
}

impl<'a> AttributeContext<'a> {
    /// Creates an empty context for the request's subject, resource and environment.
    pub fn new(request: &'a DecisionRequest) -> Self {
        Self {
            user: &request.user,
            resource_type: request.resource.resource_type.as_ref(),
            resource_id: request.resource.resource_id.as_ref(),
            organization: request.organization.as_ref(),
            workspace: request.workspace.as_ref(),
            resolved: HashMap::new(),
            failed: HashMap::new(),
        }
    }

    /// Fetches every attribute not fetched yet, issuing the reads concurrently.
    ///
    /// Provider errors are recorded per attribute instead of returned.
    pub async fn load<'r, P, I>(&mut self, provider: &P, attributes: I)
    where
        P: AttributeProvider + ?Sized,
        I: IntoIterator<Item = &'r AttributeRef>,
    {
        let missing: BTreeSet<&AttributeRef> = attributes
            .into_iter()
            .filter(|attribute| {
                !self.resolved.contains_key(*attribute) && !self.failed.contains_key(*attribute)
            })
            .collect();
        if missing.is_empty() {
            return;
        }

        let values = join_all(
            missing
                .iter()
                .map(|attribute| self.fetch(provider, attribute)),
        )
        .await;

        for (attribute, value) in missing.into_iter().zip(values) {
            match value {
                Ok(value) => {
                    self.resolved.insert(attribute.clone(), value);
                }
                Err(source) => {
                    self.failed.insert(attribute.clone(), source);
                }
            }
        }
    }

    /// Number of attributes fetched so far, absent and failed ones included.
    pub fn resolved_len(&self) -> usize {
        self.resolved.len() + self.failed.len()
    }

    /// Takes the recorded lookup failure of `attribute` as an error.
    pub fn lookup_error(&mut self, attribute: &AttributeRef) -> Error {
        let source = self
            .failed
            .remove(attribute)
            .unwrap_or_else(|| StoreError::from("attribute lookup failed"));
        Error::AttributeLookup {
            attribute: attribute.clone(),
            source,
        }
    }

    async fn fetch<P>(
        &self,
        provider: &P,
        attribute: &AttributeRef,
    ) -> std::result::Result<Option<AttributeValue>, StoreError>
    where
        P: AttributeProvider + ?Sized,
    {
        let key = attribute.key.as_str();
        match attribute.kind {
            AttributeKind::Resource => match (self.resource_type, self.resource_id) {
                (Some(resource_type), Some(resource_id)) => {
                    provider
                        .resource_attribute(resource_type, resource_id, key)
                        .await
                }
                _ => Ok(None),
            },
            AttributeKind::User => provider.user_attribute(self.user, key).await,
            AttributeKind::Environment => {
                provider
                    .environment_attribute(key, self.organization, self.workspace)
                    .await
            }
        }
    }
}

impl AttributeSource for AttributeContext<'_> {
    fn attribute(&self, attribute: &AttributeRef) -> Option<&AttributeValue> {
        self.resolved.get(attribute).and_then(Option::as_ref)
    }

    fn failed(&self, attribute: &AttributeRef) -> bool {
        self.failed.contains_key(attribute)
    }
}
