use crate::attribute::AttributeRef;
use crate::types::RoleId;
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid permission input.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    /// A role is its own ancestor.
    #[error("role hierarchy cycle detected at role {role}")]
    RoleHierarchyCycle { role: RoleId },
    /// Role inheritance depth exceeded.
    #[error("role inheritance depth exceeded at role {role}; max depth {max_depth}")]
    RoleDepthExceeded { role: RoleId, max_depth: usize },
    /// An attribute provider failed to answer.
    #[error("attribute lookup failed for {attribute}: {source}")]
    AttributeLookup {
        attribute: AttributeRef,
        #[source]
        source: StoreError,
    },
    /// Expression tree failed structural validation.
    #[error("malformed expression: {0}")]
    MalformedExpression(String),
    /// Role cannot be used as a template.
    #[error("role {role} is not a template")]
    NotATemplate { role: RoleId },
}

impl Error {
    /// Classifies the error for inclusion in a deny decision.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Store(_) => FailureKind::Store,
            Self::InvalidId(_) | Self::InvalidPermission(_) | Self::NotATemplate { .. } => {
                FailureKind::InvalidInput
            }
            Self::RoleHierarchyCycle { .. } => FailureKind::RoleHierarchyCycle,
            Self::RoleDepthExceeded { .. } => FailureKind::RoleDepthExceeded,
            Self::AttributeLookup { .. } => FailureKind::AttributeLookupFailure,
            Self::MalformedExpression(_) => FailureKind::MalformedExpression,
        }
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

/// Failure category attached to a decision that was denied because of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailureKind {
    /// A store read failed.
    Store,
    /// Request input was rejected.
    InvalidInput,
    /// The role hierarchy contains a cycle.
    RoleHierarchyCycle,
    /// The role hierarchy is deeper than allowed.
    RoleDepthExceeded,
    /// An attribute could not be resolved.
    AttributeLookupFailure,
    /// An expression failed validation.
    MalformedExpression,
}

impl FailureKind {
    /// Returns the stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::InvalidInput => "invalid_input",
            Self::RoleHierarchyCycle => "role_hierarchy_cycle",
            Self::RoleDepthExceeded => "role_depth_exceeded",
            Self::AttributeLookupFailure => "attribute_lookup_failure",
            Self::MalformedExpression => "malformed_expression",
        }
    }
}
