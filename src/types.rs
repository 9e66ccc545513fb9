use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_NAME_LEN: usize = 128;

fn validate_simple_name(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if !trimmed.chars().all(is_allowed_name_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_allowed_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-' | '.')
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_simple_name(value.as_ref(), $kind).map(Self)
            }

            /// Creates an identifier from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_id_type!(
    /// User (subject) identifier.
    UserId,
    "user id"
);
define_id_type!(
    /// Role identifier.
    RoleId,
    "role id"
);
define_id_type!(
    /// Permission catalog row identifier.
    PermissionId,
    "permission id"
);
define_id_type!(
    /// Conditional or time-based grant row identifier.
    GrantId,
    "grant id"
);
define_id_type!(
    /// Organization identifier.
    OrganizationId,
    "organization id"
);
define_id_type!(
    /// Workspace identifier.
    WorkspaceId,
    "workspace id"
);
define_id_type!(
    /// Resource type, the left half of a permission name.
    ResourceType,
    "resource type"
);
define_id_type!(
    /// Identifier of a single resource instance.
    ResourceId,
    "resource id"
);
