use rolegate_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Primary key of a permission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionId(u64);

impl PermissionId {
    /// Creates a permission identifier from an existing key value.
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying key value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PermissionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for PermissionId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A named capability that can be granted to users and roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    id: PermissionId,
    name: NonEmptyString,
    description: String,
}

impl Permission {
    /// Creates a permission entity with a validated name.
    pub fn new(
        id: PermissionId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            description: description.into(),
        })
    }

    /// Returns the stable identifier.
    #[must_use]
    pub fn id(&self) -> PermissionId {
        self.id
    }

    /// Returns the unique permission name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the human readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns whether both values refer to the same stored permission.
    #[must_use]
    pub fn is(&self, other: &Permission) -> bool {
        self.id == other.id
    }
}
