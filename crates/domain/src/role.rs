use rolegate_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Level assigned to roles created without an explicit tier.
pub const DEFAULT_ROLE_LEVEL: u16 = 1;

/// Primary key of a role row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(u64);

impl RoleId {
    /// Creates a role identifier from an existing key value.
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

impl From<u64> for RoleId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Named group of permissions ordered by an integer level.
///
/// A role is itself a permission subject: it can hold permissions directly and
/// inherits the grants of every role whose level is strictly below its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: NonEmptyString,
    level: u16,
}

impl Role {
    /// Creates a role entity with a validated name.
    pub fn new(id: RoleId, name: impl Into<String>, level: u16) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            level,
        })
    }

    /// Creates a role at [`DEFAULT_ROLE_LEVEL`].
    pub fn with_default_level(id: RoleId, name: impl Into<String>) -> AppResult<Self> {
        Self::new(id, name, DEFAULT_ROLE_LEVEL)
    }

    /// Returns the stable identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the unique role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the hierarchy level.
    #[must_use]
    pub fn level(&self) -> u16 {
        self.level
    }
}
