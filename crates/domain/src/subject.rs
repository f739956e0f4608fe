use serde::{Deserialize, Serialize};

use crate::{Role, UserId};

/// Entity that can hold permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionSubject {
    /// Application user keyed by its host identifier.
    User {
        /// User key.
        id: UserId,
    },
    /// Role acting as a permission holder.
    Role {
        /// Role entity, including its level.
        role: Role,
    },
}

impl PermissionSubject {
    /// Creates a user subject.
    #[must_use]
    pub fn user(id: UserId) -> Self {
        Self::User { id }
    }

    /// Creates a role subject.
    #[must_use]
    pub fn role(role: Role) -> Self {
        Self::Role { role }
    }

    /// Returns a stable label for the subject kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Role { .. } => "role",
        }
    }

    /// Returns the subject key within its kind.
    #[must_use]
    pub fn key(&self) -> u64 {
        match self {
            Self::User { id } => id.as_u64(),
            Self::Role { role } => role.id().as_u64(),
        }
    }

    /// Returns the role when the subject is one.
    #[must_use]
    pub fn as_role(&self) -> Option<&Role> {
        match self {
            Self::Role { role } => Some(role),
            Self::User { .. } => None,
        }
    }
}

impl std::fmt::Display for PermissionSubject {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.kind(), self.key())
    }
}
