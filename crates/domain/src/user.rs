//! User identity as seen by the authorization layer.
//!
//! Users live in the host application; rolegate only keys association rows by
//! their numeric identifier.

use std::str::FromStr;

use rolegate_core::AppError;
use serde::{Deserialize, Serialize};

/// Unique identifier for a user record owned by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(u64);

impl UserId {
    /// Creates a user identifier from an existing key value.
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

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid user id '{value}': {error}")))
    }
}
