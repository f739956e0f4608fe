use rolegate_core::{AppError, AppResult};

/// Longest identifier PostgreSQL keeps without truncation.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Table names used by the PostgreSQL store.
///
/// Names are interpolated into SQL, so every value is validated as a plain
/// identifier on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTables {
    permissions: String,
    roles: String,
    permission_user: String,
    permission_role: String,
    role_user: String,
}

impl StoreTables {
    /// Creates a validated table-name set.
    pub fn new(
        permissions: impl Into<String>,
        roles: impl Into<String>,
        permission_user: impl Into<String>,
        permission_role: impl Into<String>,
        role_user: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            permissions: validate_identifier(permissions.into())?,
            roles: validate_identifier(roles.into())?,
            permission_user: validate_identifier(permission_user.into())?,
            permission_role: validate_identifier(permission_role.into())?,
            role_user: validate_identifier(role_user.into())?,
        })
    }

    /// Returns the permissions table.
    #[must_use]
    pub fn permissions(&self) -> &str {
        self.permissions.as_str()
    }

    /// Returns the roles table.
    #[must_use]
    pub fn roles(&self) -> &str {
        self.roles.as_str()
    }

    /// Returns the user-permission association table.
    #[must_use]
    pub fn permission_user(&self) -> &str {
        self.permission_user.as_str()
    }

    /// Returns the role-permission association table.
    #[must_use]
    pub fn permission_role(&self) -> &str {
        self.permission_role.as_str()
    }

    /// Returns the user-role association table.
    #[must_use]
    pub fn role_user(&self) -> &str {
        self.role_user.as_str()
    }
}

impl Default for StoreTables {
    fn default() -> Self {
        Self {
            permissions: "permissions".to_owned(),
            roles: "roles".to_owned(),
            permission_user: "permission_user".to_owned(),
            permission_role: "permission_role".to_owned(),
            role_user: "role_user".to_owned(),
        }
    }
}

fn validate_identifier(value: String) -> AppResult<String> {
    let mut chars = value.chars();
    let starts_well = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
    let rest_valid = chars.all(|next| next.is_ascii_alphanumeric() || next == '_');

    if !starts_well || !rest_valid || value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(AppError::Validation(format!(
            "invalid table name '{value}': expected [A-Za-z_][A-Za-z0-9_]* up to {MAX_IDENTIFIER_LENGTH} characters"
        )));
    }

    Ok(value)
}
