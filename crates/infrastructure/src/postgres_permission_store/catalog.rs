use super::*;

impl PostgresPermissionStore {
    /// Creates a permission with a unique, trimmed name.
    pub async fn create_permission(&self, name: &str, description: &str) -> AppResult<Permission> {
        let name = name.trim();
        let sql = format!(
            r#"
            INSERT INTO {permissions} (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description
            "#,
            permissions = self.tables.permissions(),
        );

        sqlx::query_as::<_, PermissionRow>(sql.as_str())
            .bind(name)
            .bind(description)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| map_unique_conflict(error, "permission", name))?
            .into_permission()
    }

    /// Creates a role with a unique, trimmed name.
    pub async fn create_role(&self, name: &str, level: u16) -> AppResult<Role> {
        let name = name.trim();
        let sql = format!(
            r#"
            INSERT INTO {roles} (name, level)
            VALUES ($1, $2)
            RETURNING id, name, level
            "#,
            roles = self.tables.roles(),
        );

        sqlx::query_as::<_, RoleRow>(sql.as_str())
            .bind(name)
            .bind(i32::from(level))
            .fetch_one(&self.pool)
            .await
            .map_err(|error| map_unique_conflict(error, "role", name))?
            .into_role()
    }

    /// Finds a role by its unique name.
    pub async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let sql = format!(
            "SELECT id, name, level FROM {roles} WHERE name = $1",
            roles = self.tables.roles(),
        );

        sqlx::query_as::<_, RoleRow>(sql.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to find role '{name}': {error}")))?
            .map(RoleRow::into_role)
            .transpose()
    }

    /// Deletes a permission. Associations cascade.
    pub async fn delete_permission(&self, id: PermissionId) -> AppResult<bool> {
        let sql = format!(
            "DELETE FROM {permissions} WHERE id = $1",
            permissions = self.tables.permissions(),
        );

        let removed = sqlx::query(sql.as_str())
            .bind(encode_id(id.as_u64())?)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete permission: {error}")))?
            .rows_affected();

        Ok(removed > 0)
    }

    /// Deletes a role. Grants and memberships cascade.
    pub async fn delete_role(&self, id: RoleId) -> AppResult<bool> {
        let sql = format!(
            "DELETE FROM {roles} WHERE id = $1",
            roles = self.tables.roles(),
        );

        let removed = sqlx::query(sql.as_str())
            .bind(encode_id(id.as_u64())?)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?
            .rows_affected();

        Ok(removed > 0)
    }
}
