use super::*;

impl PostgresPermissionStore {
    pub(super) async fn list_roles_for_user_impl(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        let sql = format!(
            r#"
            SELECT roles.id, roles.name, roles.level
            FROM {roles} AS roles
            INNER JOIN {role_user} AS memberships
                ON memberships.role_id = roles.id
            WHERE memberships.user_id = $1
            ORDER BY roles.level DESC, roles.id
            "#,
            roles = self.tables.roles(),
            role_user = self.tables.role_user(),
        );

        let rows = sqlx::query_as::<_, RoleRow>(sql.as_str())
            .bind(encode_id(user_id.as_u64())?)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list roles for user '{user_id}': {error}"))
            })?;

        rows.into_iter().map(RoleRow::into_role).collect()
    }

    pub(super) async fn assign_role_impl(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<bool> {
        let sql = format!(
            r#"
            INSERT INTO {role_user} (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
            role_user = self.tables.role_user(),
        );

        let inserted = sqlx::query(sql.as_str())
            .bind(encode_id(user_id.as_u64())?)
            .bind(encode_id(role_id.as_u64())?)
            .execute(&self.pool)
            .await
            .map_err(|error| match &error {
                sqlx::Error::Database(database_error)
                    if database_error.code().as_deref() == Some("23503") =>
                {
                    AppError::NotFound(format!("role '{role_id}' was not found"))
                }
                _ => AppError::Internal(format!("failed to assign role: {error}")),
            })?
            .rows_affected();

        Ok(inserted > 0)
    }

    pub(super) async fn remove_role_impl(&self, user_id: UserId, role_id: RoleId) -> AppResult<u64> {
        let sql = format!(
            "DELETE FROM {role_user} WHERE user_id = $1 AND role_id = $2",
            role_user = self.tables.role_user(),
        );

        let removed = sqlx::query(sql.as_str())
            .bind(encode_id(user_id.as_u64())?)
            .bind(encode_id(role_id.as_u64())?)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to remove role: {error}")))?
            .rows_affected();

        Ok(removed)
    }
}
