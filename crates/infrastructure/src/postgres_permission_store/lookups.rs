use super::*;

impl PostgresPermissionStore {
    pub(super) async fn find_permissions_by_ids_impl(
        &self,
        ids: &[PermissionId],
    ) -> AppResult<Vec<Permission>> {
        // Ids beyond BIGINT can never match a row.
        let encoded: Vec<i64> = ids
            .iter()
            .filter_map(|id| i64::try_from(id.as_u64()).ok())
            .collect();
        if encoded.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT id, name, description
            FROM {permissions}
            WHERE id = ANY($1)
            ORDER BY id
            "#,
            permissions = self.tables.permissions(),
        );

        let rows = sqlx::query_as::<_, PermissionRow>(sql.as_str())
            .bind(encoded)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load permissions by id: {error}"))
            })?;

        rows.into_iter().map(PermissionRow::into_permission).collect()
    }

    pub(super) async fn find_permissions_by_names_impl(
        &self,
        names: &[String],
    ) -> AppResult<Vec<Permission>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT id, name, description
            FROM {permissions}
            WHERE name = ANY($1)
            ORDER BY id
            "#,
            permissions = self.tables.permissions(),
        );

        let rows = sqlx::query_as::<_, PermissionRow>(sql.as_str())
            .bind(names)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load permissions by name: {error}"))
            })?;

        rows.into_iter().map(PermissionRow::into_permission).collect()
    }

    pub(super) async fn list_direct_permissions_impl(
        &self,
        subject: &PermissionSubject,
    ) -> AppResult<Vec<Permission>> {
        let columns = self.subject_columns(subject)?;
        let sql = format!(
            r#"
            SELECT permissions.id, permissions.name, permissions.description
            FROM {permissions} AS permissions
            INNER JOIN {associations} AS associations
                ON associations.permission_id = permissions.id
            WHERE associations.{owner_column} = $1
            ORDER BY permissions.id
            "#,
            permissions = self.tables.permissions(),
            associations = columns.table,
            owner_column = columns.owner_column,
        );

        let rows = sqlx::query_as::<_, PermissionRow>(sql.as_str())
            .bind(columns.owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list direct permissions for '{subject}': {error}"
                ))
            })?;

        rows.into_iter().map(PermissionRow::into_permission).collect()
    }

    pub(super) async fn list_role_permissions_impl(
        &self,
        filter: &RolePermissionFilter,
    ) -> AppResult<Vec<Permission>> {
        let role_ids = filter
            .role_ids
            .iter()
            .map(|role_id| encode_id(role_id.as_u64()))
            .collect::<AppResult<Vec<_>>>()?;

        let sql = format!(
            r#"
            SELECT DISTINCT permissions.id, permissions.name, permissions.description
            FROM {permissions} AS permissions
            INNER JOIN {permission_role} AS grants
                ON grants.permission_id = permissions.id
            INNER JOIN {roles} AS roles
                ON roles.id = grants.role_id
            WHERE roles.id = ANY($1)
                OR roles.level < $2
            ORDER BY permissions.id
            "#,
            permissions = self.tables.permissions(),
            permission_role = self.tables.permission_role(),
            roles = self.tables.roles(),
        );

        let rows = sqlx::query_as::<_, PermissionRow>(sql.as_str())
            .bind(role_ids)
            .bind(i32::from(filter.below_level))
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list role permissions: {error}"))
            })?;

        rows.into_iter().map(PermissionRow::into_permission).collect()
    }
}
