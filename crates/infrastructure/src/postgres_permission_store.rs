use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use rolegate_application::{PermissionStore, RolePermissionFilter, RoleStore, SyncChanges};
use rolegate_core::{AppError, AppResult};
use rolegate_domain::{Permission, PermissionId, PermissionSubject, Role, RoleId, UserId};

use crate::StoreTables;

mod associations;
mod catalog;
mod lookups;
mod memberships;

/// PostgreSQL-backed permission and role membership store.
#[derive(Clone)]
pub struct PostgresPermissionStore {
    pool: PgPool,
    tables: StoreTables,
}

impl PostgresPermissionStore {
    /// Creates a store over the default table names.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_tables(pool, StoreTables::default())
    }

    /// Creates a store over custom table names.
    #[must_use]
    pub fn with_tables(pool: PgPool, tables: StoreTables) -> Self {
        Self { pool, tables }
    }

    /// Returns the table names in use.
    #[must_use]
    pub fn tables(&self) -> &StoreTables {
        &self.tables
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: i64,
    name: String,
    description: String,
}

impl PermissionRow {
    fn into_permission(self) -> AppResult<Permission> {
        Permission::new(
            PermissionId::new(decode_id(self.id, "permission")?),
            self.name,
            self.description,
        )
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    level: i32,
}

impl RoleRow {
    fn into_role(self) -> AppResult<Role> {
        let level = u16::try_from(self.level).map_err(|_| {
            AppError::Internal(format!(
                "role '{}' has out-of-range level {}",
                self.name, self.level
            ))
        })?;
        Role::new(RoleId::new(decode_id(self.id, "role")?), self.name, level)
    }
}

/// Association table and owner column for a subject.
struct SubjectColumns<'a> {
    table: &'a str,
    owner_column: &'static str,
    owner_id: i64,
}

impl PostgresPermissionStore {
    fn subject_columns(&self, subject: &PermissionSubject) -> AppResult<SubjectColumns<'_>> {
        Ok(match subject {
            PermissionSubject::User { id } => SubjectColumns {
                table: self.tables.permission_user(),
                owner_column: "user_id",
                owner_id: encode_id(id.as_u64())?,
            },
            PermissionSubject::Role { role } => SubjectColumns {
                table: self.tables.permission_role(),
                owner_column: "role_id",
                owner_id: encode_id(role.id().as_u64())?,
            },
        })
    }
}

fn encode_id(value: u64) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|_| AppError::Validation(format!("identifier {value} exceeds BIGINT range")))
}

fn encode_ids(ids: &[PermissionId]) -> AppResult<Vec<i64>> {
    ids.iter().map(|id| encode_id(id.as_u64())).collect()
}

fn decode_id(value: i64, kind: &str) -> AppResult<u64> {
    u64::try_from(value)
        .map_err(|_| AppError::Internal(format!("stored {kind} id {value} is negative")))
}

fn decode_permission_ids(values: Vec<i64>) -> AppResult<Vec<PermissionId>> {
    values
        .into_iter()
        .map(|value| decode_id(value, "permission").map(PermissionId::new))
        .collect()
}

fn map_unique_conflict(error: sqlx::Error, kind: &str, name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("{kind} '{name}' already exists"));
    }

    AppError::Internal(format!("failed to create {kind}: {error}"))
}

fn map_association_error(error: sqlx::Error, action: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23503")
    {
        return AppError::NotFound(format!(
            "failed to {action}: referenced permission or role does not exist"
        ));
    }

    AppError::Internal(format!("failed to {action}: {error}"))
}

#[async_trait]
impl PermissionStore for PostgresPermissionStore {
    async fn find_permissions_by_ids(&self, ids: &[PermissionId]) -> AppResult<Vec<Permission>> {
        self.find_permissions_by_ids_impl(ids).await
    }

    async fn find_permissions_by_names(&self, names: &[String]) -> AppResult<Vec<Permission>> {
        self.find_permissions_by_names_impl(names).await
    }

    async fn list_direct_permissions(
        &self,
        subject: &PermissionSubject,
    ) -> AppResult<Vec<Permission>> {
        self.list_direct_permissions_impl(subject).await
    }

    async fn list_role_permissions(
        &self,
        filter: &RolePermissionFilter,
    ) -> AppResult<Vec<Permission>> {
        self.list_role_permissions_impl(filter).await
    }

    async fn attach_permissions(
        &self,
        subject: &PermissionSubject,
        ids: &[PermissionId],
        touch: bool,
    ) -> AppResult<Vec<PermissionId>> {
        self.attach_permissions_impl(subject, ids, touch).await
    }

    async fn detach_permissions(
        &self,
        subject: &PermissionSubject,
        ids: Option<&[PermissionId]>,
        touch: bool,
    ) -> AppResult<u64> {
        self.detach_permissions_impl(subject, ids, touch).await
    }

    async fn sync_permissions(
        &self,
        subject: &PermissionSubject,
        ids: &[PermissionId],
        detaching: bool,
    ) -> AppResult<SyncChanges> {
        self.sync_permissions_impl(subject, ids, detaching).await
    }
}

#[async_trait]
impl RoleStore for PostgresPermissionStore {
    async fn list_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        self.list_roles_for_user_impl(user_id).await
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        self.assign_role_impl(user_id, role_id).await
    }

    async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<u64> {
        self.remove_role_impl(user_id, role_id).await
    }
}
