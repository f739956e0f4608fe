use sqlx::{Postgres, Transaction};

use super::*;

impl PostgresPermissionStore {
    pub(super) async fn attach_permissions_impl(
        &self,
        subject: &PermissionSubject,
        ids: &[PermissionId],
        touch: bool,
    ) -> AppResult<Vec<PermissionId>> {
        let columns = self.subject_columns(subject)?;
        let mut transaction = self.begin().await?;

        if touch {
            touch_associations(&mut transaction, &columns).await?;
        }
        let attached = insert_associations(&mut transaction, &columns, encode_ids(ids)?).await?;

        commit(transaction).await?;
        Ok(attached)
    }

    pub(super) async fn detach_permissions_impl(
        &self,
        subject: &PermissionSubject,
        ids: Option<&[PermissionId]>,
        touch: bool,
    ) -> AppResult<u64> {
        let columns = self.subject_columns(subject)?;
        let mut transaction = self.begin().await?;

        let removed = match ids {
            Some(ids) => {
                let sql = format!(
                    r#"
                    DELETE FROM {table}
                    WHERE {owner_column} = $1
                        AND permission_id = ANY($2)
                    "#,
                    table = columns.table,
                    owner_column = columns.owner_column,
                );
                sqlx::query(sql.as_str())
                    .bind(columns.owner_id)
                    .bind(encode_ids(ids)?)
                    .execute(&mut *transaction)
                    .await
            }
            None => {
                let sql = format!(
                    "DELETE FROM {table} WHERE {owner_column} = $1",
                    table = columns.table,
                    owner_column = columns.owner_column,
                );
                sqlx::query(sql.as_str())
                    .bind(columns.owner_id)
                    .execute(&mut *transaction)
                    .await
            }
        }
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to detach permissions from '{subject}': {error}"
            ))
        })?
        .rows_affected();

        if touch {
            touch_associations(&mut transaction, &columns).await?;
        }

        commit(transaction).await?;
        Ok(removed)
    }

    pub(super) async fn sync_permissions_impl(
        &self,
        subject: &PermissionSubject,
        ids: &[PermissionId],
        detaching: bool,
    ) -> AppResult<SyncChanges> {
        let columns = self.subject_columns(subject)?;
        let encoded = encode_ids(ids)?;
        let mut transaction = self.begin().await?;
        let mut changes = SyncChanges::default();

        if detaching {
            let sql = format!(
                r#"
                DELETE FROM {table}
                WHERE {owner_column} = $1
                    AND NOT (permission_id = ANY($2))
                RETURNING permission_id
                "#,
                table = columns.table,
                owner_column = columns.owner_column,
            );
            let mut detached = sqlx::query_scalar::<_, i64>(sql.as_str())
                .bind(columns.owner_id)
                .bind(encoded.as_slice())
                .fetch_all(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to sync permissions for '{subject}': {error}"
                    ))
                })?;
            detached.sort_unstable();
            changes.detached = decode_permission_ids(detached)?;
        }

        changes.attached = insert_associations(&mut transaction, &columns, encoded).await?;

        commit(transaction).await?;
        Ok(changes)
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
    }
}

async fn insert_associations(
    transaction: &mut Transaction<'_, Postgres>,
    columns: &SubjectColumns<'_>,
    ids: Vec<i64>,
) -> AppResult<Vec<PermissionId>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        r#"
        INSERT INTO {table} ({owner_column}, permission_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT ({owner_column}, permission_id) DO NOTHING
        RETURNING permission_id
        "#,
        table = columns.table,
        owner_column = columns.owner_column,
    );

    let inserted = sqlx::query_scalar::<_, i64>(sql.as_str())
        .bind(columns.owner_id)
        .bind(ids.as_slice())
        .fetch_all(&mut **transaction)
        .await
        .map_err(|error| map_association_error(error, "attach permissions"))?;

    let inserted = decode_permission_ids(inserted)?;
    // RETURNING order is unspecified; report in request order.
    let mut attached = Vec::with_capacity(inserted.len());
    for id in ids {
        let id = PermissionId::new(decode_id(id, "permission")?);
        if inserted.contains(&id) && !attached.contains(&id) {
            attached.push(id);
        }
    }
    Ok(attached)
}

async fn touch_associations(
    transaction: &mut Transaction<'_, Postgres>,
    columns: &SubjectColumns<'_>,
) -> AppResult<()> {
    let sql = format!(
        "UPDATE {table} SET updated_at = NOW() WHERE {owner_column} = $1",
        table = columns.table,
        owner_column = columns.owner_column,
    );

    sqlx::query(sql.as_str())
        .bind(columns.owner_id)
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to touch permission associations: {error}"))
        })?;

    Ok(())
}

async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}
