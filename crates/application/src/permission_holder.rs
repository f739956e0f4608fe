//! Permission-holding capability shared by users and roles.
//!
//! Subjects embed a [`PermissionAccess`] and implement [`PermissionHolder`],
//! whose provided methods carry the whole read and mutation protocol. A
//! subject that also holds roles exposes [`RoleHolder`] through
//! [`PermissionHolder::as_role_holder`] and gains hierarchical inheritance.

use std::sync::Arc;

use async_trait::async_trait;
use rolegate_core::{AppError, AppResult};
use rolegate_domain::{
    Permission, PermissionEvent, PermissionEventKind, PermissionId, PermissionReference,
    PermissionSubject, Role,
};
use tracing::info;

use crate::{
    PermissionEventDispatcher, PermissionNormalizer, PermissionResolver, PermissionStore,
    RoleScope, SyncChanges,
};

/// Capability of subjects that hold roles.
#[async_trait]
pub trait RoleHolder: Send + Sync {
    /// Lists the roles the subject holds.
    async fn roles(&self) -> AppResult<Vec<Role>>;

    /// Returns the level used to inherit grants of lower roles.
    async fn level_access(&self) -> AppResult<u16> {
        Ok(self.level_for(&self.roles().await?))
    }

    /// Derives the access level from roles that were already fetched.
    ///
    /// Defaults to the highest level among `roles`, or `0` when empty.
    /// Resolvers call this with the role list they already fetched.
    fn level_for(&self, roles: &[Role]) -> u16 {
        roles.iter().map(Role::level).max().unwrap_or(0)
    }
}

/// Resolver, normalizer and notifier state owned by one subject handle.
pub struct PermissionAccess {
    subject: PermissionSubject,
    store: Arc<dyn PermissionStore>,
    normalizer: PermissionNormalizer,
    resolver: PermissionResolver,
    dispatcher: PermissionEventDispatcher,
}

impl PermissionAccess {
    /// Creates access state for a subject.
    #[must_use]
    pub fn new(
        subject: PermissionSubject,
        store: Arc<dyn PermissionStore>,
        dispatcher: PermissionEventDispatcher,
    ) -> Self {
        Self {
            subject,
            normalizer: PermissionNormalizer::new(store.clone()),
            resolver: PermissionResolver::new(store.clone()),
            store,
            dispatcher,
        }
    }

    /// Returns the subject this state belongs to.
    #[must_use]
    pub fn subject(&self) -> &PermissionSubject {
        &self.subject
    }

    /// Returns the reference normalizer.
    #[must_use]
    pub fn normalizer(&self) -> &PermissionNormalizer {
        &self.normalizer
    }

    /// Returns the memoized effective set, if present.
    #[must_use]
    pub fn cached_permissions(&self) -> Option<&[Permission]> {
        self.resolver.cached()
    }

    /// Resolves and memoizes the effective set for the given role scope.
    pub async fn load_permissions(&mut self, scope: RoleScope) -> AppResult<Vec<Permission>> {
        self.resolver.resolve(&self.subject, scope).await
    }

    /// Drops the memoized effective set.
    pub fn flush(&mut self) {
        self.resolver.flush();
    }

    /// Attaches the referenced permissions to the subject.
    pub async fn attach(
        &mut self,
        reference: PermissionReference,
        touch: bool,
    ) -> AppResult<Vec<PermissionId>> {
        let ids = self.load_ids(reference).await?;
        let payload = Some(ids.clone());

        self.notify(PermissionEventKind::Attaching, payload.clone())
            .await?;
        let attached = self
            .store
            .attach_permissions(&self.subject, &ids, touch)
            .await?;
        info!(
            subject = %self.subject,
            requested = ids.len(),
            attached = attached.len(),
            "attached permissions"
        );

        self.finish(PermissionEventKind::Attached, payload).await?;
        Ok(attached)
    }

    /// Detaches the referenced permissions, or every direct one for `None`.
    pub async fn detach(
        &mut self,
        reference: Option<PermissionReference>,
        touch: bool,
    ) -> AppResult<u64> {
        let payload = match reference {
            Some(reference) => Some(self.load_ids(reference).await?),
            None => None,
        };

        self.notify(PermissionEventKind::Detaching, payload.clone())
            .await?;
        let detached = self
            .store
            .detach_permissions(&self.subject, payload.as_deref(), touch)
            .await?;
        info!(subject = %self.subject, detached, "detached permissions");

        self.finish(PermissionEventKind::Detached, payload).await?;
        Ok(detached)
    }

    /// Replaces the subject's direct permissions with the referenced set.
    pub async fn sync(
        &mut self,
        reference: Option<PermissionReference>,
        detaching: bool,
    ) -> AppResult<SyncChanges> {
        let payload = match reference {
            Some(reference) => Some(self.load_ids(reference).await?),
            None => None,
        };

        self.notify(PermissionEventKind::Syncing, payload.clone())
            .await?;
        let changes = self
            .store
            .sync_permissions(
                &self.subject,
                payload.as_deref().unwrap_or_default(),
                detaching,
            )
            .await?;
        info!(
            subject = %self.subject,
            attached = changes.attached.len(),
            detached = changes.detached.len(),
            detaching,
            "synced permissions"
        );

        self.finish(PermissionEventKind::Synced, payload).await?;
        Ok(changes)
    }

    async fn load_ids(&self, reference: PermissionReference) -> AppResult<Vec<PermissionId>> {
        Ok(self
            .normalizer
            .load(reference)
            .await?
            .iter()
            .map(Permission::id)
            .collect())
    }

    async fn notify(
        &self,
        kind: PermissionEventKind,
        permission_ids: Option<Vec<PermissionId>>,
    ) -> AppResult<()> {
        self.dispatcher
            .dispatch(&PermissionEvent::new(
                kind,
                self.subject.clone(),
                permission_ids,
            ))
            .await
    }

    /// Emits the after-event, then flushes the cache whatever the outcome.
    async fn finish(
        &mut self,
        kind: PermissionEventKind,
        permission_ids: Option<Vec<PermissionId>>,
    ) -> AppResult<()> {
        let notified = self.notify(kind, permission_ids).await;
        self.flush();
        notified
    }
}

/// Capability of subjects that hold permissions.
#[async_trait]
pub trait PermissionHolder: Send + Sync {
    /// Returns the embedded access state.
    fn permission_access(&self) -> &PermissionAccess;

    /// Returns the embedded access state mutably.
    fn permission_access_mut(&mut self) -> &mut PermissionAccess;

    /// Returns the role-holding capability, when the subject has it.
    fn as_role_holder(&self) -> Option<&dyn RoleHolder> {
        None
    }

    /// Describes how the subject takes part in role-derived grants.
    async fn role_scope(&self) -> AppResult<RoleScope> {
        if let Some(role) = self.permission_access().subject().as_role() {
            return Ok(RoleScope::for_role(role));
        }

        match self.as_role_holder() {
            Some(holder) => RoleScope::for_holder(holder).await,
            None => Ok(RoleScope::None),
        }
    }

    /// Returns the effective permission set, memoized until the next flush.
    async fn get_permissions(&mut self) -> AppResult<Vec<Permission>> {
        if let Some(cached) = self.permission_access().cached_permissions() {
            return Ok(cached.to_vec());
        }

        let scope = self.role_scope().await?;
        self.permission_access_mut().load_permissions(scope).await
    }

    /// Drops the memoized effective set.
    fn flush_permissions(&mut self) {
        self.permission_access_mut().flush();
    }

    /// Attaches permissions; already attached ones are left untouched.
    async fn attach_permission(
        &mut self,
        reference: PermissionReference,
        touch: bool,
    ) -> AppResult<()> {
        self.permission_access_mut()
            .attach(reference, touch)
            .await
            .map(|_| ())
    }

    /// Detaches the referenced permissions, or all direct ones for `None`.
    async fn detach_permission(
        &mut self,
        reference: Option<PermissionReference>,
        touch: bool,
    ) -> AppResult<()> {
        self.permission_access_mut()
            .detach(reference, touch)
            .await
            .map(|_| ())
    }

    /// Synchronizes direct permissions with the referenced set.
    async fn sync_permissions(
        &mut self,
        reference: Option<PermissionReference>,
        detaching: bool,
    ) -> AppResult<SyncChanges> {
        self.permission_access_mut()
            .sync(reference, detaching)
            .await
    }

    /// Returns whether the effective set contains the referenced permission.
    async fn has_permission(&mut self, reference: PermissionReference) -> AppResult<bool> {
        let permissions = self.get_permissions().await?;
        Ok(permissions
            .iter()
            .any(|permission| reference.matches(permission)))
    }

    /// Returns whether every referenced permission is held.
    ///
    /// References are not required to exist. An empty reference yields `false`.
    async fn has_permissions(&mut self, reference: PermissionReference) -> AppResult<bool> {
        let atoms = self
            .permission_access()
            .normalizer()
            .resolve(reference, false)
            .await?;
        if atoms.is_empty() {
            return Ok(false);
        }

        let permissions = self.get_permissions().await?;
        Ok(atoms
            .iter()
            .all(|atom| permissions.iter().any(|permission| atom.matches(permission))))
    }

    /// Returns whether at least one referenced permission is held.
    async fn has_any_permission(&mut self, reference: PermissionReference) -> AppResult<bool> {
        let atoms = self
            .permission_access()
            .normalizer()
            .resolve(reference, false)
            .await?;
        if atoms.is_empty() {
            return Ok(false);
        }

        let permissions = self.get_permissions().await?;
        Ok(atoms
            .iter()
            .any(|atom| permissions.iter().any(|permission| atom.matches(permission))))
    }

    /// Fails with [`AppError::Forbidden`] unless the permission is held.
    async fn require_permission(&mut self, reference: PermissionReference) -> AppResult<()> {
        if self.has_permission(reference).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "subject '{}' doesn't have a required permission",
            self.permission_access().subject()
        )))
    }
}

#[cfg(test)]
mod tests;
