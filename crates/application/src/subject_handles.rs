use std::sync::Arc;

use async_trait::async_trait;
use rolegate_core::{AppError, AppResult};
use rolegate_domain::{PermissionSubject, Role, RoleId, UserId};
use tracing::info;

use crate::{
    PermissionAccess, PermissionEventDispatcher, PermissionHolder, PermissionStore, RoleHolder,
    RoleStore,
};

/// In-memory handle for a user subject.
///
/// The permission cache lives as long as the handle. Handles created
/// elsewhere for the same user do not observe this handle's flushes.
pub struct UserHandle {
    user_id: UserId,
    access: PermissionAccess,
    role_store: Option<Arc<dyn RoleStore>>,
}

impl UserHandle {
    /// Creates a user handle that also holds roles.
    #[must_use]
    pub fn new(
        user_id: UserId,
        store: Arc<dyn PermissionStore>,
        role_store: Arc<dyn RoleStore>,
        dispatcher: PermissionEventDispatcher,
    ) -> Self {
        Self {
            user_id,
            access: PermissionAccess::new(PermissionSubject::user(user_id), store, dispatcher),
            role_store: Some(role_store),
        }
    }

    /// Creates a user handle limited to direct permissions.
    #[must_use]
    pub fn without_roles(
        user_id: UserId,
        store: Arc<dyn PermissionStore>,
        dispatcher: PermissionEventDispatcher,
    ) -> Self {
        Self {
            user_id,
            access: PermissionAccess::new(PermissionSubject::user(user_id), store, dispatcher),
            role_store: None,
        }
    }

    /// Returns the user identifier.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Gives the user a role and flushes the permission cache.
    ///
    /// Returns `false` when the membership already existed, and a
    /// validation error when the handle was built without a role store.
    pub async fn attach_role(&mut self, role_id: RoleId) -> AppResult<bool> {
        let role_store = self.require_role_store()?;

        let created = role_store.assign_role(self.user_id, role_id).await?;
        info!(user_id = %self.user_id, %role_id, created, "attached role");
        self.access.flush();
        Ok(created)
    }

    /// Takes a role from the user and flushes the permission cache.
    pub async fn detach_role(&mut self, role_id: RoleId) -> AppResult<u64> {
        let role_store = self.require_role_store()?;

        let removed = role_store.remove_role(self.user_id, role_id).await?;
        info!(user_id = %self.user_id, %role_id, removed, "detached role");
        self.access.flush();
        Ok(removed)
    }

    fn require_role_store(&self) -> AppResult<Arc<dyn RoleStore>> {
        self.role_store
            .clone()
            .ok_or_else(|| AppError::Validation("user handle has no role store".to_owned()))
    }
}

#[async_trait]
impl RoleHolder for UserHandle {
    async fn roles(&self) -> AppResult<Vec<Role>> {
        match self.role_store.as_ref() {
            Some(role_store) => role_store.list_roles_for_user(self.user_id).await,
            None => Ok(Vec::new()),
        }
    }
}

impl PermissionHolder for UserHandle {
    fn permission_access(&self) -> &PermissionAccess {
        &self.access
    }

    fn permission_access_mut(&mut self) -> &mut PermissionAccess {
        &mut self.access
    }

    fn as_role_holder(&self) -> Option<&dyn RoleHolder> {
        self.role_store.as_ref().map(|_| self as &dyn RoleHolder)
    }
}

/// In-memory handle for a role acting as a permission subject.
pub struct RoleHandle {
    role: Role,
    access: PermissionAccess,
}

impl RoleHandle {
    /// Creates a role handle.
    #[must_use]
    pub fn new(
        role: Role,
        store: Arc<dyn PermissionStore>,
        dispatcher: PermissionEventDispatcher,
    ) -> Self {
        Self {
            access: PermissionAccess::new(PermissionSubject::role(role.clone()), store, dispatcher),
            role,
        }
    }

    /// Returns the role entity.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }
}

impl PermissionHolder for RoleHandle {
    fn permission_access(&self) -> &PermissionAccess {
        &self.access
    }

    fn permission_access_mut(&mut self) -> &mut PermissionAccess {
        &mut self.access
    }
}
