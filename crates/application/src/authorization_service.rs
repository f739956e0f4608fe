use std::sync::Arc;

use rolegate_core::AppResult;
use rolegate_domain::{PermissionReference, Role, UserId};

use crate::{
    PermissionEventDispatcher, PermissionHolder, PermissionStore, RoleHandle, RoleStore,
    UserHandle,
};

/// Application service creating subject handles over shared stores.
#[derive(Clone)]
pub struct AuthorizationService {
    store: Arc<dyn PermissionStore>,
    role_store: Arc<dyn RoleStore>,
    dispatcher: PermissionEventDispatcher,
}

impl AuthorizationService {
    /// Creates a new authorization service from store implementations.
    #[must_use]
    pub fn new(
        store: Arc<dyn PermissionStore>,
        role_store: Arc<dyn RoleStore>,
        dispatcher: PermissionEventDispatcher,
    ) -> Self {
        Self {
            store,
            role_store,
            dispatcher,
        }
    }

    /// Returns a fresh handle for a user, with an empty permission cache.
    #[must_use]
    pub fn user(&self, user_id: UserId) -> UserHandle {
        UserHandle::new(
            user_id,
            self.store.clone(),
            self.role_store.clone(),
            self.dispatcher.clone(),
        )
    }

    /// Returns a fresh handle for a role, with an empty permission cache.
    #[must_use]
    pub fn role(&self, role: Role) -> RoleHandle {
        RoleHandle::new(role, self.store.clone(), self.dispatcher.clone())
    }

    /// Ensures a user holds the permission, reading through a fresh handle.
    pub async fn require_permission(
        &self,
        user_id: UserId,
        reference: PermissionReference,
    ) -> AppResult<()> {
        self.user(user_id).require_permission(reference).await
    }

    /// Returns whether the user currently holds the permission.
    pub async fn has_permission(
        &self,
        user_id: UserId,
        reference: PermissionReference,
    ) -> AppResult<bool> {
        self.user(user_id).has_permission(reference).await
    }
}
