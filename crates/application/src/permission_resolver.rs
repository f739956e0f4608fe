use std::collections::HashSet;
use std::sync::Arc;

use rolegate_core::AppResult;
use rolegate_domain::{Permission, PermissionSubject, Role, RoleId};
use tracing::debug;

use crate::{PermissionStore, RoleHolder, RolePermissionFilter};

/// Role participation of a subject, used for role-derived permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleScope {
    /// Subject does not take part in role holding.
    None,
    /// Subject is a role: its own grants plus every lower level.
    Role {
        /// Role identifier.
        role_id: RoleId,
        /// Role level.
        level: u16,
    },
    /// Subject holds roles through the role-holding capability.
    Holder {
        /// Held role identifiers.
        role_ids: Vec<RoleId>,
        /// Access level reported by the holder.
        level_access: u16,
    },
}

impl RoleScope {
    /// Scope of a role acting as a subject.
    #[must_use]
    pub fn for_role(role: &Role) -> Self {
        Self::Role {
            role_id: role.id(),
            level: role.level(),
        }
    }

    /// Scope of a subject exposing the role-holding capability.
    pub async fn for_holder(holder: &dyn RoleHolder) -> AppResult<Self> {
        let roles = holder.roles().await?;
        if roles.is_empty() {
            return Ok(Self::None);
        }

        Ok(Self::Holder {
            role_ids: roles.iter().map(Role::id).collect(),
            level_access: holder.level_for(&roles),
        })
    }

    /// Returns the join filter, or `None` when no role-derived grants apply.
    #[must_use]
    pub fn filter(&self) -> Option<RolePermissionFilter> {
        match self {
            Self::None => None,
            Self::Role { role_id, level } => Some(RolePermissionFilter {
                role_ids: vec![*role_id],
                below_level: *level,
            }),
            Self::Holder { role_ids, .. } if role_ids.is_empty() => None,
            Self::Holder {
                role_ids,
                level_access,
            } => Some(RolePermissionFilter {
                role_ids: role_ids.clone(),
                below_level: *level_access,
            }),
        }
    }
}

/// Computes and memoizes the effective permission set of one subject handle.
pub struct PermissionResolver {
    store: Arc<dyn PermissionStore>,
    cached: Option<Vec<Permission>>,
}

impl PermissionResolver {
    /// Creates a resolver with an empty cache.
    #[must_use]
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            cached: None,
        }
    }

    /// Returns the memoized set, if any.
    #[must_use]
    pub fn cached(&self) -> Option<&[Permission]> {
        self.cached.as_deref()
    }

    /// Returns the effective permission set, computing it on a cache miss.
    ///
    /// Direct permissions come first, followed by role-derived permissions
    /// not already present.
    pub async fn resolve(
        &mut self,
        subject: &PermissionSubject,
        scope: RoleScope,
    ) -> AppResult<Vec<Permission>> {
        if let Some(cached) = self.cached.as_ref() {
            return Ok(cached.clone());
        }

        let mut permissions = self.store.list_direct_permissions(subject).await?;

        if let Some(filter) = scope.filter() {
            let derived = self.store.list_role_permissions(&filter).await?;
            merge_unique(&mut permissions, derived);
        }

        debug!(%subject, permissions = permissions.len(), "resolved effective permissions");
        self.cached = Some(permissions.clone());

        Ok(permissions)
    }

    /// Drops the memoized set so the next read recomputes it.
    pub fn flush(&mut self) {
        self.cached = None;
    }
}

fn merge_unique(permissions: &mut Vec<Permission>, additional: Vec<Permission>) {
    let mut seen: HashSet<_> = permissions.iter().map(Permission::id).collect();
    for permission in additional {
        if seen.insert(permission.id()) {
            permissions.push(permission);
        }
    }
}
