use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolegate_application::{PermissionStore, RolePermissionFilter, RoleStore, SyncChanges};
use rolegate_core::{AppError, AppResult};
use rolegate_domain::{Permission, PermissionId, PermissionSubject, Role, RoleId, UserId};
use tokio::sync::RwLock;

/// Owner side of a permission association row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum AssociationOwner {
    User(UserId),
    Role(RoleId),
}

impl From<&PermissionSubject> for AssociationOwner {
    fn from(subject: &PermissionSubject) -> Self {
        match subject {
            PermissionSubject::User { id } => Self::User(*id),
            PermissionSubject::Role { role } => Self::Role(role.id()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AssociationTimestamps {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssociationTimestamps {
    fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }
}

type Associations = BTreeMap<(AssociationOwner, PermissionId), AssociationTimestamps>;

/// In-memory permission store.
///
/// Mirrors the relational schema: unique names, unique association pairs and
/// cascading deletes. Every read port call increments a query counter so
/// callers can observe caching behaviour.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    permissions: RwLock<BTreeMap<PermissionId, Permission>>,
    roles: RwLock<BTreeMap<RoleId, Role>>,
    associations: RwLock<Associations>,
    memberships: RwLock<BTreeSet<(UserId, RoleId)>>,
    last_permission_id: AtomicU64,
    last_role_id: AtomicU64,
    queries: AtomicUsize,
}

impl InMemoryPermissionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many read queries the store has served.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Creates a permission with a unique, trimmed name.
    pub async fn create_permission(
        &self,
        name: &str,
        description: &str,
    ) -> AppResult<Permission> {
        let name = name.trim();
        let mut permissions = self.permissions.write().await;
        if permissions.values().any(|existing| existing.name() == name) {
            return Err(AppError::Conflict(format!(
                "permission '{name}' already exists"
            )));
        }

        let id = PermissionId::new(self.last_permission_id.fetch_add(1, Ordering::SeqCst) + 1);
        let permission = Permission::new(id, name, description)?;
        permissions.insert(id, permission.clone());
        Ok(permission)
    }

    /// Creates a role with a unique, trimmed name.
    pub async fn create_role(&self, name: &str, level: u16) -> AppResult<Role> {
        let name = name.trim();
        let mut roles = self.roles.write().await;
        if roles.values().any(|existing| existing.name() == name) {
            return Err(AppError::Conflict(format!("role '{name}' already exists")));
        }

        let id = RoleId::new(self.last_role_id.fetch_add(1, Ordering::SeqCst) + 1);
        let role = Role::new(id, name, level)?;
        roles.insert(id, role.clone());
        Ok(role)
    }

    /// Deletes a permission and every association referencing it.
    pub async fn delete_permission(&self, id: PermissionId) -> AppResult<bool> {
        let removed = self.permissions.write().await.remove(&id).is_some();
        self.associations
            .write()
            .await
            .retain(|(_, permission_id), _| *permission_id != id);
        Ok(removed)
    }

    /// Deletes a role together with its grants and memberships.
    pub async fn delete_role(&self, id: RoleId) -> AppResult<bool> {
        let removed = self.roles.write().await.remove(&id).is_some();
        self.associations
            .write()
            .await
            .retain(|(owner, _), _| *owner != AssociationOwner::Role(id));
        self.memberships
            .write()
            .await
            .retain(|(_, role_id)| *role_id != id);
        Ok(removed)
    }

    /// Returns the `updated_at` timestamp of one association row.
    pub async fn association_updated_at(
        &self,
        subject: &PermissionSubject,
        permission_id: PermissionId,
    ) -> Option<DateTime<Utc>> {
        self.associations
            .read()
            .await
            .get(&(AssociationOwner::from(subject), permission_id))
            .map(|timestamps| timestamps.updated_at)
    }

    /// Returns the `created_at` timestamp of one association row.
    pub async fn association_created_at(
        &self,
        subject: &PermissionSubject,
        permission_id: PermissionId,
    ) -> Option<DateTime<Utc>> {
        self.associations
            .read()
            .await
            .get(&(AssociationOwner::from(subject), permission_id))
            .map(|timestamps| timestamps.created_at)
    }

    fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }

    async fn ensure_permissions_exist(&self, ids: &[PermissionId]) -> AppResult<()> {
        let permissions = self.permissions.read().await;
        match ids.iter().find(|id| !permissions.contains_key(*id)) {
            Some(missing) => Err(AppError::NotFound(format!(
                "permission '{missing}' was not found"
            ))),
            None => Ok(()),
        }
    }
}

fn touch_owner(associations: &mut Associations, owner: AssociationOwner) {
    let now = Utc::now();
    for ((row_owner, _), timestamps) in associations.iter_mut() {
        if *row_owner == owner {
            timestamps.updated_at = now;
        }
    }
}

fn owned_ids(associations: &Associations, owner: AssociationOwner) -> Vec<PermissionId> {
    associations
        .keys()
        .filter(|(row_owner, _)| *row_owner == owner)
        .map(|(_, permission_id)| *permission_id)
        .collect()
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn find_permissions_by_ids(&self, ids: &[PermissionId]) -> AppResult<Vec<Permission>> {
        self.record_query();
        let permissions = self.permissions.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| permissions.get(id).cloned())
            .collect())
    }

    async fn find_permissions_by_names(&self, names: &[String]) -> AppResult<Vec<Permission>> {
        self.record_query();
        Ok(self
            .permissions
            .read()
            .await
            .values()
            .filter(|permission| names.iter().any(|name| name == permission.name()))
            .cloned()
            .collect())
    }

    async fn list_direct_permissions(
        &self,
        subject: &PermissionSubject,
    ) -> AppResult<Vec<Permission>> {
        self.record_query();
        let permissions = self.permissions.read().await;
        let associations = self.associations.read().await;
        Ok(owned_ids(&associations, AssociationOwner::from(subject))
            .iter()
            .filter_map(|id| permissions.get(id).cloned())
            .collect())
    }

    async fn list_role_permissions(
        &self,
        filter: &RolePermissionFilter,
    ) -> AppResult<Vec<Permission>> {
        self.record_query();
        let permissions = self.permissions.read().await;
        let roles = self.roles.read().await;
        let associations = self.associations.read().await;

        let granted: BTreeSet<PermissionId> = associations
            .keys()
            .filter_map(|(owner, permission_id)| match owner {
                AssociationOwner::Role(role_id) => roles
                    .get(role_id)
                    .filter(|role| filter.admits(role))
                    .map(|_| *permission_id),
                AssociationOwner::User(_) => None,
            })
            .collect();

        Ok(granted
            .iter()
            .filter_map(|id| permissions.get(id).cloned())
            .collect())
    }

    async fn attach_permissions(
        &self,
        subject: &PermissionSubject,
        ids: &[PermissionId],
        touch: bool,
    ) -> AppResult<Vec<PermissionId>> {
        self.ensure_permissions_exist(ids).await?;
        let owner = AssociationOwner::from(subject);
        let mut associations = self.associations.write().await;

        if touch {
            touch_owner(&mut associations, owner);
        }

        let mut attached = Vec::new();
        for id in ids {
            if !associations.contains_key(&(owner, *id)) {
                associations.insert((owner, *id), AssociationTimestamps::now());
                attached.push(*id);
            }
        }

        Ok(attached)
    }

    async fn detach_permissions(
        &self,
        subject: &PermissionSubject,
        ids: Option<&[PermissionId]>,
        touch: bool,
    ) -> AppResult<u64> {
        let owner = AssociationOwner::from(subject);
        let mut associations = self.associations.write().await;
        let targets = match ids {
            Some(ids) => ids.to_vec(),
            None => owned_ids(&associations, owner),
        };

        let removed = targets
            .iter()
            .filter(|id| associations.remove(&(owner, **id)).is_some())
            .count();

        if touch {
            touch_owner(&mut associations, owner);
        }

        Ok(removed as u64)
    }

    async fn sync_permissions(
        &self,
        subject: &PermissionSubject,
        ids: &[PermissionId],
        detaching: bool,
    ) -> AppResult<SyncChanges> {
        self.ensure_permissions_exist(ids).await?;
        let owner = AssociationOwner::from(subject);
        let mut associations = self.associations.write().await;
        let mut changes = SyncChanges::default();

        if detaching {
            changes.detached = owned_ids(&associations, owner)
                .into_iter()
                .filter(|id| !ids.contains(id))
                .collect();
            for id in &changes.detached {
                associations.remove(&(owner, *id));
            }
        }

        for id in ids {
            if !associations.contains_key(&(owner, *id)) {
                associations.insert((owner, *id), AssociationTimestamps::now());
                changes.attached.push(*id);
            }
        }

        Ok(changes)
    }
}

#[async_trait]
impl RoleStore for InMemoryPermissionStore {
    async fn list_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        self.record_query();
        let roles = self.roles.read().await;
        Ok(self
            .memberships
            .read()
            .await
            .iter()
            .filter(|(member, _)| *member == user_id)
            .filter_map(|(_, role_id)| roles.get(role_id).cloned())
            .collect())
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        if !self.roles.read().await.contains_key(&role_id) {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        Ok(self.memberships.write().await.insert((user_id, role_id)))
    }

    async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<u64> {
        Ok(u64::from(
            self.memberships.write().await.remove(&(user_id, role_id)),
        ))
    }
}
