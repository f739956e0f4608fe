use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rolegate_core::AppResult;
use rolegate_domain::{
    Permission, PermissionEvent, PermissionId, PermissionSubject, Role, RoleId, UserId,
};
use tokio::sync::Mutex;

use crate::{
    PermissionEventListener, PermissionStore, RolePermissionFilter, RoleStore, SyncChanges,
};

type SubjectKey = (&'static str, u64);

fn subject_key(subject: &PermissionSubject) -> SubjectKey {
    (subject.kind(), subject.key())
}

#[derive(Default)]
pub struct FakePermissionStore {
    pub permissions: Mutex<Vec<Permission>>,
    pub roles: Mutex<Vec<Role>>,
    pub associations: Mutex<HashMap<SubjectKey, BTreeSet<PermissionId>>>,
    pub memberships: Mutex<HashMap<UserId, BTreeSet<RoleId>>>,
    pub touches: Mutex<HashMap<SubjectKey, usize>>,
    pub reads: AtomicUsize,
}

impl FakePermissionStore {
    pub async fn with_permissions(names: &[&str]) -> Arc<Self> {
        let store = Arc::new(Self::default());
        for (index, name) in names.iter().enumerate() {
            store.add_permission(index as u64 + 1, name).await;
        }
        store
    }

    pub async fn add_permission(&self, id: u64, name: &str) -> Permission {
        let permission = Permission::new(PermissionId::new(id), name, format!("{name} access"))
            .unwrap_or_else(|_| unreachable!());
        self.permissions.lock().await.push(permission.clone());
        permission
    }

    pub async fn add_role(&self, id: u64, name: &str, level: u16) -> Role {
        let role = Role::new(RoleId::new(id), name, level).unwrap_or_else(|_| unreachable!());
        self.roles.lock().await.push(role.clone());
        role
    }

    pub async fn permission(&self, name: &str) -> Permission {
        self.permissions
            .lock()
            .await
            .iter()
            .find(|permission| permission.name() == name)
            .cloned()
            .unwrap_or_else(|| unreachable!())
    }

    pub async fn direct_ids(&self, subject: &PermissionSubject) -> BTreeSet<PermissionId> {
        self.associations
            .lock()
            .await
            .get(&subject_key(subject))
            .cloned()
            .unwrap_or_default()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionStore for FakePermissionStore {
    async fn find_permissions_by_ids(&self, ids: &[PermissionId]) -> AppResult<Vec<Permission>> {
        self.record_read();
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .filter(|permission| ids.contains(&permission.id()))
            .cloned()
            .collect())
    }

    async fn find_permissions_by_names(&self, names: &[String]) -> AppResult<Vec<Permission>> {
        self.record_read();
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .filter(|permission| names.iter().any(|name| name == permission.name()))
            .cloned()
            .collect())
    }

    async fn list_direct_permissions(
        &self,
        subject: &PermissionSubject,
    ) -> AppResult<Vec<Permission>> {
        self.record_read();
        let ids = self.direct_ids(subject).await;
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .filter(|permission| ids.contains(&permission.id()))
            .cloned()
            .collect())
    }

    async fn list_role_permissions(
        &self,
        filter: &RolePermissionFilter,
    ) -> AppResult<Vec<Permission>> {
        self.record_read();
        let roles = self.roles.lock().await;
        let associations = self.associations.lock().await;
        let mut ids = BTreeSet::new();
        for role in roles.iter().filter(|role| filter.admits(role)) {
            if let Some(granted) = associations.get(&("role", role.id().as_u64())) {
                ids.extend(granted.iter().copied());
            }
        }

        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .filter(|permission| ids.contains(&permission.id()))
            .cloned()
            .collect())
    }

    async fn attach_permissions(
        &self,
        subject: &PermissionSubject,
        ids: &[PermissionId],
        touch: bool,
    ) -> AppResult<Vec<PermissionId>> {
        let key = subject_key(subject);
        let mut associations = self.associations.lock().await;
        let entry = associations.entry(key).or_default();
        let attached = ids.iter().copied().filter(|id| entry.insert(*id)).collect();
        if touch {
            *self.touches.lock().await.entry(key).or_default() += 1;
        }
        Ok(attached)
    }

    async fn detach_permissions(
        &self,
        subject: &PermissionSubject,
        ids: Option<&[PermissionId]>,
        touch: bool,
    ) -> AppResult<u64> {
        let key = subject_key(subject);
        let mut associations = self.associations.lock().await;
        let entry = associations.entry(key).or_default();
        let removed = match ids {
            Some(ids) => ids.iter().filter(|id| entry.remove(*id)).count(),
            None => {
                let count = entry.len();
                entry.clear();
                count
            }
        };
        if touch {
            *self.touches.lock().await.entry(key).or_default() += 1;
        }
        Ok(removed as u64)
    }

    async fn sync_permissions(
        &self,
        subject: &PermissionSubject,
        ids: &[PermissionId],
        detaching: bool,
    ) -> AppResult<SyncChanges> {
        let mut associations = self.associations.lock().await;
        let entry = associations.entry(subject_key(subject)).or_default();
        let mut changes = SyncChanges::default();
        if detaching {
            let stale: Vec<PermissionId> = entry
                .iter()
                .copied()
                .filter(|id| !ids.contains(id))
                .collect();
            for id in &stale {
                entry.remove(id);
            }
            changes.detached = stale;
        }
        changes.attached = ids.iter().copied().filter(|id| entry.insert(*id)).collect();
        Ok(changes)
    }
}

#[async_trait]
impl RoleStore for FakePermissionStore {
    async fn list_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        self.record_read();
        let held = self
            .memberships
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .filter(|role| held.contains(&role.id()))
            .cloned()
            .collect())
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        Ok(self
            .memberships
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .insert(role_id))
    }

    async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<u64> {
        let removed = self
            .memberships
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .remove(&role_id);
        Ok(u64::from(removed))
    }
}

#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<PermissionEvent>>,
}

#[async_trait]
impl PermissionEventListener for RecordingListener {
    async fn handle(&self, event: &PermissionEvent) -> AppResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
