use async_trait::async_trait;
use rolegate_core::AppResult;
use rolegate_domain::{Permission, PermissionId, PermissionSubject, Role, RoleId, UserId};

/// Row filter applied to the permission/role join.
///
/// A joined row qualifies when its role is one of `role_ids` **or** its level
/// is strictly below `below_level`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissionFilter {
    /// Roles held by the subject (or the subject itself when it is a role).
    pub role_ids: Vec<RoleId>,
    /// Exclusive upper bound of inherited role levels.
    pub below_level: u16,
}

impl RolePermissionFilter {
    /// Returns whether a joined row for this role passes the filter.
    #[must_use]
    pub fn admits(&self, role: &Role) -> bool {
        self.role_ids.contains(&role.id()) || role.level() < self.below_level
    }
}

/// Association changes applied by a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncChanges {
    /// Ids newly associated with the subject.
    pub attached: Vec<PermissionId>,
    /// Ids no longer associated with the subject.
    pub detached: Vec<PermissionId>,
}

/// Repository port for permissions and their subject associations.
///
/// Bulk lookups must complete in one round trip. Missing rows are simply
/// absent from the result; callers decide whether that is an error.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Loads the permissions with the given ids.
    async fn find_permissions_by_ids(&self, ids: &[PermissionId]) -> AppResult<Vec<Permission>>;

    /// Loads the permissions with the given names.
    async fn find_permissions_by_names(&self, names: &[String]) -> AppResult<Vec<Permission>>;

    /// Lists permissions associated directly with the subject.
    async fn list_direct_permissions(
        &self,
        subject: &PermissionSubject,
    ) -> AppResult<Vec<Permission>>;

    /// Lists distinct permissions granted to roles admitted by the filter.
    async fn list_role_permissions(
        &self,
        filter: &RolePermissionFilter,
    ) -> AppResult<Vec<Permission>>;

    /// Associates permissions with the subject, ignoring existing pairs.
    ///
    /// Returns the ids that were not associated before. When `touch` is set
    /// the subject's surviving association rows get a fresh `updated_at`.
    async fn attach_permissions(
        &self,
        subject: &PermissionSubject,
        ids: &[PermissionId],
        touch: bool,
    ) -> AppResult<Vec<PermissionId>>;

    /// Removes the given associations, or all of them when `ids` is `None`.
    ///
    /// Returns the number of removed rows.
    async fn detach_permissions(
        &self,
        subject: &PermissionSubject,
        ids: Option<&[PermissionId]>,
        touch: bool,
    ) -> AppResult<u64>;

    /// Makes the subject's associations match `ids`.
    ///
    /// Without `detaching`, associations outside `ids` are kept.
    async fn sync_permissions(
        &self,
        subject: &PermissionSubject,
        ids: &[PermissionId],
        detaching: bool,
    ) -> AppResult<SyncChanges>;
}

/// Repository port for user role memberships.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Lists roles held by the user.
    async fn list_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>>;

    /// Adds a membership. Returns `false` when it already existed.
    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool>;

    /// Removes a membership. Returns the number of removed rows.
    async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<u64>;
}
