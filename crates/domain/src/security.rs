use serde::{Deserialize, Serialize};

use crate::PermissionEventKind;

/// Stable audit actions recorded for permission association changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when permissions are attached to a subject.
    PermissionsAttached,
    /// Emitted when permissions are detached from a subject.
    PermissionsDetached,
    /// Emitted when a subject's permissions are synchronized.
    PermissionsSynced,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionsAttached => "security.permissions.attached",
            Self::PermissionsDetached => "security.permissions.detached",
            Self::PermissionsSynced => "security.permissions.synced",
        }
    }

    /// Maps a completed mutation event to its audit action.
    ///
    /// Returns `None` for before-events, which are not audited.
    #[must_use]
    pub fn from_event_kind(kind: PermissionEventKind) -> Option<Self> {
        match kind {
            PermissionEventKind::Attached => Some(Self::PermissionsAttached),
            PermissionEventKind::Detached => Some(Self::PermissionsDetached),
            PermissionEventKind::Synced => Some(Self::PermissionsSynced),
            PermissionEventKind::Attaching
            | PermissionEventKind::Detaching
            | PermissionEventKind::Syncing => None,
        }
    }
}
