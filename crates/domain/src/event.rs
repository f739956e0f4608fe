use serde::{Deserialize, Serialize};

use crate::{PermissionId, PermissionSubject};

/// Phase of a permission association mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionEventKind {
    /// Emitted before rows are attached.
    Attaching,
    /// Emitted after rows were attached.
    Attached,
    /// Emitted before rows are detached.
    Detaching,
    /// Emitted after rows were detached.
    Detached,
    /// Emitted before the association set is synchronized.
    Syncing,
    /// Emitted after the association set was synchronized.
    Synced,
}

impl PermissionEventKind {
    /// Returns a stable label for this event kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attaching => "permission.attaching",
            Self::Attached => "permission.attached",
            Self::Detaching => "permission.detaching",
            Self::Detached => "permission.detached",
            Self::Syncing => "permission.syncing",
            Self::Synced => "permission.synced",
        }
    }

    /// Returns whether the event precedes the store write.
    #[must_use]
    pub fn is_before(&self) -> bool {
        matches!(self, Self::Attaching | Self::Detaching | Self::Syncing)
    }
}

/// Notification describing one phase of an association mutation.
///
/// `permission_ids` is `None` when the caller targeted every association of the
/// subject (detach all, sync to nothing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEvent {
    /// Event phase.
    pub kind: PermissionEventKind,
    /// Subject whose associations change.
    pub subject: PermissionSubject,
    /// Normalized permission ids passed to the store.
    pub permission_ids: Option<Vec<PermissionId>>,
}

impl PermissionEvent {
    /// Creates an event payload.
    #[must_use]
    pub fn new(
        kind: PermissionEventKind,
        subject: PermissionSubject,
        permission_ids: Option<Vec<PermissionId>>,
    ) -> Self {
        Self {
            kind,
            subject,
            permission_ids,
        }
    }
}
