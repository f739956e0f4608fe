mod audit;
mod events;
mod stores;

pub use audit::{AuditEvent, AuditRepository};
pub use events::PermissionEventListener;
pub use stores::{PermissionStore, RolePermissionFilter, RoleStore, SyncChanges};
