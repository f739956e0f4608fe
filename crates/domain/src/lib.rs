//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod event;
mod permission;
mod reference;
mod role;
mod security;
mod subject;
mod user;

pub use event::{PermissionEvent, PermissionEventKind};
pub use permission::{Permission, PermissionId};
pub use reference::PermissionReference;
pub use role::{DEFAULT_ROLE_LEVEL, Role, RoleId};
pub use security::AuditAction;
pub use subject::PermissionSubject;
pub use user::UserId;
