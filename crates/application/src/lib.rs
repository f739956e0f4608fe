//! Application services and ports.

#![forbid(unsafe_code)]

mod authorization_service;
mod permission_events;
mod permission_holder;
mod permission_normalizer;
mod permission_ports;
mod permission_resolver;
mod subject_handles;

#[cfg(test)]
mod test_support;

pub use authorization_service::AuthorizationService;
pub use permission_events::{AuditPermissionEventListener, PermissionEventDispatcher};
pub use permission_holder::{PermissionAccess, PermissionHolder, RoleHolder};
pub use permission_normalizer::PermissionNormalizer;
pub use permission_ports::{
    AuditEvent, AuditRepository, PermissionEventListener, PermissionStore, RolePermissionFilter,
    RoleStore, SyncChanges,
};
pub use permission_resolver::{PermissionResolver, RoleScope};
pub use subject_handles::{RoleHandle, UserHandle};
