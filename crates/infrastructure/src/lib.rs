//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_permission_store;
mod postgres_audit_repository;
mod postgres_permission_store;
mod store_tables;
mod tracing_permission_event_listener;

pub use in_memory_permission_store::InMemoryPermissionStore;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_permission_store::PostgresPermissionStore;
pub use store_tables::StoreTables;
pub use tracing_permission_event_listener::TracingPermissionEventListener;
