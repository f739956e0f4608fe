use async_trait::async_trait;
use rolegate_core::AppResult;
use rolegate_domain::AuditAction;

/// Immutable audit event payload emitted for permission changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Subject whose associations changed, rendered as `kind:key`.
    pub subject: String,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Optional audit detail payload.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
