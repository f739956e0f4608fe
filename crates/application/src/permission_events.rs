use std::sync::Arc;

use async_trait::async_trait;
use rolegate_core::{AppError, AppResult};
use rolegate_domain::{AuditAction, PermissionEvent};

use crate::{AuditEvent, AuditRepository, PermissionEventListener};

/// Ordered list of listeners injected into subject handles.
#[derive(Clone, Default)]
pub struct PermissionEventDispatcher {
    listeners: Vec<Arc<dyn PermissionEventListener>>,
}

impl PermissionEventDispatcher {
    /// Creates a dispatcher without listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dispatcher with one more listener appended.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn PermissionEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Appends a listener.
    pub fn subscribe(&mut self, listener: Arc<dyn PermissionEventListener>) {
        self.listeners.push(listener);
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers the event to every listener in registration order.
    ///
    /// Stops at the first listener error.
    pub async fn dispatch(&self, event: &PermissionEvent) -> AppResult<()> {
        for listener in &self.listeners {
            listener.handle(event).await?;
        }

        Ok(())
    }
}

/// Listener recording completed mutations in the audit log.
#[derive(Clone)]
pub struct AuditPermissionEventListener {
    audit_repository: Arc<dyn AuditRepository>,
}

impl AuditPermissionEventListener {
    /// Creates a listener appending to the given repository.
    #[must_use]
    pub fn new(audit_repository: Arc<dyn AuditRepository>) -> Self {
        Self { audit_repository }
    }
}

#[async_trait]
impl PermissionEventListener for AuditPermissionEventListener {
    async fn handle(&self, event: &PermissionEvent) -> AppResult<()> {
        let Some(action) = AuditAction::from_event_kind(event.kind) else {
            return Ok(());
        };

        let ids = event
            .permission_ids
            .as_ref()
            .map(|ids| ids.iter().map(|id| id.as_u64()).collect::<Vec<_>>());
        let detail = serde_json::to_string(&ids).map_err(|error| {
            AppError::Internal(format!("failed to encode audit detail: {error}"))
        })?;

        self.audit_repository
            .append_event(AuditEvent {
                subject: event.subject.to_string(),
                action,
                resource_type: "permission".to_owned(),
                resource_id: event.subject.to_string(),
                detail: Some(detail),
            })
            .await
    }
}
