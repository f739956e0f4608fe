use async_trait::async_trait;
use rolegate_core::AppResult;
use rolegate_domain::PermissionEvent;

/// Observer notified before and after every association mutation.
#[async_trait]
pub trait PermissionEventListener: Send + Sync {
    /// Handles one event. An error aborts the surrounding mutation.
    async fn handle(&self, event: &PermissionEvent) -> AppResult<()>;
}
