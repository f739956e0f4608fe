use async_trait::async_trait;
use tracing::{debug, info};

use rolegate_application::PermissionEventListener;
use rolegate_core::AppResult;
use rolegate_domain::PermissionEvent;

/// Listener that logs every permission event.
///
/// Before-events are logged at `debug`, completed mutations at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPermissionEventListener;

#[async_trait]
impl PermissionEventListener for TracingPermissionEventListener {
    async fn handle(&self, event: &PermissionEvent) -> AppResult<()> {
        let permission_ids = event
            .permission_ids
            .as_ref()
            .map(|ids| ids.iter().map(|id| id.as_u64()).collect::<Vec<_>>());

        if event.kind.is_before() {
            debug!(
                event = event.kind.as_str(),
                subject = %event.subject,
                ?permission_ids,
                "permission event"
            );
        } else {
            info!(
                event = event.kind.as_str(),
                subject = %event.subject,
                ?permission_ids,
                "permission event"
            );
        }

        Ok(())
    }
}
