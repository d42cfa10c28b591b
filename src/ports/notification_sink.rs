//! Outbound notification port definition.

use crate::domain::ProposalEvent;

/// Port receiving reconciler events.
///
/// Delivery is fire-and-forget: `notify` must not block on downstream
/// confirmation and cannot fail from the caller's point of view.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: ProposalEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _event: ProposalEvent) {}
}
