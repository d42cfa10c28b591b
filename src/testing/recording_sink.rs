use std::sync::{Arc, Mutex};

use crate::domain::ProposalEvent;
use crate::ports::NotificationSink;

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<ProposalEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<ProposalEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn kinds(events: &[ProposalEvent]) -> Vec<&'static str> {
        events.iter().map(ProposalEvent::kind).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: ProposalEvent) {
        self.events.lock().unwrap().push(event);
    }
}
