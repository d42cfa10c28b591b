//! Notification sinks for hosts without a chat transport of their own.

use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::domain::ProposalEvent;
use crate::ports::NotificationSink;

/// Writes every event to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: ProposalEvent) {
        match &event {
            ProposalEvent::Error(_) => log::error!(target: "propsync::events", "{}", event),
            _ => log::info!(target: "propsync::events", "{}", event),
        }
    }
}

/// Forwards events over a channel so a host can consume them on its own thread.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Mutex<Sender<ProposalEvent>>,
}

impl ChannelSink {
    /// Create a sink and the receiving end for the host.
    pub fn new() -> (Self, Receiver<ProposalEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender: Mutex::new(sender) }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: ProposalEvent) {
        let sender = match self.sender.lock() {
            Ok(sender) => sender,
            Err(poisoned) => poisoned.into_inner(),
        };
        if sender.send(event).is_err() {
            log::debug!("event receiver dropped; discarding event");
        }
    }
}
