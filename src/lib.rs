//! propsync: track voting portal proposals and emit typed change events.
//!
//! The [`Reconciler`] polls a [`ports::RemoteSource`], diffs the open list
//! against the proposals it already knows, persists the result through a
//! [`ports::ProposalStore`] and hands `Published`, `Updated`, `Reminder`,
//! `Ended` and `Error` events to a [`ports::NotificationSink`]. Chat delivery
//! is left to the host.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use adapters::{HttpPortalClient, SqliteProposalStore};
use ports::NotificationSink;

pub use app::{CycleReport, ProposalBook, Reconciler, SyncHandle, load_config};
pub use domain::{
    AppError, Channel, ChangedFields, FieldChange, FieldValue, Proposal, ProposalEvent,
    RawProposal, SyncConfig, Tally, TrackedField,
};

/// Open the configured SQLite store.
pub fn open_store(config: &SyncConfig) -> Result<SqliteProposalStore, AppError> {
    SqliteProposalStore::open(&config.storage.database_path)
}

/// Build a reconciler wired to the portal and the SQLite store, hydrated and
/// ready for its first cycle.
pub fn connect(
    config: &SyncConfig,
    sink: Arc<dyn NotificationSink>,
) -> Result<Reconciler, AppError> {
    config.validate()?;
    let remote = HttpPortalClient::new(&config.portal)?;
    let store = open_store(config)?;

    let mut reconciler =
        Reconciler::new(Box::new(remote), Arc::new(store), sink, config.reconcile);
    reconciler.hydrate()?;
    Ok(reconciler)
}

/// Connect and start the timer service.
pub fn start(config: &SyncConfig, sink: Arc<dyn NotificationSink>) -> Result<SyncHandle, AppError> {
    let reconciler = connect(config, sink)?;
    SyncHandle::spawn(reconciler, &config.schedule)
}
