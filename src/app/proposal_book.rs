//! Shared working set of every proposal seen so far, and the read-side
//! queries other components run against it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::domain::{AppError, Channel, Proposal};
use crate::ports::ProposalStore;

/// Cloneable handle over the in-memory working set and its backing store.
///
/// Writes go to the store first and reach memory only once persisted, under
/// the write lock, so readers never see a state the store does not hold.
#[derive(Clone)]
pub struct ProposalBook {
    proposals: Arc<RwLock<BTreeMap<u64, Proposal>>>,
    store: Arc<dyn ProposalStore>,
}

impl ProposalBook {
    pub fn new(store: Arc<dyn ProposalStore>) -> Self {
        Self { proposals: Arc::new(RwLock::new(BTreeMap::new())), store }
    }

    pub fn store(&self) -> &Arc<dyn ProposalStore> {
        &self.store
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<u64, Proposal>> {
        self.proposals.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<u64, Proposal>> {
        self.proposals.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the working set with already persisted proposals.
    pub(crate) fn load(&self, proposals: Vec<Proposal>) -> usize {
        let mut map = self.write();
        map.clear();
        map.extend(proposals.into_iter().map(|p| (p.proposal_id, p)));
        map.len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Proposal> {
        self.read().values().cloned().collect()
    }

    pub fn contains(&self, proposal_id: u64) -> bool {
        self.read().contains_key(&proposal_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Persist a newly observed proposal and add it to the working set.
    pub(crate) fn insert_new(&self, proposal: Proposal) -> Result<Proposal, AppError> {
        let raw = proposal.to_raw()?;
        let mut map = self.write();

        // A row the working set skipped at startup, readable or not, is
        // overwritten in place.
        if self.store.update_proposal(&raw)? == 0 {
            self.store.add_proposal(&raw)?;
        }

        map.insert(proposal.proposal_id, proposal.clone());
        Ok(proposal)
    }

    /// Persist a new version of a known proposal.
    ///
    /// Sticky flags already set on the current entry are merged in first, so a
    /// concurrent [`ProposalBook::mark_published`] is never undone.
    pub(crate) fn commit(&self, mut proposal: Proposal) -> Result<Proposal, AppError> {
        let mut map = self.write();
        if let Some(current) = map.get(&proposal.proposal_id) {
            proposal.absorb_sticky(current);
        }

        let raw = proposal.to_raw()?;
        if self.store.update_proposal(&raw)? == 0 {
            log::warn!("proposal {} missing from store, re-adding", proposal.proposal_id);
            self.store.add_proposal(&raw)?;
        }

        map.insert(proposal.proposal_id, proposal.clone());
        Ok(proposal)
    }

    /// Record that `channel` has broadcast the proposal.
    ///
    /// Returns `Ok(false)` for an unknown id. Setting an already set flag is a
    /// no-op that does not touch the store.
    pub fn mark_published(&self, proposal_id: u64, channel: Channel) -> Result<bool, AppError> {
        let mut map = self.write();
        let Some(current) = map.get(&proposal_id) else {
            return Ok(false);
        };
        if current.is_published_on(channel) {
            return Ok(true);
        }

        let mut updated = current.clone();
        updated.mark_published(channel);
        self.store.update_proposal(&updated.to_raw()?)?;
        map.insert(proposal_id, updated);
        Ok(true)
    }

    /// Every known proposal, ascending by id.
    pub fn get_all_proposals(&self) -> Vec<Proposal> {
        self.snapshot()
    }

    pub fn get_proposal(&self, proposal_id: u64) -> Option<Proposal> {
        self.read().get(&proposal_id).cloned()
    }

    /// Known proposals among `ids`, ascending. Unknown ids are left out.
    pub fn get_proposals(&self, ids: &[u64]) -> Vec<Proposal> {
        let wanted: BTreeSet<u64> = ids.iter().copied().collect();
        let map = self.read();
        wanted.iter().filter_map(|id| map.get(id).cloned()).collect()
    }

    /// Open proposals, optionally only those closing within `max_remaining_secs`.
    pub fn get_open_proposals(&self, max_remaining_secs: Option<i64>) -> Vec<Proposal> {
        let now = Utc::now();
        self.filtered(|p| {
            p.is_open()
                && max_remaining_secs.is_none_or(|limit| p.remaining_seconds_at(now) < limit)
        })
    }

    pub fn get_latest_proposal(&self) -> Option<Proposal> {
        self.read().values().next_back().cloned()
    }

    pub fn get_passing_proposals(&self) -> Vec<Proposal> {
        self.filtered(Proposal::is_passing)
    }

    pub fn get_failing_proposals(&self) -> Vec<Proposal> {
        self.filtered(Proposal::is_failing)
    }

    /// Proposals missing at least one of the requested channel flags.
    pub fn get_unpublished_proposals(&self, channels: &[Channel]) -> Vec<Proposal> {
        self.filtered(|p| channels.iter().any(|c| !p.is_published_on(*c)))
    }

    fn filtered(&self, predicate: impl Fn(&Proposal) -> bool) -> Vec<Proposal> {
        self.read().values().filter(|p| predicate(p)).cloned().collect()
    }
}
