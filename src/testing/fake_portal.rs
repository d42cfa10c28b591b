use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::{AppError, RawProposal};
use crate::ports::{OpenListing, RemoteSource};

#[derive(Default)]
struct PortalState {
    open: Vec<RawProposal>,
    rejected: usize,
    details: HashMap<u64, RawProposal>,
    fail_open: bool,
    fail_detail: bool,
    detail_calls: Vec<u64>,
}

/// Scripted portal. Clones share state so a test can keep a handle after
/// moving one into the reconciler.
#[derive(Clone, Default)]
pub struct FakePortal {
    state: Arc<Mutex<PortalState>>,
}

impl FakePortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_open(&self, open: Vec<RawProposal>) {
        self.state.lock().unwrap().open = open;
    }

    /// Report `rejected` unreadable entries alongside the open list.
    pub fn set_rejected(&self, rejected: usize) {
        self.state.lock().unwrap().rejected = rejected;
    }

    pub fn set_detail(&self, id: u64, raw: RawProposal) {
        self.state.lock().unwrap().details.insert(id, raw);
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    pub fn fail_detail(&self, fail: bool) {
        self.state.lock().unwrap().fail_detail = fail;
    }

    pub fn detail_calls(&self) -> Vec<u64> {
        self.state.lock().unwrap().detail_calls.clone()
    }
}

impl RemoteSource for FakePortal {
    fn fetch_open_proposals(&self) -> Result<OpenListing, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(AppError::Fetch("Invalid status code 503".into()));
        }
        Ok(OpenListing { proposals: state.open.clone(), rejected: state.rejected })
    }

    fn fetch_detail(&self, proposal_id: u64) -> Result<RawProposal, AppError> {
        let mut state = self.state.lock().unwrap();
        state.detail_calls.push(proposal_id);
        if state.fail_detail {
            return Err(AppError::Fetch("Invalid status code 502".into()));
        }
        state
            .details
            .get(&proposal_id)
            .cloned()
            .ok_or_else(|| AppError::Fetch(format!("Invalid status code 404 for {}", proposal_id)))
    }
}
