use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::domain::{AppError, RawProposal};
use crate::ports::ProposalStore;

/// In-memory proposal store.
#[derive(Debug, Clone, Default)]
pub struct MemoryProposalStore {
    // Arc<Mutex> so clones observe the same rows
    rows: Arc<Mutex<BTreeMap<u64, RawProposal>>>,
    add_calls: Arc<AtomicUsize>,
}

impl MemoryProposalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows directly, bypassing validation.
    pub fn with_rows(rows: impl IntoIterator<Item = RawProposal>) -> Self {
        let store = Self::new();
        {
            let mut map = store.rows();
            for raw in rows {
                if let Some(id) = raw.get("proposalId").and_then(Value::as_u64) {
                    map.insert(id, raw);
                }
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    /// Number of `add_proposal` calls so far, failed ones included.
    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    fn rows(&self) -> MutexGuard<'_, BTreeMap<u64, RawProposal>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn proposal_id(raw: &RawProposal) -> Result<u64, AppError> {
    raw.get("proposalId")
        .and_then(Value::as_u64)
        .ok_or_else(|| AppError::MissingField("proposalId".into()))
}

impl ProposalStore for MemoryProposalStore {
    fn get_proposals(&self) -> Result<Vec<RawProposal>, AppError> {
        Ok(self.rows().values().cloned().collect())
    }

    fn get_proposal(&self, proposal_id: u64) -> Result<Option<RawProposal>, AppError> {
        Ok(self.rows().get(&proposal_id).cloned())
    }

    fn add_proposal(&self, raw: &RawProposal) -> Result<u64, AppError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        let id = proposal_id(raw)?;
        let mut rows = self.rows();
        if rows.contains_key(&id) {
            return Err(AppError::Store(format!("proposal {} already stored", id)));
        }
        rows.insert(id, raw.clone());
        Ok(id)
    }

    fn update_proposal(&self, raw: &RawProposal) -> Result<usize, AppError> {
        let id = proposal_id(raw)?;
        let mut rows = self.rows();
        match rows.get_mut(&id) {
            Some(row) => {
                *row = raw.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
