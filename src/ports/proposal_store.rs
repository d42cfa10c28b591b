//! Proposal persistence port definition.

use crate::domain::{AppError, RawProposal};

/// Port for durable proposal storage.
///
/// Every call is atomic and may be made from any thread; implementations
/// serialize concurrent readers against the reconciler's writes.
pub trait ProposalStore: Send + Sync {
    /// All stored proposals ordered by `proposalId`.
    fn get_proposals(&self) -> Result<Vec<RawProposal>, AppError>;

    fn get_proposal(&self, proposal_id: u64) -> Result<Option<RawProposal>, AppError>;

    /// Insert a new proposal and return its id.
    fn add_proposal(&self, raw: &RawProposal) -> Result<u64, AppError>;

    /// Overwrite an existing proposal and return the number of rows touched.
    fn update_proposal(&self, raw: &RawProposal) -> Result<usize, AppError>;
}
