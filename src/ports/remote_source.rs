//! Voting portal port definition.

use crate::domain::{AppError, RawProposal};

/// Open-list response with the entries that could not be read as proposals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenListing {
    pub proposals: Vec<RawProposal>,
    /// Entries dropped before parsing because they were not JSON objects.
    pub rejected: usize,
}

/// Port for reading proposal state from the voting portal.
pub trait RemoteSource: Send {
    /// Fetch every proposal currently open for voting. An empty list is valid.
    fn fetch_open_proposals(&self) -> Result<OpenListing, AppError>;

    /// Fetch the full record of one proposal.
    ///
    /// Implementations must fail with [`AppError::IdMismatch`] when the portal
    /// answers with a different `proposalId`.
    fn fetch_detail(&self, proposal_id: u64) -> Result<RawProposal, AppError>;
}
