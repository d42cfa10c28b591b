use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{Proposal, Tally};

/// Fields whose changes are reported as [`ProposalEvent::Updated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackedField {
    VoteYes,
    VoteNo,
    VoteAbstain,
    Status,
    CurrentStatus,
}

impl TrackedField {
    pub const ALL: [TrackedField; 5] = [
        TrackedField::VoteYes,
        TrackedField::VoteNo,
        TrackedField::VoteAbstain,
        TrackedField::Status,
        TrackedField::CurrentStatus,
    ];

    /// Payload key of the field.
    pub fn key(&self) -> &'static str {
        match self {
            TrackedField::VoteYes => "voteYes",
            TrackedField::VoteNo => "voteNo",
            TrackedField::VoteAbstain => "voteAbstain",
            TrackedField::Status => "status",
            TrackedField::CurrentStatus => "currentStatus",
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Tally(Tally),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Tally(tally) => write!(f, "{}", tally),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub before: FieldValue,
    pub now: FieldValue,
}

/// Only the fields that actually changed are present.
pub type ChangedFields = BTreeMap<TrackedField, FieldChange>;

/// Typed notification emitted by the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum ProposalEvent {
    /// First time the proposal was observed.
    Published(Proposal),
    /// Tally or status changed while the proposal is listed as open.
    Updated { changes: ChangedFields, proposal: Proposal },
    /// Voting deadline is within the reminder window. Emitted once per proposal.
    Reminder(Proposal),
    /// Proposal left the open list; carries the final record.
    Ended(Proposal),
    /// Non-fatal operational error for an operator channel.
    Error(String),
}

impl ProposalEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProposalEvent::Published(_) => "published",
            ProposalEvent::Updated { .. } => "updated",
            ProposalEvent::Reminder(_) => "reminder",
            ProposalEvent::Ended(_) => "ended",
            ProposalEvent::Error(_) => "error",
        }
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        match self {
            ProposalEvent::Published(p)
            | ProposalEvent::Reminder(p)
            | ProposalEvent::Ended(p)
            | ProposalEvent::Updated { proposal: p, .. } => Some(p),
            ProposalEvent::Error(_) => None,
        }
    }
}

impl fmt::Display for ProposalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalEvent::Updated { changes, proposal } => {
                write!(f, "updated #{}:", proposal.proposal_id)?;
                for (field, change) in changes {
                    write!(f, " {} {} -> {}", field, change.before, change.now)?;
                }
                Ok(())
            }
            ProposalEvent::Error(message) => write!(f, "error: {}", message),
            other => match other.proposal() {
                Some(p) => write!(f, "{} #{} ({}) [{}]", other.kind(), p.proposal_id, p.title, p.status),
                None => f.write_str(other.kind()),
            },
        }
    }
}
