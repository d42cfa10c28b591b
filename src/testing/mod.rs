pub mod fake_portal;
pub mod recording_sink;

pub use fake_portal::FakePortal;
pub use recording_sink::RecordingSink;

use serde_json::{Value, json};

use crate::domain::{Proposal, RawProposal};

/// Complete portal payload with no votes cast and a far-away deadline.
pub fn raw_proposal(id: u64, status: &str) -> RawProposal {
    let value = json!({
        "proposalId": id,
        "proposalKey": format!("key-{}", id),
        "title": format!("Proposal {}", id),
        "url": format!("https://vote.example/proposal/{}", id),
        "summary": "Fund the thing",
        "owner": "alice",
        "amountSmart": 100000.0,
        "amountUSD": 1500.0,
        "installment": 1,
        "createdDate": "2018-01-01T10:00:00",
        "votingDeadline": "2099-01-01T00:00:00",
        "status": status,
        "voteYes": "NaN",
        "voteNo": "NaN",
        "voteAbstain": "NaN",
        "percentYes": "NaN",
        "percentNo": "NaN",
        "percentAbstain": "NaN",
        "currentStatus": "pending",
        "categoryTitle": "Development",
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!("fixture is an object literal"),
    }
}

pub fn proposal(id: u64, status: &str) -> Proposal {
    Proposal::from_raw(&raw_proposal(id, status)).unwrap()
}

/// `raw_proposal` with one field replaced.
pub fn with_field(mut raw: RawProposal, key: &str, value: impl Into<Value>) -> RawProposal {
    raw.insert(key.to_string(), value.into());
    raw
}
