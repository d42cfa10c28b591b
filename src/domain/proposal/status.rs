//! Status matching against the portal's free-form status strings.
//!
//! The portal embeds extra text and mixes casing and separators in both
//! `status` and `currentStatus`, so every predicate goes through
//! [`normalize`] and matches by substring.

pub const STATE_OPEN: &str = "open";
pub const STATE_ALLOCATED: &str = "allocated";
pub const STATE_COMPLETED: &str = "completed";
pub const STATE_NOT_FUNDED: &str = "not funded";
pub const STATE_DEACTIVATED: &str = "deactivated";

pub const VALID_STATES: [&str; 5] =
    [STATE_OPEN, STATE_ALLOCATED, STATE_COMPLETED, STATE_NOT_FUNDED, STATE_DEACTIVATED];

const VOTE_YES: &str = "yes";
const VOTE_NO: &str = "no";

/// Lowercase and fold `-`/`_` into spaces.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['-', '_'], " ")
}

pub fn mentions(raw: &str, needle: &str) -> bool {
    normalize(raw).contains(needle)
}

pub fn is_valid_state(status: &str) -> bool {
    let status = normalize(status);
    VALID_STATES.iter().any(|state| status.contains(state))
}

/// Vote trend read from `currentStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Passing,
    Failing,
    Undecided,
}

/// "yes" wins when both tokens appear so the two outcomes stay exclusive.
pub fn trend(current_status: &str) -> Trend {
    let current = normalize(current_status);
    if current.contains(VOTE_YES) {
        Trend::Passing
    } else if current.contains(VOTE_NO) {
        Trend::Failing
    } else {
        Trend::Undecided
    }
}
