//! The proposal record tracked from the voting portal.

mod channel;
mod lenient;
pub mod status;
mod tally;

pub use channel::Channel;
pub use tally::Tally;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::AppError;
use crate::domain::event::{ChangedFields, FieldChange, FieldValue, TrackedField};
use status::{STATE_ALLOCATED, STATE_OPEN, Trend};

/// Flat key/value payload as delivered by the portal or read from the store.
pub type RawProposal = serde_json::Map<String, Value>;

/// Keys every payload must carry.
pub const REQUIRED_FIELDS: [&str; 20] = [
    "proposalId",
    "proposalKey",
    "title",
    "url",
    "summary",
    "owner",
    "amountSmart",
    "amountUSD",
    "installment",
    "votingDeadline",
    "createdDate",
    "status",
    "voteYes",
    "voteNo",
    "voteAbstain",
    "percentYes",
    "percentNo",
    "percentAbstain",
    "currentStatus",
    "categoryTitle",
];

/// Keys that default to false when absent.
pub const OPTIONAL_FIELDS: [&str; 7] =
    ["reminder", "approval", "twitter", "reddit", "gab", "discord", "telegram"];

const DEADLINE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// One portal proposal.
///
/// Built only through [`Proposal::from_raw`], which enforces the required keys
/// and a known status. `reminder` and the channel flags are sticky: the
/// setters only ever move them from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub proposal_id: u64,
    pub proposal_key: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub owner: String,
    #[serde(deserialize_with = "lenient::amount")]
    pub amount_smart: f64,
    #[serde(rename = "amountUSD", deserialize_with = "lenient::amount")]
    pub amount_usd: f64,
    pub installment: i64,
    pub created_date: String,
    pub voting_deadline: String,
    pub status: String,
    pub current_status: String,
    pub vote_yes: Tally,
    pub vote_no: Tally,
    pub vote_abstain: Tally,
    pub percent_yes: Tally,
    pub percent_no: Tally,
    pub percent_abstain: Tally,
    pub category_title: String,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub approval: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    reminder: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    twitter: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    reddit: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    gab: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    discord: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    telegram: bool,
}

impl Proposal {
    /// Build a proposal from a flat payload.
    ///
    /// Fails with [`AppError::MissingField`] when a required key is absent,
    /// [`AppError::MalformedPayload`] when a value has the wrong type and
    /// [`AppError::InvalidState`] when the status is not a portal state.
    pub fn from_raw(raw: &RawProposal) -> Result<Self, AppError> {
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|key| !raw.contains_key(**key)) {
            return Err(AppError::MissingField((*missing).to_string()));
        }

        let proposal: Proposal = serde_json::from_value(Value::Object(raw.clone()))?;

        if !proposal.is_valid() {
            return Err(AppError::InvalidState(proposal.status));
        }

        Ok(proposal)
    }

    /// Flat payload including the optional flags, suitable for the store.
    pub fn to_raw(&self) -> Result<RawProposal, AppError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(AppError::MalformedPayload(format!(
                "proposal serialized to a non-object: {}",
                other
            ))),
        }
    }

    pub fn is_open(&self) -> bool {
        status::mentions(&self.status, STATE_OPEN)
    }

    pub fn is_allocated(&self) -> bool {
        status::mentions(&self.status, STATE_ALLOCATED)
    }

    pub fn is_valid(&self) -> bool {
        status::is_valid_state(&self.status)
    }

    pub fn is_passing(&self) -> bool {
        self.is_open() && status::trend(&self.current_status) == Trend::Passing
    }

    pub fn is_failing(&self) -> bool {
        self.is_open() && status::trend(&self.current_status) == Trend::Failing
    }

    /// Voting deadline as a UTC timestamp, if the portal's format is understood.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        let text = self.voting_deadline.trim().trim_end_matches('Z');
        DEADLINE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .map(|naive| naive.and_utc())
    }

    /// Seconds until the voting deadline, relative to `now`. Zero when the
    /// deadline cannot be parsed.
    pub fn remaining_seconds_at(&self, now: DateTime<Utc>) -> i64 {
        match self.deadline() {
            Some(deadline) => (deadline - now).num_seconds(),
            None => {
                log::error!(
                    "proposal {}: unparseable votingDeadline '{}'",
                    self.proposal_id,
                    self.voting_deadline
                );
                0
            }
        }
    }

    pub fn remaining_seconds(&self) -> i64 {
        self.remaining_seconds_at(Utc::now())
    }

    /// Human readable time left, e.g. `2 days, 3 hours`. Falls back to the
    /// raw deadline string when it cannot be parsed.
    pub fn remaining_text(&self) -> String {
        match self.deadline() {
            Some(deadline) => humanize_seconds((deadline - Utc::now()).num_seconds()),
            None => self.voting_deadline.clone(),
        }
    }

    pub fn created_display(&self) -> String {
        date_display(&self.created_date)
    }

    pub fn deadline_display(&self) -> String {
        date_display(&self.voting_deadline)
    }

    pub fn percent_yes_display(&self) -> String {
        self.percent_yes.display()
    }

    pub fn percent_no_display(&self) -> String {
        self.percent_no.display()
    }

    pub fn percent_abstain_display(&self) -> String {
        self.percent_abstain.display()
    }

    pub fn reminder(&self) -> bool {
        self.reminder
    }

    pub fn set_reminder(&mut self) {
        self.reminder = true;
    }

    pub fn is_published_on(&self, channel: Channel) -> bool {
        match channel {
            Channel::Twitter => self.twitter,
            Channel::Reddit => self.reddit,
            Channel::Gab => self.gab,
            Channel::Discord => self.discord,
            Channel::Telegram => self.telegram,
        }
    }

    pub fn mark_published(&mut self, channel: Channel) {
        match channel {
            Channel::Twitter => self.twitter = true,
            Channel::Reddit => self.reddit = true,
            Channel::Gab => self.gab = true,
            Channel::Discord => self.discord = true,
            Channel::Telegram => self.telegram = true,
        }
    }

    /// Carry over every sticky flag already set on `other`.
    pub fn absorb_sticky(&mut self, other: &Proposal) {
        if other.reminder {
            self.reminder = true;
        }
        for channel in Channel::ALL {
            if other.is_published_on(channel) {
                self.mark_published(channel);
            }
        }
    }

    /// `fresh` with this record's sticky flags preserved.
    pub fn refreshed_from(&self, fresh: &Proposal) -> Proposal {
        let mut merged = fresh.clone();
        merged.absorb_sticky(self);
        merged
    }

    pub fn tracked_value(&self, field: TrackedField) -> FieldValue {
        match field {
            TrackedField::VoteYes => FieldValue::Tally(self.vote_yes),
            TrackedField::VoteNo => FieldValue::Tally(self.vote_no),
            TrackedField::VoteAbstain => FieldValue::Tally(self.vote_abstain),
            TrackedField::Status => FieldValue::Text(self.status.clone()),
            TrackedField::CurrentStatus => FieldValue::Text(self.current_status.clone()),
        }
    }

    /// Changes between `self` (before) and `now` over the tally and status fields.
    pub fn tracked_changes(&self, now: &Proposal) -> ChangedFields {
        TrackedField::ALL
            .iter()
            .filter_map(|field| {
                let before = self.tracked_value(*field);
                let after = now.tracked_value(*field);
                (before != after).then_some((*field, FieldChange { before, now: after }))
            })
            .collect()
    }
}

fn date_display(raw: &str) -> String {
    format!("{} UTC", raw.trim().replacen('T', " ", 1))
}

fn humanize_seconds(secs: i64) -> String {
    if secs <= 0 {
        return "Now".to_string();
    }

    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    let plural = |n: i64, unit: &str| format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" });

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(plural(days, "day"));
    }
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 && days == 0 {
        parts.push(plural(minutes, "minute"));
    }
    if seconds > 0 && days == 0 && hours == 0 && minutes == 0 {
        parts.push(plural(seconds, "second"));
    }
    parts.join(", ")
}
