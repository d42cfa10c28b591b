use std::fmt;
use std::str::FromStr;

use crate::domain::AppError;

/// Outbound channels a proposal can be broadcast on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Twitter,
    Reddit,
    Gab,
    Discord,
    Telegram,
}

impl Channel {
    /// All channels in persistence order.
    pub const ALL: [Channel; 5] =
        [Channel::Twitter, Channel::Reddit, Channel::Gab, Channel::Discord, Channel::Telegram];

    /// Payload key holding the publication flag for this channel.
    pub fn key(&self) -> &'static str {
        match self {
            Channel::Twitter => "twitter",
            Channel::Reddit => "reddit",
            Channel::Gab => "gab",
            Channel::Discord => "discord",
            Channel::Telegram => "telegram",
        }
    }

    /// Parse a channel from its payload key.
    pub fn from_key(name: &str) -> Option<Channel> {
        match name.trim().to_lowercase().as_str() {
            "twitter" => Some(Channel::Twitter),
            "reddit" => Some(Channel::Reddit),
            "gab" => Some(Channel::Gab),
            "discord" => Some(Channel::Discord),
            "telegram" => Some(Channel::Telegram),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Channel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::from_key(s).ok_or_else(|| {
            AppError::config_error(format!(
                "Unknown channel '{}': expected one of twitter, reddit, gab, discord, telegram",
                s
            ))
        })
    }
}
