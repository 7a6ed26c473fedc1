//! Bot detection.
//!
//! The classifier is a pure function of the User-Agent string; it never
//! touches the network or any shared state.

pub mod user_agent;

pub use user_agent::UserAgentClassifier;

use std::fmt;

/// Which check flagged a User-Agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    /// Matched a known crawler/bot token
    Pattern(String),
    /// Matched a secondary indicator (headless markers, bot info URLs)
    Indicator(String),
    /// Shorter than the minimum plausible browser User-Agent
    ShortUserAgent(usize),
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchReason::Pattern(token) => write!(f, "bot_pattern_{}", token.replace([' ', '-', '/'], "_")),
            MatchReason::Indicator(token) => write!(f, "bot_indicator_{}", token.replace([' ', '-', '/', ':', '.'], "_")),
            MatchReason::ShortUserAgent(len) => write!(f, "short_user_agent_{}", len),
        }
    }
}

/// Result of classifying a User-Agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Bot verdict
    pub is_bot: bool,
    /// The check that produced a positive verdict
    pub reason: Option<MatchReason>,
}

impl Classification {
    /// A User-Agent that passed every check.
    pub fn human() -> Self {
        Self::default()
    }

    /// A User-Agent flagged for the given reason.
    pub fn bot(reason: MatchReason) -> Self {
        Self {
            is_bot: true,
            reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(MatchReason::Pattern("go-http-client".into()).to_string(), "bot_pattern_go_http_client");
        assert_eq!(MatchReason::Indicator("headlesschrome".into()).to_string(), "bot_indicator_headlesschrome");
        assert_eq!(MatchReason::ShortUserAgent(0).to_string(), "short_user_agent_0");
    }

    #[test]
    fn test_classification_constructors() {
        assert!(!Classification::human().is_bot);
        let bot = Classification::bot(MatchReason::ShortUserAgent(3));
        assert!(bot.is_bot);
        assert_eq!(bot.reason, Some(MatchReason::ShortUserAgent(3)));
    }
}
