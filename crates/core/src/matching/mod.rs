//! Ticket suggestion engine for unlinked credit transactions.

mod config;
mod engine;
mod types;

pub use config::MatchingConfig;
pub use engine::{find_match, suggest_matches};
pub use types::{ClaimedTickets, Confidence, MatchRule, Suggestion, SuggestionSet};
