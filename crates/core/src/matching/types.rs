//! Matching engine result types.

use std::collections::{BTreeMap, HashSet};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::ledger::Ticket;

/// How much a suggestion can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// High-precision rule matched.
    Exact,
    /// Weaker rule; needs human confirmation.
    Probable,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Exact => "exact",
            Confidence::Probable => "probable",
        }
    }
}

/// Matching rules, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Transaction's shipment reference equals the ticket's shipment.
    SameShipment,
    /// Same brand, amount within tolerance, created within the date window.
    BrandAmountDate,
    /// Same brand and amount, any date.
    BrandAmount,
}

impl MatchRule {
    pub fn confidence(&self) -> Confidence {
        match self {
            MatchRule::SameShipment | MatchRule::BrandAmountDate => Confidence::Exact,
            MatchRule::BrandAmount => Confidence::Probable,
        }
    }

    /// Human-readable justification shown next to the suggestion.
    pub fn reason(&self) -> &'static str {
        match self {
            MatchRule::SameShipment => "Same shipment ID",
            MatchRule::BrandAmountDate => "Same brand, amount, and date range",
            MatchRule::BrandAmount => "Same brand and amount",
        }
    }
}

/// A proposed ticket for a credit transaction. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub ticket: Ticket,
    pub confidence: Confidence,
    pub reason: String,
    pub rule: MatchRule,
}

impl Suggestion {
    pub fn new(ticket: Ticket, rule: MatchRule) -> Self {
        Self {
            ticket,
            confidence: rule.confidence(),
            reason: rule.reason().to_string(),
            rule,
        }
    }
}

/// Ticket ids already claimed earlier in the current pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimedTickets {
    ids: HashSet<String>,
}

impl ClaimedTickets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, ticket_id: &str) -> bool {
        self.ids.contains(ticket_id)
    }

    /// Record a claim. Returns false if the ticket was already claimed.
    pub fn claim(&mut self, ticket_id: impl Into<String>) -> bool {
        self.ids.insert(ticket_id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ClaimedTickets {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Suggestions from one pass, keyed by transaction id in feed order.
///
/// Serializes as a JSON object `{ transactionId: Suggestion }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionSet {
    entries: Vec<(String, Suggestion)>,
}

impl SuggestionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, transaction_id: String, suggestion: Suggestion) {
        self.entries.push((transaction_id, suggestion));
    }

    pub fn get(&self, transaction_id: &str) -> Option<&Suggestion> {
        self.entries
            .iter()
            .find(|(id, _)| id == transaction_id)
            .map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Suggestion)> {
        self.entries.iter().map(|(id, s)| (id.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keyed by transaction id, for wire responses.
    pub fn into_map(self) -> BTreeMap<String, Suggestion> {
        self.entries.into_iter().collect()
    }

    /// Number of suggestions with the given confidence.
    pub fn count(&self, confidence: Confidence) -> usize {
        self.entries
            .iter()
            .filter(|(_, s)| s.confidence == confidence)
            .count()
    }
}

impl Serialize for SuggestionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, suggestion) in &self.entries {
            map.serialize_entry(id, suggestion)?;
        }
        map.end()
    }
}
