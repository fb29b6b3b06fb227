//! Heuristic ticket matching for credit transactions.
//!
//! Rules are tried in precedence order and the first hit wins. Tickets that an
//! earlier transaction already claimed in the same pass are skipped, so a
//! ticket appears in at most one suggestion per pass.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use super::{ClaimedTickets, Confidence, MatchRule, MatchingConfig, Suggestion, SuggestionSet};
use crate::ledger::{Ticket, Transaction};
use crate::metrics::{MATCHING_PASS_SIZE, SUGGESTIONS_TOTAL};

/// Find the best unclaimed ticket for one transaction.
///
/// Returns `None` for anything that is not an unlinked credit, and never
/// matches on amount alone.
pub fn find_match(
    transaction: &Transaction,
    candidates: &[Ticket],
    claimed: &ClaimedTickets,
    config: &MatchingConfig,
) -> Option<Suggestion> {
    if !transaction.is_matchable() {
        return None;
    }

    let available = || candidates.iter().filter(|t| !claimed.contains(&t.id));

    if let Some(shipment) = transaction.shipment_reference() {
        if let Some(ticket) = available().find(|t| t.shipment_id.as_deref() == Some(shipment)) {
            return Some(Suggestion::new(ticket.clone(), MatchRule::SameShipment));
        }
    }

    // Rules 2 and 3 need a real brand; parent-absorbed credits have none.
    let client_id = transaction.client_id()?;
    let amount = transaction.amount();
    let brand_and_amount = |ticket: &&Ticket| {
        ticket.client_id.as_deref() == Some(client_id)
            && amount_matches(ticket.credit_amount, amount, config.amount_tolerance)
    };

    if let Some(ticket) = available()
        .filter(brand_and_amount)
        .find(|t| within_window(t.created_at, transaction.charge_date, config))
    {
        return Some(Suggestion::new(ticket.clone(), MatchRule::BrandAmountDate));
    }

    available()
        .find(brand_and_amount)
        .map(|ticket| Suggestion::new(ticket.clone(), MatchRule::BrandAmount))
}

/// Run one matching pass over the feed, in feed order.
///
/// Each suggestion claims its ticket before the next transaction is
/// evaluated, so the first claimant wins.
pub fn suggest_matches(
    transactions: &[Transaction],
    candidates: &[Ticket],
    config: &MatchingConfig,
) -> SuggestionSet {
    let (suggestions, _claimed) = transactions.iter().fold(
        (SuggestionSet::new(), ClaimedTickets::new()),
        |(mut suggestions, mut claimed), transaction| {
            if let Some(suggestion) = find_match(transaction, candidates, &claimed, config) {
                claimed.claim(suggestion.ticket.id.clone());
                suggestions.push(transaction.id.clone(), suggestion);
            }
            (suggestions, claimed)
        },
    );

    MATCHING_PASS_SIZE.observe(transactions.len() as f64);
    for confidence in [Confidence::Exact, Confidence::Probable] {
        let count = suggestions.count(confidence) as u64;
        if count > 0 {
            SUGGESTIONS_TOTAL
                .with_label_values(&[confidence.as_str()])
                .inc_by(count);
        }
    }

    debug!(
        transactions = transactions.len(),
        candidates = candidates.len(),
        suggestions = suggestions.len(),
        "Matching pass complete"
    );

    suggestions
}

fn amount_matches(credit_amount: Decimal, amount: Decimal, tolerance: Decimal) -> bool {
    credit_amount > Decimal::ZERO && (credit_amount - amount).abs() < tolerance
}

fn within_window(created_at: DateTime<Utc>, charge_date: DateTime<Utc>, config: &MatchingConfig) -> bool {
    (created_at - charge_date).num_seconds().abs() <= config.date_window_secs()
}
