//! Feed fetch followed by a matching pass.

use tracing::debug;

use super::{MisfitFeed, ReconcileError};
use crate::ledger::{FeedQuery, LedgerStore};
use crate::matching::{suggest_matches, MatchingConfig};

/// Load one feed page and compute suggestions against the unclaimed ticket pool.
///
/// Suggestions are recomputed on every call and never stored.
pub async fn load_feed(
    store: &dyn LedgerStore,
    query: &FeedQuery,
    config: &MatchingConfig,
) -> Result<MisfitFeed, ReconcileError> {
    let page = store.fetch_feed(query).await?;
    let suggestions = suggest_matches(&page.data, &page.available_tickets, config);

    debug!(
        rows = page.data.len(),
        total = page.total_count,
        suggestions = suggestions.len(),
        "Loaded misfit feed"
    );

    Ok(MisfitFeed {
        data: page.data,
        available_tickets: page.available_tickets,
        total_count: page.total_count,
        suggestions: suggestions.into_map(),
    })
}
