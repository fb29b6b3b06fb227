//! Ledger storage trait and request/response types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{BillingPeriod, Brand, BrandAttribution, FeeType, ReferenceType, Ticket, TicketStatus, Transaction};

/// Error type for ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The transaction already has a care ticket.
    #[error("Transaction {transaction_id} is already linked to ticket {ticket_id}")]
    TransactionAlreadyLinked {
        transaction_id: String,
        ticket_id: String,
    },

    /// Another transaction holds the ticket.
    #[error("Ticket {ticket_id} is already claimed by transaction {claimed_by}")]
    TicketAlreadyClaimed {
        ticket_id: String,
        claimed_by: String,
    },

    /// The transaction left the misfit workflow.
    #[error("Transaction {0} is in dispute")]
    TransactionDisputed(String),

    /// Stored data could not be decoded.
    #[error("Corrupt ledger data: {0}")]
    Corrupt(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    pub fn transaction_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Transaction",
            id: id.into(),
        }
    }

    pub fn ticket_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Ticket",
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}

/// Feed slice selected by the `type` filter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    /// Credits still waiting for a care ticket.
    Credit,
    /// Transactions without brand attribution.
    Unattributed,
    /// Credits promised but not yet booked.
    PendingCredits,
}

impl FeedKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "credit" => Some(FeedKind::Credit),
            "unattributed" => Some(FeedKind::Unattributed),
            "pending_credits" => Some(FeedKind::PendingCredits),
            _ => None,
        }
    }
}

/// Query for one page of the misfit feed.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub kind: Option<FeedKind>,
    pub fee_type: Option<FeeType>,
    /// Free-text search over identifiers and notes.
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedQuery {
    pub fn new() -> Self {
        Self {
            kind: None,
            fee_type: None,
            search: None,
            limit: 50,
            offset: 0,
        }
    }

    pub fn with_kind(mut self, kind: FeedKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_fee_type(mut self, fee_type: FeeType) -> Self {
        self.fee_type = Some(fee_type);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// One page of misfits plus the tickets still free to link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub data: Vec<Transaction>,
    /// Tickets not claimed by any transaction.
    pub available_tickets: Vec<Ticket>,
    pub total_count: i64,
}

/// Fields written alongside a ticket link. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkFields {
    pub attribution: Option<BrandAttribution>,
    pub reference: Option<(String, ReferenceType)>,
}

/// A ticket to be created by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    /// Prefix for the generated ticket number.
    pub number_prefix: String,
    pub ticket_type: String,
    pub status: TicketStatus,
    pub shipment_id: Option<String>,
    pub credit_amount: Decimal,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub description: Option<String>,
}

/// Bulk seed data for a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub brands: Vec<Brand>,
    #[serde(default)]
    pub billing_periods: Vec<BillingPeriod>,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Authoritative store for transactions, tickets and brands.
///
/// Write methods are conditional: each re-checks its preconditions inside a
/// single atomic unit and either applies every field or none.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fetch a page of the misfit feed together with the unclaimed ticket pool.
    async fn fetch_feed(&self, query: &FeedQuery) -> Result<FeedPage, LedgerError>;

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, LedgerError>;

    async fn get_ticket(&self, id: &str) -> Result<Option<Ticket>, LedgerError>;

    /// Id of the transaction holding the ticket, if any.
    async fn ticket_claimed_by(&self, ticket_id: &str) -> Result<Option<String>, LedgerError>;

    async fn get_brand(&self, client_id: &str) -> Result<Option<Brand>, LedgerError>;

    async fn list_brands(&self) -> Result<Vec<Brand>, LedgerError>;

    /// True if a closed billing period covers `at`.
    async fn is_period_closed(&self, at: DateTime<Utc>) -> Result<bool, LedgerError>;

    /// Link an existing ticket. Fails if the transaction is linked or disputed,
    /// or if the ticket was claimed concurrently.
    async fn link_ticket(
        &self,
        transaction_id: &str,
        ticket_id: &str,
        fields: LinkFields,
    ) -> Result<Transaction, LedgerError>;

    /// Create a ticket and link it in one atomic unit.
    async fn create_and_link_ticket(
        &self,
        transaction_id: &str,
        ticket: NewTicket,
        fields: LinkFields,
    ) -> Result<(Ticket, Transaction), LedgerError>;

    /// Overwrite the brand attribution.
    async fn set_attribution(
        &self,
        transaction_id: &str,
        attribution: BrandAttribution,
    ) -> Result<Transaction, LedgerError>;

    /// Move the transaction to the dispute workflow.
    async fn mark_disputed(
        &self,
        transaction_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_query_defaults() {
        let query = FeedQuery::new();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
        assert!(query.kind.is_none());
        assert!(query.fee_type.is_none());
        assert!(query.search.is_none());
    }

    #[test]
    fn test_feed_query_builder() {
        let query = FeedQuery::new()
            .with_kind(FeedKind::Unattributed)
            .with_fee_type(FeeType::Credit)
            .with_search("SHIP")
            .with_limit(10)
            .with_offset(20);
        assert_eq!(query.kind, Some(FeedKind::Unattributed));
        assert_eq!(query.fee_type, Some(FeeType::Credit));
        assert_eq!(query.search.as_deref(), Some("SHIP"));
        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 20);
    }

    #[test]
    fn test_feed_kind_parse() {
        assert_eq!(FeedKind::parse("credit"), Some(FeedKind::Credit));
        assert_eq!(FeedKind::parse("unattributed"), Some(FeedKind::Unattributed));
        assert_eq!(FeedKind::parse("pending_credits"), Some(FeedKind::PendingCredits));
        assert_eq!(FeedKind::parse("everything"), None);
    }

    #[test]
    fn test_error_messages() {
        let err = LedgerError::TicketAlreadyClaimed {
            ticket_id: "tk-1".to_string(),
            claimed_by: "tx-2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Ticket tk-1 is already claimed by transaction tx-2"
        );
        assert_eq!(
            LedgerError::transaction_not_found("tx-9").to_string(),
            "Transaction not found: tx-9"
        );
    }
}
