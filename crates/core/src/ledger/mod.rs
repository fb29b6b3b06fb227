//! Billing ledger: transactions, care tickets, brands and billing periods.

pub mod serde_time;
mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteLedgerStore;
pub use store::{
    FeedKind, FeedPage, FeedQuery, LedgerError, LedgerSnapshot, LedgerStore, LinkFields,
    NewTicket,
};
pub use types::{
    BillingPeriod, Brand, BrandAttribution, FeeType, Gaps, PendingCredit, ReferenceType, Ticket,
    TicketStatus, TicketSummary, Transaction,
};
