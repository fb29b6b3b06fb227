pub mod audit;
pub mod config;
pub mod ledger;
pub mod matching;
pub mod metrics;
pub mod reconcile;
pub mod testing;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditEventEnvelope, AuditFilter, AuditHandle,
    AuditRecord, AuditStore, AuditWriter, SqliteAuditStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    ServerConfig,
};
pub use ledger::{
    BillingPeriod, Brand, BrandAttribution, FeeType, FeedKind, FeedPage, FeedQuery, Gaps,
    LedgerError, LedgerSnapshot, LedgerStore, ReferenceType, SqliteLedgerStore, Ticket,
    TicketStatus, Transaction,
};
pub use matching::{
    find_match, suggest_matches, ClaimedTickets, Confidence, MatchRule, MatchingConfig,
    Suggestion, SuggestionSet,
};
pub use reconcile::{
    load_feed, BatchItem, BatchResult, BrandChoice, BrandOption, BulkAction, BulkConfig,
    BulkExecutor, BulkRequest, ClientConfig, DisputeOutcome, ErrorKind, MisfitFeed,
    MisfitsClient, ReconcileAction, ReconcileApi, ReconcileConfig, ReconcileError,
    ReconcileOutcome, ReconcileRequest, ReconciliationCoordinator,
};
