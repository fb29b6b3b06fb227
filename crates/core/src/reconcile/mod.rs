//! Reconciliation actions: single-transaction coordinator, bulk fan-out, and
//! the HTTP client for a remote service.

mod api;
mod bulk;
mod client;
mod config;
mod coordinator;
mod error;
mod feed;
mod types;

pub use api::ReconcileApi;
pub use bulk::BulkExecutor;
pub use client::{ClientConfig, MisfitsClient};
pub use config::{BulkConfig, ReconcileConfig};
pub use coordinator::ReconciliationCoordinator;
pub use error::{ErrorKind, ReconcileError};
pub use feed::load_feed;
pub use types::{
    closed_gaps, BatchItem, BatchResult, BrandChoice, BrandOption, BulkAction, BulkRequest,
    DisputeOutcome, MisfitFeed, ReconcileAction, ReconcileOutcome, ReconcileRequest,
};
