//! Coordinator and bulk executor settings.

use serde::{Deserialize, Serialize};

/// Reconciliation coordinator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Display name of the parent company's absorbed-cost bucket.
    #[serde(default = "default_parent_display_name")]
    pub parent_display_name: String,
    /// Prefix for generated ticket numbers (`CT-000042`).
    #[serde(default = "default_ticket_number_prefix")]
    pub ticket_number_prefix: String,
    /// Create tickets already resolved when the billing period is invoiced.
    #[serde(default = "default_true")]
    pub auto_resolve_closed_periods: bool,
}

fn default_parent_display_name() -> String {
    "Jetpack (Parent)".to_string()
}

fn default_ticket_number_prefix() -> String {
    "CT".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            parent_display_name: default_parent_display_name(),
            ticket_number_prefix: default_ticket_number_prefix(),
            auto_resolve_closed_periods: true,
        }
    }
}

/// Bulk fan-out configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Maximum requests in flight per batch.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}
