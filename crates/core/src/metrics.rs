//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Matching passes (suggestions by confidence tier)
//! - Reconciliation actions (by action and result)
//! - Bulk fan-out (per-item outcomes)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts};

// =============================================================================
// Matching
// =============================================================================

/// Suggestions produced by matching passes.
pub static SUGGESTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "misfits_suggestions_total",
            "Total ticket suggestions produced by matching passes",
        ),
        &["confidence"], // "exact", "probable"
    )
    .unwrap()
});

/// Transactions evaluated per matching pass.
pub static MATCHING_PASS_SIZE: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "misfits_matching_pass_size",
            "Number of transactions evaluated per matching pass",
        )
        .buckets(vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0]),
    )
    .unwrap()
});

// =============================================================================
// Reconciliation
// =============================================================================

/// Reconciliation actions by action and result.
pub static RECONCILE_ACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "misfits_reconcile_actions_total",
            "Total reconciliation actions",
        ),
        &["action", "result"], // result: "ok", "validation", "not_found", "conflict", ...
    )
    .unwrap()
});

/// Bulk items by action and result.
pub static BULK_ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("misfits_bulk_items_total", "Total bulk operation items"),
        &["action", "result"], // result: "ok", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SUGGESTIONS_TOTAL.clone()),
        Box::new(MATCHING_PASS_SIZE.clone()),
        Box::new(RECONCILE_ACTIONS_TOTAL.clone()),
        Box::new(BULK_ITEMS_TOTAL.clone()),
    ]
}
