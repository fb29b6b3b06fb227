//! HTTP service exposing misfit reconciliation.

pub mod api;
pub mod metrics;
pub mod state;
