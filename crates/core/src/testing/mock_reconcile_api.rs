//! Mock reconciliation API for testing bulk fan-out and server wiring.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ledger::Gaps;
use crate::reconcile::{
    DisputeOutcome, ReconcileAction, ReconcileApi, ReconcileError, ReconcileOutcome,
    ReconcileRequest,
};

/// Mock implementation of the ReconcileApi trait.
///
/// Records every call and succeeds unless told otherwise:
/// - `fail_for` makes every call for one transaction id fail
/// - `set_next_error` fails the next call only
///
/// # Example
///
/// ```rust,ignore
/// let api = MockReconcileApi::new();
/// api.fail_for("tx-2", ReconcileError::Disputed("tx-2".into())).await;
///
/// api.dispute("tx-1").await?;
/// assert!(api.dispute("tx-2").await.is_err());
/// assert_eq!(api.dispute_calls().await, vec!["tx-1", "tx-2"]);
/// ```
#[derive(Debug, Default)]
pub struct MockReconcileApi {
    reconcile_calls: Arc<RwLock<Vec<ReconcileRequest>>>,
    dispute_calls: Arc<RwLock<Vec<String>>>,
    failures: Arc<RwLock<HashMap<String, ReconcileError>>>,
    next_error: Arc<RwLock<Option<ReconcileError>>>,
}

impl MockReconcileApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call for `transaction_id` with `error`.
    pub async fn fail_for(&self, transaction_id: impl Into<String>, error: ReconcileError) {
        self.failures
            .write()
            .await
            .insert(transaction_id.into(), error);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: ReconcileError) {
        *self.next_error.write().await = Some(error);
    }

    /// Recorded reconcile requests, in call order.
    pub async fn reconcile_calls(&self) -> Vec<ReconcileRequest> {
        self.reconcile_calls.read().await.clone()
    }

    /// Recorded dispute ids, in call order.
    pub async fn dispute_calls(&self) -> Vec<String> {
        self.dispute_calls.read().await.clone()
    }

    async fn check(&self, transaction_id: &str) -> Result<(), ReconcileError> {
        if let Some(e) = self.next_error.write().await.take() {
            return Err(e);
        }
        match self.failures.read().await.get(transaction_id) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReconcileApi for MockReconcileApi {
    async fn reconcile(&self, request: ReconcileRequest) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile_calls.write().await.push(request.clone());
        self.check(&request.transaction_id).await?;

        let resolved = match request.action {
            ReconcileAction::SetBrand { .. } => Gaps {
                brand: true,
                ..Gaps::default()
            },
            ReconcileAction::ConnectTicket { .. } | ReconcileAction::CreateTicket { .. } => Gaps {
                ticket: true,
                ..Gaps::default()
            },
        };
        Ok(ReconcileOutcome::resolved(resolved))
    }

    async fn dispute(&self, transaction_id: &str) -> Result<DisputeOutcome, ReconcileError> {
        self.dispute_calls
            .write()
            .await
            .push(transaction_id.to_string());
        self.check(transaction_id).await?;

        Ok(DisputeOutcome {
            transaction_id: transaction_id.to_string(),
            disputed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_and_fails_on_demand() {
        let api = MockReconcileApi::new();
        api.fail_for("tx-2", ReconcileError::Disputed("tx-2".to_string()))
            .await;

        assert!(api.dispute("tx-1").await.is_ok());
        assert!(api.dispute("tx-2").await.is_err());
        assert_eq!(api.dispute_calls().await, vec!["tx-1", "tx-2"]);
    }

    #[tokio::test]
    async fn test_next_error_is_consumed() {
        let api = MockReconcileApi::new();
        api.set_next_error(ReconcileError::Transport("down".to_string()))
            .await;

        assert!(api
            .reconcile(ReconcileRequest::set_brand("tx-1", "brandA"))
            .await
            .is_err());
        let outcome = api
            .reconcile(ReconcileRequest::set_brand("tx-1", "brandA"))
            .await
            .unwrap();
        assert!(outcome.resolved.brand);
        assert_eq!(api.reconcile_calls().await.len(), 2);
    }
}
