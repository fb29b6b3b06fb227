//! The reconciliation boundary shared by in-process and remote callers.

use std::sync::Arc;

use async_trait::async_trait;

use super::{DisputeOutcome, ReconcileError, ReconcileOutcome, ReconcileRequest};

/// Mutating calls against one transaction.
///
/// Implemented by the in-process coordinator and by the HTTP client, so the
/// bulk executor can drive either.
#[async_trait]
pub trait ReconcileApi: Send + Sync {
    async fn reconcile(&self, request: ReconcileRequest) -> Result<ReconcileOutcome, ReconcileError>;

    async fn dispute(&self, transaction_id: &str) -> Result<DisputeOutcome, ReconcileError>;
}

#[async_trait]
impl<T: ReconcileApi + ?Sized> ReconcileApi for Arc<T> {
    async fn reconcile(&self, request: ReconcileRequest) -> Result<ReconcileOutcome, ReconcileError> {
        (**self).reconcile(request).await
    }

    async fn dispute(&self, transaction_id: &str) -> Result<DisputeOutcome, ReconcileError> {
        (**self).dispute(transaction_id).await
    }
}
