//! Bulk actions over a selection of transactions.

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::types::dedup_selection;
use super::{
    BatchItem, BatchResult, BrandChoice, BulkAction, BulkConfig, ReconcileApi, ReconcileRequest,
};
use crate::audit::{AuditEvent, AuditHandle};
use crate::metrics::BULK_ITEMS_TOTAL;

/// Fans one action out over many transactions with bounded concurrency.
///
/// Items are independent: a failure never rolls back or blocks the others.
pub struct BulkExecutor<A> {
    api: A,
    max_concurrency: usize,
    parent_display_name: String,
    audit: Option<AuditHandle>,
}

impl<A: ReconcileApi> BulkExecutor<A> {
    pub fn new(api: A, config: &BulkConfig, parent_display_name: impl Into<String>) -> Self {
        Self {
            api,
            max_concurrency: config.max_concurrency.max(1),
            parent_display_name: parent_display_name.into(),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Apply `action` to every id in `transaction_ids`.
    ///
    /// Duplicate ids are applied once. Results come back in selection order.
    /// Invalid attribution parameters fail every item without issuing a call.
    pub async fn apply(&self, action: &BulkAction, transaction_ids: &[String]) -> BatchResult {
        let ids = dedup_selection(transaction_ids);

        let items = match self.precheck(action) {
            Err(e) => {
                warn!(action = action.name(), "Rejected bulk action: {}", e);
                ids.into_iter()
                    .map(|id| BatchItem::from_result::<()>(id, Err(e.clone())))
                    .collect()
            }
            Ok(()) => self.fan_out(action, ids).await,
        };

        let result = BatchResult::from_items(items);
        self.record(action, &result).await;
        result
    }

    fn precheck(&self, action: &BulkAction) -> Result<(), super::ReconcileError> {
        if let BulkAction::Attribute {
            client_id,
            parent_absorbed,
            confirmed,
        } = action
        {
            BrandChoice::from_params(
                client_id.as_deref(),
                *parent_absorbed,
                *confirmed,
                &self.parent_display_name,
            )?;
        }
        Ok(())
    }

    async fn fan_out(&self, action: &BulkAction, ids: Vec<String>) -> Vec<BatchItem> {
        let mut results: Vec<(usize, BatchItem)> = stream::iter(ids.into_iter().enumerate())
            .map(|(idx, id)| async move {
                let item = match action {
                    BulkAction::Attribute {
                        client_id,
                        parent_absorbed,
                        confirmed,
                    } => {
                        let request = ReconcileRequest {
                            transaction_id: id.clone(),
                            action: super::ReconcileAction::SetBrand {
                                client_id: client_id.clone(),
                                parent_absorbed: *parent_absorbed,
                                confirmed: *confirmed,
                            },
                        };
                        let result = self.api.reconcile(request).await;
                        BatchItem::from_result(id, result)
                    }
                    BulkAction::Dispute => {
                        let result = self.api.dispute(&id).await;
                        BatchItem::from_result(id, result)
                    }
                };
                (idx, item)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, item)| item).collect()
    }

    async fn record(&self, action: &BulkAction, result: &BatchResult) {
        BULK_ITEMS_TOTAL
            .with_label_values(&[action.name(), "ok"])
            .inc_by(result.succeeded as u64);
        BULK_ITEMS_TOTAL
            .with_label_values(&[action.name(), "failed"])
            .inc_by(result.failed as u64);

        info!(
            action = action.name(),
            succeeded = result.succeeded,
            failed = result.failed,
            "Applied bulk action"
        );

        if let Some(ref audit) = self.audit {
            audit
                .emit(AuditEvent::BulkApplied {
                    action: action.name().to_string(),
                    requested: result.items.len(),
                    succeeded: result.succeeded,
                    failed: result.failed,
                    failed_ids: result.failed_ids(),
                })
                .await;
        }
    }
}
