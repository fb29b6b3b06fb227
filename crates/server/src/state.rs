use std::sync::Arc;

use misfits_core::{
    AuditHandle, AuditStore, BulkExecutor, Config, LedgerStore, ReconciliationCoordinator,
};

/// Shared application state
pub struct AppState {
    config: Config,
    ledger: Arc<dyn LedgerStore>,
    coordinator: Arc<ReconciliationCoordinator>,
    bulk: BulkExecutor<Arc<ReconciliationCoordinator>>,
    audit_store: Arc<dyn AuditStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        ledger: Arc<dyn LedgerStore>,
        audit_handle: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
    ) -> Self {
        let coordinator = Arc::new(
            ReconciliationCoordinator::new(Arc::clone(&ledger), config.reconcile.clone())
                .with_audit(audit_handle.clone()),
        );
        let bulk = BulkExecutor::new(
            Arc::clone(&coordinator),
            &config.bulk,
            config.reconcile.parent_display_name.clone(),
        )
        .with_audit(audit_handle);

        Self {
            config,
            ledger,
            coordinator,
            bulk,
            audit_store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &dyn LedgerStore {
        self.ledger.as_ref()
    }

    pub fn coordinator(&self) -> &ReconciliationCoordinator {
        &self.coordinator
    }

    pub fn bulk(&self) -> &BulkExecutor<Arc<ReconciliationCoordinator>> {
        &self.bulk
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }
}
