//! Reconciliation coordinator.
//!
//! Each action validates against the current ledger state, then issues one
//! atomic store write. The store re-checks link preconditions inside that
//! write, so a ticket claimed concurrently still fails cleanly.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::types::closed_gaps;
use super::{
    BrandChoice, DisputeOutcome, ReconcileAction, ReconcileApi, ReconcileConfig, ReconcileError,
    ReconcileOutcome, ReconcileRequest,
};
use crate::audit::{AuditEvent, AuditHandle};
use crate::ledger::{
    BrandAttribution, LedgerStore, LinkFields, NewTicket, ReferenceType, TicketStatus, Transaction,
};
use crate::metrics::RECONCILE_ACTIONS_TOTAL;

/// Ticket type recorded for tickets created from a credit.
const CREDIT_TICKET_TYPE: &str = "Credit";

/// Executes reconciliation actions against a ledger store.
pub struct ReconciliationCoordinator {
    store: Arc<dyn LedgerStore>,
    config: ReconcileConfig,
    audit: Option<AuditHandle>,
}

impl ReconciliationCoordinator {
    pub fn new(store: Arc<dyn LedgerStore>, config: ReconcileConfig) -> Self {
        Self {
            store,
            config,
            audit: None,
        }
    }

    /// Attach an audit handle; every action is then recorded.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Link an existing ticket, filling the brand and shipment from it where
    /// the transaction has none.
    pub async fn connect_ticket(
        &self,
        transaction_id: &str,
        ticket_id: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let result = self.do_connect_ticket(transaction_id, ticket_id).await;
        self.finish("connect_ticket", transaction_id, result).await
    }

    /// Create a ticket seeded from the credit and link it.
    ///
    /// The ticket is created already resolved when the transaction's billing
    /// period has been invoiced.
    pub async fn create_ticket(
        &self,
        transaction_id: &str,
        shipment_id: Option<String>,
        description: Option<String>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let result = self
            .do_create_ticket(transaction_id, shipment_id, description)
            .await;
        self.finish("create_ticket", transaction_id, result).await
    }

    /// Resolve only the brand gap.
    pub async fn set_brand(
        &self,
        transaction_id: &str,
        choice: BrandChoice,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let result = self.do_set_brand(transaction_id, choice).await;
        self.finish("set_brand", transaction_id, result).await
    }

    /// Move the transaction into the dispute workflow.
    pub async fn dispute_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<DisputeOutcome, ReconcileError> {
        let result = self.do_dispute(transaction_id).await;
        self.finish("dispute", transaction_id, result).await
    }

    async fn do_connect_ticket(
        &self,
        transaction_id: &str,
        ticket_id: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let before = self.load_unlinked_credit(transaction_id).await?;

        let ticket = self
            .store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| ReconcileError::TicketNotFound(ticket_id.to_string()))?;

        if let Some(claimed_by) = self.store.ticket_claimed_by(ticket_id).await? {
            return Err(ReconcileError::TicketClaimed {
                ticket_id: ticket_id.to_string(),
                claimed_by,
            });
        }

        let mut fields = LinkFields::default();
        if before.attribution.is_none() {
            fields.attribution = ticket.client_id.clone().map(BrandAttribution::brand);
        }
        if before.reference_id.is_none() {
            fields.reference = ticket
                .shipment_id
                .clone()
                .map(|shipment| (shipment, ReferenceType::Shipment));
        }

        let after = self
            .store
            .link_ticket(transaction_id, ticket_id, fields)
            .await?;
        let resolved = closed_gaps(&before, &after);

        info!(
            transaction_id,
            ticket_id,
            brand = resolved.brand,
            shipment = resolved.shipment,
            "Connected ticket"
        );
        self.emit(AuditEvent::TicketConnected {
            transaction_id: transaction_id.to_string(),
            ticket_id: ticket_id.to_string(),
            resolved,
        })
        .await;

        Ok(ReconcileOutcome::resolved(resolved))
    }

    async fn do_create_ticket(
        &self,
        transaction_id: &str,
        shipment_id: Option<String>,
        description: Option<String>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let shipment_id = non_blank(shipment_id);
        let description = non_blank(description);

        let before = self.load_unlinked_credit(transaction_id).await?;

        // The ticket and the transaction must end up on the same shipment.
        let shipment_id = match (before.reference_id.as_deref(), shipment_id) {
            (None, shipment_id) => shipment_id,
            (Some(_), None) => before.shipment_reference().map(String::from),
            (Some(existing), Some(requested)) => {
                if before.shipment_reference() != Some(requested.as_str()) {
                    return Err(ReconcileError::InvalidRequest(format!(
                        "Transaction {} already references {}, not shipment {}",
                        transaction_id, existing, requested
                    )));
                }
                Some(requested)
            }
        };

        let (client_id, client_name) = match &before.attribution {
            Some(BrandAttribution::Brand { client_id }) => {
                let name = self.store.get_brand(client_id).await?.map(|b| b.name);
                (Some(client_id.clone()), name)
            }
            Some(BrandAttribution::ParentAbsorbed) => {
                (None, Some(self.config.parent_display_name.clone()))
            }
            None => (None, None),
        };

        let auto_resolved = self.config.auto_resolve_closed_periods
            && self.store.is_period_closed(before.charge_date).await?;

        let mut fields = LinkFields::default();
        if before.reference_id.is_none() {
            fields.reference = shipment_id
                .clone()
                .map(|shipment| (shipment, ReferenceType::Shipment));
        }

        let new_ticket = NewTicket {
            number_prefix: self.config.ticket_number_prefix.clone(),
            ticket_type: CREDIT_TICKET_TYPE.to_string(),
            status: if auto_resolved {
                TicketStatus::Resolved
            } else {
                TicketStatus::Open
            },
            shipment_id,
            credit_amount: before.amount(),
            client_id,
            client_name,
            description: description.or_else(|| before.credit_reason.clone()),
        };

        let (ticket, after) = self
            .store
            .create_and_link_ticket(transaction_id, new_ticket, fields)
            .await?;
        let resolved = closed_gaps(&before, &after);

        info!(
            transaction_id,
            ticket_id = %ticket.id,
            ticket_number = %ticket.ticket_number,
            auto_resolved,
            "Created ticket"
        );
        self.emit(AuditEvent::TicketCreated {
            transaction_id: transaction_id.to_string(),
            ticket_id: ticket.id.clone(),
            ticket_number: ticket.ticket_number.clone(),
            auto_resolved,
            resolved,
        })
        .await;

        Ok(ReconcileOutcome::created(resolved, &ticket, auto_resolved))
    }

    async fn do_set_brand(
        &self,
        transaction_id: &str,
        choice: BrandChoice,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let before = self.load_open(transaction_id).await?;

        let attribution = match choice {
            BrandChoice::Brand(client_id) => {
                if self.store.get_brand(&client_id).await?.is_none() {
                    return Err(ReconcileError::UnknownBrand(client_id));
                }
                BrandAttribution::Brand { client_id }
            }
            BrandChoice::ParentAbsorbed => BrandAttribution::ParentAbsorbed,
        };

        let after = self
            .store
            .set_attribution(transaction_id, attribution.clone())
            .await?;
        let resolved = closed_gaps(&before, &after);

        info!(
            transaction_id,
            client_id = attribution.client_id(),
            parent_absorbed = attribution.is_parent_absorbed(),
            "Attributed brand"
        );
        self.emit(AuditEvent::BrandAttributed {
            transaction_id: transaction_id.to_string(),
            client_id: attribution.client_id().map(String::from),
            parent_absorbed: attribution.is_parent_absorbed(),
        })
        .await;

        Ok(ReconcileOutcome::resolved(resolved))
    }

    async fn do_dispute(&self, transaction_id: &str) -> Result<DisputeOutcome, ReconcileError> {
        self.load_open(transaction_id).await?;
        self.store.mark_disputed(transaction_id, Utc::now()).await?;

        info!(transaction_id, "Transaction disputed");
        self.emit(AuditEvent::TransactionDisputed {
            transaction_id: transaction_id.to_string(),
        })
        .await;

        Ok(DisputeOutcome {
            transaction_id: transaction_id.to_string(),
            disputed: true,
        })
    }

    /// Load a transaction that is still in the misfit workflow.
    async fn load_open(&self, transaction_id: &str) -> Result<Transaction, ReconcileError> {
        let transaction = self
            .store
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| ReconcileError::TransactionNotFound(transaction_id.to_string()))?;

        if transaction.is_disputed() {
            return Err(ReconcileError::Disputed(transaction_id.to_string()));
        }
        Ok(transaction)
    }

    /// Like `load_open`, and the transaction must be a credit without a
    /// ticket yet. Only credits are owed to a brand through a ticket.
    async fn load_unlinked_credit(
        &self,
        transaction_id: &str,
    ) -> Result<Transaction, ReconcileError> {
        let transaction = self.load_open(transaction_id).await?;
        if let Some(ref ticket_id) = transaction.care_ticket_id {
            return Err(ReconcileError::AlreadyLinked {
                transaction_id: transaction_id.to_string(),
                ticket_id: ticket_id.clone(),
            });
        }
        if !transaction.is_credit() {
            return Err(ReconcileError::InvalidRequest(format!(
                "Transaction {} is a {} charge, not a credit",
                transaction_id,
                transaction.fee_type.as_str()
            )));
        }
        Ok(transaction)
    }

    /// Record the outcome of an action in metrics and the audit trail.
    async fn finish<T>(
        &self,
        action: &'static str,
        transaction_id: &str,
        result: Result<T, ReconcileError>,
    ) -> Result<T, ReconcileError> {
        match &result {
            Ok(_) => {
                RECONCILE_ACTIONS_TOTAL
                    .with_label_values(&[action, "ok"])
                    .inc();
            }
            Err(e) => {
                let kind = e.kind();
                RECONCILE_ACTIONS_TOTAL
                    .with_label_values(&[action, kind.as_str()])
                    .inc();
                warn!(transaction_id, action, kind = kind.as_str(), "Reconcile action failed: {}", e);
                self.emit(AuditEvent::ReconcileFailed {
                    transaction_id: transaction_id.to_string(),
                    action: action.to_string(),
                    kind: kind.as_str().to_string(),
                    error: e.to_string(),
                })
                .await;
            }
        }
        result
    }

    async fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.emit(event).await;
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl ReconcileApi for ReconciliationCoordinator {
    async fn reconcile(&self, request: ReconcileRequest) -> Result<ReconcileOutcome, ReconcileError> {
        let ReconcileRequest {
            transaction_id,
            action,
        } = request;

        match action {
            ReconcileAction::ConnectTicket { ticket_id } => {
                self.connect_ticket(&transaction_id, &ticket_id).await
            }
            ReconcileAction::CreateTicket {
                shipment_id,
                description,
            } => {
                self.create_ticket(&transaction_id, shipment_id, description)
                    .await
            }
            ReconcileAction::SetBrand {
                client_id,
                parent_absorbed,
                confirmed,
            } => {
                let choice = BrandChoice::from_params(
                    client_id.as_deref(),
                    parent_absorbed,
                    confirmed,
                    &self.config.parent_display_name,
                );
                match choice {
                    Ok(choice) => self.set_brand(&transaction_id, choice).await,
                    Err(e) => self.finish("set_brand", &transaction_id, Err(e)).await,
                }
            }
        }
    }

    async fn dispute(&self, transaction_id: &str) -> Result<DisputeOutcome, ReconcileError> {
        self.dispute_transaction(transaction_id).await
    }
}
