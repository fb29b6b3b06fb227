//! Request and response types for the reconciliation boundary.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{ErrorKind, ReconcileError};
use crate::ledger::{Brand, Gaps, Ticket, Transaction};
use crate::matching::Suggestion;

// ============================================================================
// Single-transaction actions
// ============================================================================

/// A mutating call against one transaction.
///
/// Wire shape: `{ "transactionId": "...", "action": "connect_ticket", ...params }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub transaction_id: String,
    #[serde(flatten)]
    pub action: ReconcileAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Link an existing ticket.
    #[serde(rename_all = "camelCase")]
    ConnectTicket { ticket_id: String },

    /// Create a ticket from the credit and link it.
    #[serde(rename_all = "camelCase")]
    CreateTicket {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shipment_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },

    /// Resolve only the brand gap. Either `client_id`, or `parent_absorbed`
    /// together with `confirmed`.
    #[serde(rename_all = "camelCase")]
    SetBrand {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(default)]
        parent_absorbed: bool,
        #[serde(default)]
        confirmed: bool,
    },
}

impl ReconcileAction {
    pub fn name(&self) -> &'static str {
        match self {
            ReconcileAction::ConnectTicket { .. } => "connect_ticket",
            ReconcileAction::CreateTicket { .. } => "create_ticket",
            ReconcileAction::SetBrand { .. } => "set_brand",
        }
    }
}

impl ReconcileRequest {
    pub fn connect(transaction_id: impl Into<String>, ticket_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            action: ReconcileAction::ConnectTicket {
                ticket_id: ticket_id.into(),
            },
        }
    }

    pub fn create(
        transaction_id: impl Into<String>,
        shipment_id: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            action: ReconcileAction::CreateTicket {
                shipment_id,
                description,
            },
        }
    }

    pub fn set_brand(transaction_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            action: ReconcileAction::SetBrand {
                client_id: Some(client_id.into()),
                parent_absorbed: false,
                confirmed: false,
            },
        }
    }

    pub fn absorb(transaction_id: impl Into<String>, confirmed: bool) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            action: ReconcileAction::SetBrand {
                client_id: None,
                parent_absorbed: true,
                confirmed,
            },
        }
    }
}

/// Validated brand selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrandChoice {
    Brand(String),
    ParentAbsorbed,
}

impl BrandChoice {
    /// Validate raw `set_brand` parameters.
    ///
    /// `parent_name` is the display name of the absorption bucket; passing it
    /// as a client id is treated as a parent-absorption request.
    pub fn from_params(
        client_id: Option<&str>,
        parent_absorbed: bool,
        confirmed: bool,
        parent_name: &str,
    ) -> Result<Self, ReconcileError> {
        let client_id = client_id.map(str::trim).filter(|id| !id.is_empty());

        let wants_parent = parent_absorbed || client_id == Some(parent_name);
        if wants_parent {
            if matches!(client_id, Some(id) if id != parent_name) {
                return Err(ReconcileError::InvalidRequest(
                    "clientId and parentAbsorbed are mutually exclusive".to_string(),
                ));
            }
            if !confirmed {
                return Err(ReconcileError::ConfirmationRequired(parent_name.to_string()));
            }
            return Ok(BrandChoice::ParentAbsorbed);
        }

        client_id
            .map(|id| BrandChoice::Brand(id.to_string()))
            .ok_or_else(|| {
                ReconcileError::InvalidRequest("clientId or parentAbsorbed is required".to_string())
            })
    }
}

/// Result of a successful reconcile call.
///
/// `connect_ticket` and `set_brand` only fill `resolved`; `create_ticket`
/// also reports the new ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    /// Gaps this call actually closed.
    pub resolved: Gaps,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_resolved: Option<bool>,
}

impl ReconcileOutcome {
    pub fn resolved(resolved: Gaps) -> Self {
        Self {
            resolved,
            ticket_id: None,
            ticket_number: None,
            auto_resolved: None,
        }
    }

    pub fn created(resolved: Gaps, ticket: &Ticket, auto_resolved: bool) -> Self {
        Self {
            resolved,
            ticket_id: Some(ticket.id.clone()),
            ticket_number: Some(ticket.ticket_number.clone()),
            auto_resolved: Some(auto_resolved),
        }
    }
}

/// Gaps open before a write and closed after it.
pub fn closed_gaps(before: &Transaction, after: &Transaction) -> Gaps {
    let (b, a) = (before.gaps(), after.gaps());
    Gaps {
        brand: b.brand && !a.brand,
        shipment: b.shipment && !a.shipment,
        ticket: b.ticket && !a.ticket,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeOutcome {
    pub transaction_id: String,
    pub disputed: bool,
}

// ============================================================================
// Feed view
// ============================================================================

/// One feed page plus the suggestions computed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MisfitFeed {
    pub data: Vec<Transaction>,
    pub available_tickets: Vec<Ticket>,
    pub total_count: i64,
    /// Transaction id to suggestion.
    pub suggestions: std::collections::BTreeMap<String, Suggestion>,
}

/// Brand picker entry. The parent bucket is listed with `parentAbsorbed` set
/// and no id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandOption {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub parent_absorbed: bool,
}

impl BrandOption {
    /// Registry brands followed by the parent bucket.
    pub fn list(brands: Vec<Brand>, parent_name: &str) -> Vec<Self> {
        brands
            .into_iter()
            .map(|b| Self {
                id: Some(b.id),
                name: b.name,
                parent_absorbed: false,
            })
            .chain(std::iter::once(Self {
                id: None,
                name: parent_name.to_string(),
                parent_absorbed: true,
            }))
            .collect()
    }
}

// ============================================================================
// Bulk
// ============================================================================

/// Action applied to every transaction in a bulk selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BulkAction {
    /// Brand attribution. Same parameters as `set_brand`.
    #[serde(alias = "link", rename_all = "camelCase")]
    Attribute {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(default)]
        parent_absorbed: bool,
        #[serde(default)]
        confirmed: bool,
    },
    Dispute,
}

impl BulkAction {
    pub fn name(&self) -> &'static str {
        match self {
            BulkAction::Attribute { .. } => "attribute",
            BulkAction::Dispute => "dispute",
        }
    }

    pub fn attribute(client_id: impl Into<String>) -> Self {
        BulkAction::Attribute {
            client_id: Some(client_id.into()),
            parent_absorbed: false,
            confirmed: false,
        }
    }

    pub fn absorb(confirmed: bool) -> Self {
        BulkAction::Attribute {
            client_id: None,
            parent_absorbed: true,
            confirmed,
        }
    }
}

/// Bulk call: `{ "action": "dispute", "transactionIds": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    #[serde(flatten)]
    pub action: BulkAction,
    pub transaction_ids: Vec<String>,
}

/// Outcome for one transaction in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl BatchItem {
    pub fn from_result<T>(id: String, result: Result<T, ReconcileError>) -> Self {
        match result {
            Ok(_) => Self {
                id,
                ok: true,
                error: None,
                kind: None,
            },
            Err(e) => Self {
                id,
                ok: false,
                kind: Some(e.kind()),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Per-item results of a bulk operation. Not transactional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub items: Vec<BatchItem>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchResult {
    pub fn from_items(items: Vec<BatchItem>) -> Self {
        let succeeded = items.iter().filter(|i| i.ok).count();
        let failed = items.len() - succeeded;
        Self {
            items,
            succeeded,
            failed,
        }
    }

    /// Ids to offer for retry.
    pub fn failed_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| !i.ok)
            .map(|i| i.id.clone())
            .collect()
    }

    pub fn item(&self, id: &str) -> Option<&BatchItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn all_ok(&self) -> bool {
        self.failed == 0
    }
}

/// Selection order with duplicates removed.
pub(crate) fn dedup_selection(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
