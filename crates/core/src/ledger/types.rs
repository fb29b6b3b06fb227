//! Core ledger data types.

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::serde_time;

// ============================================================================
// Enumerations
// ============================================================================

/// Fee category assigned by the carrier/partner system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FeeType {
    Credit,
    Shipping,
    Storage,
    Receiving,
    Returns,
    Surcharge,
    Adjustment,
    Other,
}

impl FeeType {
    /// Returns the fee type as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeType::Credit => "Credit",
            FeeType::Shipping => "Shipping",
            FeeType::Storage => "Storage",
            FeeType::Receiving => "Receiving",
            FeeType::Returns => "Returns",
            FeeType::Surcharge => "Surcharge",
            FeeType::Adjustment => "Adjustment",
            FeeType::Other => "Other",
        }
    }

    /// Parse a stored fee type. Unknown values map to `Other`.
    pub fn parse(value: &str) -> Self {
        match value {
            "Credit" => FeeType::Credit,
            "Shipping" => FeeType::Shipping,
            "Storage" => FeeType::Storage,
            "Receiving" => FeeType::Receiving,
            "Returns" => FeeType::Returns,
            "Surcharge" => FeeType::Surcharge,
            "Adjustment" => FeeType::Adjustment,
            _ => FeeType::Other,
        }
    }
}

/// Kind of entity a transaction's `reference_id` points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    Shipment,
    Return,
    Order,
    Other,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Shipment => "Shipment",
            ReferenceType::Return => "Return",
            ReferenceType::Order => "Order",
            ReferenceType::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "Shipment" => ReferenceType::Shipment,
            "Return" => ReferenceType::Return,
            "Order" => ReferenceType::Order,
            _ => ReferenceType::Other,
        }
    }
}

/// Care ticket workflow status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "in_progress" => TicketStatus::InProgress,
            "resolved" => TicketStatus::Resolved,
            "closed" => TicketStatus::Closed,
            _ => TicketStatus::Open,
        }
    }

    /// Terminal tickets no longer move through the support workflow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

// ============================================================================
// Brand Attribution
// ============================================================================

/// Who a transaction's cost is attributed to.
///
/// `ParentAbsorbed` is the internal bucket for costs the parent company eats
/// instead of passing them through to a brand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrandAttribution {
    Brand { client_id: String },
    ParentAbsorbed,
}

impl BrandAttribution {
    pub fn brand(client_id: impl Into<String>) -> Self {
        Self::Brand {
            client_id: client_id.into(),
        }
    }

    /// The brand's client id, `None` for parent absorption.
    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::Brand { client_id } => Some(client_id),
            Self::ParentAbsorbed => None,
        }
    }

    pub fn is_parent_absorbed(&self) -> bool {
        matches!(self, Self::ParentAbsorbed)
    }
}

/// A known brand (billing client).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: String,
    pub name: String,
}

/// A billing period; once closed, its invoices have been issued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillingPeriod {
    pub id: String,
    #[serde(with = "serde_time")]
    pub period_start: DateTime<Utc>,
    #[serde(with = "serde_time")]
    pub period_end: DateTime<Utc>,
    #[serde(default, with = "serde_time::option")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl BillingPeriod {
    /// Returns true if `at` falls inside this period (inclusive on both ends).
    ///
    /// Bounds are whole seconds, so `at` is compared at second precision: a
    /// charge at `23:59:59.5` on the last day still belongs to the period.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        let at = at.trunc_subsecs(0);
        self.period_start <= at && at <= self.period_end
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// A care ticket that may carry a credit owed to a brand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub ticket_number: String,
    pub ticket_type: String,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub shipment_id: Option<String>,
    /// Only tickets with a positive amount are financial match candidates.
    #[serde(default)]
    pub credit_amount: Decimal,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "serde_time")]
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn summary(&self) -> TicketSummary {
        TicketSummary {
            id: self.id.clone(),
            ticket_number: self.ticket_number.clone(),
            status: self.status,
            credit_amount: self.credit_amount,
        }
    }
}

/// Compact view of a ticket embedded in a pending credit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketSummary {
    pub id: String,
    pub ticket_number: String,
    pub status: TicketStatus,
    pub credit_amount: Decimal,
}

// ============================================================================
// Transaction
// ============================================================================

/// Pending-credit sub-state: the credit was promised but not yet booked.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PendingCredit {
    pub credit_shipping_portion: Option<Decimal>,
    pub care_ticket: Option<TicketSummary>,
}

/// A billing-ledger entry that may need reconciliation.
///
/// On the wire the attribution is flattened into `clientId` and
/// `parentAbsorbed`, and the derived gap flags are emitted alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransactionWire", into = "TransactionWire")]
pub struct Transaction {
    pub id: String,
    /// Stable identifier assigned by the upstream system.
    pub transaction_id: String,
    pub attribution: Option<BrandAttribution>,
    pub reference_id: Option<String>,
    pub reference_type: Option<ReferenceType>,
    /// Signed amount. Credits are negative.
    pub cost: Decimal,
    pub currency_code: String,
    pub charge_date: DateTime<Utc>,
    pub fee_type: FeeType,
    pub care_ticket_id: Option<String>,
    pub comment: Option<String>,
    pub credit_reason: Option<String>,
    pub pending_credit: Option<PendingCredit>,
    pub disputed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Brand client id, if attributed to a brand.
    pub fn client_id(&self) -> Option<&str> {
        self.attribution.as_ref().and_then(|a| a.client_id())
    }

    pub fn is_credit(&self) -> bool {
        self.fee_type == FeeType::Credit
    }

    pub fn is_linked(&self) -> bool {
        self.care_ticket_id.is_some()
    }

    pub fn is_disputed(&self) -> bool {
        self.disputed_at.is_some()
    }

    /// Only unlinked credits are candidates for ticket matching.
    pub fn is_matchable(&self) -> bool {
        self.is_credit() && !self.is_linked()
    }

    /// The credit's magnitude, regardless of sign convention.
    pub fn amount(&self) -> Decimal {
        self.cost.abs()
    }

    pub fn shipment_reference(&self) -> Option<&str> {
        match self.reference_type {
            Some(ReferenceType::Shipment) => self.reference_id.as_deref(),
            _ => None,
        }
    }

    pub fn missing_brand(&self) -> bool {
        self.attribution.is_none()
    }

    pub fn missing_ticket(&self) -> bool {
        self.is_credit() && !self.is_linked()
    }

    pub fn missing_shipment(&self) -> bool {
        self.reference_id.is_none()
    }

    /// A misfit still has at least one open gap.
    pub fn is_misfit(&self) -> bool {
        self.missing_brand() || self.missing_ticket() || self.missing_shipment()
    }

    pub fn gaps(&self) -> Gaps {
        Gaps {
            brand: self.missing_brand(),
            shipment: self.missing_shipment(),
            ticket: self.missing_ticket(),
        }
    }
}

/// Open gap flags, or gaps closed by an action (same shape).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Gaps {
    pub brand: bool,
    pub shipment: bool,
    pub ticket: bool,
}

impl Gaps {
    pub fn any(&self) -> bool {
        self.brand || self.shipment || self.ticket
    }

    pub fn count(&self) -> usize {
        [self.brand, self.shipment, self.ticket]
            .iter()
            .filter(|g| **g)
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionWire {
    id: String,
    transaction_id: String,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    parent_absorbed: bool,
    #[serde(default)]
    reference_id: Option<String>,
    #[serde(default)]
    reference_type: Option<ReferenceType>,
    cost: Decimal,
    #[serde(default = "default_currency")]
    currency_code: String,
    #[serde(with = "serde_time")]
    charge_date: DateTime<Utc>,
    fee_type: FeeType,
    #[serde(default)]
    care_ticket_id: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    credit_reason: Option<String>,
    #[serde(default)]
    is_pending_credit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credit_shipping_portion: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    care_ticket: Option<TicketSummary>,
    #[serde(default, with = "serde_time::option", skip_serializing_if = "Option::is_none")]
    disputed_at: Option<DateTime<Utc>>,
    // Derived on output, ignored on input.
    #[serde(default)]
    missing_brand: bool,
    #[serde(default)]
    missing_ticket: bool,
    #[serde(default)]
    missing_shipment: bool,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl From<TransactionWire> for Transaction {
    fn from(wire: TransactionWire) -> Self {
        let attribution = if wire.parent_absorbed {
            Some(BrandAttribution::ParentAbsorbed)
        } else {
            wire.client_id.map(|client_id| BrandAttribution::Brand { client_id })
        };

        let pending_credit = wire.is_pending_credit.then(|| PendingCredit {
            credit_shipping_portion: wire.credit_shipping_portion,
            care_ticket: wire.care_ticket,
        });

        Self {
            id: wire.id,
            transaction_id: wire.transaction_id,
            attribution,
            reference_id: wire.reference_id,
            reference_type: wire.reference_type,
            cost: wire.cost,
            currency_code: wire.currency_code,
            charge_date: wire.charge_date,
            fee_type: wire.fee_type,
            care_ticket_id: wire.care_ticket_id,
            comment: wire.comment,
            credit_reason: wire.credit_reason,
            pending_credit,
            disputed_at: wire.disputed_at,
        }
    }
}

impl From<Transaction> for TransactionWire {
    fn from(tx: Transaction) -> Self {
        let gaps = tx.gaps();
        let (credit_shipping_portion, care_ticket) = match &tx.pending_credit {
            Some(p) => (p.credit_shipping_portion, p.care_ticket.clone()),
            None => (None, None),
        };

        Self {
            client_id: tx.client_id().map(String::from),
            parent_absorbed: tx
                .attribution
                .as_ref()
                .is_some_and(BrandAttribution::is_parent_absorbed),
            is_pending_credit: tx.pending_credit.is_some(),
            credit_shipping_portion,
            care_ticket,
            missing_brand: gaps.brand,
            missing_ticket: gaps.ticket,
            missing_shipment: gaps.shipment,
            id: tx.id,
            transaction_id: tx.transaction_id,
            reference_id: tx.reference_id,
            reference_type: tx.reference_type,
            cost: tx.cost,
            currency_code: tx.currency_code,
            charge_date: tx.charge_date,
            fee_type: tx.fee_type,
            care_ticket_id: tx.care_ticket_id,
            comment: tx.comment,
            credit_reason: tx.credit_reason,
            disputed_at: tx.disputed_at,
        }
    }
}
