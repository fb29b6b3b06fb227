//! Testing utilities and mock implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use misfits_core::testing::{fixtures, MockReconcileApi};
//!
//! let store = SqliteLedgerStore::in_memory()?;
//! store.insert_transaction(&fixtures::credit("tx-1", dec!(-25.00)))?;
//! store.insert_ticket(&fixtures::ticket("tk-1", dec!(25.00)))?;
//! ```

mod mock_reconcile_api;

pub use mock_reconcile_api::MockReconcileApi;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;

    use crate::ledger::{
        BillingPeriod, Brand, BrandAttribution, FeeType, ReferenceType, Ticket, TicketStatus,
        Transaction,
    };

    /// Midnight UTC on the given date.
    pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn brand(id: &str, name: &str) -> Brand {
        Brand {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    /// An unlinked, unattributed credit charged on 2024-03-01.
    pub fn credit(id: &str, cost: Decimal) -> Transaction {
        Transaction {
            id: id.to_string(),
            transaction_id: format!("EXT-{}", id),
            attribution: None,
            reference_id: None,
            reference_type: None,
            cost,
            currency_code: "USD".to_string(),
            charge_date: date(2024, 3, 1),
            fee_type: FeeType::Credit,
            care_ticket_id: None,
            comment: None,
            credit_reason: None,
            pending_credit: None,
            disputed_at: None,
        }
    }

    /// A credit attributed to `client_id`.
    pub fn brand_credit(id: &str, client_id: &str, cost: Decimal) -> Transaction {
        Transaction {
            attribution: Some(BrandAttribution::brand(client_id)),
            ..credit(id, cost)
        }
    }

    /// A credit referencing a shipment.
    pub fn shipment_credit(id: &str, shipment_id: &str, cost: Decimal) -> Transaction {
        Transaction {
            reference_id: Some(shipment_id.to_string()),
            reference_type: Some(ReferenceType::Shipment),
            ..credit(id, cost)
        }
    }

    /// A non-credit charge with no brand.
    pub fn charge(id: &str, fee_type: FeeType, cost: Decimal) -> Transaction {
        Transaction {
            fee_type,
            ..credit(id, cost)
        }
    }

    /// An open ticket with no brand or shipment, created on 2024-03-05.
    pub fn ticket(id: &str, credit_amount: Decimal) -> Ticket {
        Ticket {
            id: id.to_string(),
            ticket_number: format!("T-{}", id),
            ticket_type: "Credit".to_string(),
            status: TicketStatus::Open,
            shipment_id: None,
            credit_amount,
            client_id: None,
            client_name: None,
            description: None,
            created_at: date(2024, 3, 5),
        }
    }

    pub fn brand_ticket(id: &str, client_id: &str, credit_amount: Decimal) -> Ticket {
        Ticket {
            client_id: Some(client_id.to_string()),
            ..ticket(id, credit_amount)
        }
    }

    pub fn shipment_ticket(id: &str, shipment_id: &str, credit_amount: Decimal) -> Ticket {
        Ticket {
            shipment_id: Some(shipment_id.to_string()),
            ..ticket(id, credit_amount)
        }
    }

    /// A calendar month, closed when `closed` is true. The end bound is the
    /// month's last whole second; `BillingPeriod::covers` compares at that
    /// precision.
    pub fn month(year: i32, month: u32, closed: bool) -> BillingPeriod {
        let start = date(year, month, 1);
        let next = if month == 12 {
            date(year + 1, 1, 1)
        } else {
            date(year, month + 1, 1)
        };
        BillingPeriod {
            id: format!("{}-{:02}", year, month),
            period_start: start,
            period_end: next - chrono::Duration::seconds(1),
            closed_at: closed.then_some(next),
        }
    }
}
