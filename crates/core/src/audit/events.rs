use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::Gaps;

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Reconciliation
    /// An existing ticket was linked to a transaction.
    TicketConnected {
        transaction_id: String,
        ticket_id: String,
        /// Gaps closed by the link
        resolved: Gaps,
    },
    /// A ticket was created for a transaction and linked to it.
    TicketCreated {
        transaction_id: String,
        ticket_id: String,
        ticket_number: String,
        /// Ticket was created terminal because the billing period is closed
        auto_resolved: bool,
        resolved: Gaps,
    },
    BrandAttributed {
        transaction_id: String,
        /// Brand client id, absent for parent absorption
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        parent_absorbed: bool,
    },
    TransactionDisputed {
        transaction_id: String,
    },
    /// A reconciliation action was rejected; nothing was written.
    ReconcileFailed {
        transaction_id: String,
        action: String,
        /// Error category (validation, not_found, conflict, ...)
        kind: String,
        error: String,
    },

    // Bulk operations
    BulkApplied {
        action: String,
        requested: usize,
        succeeded: usize,
        failed: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        failed_ids: Vec<String>,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::TicketConnected { .. } => "ticket_connected",
            Self::TicketCreated { .. } => "ticket_created",
            Self::BrandAttributed { .. } => "brand_attributed",
            Self::TransactionDisputed { .. } => "transaction_disputed",
            Self::ReconcileFailed { .. } => "reconcile_failed",
            Self::BulkApplied { .. } => "bulk_applied",
        }
    }

    /// Returns the transaction ID if this event is associated with one
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::TicketConnected { transaction_id, .. }
            | Self::TicketCreated { transaction_id, .. }
            | Self::BrandAttributed { transaction_id, .. }
            | Self::TransactionDisputed { transaction_id }
            | Self::ReconcileFailed { transaction_id, .. } => Some(transaction_id),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } | Self::BulkApplied { .. } => {
                None
            }
        }
    }

    /// Returns the ticket ID if this event is associated with one
    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            Self::TicketConnected { ticket_id, .. } | Self::TicketCreated { ticket_id, .. } => {
                Some(ticket_id)
            }
            _ => None,
        }
    }
}

/// Audit record as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub transaction_id: Option<String>,
    pub ticket_id: Option<String>,
    pub data: AuditEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_gaps() -> Gaps {
        Gaps {
            brand: true,
            shipment: true,
            ticket: true,
        }
    }

    #[test]
    fn test_event_type_service_started() {
        let event = AuditEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc123".to_string(),
        };
        assert_eq!(event.event_type(), "service_started");
        assert_eq!(event.transaction_id(), None);
        assert_eq!(event.ticket_id(), None);
    }

    #[test]
    fn test_ticket_connected_ids() {
        let event = AuditEvent::TicketConnected {
            transaction_id: "tx-1".to_string(),
            ticket_id: "tk-1".to_string(),
            resolved: all_gaps(),
        };
        assert_eq!(event.event_type(), "ticket_connected");
        assert_eq!(event.transaction_id(), Some("tx-1"));
        assert_eq!(event.ticket_id(), Some("tk-1"));
    }

    #[test]
    fn test_brand_attributed_has_no_ticket() {
        let event = AuditEvent::BrandAttributed {
            transaction_id: "tx-1".to_string(),
            client_id: None,
            parent_absorbed: true,
        };
        assert_eq!(event.event_type(), "brand_attributed");
        assert_eq!(event.transaction_id(), Some("tx-1"));
        assert_eq!(event.ticket_id(), None);

        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("client_id").is_none());
        assert_eq!(json["parent_absorbed"], true);
    }

    #[test]
    fn test_bulk_applied_is_not_per_transaction() {
        let event = AuditEvent::BulkApplied {
            action: "dispute".to_string(),
            requested: 3,
            succeeded: 2,
            failed: 1,
            failed_ids: vec!["tx-3".to_string()],
        };
        assert_eq!(event.event_type(), "bulk_applied");
        assert_eq!(event.transaction_id(), None);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let event = AuditEvent::TicketCreated {
            transaction_id: "tx-1".to_string(),
            ticket_id: "tk-9".to_string(),
            ticket_number: "CT-000009".to_string(),
            auto_resolved: true,
            resolved: all_gaps(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ticket_created\""));

        let parsed: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_audit_record_serialization() {
        let record = AuditRecord {
            id: 1,
            timestamp: Utc::now(),
            event_type: "service_started".to_string(),
            transaction_id: None,
            ticket_id: None,
            data: AuditEvent::ServiceStarted {
                version: "0.1.0".to_string(),
                config_hash: "abc123".to_string(),
            },
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"event_type\":\"service_started\""));
    }
}
