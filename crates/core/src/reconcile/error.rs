//! Reconciliation error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;

/// Coarse error category. Drives HTTP status mapping and caller retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before any write.
    Validation,
    NotFound,
    /// State changed underneath the caller; refetch and retry.
    Conflict,
    /// Network failure talking to a remote service.
    Transport,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transport => "transport",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Error type for reconciliation actions.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReconcileError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown brand: {0}")]
    UnknownBrand(String),

    /// Parent absorption was requested without explicit confirmation.
    #[error("Attributing to {0} requires confirmation")]
    ConfirmationRequired(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Transaction {transaction_id} is already linked to ticket {ticket_id}")]
    AlreadyLinked {
        transaction_id: String,
        ticket_id: String,
    },

    #[error("Ticket {ticket_id} is already claimed by transaction {claimed_by}")]
    TicketClaimed {
        ticket_id: String,
        claimed_by: String,
    },

    #[error("Transaction {0} is in dispute")]
    Disputed(String),

    /// Error reported by a remote service, already categorized.
    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) | Self::UnknownBrand(_) | Self::ConfirmationRequired(_) => {
                ErrorKind::Validation
            }
            Self::TransactionNotFound(_) | Self::TicketNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyLinked { .. } | Self::TicketClaimed { .. } | Self::Disputed(_) => {
                ErrorKind::Conflict
            }
            Self::Remote { kind, .. } => *kind,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<LedgerError> for ReconcileError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound { entity: "Ticket", id } => Self::TicketNotFound(id),
            LedgerError::NotFound { id, .. } => Self::TransactionNotFound(id),
            LedgerError::TransactionAlreadyLinked {
                transaction_id,
                ticket_id,
            } => Self::AlreadyLinked {
                transaction_id,
                ticket_id,
            },
            LedgerError::TicketAlreadyClaimed {
                ticket_id,
                claimed_by,
            } => Self::TicketClaimed {
                ticket_id,
                claimed_by,
            },
            LedgerError::TransactionDisputed(id) => Self::Disputed(id),
            LedgerError::Corrupt(msg) | LedgerError::Database(msg) => Self::Store(msg),
        }
    }
}
