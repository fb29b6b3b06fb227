//! SQLite-backed ledger store implementation.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use super::serde_time;
use super::{
    BillingPeriod, Brand, BrandAttribution, FeeType, FeedKind, FeedPage, FeedQuery, LedgerError,
    LedgerSnapshot, LedgerStore, LinkFields, NewTicket, PendingCredit, ReferenceType, Ticket,
    TicketStatus, TicketSummary, Transaction,
};

const TRANSACTION_SELECT: &str = "SELECT t.id, t.transaction_id, t.client_id, t.parent_absorbed, \
     t.reference_id, t.reference_type, t.cost, t.currency_code, t.charge_date, t.fee_type, \
     t.care_ticket_id, t.comment, t.credit_reason, t.is_pending_credit, \
     t.credit_shipping_portion, t.disputed_at, k.ticket_number, k.status, k.credit_amount \
     FROM transactions t LEFT JOIN tickets k ON k.id = t.care_ticket_id";

const TICKET_SELECT: &str = "SELECT k.id, k.ticket_number, k.ticket_type, k.status, k.shipment_id, \
     k.credit_amount, k.client_id, k.client_name, k.description, k.created_at FROM tickets k";

/// SQLite-backed ledger store.
pub struct SqliteLedgerStore {
    conn: Mutex<Connection>,
}

impl SqliteLedgerStore {
    /// Open (or create) a ledger database at `path`.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory ledger (useful for testing).
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS brands (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS billing_periods (
                id TEXT PRIMARY KEY,
                period_start TEXT NOT NULL,
                period_end TEXT NOT NULL,
                closed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                ticket_number TEXT NOT NULL UNIQUE,
                ticket_type TEXT NOT NULL,
                status TEXT NOT NULL,
                shipment_id TEXT,
                credit_amount TEXT NOT NULL DEFAULT '0',
                client_id TEXT,
                client_name TEXT,
                description TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                transaction_id TEXT NOT NULL,
                client_id TEXT,
                parent_absorbed INTEGER NOT NULL DEFAULT 0,
                reference_id TEXT,
                reference_type TEXT,
                cost TEXT NOT NULL,
                currency_code TEXT NOT NULL,
                charge_date TEXT NOT NULL,
                fee_type TEXT NOT NULL,
                care_ticket_id TEXT REFERENCES tickets(id),
                comment TEXT,
                credit_reason TEXT,
                is_pending_credit INTEGER NOT NULL DEFAULT 0,
                credit_shipping_portion TEXT,
                disputed_at TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sequences (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_care_ticket
                ON transactions(care_ticket_id) WHERE care_ticket_id IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_transactions_charge_date ON transactions(charge_date);
            CREATE INDEX IF NOT EXISTS idx_transactions_client_id ON transactions(client_id);
            CREATE INDEX IF NOT EXISTS idx_tickets_created_at ON tickets(created_at);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Database("ledger connection poisoned".to_string()))
    }

    /// Register a brand.
    pub fn insert_brand(&self, brand: &Brand) -> Result<(), LedgerError> {
        let conn = self.lock()?;
        insert_brand(&conn, brand)
    }

    /// Register a billing period.
    pub fn insert_billing_period(&self, period: &BillingPeriod) -> Result<(), LedgerError> {
        let conn = self.lock()?;
        insert_billing_period(&conn, period)
    }

    /// Insert a ticket as-is.
    pub fn insert_ticket(&self, ticket: &Ticket) -> Result<(), LedgerError> {
        let conn = self.lock()?;
        insert_ticket(&conn, ticket)
    }

    /// Insert a transaction as-is (ingestion path).
    pub fn insert_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        let conn = self.lock()?;
        insert_transaction(&conn, transaction)
    }

    /// Import a snapshot atomically. Tickets go in before transactions so
    /// existing links resolve.
    pub fn import(&self, snapshot: &LedgerSnapshot) -> Result<(), LedgerError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for brand in &snapshot.brands {
            insert_brand(&tx, brand)?;
        }
        for period in &snapshot.billing_periods {
            insert_billing_period(&tx, period)?;
        }
        for ticket in &snapshot.tickets {
            insert_ticket(&tx, ticket)?;
        }
        for transaction in &snapshot.transactions {
            insert_transaction(&tx, transaction)?;
        }

        tx.commit()?;
        debug!(
            brands = snapshot.brands.len(),
            tickets = snapshot.tickets.len(),
            transactions = snapshot.transactions.len(),
            "Imported ledger snapshot"
        );
        Ok(())
    }

    /// Import a JSON snapshot file.
    pub fn import_file(&self, path: &Path) -> Result<(), LedgerError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Database(format!("{}: {}", path.display(), e)))?;
        let snapshot: LedgerSnapshot =
            serde_json::from_str(&raw).map_err(|e| LedgerError::Corrupt(e.to_string()))?;
        self.import(&snapshot)
    }

    fn build_where_clause(query: &FeedQuery) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions: Vec<&str> = vec!["t.disputed_at IS NULL"];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        match query.kind {
            Some(FeedKind::Credit) => {
                conditions.push("t.fee_type = 'Credit' AND t.care_ticket_id IS NULL");
            }
            Some(FeedKind::Unattributed) => {
                conditions.push("t.client_id IS NULL AND t.parent_absorbed = 0");
            }
            // Pending credits are listed even when every gap is closed.
            Some(FeedKind::PendingCredits) => {
                conditions.push("t.is_pending_credit = 1");
            }
            None => {
                conditions.push(
                    "((t.client_id IS NULL AND t.parent_absorbed = 0) \
                     OR (t.fee_type = 'Credit' AND t.care_ticket_id IS NULL) \
                     OR t.reference_id IS NULL)",
                );
            }
        }

        if let Some(fee_type) = query.fee_type {
            conditions.push("t.fee_type = ?");
            params.push(Box::new(fee_type.as_str()));
        }

        if let Some(ref search) = query.search {
            let term = search.trim();
            if !term.is_empty() {
                conditions.push(
                    "(t.transaction_id LIKE ? ESCAPE '\\' OR t.reference_id LIKE ? ESCAPE '\\' \
                     OR t.comment LIKE ? ESCAPE '\\' OR t.credit_reason LIKE ? ESCAPE '\\')",
                );
                let pattern = format!("%{}%", escape_like(term));
                for _ in 0..4 {
                    params.push(Box::new(pattern.clone()));
                }
            }
        }

        (format!("WHERE {}", conditions.join(" AND ")), params)
    }
}

/// Escape LIKE wildcards so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// Row mapping
// ============================================================================

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(LedgerError::Corrupt(message)))
}

fn decimal_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, format!("{}: {}", raw, e)))
}

fn optional_decimal_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Decimal::from_str(&s).map_err(|e| conversion_error(idx, format!("{}: {}", s, e))))
        .transpose()
}

fn datetime_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    serde_time::parse(&raw).ok_or_else(|| conversion_error(idx, format!("invalid timestamp: {}", raw)))
}

fn optional_datetime_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_time::parse(&s).ok_or_else(|| conversion_error(idx, format!("invalid timestamp: {}", s))))
        .transpose()
}

fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
    let status: String = row.get(3)?;
    Ok(Ticket {
        id: row.get(0)?,
        ticket_number: row.get(1)?,
        ticket_type: row.get(2)?,
        status: TicketStatus::parse(&status),
        shipment_id: row.get(4)?,
        credit_amount: decimal_at(row, 5)?,
        client_id: row.get(6)?,
        client_name: row.get(7)?,
        description: row.get(8)?,
        created_at: datetime_at(row, 9)?,
    })
}

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let client_id: Option<String> = row.get(2)?;
    let parent_absorbed: bool = row.get(3)?;
    let reference_type: Option<String> = row.get(5)?;
    let fee_type: String = row.get(9)?;
    let care_ticket_id: Option<String> = row.get(10)?;
    let is_pending_credit: bool = row.get(13)?;

    let attribution = if parent_absorbed {
        Some(BrandAttribution::ParentAbsorbed)
    } else {
        client_id.map(|client_id| BrandAttribution::Brand { client_id })
    };

    let pending_credit = if is_pending_credit {
        let ticket_number: Option<String> = row.get(16)?;
        let care_ticket = match (&care_ticket_id, ticket_number) {
            (Some(id), Some(ticket_number)) => {
                let status: String = row.get(17)?;
                Some(TicketSummary {
                    id: id.clone(),
                    ticket_number,
                    status: TicketStatus::parse(&status),
                    credit_amount: decimal_at(row, 18)?,
                })
            }
            _ => None,
        };
        Some(PendingCredit {
            credit_shipping_portion: optional_decimal_at(row, 14)?,
            care_ticket,
        })
    } else {
        None
    };

    Ok(Transaction {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        attribution,
        reference_id: row.get(4)?,
        reference_type: reference_type.as_deref().map(ReferenceType::parse),
        cost: decimal_at(row, 6)?,
        currency_code: row.get(7)?,
        charge_date: datetime_at(row, 8)?,
        fee_type: FeeType::parse(&fee_type),
        care_ticket_id,
        comment: row.get(11)?,
        credit_reason: row.get(12)?,
        pending_credit,
        disputed_at: optional_datetime_at(row, 15)?,
    })
}

// ============================================================================
// Statement helpers (work on a plain connection or inside a transaction)
// ============================================================================

fn insert_brand(conn: &Connection, brand: &Brand) -> Result<(), LedgerError> {
    conn.execute(
        "INSERT INTO brands (id, name) VALUES (?, ?)",
        params![brand.id, brand.name],
    )?;
    Ok(())
}

fn insert_billing_period(conn: &Connection, period: &BillingPeriod) -> Result<(), LedgerError> {
    conn.execute(
        "INSERT INTO billing_periods (id, period_start, period_end, closed_at) VALUES (?, ?, ?, ?)",
        params![
            period.id,
            period.period_start.to_rfc3339(),
            period.period_end.to_rfc3339(),
            period.closed_at.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(())
}

fn insert_ticket(conn: &Connection, ticket: &Ticket) -> Result<(), LedgerError> {
    conn.execute(
        "INSERT INTO tickets (id, ticket_number, ticket_type, status, shipment_id, credit_amount, client_id, client_name, description, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            ticket.id,
            ticket.ticket_number,
            ticket.ticket_type,
            ticket.status.as_str(),
            ticket.shipment_id,
            ticket.credit_amount.to_string(),
            ticket.client_id,
            ticket.client_name,
            ticket.description,
            ticket.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<(), LedgerError> {
    let parent_absorbed = tx
        .attribution
        .as_ref()
        .is_some_and(BrandAttribution::is_parent_absorbed);
    let credit_shipping_portion = tx
        .pending_credit
        .as_ref()
        .and_then(|p| p.credit_shipping_portion)
        .map(|d| d.to_string());

    conn.execute(
        "INSERT INTO transactions (id, transaction_id, client_id, parent_absorbed, reference_id, reference_type, cost, currency_code, charge_date, fee_type, care_ticket_id, comment, credit_reason, is_pending_credit, credit_shipping_portion, disputed_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            tx.id,
            tx.transaction_id,
            tx.client_id(),
            parent_absorbed,
            tx.reference_id,
            tx.reference_type.map(|r| r.as_str()),
            tx.cost.to_string(),
            tx.currency_code,
            tx.charge_date.to_rfc3339(),
            tx.fee_type.as_str(),
            tx.care_ticket_id,
            tx.comment,
            tx.credit_reason,
            tx.pending_credit.is_some(),
            credit_shipping_portion,
            tx.disputed_at.map(|dt| dt.to_rfc3339()),
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| map_link_violation(e, tx.care_ticket_id.as_deref().unwrap_or_default()))?;
    Ok(())
}

fn load_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>, LedgerError> {
    let sql = format!("{} WHERE t.id = ?", TRANSACTION_SELECT);
    Ok(conn
        .query_row(&sql, params![id], row_to_transaction)
        .optional()?)
}

fn load_ticket(conn: &Connection, id: &str) -> Result<Option<Ticket>, LedgerError> {
    let sql = format!("{} WHERE k.id = ?", TICKET_SELECT);
    Ok(conn.query_row(&sql, params![id], row_to_ticket).optional()?)
}

fn claimed_by(conn: &Connection, ticket_id: &str) -> Result<Option<String>, LedgerError> {
    Ok(conn
        .query_row(
            "SELECT id FROM transactions WHERE care_ticket_id = ?",
            params![ticket_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// Load a transaction that is still open for linking.
fn load_linkable(conn: &Connection, transaction_id: &str) -> Result<Transaction, LedgerError> {
    let current = load_transaction(conn, transaction_id)?
        .ok_or_else(|| LedgerError::transaction_not_found(transaction_id))?;

    if current.is_disputed() {
        return Err(LedgerError::TransactionDisputed(transaction_id.to_string()));
    }
    if let Some(ref ticket_id) = current.care_ticket_id {
        return Err(LedgerError::TransactionAlreadyLinked {
            transaction_id: transaction_id.to_string(),
            ticket_id: ticket_id.clone(),
        });
    }
    Ok(current)
}

fn map_link_violation(e: rusqlite::Error, ticket_id: &str) -> LedgerError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::ConstraintViolation => {
            LedgerError::TicketAlreadyClaimed {
                ticket_id: ticket_id.to_string(),
                claimed_by: "another transaction".to_string(),
            }
        }
        other => LedgerError::from(other),
    }
}

fn write_attribution(
    conn: &Connection,
    transaction_id: &str,
    attribution: &BrandAttribution,
) -> Result<(), LedgerError> {
    conn.execute(
        "UPDATE transactions SET client_id = ?, parent_absorbed = ?, updated_at = ? WHERE id = ?",
        params![
            attribution.client_id(),
            attribution.is_parent_absorbed(),
            Utc::now().to_rfc3339(),
            transaction_id,
        ],
    )?;
    Ok(())
}

/// Conditional link write. The `care_ticket_id IS NULL` guard plus the unique
/// index make a concurrent claim lose instead of overwrite.
fn write_link(
    conn: &Connection,
    transaction_id: &str,
    ticket_id: &str,
    fields: &LinkFields,
) -> Result<(), LedgerError> {
    let updated = conn
        .execute(
            "UPDATE transactions SET care_ticket_id = ?, updated_at = ? WHERE id = ? AND care_ticket_id IS NULL AND disputed_at IS NULL",
            params![ticket_id, Utc::now().to_rfc3339(), transaction_id],
        )
        .map_err(|e| map_link_violation(e, ticket_id))?;

    if updated != 1 {
        return Err(LedgerError::TransactionAlreadyLinked {
            transaction_id: transaction_id.to_string(),
            ticket_id: ticket_id.to_string(),
        });
    }

    if let Some(ref attribution) = fields.attribution {
        write_attribution(conn, transaction_id, attribution)?;
    }

    if let Some((ref reference_id, reference_type)) = fields.reference {
        conn.execute(
            "UPDATE transactions SET reference_id = ?, reference_type = ? WHERE id = ?",
            params![reference_id, reference_type.as_str(), transaction_id],
        )?;
    }

    Ok(())
}

fn next_ticket_sequence(conn: &Connection) -> Result<i64, LedgerError> {
    conn.execute(
        "INSERT INTO sequences (name, value) VALUES ('ticket_number', 1) ON CONFLICT(name) DO UPDATE SET value = value + 1",
        [],
    )?;
    Ok(conn.query_row(
        "SELECT value FROM sequences WHERE name = 'ticket_number'",
        [],
        |row| row.get(0),
    )?)
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn fetch_feed(&self, query: &FeedQuery) -> Result<FeedPage, LedgerError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(query);

        let sql = format!(
            "{} {} ORDER BY t.charge_date DESC, t.id ASC LIMIT ? OFFSET ?",
            TRANSACTION_SELECT, where_clause
        );
        let mut stmt = conn.prepare(&sql)?;

        let mut all_params: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        all_params.push(&query.limit);
        all_params.push(&query.offset);

        let data = stmt
            .query_map(all_params.as_slice(), row_to_transaction)?
            .collect::<Result<Vec<_>, _>>()?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM transactions t {}",
            where_clause
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let total_count: i64 = conn.query_row(&count_sql, param_refs.as_slice(), |row| row.get(0))?;

        let pool_sql = format!(
            "{} WHERE NOT EXISTS (SELECT 1 FROM transactions t WHERE t.care_ticket_id = k.id) ORDER BY k.created_at ASC, k.id ASC",
            TICKET_SELECT
        );
        let mut pool_stmt = conn.prepare(&pool_sql)?;
        let available_tickets = pool_stmt
            .query_map([], row_to_ticket)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeedPage {
            data,
            available_tickets,
            total_count,
        })
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, LedgerError> {
        let conn = self.lock()?;
        load_transaction(&conn, id)
    }

    async fn get_ticket(&self, id: &str) -> Result<Option<Ticket>, LedgerError> {
        let conn = self.lock()?;
        load_ticket(&conn, id)
    }

    async fn ticket_claimed_by(&self, ticket_id: &str) -> Result<Option<String>, LedgerError> {
        let conn = self.lock()?;
        claimed_by(&conn, ticket_id)
    }

    async fn get_brand(&self, client_id: &str) -> Result<Option<Brand>, LedgerError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, name FROM brands WHERE id = ?",
                params![client_id],
                |row| {
                    Ok(Brand {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    async fn list_brands(&self) -> Result<Vec<Brand>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM brands ORDER BY name ASC, id ASC")?;
        let brands = stmt
            .query_map([], |row| {
                Ok(Brand {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(brands)
    }

    async fn is_period_closed(&self, at: DateTime<Utc>) -> Result<bool, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, period_start, period_end, closed_at FROM billing_periods WHERE closed_at IS NOT NULL",
        )?;
        let periods = stmt
            .query_map([], |row| {
                Ok(BillingPeriod {
                    id: row.get(0)?,
                    period_start: datetime_at(row, 1)?,
                    period_end: datetime_at(row, 2)?,
                    closed_at: optional_datetime_at(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(periods.iter().any(|p| p.is_closed() && p.covers(at)))
    }

    async fn link_ticket(
        &self,
        transaction_id: &str,
        ticket_id: &str,
        fields: LinkFields,
    ) -> Result<Transaction, LedgerError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        load_linkable(&tx, transaction_id)?;

        if load_ticket(&tx, ticket_id)?.is_none() {
            return Err(LedgerError::ticket_not_found(ticket_id));
        }
        if let Some(holder) = claimed_by(&tx, ticket_id)? {
            return Err(LedgerError::TicketAlreadyClaimed {
                ticket_id: ticket_id.to_string(),
                claimed_by: holder,
            });
        }

        write_link(&tx, transaction_id, ticket_id, &fields)?;

        let updated = load_transaction(&tx, transaction_id)?
            .ok_or_else(|| LedgerError::transaction_not_found(transaction_id))?;
        tx.commit()?;

        Ok(updated)
    }

    async fn create_and_link_ticket(
        &self,
        transaction_id: &str,
        ticket: NewTicket,
        fields: LinkFields,
    ) -> Result<(Ticket, Transaction), LedgerError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        load_linkable(&tx, transaction_id)?;

        let sequence = next_ticket_sequence(&tx)?;
        let created = Ticket {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_number: format!("{}-{:06}", ticket.number_prefix, sequence),
            ticket_type: ticket.ticket_type,
            status: ticket.status,
            shipment_id: ticket.shipment_id,
            credit_amount: ticket.credit_amount,
            client_id: ticket.client_id,
            client_name: ticket.client_name,
            description: ticket.description,
            created_at: Utc::now(),
        };
        insert_ticket(&tx, &created)?;
        write_link(&tx, transaction_id, &created.id, &fields)?;

        let updated = load_transaction(&tx, transaction_id)?
            .ok_or_else(|| LedgerError::transaction_not_found(transaction_id))?;
        tx.commit()?;

        Ok((created, updated))
    }

    async fn set_attribution(
        &self,
        transaction_id: &str,
        attribution: BrandAttribution,
    ) -> Result<Transaction, LedgerError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = load_transaction(&tx, transaction_id)?
            .ok_or_else(|| LedgerError::transaction_not_found(transaction_id))?;
        if current.is_disputed() {
            return Err(LedgerError::TransactionDisputed(transaction_id.to_string()));
        }

        write_attribution(&tx, transaction_id, &attribution)?;

        let updated = load_transaction(&tx, transaction_id)?
            .ok_or_else(|| LedgerError::transaction_not_found(transaction_id))?;
        tx.commit()?;

        Ok(updated)
    }

    async fn mark_disputed(
        &self,
        transaction_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = load_transaction(&tx, transaction_id)?
            .ok_or_else(|| LedgerError::transaction_not_found(transaction_id))?;
        if current.is_disputed() {
            return Err(LedgerError::TransactionDisputed(transaction_id.to_string()));
        }

        tx.execute(
            "UPDATE transactions SET disputed_at = ?, updated_at = ? WHERE id = ?",
            params![at.to_rfc3339(), Utc::now().to_rfc3339(), transaction_id],
        )?;

        let updated = load_transaction(&tx, transaction_id)?
            .ok_or_else(|| LedgerError::transaction_not_found(transaction_id))?;
        tx.commit()?;

        Ok(updated)
    }
}
