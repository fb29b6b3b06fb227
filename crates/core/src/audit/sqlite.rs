use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{AuditError, AuditEvent, AuditFilter, AuditRecord, AuditStore};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS audit_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        event_type TEXT NOT NULL,
        transaction_id TEXT,
        ticket_id TEXT,
        data TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_audit_events_timestamp ON audit_events(timestamp);
    CREATE INDEX IF NOT EXISTS idx_audit_events_transaction_id ON audit_events(transaction_id);
    CREATE INDEX IF NOT EXISTS idx_audit_events_ticket_id ON audit_events(ticket_id);
    CREATE INDEX IF NOT EXISTS idx_audit_events_event_type ON audit_events(event_type);
"#;

/// SQLite-backed audit store
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Create a new SQLite audit store, creating the database file and tables if needed
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(path).map_err(|e| AuditError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite audit store (useful for testing)
    pub fn in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory().map_err(|e| AuditError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AuditError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Database("audit connection poisoned".to_string()))
    }

    fn build_where_clause(filter: &AuditFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref transaction_id) = filter.transaction_id {
            conditions.push("transaction_id = ?");
            params.push(Box::new(transaction_id.clone()));
        }

        if let Some(ref ticket_id) = filter.ticket_id {
            conditions.push("ticket_id = ?");
            params.push(Box::new(ticket_id.clone()));
        }

        if let Some(ref event_type) = filter.event_type {
            conditions.push("event_type = ?");
            params.push(Box::new(event_type.clone()));
        }

        if let Some(ref from) = filter.from {
            conditions.push("timestamp >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }

        if let Some(ref to) = filter.to {
            conditions.push("timestamp <= ?");
            params.push(Box::new(to.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError> {
        let conn = self.lock()?;

        let data_json = serde_json::to_string(&record.data)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO audit_events (timestamp, event_type, transaction_id, ticket_id, data) VALUES (?, ?, ?, ?, ?)",
            params![
                record.timestamp.to_rfc3339(),
                record.event_type,
                record.transaction_id,
                record.ticket_id,
                data_json,
            ],
        )
        .map_err(|e| AuditError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        // Ties on timestamp fall back to insertion order, newest first.
        let sql = format!(
            "SELECT id, timestamp, event_type, transaction_id, ticket_id, data FROM audit_events {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let id: i64 = row.get(0)?;
                let timestamp_str: String = row.get(1)?;
                let event_type: String = row.get(2)?;
                let transaction_id: Option<String> = row.get(3)?;
                let ticket_id: Option<String> = row.get(4)?;
                let data_json: String = row.get(5)?;

                Ok((id, timestamp_str, event_type, transaction_id, ticket_id, data_json))
            })
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            let (id, timestamp_str, event_type, transaction_id, ticket_id, data_json) =
                row_result.map_err(|e| AuditError::Database(e.to_string()))?;

            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|e| AuditError::Database(format!("Invalid timestamp: {}", e)))?
                .into();

            let data: AuditEvent = serde_json::from_str(&data_json)
                .map_err(|e| AuditError::Serialization(e.to_string()))?;

            records.push(AuditRecord {
                id,
                timestamp,
                event_type,
                transaction_id,
                ticket_id,
                data,
            });
        }

        Ok(records)
    }

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM audit_events {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| AuditError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Gaps;
    use chrono::Duration;

    fn create_test_store() -> SqliteAuditStore {
        SqliteAuditStore::in_memory().unwrap()
    }

    fn record(event: AuditEvent) -> AuditRecord {
        AuditRecord {
            id: 0,
            timestamp: Utc::now(),
            event_type: event.event_type().to_string(),
            transaction_id: event.transaction_id().map(String::from),
            ticket_id: event.ticket_id().map(String::from),
            data: event,
        }
    }

    fn service_started() -> AuditRecord {
        record(AuditEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc123".to_string(),
        })
    }

    fn connected(transaction_id: &str, ticket_id: &str) -> AuditRecord {
        record(AuditEvent::TicketConnected {
            transaction_id: transaction_id.to_string(),
            ticket_id: ticket_id.to_string(),
            resolved: Gaps {
                brand: false,
                shipment: true,
                ticket: true,
            },
        })
    }

    fn disputed(transaction_id: &str) -> AuditRecord {
        record(AuditEvent::TransactionDisputed {
            transaction_id: transaction_id.to_string(),
        })
    }

    #[test]
    fn test_insert_and_query() {
        let store = create_test_store();

        let id = store.insert(&service_started()).unwrap();
        assert!(id > 0);

        let results = store.query(&AuditFilter::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].event_type, "service_started");
    }

    #[test]
    fn test_query_by_event_type() {
        let store = create_test_store();

        store.insert(&service_started()).unwrap();
        store.insert(&connected("tx-1", "tk-1")).unwrap();
        store.insert(&connected("tx-2", "tk-2")).unwrap();

        let results = store
            .query(&AuditFilter::new().with_event_type("ticket_connected"))
            .unwrap();
        assert_eq!(results.len(), 2);

        let results = store
            .query(&AuditFilter::new().with_event_type("service_started"))
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_query_by_transaction_id() {
        let store = create_test_store();

        store.insert(&connected("tx-1", "tk-1")).unwrap();
        store.insert(&disputed("tx-1")).unwrap();
        store.insert(&connected("tx-2", "tk-2")).unwrap();

        let results = store
            .query(&AuditFilter::new().with_transaction_id("tx-1"))
            .unwrap();
        assert_eq!(results.len(), 2);
        // Newest first
        assert_eq!(results[0].event_type, "transaction_disputed");
    }

    #[test]
    fn test_query_by_ticket_id() {
        let store = create_test_store();

        store.insert(&connected("tx-1", "tk-1")).unwrap();
        store.insert(&connected("tx-2", "tk-2")).unwrap();

        let results = store.query(&AuditFilter::new().with_ticket_id("tk-2")).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].transaction_id.as_deref(), Some("tx-2"));
    }

    #[test]
    fn test_query_with_time_range() {
        let store = create_test_store();

        let now = Utc::now();
        let mut old_record = service_started();
        old_record.timestamp = now - Duration::hours(2);
        store.insert(&old_record).unwrap();

        let mut new_record = service_started();
        new_record.timestamp = now;
        store.insert(&new_record).unwrap();

        let filter = AuditFilter::new().with_time_range(Some(now - Duration::hours(1)), None);
        let results = store.query(&filter).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_pagination() {
        let store = create_test_store();

        for i in 0..5 {
            store.insert(&disputed(&format!("tx-{}", i))).unwrap();
        }

        let results = store.query(&AuditFilter::new().with_limit(2)).unwrap();
        assert_eq!(results.len(), 2);

        let results = store
            .query(&AuditFilter::new().with_limit(2).with_offset(4))
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_count() {
        let store = create_test_store();

        store.insert(&service_started()).unwrap();
        store.insert(&connected("tx-1", "tk-1")).unwrap();
        store.insert(&disputed("tx-2")).unwrap();

        assert_eq!(store.count(&AuditFilter::new()).unwrap(), 3);
        assert_eq!(
            store
                .count(&AuditFilter::new().with_event_type("transaction_disputed"))
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("audit.db");

        let store = SqliteAuditStore::new(&db_path).unwrap();
        store.insert(&service_started()).unwrap();

        assert!(db_path.exists());
        assert_eq!(store.query(&AuditFilter::new()).unwrap().len(), 1);
    }
}
