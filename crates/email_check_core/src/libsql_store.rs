//! libSQL backend for the validation record store
//!
//! Two tables: `contacts` (owning entity) and `email_checks` keyed by
//! address with a UNIQUE constraint and a foreign key to the contact.
//! Supports local file and in-memory databases; the schema is created on
//! open.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Connection, Database};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::store::{NewCheck, StoreError, StoredCheck, ValidationStore};
use crate::CheckStatus;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contacts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS email_checks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_id  INTEGER NOT NULL REFERENCES contacts(id),
    address     TEXT NOT NULL UNIQUE,
    status      TEXT NOT NULL,
    sub_status  TEXT,
    check_id    TEXT NOT NULL,
    checked_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_email_checks_contact ON email_checks(contact_id);
";

/// libSQL-backed validation store
pub struct LibSqlValidationStore {
    _db: Arc<Database>,
    conn: Connection,
}

impl LibSqlValidationStore {
    /// Open (or create) a local database file and ensure the schema exists
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Unavailable(format!("failed to connect: {e}")))?;

        let store = Self {
            _db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Validation store opened");
        Ok(store)
    }

    /// Create an in-memory store (for tests)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Unavailable(format!("failed to connect: {e}")))?;

        let store = Self {
            _db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| StoreError::Query(format!("init_schema: {e}")))?;
        Ok(())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn opt_text(value: &Option<String>) -> libsql::Value {
    match value {
        Some(s) => libsql::Value::Text(s.clone()),
        None => libsql::Value::Null,
    }
}

#[async_trait]
impl ValidationStore for LibSqlValidationStore {
    async fn find_check(&self, address: &str) -> Result<Option<StoredCheck>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT contact_id, address, status, sub_status, check_id, checked_at \
                 FROM email_checks WHERE address = ?1",
                params![address],
            )
            .await
            .map_err(|e| StoreError::Query(format!("find_check: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let contact_id: i64 = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("find_check row: {e}")))?;
                let address: String = row
                    .get(1)
                    .map_err(|e| StoreError::Query(format!("find_check row: {e}")))?;
                let status: String = row
                    .get(2)
                    .map_err(|e| StoreError::Query(format!("find_check row: {e}")))?;
                let sub_status: Option<String> = row.get::<String>(3).ok();
                let check_id: String = row
                    .get(4)
                    .map_err(|e| StoreError::Query(format!("find_check row: {e}")))?;
                let checked_at: String = row
                    .get(5)
                    .map_err(|e| StoreError::Query(format!("find_check row: {e}")))?;

                Ok(Some(StoredCheck {
                    contact_id,
                    address,
                    status: CheckStatus::parse(&status),
                    sub_status,
                    check_id,
                    checked_at: parse_datetime(&checked_at),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("find_check: {e}"))),
        }
    }

    async fn insert_check(&self, check: &NewCheck) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO contacts (created_at) VALUES (?1)",
                params![Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_check contact: {e}")))?;
        let contact_id = self.conn.last_insert_rowid();

        self.conn
            .execute(
                "INSERT INTO email_checks (contact_id, address, status, sub_status, check_id, checked_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    contact_id,
                    check.address.as_str(),
                    check.status.as_str(),
                    opt_text(&check.sub_status),
                    check.check_id.as_str(),
                    check.checked_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_check: {e}")))?;

        debug!(address = %check.address, "Validation record inserted");
        Ok(())
    }

    async fn update_check(&self, address: &str, check: &NewCheck) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE email_checks \
                 SET status = ?2, sub_status = ?3, check_id = ?4, checked_at = ?5 \
                 WHERE address = ?1",
                params![
                    address,
                    check.status.as_str(),
                    opt_text(&check.sub_status),
                    check.check_id.as_str(),
                    check.checked_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_check: {e}")))?;

        debug!(address = %address, "Validation record updated");
        Ok(())
    }
}
