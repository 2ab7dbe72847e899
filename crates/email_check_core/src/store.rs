//! Persistence contract for validation records
//!
//! The relational store holds two related tables: an owning contact entity
//! and a validation record keyed by normalized address (unique, one live
//! record per address). The pipeline only ever talks to the `ValidationStore`
//! trait; backends are injected, never ambient.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::CheckStatus;

/// A persisted validation record
#[derive(Debug, Clone)]
pub struct StoredCheck {
    /// Id of the owning contact row
    pub contact_id: i64,
    pub address: String,
    pub status: CheckStatus,
    pub sub_status: Option<String>,
    pub check_id: String,
    pub checked_at: DateTime<Utc>,
}

/// Fields written on insert or update
#[derive(Debug, Clone)]
pub struct NewCheck {
    pub address: String,
    pub status: CheckStatus,
    pub sub_status: Option<String>,
    pub check_id: String,
    pub checked_at: DateTime<Utc>,
}

/// Store failures; absorbed by the persistence writer, never caller-visible
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// Backend-agnostic contract for the validation record store
#[async_trait]
pub trait ValidationStore: Send + Sync {
    /// Find the live record for a normalized address
    async fn find_check(&self, address: &str) -> Result<Option<StoredCheck>, StoreError>;

    /// Create a new owning contact and its validation record
    async fn insert_check(&self, check: &NewCheck) -> Result<(), StoreError>;

    /// Update the existing record for an address in place
    async fn update_check(&self, address: &str, check: &NewCheck) -> Result<(), StoreError>;
}

/// In-memory store for tests
pub struct MemoryValidationStore {
    rows: Mutex<HashMap<String, StoredCheck>>,
    next_contact_id: AtomicI64,
}

impl MemoryValidationStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            next_contact_id: AtomicI64::new(1),
        }
    }

    /// Number of persisted records (test helper)
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

impl Default for MemoryValidationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationStore for MemoryValidationStore {
    async fn find_check(&self, address: &str) -> Result<Option<StoredCheck>, StoreError> {
        Ok(self.rows.lock().await.get(address).cloned())
    }

    async fn insert_check(&self, check: &NewCheck) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&check.address) {
            return Err(StoreError::Query(format!(
                "duplicate record for {}",
                check.address
            )));
        }
        let contact_id = self.next_contact_id.fetch_add(1, Ordering::SeqCst);
        rows.insert(
            check.address.clone(),
            StoredCheck {
                contact_id,
                address: check.address.clone(),
                status: check.status,
                sub_status: check.sub_status.clone(),
                check_id: check.check_id.clone(),
                checked_at: check.checked_at,
            },
        );
        Ok(())
    }

    async fn update_check(&self, address: &str, check: &NewCheck) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(address)
            .ok_or_else(|| StoreError::Query(format!("no record for {}", address)))?;
        row.status = check.status;
        row.sub_status = check.sub_status.clone();
        row.check_id = check.check_id.clone();
        row.checked_at = check.checked_at;
        Ok(())
    }
}
