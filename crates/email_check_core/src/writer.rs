//! Idempotent persistence of confirmed-valid results
//!
//! Upsert keyed by normalized address: update the live record in place when
//! one exists, otherwise create a new contact and record. Replays with
//! equivalent results leave exactly one row. Only `Valid` verdicts are ever
//! written; everything else stays out of the store by policy.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::store::{NewCheck, StoreError, ValidationStore};
use crate::{CheckResult, CheckStatus};

/// Writer wrapping the injected validation store
pub struct PersistenceWriter {
    store: Arc<dyn ValidationStore>,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn ValidationStore>) -> Self {
        Self { store }
    }

    /// Upsert the record for a confirmed-valid result
    ///
    /// Failure is reported to the caller for the step trail but must never
    /// alter the verdict.
    pub async fn record_valid(&self, result: &CheckResult) -> Result<(), StoreError> {
        debug_assert_eq!(result.status, CheckStatus::Valid);

        let check = NewCheck {
            address: result.current_address.clone(),
            status: result.status,
            sub_status: result.sub_status.clone(),
            check_id: result.check_id.clone(),
            checked_at: result.checked_at,
        };

        let outcome = match self.store.find_check(&check.address).await? {
            Some(existing) => {
                debug!(
                    "Updating validation record for {} (contact {})",
                    check.address, existing.contact_id
                );
                self.store.update_check(&check.address, &check).await
            }
            None => {
                debug!("Inserting validation record for {}", check.address);
                self.store.insert_check(&check).await
            }
        };

        if let Err(ref e) = outcome {
            warn!("Persistence failed for {}: {}", check.address, e);
        }
        outcome
    }
}
