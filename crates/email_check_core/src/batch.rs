//! Batch scheduler: time-sliced validation of address lists
//!
//! Each address gets a slice of the remaining batch budget, never more than
//! the single-validation deadline. When the budget runs low the rest of the
//! batch degrades to local-only checks, so a batch always completes within
//! its budget with one result per input, in input order.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::pipeline::CheckPipeline;
use crate::{CheckError, CheckRequest, CheckResult};

impl CheckPipeline {
    /// Validate a list of addresses under the configured batch budget
    ///
    /// # Returns
    /// * `Ok(results)` - one result per input address, in input order
    /// * `Err(CheckError::BatchTooLarge)` - the list exceeds the configured
    ///   maximum; nothing is validated
    pub async fn check_batch(
        &self,
        addresses: &[String],
    ) -> Result<Vec<CheckResult>, CheckError> {
        if addresses.len() > self.config.max_batch_size {
            return Err(CheckError::BatchTooLarge(
                addresses.len(),
                self.config.max_batch_size,
            ));
        }

        let per_item = Duration::from_millis(self.config.validation_timeout_ms);
        let deadline = Instant::now() + Duration::from_millis(self.config.batch_timeout_ms);
        let started = Instant::now();
        let mut results = Vec::with_capacity(addresses.len());

        for (index, address) in addresses.iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());

            // Once less than half a single-item budget remains, finish the
            // rest of the batch with local checks only so the batch as a
            // whole still completes
            if remaining < per_item / 2 {
                warn!(
                    "Batch budget nearly exhausted, finishing {} address(es) locally",
                    addresses.len() - index
                );
                results.extend(addresses[index..].iter().map(|a| self.local_only(a)));
                break;
            }

            let left = (addresses.len() - index) as u32;
            let slice = per_item.min(remaining / left);
            debug!(
                "Batch item {}/{}: {:?} slice of {:?} remaining",
                index + 1,
                addresses.len(),
                slice,
                remaining
            );

            let request = CheckRequest::new(address.clone())
                .with_deadline_ms((slice.as_millis() as u64).max(1));
            let result = match self.check(request).await {
                Ok(result) => result,
                // A blank entry is reported in place, never fails the batch
                Err(CheckError::MissingAddress) => self.local_only(address),
                Err(e) => return Err(e),
            };
            results.push(result);
        }

        info!(
            "Batch of {} finished in {:?}",
            addresses.len(),
            started.elapsed()
        );
        Ok(results)
    }
}
