//! Validation orchestrator: the deadline-bounded pipeline state machine
//!
//! Sequences the local checks, fans out the cache lookup and oracle call
//! concurrently under the remaining deadline, performs at most one recursive
//! re-validation when the oracle proposes a correction, and persists
//! confirmed-valid verdicts before returning. Every degraded path resolves to
//! a best-effort result; the only caller-visible error is a malformed
//! request.

use chrono::Utc;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheGateway, CacheStore, CachedVerdict};
use crate::check_id::CheckId;
use crate::domains::{DomainClass, DomainClassifier};
use crate::format;
use crate::normalizer::Normalizer;
use crate::oracle::{OracleClient, OracleTransport};
use crate::store::ValidationStore;
use crate::writer::PersistenceWriter;
use crate::{
    CheckConfig, CheckError, CheckRequest, CheckResult, CheckStage, CheckStatus, StepRecord,
};

/// The validation pipeline
///
/// All collaborators are injected at construction; there is no ambient
/// global state, which keeps every validation deterministic under test.
pub struct CheckPipeline {
    pub(crate) config: CheckConfig,
    normalizer: Normalizer,
    classifier: DomainClassifier,
    cache: CacheGateway,
    oracle: Arc<OracleClient>,
    writer: PersistenceWriter,
}

impl CheckPipeline {
    /// Create a pipeline with the default domain tables
    ///
    /// # Arguments
    /// * `config` - validated before use
    /// * `cache_store` - known-good cache backend
    /// * `oracle_transport` - verification provider transport
    /// * `validation_store` - relational record store
    pub fn new(
        config: CheckConfig,
        cache_store: Arc<dyn CacheStore>,
        oracle_transport: Arc<dyn OracleTransport>,
        validation_store: Arc<dyn ValidationStore>,
    ) -> Result<Self, CheckError> {
        Self::with_classifier(
            config,
            cache_store,
            oracle_transport,
            validation_store,
            DomainClassifier::new(),
        )
    }

    /// Create a pipeline with a custom domain classifier
    pub fn with_classifier(
        config: CheckConfig,
        cache_store: Arc<dyn CacheStore>,
        oracle_transport: Arc<dyn OracleTransport>,
        validation_store: Arc<dyn ValidationStore>,
        classifier: DomainClassifier,
    ) -> Result<Self, CheckError> {
        config.validate()?;

        let normalizer = Normalizer::new(config.strip_aliases, config.normalize_country_tlds);
        let cache = CacheGateway::new(
            cache_store,
            Duration::from_millis(config.cache_timeout_ms),
            config.cache_freshness_days,
        );
        let oracle = Arc::new(OracleClient::from_config(&config, oracle_transport));
        let writer = PersistenceWriter::new(validation_store);

        info!(
            "Check pipeline initialized (oracle {}, {} denylisted / {} allowlisted domains)",
            if config.oracle_enabled { "enabled" } else { "disabled" },
            classifier.denylist_count(),
            classifier.allowlist_count()
        );

        Ok(Self {
            config,
            normalizer,
            classifier,
            cache,
            oracle,
            writer,
        })
    }

    /// Validate one address under the configured (or overridden) deadline
    ///
    /// # Returns
    /// * `Ok(CheckResult)` - always a best-effort verdict, even on collaborator
    ///   failure or deadline expiry
    /// * `Err(CheckError::MissingAddress)` - the request carried no address
    #[instrument(skip(self, request), fields(address = %request.address))]
    pub async fn check(&self, request: CheckRequest) -> Result<CheckResult, CheckError> {
        if request.address.trim().is_empty() {
            return Err(CheckError::MissingAddress);
        }

        let budget = Duration::from_millis(
            request
                .deadline_ms
                .unwrap_or(self.config.validation_timeout_ms),
        );
        let deadline = Instant::now() + budget;

        let mut result = self
            .check_at_depth(request.address.clone(), request.skip_oracle, deadline, 0)
            .await;
        result.tracking_id = request.tracking_id;

        debug!(
            "Validation finished for {}: status={:?}, corrected={}",
            result.current_address, result.status, result.was_corrected
        );
        Ok(result)
    }

    /// The state machine body; `depth` is 0 for the caller's address and 1
    /// for the single permitted re-validation of an oracle suggestion
    fn check_at_depth(
        &self,
        raw: String,
        skip_oracle: bool,
        deadline: Instant,
        depth: u8,
    ) -> BoxFuture<'_, CheckResult> {
        Box::pin(async move {
            let mut steps = Vec::new();

            let normalized = self.normalizer.normalize(&raw);
            steps.push(StepRecord::passed(CheckStage::Normalize));
            let address = normalized.address;

            let mut result = CheckResult {
                original_address: raw.clone(),
                current_address: address.clone(),
                format_valid: false,
                was_corrected: normalized.was_corrected,
                status: CheckStatus::Unknown,
                sub_status: None,
                recheck_needed: true,
                suggested_address: None,
                check_id: CheckId::generate(self.config.client_id).to_string(),
                checked_at: Utc::now(),
                tracking_id: None,
                steps: Vec::new(),
            };

            // Format gate: structurally invalid addresses never reach the
            // network
            result.format_valid = format::is_valid_format(&address);
            if !result.format_valid {
                steps.push(StepRecord::failed(CheckStage::FormatCheck, "bad_format"));
                return resolve(result, CheckStatus::Invalid, Some("bad_format"), steps);
            }
            steps.push(StepRecord::passed(CheckStage::FormatCheck));

            let domain = address.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
            let class = self.classifier.classify(domain);
            if class == DomainClass::Denylisted {
                steps.push(StepRecord::failed(
                    CheckStage::DomainHeuristic,
                    "invalid_domain",
                ));
                return resolve(result, CheckStatus::Invalid, Some("invalid_domain"), steps);
            }
            steps.push(StepRecord::passed(CheckStage::DomainHeuristic));

            if skip_oracle || !self.config.oracle_enabled {
                let status = if class == DomainClass::Allowlisted {
                    CheckStatus::Valid
                } else {
                    CheckStatus::CheckSkipped
                };
                return self
                    .finalize(resolve(result, status, None, steps), deadline)
                    .await;
            }

            // Fan out: cache lookup and oracle call run concurrently. The
            // cache gateway bounds itself with its own sub-timeout, clamped
            // to whatever is left of the overall deadline.
            let oracle = Arc::clone(&self.oracle);
            let oracle_address = address.clone();
            let mut oracle_task =
                tokio::spawn(async move { oracle.verify(&oracle_address).await });

            let remaining = deadline.saturating_duration_since(Instant::now());
            let cache_hit = self.cache.lookup(&address, remaining).await;
            // A miss is the ordinary outcome, not a stage failure; gateway
            // errors and timeouts are absorbed as misses
            steps.push(StepRecord::passed(CheckStage::CacheLookup));

            if let Some(hit) = cache_hit {
                // A fresh hit wins the verdict outright. The in-flight oracle
                // call keeps running detached but no longer blocks the
                // response.
                drop(oracle_task);
                debug!("Fresh cache hit for {}, skipping oracle wait", address);
                let resolved = resolve(result, hit.status, hit.sub_status.as_deref(), steps);
                return self.finalize(resolved, deadline).await;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let verdict = match tokio::time::timeout(remaining, &mut oracle_task).await {
                Ok(Ok(verdict)) => Some(verdict),
                Ok(Err(e)) => {
                    warn!("Oracle task failed for {}: {}", address, e);
                    None
                }
                Err(_) => {
                    debug!("Validation deadline elapsed while waiting on the oracle");
                    oracle_task.abort();
                    None
                }
            };

            let Some(verdict) = verdict else {
                // Degraded: best locally-available verdict
                steps.push(StepRecord::failed(
                    CheckStage::OracleCheck,
                    "validation deadline elapsed",
                ));
                let status = if class == DomainClass::Allowlisted {
                    CheckStatus::Valid
                } else {
                    CheckStatus::Unknown
                };
                return self
                    .finalize(resolve(result, status, None, steps), deadline)
                    .await;
            };

            steps.push(StepRecord {
                stage: CheckStage::OracleCheck,
                passed: verdict.status != CheckStatus::CheckFailed,
                error: if verdict.status == CheckStatus::CheckFailed {
                    verdict.sub_status.clone()
                } else {
                    None
                },
            });

            // At most one re-validation of an oracle-proposed correction.
            // Suggestions returned at depth 1 are ignored to bound latency
            // and prevent cycles.
            if depth == 0 {
                if let Some(suggestion) = verdict.suggested_address.clone() {
                    if suggestion != address {
                        let half = deadline.saturating_duration_since(Instant::now()) / 2;
                        let reduced = Instant::now() + half;
                        info!(
                            "Oracle suggested {} for {}, re-validating once",
                            suggestion, address
                        );
                        let mut adopted = self
                            .check_at_depth(suggestion, skip_oracle, reduced, 1)
                            .await;
                        // The consumed suggestion is gone; an unconsumed one
                        // surfaced by the re-validation stays on the result
                        adopted.original_address = raw.clone();
                        adopted.was_corrected = adopted.current_address != raw;
                        let mut combined = steps;
                        combined.append(&mut adopted.steps);
                        adopted.steps = combined;
                        return adopted;
                    }
                }
            }

            let mut resolved =
                resolve(result, verdict.status, verdict.sub_status.as_deref(), steps);
            // A suggestion that was not consumed by a re-validation (depth 1,
            // or one equal to the current address) is surfaced to the caller
            resolved.suggested_address = verdict
                .suggested_address
                .filter(|s| s != &resolved.current_address);
            self.finalize(resolved, deadline).await
        })
    }

    /// Persist and cache-populate confirmed-valid verdicts, both bounded by
    /// what is left of the request deadline; failures and expiries are
    /// absorbed into the step trail, never into the verdict
    async fn finalize(&self, mut result: CheckResult, deadline: Instant) -> CheckResult {
        if result.status == CheckStatus::Valid {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.writer.record_valid(&result)).await {
                Ok(Ok(())) => result.steps.push(StepRecord::passed(CheckStage::Persist)),
                Ok(Err(e)) => {
                    result
                        .steps
                        .push(StepRecord::failed(CheckStage::Persist, e.to_string()));
                }
                Err(_) => {
                    warn!(
                        "Persistence for {} cut off by the validation deadline",
                        result.current_address
                    );
                    result.steps.push(StepRecord::failed(
                        CheckStage::Persist,
                        "persistence deadline elapsed",
                    ));
                }
            }

            let verdict = CachedVerdict {
                status: result.status,
                sub_status: result.sub_status.clone(),
                checked_at: result.checked_at,
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.cache
                .store(&result.current_address, &verdict, remaining)
                .await;
        }
        result
    }

    /// Cheap local-only verdict: normalizer, format checker, and domain
    /// heuristics; no cache, oracle, or persistence. Used by the batch
    /// scheduler once its budget is exhausted.
    pub(crate) fn local_only(&self, raw: &str) -> CheckResult {
        let mut steps = Vec::new();

        let normalized = self.normalizer.normalize(raw);
        steps.push(StepRecord::passed(CheckStage::Normalize));
        let address = normalized.address;

        let mut result = CheckResult {
            original_address: raw.to_string(),
            current_address: address.clone(),
            format_valid: false,
            was_corrected: normalized.was_corrected,
            status: CheckStatus::Unknown,
            sub_status: None,
            recheck_needed: true,
            suggested_address: None,
            check_id: CheckId::generate(self.config.client_id).to_string(),
            checked_at: Utc::now(),
            tracking_id: None,
            steps: Vec::new(),
        };

        result.format_valid = format::is_valid_format(&address);
        if !result.format_valid {
            steps.push(StepRecord::failed(CheckStage::FormatCheck, "bad_format"));
            return resolve(result, CheckStatus::Invalid, Some("bad_format"), steps);
        }
        steps.push(StepRecord::passed(CheckStage::FormatCheck));

        let domain = address.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
        match self.classifier.classify(domain) {
            DomainClass::Denylisted => {
                steps.push(StepRecord::failed(
                    CheckStage::DomainHeuristic,
                    "invalid_domain",
                ));
                resolve(result, CheckStatus::Invalid, Some("invalid_domain"), steps)
            }
            DomainClass::Allowlisted => {
                steps.push(StepRecord::passed(CheckStage::DomainHeuristic));
                resolve(result, CheckStatus::Valid, None, steps)
            }
            DomainClass::Unknown => {
                steps.push(StepRecord::passed(CheckStage::DomainHeuristic));
                resolve(result, CheckStatus::CheckSkipped, None, steps)
            }
        }
    }
}

/// Attach the final verdict and step trail to a result
fn resolve(
    mut result: CheckResult,
    status: CheckStatus,
    sub_status: Option<&str>,
    steps: Vec<StepRecord>,
) -> CheckResult {
    result.status = status;
    result.sub_status = sub_status.map(str::to_string);
    result.recheck_needed = status.needs_recheck();
    result.steps = steps;
    result
}
