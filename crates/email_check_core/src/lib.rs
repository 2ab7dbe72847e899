//! # email_check_core
//!
//! Email address normalization and verification pipeline for CRM intake.
//! Combines fast local checks, a known-good cache lookup, and an external
//! verification oracle under a hard wall-clock budget.
//!
//! ## Features
//!
//! - **Normalization** with typo correction, alias stripping, and country-TLD
//!   repair, guaranteed idempotent
//! - **Format checking** with an RFC-5322-lite grammar
//! - **Heuristic domain classification** against deny/allow lists
//! - **Deadline-bounded orchestration** of cache and oracle calls with
//!   graceful degradation and one bounded re-validation on oracle suggestions
//! - **Idempotent persistence** of confirmed-valid results, upsert by address
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use email_check_core::{
//!     cache::MemoryCacheStore, oracle::HttpOracleTransport,
//!     store::MemoryValidationStore, CheckConfig, CheckPipeline, CheckRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CheckConfig::default();
//!     let transport = Arc::new(HttpOracleTransport::new(&config.oracle_endpoint));
//!     let pipeline = CheckPipeline::new(
//!         config,
//!         Arc::new(MemoryCacheStore::new()),
//!         transport,
//!         Arc::new(MemoryValidationStore::new()),
//!     )?;
//!
//!     let result = pipeline.check(CheckRequest::new("Test@Gmail.com ")).await?;
//!     println!("status: {:?}, address: {}", result.status, result.current_address);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod check_id;
pub mod domains;
pub mod format;
pub mod libsql_store;
pub mod normalizer;
pub mod oracle;
pub mod pipeline;
pub mod store;
pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the email check pipeline
///
/// All timeouts are wall-clock budgets in milliseconds. The struct is
/// validated once at pipeline construction, never defaulted ad hoc at call
/// sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Whether the external verification oracle is consulted at all
    pub oracle_enabled: bool,
    /// API credential for the verification oracle
    pub oracle_api_key: String,
    /// Base URL of the verification oracle endpoint
    pub oracle_endpoint: String,
    /// Per-call timeout for cache lookups and writes
    pub cache_timeout_ms: u64,
    /// Timeout for the first oracle attempt
    pub oracle_timeout_ms: u64,
    /// Timeout for the oracle retry attempt (longer than the first)
    pub oracle_retry_timeout_ms: u64,
    /// Maximum number of oracle retries after the initial attempt
    pub max_oracle_retries: u32,
    /// Base delay before an oracle retry (doubled per attempt)
    pub retry_backoff_ms: u64,
    /// Overall deadline for a single validation
    pub validation_timeout_ms: u64,
    /// Overall deadline for a batch of validations
    pub batch_timeout_ms: u64,
    /// Strip provider alias suffixes (plus-addressing) during normalization
    pub strip_aliases: bool,
    /// Rewrite bare country-code TLD suffixes to their dotted form
    pub normalize_country_tlds: bool,
    /// Age in days under which a cached verdict short-circuits the pipeline
    pub cache_freshness_days: u32,
    /// Maximum number of addresses accepted per batch
    pub max_batch_size: usize,
    /// Tenant/client identifier embedded in generated check ids
    pub client_id: u32,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            oracle_enabled: true,
            oracle_api_key: String::new(),
            oracle_endpoint: "https://api.mailverifier.example/v2/validate".to_string(),
            cache_timeout_ms: 400,
            oracle_timeout_ms: 4_000,
            oracle_retry_timeout_ms: 8_000,
            max_oracle_retries: 1,
            retry_backoff_ms: 500,
            validation_timeout_ms: 10_000,
            batch_timeout_ms: 25_000,
            strip_aliases: true,
            normalize_country_tlds: true,
            cache_freshness_days: 30,
            max_batch_size: 100,
            client_id: 1,
        }
    }
}

impl CheckConfig {
    /// Validate the configuration before use
    ///
    /// # Returns
    /// * `Ok(())` if the configuration is usable
    /// * `Err(CheckError::Configuration)` describing the first problem found
    pub fn validate(&self) -> Result<(), CheckError> {
        if self.cache_timeout_ms == 0
            || self.oracle_timeout_ms == 0
            || self.oracle_retry_timeout_ms == 0
            || self.validation_timeout_ms == 0
            || self.batch_timeout_ms == 0
        {
            return Err(CheckError::Configuration(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.oracle_enabled && self.oracle_api_key.trim().is_empty() {
            return Err(CheckError::Configuration(
                "oracle is enabled but no API credential is configured".to_string(),
            ));
        }
        if self.cache_freshness_days == 0 {
            return Err(CheckError::Configuration(
                "cache freshness window must be at least one day".to_string(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(CheckError::Configuration(
                "max batch size must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

/// A single validation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Raw address string as submitted by the caller
    pub address: String,
    /// Optional caller-supplied tracking identifier
    pub tracking_id: Option<String>,
    /// Skip the oracle for this call only
    pub skip_oracle: bool,
    /// Per-call deadline override in milliseconds
    pub deadline_ms: Option<u64>,
}

impl CheckRequest {
    /// Build a request with defaults for all overrides
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tracking_id: None,
            skip_oracle: false,
            deadline_ms: None,
        }
    }

    /// Skip the oracle for this request
    pub fn skip_oracle(mut self) -> Self {
        self.skip_oracle = true;
        self
    }

    /// Override the validation deadline for this request
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }
}

/// Verdict taxonomy for a validation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The address was confirmed deliverable
    Valid,
    /// The address is known bad (format, domain, or mailbox)
    Invalid,
    /// No high-confidence determination could be made
    Unknown,
    /// The oracle could not be reached after retries
    CheckFailed,
    /// The oracle was skipped by configuration or per-call override
    CheckSkipped,
}

impl CheckStatus {
    /// Whether this verdict should be re-attempted later
    pub fn needs_recheck(self) -> bool {
        matches!(
            self,
            CheckStatus::Unknown | CheckStatus::CheckFailed | CheckStatus::CheckSkipped
        )
    }

    /// Stable string form used for persistence
    pub fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Valid => "valid",
            CheckStatus::Invalid => "invalid",
            CheckStatus::Unknown => "unknown",
            CheckStatus::CheckFailed => "check_failed",
            CheckStatus::CheckSkipped => "check_skipped",
        }
    }

    /// Parse the persisted string form; unrecognized values degrade to Unknown
    pub fn parse(s: &str) -> CheckStatus {
        match s {
            "valid" => CheckStatus::Valid,
            "invalid" => CheckStatus::Invalid,
            "check_failed" => CheckStatus::CheckFailed,
            "check_skipped" => CheckStatus::CheckSkipped,
            _ => CheckStatus::Unknown,
        }
    }
}

/// Pipeline stages recorded in the step trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStage {
    Normalize,
    FormatCheck,
    DomainHeuristic,
    CacheLookup,
    OracleCheck,
    Persist,
}

/// One record per pipeline stage attempted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub stage: CheckStage,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    pub fn passed(stage: CheckStage) -> Self {
        Self {
            stage,
            passed: true,
            error: None,
        }
    }

    pub fn failed(stage: CheckStage, error: impl Into<String>) -> Self {
        Self {
            stage,
            passed: false,
            error: Some(error.into()),
        }
    }
}

/// Final result of one validation attempt
///
/// Created fresh per request and never mutated after being returned. Only
/// results with `status == Valid` are ever persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// The address exactly as submitted
    pub original_address: String,
    /// The address after normalization and any adopted correction
    pub current_address: String,
    /// Whether `current_address` passed the format grammar
    pub format_valid: bool,
    /// True iff `current_address` differs from `original_address`
    pub was_corrected: bool,
    /// Final verdict
    pub status: CheckStatus,
    /// Free-form reason code (e.g. `bad_format`, `spamtrap`, `invalid_domain`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_status: Option<String>,
    /// True whenever the verdict is not a terminal, high-confidence one
    pub recheck_needed: bool,
    /// Oracle-proposed correction that was not consumed by a re-validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_address: Option<String>,
    /// Time-derived identifier unique per validation attempt
    pub check_id: String,
    /// When the validation was performed
    pub checked_at: DateTime<Utc>,
    /// Caller-supplied tracking identifier, echoed back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    /// Ordered trail of pipeline stages attempted
    pub steps: Vec<StepRecord>,
}

/// Errors visible to the caller
///
/// Everything else — oracle failures, cache unavailability, persistence
/// failures, deadline breaches — is absorbed into a degraded `CheckResult`.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("missing or empty address")]
    MissingAddress,
    #[error("batch of {0} addresses exceeds the configured maximum of {1}")]
    BatchTooLarge(usize, usize),
    #[error("configuration error: {0}")]
    Configuration(String),
}

// Re-export main types
pub use pipeline::CheckPipeline;
