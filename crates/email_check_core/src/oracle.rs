//! Verification oracle client: transport, retry/backoff, vocabulary mapping
//!
//! The oracle is the external service that performs deep mailbox-existence
//! verification. The client owns the retry policy (one bounded retry with
//! exponential backoff and a longer timeout on the second attempt) and maps
//! the provider's status vocabulary into our own taxonomy. No failure ever
//! escapes `verify`; exhausted retries become a `CheckFailed` verdict.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{CheckConfig, CheckStatus};

/// Raw response body from the verification provider
#[derive(Debug, Clone, Deserialize)]
pub struct OracleResponse {
    pub status: String,
    #[serde(default)]
    pub sub_status: Option<String>,
    #[serde(default)]
    pub did_you_mean: Option<String>,
}

/// Failures at the transport boundary
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle call timed out")]
    Timeout,
    #[error("oracle transport error: {0}")]
    Transport(String),
    #[error("oracle returned HTTP {0}")]
    Status(u16),
    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Transient failures are worth one retry; client errors are not
    fn is_transient(&self) -> bool {
        match self {
            OracleError::Timeout | OracleError::Transport(_) => true,
            OracleError::Status(code) => *code >= 500,
            OracleError::Malformed(_) => false,
        }
    }

    /// Reason code carried on the degraded verdict
    fn sub_status(&self) -> &'static str {
        match self {
            OracleError::Timeout => "oracle_timeout",
            OracleError::Transport(_) => "oracle_unreachable",
            OracleError::Status(_) | OracleError::Malformed(_) => "oracle_error",
        }
    }
}

/// One HTTP-style call to the verification provider
#[async_trait]
pub trait OracleTransport: Send + Sync {
    async fn call(
        &self,
        address: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<OracleResponse, OracleError>;
}

/// Production transport over HTTPS
pub struct HttpOracleTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOracleTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl OracleTransport for HttpOracleTransport {
    async fn call(
        &self,
        address: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<OracleResponse, OracleError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("api_key", api_key)])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::Transport(e.to_string())
                }
            })?;

        let code = response.status();
        if !code.is_success() {
            return Err(OracleError::Status(code.as_u16()));
        }

        response
            .json::<OracleResponse>()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))
    }
}

/// Mapped verdict returned by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleVerdict {
    pub status: CheckStatus,
    pub sub_status: Option<String>,
    pub suggested_address: Option<String>,
}

/// Oracle client owning credentials, timeouts, and the retry policy
pub struct OracleClient {
    transport: Arc<dyn OracleTransport>,
    api_key: String,
    timeout: Duration,
    retry_timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl OracleClient {
    pub fn from_config(config: &CheckConfig, transport: Arc<dyn OracleTransport>) -> Self {
        Self {
            transport,
            api_key: config.oracle_api_key.clone(),
            timeout: Duration::from_millis(config.oracle_timeout_ms),
            retry_timeout: Duration::from_millis(config.oracle_retry_timeout_ms),
            max_retries: config.max_oracle_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Verify an address, retrying transient failures at most `max_retries`
    /// times; never returns an error past this boundary
    pub async fn verify(&self, address: &str) -> OracleVerdict {
        let mut attempt: u32 = 0;
        loop {
            let timeout = if attempt == 0 {
                self.timeout
            } else {
                self.retry_timeout
            };
            match self.transport.call(address, &self.api_key, timeout).await {
                Ok(response) => {
                    debug!(
                        "Oracle answered for {}: status={}, sub_status={:?}",
                        address, response.status, response.sub_status
                    );
                    return map_response(response);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff * 2u32.pow(attempt);
                    warn!(
                        "Oracle attempt {} failed for {} ({}), retrying in {:?}",
                        attempt + 1,
                        address,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Oracle check failed for {} after {} attempt(s): {}", address, attempt + 1, e);
                    return OracleVerdict {
                        status: CheckStatus::CheckFailed,
                        sub_status: Some(e.sub_status().to_string()),
                        suggested_address: None,
                    };
                }
            }
        }
    }
}

/// Map the provider vocabulary into our status taxonomy
fn map_response(response: OracleResponse) -> OracleVerdict {
    let status_word = response.status.trim().to_lowercase();
    let (status, sub_status) = match status_word.as_str() {
        "valid" | "ok" => (CheckStatus::Valid, response.sub_status),
        "invalid" => (CheckStatus::Invalid, response.sub_status),
        "spamtrap" | "abuse" | "do_not_mail" => {
            // The provider word itself is the reason code unless it sent a
            // more specific one
            let sub = response.sub_status.or(Some(status_word));
            (CheckStatus::Invalid, sub)
        }
        "catch-all" | "catch_all" | "unknown" => (CheckStatus::Unknown, response.sub_status),
        other => {
            debug!("Unrecognized oracle status {:?}, treating as unknown", other);
            (CheckStatus::Unknown, response.sub_status)
        }
    };

    OracleVerdict {
        status,
        sub_status,
        suggested_address: response.did_you_mean.filter(|s| !s.trim().is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Transport that plays back a scripted sequence of outcomes
    pub(crate) struct ScriptedTransport {
        script: Mutex<Vec<Result<OracleResponse, OracleError>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Result<OracleResponse, OracleError>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OracleTransport for ScriptedTransport {
        async fn call(
            &self,
            _address: &str,
            _api_key: &str,
            _timeout: Duration,
        ) -> Result<OracleResponse, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().await;
            if script.is_empty() {
                return Err(OracleError::Transport("script exhausted".to_string()));
            }
            script.remove(0)
        }
    }

    fn response(status: &str, sub: Option<&str>, dym: Option<&str>) -> OracleResponse {
        OracleResponse {
            status: status.to_string(),
            sub_status: sub.map(str::to_string),
            did_you_mean: dym.map(str::to_string),
        }
    }

    fn client(transport: Arc<dyn OracleTransport>) -> OracleClient {
        let config = CheckConfig {
            oracle_api_key: "test-key".to_string(),
            retry_backoff_ms: 1,
            ..CheckConfig::default()
        };
        OracleClient::from_config(&config, transport)
    }

    #[test]
    fn test_vocabulary_mapping() {
        let v = map_response(response("valid", None, None));
        assert_eq!(v.status, CheckStatus::Valid);

        let v = map_response(response("invalid", Some("mailbox_not_found"), None));
        assert_eq!(v.status, CheckStatus::Invalid);
        assert_eq!(v.sub_status.as_deref(), Some("mailbox_not_found"));

        let v = map_response(response("spamtrap", None, None));
        assert_eq!(v.status, CheckStatus::Invalid);
        assert_eq!(v.sub_status.as_deref(), Some("spamtrap"));

        let v = map_response(response("catch-all", None, None));
        assert_eq!(v.status, CheckStatus::Unknown);

        let v = map_response(response("Unknown", None, None));
        assert_eq!(v.status, CheckStatus::Unknown);

        let v = map_response(response("greylisted", None, None));
        assert_eq!(v.status, CheckStatus::Unknown);
    }

    #[test]
    fn test_suggestion_passthrough() {
        let v = map_response(response("invalid", None, Some("fixed@x.com")));
        assert_eq!(v.suggested_address.as_deref(), Some("fixed@x.com"));

        let v = map_response(response("invalid", None, Some("  ")));
        assert_eq!(v.suggested_address, None);
    }

    #[tokio::test]
    async fn test_retry_once_then_succeed() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(OracleError::Timeout),
            Ok(response("valid", None, None)),
        ]));
        let client = client(transport.clone());

        let verdict = client.verify("user@example.com").await;
        assert_eq!(verdict.status, CheckStatus::Valid);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_degrade_to_check_failed() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(OracleError::Timeout),
            Err(OracleError::Timeout),
        ]));
        let client = client(transport.clone());

        let verdict = client.verify("slow@domain.com").await;
        assert_eq!(verdict.status, CheckStatus::CheckFailed);
        assert_eq!(verdict.sub_status.as_deref(), Some("oracle_timeout"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(OracleError::Status(503)),
            Ok(response("invalid", None, None)),
        ]));
        let client = client(transport.clone());

        let verdict = client.verify("user@example.com").await;
        assert_eq!(verdict.status, CheckStatus::Invalid);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(OracleError::Status(401))]));
        let client = client(transport.clone());

        let verdict = client.verify("user@example.com").await;
        assert_eq!(verdict.status, CheckStatus::CheckFailed);
        assert_eq!(verdict.sub_status.as_deref(), Some("oracle_error"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
