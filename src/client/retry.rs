//! Retrying GET requests with exponential backoff.
//!
//! 带指数退避的重试请求。只有限流 (429) 和网关类错误 (502/503/504)
//! 以及连接层面的失败会被重试。

use std::time::Duration;

use reqwest::StatusCode;

use crate::auth::AuthenticatedTransport;
use crate::client::cancel::Cancellation;
use crate::error::{Error, Result};

/// Retry budget and backoff shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after attempt `attempt` (0-indexed):
    /// `min(base * 2^attempt, max)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// 429, 502, 503 and 504. A 500 is terminal.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Status and body of the response that ended the retry loop.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Issues GETs through a transport, retrying transient failures.
#[derive(Debug, Clone)]
pub struct RetryingFetcher {
    transport: AuthenticatedTransport,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(transport: AuthenticatedTransport, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &AuthenticatedTransport {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GETs `url` until a non-retryable response arrives.
    ///
    /// Any non-retryable status, 2xx or not, is handed back for the caller to
    /// interpret. Once the budget is spent the last error is returned.
    pub async fn get(&self, cancel: &Cancellation, url: &str) -> Result<FetchedResponse> {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    endpoint: url.to_string(),
                });
            }

            tracing::debug!(url, attempt, "GET");
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled { endpoint: url.to_string() });
                }
                outcome = self.send_once(url) => outcome,
            };

            let error = match outcome {
                Ok(response) if !is_retryable_status(response.status) => return Ok(response),
                Ok(response) => Error::unexpected_status(url, response.status, &response.body),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt >= self.policy.max_retries {
                tracing::warn!(url, attempts = attempt + 1, error = %error, "retries exhausted");
                return Err(error);
            }

            let delay = self.policy.backoff(attempt);
            tracing::warn!(url, attempt, delay_ms = delay.as_millis() as u64, error = %error, "retrying");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled { endpoint: url.to_string() });
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn send_once(&self, url: &str) -> Result<FetchedResponse> {
        let transport_error = |source| Error::Transport {
            endpoint: url.to_string(),
            source,
        };
        let response = self
            .transport
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        Ok(FetchedResponse { status, body })
    }
}
