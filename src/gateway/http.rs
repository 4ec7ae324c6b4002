//! # Rate-limited, retried, timeout-bounded HTTP access
//!
//! [`HttpFetcher`] is the single object through which every provider adapter talks
//! to the network. It owns:
//!
//! - a persistent [`reqwest::Client`] (connection reuse across requests),
//! - a shared [`RateLimiter`] (sliding window, default 10 requests / 60 s),
//! - a [`RetryPolicy`] (per-attempt timeout, linear backoff).
//!
//! ## Failure classification
//!
//! | outcome                         | error                          | retried |
//! |---------------------------------|--------------------------------|---------|
//! | attempt exceeds the timeout     | [`IsotrackError::Timeout`]     | yes     |
//! | connection / transport failure  | [`IsotrackError::Network`]     | yes     |
//! | HTTP 5xx                        | [`IsotrackError::HttpStatus`]  | yes     |
//! | HTTP 4xx                        | [`IsotrackError::HttpStatus`]  | no      |
//!
//! Dropping the future returned by [`HttpFetcher::get_text`] cancels the in-flight
//! request; nothing is left running in the background.

use std::sync::Arc;
use std::time::Duration;

use crate::{config::GatewayConfig, isotrack_errors::IsotrackError};

use super::rate_limiter::RateLimiter;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    pub max_attempts: u32,
    /// Attempt `n` is followed by a pause of `n × backoff_step`.
    pub backoff_step: Duration,
    /// Bound on a single attempt (request and body).
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&GatewayConfig> for RetryPolicy {
    fn from(config: &GatewayConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            backoff_step: config.backoff_step(),
            timeout: config.timeout(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Result<Self, IsotrackError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("isotrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IsotrackError::Network(e.to_string()))?;

        Ok(HttpFetcher {
            client,
            limiter,
            policy,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, IsotrackError> {
        let limiter = Arc::new(RateLimiter::new(
            config.requests_per_window,
            config.window(),
        ));
        Self::new(limiter, RetryPolicy::from(config))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `url` with `query` and return the response body as text.
    ///
    /// Arguments
    /// ---------
    /// * `provider`: name used in logs and timeout errors
    /// * `url`: endpoint
    /// * `query`: query-string pairs (encoded by reqwest)
    ///
    /// Return
    /// ------
    /// * the body of the first successful attempt, or the error of the last one
    pub async fn get_text(
        &self,
        provider: &str,
        url: &str,
        query: &[(String, String)],
    ) -> Result<String, IsotrackError> {
        let mut attempt: u32 = 1;
        loop {
            self.limiter.acquire().await;

            match self.attempt(provider, url, query).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    let backoff = self.policy.backoff_step * attempt;
                    tracing::warn!(
                        provider,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(
        &self,
        provider: &str,
        url: &str,
        query: &[(String, String)],
    ) -> Result<String, IsotrackError> {
        let request = async {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| IsotrackError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(IsotrackError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            response
                .text()
                .await
                .map_err(|e| IsotrackError::Network(e.to_string()))
        };

        match tokio::time::timeout(self.policy.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(IsotrackError::Timeout {
                provider: provider.to_string(),
                after_secs: self.policy.timeout.as_secs(),
            }),
        }
    }
}
