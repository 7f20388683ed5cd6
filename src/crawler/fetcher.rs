//! HTTP fetch engine with retry and backoff
//!
//! One shared client per crawl run carries the configured user-agent and
//! timeout. The retry policy is an explicit value passed into the fetch
//! call rather than behavior baked into the client, so it can be tested in
//! isolation.

use crate::config::{CrawlerConfig, RetryConfig};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Errors a fetch can surface after retries are exhausted
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request timeout for {url}")]
    Timeout { url: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },
}

/// A successfully fetched page
#[derive(Debug)]
pub struct Fetched {
    /// Page body
    pub body: String,

    /// HTTP status code of the final response
    pub status: u16,

    /// Number of attempts it took, 1 when the first try succeeded
    pub attempts: u32,
}

/// Retry policy for the fetch engine
///
/// Non-2xx responses and transport errors are retryable; the delay is
/// multiplied by `backoff_factor` between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts per URL (first try included)
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Multiplier applied to the delay after each failed attempt
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// Builds the policy from configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
        }
    }
}

/// Builds the shared HTTP client for a crawl run
///
/// # Arguments
///
/// * `config` - The crawler configuration (user-agent, timeout)
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, retrying per policy
///
/// Each attempt treats a non-2xx status the same as a transport error:
/// wait, multiply the delay by the backoff factor, try again. Exhausting
/// `max_attempts` surfaces the last error; the caller treats the URL as
/// unavailable for this cycle and mutates nothing.
///
/// # Arguments
///
/// * `client` - The shared HTTP client
/// * `url` - The URL to fetch
/// * `policy` - The retry policy to apply
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Fetched, FetchError> {
    let mut delay = policy.initial_delay;
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match fetch_once(client, url).await {
            Ok((body, status)) => {
                return Ok(Fetched {
                    body,
                    status,
                    attempts: attempt,
                });
            }
            Err(error) => {
                if attempt < policy.max_attempts {
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}. Retrying in {:?}",
                        attempt,
                        policy.max_attempts,
                        url,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(policy.backoff_factor);
                } else {
                    tracing::error!(
                        "All {} attempts failed for {}: {}",
                        policy.max_attempts,
                        url,
                        error
                    );
                }
                last_error = Some(error);
            }
        }
    }

    // max_attempts >= 1, so last_error is always set here
    Err(last_error.unwrap_or(FetchError::Network {
        url: url.to_string(),
        message: "no attempts made".to_string(),
    }))
}

/// Performs a single GET, classifying the outcome
async fn fetch_once(client: &Client, url: &str) -> Result<(String, u16), FetchError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|e| FetchError::Network {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    Ok((body, status.as_u16()))
}
