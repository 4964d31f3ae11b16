//! Retry policy for idempotent requests.
//!
//! GET requests to the backend retry on 429/5xx with exponential backoff,
//! jitter and numeric `Retry-After` support. Mutating requests never pass
//! through here: copy/move/rename/delete/create are sent exactly once.

use std::time::Duration;

use reqwest::Response;

use super::ApiError;

/// Retry behavior for idempotent requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Numeric `Retry-After` only; HTTP-date values fall back to backoff.
fn parse_retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get("retry-after")?.to_str().ok()?;
    let secs: u64 = value.parse().ok()?;
    Some(Duration::from_secs(secs.min(60)))
}

fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base = config.base_delay_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_delay_ms as f64);
    let jitter = capped * (0.1 + rand::random::<f64>() * 0.2);
    Duration::from_millis((capped + jitter) as u64)
}

/// Send a request built by `builder`, retrying retryable statuses.
///
/// Each attempt runs under `timeout`; a timeout is a hard failure, never a
/// retry. Transport errors map to [`ApiError::Network`]. Non-2xx responses
/// that are not retryable are returned to the caller for interpretation.
pub async fn send_with_retry(
    builder: reqwest::RequestBuilder,
    timeout: Duration,
    config: &RetryConfig,
) -> Result<Response, ApiError> {
    let mut attempt: u32 = 0;
    loop {
        let request = builder
            .try_clone()
            .ok_or_else(|| ApiError::Network("request body is not cloneable".to_string()))?;

        let response = match tokio::time::timeout(timeout, request.send()).await {
            Err(_) => return Err(ApiError::Timeout),
            Ok(Err(e)) => return Err(ApiError::Network(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let status = response.status().as_u16();
        if !is_retryable_status(status) || attempt >= config.max_retries {
            return Ok(response);
        }

        let delay = parse_retry_after(&response).unwrap_or_else(|| backoff_delay(attempt, config));
        tracing::debug!(
            "GET {} returned {}, retry {}/{} after {:?}",
            response.url(),
            status,
            attempt + 1,
            config.max_retries,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Send a mutating request exactly once under `timeout`.
pub async fn send_once(
    builder: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<Response, ApiError> {
    match tokio::time::timeout(timeout, builder.send()).await {
        Err(_) => Err(ApiError::Timeout),
        Ok(Err(e)) => Err(ApiError::Network(e.to_string())),
        Ok(Ok(response)) => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(200));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn test_backoff_delay_bounded() {
        let config = RetryConfig::default();
        for attempt in 0..10 {
            let delay = backoff_delay(attempt, &config);
            // Jitter adds at most 30% on top of the cap.
            assert!(delay.as_millis() <= (config.max_delay_ms as u128 * 13) / 10);
        }
    }

    #[test]
    fn test_backoff_delay_grows() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        };
        let first = backoff_delay(0, &config);
        let third = backoff_delay(2, &config);
        assert!(third > first);
    }
}
