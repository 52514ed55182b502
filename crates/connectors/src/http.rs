//! Retrying request loop shared by the Gate and SaaS clients.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// Sends the request built by `build`, retrying timeouts, connection errors,
/// 429 and 5xx with exponential backoff. Other 4xx fail immediately.
/// Returns the response body.
pub async fn execute_with_retry<F>(max_retries: u32, build: F) -> Result<String, HttpClientError>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_error = String::new();

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff_secs = std::cmp::min(1u64 << attempt, 30);
            tracing::warn!(attempt, backoff_secs, "retrying after backoff");
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
        }

        let response = match build().send().await {
            Ok(resp) => resp,
            Err(e) => {
                last_error = e.to_string();
                if e.is_timeout() || e.is_connect() {
                    continue;
                }
                return Err(HttpClientError::RequestError(e));
            }
        };

        let status = response.status();

        if status.is_success() {
            return response.text().await.map_err(HttpClientError::RequestError);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            if let Some(retry_after) = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
            {
                let wait = std::cmp::min(retry_after, 60);
                tracing::warn!(wait, "rate-limited, waiting Retry-After");
                tokio::time::sleep(Duration::from_secs(wait)).await;
            }
            last_error = "429 Too Many Requests".to_string();
            continue;
        }

        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            last_error = format!("{status}: {body}");
            continue;
        }

        let body = response.text().await.unwrap_or_default();
        return Err(HttpClientError::HttpError { status, body });
    }

    Err(HttpClientError::MaxRetriesExceeded {
        attempts: max_retries + 1,
        last_error,
    })
}

/// [`execute_with_retry`] followed by JSON decoding of the body.
pub async fn json_with_retry<T, F>(max_retries: u32, build: F) -> Result<T, HttpClientError>
where
    T: DeserializeOwned,
    F: Fn() -> RequestBuilder,
{
    let body = execute_with_retry(max_retries, build).await?;
    Ok(serde_json::from_str(&body)?)
}
