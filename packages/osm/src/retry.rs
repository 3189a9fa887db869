//! HTTP retry for Overpass requests.
//!
//! Overpass mirrors are frequently overloaded: they answer 429 or 504,
//! drop connections, or cut responses short. [`send_json`] retries those
//! cases with exponential backoff before the client moves on to the next
//! endpoint.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::SyncError;

/// Retry attempts per endpoint for transient failures.
///
/// Backoff is 2s, 4s, 8s, so an endpoint is given up after 14 seconds of
/// waiting plus the request timeouts.
pub const MAX_RETRIES: u32 = 3;

/// Re-fetch attempts when a response body is truncated or not JSON.
const MAX_BODY_RETRIES: u32 = 2;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends the request built by `build_request` and decodes the body as `T`.
///
/// The closure is called on each attempt since builders are consumed by
/// `.send()`. Connection errors, timeouts, HTTP 429 and 5xx are retried
/// up to [`MAX_RETRIES`] times; a body that fails to decode triggers a
/// full re-fetch. Other 4xx statuses are permanent.
///
/// # Errors
///
/// Returns [`SyncError`] if the request still fails after all retries.
#[allow(clippy::future_not_send)]
pub async fn send_json<T, F>(build_request: F) -> Result<T, SyncError>
where
    T: DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut body_attempt = 0;
    loop {
        let response = send_inner(&build_request, MAX_RETRIES).await?;
        let url = response.url().to_string();
        let status = response.status();

        let error = match response.text().await {
            Ok(text) => match serde_json::from_str::<T>(&text) {
                Ok(value) => return Ok(value),
                Err(json_err) => {
                    log::warn!(
                        "JSON parse failed\n  url: {url}\n  status: {status}\n  \
                         received: {} bytes\n  parse error: {json_err}\n  body preview: {}",
                        text.len(),
                        preview(&text),
                    );
                    SyncError::Json(json_err)
                }
            },
            Err(e) => {
                log::warn!("Response body read failed\n  url: {url}\n  error: {e}");
                SyncError::Http(e)
            }
        };

        if body_attempt >= MAX_BODY_RETRIES {
            log::error!("Giving up on {url} after {MAX_BODY_RETRIES} body retries");
            return Err(error);
        }
        body_attempt += 1;
        let delay = Duration::from_secs(1u64 << body_attempt);
        log::warn!("  body retry {body_attempt}/{MAX_BODY_RETRIES} in {delay:?}...");
        tokio::time::sleep(delay).await;
    }
}

/// Retry loop around a single send. Returns the first non-error response.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F, max_retries: u32) -> Result<reqwest::Response, SyncError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        let error = match build_request().send().await {
            Err(e) if is_transient(&e) => {
                log::warn!("  transient error: {e}");
                SyncError::Http(e)
            }
            Err(e) => return Err(SyncError::Http(e)),
            Ok(response) => {
                let status = response.status();
                if !is_retryable_status(status) {
                    if status.is_client_error() {
                        return Err(SyncError::Status {
                            message: format!("HTTP {status}"),
                        });
                    }
                    return Ok(response);
                }
                log::warn!("  HTTP {status}");
                SyncError::Status {
                    message: format!("HTTP {status}"),
                }
            }
        };

        if attempt >= max_retries {
            return Err(error);
        }
        attempt += 1;
    }
}

/// 429 and 5xx are worth another try; Overpass uses both for overload.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
