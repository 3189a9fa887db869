//! Overpass API client with endpoint fallback.

use std::time::Duration;

use crate::element::OverpassResponse;
use crate::{OVERPASS_ENDPOINTS, SyncError, retry};

/// Per-request timeout. Overpass queries declare their own server-side
/// timeout of 60-90 seconds, so this leaves headroom for the transfer.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("equity-map/", env!("CARGO_PKG_VERSION"));

/// Sends Overpass QL to a list of endpoints, falling through to the next
/// one when an endpoint keeps failing.
#[derive(Debug, Clone)]
pub struct OverpassClient {
    http: reqwest::Client,
    endpoints: Vec<String>,
}

impl OverpassClient {
    /// Client for the public [`OVERPASS_ENDPOINTS`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SyncError> {
        Self::with_endpoints(OVERPASS_ENDPOINTS.iter().map(ToString::to_string).collect())
    }

    /// Client for custom endpoints, tried in order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if the HTTP client cannot be built.
    pub fn with_endpoints(endpoints: Vec<String>) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { http, endpoints })
    }

    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Runs `query` and returns the parsed response of the first endpoint
    /// that answers successfully.
    ///
    /// A response whose `remark` reports a runtime error is incomplete and
    /// counts as a failure of that endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AllEndpointsFailed`] with one message per
    /// endpoint if none of them produced a usable response.
    #[allow(clippy::future_not_send)]
    pub async fn fetch(&self, query: &str) -> Result<OverpassResponse, SyncError> {
        let mut errors = Vec::with_capacity(self.endpoints.len());

        for endpoint in &self.endpoints {
            log::info!("Querying {endpoint}");
            log::debug!("Overpass query:\n{query}");

            let result = retry::send_json::<OverpassResponse, _>(|| {
                self.http.post(endpoint).form(&[("data", query)])
            })
            .await
            .and_then(check_remark);

            match result {
                Ok(response) => {
                    log::info!("Received {} elements from {endpoint}", response.elements.len());
                    return Ok(response);
                }
                Err(e) => {
                    log::warn!("Overpass endpoint {endpoint} failed: {e}");
                    errors.push(format!("{endpoint}: {e}"));
                }
            }
        }

        Err(SyncError::AllEndpointsFailed { errors })
    }
}

fn check_remark(response: OverpassResponse) -> Result<OverpassResponse, SyncError> {
    match &response.remark {
        Some(remark) if remark.contains("runtime error") => Err(SyncError::Status {
            message: remark.clone(),
        }),
        _ => Ok(response),
    }
}
