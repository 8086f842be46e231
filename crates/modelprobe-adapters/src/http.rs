//! Shared request plumbing for the HTTP adapters.

use std::time::{Duration, Instant};

use modelprobe_core::{ProbeError, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error;

/// Build the client shared by every adapter a factory hands out.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("modelprobe/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProbeError::config(format!("failed to create HTTP client: {e}")))
}

/// Join a base URL and an endpoint path, tolerating a trailing slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Send a prepared request and decode the JSON body.
///
/// Returns the decoded body together with the measured latency in
/// milliseconds, covering both the request and the body download.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<(T, f64)> {
    let start = Instant::now();
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| error::from_reqwest(e, timeout))?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| error::from_reqwest(e, timeout))?;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    if !status.is_success() {
        return Err(error::from_status(status, &String::from_utf8_lossy(&bytes)));
    }
    debug!(status = status.as_u16(), bytes = bytes.len(), latency_ms, "response received");

    let body = serde_json::from_slice(&bytes)
        .map_err(|e| ProbeError::AdapterProtocol(format!("invalid response body: {e}")))?;
    Ok((body, latency_ms))
}
