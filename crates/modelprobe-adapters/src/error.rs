//! Mapping of HTTP failures onto the core error taxonomy.

use std::time::Duration;

use modelprobe_core::ProbeError;
use reqwest::StatusCode;

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 320;

/// Classify a reqwest failure.
pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> ProbeError {
    if err.is_timeout() {
        ProbeError::AdapterTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if err.is_decode() {
        ProbeError::AdapterProtocol(format!("invalid response body: {err}"))
    } else {
        ProbeError::AdapterTransport(err.to_string())
    }
}

/// Classify a non-success status.
pub(crate) fn from_status(status: StatusCode, body: &str) -> ProbeError {
    let body = truncate(body.trim(), MAX_ERROR_BODY);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProbeError::AdapterAuth(format!("HTTP {}: {body}", status.as_u16()))
        }
        _ => ProbeError::AdapterHttp {
            status: status.as_u16(),
            body,
        },
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
