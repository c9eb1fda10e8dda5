//! Connectivity probe
//!
//! A captive portal answers the probe endpoint itself, usually with a
//! redirect to its login page or with the login page in place of the
//! expected empty response. Only transport failures count as errors; any
//! status that is not the expected one means interception.

use crate::http::{self, HttpClient};
use crate::models::{ProbeResult, TransportError};
use reqwest::header::LOCATION;
use std::time::Duration;
use url::Url;

pub async fn probe(
    client: &HttpClient,
    url: &Url,
    expected_status: u16,
    timeout: Duration,
) -> ProbeResult {
    let resp = match client.probe_get(url, timeout).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::debug!("Probe {} failed: {}", url, e);
            return ProbeResult::unreachable(TransportError::from(&e));
        }
    };

    let status = resp.status();
    let portal_hint = if status.as_u16() == expected_status {
        None
    } else if status.is_redirection() {
        resp.headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| url.join(location.trim()).ok())
    } else if http::is_html(&resp) {
        Some(resp.url().clone())
    } else {
        None
    };

    tracing::debug!(
        "Probe {} -> {} (portal hint: {})",
        url,
        status,
        portal_hint.as_ref().map(Url::as_str).unwrap_or("none")
    );

    ProbeResult {
        reached: true,
        status_code: Some(status.as_u16()),
        error: None,
        portal_hint,
    }
}
