//! Finding and fetching the portal login page

use crate::config::PortalProfile;
use crate::http::{self, HttpClient};
use crate::models::{FailureReason, PortalPage, ProbeResult};
use std::time::Duration;
use url::Url;

/// Portal URL from the probe's redirect target, else the profile's fallback
pub fn locate(probe: &ProbeResult, profile: &PortalProfile) -> Result<Url, FailureReason> {
    probe
        .portal_hint
        .clone()
        .or_else(|| profile.portal_fallback_url.clone())
        .ok_or(FailureReason::PortalUnrecognized)
}

/// Fetch the login page at `url`, trying the fallback URL once if `url`
/// gives no HTML. Any non-empty body from the fallback counts, whatever
/// its content type.
pub async fn fetch_portal(
    client: &HttpClient,
    url: &Url,
    profile: &PortalProfile,
    timeout: Duration,
) -> Result<PortalPage, FailureReason> {
    match fetch_html(client, url, timeout, true).await {
        Some(page) => return Ok(page),
        None => tracing::debug!("No portal page at {}", url),
    }

    match &profile.portal_fallback_url {
        Some(fallback) if fallback != url => {
            tracing::info!("   -> Trying fallback portal URL {}", fallback);
            fetch_html(client, fallback, timeout, false)
                .await
                .ok_or(FailureReason::PortalUnrecognized)
        }
        _ => Err(FailureReason::PortalUnrecognized),
    }
}

async fn fetch_html(
    client: &HttpClient,
    url: &Url,
    timeout: Duration,
    require_html: bool,
) -> Option<PortalPage> {
    let resp = match client.get(url, timeout).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!("Failed to fetch portal page {}: {}", url, e);
            return None;
        }
    };

    // Portals answer with 200 as often as with 511; any status will do
    // as long as there is a page
    let status = resp.status();
    let final_url = resp.url().clone();
    if require_html && !http::is_html(&resp) {
        tracing::debug!("{} answered {} without HTML", final_url, status);
        return None;
    }

    match resp.text().await {
        Ok(html) if !html.trim().is_empty() => Some(PortalPage { url: final_url, html }),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Failed to read portal page {}: {}", final_url, e);
            None
        }
    }
}
