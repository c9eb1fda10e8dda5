//! Login submission and post-login verification
//!
//! Portals often answer the login request with a success page before the
//! gateway actually opens, or even when it never will (bad credentials,
//! rate limits). The run only counts as logged in once the probe passes.

use crate::config::PortalProfile;
use crate::http::HttpClient;
use crate::models::{Connectivity, ExtractedForm, FailureReason, RunOutcome, SubmissionPayload};
use crate::probe;
use std::time::Duration;

pub async fn submit_and_verify(
    client: &HttpClient,
    profile: &PortalProfile,
    form: &ExtractedForm,
    payload: &SubmissionPayload,
    timeout: Duration,
) -> RunOutcome {
    if let Err(reason) = send_login(client, form, payload, timeout).await {
        return RunOutcome::Failed(reason);
    }

    if profile.verify_delay > 0 {
        tracing::debug!("Waiting {}s before re-checking", profile.verify_delay);
        tokio::time::sleep(Duration::from_secs(profile.verify_delay)).await;
    }

    let result = probe::probe(client, &profile.probe_url, profile.probe_expected_status, timeout).await;
    match result.classify(profile.probe_expected_status) {
        Connectivity::Online => RunOutcome::LoggedIn,
        state => {
            tracing::warn!(
                "[{}] Still offline after login ({:?}, status {:?})",
                profile.name,
                state,
                result.status_code
            );
            RunOutcome::Failed(FailureReason::VerificationFailed)
        }
    }
}

async fn send_login(
    client: &HttpClient,
    form: &ExtractedForm,
    payload: &SubmissionPayload,
    timeout: Duration,
) -> Result<(), FailureReason> {
    let resp = client
        .submit_form(&form.action, form.method, payload, timeout)
        .await
        .map_err(|e| {
            tracing::warn!("Login request to {} failed: {}", form.action, e);
            FailureReason::SubmissionRejected
        })?;

    let status = resp.status();
    if status.is_success() || status.is_redirection() {
        tracing::info!("   -> Portal answered {}", status);
        Ok(())
    } else {
        tracing::warn!("Login request returned HTTP {}", status);
        Err(FailureReason::SubmissionRejected)
    }
}
