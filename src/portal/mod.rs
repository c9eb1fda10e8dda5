//! Captive portal login engine
//!
//! One run is a straight pipeline driven by a single profile:
//!
//! probe → locate portal → fetch page → extract form → resolve fields →
//! submit → probe again
//!
//! Every stage either hands its result to the next or ends the run with a
//! [`FailureReason`]. Nothing is retried here; the caller's timer runs the
//! whole thing again later.

pub mod locator;

use crate::config::{non_empty, HttpConfig, PortalProfile};
use crate::http::HttpClient;
use crate::models::{Connectivity, FailureReason, PortalPage, RunOutcome};
use crate::{parser, probe, resolver, submit};
use anyhow::Result;
use std::time::Duration;

pub struct PortalLogin {
    profile: PortalProfile,
    client: HttpClient,
    timeout: Duration,
}

impl PortalLogin {
    pub fn new(profile: PortalProfile, http: &HttpConfig) -> Result<Self> {
        let timeout = profile.timeout(http);
        Ok(Self {
            profile,
            client: HttpClient::new(http)?,
            timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// Execute one full detection and login attempt
    pub async fn run(&self) -> RunOutcome {
        match self.attempt().await {
            Ok(outcome) => outcome,
            Err(reason) => RunOutcome::Failed(reason),
        }
    }

    async fn attempt(&self) -> Result<RunOutcome, FailureReason> {
        let name = self.name();
        let profile = &self.profile;

        tracing::info!("[{}] Step 1: Probing {}...", name, profile.probe_url);
        let result = probe::probe(
            &self.client,
            &profile.probe_url,
            profile.probe_expected_status,
            self.timeout,
        )
        .await;

        match result.classify(profile.probe_expected_status) {
            Connectivity::Online => {
                tracing::info!("[{}] Internet is reachable, nothing to do", name);
                return Ok(RunOutcome::Online);
            }
            Connectivity::Unreachable => {
                tracing::warn!("[{}] Probe failed: {:?}", name, result.error);
                return Err(FailureReason::ProbeUnreachable);
            }
            Connectivity::Intercepted => {
                tracing::info!(
                    "   -> Intercepted (HTTP {})",
                    result.status_code.unwrap_or_default()
                );
            }
        }

        tracing::info!("[{}] Step 2: Locating portal...", name);
        let portal_url = locator::locate(&result, profile)?;
        let page = locator::fetch_portal(&self.client, &portal_url, profile, self.timeout).await?;
        tracing::info!("   -> Portal page: {}", page.url);

        if self.shows_online(&page) {
            tracing::info!("[{}] Portal reports access already granted", name);
            return Ok(RunOutcome::Online);
        }

        tracing::info!("[{}] Step 3: Extracting login form...", name);
        let form = parser::extract_form(&page.html, &page.url, profile)?;
        tracing::info!(
            "   -> {:?} {} ({} field(s))",
            form.method,
            form.action,
            form.fields.len()
        );

        let payload = resolver::resolve(&form, profile, &page.url, &portal_url);
        tracing::debug!("   -> Payload keys: {:?}", payload.keys().collect::<Vec<_>>());

        tracing::info!("[{}] Step 4: Submitting login form...", name);
        let outcome =
            submit::submit_and_verify(&self.client, profile, &form, &payload, self.timeout).await;
        if outcome == RunOutcome::LoggedIn {
            tracing::info!("[{}] Connected successfully!", name);
        }
        Ok(outcome)
    }

    fn shows_online(&self, page: &PortalPage) -> bool {
        non_empty(&self.profile.already_online_marker)
            .map(|marker| page.html.to_lowercase().contains(&marker.to_lowercase()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::profile;
    use wiremock::matchers::{body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PORTAL_HTML: &str = r#"
        <html><body>
          <form action="/search"><input name="q"></form>
          <form action="/authenticate" method="post">
            <input type="hidden" name="csrf" value="xyz">
            <button type="submit">Jetzt surfen</button>
          </form>
        </body></html>
    "#;

    fn engine(server: &MockServer, extra: &str) -> PortalLogin {
        let p = profile(&format!(
            "probe_url = \"{}/generate_204\"\nrequest_timeout = 5\n{}",
            server.uri(),
            extra
        ));
        PortalLogin::new(p, &HttpConfig::default()).unwrap()
    }

    async fn mount_probe_once(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/generate_204"))
            .respond_with(response)
            .up_to_n_times(1)
            .mount(server)
            .await;
    }

    fn redirect_to_portal(server: &MockServer) -> ResponseTemplate {
        ResponseTemplate::new(302).insert_header(
            "Location",
            format!("{}/login?sessionId=abc123", server.uri()).as_str(),
        )
    }

    async fn mount_portal_page(server: &MockServer, html: &str) {
        Mock::given(method("GET"))
            .and(path("/login"))
            .and(query_param("sessionId", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(html.to_string(), "text/html"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_already_online_skips_portal() {
        let server = MockServer::start().await;
        mount_probe_once(&server, ResponseTemplate::new(204)).await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = engine(&server, "portal_fallback_url = \"http://127.0.0.1:1/login\"")
            .run()
            .await;
        assert_eq!(outcome, RunOutcome::Online);
    }

    #[tokio::test]
    async fn test_full_login() {
        let server = MockServer::start().await;
        mount_probe_once(&server, redirect_to_portal(&server)).await;
        mount_probe_once(&server, ResponseTemplate::new(204)).await;
        mount_portal_page(&server, PORTAL_HTML).await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .and(body_string("csrf=xyz&sessionId=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = engine(
            &server,
            "form_action_contains = \"authenticate\"\n\
             button_text_contains = \"jetzt surfen\"\n\
             query_fields_from_portal_url = [\"sessionId\"]",
        )
        .run()
        .await;
        assert_eq!(outcome, RunOutcome::LoggedIn);
    }

    #[tokio::test]
    async fn test_session_id_survives_second_redirect() {
        let server = MockServer::start().await;
        mount_probe_once(&server, redirect_to_portal(&server)).await;
        mount_probe_once(&server, ResponseTemplate::new(204)).await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/portal.html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/portal.html"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PORTAL_HTML, "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .and(body_string("csrf=xyz&sessionId=abc123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = engine(
            &server,
            "form_action_contains = \"authenticate\"\n\
             query_fields_from_portal_url = [\"sessionId\"]",
        )
        .run()
        .await;
        assert_eq!(outcome, RunOutcome::LoggedIn);
    }

    #[tokio::test]
    async fn test_portal_cookies_sent_with_login() {
        let server = MockServer::start().await;
        mount_probe_once(&server, redirect_to_portal(&server)).await;
        mount_probe_once(&server, ResponseTemplate::new(204)).await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "PORTALSESSION=s3cr3t; Path=/")
                    .set_body_raw(PORTAL_HTML, "text/html"),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .and(wiremock::matchers::header("cookie", "PORTALSESSION=s3cr3t"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = engine(&server, "form_action_contains = \"authenticate\"").run().await;
        assert_eq!(outcome, RunOutcome::LoggedIn);
    }

    #[tokio::test]
    async fn test_zero_forms() {
        let server = MockServer::start().await;
        mount_probe_once(&server, redirect_to_portal(&server)).await;
        mount_portal_page(&server, "<html><body>Welcome</body></html>").await;

        let outcome = engine(&server, "form_action_contains = \"authenticate\"").run().await;
        assert_eq!(outcome, RunOutcome::Failed(FailureReason::FormNotFound));
    }

    #[tokio::test]
    async fn test_verification_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generate_204"))
            .respond_with(redirect_to_portal(&server))
            .expect(2)
            .mount(&server)
            .await;
        mount_portal_page(&server, PORTAL_HTML).await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = engine(&server, "form_action_contains = \"authenticate\"").run().await;
        assert_eq!(outcome, RunOutcome::Failed(FailureReason::VerificationFailed));
    }

    #[tokio::test]
    async fn test_submission_rejected() {
        let server = MockServer::start().await;
        mount_probe_once(&server, redirect_to_portal(&server)).await;
        mount_portal_page(&server, PORTAL_HTML).await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let outcome = engine(&server, "form_action_contains = \"authenticate\"").run().await;
        assert_eq!(outcome, RunOutcome::Failed(FailureReason::SubmissionRejected));
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let p = profile("probe_url = \"http://127.0.0.1:1/generate_204\"\nrequest_timeout = 5");
        let outcome = PortalLogin::new(p, &HttpConfig::default()).unwrap().run().await;
        assert_eq!(outcome, RunOutcome::Failed(FailureReason::ProbeUnreachable));
    }

    #[tokio::test]
    async fn test_portal_unrecognized() {
        let server = MockServer::start().await;
        mount_probe_once(&server, ResponseTemplate::new(403)).await;

        let outcome = engine(&server, "").run().await;
        assert_eq!(outcome, RunOutcome::Failed(FailureReason::PortalUnrecognized));
    }

    #[tokio::test]
    async fn test_fallback_portal_when_no_redirect() {
        let server = MockServer::start().await;
        mount_probe_once(&server, ResponseTemplate::new(403)).await;
        mount_probe_once(&server, ResponseTemplate::new(204)).await;
        Mock::given(method("GET"))
            .and(path("/fallback"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PORTAL_HTML, "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .and(body_string("accessType=termsOnly&csrf=xyz"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/done"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/done"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let extra = format!(
            "portal_fallback_url = \"{}/fallback\"\n\
             form_action_contains = \"authenticate\"\n\
             [default_form_fields]\n\
             accessType = \"termsOnly\"",
            server.uri()
        );
        let outcome = engine(&server, &extra).run().await;
        assert_eq!(outcome, RunOutcome::LoggedIn);
    }

    #[tokio::test]
    async fn test_already_online_marker() {
        let server = MockServer::start().await;
        mount_probe_once(&server, redirect_to_portal(&server)).await;
        mount_portal_page(&server, "<h1>Sie sind online. JETZT SURFEN!</h1>").await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = engine(&server, "already_online_marker = \"jetzt surfen\"").run().await;
        assert_eq!(outcome, RunOutcome::Online);
    }
}
