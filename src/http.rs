//! HTTP client with timeouts and a cookie jar shared across one run

use crate::config::HttpConfig;
use crate::models::{FormMethod, SubmissionPayload};
use anyhow::Result;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub struct HttpClient {
    /// Follows redirects; used for the portal page and the login request
    session: Client,
    /// Never follows redirects, so interception stays visible
    probe: Client,
}

impl HttpClient {
    pub fn new(cfg: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&cfg.user_agent)?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        let jar = Arc::new(Jar::default());
        let timeout = Duration::from_secs(cfg.timeout);
        let connect_timeout = Duration::from_secs(cfg.connect_timeout);

        let session = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .default_headers(headers.clone())
            .build()?;

        let probe = Client::builder()
            .cookie_provider(jar)
            .redirect(Policy::none())
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { session, probe })
    }

    /// GET without following redirects
    pub async fn probe_get(&self, url: &Url, timeout: Duration) -> reqwest::Result<Response> {
        self.probe.get(url.clone()).timeout(timeout).send().await
    }

    /// GET following redirects
    pub async fn get(&self, url: &Url, timeout: Duration) -> reqwest::Result<Response> {
        self.session.get(url.clone()).timeout(timeout).send().await
    }

    /// Send a form the way a browser would for the given method
    pub async fn submit_form(
        &self,
        url: &Url,
        method: FormMethod,
        payload: &SubmissionPayload,
        timeout: Duration,
    ) -> reqwest::Result<Response> {
        let request = match method {
            FormMethod::Post => self.session.post(url.clone()).form(payload),
            FormMethod::Get => self.session.get(url.clone()).query(payload),
        };
        request.timeout(timeout).send().await
    }
}

/// True when the response declares an HTML body
pub fn is_html(resp: &Response) -> bool {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml")
        })
        .unwrap_or(false)
}
