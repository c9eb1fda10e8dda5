//! Data models for captive portal detection and login

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Final request body sent to the portal
pub type SubmissionPayload = BTreeMap<String, String>;

/// Transport-level failure observed while probing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    Connect,
    Request,
}

impl From<&reqwest::Error> for TransportError {
    fn from(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect
        } else {
            TransportError::Request
        }
    }
}

/// Result of a single connectivity probe
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// The probe endpoint answered at the HTTP level
    pub reached: bool,
    pub status_code: Option<u16>,
    pub error: Option<TransportError>,
    /// Where the interceptor pointed us: a redirect target, or the probed
    /// URL itself when it was answered with an HTML page
    pub portal_hint: Option<Url>,
}

/// How a probe result reads against the expected status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Intercepted,
    Unreachable,
}

impl ProbeResult {
    pub fn unreachable(error: TransportError) -> Self {
        Self {
            reached: false,
            status_code: None,
            error: Some(error),
            portal_hint: None,
        }
    }

    pub fn classify(&self, expected_status: u16) -> Connectivity {
        match (self.reached, self.status_code) {
            (true, Some(status)) if status == expected_status => Connectivity::Online,
            (true, _) => Connectivity::Intercepted,
            (false, _) => Connectivity::Unreachable,
        }
    }
}

/// HTTP method declared by a form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

impl FormMethod {
    pub fn from_attr(method: Option<&str>) -> Self {
        match method {
            Some(m) if m.trim().eq_ignore_ascii_case("post") => FormMethod::Post,
            _ => FormMethod::Get,
        }
    }
}

/// Login form extracted from the portal page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedForm {
    /// Absolute submission URL
    pub action: Url,
    pub method: FormMethod,
    pub fields: BTreeMap<String, String>,
}

/// Portal login page as fetched
#[derive(Debug, Clone)]
pub struct PortalPage {
    /// Final URL after redirects
    pub url: Url,
    pub html: String,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[error("probe endpoint unreachable")]
    ProbeUnreachable,

    #[error("no portal URL from redirect or fallback")]
    PortalUnrecognized,

    #[error("no login form matched")]
    FormNotFound,

    #[error("login request rejected")]
    SubmissionRejected,

    #[error("still offline after login")]
    VerificationFailed,
}

impl FailureReason {
    pub fn exit_code(self) -> u8 {
        match self {
            FailureReason::ProbeUnreachable => 2,
            FailureReason::PortalUnrecognized => 3,
            FailureReason::FormNotFound => 4,
            FailureReason::SubmissionRejected => 5,
            FailureReason::VerificationFailed => 6,
        }
    }
}

/// Outcome of one run, the only thing the caller observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Internet was already reachable
    Online,
    /// Portal form submitted and connectivity confirmed
    LoggedIn,
    Failed(FailureReason),
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Online | RunOutcome::LoggedIn => 0,
            RunOutcome::Failed(reason) => reason.exit_code(),
        }
    }
}

impl From<FailureReason> for RunOutcome {
    fn from(reason: FailureReason) -> Self {
        RunOutcome::Failed(reason)
    }
}
