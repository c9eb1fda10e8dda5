//! Configuration management
//!
//! This module handles loading configuration from TOML files and the
//! environment. Each captive portal is described by a profile; the engine
//! itself has no portal-specific code, so supporting a new network means
//! adding a `[[profiles]]` entry.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const ENV_PREFIX: &str = "HOTSPOT_LOGIN";
const DEFAULT_PROBE_URL: &str = "http://connectivitycheck.gstatic.com/generate_204";

/// Profiles shipped with the binary
const BUILTIN_PROFILES: &[&str] = &[
    include_str!("../profiles/bayernwlan.toml"),
    include_str!("../profiles/telekom.toml"),
];

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Profile to use when none is given on the command line
    #[serde(default)]
    pub default_profile: Option<String>,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Portal profiles (one per network)
    #[serde(default)]
    pub profiles: Vec<PortalProfile>,
}

/// Everything the engine needs to know about one captive portal
#[derive(Debug, Deserialize, Clone)]
pub struct PortalProfile {
    /// Human-readable name, also used for `--profile`
    pub name: String,

    /// SSIDs served by this portal, for automatic profile selection
    #[serde(default)]
    pub ssids: Vec<String>,

    /// Plain-HTTP endpoint the portal is expected to intercept
    #[serde(default = "default_probe_url")]
    pub probe_url: Url,

    /// Status the probe endpoint returns when not intercepted
    #[serde(default = "default_probe_status")]
    pub probe_expected_status: u16,

    /// Login page used when the probe gave no redirect target
    #[serde(default)]
    pub portal_fallback_url: Option<Url>,

    /// `id` of the login form; takes precedence over the other heuristics
    #[serde(default)]
    pub form_id: Option<String>,

    /// Substring of the form's `action` attribute
    #[serde(default)]
    pub form_action_contains: Option<String>,

    /// Substring of the submit control's label
    #[serde(default)]
    pub button_text_contains: Option<String>,

    /// Text on the portal page meaning access is already granted
    #[serde(default)]
    pub already_online_marker: Option<String>,

    /// Fields added to the payload when the form does not carry them
    #[serde(default)]
    pub default_form_fields: BTreeMap<String, String>,

    /// Query parameters of the portal URL echoed back in the payload
    #[serde(default)]
    pub query_fields_from_portal_url: Vec<String>,

    /// Let `default_form_fields` replace values found in the form
    #[serde(default)]
    pub default_fields_override: bool,

    /// Per-request timeout in seconds (falls back to `http.timeout`)
    #[serde(default)]
    pub request_timeout: Option<u64>,

    /// Seconds to wait after submitting before re-probing
    #[serde(default)]
    pub verify_delay: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional log file path
    #[serde(default)]
    pub log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_file: String::new(),
        }
    }
}

/// Settings that may be overridden from the environment
#[derive(Debug, Deserialize, Default)]
struct EnvOverrides {
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
}

// Default value functions
fn default_probe_url() -> Url {
    Url::parse(DEFAULT_PROBE_URL).expect("default probe URL is valid")
}

fn default_probe_status() -> u16 {
    204
}

fn default_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) Chrome/120.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Treat blank strings in optional settings as unset
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl PortalProfile {
    /// Timeout applied to each request of a run
    pub fn timeout(&self, http: &HttpConfig) -> Duration {
        Duration::from_secs(self.request_timeout.unwrap_or(http.timeout))
    }

    pub fn matches_ssid(&self, ssid: &str) -> bool {
        self.ssids.iter().any(|s| s == ssid)
    }
}

impl Config {
    /// Load configuration from `path`, or from the first file found in the
    /// default locations, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::search_paths().into_iter().find(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env()?;
        Ok(config)
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("hotspot-login.toml"),
            PathBuf::from("/etc/hotspot-login/config.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("hotspot-login/config.toml"));
        }
        paths
    }

    fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        for profile in &config.profiles {
            if profile.name.trim().is_empty() {
                bail!("Profile with empty name");
            }
        }
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        let overrides: EnvOverrides = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read environment overrides")?
            .try_deserialize()
            .context("Invalid environment override")?;

        if let Some(profile) = overrides.profile.filter(|p| !p.is_empty()) {
            self.default_profile = Some(profile);
        }
        if let Some(level) = overrides.log_level.filter(|l| !l.is_empty()) {
            self.logging.level = level;
        }
        if let Some(timeout) = overrides.timeout {
            self.http.timeout = timeout;
        }
        Ok(())
    }

    /// Profiles compiled into the binary
    pub fn builtin_profiles() -> Result<Vec<PortalProfile>> {
        BUILTIN_PROFILES
            .iter()
            .map(|src| toml::from_str(src).context("Invalid built-in profile"))
            .collect()
    }

    /// User profiles followed by built-ins they do not shadow
    pub fn all_profiles(&self) -> Result<Vec<PortalProfile>> {
        let mut profiles = self.profiles.clone();
        for builtin in Self::builtin_profiles()? {
            if !profiles.iter().any(|p| p.name == builtin.name) {
                profiles.push(builtin);
            }
        }
        Ok(profiles)
    }

    /// Pick the profile for this run.
    ///
    /// Order: explicit request, `default_profile`, a profile listing the
    /// connected SSID, the only user-defined profile.
    pub fn select_profile<F>(&self, requested: Option<&str>, current_ssid: F) -> Result<PortalProfile>
    where
        F: FnOnce() -> Option<String>,
    {
        let profiles = self.all_profiles()?;
        let names = || {
            profiles
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        if let Some(name) = requested.or(self.default_profile.as_deref()) {
            return profiles
                .iter()
                .find(|p| p.name == name)
                .cloned()
                .with_context(|| format!("Unknown profile '{}' (available: {})", name, names()));
        }

        if profiles.iter().any(|p| !p.ssids.is_empty()) {
            if let Some(ssid) = current_ssid() {
                if let Some(profile) = profiles.iter().find(|p| p.matches_ssid(&ssid)) {
                    tracing::debug!("Profile '{}' matches SSID '{}'", profile.name, ssid);
                    return Ok(profile.clone());
                }
                tracing::debug!("No profile lists SSID '{}'", ssid);
            }
        }

        if let [only] = self.profiles.as_slice() {
            return Ok(only.clone());
        }

        bail!("No profile selected; use --profile (available: {})", names())
    }
}
