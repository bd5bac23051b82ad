//! Trust server configuration.

use std::time::Duration;

use serde::Deserialize;
use url::{Host, Url};

use crate::error::{AppAttestError, AppAttestResult};

/// Production trust server.
pub const DEFAULT_BASE_URL: &str = "https://mlpa-prod-prod-mozilla.global.ssl.fastly.net";

const DEFAULT_CHALLENGE_PATH: &str = "verify/challenge";
const DEFAULT_ATTEST_PATH: &str = "verify/attest";
const DEFAULT_COMPLETIONS_PATH: &str = "v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the trust server lives and how this app identifies itself to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, uniffi::Record)]
pub struct ServerConfig {
    /// Base URL every endpoint path is resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the challenge endpoint.
    #[serde(default = "default_challenge_path")]
    pub challenge_path: String,
    /// Path of the attestation endpoint.
    #[serde(default = "default_attest_path")]
    pub attest_path: String,
    /// Path of the per-request (assertion) endpoint.
    #[serde(default = "default_completions_path")]
    pub completions_path: String,
    /// Bundle identifier of the app, sent in every envelope.
    pub bundle_id: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_challenge_path() -> String {
    DEFAULT_CHALLENGE_PATH.to_string()
}

fn default_attest_path() -> String {
    DEFAULT_ATTEST_PATH.to_string()
}

fn default_completions_path() -> String {
    DEFAULT_COMPLETIONS_PATH.to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Fully resolved endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Challenge endpoint.
    pub challenge: Url,
    /// Attestation endpoint.
    pub attest: Url,
    /// Per-request endpoint.
    pub completions: Url,
}

impl ServerConfig {
    /// Creates a configuration for the production server.
    #[must_use]
    pub fn new(bundle_id: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            challenge_path: default_challenge_path(),
            attest_path: default_attest_path(),
            completions_path: default_completions_path(),
            bundle_id: bundle_id.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Replaces the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parses a configuration from JSON. Only `bundle_id` is required.
    ///
    /// # Errors
    /// Returns [`AppAttestError::SerializationError`] if the JSON is malformed.
    pub fn from_json(json: &str) -> AppAttestResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolves every endpoint against the base URL.
    ///
    /// The base URL must use `https`; plain `http` is only accepted for loopback
    /// hosts so local test servers can be used.
    ///
    /// # Errors
    /// Returns [`AppAttestError::InvalidEndpointConfiguration`] naming the first
    /// endpoint that cannot be resolved.
    pub fn endpoints(&self) -> AppAttestResult<Endpoints> {
        let base = self.base()?;
        Ok(Endpoints {
            challenge: join(&base, "challenge", &self.challenge_path)?,
            attest: join(&base, "attest", &self.attest_path)?,
            completions: join(&base, "completions", &self.completions_path)?,
        })
    }

    fn base(&self) -> AppAttestResult<Url> {
        let invalid = |reason: String| AppAttestError::InvalidEndpointConfiguration {
            endpoint: "base_url".to_string(),
            reason,
        };

        let mut base_url = self.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base = Url::parse(&base_url).map_err(|e| invalid(e.to_string()))?;

        match base.scheme() {
            "https" => Ok(base),
            "http" if is_loopback(&base) => Ok(base),
            scheme => Err(invalid(format!("scheme `{scheme}` is not allowed"))),
        }
    }
}

fn join(base: &Url, endpoint: &str, path: &str) -> AppAttestResult<Url> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| AppAttestError::InvalidEndpointConfiguration {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Returns the production configuration for `bundle_id`.
#[uniffi::export]
#[must_use]
pub fn default_server_config(bundle_id: String) -> ServerConfig {
    ServerConfig::new(bundle_id)
}

/// Parses a server configuration from JSON.
///
/// # Errors
/// Returns an error if the JSON is malformed or lacks `bundle_id`.
#[uniffi::export]
pub fn server_config_from_json(json: &str) -> AppAttestResult<ServerConfig> {
    ServerConfig::from_json(json)
}
