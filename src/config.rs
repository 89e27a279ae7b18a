//! Gateway configuration.

use crate::application::orchestrator::HandlerToggles;
use crate::application::poller::DEFAULT_STATUS_CHECK_RESOURCE;
use crate::domain::signature::SessionSigner;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const ENV_PREFIX: &str = "CHALLENGE_GATEWAY_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub authentication_server_url: String,
    pub instrument_store_url: String,
    pub order_attachment_url: String,
    /// Per-call bound on every upstream request.
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            authentication_server_url: "http://localhost:9001".to_string(),
            instrument_store_url: "http://localhost:9002".to_string(),
            order_attachment_url: "http://localhost:9003".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub prefer_v2: bool,
    pub legacy_enabled: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        let toggles = HandlerToggles::default();
        Self {
            prefer_v2: toggles.prefer_v2,
            legacy_enabled: toggles.legacy_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub csp_proxy_enabled: bool,
    pub post_message_target_origin: String,
    pub failure_return_url: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            csp_proxy_enabled: false,
            post_message_target_origin: "*".to_string(),
            failure_return_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub status_check_resource: String,
    /// Instrument sub-type to status-check resource id.
    pub status_check_overrides: HashMap<String, String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            status_check_resource: DEFAULT_STATUS_CHECK_RESOURCE.to_string(),
            status_check_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    /// Origin the browser sees; callback and proxy URLs are built from it.
    pub public_base_url: String,
    /// Hex HMAC key for session and proxy-target signatures.
    pub signing_key: String,
    pub session_db_path: Option<PathBuf>,
    pub upstream: UpstreamConfig,
    pub handlers: HandlerConfig,
    pub browser: BrowserConfig,
    pub poller: PollerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            public_base_url: "http://localhost:8080".to_string(),
            signing_key: String::new(),
            session_db_path: None,
            upstream: UpstreamConfig::default(),
            handlers: HandlerConfig::default(),
            browser: BrowserConfig::default(),
            poller: PollerConfig::default(),
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{name} must be true or false, got {value:?}")))
}

fn check_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid(format!("Invalid {name}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "{name} must be an http(s) URL, got {value}"
        )));
    }
    Ok(())
}

impl GatewayConfig {
    /// Defaults, then the TOML file (if any), then `CHALLENGE_GATEWAY_*`
    /// environment overrides. The result is not validated yet.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(addr) = var("LISTEN_ADDR") {
            self.listen_addr = addr
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid listen_addr: {e}")))?;
        }
        if let Some(url) = var("PUBLIC_BASE_URL") {
            self.public_base_url = url;
        }
        if let Some(key) = var("SIGNING_KEY") {
            self.signing_key = key;
        }
        if let Some(path) = var("SESSION_DB_PATH") {
            self.session_db_path = Some(PathBuf::from(path));
        }
        if let Some(url) = var("AUTHENTICATION_SERVER_URL") {
            self.upstream.authentication_server_url = url;
        }
        if let Some(url) = var("INSTRUMENT_STORE_URL") {
            self.upstream.instrument_store_url = url;
        }
        if let Some(url) = var("ORDER_ATTACHMENT_URL") {
            self.upstream.order_attachment_url = url;
        }
        if let Some(ms) = var("UPSTREAM_TIMEOUT_MS") {
            self.upstream.timeout_ms = ms
                .trim()
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid upstream timeout: {e}")))?;
        }
        if let Some(value) = var("PREFER_V2") {
            self.handlers.prefer_v2 = parse_bool("prefer_v2", &value)?;
        }
        if let Some(value) = var("LEGACY_ENABLED") {
            self.handlers.legacy_enabled = parse_bool("legacy_enabled", &value)?;
        }
        if let Some(value) = var("CSP_PROXY_ENABLED") {
            self.browser.csp_proxy_enabled = parse_bool("csp_proxy_enabled", &value)?;
        }
        if let Some(url) = var("FAILURE_RETURN_URL") {
            self.browser.failure_return_url = Some(url);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_key.trim().is_empty() {
            return Err(ConfigError::Invalid("signing_key is required".to_string()));
        }
        SessionSigner::from_hex(&self.signing_key)?;

        check_http_url("public_base_url", &self.public_base_url)?;
        check_http_url("authentication_server_url", &self.upstream.authentication_server_url)?;
        check_http_url("instrument_store_url", &self.upstream.instrument_store_url)?;
        check_http_url("order_attachment_url", &self.upstream.order_attachment_url)?;
        if let Some(url) = &self.browser.failure_return_url {
            check_http_url("failure_return_url", url)?;
        }

        if self.upstream.timeout_ms == 0 {
            return Err(ConfigError::Invalid("upstream.timeout_ms must be > 0".to_string()));
        }
        if self.poller.status_check_resource.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "poller.status_check_resource must not be empty".to_string(),
            ));
        }
        if self.browser.post_message_target_origin.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "browser.post_message_target_origin must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn signer(&self) -> Result<SessionSigner, ConfigError> {
        SessionSigner::from_hex(&self.signing_key)
    }

    pub fn toggles(&self) -> HandlerToggles {
        HandlerToggles {
            prefer_v2: self.handlers.prefer_v2,
            legacy_enabled: self.handlers.legacy_enabled,
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream.timeout_ms)
    }
}
