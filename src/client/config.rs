//! Client configuration.
//!
//! # Examples
//!
//! ```
//! use constellation_http::client::ClientConfig;
//!
//! let config = ClientConfig {
//!     host: "192.168.0.10".into(),
//!     port: 8088,
//!     request_timeout_ms: 2000,
//!     ..Default::default()
//! }
//! .with_identity("ESP8266", "Sensor", "my-access-key")
//! .with_credentials("user", "pass");
//!
//! assert_eq!(config.base_path(), "/rest/constellation/");
//! ```

use crate::client::utils::{encode_basic_credentials, normalize_base_path};
use crate::error::{ConstellationError, Result};
use crate::protocol::constants::{
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SUBSCRIPTION_LIMIT, DEFAULT_SUBSCRIPTION_TIMEOUT_MS,
    DEFAULT_USER_AGENT,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Configuration of a [`ConstellationClient`](crate::client::ConstellationClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Hub host name or address
    pub host: String,
    /// Hub port
    pub port: u16,
    /// Path under which the hub is mounted (`rest/constellation/` is appended)
    pub path: String,
    /// Sentinel this device runs as
    pub sentinel_name: String,
    /// Package this device runs as
    pub package_name: String,
    /// Access key of the identity
    pub access_key: String,
    /// Base64 Basic credentials, sent as `Authorization: Basic ...`
    pub authorization: Option<String>,
    /// `User-Agent` header value
    pub user_agent: String,
    /// Wait for the first response byte, in milliseconds
    pub request_timeout_ms: u64,
    /// Long-poll timeout asked of the hub, in milliseconds
    pub subscription_timeout_ms: u64,
    /// Items per long-poll response
    pub subscription_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8088,
            path: "/".to_string(),
            sentinel_name: String::new(),
            package_name: String::new(),
            access_key: String::new(),
            authorization: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            subscription_timeout_ms: DEFAULT_SUBSCRIPTION_TIMEOUT_MS,
            subscription_limit: DEFAULT_SUBSCRIPTION_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Configuration for a hub reachable at `url` (`http://host:port/path`).
    ///
    /// # Errors
    ///
    /// Returns [`ConstellationError::Protocol`] if the URL does not parse or
    /// has no host.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| ConstellationError::Protocol(format!("Invalid hub URL {}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ConstellationError::Protocol(format!("Hub URL has no host: {}", url)))?;

        Ok(ClientConfig {
            host: host.to_string(),
            port: parsed.port_or_known_default().unwrap_or(80),
            path: parsed.path().to_string(),
            ..Default::default()
        })
    }

    /// Set the sentinel, package and access key.
    pub fn with_identity(
        mut self,
        sentinel_name: impl Into<String>,
        package_name: impl Into<String>,
        access_key: impl Into<String>,
    ) -> Self {
        self.sentinel_name = sentinel_name.into();
        self.package_name = package_name.into();
        self.access_key = access_key.into();
        self
    }

    /// Basic authentication from a user and password.
    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.authorization = Some(encode_basic_credentials(user, password));
        self
    }

    /// Basic authentication from already encoded credentials.
    pub fn with_authorization(mut self, credentials: impl Into<String>) -> Self {
        self.authorization = Some(credentials.into());
        self
    }

    /// Override the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the wait for the first response byte.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Endpoint base path, e.g. `/rest/constellation/`.
    pub fn base_path(&self) -> String {
        normalize_base_path(&self.path)
    }

    /// Wait for the first response byte.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.user_agent, "ArduinoLib/2.4");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.subscription_timeout_ms, 60_000);
        assert_eq!(config.subscription_limit, 1);
    }

    #[test]
    fn test_from_url() {
        let config = ClientConfig::from_url("http://hub.local:8088/constellation").unwrap();
        assert_eq!(config.host, "hub.local");
        assert_eq!(config.port, 8088);
        assert_eq!(config.base_path(), "/constellation/rest/constellation/");

        let config = ClientConfig::from_url("http://hub.local").unwrap();
        assert_eq!(config.port, 80);
        assert_eq!(config.base_path(), "/rest/constellation/");
    }

    #[test]
    fn test_from_url_invalid() {
        assert!(ClientConfig::from_url("not a url").is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"host":"10.0.0.2","sentinel_name":"ESP"}"#).unwrap();
        assert_eq!(config.host, "10.0.0.2");
        assert_eq!(config.sentinel_name, "ESP");
        assert_eq!(config.port, 8088);
    }
}
