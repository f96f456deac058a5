//! HTTP/1.1 request construction.
//!
//! Requests are plain strings written straight onto the transport. Every request
//! carries the `Host` header, the three identity headers (`SentinelName`,
//! `PackageName`, `AccessKey`), `User-Agent`, `Accept-Encoding: identity`,
//! `Connection` and, when configured, `Authorization: Basic ...`.
//!
//! # Examples
//!
//! ```
//! use constellation_http::protocol::RequestBuilder;
//!
//! let builder = RequestBuilder::new("hub.local", "/rest/constellation/", "ESP", "Sensor", "key");
//! let uri = builder.uri("WriteLog", &[("message", "hello world"), ("level", "Info")]);
//! assert_eq!(uri, "/rest/constellation/WriteLog?message=hello%20world&level=Info");
//! ```

use crate::protocol::constants::{headers, DEFAULT_USER_AGENT};
use http::Method;
use std::fmt::Write;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Percent-encode a query value.
///
/// Unreserved characters (`A-Z a-z 0-9 - . _ ~`) and the wildcard `*` pass
/// through; every other byte becomes `%xx` with lowercase hex digits.
///
/// # Examples
///
/// ```
/// use constellation_http::protocol::percent_encode;
///
/// assert_eq!(percent_encode("a b/c"), "a%20b%2fc");
/// assert_eq!(percent_encode("*"), "*");
/// ```
pub fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'*') {
            encoded.push(byte as char);
        } else {
            encoded.push('%');
            encoded.push(HEX[(byte >> 4) as usize] as char);
            encoded.push(HEX[(byte & 0x0f) as usize] as char);
        }
    }
    encoded
}

/// Builds GET and POST requests for one hub identity.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    host: String,
    base_path: String,
    sentinel_name: String,
    package_name: String,
    access_key: String,
    user_agent: String,
    authorization: Option<String>,
}

impl RequestBuilder {
    /// Create a builder for `host`, with `base_path` already normalized
    /// (leading and trailing `/`).
    pub fn new(
        host: impl Into<String>,
        base_path: impl Into<String>,
        sentinel_name: impl Into<String>,
        package_name: impl Into<String>,
        access_key: impl Into<String>,
    ) -> Self {
        RequestBuilder {
            host: host.into(),
            base_path: base_path.into(),
            sentinel_name: sentinel_name.into(),
            package_name: package_name.into(),
            access_key: access_key.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            authorization: None,
        }
    }

    /// Override the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Send `Authorization: Basic <credentials>` (already base64-encoded).
    pub fn with_authorization(mut self, credentials: Option<String>) -> Self {
        self.authorization = credentials;
        self
    }

    /// Base path followed by `method` and the percent-encoded query arguments.
    pub fn uri(&self, method: &str, args: &[(&str, &str)]) -> String {
        let mut uri = format!("{}{}", self.base_path, method);
        for (i, (key, value)) in args.iter().enumerate() {
            uri.push(if i == 0 { '?' } else { '&' });
            uri.push_str(key);
            uri.push('=');
            uri.push_str(&percent_encode(value));
        }
        uri
    }

    /// Full GET request, arguments in the query string.
    pub fn get(&self, method: &str, args: &[(&str, &str)], keep_alive: bool) -> String {
        let mut request = self.head(Method::GET, &self.uri(method, args));
        let _ = write!(
            request,
            "Connection: {}\r\n",
            if keep_alive { "keep-alive" } else { "close" }
        );
        self.finish(request)
    }

    /// Full POST request carrying `body` as JSON.
    pub fn post(&self, method: &str, body: &str) -> String {
        let mut request = self.head(Method::POST, &self.uri(method, &[]));
        let _ = write!(
            request,
            "Content-Length: {}\r\nContent-Type: application/json\r\nConnection: keep-alive\r\n",
            body.len()
        );
        let mut request = self.finish(request);
        request.push_str(body);
        request
    }

    fn head(&self, method: Method, uri: &str) -> String {
        let mut request = String::with_capacity(256);
        let _ = write!(
            request,
            "{} {} HTTP/1.1\r\nHost: {}\r\n{}: {}\r\n{}: {}\r\n{}: {}\r\nUser-Agent: {}\r\nAccept-Encoding: identity\r\n",
            method,
            uri,
            self.host,
            headers::SENTINEL_NAME,
            self.sentinel_name,
            headers::PACKAGE_NAME,
            self.package_name,
            headers::ACCESS_KEY,
            self.access_key,
            self.user_agent,
        );
        request
    }

    fn finish(&self, mut request: String) -> String {
        if let Some(credentials) = &self.authorization {
            let _ = write!(request, "Authorization: Basic {}\r\n", credentials);
        }
        request.push_str("\r\n");
        request
    }
}
