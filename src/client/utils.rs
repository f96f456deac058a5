//! Utility functions for the Constellation client.
//!
//! This module provides helper functions for:
//! - Base path normalization and Basic credentials
//! - Status code classification
//! - Subscription id extraction from subscribe replies
//! - StateObject type inference and raw-JSON embedding

use crate::error::{ConstellationError, Result};
use crate::protocol::constants::{REST_PATH, SUBSCRIPTION_ID_LEN};
use base64::Engine;
use http::StatusCode;
use serde_json::Value;

/// Normalize a configured path into the endpoint base path.
///
/// Ensures a leading and trailing `/`, then appends `rest/constellation/`.
///
/// # Examples
///
/// ```
/// use constellation_http::client::normalize_base_path;
///
/// assert_eq!(normalize_base_path("/"), "/rest/constellation/");
/// assert_eq!(normalize_base_path("hub"), "/hub/rest/constellation/");
/// ```
pub fn normalize_base_path(path: &str) -> String {
    let mut base = String::with_capacity(path.len() + REST_PATH.len() + 2);
    if !path.starts_with('/') {
        base.push('/');
    }
    base.push_str(path);
    if !base.ends_with('/') {
        base.push('/');
    }
    base.push_str(REST_PATH);
    base
}

/// Base64 `user:password` for an `Authorization: Basic` header.
pub fn encode_basic_credentials(user: &str, password: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password))
}

/// Check if status code is `200 OK`
pub fn is_ok_status(status: u16) -> bool {
    status == StatusCode::OK.as_u16()
}

/// Check if status code is `204 No Content`
pub fn is_no_content_status(status: u16) -> bool {
    status == StatusCode::NO_CONTENT.as_u16()
}

/// Check if status code asks for a subscription renewal (`500`)
pub fn is_renewal_status(status: u16) -> bool {
    status == StatusCode::INTERNAL_SERVER_ERROR.as_u16()
}

/// Check if status code is reported as an application-level failure
pub fn is_error_status(status: u16) -> bool {
    status >= 300
}

/// Extract the subscription id from a subscribe reply.
///
/// The body must be a JSON string literal of exactly the id length; a literal
/// `null` means the hub refused the credentials.
///
/// # Errors
///
/// [`ConstellationError::Credential`] for `null`,
/// [`ConstellationError::InvalidSubscriptionId`] for anything else unexpected.
pub fn parse_subscription_id(body: &str) -> Result<String> {
    let body = body.trim();
    if body == "null" {
        return Err(ConstellationError::Credential);
    }
    if body.len() != SUBSCRIPTION_ID_LEN + 2 {
        return Err(ConstellationError::InvalidSubscriptionId(body.to_string()));
    }
    body.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| ConstellationError::InvalidSubscriptionId(body.to_string()))
}

/// Turn a string that looks like JSON (`{...}` or `[...]`) into that JSON.
///
/// Anything else, including strings that fail to parse, is returned unchanged.
pub fn embed_raw_json(value: Value) -> Value {
    match value {
        Value::String(s) if s.starts_with('{') || s.starts_with('[') => {
            serde_json::from_str(&s).unwrap_or(Value::String(s))
        }
        other => other,
    }
}

/// Hub type name for a pushed StateObject value.
///
/// Returns `None` for objects and arrays, which the hub types itself.
pub fn infer_type_name(value: &Value) -> Option<&'static str> {
    match value {
        Value::Bool(_) => Some("System.Boolean"),
        Value::Number(n) if n.is_f64() => Some("System.Double"),
        Value::Number(n) => match n.as_i64() {
            Some(v) if i32::try_from(v).is_ok() => Some("System.Int32"),
            _ => Some("System.Int64"),
        },
        Value::String(_) => Some("System.String"),
        _ => None,
    }
}
