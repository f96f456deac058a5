//! Core data model for the Constellation long-poll protocol.
//!
//! These types describe what travels between a device and its hub:
//!
//! - [`MessageContext`]: who sent an incoming message, under which scope and saga
//! - [`StateObjectFilter`]: the `sentinel/package/name/type` selector used both to
//!   subscribe to StateObjects and to route them to handlers
//! - [`ScopeType`], [`SenderType`], [`LogLevel`]: the hub's numeric enums
//!
//! Incoming JSON items are decoded with serde into private envelope structs and
//! converted into these types; the raw [`serde_json::Value`] is what handlers get.

use crate::protocol::constants::WILDCARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The two long-poll channels a client can hold a subscription on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionKind {
    /// Message channel (`GetMessages`)
    Message,
    /// StateObject channel (`GetStateObjects`)
    StateObject,
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionKind::Message => write!(f, "message"),
            SubscriptionKind::StateObject => write!(f, "StateObject"),
        }
    }
}

/// Addressing scope of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ScopeType {
    /// No scope
    #[default]
    None = 0,
    /// A message group
    Group = 1,
    /// A package, on any sentinel
    Package = 2,
    /// Every package of a sentinel
    Sentinel = 3,
    /// Every consumer except the sender
    Other = 4,
    /// Everybody
    All = 5,
}

impl ScopeType {
    /// Label the hub expects in the `scope` query argument.
    pub fn label(self) -> &'static str {
        match self {
            ScopeType::None => "None",
            ScopeType::Group => "Group",
            ScopeType::Package => "Package",
            ScopeType::Sentinel => "Sentinel",
            ScopeType::Other => "Others",
            ScopeType::All => "All",
        }
    }
}

impl From<u8> for ScopeType {
    fn from(value: u8) -> Self {
        match value {
            1 => ScopeType::Group,
            2 => ScopeType::Package,
            3 => ScopeType::Sentinel,
            4 => ScopeType::Other,
            5 => ScopeType::All,
            _ => ScopeType::None,
        }
    }
}

impl From<ScopeType> for u8 {
    fn from(scope: ScopeType) -> Self {
        scope as u8
    }
}

/// Kind of peer that sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum SenderType {
    /// Consumer connected through the hub's realtime endpoint
    #[default]
    ConsumerHub = 0,
    /// Consumer using the HTTP endpoint
    ConsumerHttp = 1,
    /// Package connected through the hub's realtime endpoint
    ConstellationHub = 2,
    /// Package using the HTTP endpoint
    ConstellationHttp = 3,
}

impl From<u8> for SenderType {
    fn from(value: u8) -> Self {
        match value {
            1 => SenderType::ConsumerHttp,
            2 => SenderType::ConstellationHub,
            3 => SenderType::ConstellationHttp,
            _ => SenderType::ConsumerHub,
        }
    }
}

impl From<SenderType> for u8 {
    fn from(sender: SenderType) -> Self {
        sender as u8
    }
}

/// Severity of a log line written to the hub with `WriteLog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// No level
    None,
    /// Informational
    #[default]
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

impl LogLevel {
    /// Label the hub expects in the `level` query argument.
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            _ => "Info",
        }
    }
}

/// Sender of an incoming message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSender {
    /// Peer kind
    pub sender_type: SenderType,
    /// Human readable name of the peer
    pub friendly_name: String,
    /// Hub connection id of the peer
    pub connection_id: String,
}

/// Context of one incoming message.
///
/// Rebuilt for every item of a `GetMessages` response and only lent to handlers
/// for the duration of the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContext {
    /// Message key
    pub message_key: String,
    /// `true` when the message carries a saga id
    pub is_saga: bool,
    /// Saga correlation id
    pub saga_id: Option<String>,
    /// Who sent the message
    pub sender: MessageSender,
    /// Scope the message was sent to
    pub scope: ScopeType,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct MessageEnvelope {
    key: Option<String>,
    scope: Option<ScopeEnvelope>,
    sender: Option<SenderEnvelope>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ScopeEnvelope {
    saga_id: Option<String>,
    scope: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct SenderEnvelope {
    #[serde(rename = "Type")]
    sender_type: Option<u8>,
    friendly_name: Option<String>,
    connection_id: Option<String>,
}

impl MessageContext {
    /// Decode the context of a raw `GetMessages` item.
    ///
    /// An empty saga id counts as no saga.
    pub fn from_item(item: &Value) -> serde_json::Result<Self> {
        let envelope = MessageEnvelope::deserialize(item)?;
        let scope = envelope.scope.unwrap_or_default();
        let sender = envelope.sender.unwrap_or_default();
        let saga_id = scope.saga_id.filter(|id| !id.is_empty());

        Ok(MessageContext {
            message_key: envelope.key.unwrap_or_default(),
            is_saga: saga_id.is_some(),
            saga_id,
            sender: MessageSender {
                sender_type: sender.sender_type.map(SenderType::from).unwrap_or_default(),
                friendly_name: sender.friendly_name.unwrap_or_default(),
                connection_id: sender.connection_id.unwrap_or_default(),
            },
            scope: scope.scope.map(ScopeType::from).unwrap_or_default(),
        })
    }

    /// Address a response to the sender: its connection id for hub consumers,
    /// its friendly name otherwise.
    pub fn reply_address(&self) -> &str {
        match self.sender.sender_type {
            SenderType::ConsumerHub => &self.sender.connection_id,
            _ => &self.sender.friendly_name,
        }
    }
}

/// Identity of a StateObject as carried in a `GetStateObjects` item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StateObjectKey {
    /// Sentinel that published the StateObject
    #[serde(rename = "SentinelName")]
    pub sentinel: String,
    /// Package that published the StateObject
    #[serde(rename = "PackageName")]
    pub package: String,
    /// StateObject name
    #[serde(rename = "Name")]
    pub name: String,
    /// Full type name, e.g. `System.Int32`
    #[serde(rename = "Type")]
    pub type_name: String,
}

impl StateObjectKey {
    /// Decode the key of a StateObject value (the inner `StateObject` object).
    pub fn from_state_object(state_object: &Value) -> serde_json::Result<Self> {
        StateObjectKey::deserialize(state_object)
    }
}

/// Selector over `sentinel/package/name/type`.
///
/// Each field is either a literal (matched exactly, case-sensitive) or the
/// wildcard `*`, which matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateObjectFilter {
    /// Sentinel name or `*`
    pub sentinel: String,
    /// Package name or `*`
    pub package: String,
    /// StateObject name or `*`
    pub name: String,
    /// Type name or `*`
    pub type_name: String,
}

impl StateObjectFilter {
    /// Filter on a sentinel and package, any name and any type.
    pub fn new(sentinel: impl Into<String>, package: impl Into<String>) -> Self {
        StateObjectFilter {
            sentinel: sentinel.into(),
            package: package.into(),
            name: WILDCARD.to_string(),
            type_name: WILDCARD.to_string(),
        }
    }

    /// Filter matching every StateObject.
    pub fn any() -> Self {
        StateObjectFilter::new(WILDCARD, WILDCARD)
    }

    /// Narrow the filter to one StateObject name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Narrow the filter to one type name.
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Whether every field is the wildcard or equals the key's field.
    pub fn matches(&self, key: &StateObjectKey) -> bool {
        field_matches(&self.sentinel, &key.sentinel)
            && field_matches(&self.package, &key.package)
            && field_matches(&self.name, &key.name)
            && field_matches(&self.type_name, &key.type_name)
    }

    /// Query arguments describing this filter, in wire order.
    pub fn query_args(&self) -> [(&'static str, &str); 4] {
        [
            ("sentinel", self.sentinel.as_str()),
            ("package", self.package.as_str()),
            ("name", self.name.as_str()),
            ("type", self.type_name.as_str()),
        ]
    }
}

impl fmt::Display for StateObjectFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.sentinel, self.package, self.name, self.type_name
        )
    }
}

fn field_matches(pattern: &str, value: &str) -> bool {
    pattern == WILDCARD || pattern == value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(sentinel: &str, package: &str, name: &str, type_name: &str) -> StateObjectKey {
        StateObjectKey {
            sentinel: sentinel.into(),
            package: package.into(),
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    #[test]
    fn test_wildcard_filter() {
        let filter = StateObjectFilter::new("*", "Pkg");
        assert!(filter.matches(&key("SentinelA", "Pkg", "X", "System.String")));
        assert!(filter.matches(&key("SentinelB", "Pkg", "Y", "System.Int32")));
        assert!(!filter.matches(&key("SentinelA", "Other", "X", "System.String")));
    }

    #[test]
    fn test_literal_match_is_case_sensitive() {
        let filter = StateObjectFilter::new("S", "Pkg").with_name("Temp");
        assert!(filter.matches(&key("S", "Pkg", "Temp", "System.Double")));
        assert!(!filter.matches(&key("S", "pkg", "Temp", "System.Double")));
        assert!(!filter.matches(&key("S", "Pkg", "temp", "System.Double")));
    }

    #[test]
    fn test_context_from_item() {
        let item = json!({
            "Key": "Ping",
            "Data": [1],
            "Scope": { "Scope": 2, "SagaId": "1234", "Args": ["Pkg"] },
            "Sender": { "Type": 1, "FriendlyName": "Console", "ConnectionId": "abc" }
        });
        let ctx = MessageContext::from_item(&item).unwrap();
        assert_eq!(ctx.message_key, "Ping");
        assert!(ctx.is_saga);
        assert_eq!(ctx.saga_id.as_deref(), Some("1234"));
        assert_eq!(ctx.scope, ScopeType::Package);
        assert_eq!(ctx.sender.sender_type, SenderType::ConsumerHttp);
        assert_eq!(ctx.reply_address(), "Console");
    }

    #[test]
    fn test_context_without_saga() {
        let item = json!({ "Key": "Ping", "Scope": { "Scope": 5, "SagaId": null } });
        let ctx = MessageContext::from_item(&item).unwrap();
        assert!(!ctx.is_saga);
        assert_eq!(ctx.saga_id, None);
        assert_eq!(ctx.scope, ScopeType::All);

        let item = json!({ "Key": "Ping", "Scope": { "SagaId": "" } });
        assert!(!MessageContext::from_item(&item).unwrap().is_saga);
    }

    #[test]
    fn test_scope_labels() {
        assert_eq!(ScopeType::Other.label(), "Others");
        assert_eq!(ScopeType::from(9), ScopeType::None);
        assert_eq!(LogLevel::None.label(), "Info");
    }

    #[test]
    fn test_state_object_key() {
        let so = json!({
            "SentinelName": "ESP8266", "PackageName": "Sensor",
            "Name": "Temperature", "Type": "System.Double", "Value": 21.5
        });
        let key = StateObjectKey::from_state_object(&so).unwrap();
        assert_eq!(key.name, "Temperature");
        assert_eq!(key.type_name, "System.Double");
    }
}
