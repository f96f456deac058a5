//! JSON bodies of the POST endpoints (`PushStateObject`, saga responses) and
//! the `data` argument of `SendMessage`.

use crate::client::utils::{embed_raw_json, infer_type_name};
use crate::protocol::constants::RESPONSE_MESSAGE_KEY;
use crate::types::{MessageContext, ScopeType};
use serde_json::{Map, Value};

/// A StateObject to publish with `PushStateObject`.
///
/// # Examples
///
/// ```
/// use constellation_http::client::StateObjectPush;
/// use serde_json::json;
///
/// let push = StateObjectPush::new("Temperature", 21.5).with_lifetime(60);
/// assert_eq!(
///     push.to_body(),
///     json!({ "Name": "Temperature", "Value": 21.5, "Type": "System.Double", "Lifetime": 60 })
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StateObjectPush {
    /// StateObject name
    pub name: String,
    /// StateObject value
    pub value: Value,
    /// Explicit type name; inferred from the value when `None`
    pub type_name: Option<String>,
    /// Lifetime in seconds, `0` for no expiry
    pub lifetime: u32,
    /// Free-form metadata
    pub metadata: Option<Map<String, Value>>,
}

impl StateObjectPush {
    /// Push `value` under `name`, type inferred, no lifetime, no metadata.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        StateObjectPush {
            name: name.into(),
            value: value.into(),
            type_name: None,
            lifetime: 0,
            metadata: None,
        }
    }

    /// Set the type name explicitly.
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Expire the StateObject after `seconds`.
    pub fn with_lifetime(mut self, seconds: u32) -> Self {
        self.lifetime = seconds;
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// JSON body of the `PushStateObject` request.
    ///
    /// A string value that looks like JSON is embedded as JSON and gets no
    /// inferred type.
    pub fn to_body(&self) -> Value {
        let raw = matches!(
            &self.value,
            Value::String(s) if s.starts_with('{') || s.starts_with('[')
        );
        let value = embed_raw_json(self.value.clone());
        let type_name = match &self.type_name {
            Some(explicit) => Some(explicit.as_str()),
            None if raw && !value.is_string() => None,
            None => infer_type_name(&value),
        };

        let mut body = Map::new();
        body.insert("Name".into(), Value::from(self.name.as_str()));
        body.insert("Value".into(), value);
        if let Some(type_name) = type_name {
            body.insert("Type".into(), Value::from(type_name));
        }
        if self.lifetime > 0 {
            body.insert("Lifetime".into(), Value::from(self.lifetime));
        }
        if let Some(metadata) = &self.metadata {
            body.insert("Metadatas".into(), Value::Object(metadata.clone()));
        }
        Value::Object(body)
    }
}

/// JSON body answering the saga of `ctx`, addressed back to its sender.
pub fn response_body(ctx: &MessageContext, data: Value) -> Value {
    let mut scope = Map::new();
    scope.insert("SagaId".into(), Value::from(ctx.saga_id.clone()));
    scope.insert("Scope".into(), Value::from(u8::from(ScopeType::Package)));
    scope.insert("Args".into(), Value::from(vec![ctx.reply_address()]));

    let mut message = Map::new();
    message.insert("Key".into(), Value::from(RESPONSE_MESSAGE_KEY));
    message.insert("Data".into(), embed_raw_json(data));
    message.insert("Scope".into(), Value::Object(scope));
    Value::Object(message)
}

/// Text of the `data` query argument of `SendMessage`.
///
/// Strings are sent verbatim (they already hold the caller's JSON text);
/// anything else is serialized.
pub fn message_data(data: &Value) -> String {
    match data {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageSender, SenderType};
    use serde_json::json;

    fn context(sender_type: SenderType) -> MessageContext {
        MessageContext {
            message_key: "Ask".into(),
            is_saga: true,
            saga_id: Some("saga-1".into()),
            sender: MessageSender {
                sender_type,
                friendly_name: "Console".into(),
                connection_id: "conn-42".into(),
            },
            scope: ScopeType::Package,
        }
    }

    #[test]
    fn test_push_type_inference() {
        assert_eq!(StateObjectPush::new("a", true).to_body()["Type"], "System.Boolean");
        assert_eq!(StateObjectPush::new("a", 7).to_body()["Type"], "System.Int32");
        assert_eq!(StateObjectPush::new("a", 1i64 << 40).to_body()["Type"], "System.Int64");
        assert_eq!(StateObjectPush::new("a", "on").to_body()["Type"], "System.String");
    }

    #[test]
    fn test_push_raw_json_value() {
        let body = StateObjectPush::new("Pos", "{\"X\":1,\"Y\":2}").to_body();
        assert_eq!(body, json!({ "Name": "Pos", "Value": { "X": 1, "Y": 2 } }));
    }

    #[test]
    fn test_push_explicit_type_and_metadata() {
        let mut metadata = Map::new();
        metadata.insert("Unit".into(), json!("C"));
        let body = StateObjectPush::new("T", 20)
            .with_type("MyType")
            .with_metadata(metadata)
            .to_body();
        assert_eq!(
            body,
            json!({ "Name": "T", "Value": 20, "Type": "MyType", "Metadatas": { "Unit": "C" } })
        );
    }

    #[test]
    fn test_response_body_addresses_sender() {
        let body = response_body(&context(SenderType::ConsumerHub), json!("[1,2]"));
        assert_eq!(
            body,
            json!({
                "Key": "__Response",
                "Data": [1, 2],
                "Scope": { "SagaId": "saga-1", "Scope": 2, "Args": ["conn-42"] }
            })
        );

        let body = response_body(&context(SenderType::ConstellationHttp), json!(42));
        assert_eq!(body["Scope"]["Args"], json!(["Console"]));
    }

    #[test]
    fn test_response_body_without_saga_id() {
        let mut ctx = context(SenderType::ConsumerHub);
        ctx.saga_id = None;
        let body = response_body(&ctx, json!(null));
        assert_eq!(body["Scope"]["SagaId"], Value::Null);
        assert_eq!(body["Scope"]["Scope"], json!(2));
    }

    #[test]
    fn test_message_data() {
        assert_eq!(message_data(&json!("{\"a\":1}")), "{\"a\":1}");
        assert_eq!(message_data(&json!({"a": 1})), "{\"a\":1}");
        assert_eq!(message_data(&json!(3)), "3");
    }
}
