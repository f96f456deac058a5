//! Package descriptor advertised to the hub with `DeclarePackageDescriptor`.
//!
//! The hub shows registered message callbacks (key, description, parameters)
//! to consumers. Only callbacks registered with a visible
//! [`MessageCallbackDescriptor`] are advertised; saga callbacks never are.

use serde::Serialize;
use serde_json::Value;

/// Member kind code for callback parameters.
const PARAMETER_MEMBER_TYPE: u8 = 2;

/// One parameter of a message callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterDescriptor {
    /// Parameter name
    pub name: String,
    /// Full type name, e.g. `System.Int32`
    pub type_name: String,
    #[serde(rename = "Type")]
    member_type: u8,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the parameter may be omitted
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_optional: bool,
    /// Value used when the parameter is omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// Description of a message callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageCallbackDescriptor {
    /// Free text description
    pub description: Option<String>,
    /// Hidden callbacks are not advertised
    pub hidden: bool,
    /// Declared parameters, in order
    pub parameters: Vec<ParameterDescriptor>,
}

impl MessageCallbackDescriptor {
    /// A visible descriptor without description or parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// A descriptor that keeps the callback out of the package descriptor.
    pub fn hidden() -> Self {
        MessageCallbackDescriptor {
            hidden: true,
            ..Default::default()
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a required parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.parameters.push(ParameterDescriptor {
            name: name.into(),
            type_name: type_name.into(),
            member_type: PARAMETER_MEMBER_TYPE,
            description: None,
            is_optional: false,
            default_value: None,
        });
        self
    }

    /// Declare an optional parameter with its default value.
    pub fn with_optional_parameter(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        default_value: Value,
    ) -> Self {
        self.parameters.push(ParameterDescriptor {
            name: name.into(),
            type_name: type_name.into(),
            member_type: PARAMETER_MEMBER_TYPE,
            description: None,
            is_optional: true,
            default_value: Some(default_value),
        });
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MessageCallbackEntry<'a> {
    message_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    parameters: &'a [ParameterDescriptor],
}

/// Body of a `DeclarePackageDescriptor` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageDescriptor<'a> {
    package_name: &'a str,
    message_callbacks: Vec<MessageCallbackEntry<'a>>,
    message_callback_types: Vec<Value>,
    state_object_types: Vec<Value>,
}

impl<'a> PackageDescriptor<'a> {
    /// Build the descriptor from `(message key, descriptor)` pairs; hidden
    /// descriptors are skipped.
    pub fn new<I>(package_name: &'a str, callbacks: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a MessageCallbackDescriptor)>,
    {
        let message_callbacks = callbacks
            .into_iter()
            .filter(|(key, descriptor)| {
                if descriptor.hidden {
                    tracing::debug!(
                        "Skipping the hidden MessageCallback '{}' in the PackageDescriptor",
                        key
                    );
                }
                !descriptor.hidden
            })
            .map(|(key, descriptor)| MessageCallbackEntry {
                message_key: key,
                description: descriptor.description.as_deref(),
                parameters: &descriptor.parameters,
            })
            .collect();

        PackageDescriptor {
            package_name,
            message_callbacks,
            message_callback_types: Vec::new(),
            state_object_types: Vec::new(),
        }
    }

    /// Number of advertised callbacks.
    pub fn len(&self) -> usize {
        self.message_callbacks.len()
    }

    /// Whether no callback is advertised.
    pub fn is_empty(&self) -> bool {
        self.message_callbacks.is_empty()
    }
}
