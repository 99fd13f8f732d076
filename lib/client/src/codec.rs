//! Conversion between flat parameter strings and the orchestrator's tagged
//! JSON value format.
//!
//! The server wraps every value under a key naming its type:
//!
//! ```json
//! {"name": "vmName", "type": "string", "value": {"string": {"value": "web-01"}}}
//! {"name": "host", "type": "VC:HostSystem", "value": {"sdk-object": {"id": "host-9", "type": "VC:HostSystem"}}}
//! ```
//!
//! Outside this module parameters and outputs are plain strings.

use crate::error::{ClientError, RequiredField};
use crate::model::ExecutionResult;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::fmt;

const PARAMETERS: &str = "parameters";
const STATE: &str = "state";
const OUTPUT_PARAMETERS: &str = "output-parameters";
const CONTENT_EXCEPTION: &str = "content-exception";
const SDK_OBJECT: &str = "sdk-object";

/// The type of a workflow input parameter.
///
/// The primitive types are a closed set; anything else names a remote
/// object type and is sent by reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterType {
    String,
    /// Sent on the wire as a plain string.
    EncryptedString,
    /// Sent on the wire as a plain string.
    SecureString,
    Number,
    Date,
    Boolean,
    /// A server object type such as `VC:VirtualMachine`.
    Reference(String),
}

impl ParameterType {
    /// Classifies a server type tag. Primitive tags match case-insensitively.
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        let primitives = [
            ("string", Self::String),
            ("EncryptedString", Self::EncryptedString),
            ("SecureString", Self::SecureString),
            ("number", Self::Number),
            ("date", Self::Date),
            ("boolean", Self::Boolean),
        ];
        primitives
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tag))
            .map_or_else(|| Self::Reference(tag.to_string()), |(_, ty)| ty)
    }

    /// Returns the type tag as the server spells it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::EncryptedString => "EncryptedString",
            Self::SecureString => "SecureString",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Reference(tag) => tag,
        }
    }

    /// Returns true for every variant except `Reference`.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Reference(_))
    }

    /// Wraps a raw value in the tagged representation for this type.
    #[must_use]
    pub fn wrap(&self, value: &str) -> JsonValue {
        let key = match self {
            Self::String | Self::EncryptedString | Self::SecureString => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Reference(tag) => {
                return json!({ SDK_OBJECT: { "id": value, "type": tag } });
            }
        };
        json!({ key: { "value": value } })
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A workflow input parameter supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputParameter {
    name: String,
    parameter_type: ParameterType,
    /// The tag as the caller spelled it, sent back unchanged as `type`.
    type_tag: String,
    value: String,
}

impl InputParameter {
    /// Creates a parameter with an explicit type.
    #[must_use]
    pub fn new(name: impl Into<String>, parameter_type: ParameterType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: parameter_type.as_str().to_string(),
            parameter_type,
            value: value.into(),
        }
    }

    fn tagged(name: impl Into<String>, tag: &str, value: impl Into<String>) -> Self {
        let tag = tag.trim();
        Self {
            name: name.into(),
            parameter_type: ParameterType::parse(tag),
            type_tag: tag.to_string(),
            value: value.into(),
        }
    }

    /// Creates a parameter from the `name@type` selection form, splitting on
    /// the first `@`. Returns `None` if the key has no `@`.
    #[must_use]
    pub fn from_selection(selection_key: &str, value: impl Into<String>) -> Option<Self> {
        let (name, tag) = selection_key.split_once('@')?;
        Some(Self::tagged(name, tag, value))
    }

    /// Builds a parameter from loosely structured host input.
    ///
    /// A name of the form `name@type` carries its own type. Otherwise the
    /// separate `type_tag` is used.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no type can be determined.
    pub fn resolve(
        name: &str,
        type_tag: Option<&str>,
        value: impl Into<String>,
    ) -> Result<Self, Report<ClientError>> {
        if let Some(parameter) = Self::from_selection(name, String::new()) {
            return Ok(Self {
                value: value.into(),
                ..parameter
            });
        }
        match type_tag.map(str::trim).filter(|tag| !tag.is_empty()) {
            Some(tag) => Ok(Self::tagged(name, tag, value)),
            None => Err(ClientError::Validation {
                field: RequiredField::ParameterType,
                reason: format!("missing for '{name}'"),
            }
            .into()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parameter_type(&self) -> &ParameterType {
        &self.parameter_type
    }

    /// Returns the type tag exactly as given.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Serialize)]
struct WireParameter<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    type_tag: &'a str,
    value: JsonValue,
}

/// Encodes input parameters into an execution request body.
///
/// An empty list encodes to `{}` so the server always receives a body.
#[must_use]
pub fn encode_inputs(inputs: &[InputParameter]) -> JsonValue {
    if inputs.is_empty() {
        return JsonValue::Object(Map::new());
    }
    let parameters: Vec<WireParameter<'_>> = inputs
        .iter()
        .map(|input| WireParameter {
            name: &input.name,
            type_tag: &input.type_tag,
            value: input.parameter_type.wrap(&input.value),
        })
        .collect();
    json!({ PARAMETERS: parameters })
}

/// Decodes an execution detail document into a normalized result.
///
/// `state` is optional, `output-parameters` is passed through re-serialized
/// and `content-exception` is kept only for canceled or failed runs.
///
/// # Errors
///
/// Returns `ClientError::Protocol` if the document is not an object or a
/// field has an unexpected JSON type.
pub fn decode_execution_outcome(
    endpoint: &str,
    document: &JsonValue,
) -> Result<ExecutionResult, Report<ClientError>> {
    let object = document
        .as_object()
        .ok_or_else(|| ClientError::protocol(endpoint, "execution detail is not a JSON object"))?;

    let state = optional_string(endpoint, object, STATE)?;
    let output_parameters = object
        .get(OUTPUT_PARAMETERS)
        .filter(|value| !value.is_null())
        .map(JsonValue::to_string);
    let exception = optional_string(endpoint, object, CONTENT_EXCEPTION)?;

    Ok(ExecutionResult::finished(state, output_parameters, exception))
}

/// Reads the `state` field of an execution detail document.
pub(crate) fn decode_state(
    endpoint: &str,
    document: &JsonValue,
) -> Result<Option<String>, Report<ClientError>> {
    let object = document
        .as_object()
        .ok_or_else(|| ClientError::protocol(endpoint, "execution detail is not a JSON object"))?;
    optional_string(endpoint, object, STATE)
}

fn optional_string(
    endpoint: &str,
    object: &Map<String, JsonValue>,
    key: &str,
) -> Result<Option<String>, Report<ClientError>> {
    match object.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(ClientError::protocol(
            endpoint,
            format!("field '{key}' should be a string, got {other}"),
        )
        .into()),
    }
}

/// A parameter declared by a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: String,
}

impl ParameterDescriptor {
    /// Returns the `name@type` key used to select this parameter.
    #[must_use]
    pub fn selection_key(&self) -> String {
        format!("{}@{}", self.name, self.type_tag)
    }

    /// Creates an input parameter for this declaration with the given value.
    #[must_use]
    pub fn with_value(&self, value: impl Into<String>) -> InputParameter {
        InputParameter::tagged(&self.name, &self.type_tag, value)
    }
}
