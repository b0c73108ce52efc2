//! Request envelope parsing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::RequestError;
use crate::name::CommandName;

/// One command sent by a client.
///
/// `parameters` may be a JSON object, a string holding a serialised object,
/// or absent. The field names `action` and `params` are accepted as aliases
/// of `type` and `parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Command type in `domain.action` form.
    #[serde(rename = "type", alias = "action")]
    pub command_type: String,
    /// Raw parameters document.
    #[serde(default, alias = "params", skip_serializing_if = "Value::is_null")]
    pub parameters: Value,
}

impl CommandRequest {
    /// Builds a request from a command type and parameters value.
    pub fn new(command_type: impl Into<String>, parameters: Value) -> Self {
        Self {
            command_type: command_type.into(),
            parameters,
        }
    }

    /// Parses one framed request document.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Malformed`] when the bytes are empty, not JSON,
    /// or missing the command type.
    pub fn parse(bytes: &[u8]) -> Result<Self, RequestError> {
        let trimmed = bytes.trim_ascii();
        if trimmed.is_empty() {
            return Err(RequestError::malformed("empty request document"));
        }
        serde_json::from_slice(trimmed).map_err(|error| RequestError::malformed(error.to_string()))
    }

    /// Builds a request from an already decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Malformed`] when the value is not a request
    /// envelope.
    pub fn from_value(value: Value) -> Result<Self, RequestError> {
        serde_json::from_value(value).map_err(|error| RequestError::malformed(error.to_string()))
    }

    /// Splits the command type into domain and action.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidName`] for malformed command types.
    pub fn name(&self) -> Result<CommandName, RequestError> {
        CommandName::parse(&self.command_type)
    }

    /// Resolves the parameters into a key-value map.
    ///
    /// String parameters are parsed as nested JSON documents first. Absent
    /// parameters and empty strings yield an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidParameters`] when the parameters are
    /// not an object once resolved.
    pub fn parameter_map(&self) -> Result<Map<String, Value>, RequestError> {
        resolve_parameters(&self.parameters)
    }
}

/// Resolves a parameters value (object, serialised object or null) to a map.
///
/// # Errors
///
/// Returns [`RequestError::InvalidParameters`] for anything else.
pub(crate) fn resolve_parameters(parameters: &Value) -> Result<Map<String, Value>, RequestError> {
    match parameters {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        Value::String(text) if text.trim().is_empty() => Ok(Map::new()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(Value::Null) => Ok(Map::new()),
            Ok(other) => Err(RequestError::invalid_parameters(format!(
                "expected an object, found {}",
                kind_of(&other)
            ))),
            Err(error) => Err(RequestError::invalid_parameters(error.to_string())),
        },
        other => Err(RequestError::invalid_parameters(format!(
            "expected an object, found {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_type_and_object_parameters() {
        let request = CommandRequest::parse(
            br#"{"type":"scene.CreateObject","parameters":{"name":"Cube"}}"#,
        )
        .expect("parse request");
        assert_eq!(request.command_type, "scene.CreateObject");
        let map = request.parameter_map().expect("parameters");
        assert_eq!(map.get("name"), Some(&json!("Cube")));
    }

    #[test]
    fn accepts_action_and_params_aliases() {
        let request = CommandRequest::parse(br#"{"action":"heartbeat","params":{}}"#)
            .expect("parse aliased request");
        assert_eq!(request.command_type, "heartbeat");
        assert_eq!(request.name().expect("name").domain(), "core");
    }

    #[test]
    fn parses_string_encoded_parameters() {
        let request = CommandRequest::new("session.SetVariable", json!("{\"key\":\"k\"}"));
        let map = request.parameter_map().expect("nested document");
        assert_eq!(map.get("key"), Some(&json!("k")));
    }

    #[rstest]
    #[case::missing(json!(null))]
    #[case::empty_string(json!(""))]
    #[case::empty_object(json!({}))]
    fn absent_parameters_resolve_to_empty_map(#[case] parameters: Value) {
        let request = CommandRequest::new("core.ping", parameters);
        assert!(request.parameter_map().expect("empty map").is_empty());
    }

    #[rstest]
    #[case::array(json!([1, 2]))]
    #[case::bad_string(json!("{not json"))]
    #[case::string_array(json!("[1]"))]
    fn rejects_non_object_parameters(#[case] parameters: Value) {
        let request = CommandRequest::new("core.ping", parameters);
        assert!(matches!(
            request.parameter_map(),
            Err(RequestError::InvalidParameters { .. })
        ));
    }

    #[rstest]
    #[case::empty(b"".as_slice())]
    #[case::not_json(b"hello".as_slice())]
    #[case::missing_type(br#"{"parameters":{}}"#.as_slice())]
    fn rejects_malformed_envelopes(#[case] input: &[u8]) {
        assert!(matches!(
            CommandRequest::parse(input),
            Err(RequestError::Malformed { .. })
        ));
    }
}
