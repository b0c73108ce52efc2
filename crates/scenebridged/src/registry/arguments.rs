//! Typed argument values produced by parameter binding.

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::errors::CommandError;

/// RGBA colour with components in the `0.0..=1.0` range by convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Alpha, `1.0` when omitted.
    pub a: f64,
}

/// One bound argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Text.
    String(String),
    /// Any JSON number.
    Number(f64),
    /// A number with no fractional part.
    Integer(i64),
    /// `true` or `false`.
    Bool(bool),
    /// Canonical name of the matched enumerated value.
    Enum(&'static str),
    /// Three components, from an array or an `{x, y, z}` object.
    Vector3([f64; 3]),
    /// Four components, from an array or an `{x, y, z, w}` object.
    Vector4([f64; 4]),
    /// A colour.
    Color(Color),
    /// Homogeneous list of bound elements.
    List(Vec<ArgValue>),
    /// Nested object bound against its own parameter declarations.
    Object(Arguments),
    /// Untyped JSON passed through unchanged.
    Any(Value),
}

impl ArgValue {
    /// Renders the value back as JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(text) => Value::String(text.clone()),
            Self::Number(number) => json!(number),
            Self::Integer(number) => json!(number),
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Enum(name) => Value::String((*name).to_owned()),
            Self::Vector3(vector) => json!(vector),
            Self::Vector4(vector) => json!(vector),
            Self::Color(color) => json!(color),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(arguments) => arguments.to_json(),
            Self::Any(value) => value.clone(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Integer(_) => "integer",
            Self::Bool(_) => "boolean",
            Self::Enum(_) => "enum",
            Self::Vector3(_) => "vector3",
            Self::Vector4(_) => "vector4",
            Self::Color(_) => "color",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Any(_) => "any",
        }
    }
}

/// Arguments bound for one invocation, in declaration order.
///
/// Optional parameters without a default are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<(&'static str, ArgValue)>,
}

impl Arguments {
    pub(crate) fn insert(&mut self, name: &'static str, value: ArgValue) {
        self.values.push((name, value));
    }

    /// Looks up a bound argument.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(bound, _)| *bound == name)
            .map(|(_, value)| value)
    }

    /// Whether an argument was bound under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of bound arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Renders all arguments as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(name, value)| ((*name).to_owned(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    /// String argument.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or not a string.
    pub fn str(&self, name: &str) -> Result<&str, CommandError> {
        match self.require(name)? {
            ArgValue::String(text) => Ok(text),
            other => Err(wrong_kind(name, "string", other)),
        }
    }

    /// Optional string argument.
    #[must_use]
    pub fn opt_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ArgValue::String(text)) => Some(text),
            _ => None,
        }
    }

    /// Numeric argument; integers widen to `f64`.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or not numeric.
    pub fn number(&self, name: &str) -> Result<f64, CommandError> {
        match self.require(name)? {
            ArgValue::Number(number) => Ok(*number),
            ArgValue::Integer(number) => Ok(i64_to_f64(*number)),
            other => Err(wrong_kind(name, "number", other)),
        }
    }

    /// Integer argument.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or not an integer.
    pub fn integer(&self, name: &str) -> Result<i64, CommandError> {
        match self.require(name)? {
            ArgValue::Integer(number) => Ok(*number),
            other => Err(wrong_kind(name, "integer", other)),
        }
    }

    /// Optional integer argument.
    #[must_use]
    pub fn opt_integer(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(ArgValue::Integer(number)) => Some(*number),
            _ => None,
        }
    }

    /// Boolean argument.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or not a boolean.
    pub fn bool(&self, name: &str) -> Result<bool, CommandError> {
        match self.require(name)? {
            ArgValue::Bool(flag) => Ok(*flag),
            other => Err(wrong_kind(name, "boolean", other)),
        }
    }

    /// Enumerated argument, as the canonical declared name.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or not an enum.
    pub fn enum_value(&self, name: &str) -> Result<&'static str, CommandError> {
        match self.require(name)? {
            ArgValue::Enum(value) => Ok(value),
            other => Err(wrong_kind(name, "enum", other)),
        }
    }

    /// Optional enumerated argument.
    #[must_use]
    pub fn opt_enum(&self, name: &str) -> Option<&'static str> {
        match self.get(name) {
            Some(ArgValue::Enum(value)) => Some(value),
            _ => None,
        }
    }

    /// Three-component vector argument.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or not a 3-vector.
    pub fn vector3(&self, name: &str) -> Result<[f64; 3], CommandError> {
        match self.require(name)? {
            ArgValue::Vector3(vector) => Ok(*vector),
            other => Err(wrong_kind(name, "vector3", other)),
        }
    }

    /// Optional three-component vector argument.
    #[must_use]
    pub fn opt_vector3(&self, name: &str) -> Option<[f64; 3]> {
        match self.get(name) {
            Some(ArgValue::Vector3(vector)) => Some(*vector),
            _ => None,
        }
    }

    /// Colour argument.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or not a colour.
    pub fn color(&self, name: &str) -> Result<Color, CommandError> {
        match self.require(name)? {
            ArgValue::Color(color) => Ok(*color),
            other => Err(wrong_kind(name, "color", other)),
        }
    }

    /// List argument.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or not a list.
    pub fn list(&self, name: &str) -> Result<&[ArgValue], CommandError> {
        match self.require(name)? {
            ArgValue::List(items) => Ok(items),
            other => Err(wrong_kind(name, "list", other)),
        }
    }

    /// Nested object argument.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or not an object.
    pub fn object(&self, name: &str) -> Result<&Self, CommandError> {
        match self.require(name)? {
            ArgValue::Object(arguments) => Ok(arguments),
            other => Err(wrong_kind(name, "object", other)),
        }
    }

    /// Argument rendered as JSON, whatever its kind.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent.
    pub fn json(&self, name: &str) -> Result<Value, CommandError> {
        self.require(name).map(ArgValue::to_json)
    }

    fn require(&self, name: &str) -> Result<&ArgValue, CommandError> {
        self.get(name)
            .ok_or_else(|| CommandError::handler(format!("argument '{name}' was not bound")))
    }
}

fn wrong_kind(name: &str, expected: &str, found: &ArgValue) -> CommandError {
    CommandError::type_mismatch(name, expected, format!("bound as {}", found.describe()))
}

#[expect(
    clippy::cast_precision_loss,
    reason = "integer arguments widen to f64 for numeric consumers"
)]
fn i64_to_f64(value: i64) -> f64 {
    value as f64
}
