//! Parameter descriptors and the recursive JSON-to-argument converter.
//!
//! Every declared parameter has one [`ParamKind`] from a closed set. Binding
//! walks the declaration list in order, converts supplied values, applies
//! defaults and reports the first missing or mistyped parameter.

use serde::Serialize;
use serde_json::{Map, Value};

use super::arguments::{ArgValue, Arguments, Color};
use super::errors::CommandError;

/// Semantic type of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Text. Numbers and booleans are accepted and rendered as text.
    String,
    /// Floating point number. Numeric strings are accepted.
    Number,
    /// Whole number. Integral floats and numeric strings are accepted.
    Integer,
    /// Boolean. The strings `true` and `false` are accepted.
    Bool,
    /// One of a fixed set of names, matched ignoring ASCII case.
    Enum(&'static [&'static str]),
    /// `[x, y, z]` or `{x, y, z}`.
    Vector3,
    /// `[x, y, z, w]` or `{x, y, z, w}`.
    Vector4,
    /// `[r, g, b]`, `[r, g, b, a]` or `{r, g, b, a?}`; alpha defaults to 1.
    Color,
    /// Array whose elements all convert to the inner kind.
    List(Box<ParamKind>),
    /// Nested object bound against its own parameter list.
    Object(Vec<ParamSpec>),
    /// Any JSON value, passed through unchanged.
    Any,
}

impl ParamKind {
    /// Short name used in catalogues and error messages.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::String => "string".to_owned(),
            Self::Number => "number".to_owned(),
            Self::Integer => "integer".to_owned(),
            Self::Bool => "boolean".to_owned(),
            Self::Enum(names) => format!("one of [{}]", names.join(", ")),
            Self::Vector3 => "vector3".to_owned(),
            Self::Vector4 => "vector4".to_owned(),
            Self::Color => "color".to_owned(),
            Self::List(inner) => format!("list of {}", inner.label()),
            Self::Object(_) => "object".to_owned(),
            Self::Any => "any".to_owned(),
        }
    }

    /// Convenience constructor for [`ParamKind::List`].
    #[must_use]
    pub fn list_of(inner: Self) -> Self {
        Self::List(Box::new(inner))
    }
}

/// Declaration of one action parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    name: &'static str,
    kind: ParamKind,
    required: bool,
    default: Option<Value>,
    description: &'static str,
}

impl ParamSpec {
    /// Declares a required parameter.
    #[must_use]
    pub fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description: "",
        }
    }

    /// Declares an optional parameter without a default.
    #[must_use]
    pub fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// Supplies the value used when the parameter is absent.
    ///
    /// The default goes through the same conversion as supplied values.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    /// Attaches a description shown by the command catalogue.
    #[must_use]
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared kind.
    #[must_use]
    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    /// Whether binding fails when the parameter is absent.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Declared default.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Catalogue entry for this parameter.
    #[must_use]
    pub fn descriptor(&self) -> ParamDescriptor {
        ParamDescriptor {
            name: self.name,
            kind: self.kind.label(),
            required: self.required,
            default: self.default.clone(),
            description: self.description,
            fields: match &self.kind {
                ParamKind::Object(fields) => fields.iter().map(Self::descriptor).collect(),
                _ => Vec::new(),
            },
        }
    }
}

/// Serialisable description of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDescriptor {
    /// Parameter name.
    pub name: &'static str,
    /// Kind label, as produced by [`ParamKind::label`].
    pub kind: String,
    /// Whether the parameter must be supplied.
    pub required: bool,
    /// Declared default, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Free-form description.
    #[serde(skip_serializing_if = "str::is_empty")]
    pub description: &'static str,
    /// Fields of an object parameter.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ParamDescriptor>,
}

/// Binds a parameters map against declarations, in declaration order.
///
/// Keys that match no declaration are ignored.
///
/// # Errors
///
/// Returns [`CommandError::MissingParameter`] for the first absent required
/// parameter and [`CommandError::ParameterTypeMismatch`] for the first value
/// that does not convert.
pub fn bind(
    command: &str,
    specs: &[ParamSpec],
    parameters: &Map<String, Value>,
) -> Result<Arguments, CommandError> {
    bind_at(command, "", specs, parameters)
}

fn bind_at(
    command: &str,
    prefix: &str,
    specs: &[ParamSpec],
    parameters: &Map<String, Value>,
) -> Result<Arguments, CommandError> {
    let mut arguments = Arguments::default();
    for spec in specs {
        let path = qualified(prefix, spec.name);
        let supplied = parameters.get(spec.name).filter(|value| !value.is_null());
        let value = match (supplied, &spec.default) {
            (Some(value), _) | (None, Some(value)) => value,
            (None, None) if spec.required => {
                return Err(CommandError::missing_parameter(command, path));
            }
            (None, None) => continue,
        };
        let converted = convert(command, &path, &spec.kind, value)?;
        arguments.insert(spec.name, converted);
    }
    Ok(arguments)
}

fn qualified(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Converts one JSON value to the declared kind.
fn convert(
    command: &str,
    path: &str,
    kind: &ParamKind,
    value: &Value,
) -> Result<ArgValue, CommandError> {
    let mismatch = |message: String| CommandError::type_mismatch(path, kind.label(), message);
    match kind {
        ParamKind::String => match value {
            Value::String(text) => Ok(ArgValue::String(text.clone())),
            Value::Number(number) => Ok(ArgValue::String(number.to_string())),
            Value::Bool(flag) => Ok(ArgValue::String(flag.to_string())),
            other => Err(mismatch(found(other))),
        },
        ParamKind::Number => number_of(value)
            .map(ArgValue::Number)
            .ok_or_else(|| mismatch(found(value))),
        ParamKind::Integer => integer_of(value)
            .map(ArgValue::Integer)
            .ok_or_else(|| mismatch(found(value))),
        ParamKind::Bool => match value {
            Value::Bool(flag) => Ok(ArgValue::Bool(*flag)),
            Value::String(text) if text.eq_ignore_ascii_case("true") => Ok(ArgValue::Bool(true)),
            Value::String(text) if text.eq_ignore_ascii_case("false") => Ok(ArgValue::Bool(false)),
            other => Err(mismatch(found(other))),
        },
        ParamKind::Enum(names) => {
            let Value::String(text) = value else {
                return Err(mismatch(found(value)));
            };
            names
                .iter()
                .copied()
                .find(|name| name.eq_ignore_ascii_case(text.trim()))
                .map(ArgValue::Enum)
                .ok_or_else(|| mismatch(format!("'{text}' is not a recognised value")))
        }
        ParamKind::Vector3 => components::<3>(value, &["x", "y", "z"])
            .map(ArgValue::Vector3)
            .ok_or_else(|| mismatch(found(value))),
        ParamKind::Vector4 => components::<4>(value, &["x", "y", "z", "w"])
            .map(ArgValue::Vector4)
            .ok_or_else(|| mismatch(found(value))),
        ParamKind::Color => color_of(value)
            .map(ArgValue::Color)
            .ok_or_else(|| mismatch(found(value))),
        ParamKind::List(inner) => {
            let Value::Array(items) = value else {
                return Err(mismatch(found(value)));
            };
            items
                .iter()
                .enumerate()
                .map(|(index, item)| convert(command, &format!("{path}[{index}]"), inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(ArgValue::List)
        }
        ParamKind::Object(fields) => {
            let Value::Object(map) = value else {
                return Err(mismatch(found(value)));
            };
            bind_at(command, path, fields, map).map(ArgValue::Object)
        }
        ParamKind::Any => Ok(ArgValue::Any(value.clone())),
    }
}

fn found(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    format!("found {kind}: {value}")
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            let float = number.as_f64()?;
            integral_f64_to_i64(float)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "the value is checked to be integral and within i64 range first"
)]
fn integral_f64_to_i64(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_807.0;
    (value.fract() == 0.0 && value.abs() < LIMIT).then(|| value as i64)
}

fn components<const N: usize>(value: &Value, keys: &[&str; N]) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    match value {
        Value::Array(items) if items.len() == N => {
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = number_of(item)?;
            }
        }
        Value::Object(map) => {
            for (slot, key) in out.iter_mut().zip(keys) {
                *slot = number_of(map.get(*key)?)?;
            }
        }
        _ => return None,
    }
    Some(out)
}

fn color_of(value: &Value) -> Option<Color> {
    match value {
        Value::Array(items) if items.len() == 3 || items.len() == 4 => {
            let mut channels = [0.0, 0.0, 0.0, 1.0];
            for (slot, item) in channels.iter_mut().zip(items) {
                *slot = number_of(item)?;
            }
            let [r, g, b, a] = channels;
            Some(Color { r, g, b, a })
        }
        Value::Object(map) => Some(Color {
            r: number_of(map.get("r")?)?,
            g: number_of(map.get("g")?)?,
            b: number_of(map.get("b")?)?,
            a: map.get("a").map_or(Some(1.0), number_of)?,
        }),
        _ => None,
    }
}
