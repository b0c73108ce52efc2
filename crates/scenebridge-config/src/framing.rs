use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How JSON messages are delimited on a connection.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Framing {
    /// Each message is preceded by its byte length as a little-endian `u32`.
    #[default]
    LengthPrefixed,
    /// Messages are consecutive JSON documents; responses end with a newline.
    Document,
}

/// Error returned when a [`Framing`] name is not recognised.
pub type FramingParseError = strum::ParseError;
