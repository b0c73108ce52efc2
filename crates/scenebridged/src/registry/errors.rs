//! Error taxonomy for command dispatch.
//!
//! Every failure a command can meet is a [`CommandError`]. The engine turns
//! them into `{"status":"error"}` responses or terminal operation states;
//! none of them escape the host tick or a connection loop.

use std::time::Duration;

use scenebridge_protocol::RequestError;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Classification of a [`CommandError`], recorded by the diagnostics log.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ErrorKind {
    /// Unparseable body, missing or malformed type, unusable parameters.
    MalformedRequest,
    /// No handler is registered for the domain.
    UnknownDomain,
    /// The domain has no such action.
    UnknownAction,
    /// A required parameter was absent.
    MissingParameter,
    /// A parameter could not be converted to its declared kind.
    ParameterTypeMismatch,
    /// The action body failed or panicked.
    Handler,
    /// An asynchronous operation exceeded its wait bound.
    Timeout,
    /// An asynchronous operation was cancelled before completing.
    Cancelled,
    /// A batch or operation limit was exceeded.
    LimitExceeded,
    /// No operation has the given id.
    OperationNotFound,
}

/// Failure of a single command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The request could not be interpreted.
    #[error("malformed request: {message}")]
    MalformedRequest { message: String },

    /// Domain has no registered handler.
    #[error("unknown domain: {domain}")]
    UnknownDomain { domain: String },

    /// Action is not exposed by the domain's handler.
    #[error("unknown action '{action}' for domain '{domain}'")]
    UnknownAction { domain: String, action: String },

    /// Required parameter was not supplied.
    #[error("missing required parameter '{parameter}' for '{command}'")]
    MissingParameter { command: String, parameter: String },

    /// Supplied parameter does not convert to the declared kind.
    #[error("parameter '{parameter}' expects {expected}: {message}")]
    ParameterTypeMismatch {
        parameter: String,
        expected: String,
        message: String,
    },

    /// The action body reported a failure.
    #[error("{message}")]
    Handler { message: String },

    /// The operation did not finish within its wait bound.
    #[error("operation timed out after {} seconds", timeout.as_secs())]
    Timeout { timeout: Duration },

    /// The operation was cancelled.
    #[error("operation was cancelled")]
    Cancelled,

    /// A configured limit was exceeded.
    #[error("{what} limit of {limit} exceeded")]
    LimitExceeded { what: &'static str, limit: usize },

    /// No operation is tracked under the id.
    #[error("operation not found: {operation_id}")]
    OperationNotFound { operation_id: String },
}

impl CommandError {
    /// Classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedRequest { .. } => ErrorKind::MalformedRequest,
            Self::UnknownDomain { .. } => ErrorKind::UnknownDomain,
            Self::UnknownAction { .. } => ErrorKind::UnknownAction,
            Self::MissingParameter { .. } => ErrorKind::MissingParameter,
            Self::ParameterTypeMismatch { .. } => ErrorKind::ParameterTypeMismatch,
            Self::Handler { .. } => ErrorKind::Handler,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::OperationNotFound { .. } => ErrorKind::OperationNotFound,
        }
    }

    /// Creates a malformed request error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Creates an unknown domain error.
    pub fn unknown_domain(domain: impl Into<String>) -> Self {
        Self::UnknownDomain {
            domain: domain.into(),
        }
    }

    /// Creates an unknown action error.
    pub fn unknown_action(domain: impl Into<String>, action: impl Into<String>) -> Self {
        Self::UnknownAction {
            domain: domain.into(),
            action: action.into(),
        }
    }

    /// Creates a missing parameter error.
    pub fn missing_parameter(command: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::MissingParameter {
            command: command.into(),
            parameter: parameter.into(),
        }
    }

    /// Creates a parameter type mismatch error.
    pub fn type_mismatch(
        parameter: impl Into<String>,
        expected: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ParameterTypeMismatch {
            parameter: parameter.into(),
            expected: expected.into(),
            message: message.into(),
        }
    }

    /// Creates a handler failure.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Creates a limit error.
    #[must_use]
    pub fn limit_exceeded(what: &'static str, limit: usize) -> Self {
        Self::LimitExceeded { what, limit }
    }

    /// Creates an operation lookup error.
    pub fn operation_not_found(operation_id: impl Into<String>) -> Self {
        Self::OperationNotFound {
            operation_id: operation_id.into(),
        }
    }
}

/// Failure to register a handler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// Another handler already owns the domain.
    #[error("domain '{domain}' is already registered")]
    DuplicateDomain { domain: String },

    /// The handler declared the same action twice.
    #[error("action '{action}' is declared twice in domain '{domain}'")]
    DuplicateAction { domain: String, action: String },

    /// A domain or action name is empty or contains the separator.
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
}

impl From<RequestError> for CommandError {
    fn from(error: RequestError) -> Self {
        Self::malformed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::domain(CommandError::unknown_domain("bogus"), ErrorKind::UnknownDomain, "unknown domain: bogus")]
    #[case::action(
        CommandError::unknown_action("scene", "Fly"),
        ErrorKind::UnknownAction,
        "unknown action 'Fly' for domain 'scene'"
    )]
    #[case::missing(
        CommandError::missing_parameter("scene.Create", "name"),
        ErrorKind::MissingParameter,
        "missing required parameter 'name' for 'scene.Create'"
    )]
    #[case::timeout(
        CommandError::Timeout { timeout: Duration::from_secs(300) },
        ErrorKind::Timeout,
        "operation timed out after 300 seconds"
    )]
    #[case::handler(CommandError::handler("object not found"), ErrorKind::Handler, "object not found")]
    fn errors_render_readable_messages(
        #[case] error: CommandError,
        #[case] kind: ErrorKind,
        #[case] message: &str,
    ) {
        assert_eq!(error.kind(), kind);
        assert_eq!(error.to_string(), message);
    }

    #[test]
    fn request_errors_become_malformed_requests() {
        let error = CommandError::from(RequestError::malformed("empty request document"));
        assert_eq!(error.kind(), ErrorKind::MalformedRequest);
    }

    #[test]
    fn registration_errors_name_the_conflict() {
        let error = RegistrationError::DuplicateAction {
            domain: "scene".to_owned(),
            action: "create".to_owned(),
        };
        assert_eq!(
            error.to_string(),
            "action 'create' is declared twice in domain 'scene'"
        );
    }

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!(
            "Unknown_Domain".parse::<ErrorKind>().expect("kind"),
            ErrorKind::UnknownDomain
        );
        assert_eq!(ErrorKind::LimitExceeded.to_string(), "limit_exceeded");
    }
}
