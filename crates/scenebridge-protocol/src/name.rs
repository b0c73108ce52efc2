//! Splitting `"domain.action"` command types.

use std::fmt;

use crate::errors::RequestError;

/// Domain used when a command type carries no separator.
pub const DEFAULT_DOMAIN: &str = "core";

/// Separator between domain and action.
pub const DOMAIN_SEPARATOR: char = '.';

/// A command type split into domain and action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandName {
    domain: String,
    action: String,
}

impl CommandName {
    /// Parses a command type.
    ///
    /// Surrounding whitespace is ignored. A type without a separator is routed
    /// to [`DEFAULT_DOMAIN`]; more than one separator is rejected because
    /// action names may not contain it.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidName`] for empty types, empty segments
    /// or repeated separators.
    pub fn parse(command_type: &str) -> Result<Self, RequestError> {
        let trimmed = command_type.trim();
        if trimmed.is_empty() {
            return Err(RequestError::invalid_name(
                command_type,
                "command type is empty",
            ));
        }

        let (domain, action) = match trimmed.split_once(DOMAIN_SEPARATOR) {
            Some((domain, action)) => (domain.trim(), action.trim()),
            None => (DEFAULT_DOMAIN, trimmed),
        };

        if action.contains(DOMAIN_SEPARATOR) {
            return Err(RequestError::invalid_name(
                command_type,
                "action names may not contain the domain separator",
            ));
        }
        if domain.is_empty() {
            return Err(RequestError::invalid_name(command_type, "domain is empty"));
        }
        if action.is_empty() {
            return Err(RequestError::invalid_name(command_type, "action is empty"));
        }

        Ok(Self {
            domain: domain.to_owned(),
            action: action.to_owned(),
        })
    }

    /// Domain segment as written by the client.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Action segment as written by the client.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Whether the domain matches `domain`, ignoring ASCII case.
    #[must_use]
    pub fn is_domain(&self, domain: &str) -> bool {
        self.domain.eq_ignore_ascii_case(domain)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}{DOMAIN_SEPARATOR}{}", self.domain, self.action)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::qualified("scene.GetHierarchy", "scene", "GetHierarchy")]
    #[case::default_domain("heartbeat", "core", "heartbeat")]
    #[case::padded("  session . SetVariable ", "session", "SetVariable")]
    fn splits_on_first_separator(
        #[case] input: &str,
        #[case] domain: &str,
        #[case] action: &str,
    ) {
        let name = CommandName::parse(input).expect("valid name");
        assert_eq!(name.domain(), domain);
        assert_eq!(name.action(), action);
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::two_separators("scene.object.Create")]
    #[case::missing_action("scene.")]
    #[case::missing_domain(".Create")]
    fn rejects_malformed_names(#[case] input: &str) {
        assert!(matches!(
            CommandName::parse(input),
            Err(RequestError::InvalidName { .. })
        ));
    }

    #[test]
    fn matches_domain_case_insensitively() {
        let name = CommandName::parse("Scene.Find").expect("valid name");
        assert!(name.is_domain("scene"));
        assert_eq!(name.to_string(), "Scene.Find");
    }
}
