//! Domain registration and command routing.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use scenebridge_protocol::{CommandName, DOMAIN_SEPARATOR};
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::arguments::Arguments;
use super::errors::{CommandError, RegistrationError};
use super::handler::{ActionContext, ActionSpec, ActionTable, CommandHandler, DomainDescriptor};
use super::params::bind;

/// Tracing target for routing.
pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// A registered handler with its type erased.
trait DomainEntry: Send {
    fn name(&self) -> &str;
    fn specs(&self) -> &[ActionSpec];
    fn find(&self, action: &str) -> Option<usize>;
    fn invoke(
        &mut self,
        index: usize,
        context: &mut ActionContext<'_>,
        arguments: &Arguments,
    ) -> Result<Value, CommandError>;
}

struct Registered<H> {
    name: String,
    handler: H,
    table: ActionTable<H>,
    index: HashMap<String, usize>,
}

impl<H: CommandHandler> DomainEntry for Registered<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn specs(&self) -> &[ActionSpec] {
        self.table.specs()
    }

    fn find(&self, action: &str) -> Option<usize> {
        self.index.get(&action.to_ascii_lowercase()).copied()
    }

    fn invoke(
        &mut self,
        index: usize,
        context: &mut ActionContext<'_>,
        arguments: &Arguments,
    ) -> Result<Value, CommandError> {
        let body = self
            .table
            .bodies
            .get(index)
            .ok_or_else(|| CommandError::handler("action body is missing"))?;
        body(&mut self.handler, context, arguments)
    }
}

/// Maps `domain.action` names to handler actions.
///
/// Domain and action lookups ignore ASCII case.
#[derive(Default)]
pub struct Router {
    domains: Vec<Box<dyn DomainEntry>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Router")
            .field("domains", &self.domains().collect::<Vec<_>>())
            .finish()
    }
}

impl Router {
    /// Creates a router with no domains.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` as the owner of `domain`.
    ///
    /// The handler's actions are collected here, once.
    ///
    /// # Errors
    ///
    /// Fails when the domain is taken, a name is invalid, or the handler
    /// declares an action twice.
    pub fn register<H: CommandHandler>(
        &mut self,
        domain: &str,
        handler: H,
    ) -> Result<(), RegistrationError> {
        validate_name(domain)?;
        let key = domain.to_ascii_lowercase();
        if self.index.contains_key(&key) {
            return Err(RegistrationError::DuplicateDomain {
                domain: domain.to_owned(),
            });
        }

        let mut table = ActionTable::default();
        handler.declare(&mut table);

        let mut index = HashMap::with_capacity(table.specs().len());
        for (position, spec) in table.specs().iter().enumerate() {
            validate_name(spec.name())?;
            if index
                .insert(spec.name().to_ascii_lowercase(), position)
                .is_some()
            {
                return Err(RegistrationError::DuplicateAction {
                    domain: domain.to_owned(),
                    action: spec.name().to_owned(),
                });
            }
        }

        debug!(
            target: REGISTRY_TARGET,
            domain,
            actions = table.specs().len(),
            "registered domain"
        );
        self.index.insert(key, self.domains.len());
        self.domains.push(Box::new(Registered {
            name: domain.to_owned(),
            handler,
            table,
            index,
        }));
        Ok(())
    }

    /// Whether a handler owns `domain`.
    #[must_use]
    pub fn contains(&self, domain: &str) -> bool {
        self.index.contains_key(&domain.to_ascii_lowercase())
    }

    /// Registered domain names in registration order.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(|entry| entry.name())
    }

    /// Describes every registered domain and action.
    #[must_use]
    pub fn catalogue(&self) -> Vec<DomainDescriptor> {
        self.domains
            .iter()
            .map(|entry| DomainDescriptor {
                domain: entry.name().to_owned(),
                actions: entry.specs().iter().map(ActionSpec::descriptor).collect(),
            })
            .collect()
    }

    /// `domain.action` as registered, when `name` resolves to an action.
    #[must_use]
    pub fn canonical_name(&self, name: &CommandName) -> Option<String> {
        let entry = self
            .index
            .get(&name.domain().to_ascii_lowercase())
            .and_then(|position| self.domains.get(*position))?;
        let spec = entry
            .find(name.action())
            .and_then(|action| entry.specs().get(action))?;
        Some(format!("{}{DOMAIN_SEPARATOR}{}", entry.name(), spec.name()))
    }

    /// Resolves, binds and runs one command.
    ///
    /// Panics raised by the action body are caught and reported as handler
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownDomain`], [`CommandError::UnknownAction`],
    /// binding errors, or whatever the action body reports.
    pub fn dispatch(
        &mut self,
        name: &CommandName,
        parameters: &Map<String, Value>,
        context: &mut ActionContext<'_>,
    ) -> Result<Value, CommandError> {
        let entry = self
            .index
            .get(&name.domain().to_ascii_lowercase())
            .and_then(|position| self.domains.get_mut(*position))
            .ok_or_else(|| CommandError::unknown_domain(name.domain()))?;
        let action = entry
            .find(name.action())
            .ok_or_else(|| CommandError::unknown_action(entry.name(), name.action()))?;
        let spec = entry
            .specs()
            .get(action)
            .ok_or_else(|| CommandError::unknown_action(entry.name(), name.action()))?;
        let command = format!("{}{DOMAIN_SEPARATOR}{}", entry.name(), spec.name());
        let arguments = bind(&command, spec.params(), parameters)?;

        debug!(target: REGISTRY_TARGET, command = %command, "invoking action");
        panic::catch_unwind(AssertUnwindSafe(|| {
            entry.invoke(action, context, &arguments)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(
                target: REGISTRY_TARGET,
                command = %command,
                panic = %message,
                "action panicked"
            );
            Err(CommandError::handler(format!("action panicked: {message}")))
        })
    }
}

fn validate_name(name: &str) -> Result<(), RegistrationError> {
    let reason = if name.trim().is_empty() {
        "name is empty"
    } else if name.contains(DOMAIN_SEPARATOR) {
        "name contains the domain separator"
    } else if name.trim() != name {
        "name has surrounding whitespace"
    } else {
        return Ok(());
    };
    Err(RegistrationError::InvalidName {
        name: name.to_owned(),
        reason,
    })
}

/// Extracts the message carried by a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
