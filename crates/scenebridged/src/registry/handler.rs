//! Handler declarations: actions, their parameters and the execution context.

use serde::Serialize;
use serde_json::Value;

use crate::engine::EngineState;
use crate::operations::OperationHandle;
use crate::session::SessionContext;

use super::arguments::Arguments;
use super::errors::CommandError;
use super::params::{ParamDescriptor, ParamSpec};

/// A component owning one domain of actions.
///
/// Handlers declare their actions once, when they are registered with a
/// [`Router`](super::Router). Each action is a closure or method over the
/// handler, so state the actions share lives on the handler itself.
///
/// ```ignore
/// impl CommandHandler for Lights {
///     fn declare(&self, actions: &mut ActionTable<Self>) {
///         actions.add(
///             ActionSpec::new("SetIntensity")
///                 .param(ParamSpec::required("name", ParamKind::String))
///                 .param(ParamSpec::required("intensity", ParamKind::Number)),
///             Self::set_intensity,
///         );
///     }
/// }
/// ```
pub trait CommandHandler: Send + Sized + 'static {
    /// Adds every action this handler exposes to `actions`.
    fn declare(&self, actions: &mut ActionTable<Self>);
}

/// Name, parameters and description of one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    name: &'static str,
    params: Vec<ParamSpec>,
    description: &'static str,
}

impl ActionSpec {
    /// Starts a declaration for the named action.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            params: Vec::new(),
            description: "",
        }
    }

    /// Appends a parameter; binding follows declaration order.
    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Attaches a description shown by the command catalogue.
    #[must_use]
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Action name as declared.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared parameters.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Catalogue entry for this action.
    #[must_use]
    pub fn descriptor(&self) -> ActionDescriptor {
        ActionDescriptor {
            name: self.name,
            description: self.description,
            parameters: self.params.iter().map(ParamSpec::descriptor).collect(),
        }
    }
}

/// Serialisable description of an action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDescriptor {
    /// Action name.
    pub name: &'static str,
    /// Free-form description.
    #[serde(skip_serializing_if = "str::is_empty")]
    pub description: &'static str,
    /// Parameters in binding order.
    pub parameters: Vec<ParamDescriptor>,
}

/// Serialisable description of a domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainDescriptor {
    /// Domain name as registered.
    pub domain: String,
    /// Actions exposed by the domain.
    pub actions: Vec<ActionDescriptor>,
}

pub(crate) type ActionBody<H> =
    Box<dyn Fn(&mut H, &mut ActionContext<'_>, &Arguments) -> Result<Value, CommandError> + Send>;

/// Actions collected from a handler at registration time.
pub struct ActionTable<H> {
    pub(crate) specs: Vec<ActionSpec>,
    pub(crate) bodies: Vec<ActionBody<H>>,
}

impl<H> Default for ActionTable<H> {
    fn default() -> Self {
        Self {
            specs: Vec::new(),
            bodies: Vec::new(),
        }
    }
}

impl<H> ActionTable<H> {
    /// Declares an action and the body that runs it.
    pub fn add<F>(&mut self, spec: ActionSpec, body: F) -> &mut Self
    where
        F: Fn(&mut H, &mut ActionContext<'_>, &Arguments) -> Result<Value, CommandError>
            + Send
            + 'static,
    {
        self.specs.push(spec);
        self.bodies.push(Box::new(body));
        self
    }

    /// Declared actions in declaration order.
    #[must_use]
    pub fn specs(&self) -> &[ActionSpec] {
        &self.specs
    }
}

/// What an action body can see while it runs on the host thread.
pub struct ActionContext<'a> {
    state: &'a mut EngineState,
    operation: Option<&'a OperationHandle>,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(state: &'a mut EngineState, operation: Option<&'a OperationHandle>) -> Self {
        Self { state, operation }
    }

    /// Shared session state.
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.state.session
    }

    /// Shared session state, mutably.
    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.state.session
    }

    /// Id of the async operation running this action, if any.
    #[must_use]
    pub fn operation_id(&self) -> Option<&str> {
        self.operation.map(OperationHandle::id)
    }

    /// Whether the async operation running this action was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.operation.is_some_and(OperationHandle::is_cancelled)
    }

    /// Cancellation checkpoint for long-running bodies.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Cancelled`] once cancellation is requested.
    pub fn checkpoint(&self) -> Result<(), CommandError> {
        if self.is_cancelled() {
            Err(CommandError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Reports progress in `0.0..=1.0`; ignored outside async operations.
    pub fn report_progress(&self, progress: f64) {
        if let Some(operation) = self.operation {
            operation.report_progress(progress);
        }
    }

    pub(crate) fn state(&mut self) -> &mut EngineState {
        self.state
    }
}
