//! The `async` command domain.
//!
//! These actions only touch the operation table, which is thread-safe, so
//! connection threads answer them directly instead of queueing behind the
//! host thread. That keeps `async.Cancel` responsive while a long operation
//! occupies the host.

use scenebridge_protocol::CommandName;
use serde_json::{Map, Value, json};

use crate::registry::{ActionSpec, ArgValue, CommandError, ParamKind, ParamSpec, bind};

use super::manager::OperationManager;
use super::record::OperationStatus;

/// Domain name of the async entry point.
pub const ASYNC_DOMAIN: &str = "async";

const STATUS_NAMES: &[&str] = &["Pending", "Running", "Completed", "Failed", "Cancelled"];

/// Declarations of the `async` actions.
#[must_use]
pub fn async_actions() -> Vec<ActionSpec> {
    vec![
        ActionSpec::new("Start")
            .param(
                ParamSpec::required("command_type", ParamKind::String)
                    .describe("Command to run, in domain.action form"),
            )
            .param(
                ParamSpec::optional("parameters", ParamKind::Any)
                    .describe("Parameters for the command"),
            )
            .describe("Runs a command in the background and returns its operation id"),
        ActionSpec::new("GetStatus")
            .param(ParamSpec::required("operation_id", ParamKind::String))
            .describe("Reports the state of an operation"),
        ActionSpec::new("Cancel")
            .param(ParamSpec::required("operation_id", ParamKind::String))
            .describe("Requests cancellation of a pending or running operation"),
        ActionSpec::new("List")
            .param(ParamSpec::optional("status", ParamKind::Enum(STATUS_NAMES)))
            .describe("Lists operations, optionally by status"),
    ]
}

impl OperationManager {
    /// Runs one `async` domain action.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownAction`] for actions outside the
    /// domain, binding errors, and the errors of the underlying operation.
    pub fn execute_action(
        &self,
        action: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Value, CommandError> {
        let specs = async_actions();
        let spec = specs
            .iter()
            .find(|spec| spec.name().eq_ignore_ascii_case(action))
            .ok_or_else(|| CommandError::unknown_action(ASYNC_DOMAIN, action))?;
        let command = format!("{ASYNC_DOMAIN}.{}", spec.name());
        let arguments = bind(&command, spec.params(), parameters)?;

        match spec.name() {
            "Start" => {
                let command_type = arguments.str("command_type")?;
                CommandName::parse(command_type)?;
                let parameters = arguments
                    .get("parameters")
                    .map_or(Value::Null, ArgValue::to_json);
                let operation_id = self.register(command_type, parameters)?;
                Ok(json!({
                    "operationId": operation_id,
                    "status": OperationStatus::Pending,
                    "commandType": command_type,
                }))
            }
            "GetStatus" => {
                let snapshot = self.status(arguments.str("operation_id")?)?;
                Ok(json!(snapshot))
            }
            "Cancel" => {
                let operation_id = arguments.str("operation_id")?;
                let cancelled = self.cancel(operation_id)?;
                let status = self.status(operation_id)?.status;
                Ok(json!({
                    "operationId": operation_id,
                    "cancelled": cancelled,
                    "status": status,
                }))
            }
            // List
            _ => {
                let status = match arguments.opt_enum("status") {
                    Some(name) => Some(name.parse::<OperationStatus>().map_err(|_| {
                        CommandError::type_mismatch("status", "operation status", name)
                    })?),
                    None => None,
                };
                let operations = self.list(status);
                Ok(json!({
                    "count": operations.len(),
                    "operations": operations,
                }))
            }
        }
    }
}
