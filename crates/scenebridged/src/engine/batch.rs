//! The `batch` entry point: several commands in one request.
//!
//! Elements run in order on the host thread. A failing element is reported
//! in `errors` and the remaining elements still run; the batch is not a
//! transaction.

use std::time::Instant;

use scenebridge_protocol::{CommandName, CommandRequest};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::operations::OperationHandle;
use crate::registry::{ActionSpec, ArgValue, CommandError, ParamKind, ParamSpec, bind};

use super::{ENGINE_TARGET, Engine, metrics_key};

/// Domain name of the batch entry point.
pub const BATCH_DOMAIN: &str = "batch";

/// Declarations of the `batch` actions.
#[must_use]
pub fn batch_actions() -> Vec<ActionSpec> {
    vec![
        ActionSpec::new("Execute")
            .param(
                ParamSpec::required("commands", ParamKind::list_of(ParamKind::Any))
                    .describe("Ordered list of {type, parameters} commands"),
            )
            .describe("Runs commands in order, collecting results and errors per command"),
    ]
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ElementResult {
    index: usize,
    command_type: String,
    execution_time: f64,
    result: Value,
}

#[derive(Debug, Serialize)]
struct ElementError {
    command_index: usize,
    command_type: Option<String>,
    message: String,
}

impl Engine {
    pub(super) fn execute_batch(
        &mut self,
        name: &CommandName,
        parameters: &Map<String, Value>,
        operation: Option<&OperationHandle>,
    ) -> Result<Value, CommandError> {
        let specs = batch_actions();
        let spec = specs
            .iter()
            .find(|spec| spec.name().eq_ignore_ascii_case(name.action()))
            .ok_or_else(|| CommandError::unknown_action(BATCH_DOMAIN, name.action()))?;
        let arguments = bind(
            &format!("{BATCH_DOMAIN}.{}", spec.name()),
            spec.params(),
            parameters,
        )?;
        let commands = arguments.list("commands")?;

        if commands.is_empty() {
            return Err(CommandError::malformed("batch contains no commands"));
        }
        let limit = self.options.batch_size_limit;
        if commands.len() > limit {
            return Err(CommandError::limit_exceeded("batch size", limit));
        }

        let started = Instant::now();
        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (index, element) in commands.iter().enumerate() {
            if operation.is_some_and(OperationHandle::is_cancelled) {
                return Err(CommandError::Cancelled);
            }
            let element = element_request(element);
            let command_type = element
                .as_ref()
                .ok()
                .map(|request| request.command_type.trim().to_owned());

            let element_started = Instant::now();
            let outcome = element.and_then(|request| {
                let outcome = self.execute_element(&request, operation);
                let elapsed = element_started.elapsed();
                let key = metrics_key(&self.router, &request);
                self.state.metrics.record(&key, elapsed);
                outcome
            });
            let elapsed = element_started.elapsed();

            match outcome {
                Ok(result) => results.push(ElementResult {
                    index,
                    command_type: command_type.unwrap_or_default(),
                    execution_time: elapsed.as_secs_f64() * 1000.0,
                    result,
                }),
                Err(error) => {
                    self.state.errors.record(
                        &error,
                        json!({
                            "commandType": command_type,
                            "batchIndex": index,
                        }),
                    );
                    errors.push(ElementError {
                        command_index: index,
                        command_type,
                        message: error.to_string(),
                    });
                }
            }
        }

        debug!(
            target: ENGINE_TARGET,
            commands = commands.len(),
            failed = errors.len(),
            "batch finished"
        );
        Ok(json!({
            "success": errors.is_empty(),
            "commandCount": commands.len(),
            "successCount": results.len(),
            "errorCount": errors.len(),
            "executionTime": started.elapsed().as_secs_f64() * 1000.0,
            "results": results,
            "errors": errors,
        }))
    }

    fn execute_element(
        &mut self,
        request: &CommandRequest,
        operation: Option<&OperationHandle>,
    ) -> Result<Value, CommandError> {
        let name = request.name()?;
        if name.is_domain(BATCH_DOMAIN) {
            return Err(CommandError::malformed("batches may not be nested"));
        }
        self.execute(request, operation)
    }
}

fn element_request(element: &ArgValue) -> Result<CommandRequest, CommandError> {
    match element.to_json() {
        value @ Value::Object(_) => CommandRequest::from_value(value).map_err(CommandError::from),
        other => Err(CommandError::malformed(format!(
            "batch element must be an object, found {other}"
        ))),
    }
}
