//! Long-running demo commands for exercising the `async` domain.

use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::registry::{
    ActionContext, ActionSpec, ActionTable, Arguments, CommandError, CommandHandler, ParamKind,
    ParamSpec,
};

/// `tasks` domain.
#[derive(Debug, Default)]
pub struct TaskHandler;

impl TaskHandler {
    fn sleep(
        &mut self,
        context: &mut ActionContext<'_>,
        arguments: &Arguments,
    ) -> Result<Value, CommandError> {
        let millis = u64::try_from(arguments.integer("millis")?).map_err(|_| {
            CommandError::type_mismatch("millis", "non-negative integer", "negative")
        })?;
        let steps = u32::try_from(arguments.integer("steps")?)
            .ok()
            .filter(|steps| *steps > 0)
            .ok_or_else(|| {
                CommandError::type_mismatch("steps", "positive integer", "zero or negative")
            })?;

        let started = Instant::now();
        let slice = Duration::from_millis(millis) / steps;
        for step in 1..=steps {
            context.checkpoint()?;
            thread::sleep(slice);
            context.report_progress(f64::from(step) / f64::from(steps));
        }
        Ok(json!({
            "slept_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "steps": steps,
            "operationId": context.operation_id(),
        }))
    }
}

impl CommandHandler for TaskHandler {
    fn declare(&self, actions: &mut ActionTable<Self>) {
        actions
            .add(
                ActionSpec::new("Sleep")
                    .param(
                        ParamSpec::optional("millis", ParamKind::Integer)
                            .with_default(json!(100)),
                    )
                    .param(
                        ParamSpec::optional("steps", ParamKind::Integer).with_default(json!(10)),
                    )
                    .describe("Blocks the host for a while, reporting progress per step"),
                Self::sleep,
            )
            .add(
                ActionSpec::new("Echo").param(ParamSpec::required("value", ParamKind::Any)),
                |_, _, arguments| Ok(json!({ "value": arguments.json("value")? })),
            );
    }
}

#[cfg(test)]
mod tests {
    use scenebridge_protocol::CommandName;
    use serde_json::Map;

    use crate::engine::EngineState;
    use crate::registry::Router;

    use super::*;

    fn run(parameters: Value) -> Result<Value, CommandError> {
        let mut router = Router::new();
        router.register("tasks", TaskHandler).expect("register");
        let mut state = EngineState::default();
        let mut context = ActionContext::new(&mut state, None);
        let name = CommandName::parse("tasks.Sleep").expect("name");
        let Value::Object(map) = parameters else {
            return router.dispatch(&name, &Map::new(), &mut context);
        };
        router.dispatch(&name, &map, &mut context)
    }

    #[test]
    fn sleeps_in_steps() {
        let result = run(json!({"millis": 10, "steps": 2})).expect("sleep");
        assert_eq!(result["steps"], json!(2));
        assert_eq!(result["operationId"], Value::Null);
    }

    #[test]
    fn rejects_zero_steps() {
        let error = run(json!({"steps": 0})).expect_err("zero steps");
        assert!(error.to_string().contains("steps"));
    }
}
