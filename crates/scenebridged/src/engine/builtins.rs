//! Domains every engine registers: `core`, `session`, `history`, `metrics`
//! and `diagnostics`.

use serde_json::{Map, Value, json};

use crate::diagnostics::ErrorRecord;
use crate::registry::{
    ActionContext, ActionSpec, ActionTable, Arguments, CommandError, CommandHandler, ErrorKind,
    ParamKind, ParamSpec, RegistrationError,
};

use super::Engine;

const ERROR_KIND_NAMES: &[&str] = &[
    "malformed_request",
    "unknown_domain",
    "unknown_action",
    "missing_parameter",
    "parameter_type_mismatch",
    "handler",
    "timeout",
    "cancelled",
    "limit_exceeded",
    "operation_not_found",
];

pub(super) fn register(engine: &mut Engine) -> Result<(), RegistrationError> {
    engine.register(scenebridge_protocol::DEFAULT_DOMAIN, CoreCommands)?;
    engine.register("session", SessionCommands)?;
    engine.register("history", HistoryCommands)?;
    engine.register("metrics", MetricsCommands)?;
    engine.register("diagnostics", DiagnosticsCommands)?;
    Ok(())
}

type Outcome = Result<Value, CommandError>;

fn non_negative(arguments: &Arguments, name: &str) -> Result<Option<usize>, CommandError> {
    arguments
        .opt_integer(name)
        .map(|value| {
            usize::try_from(value).map_err(|_| {
                CommandError::type_mismatch(name, "non-negative integer", value.to_string())
            })
        })
        .transpose()
}

/// Liveness and discovery.
struct CoreCommands;

impl CoreCommands {
    fn heartbeat(&mut self, context: &mut ActionContext<'_>, _: &Arguments) -> Outcome {
        Ok(json!({
            "alive": true,
            "uptime_secs": context.state().uptime().as_secs(),
        }))
    }

    fn system_info(&mut self, context: &mut ActionContext<'_>, _: &Arguments) -> Outcome {
        let state = context.state();
        let domains: Vec<&str> = state
            .catalogue
            .iter()
            .map(|domain| domain.domain.as_str())
            .collect();
        Ok(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": state.uptime().as_secs(),
            "sessionId": state.session.id().to_string(),
            "domains": domains,
            "historySize": state.history.len(),
            "totalErrors": state.errors.total(),
        }))
    }

    fn list_commands(&mut self, context: &mut ActionContext<'_>, arguments: &Arguments) -> Outcome {
        let filter = arguments.opt_str("domain");
        let domains: Vec<_> = context
            .state()
            .catalogue
            .iter()
            .filter(|domain| filter.is_none_or(|filter| domain.domain.eq_ignore_ascii_case(filter)))
            .collect();
        if let Some(filter) = filter
            && domains.is_empty()
        {
            return Err(CommandError::unknown_domain(filter));
        }
        let count: usize = domains.iter().map(|domain| domain.actions.len()).sum();
        Ok(json!({ "domains": domains, "count": count }))
    }
}

impl CommandHandler for CoreCommands {
    fn declare(&self, actions: &mut ActionTable<Self>) {
        actions
            .add(
                ActionSpec::new("heartbeat").describe("Reports that the host is alive"),
                Self::heartbeat,
            )
            .add(
                ActionSpec::new("ping").describe("Replies with the current time"),
                |_, _, _| {
                    Ok(json!({
                        "pong": true,
                        "timestamp": crate::history::now_rfc3339(),
                    }))
                },
            )
            .add(
                ActionSpec::new("GetSystemInfo")
                    .describe("Reports the host version, uptime and domains"),
                Self::system_info,
            )
            .add(
                ActionSpec::new("ListCommands")
                    .param(ParamSpec::optional("domain", ParamKind::String))
                    .describe("Lists every domain, action and parameter"),
                Self::list_commands,
            );
    }
}

/// Focus, selection and variables.
struct SessionCommands;

impl SessionCommands {
    fn entity(arguments: &Arguments) -> Result<String, CommandError> {
        arguments.str("entity").map(str::to_owned)
    }
}

impl CommandHandler for SessionCommands {
    fn declare(&self, actions: &mut ActionTable<Self>) {
        let entity = || ParamSpec::required("entity", ParamKind::String);
        let key = || ParamSpec::required("key", ParamKind::String);
        actions
            .add(
                ActionSpec::new("SetFocused").param(entity()),
                |_, context, arguments| {
                    let entity = Self::entity(arguments)?;
                    context.session_mut().set_focused(entity.clone());
                    Ok(json!({ "focused": entity }))
                },
            )
            .add(ActionSpec::new("GetFocused"), |_, context, _| {
                Ok(json!({ "focused": context.session().focused() }))
            })
            .add(ActionSpec::new("ClearFocused"), |_, context, _| {
                let cleared = context.session_mut().clear_focused();
                Ok(json!({ "focused": null, "cleared": cleared }))
            })
            .add(
                ActionSpec::new("AddSelected").param(entity()),
                |_, context, arguments| {
                    let entity = Self::entity(arguments)?;
                    let added = context.session_mut().add_selected(entity.clone());
                    Ok(json!({
                        "entity": entity,
                        "added": added,
                        "selectedCount": context.session().selected().len(),
                    }))
                },
            )
            .add(
                ActionSpec::new("RemoveSelected").param(entity()),
                |_, context, arguments| {
                    let entity = Self::entity(arguments)?;
                    let removed = context.session_mut().remove_selected(&entity);
                    Ok(json!({
                        "entity": entity,
                        "removed": removed,
                        "selectedCount": context.session().selected().len(),
                    }))
                },
            )
            .add(ActionSpec::new("ClearSelected"), |_, context, _| {
                let cleared = context.session().selected().len();
                context.session_mut().clear_selected();
                Ok(json!({ "cleared": cleared }))
            })
            .add(ActionSpec::new("GetSelected"), |_, context, _| {
                let selected = context.session().selected();
                Ok(json!({ "selected": selected, "count": selected.len() }))
            })
            .add(
                ActionSpec::new("SetVariable")
                    .param(key())
                    .param(ParamSpec::required("value", ParamKind::Any)),
                |_, context, arguments| {
                    let key = arguments.str("key")?;
                    let value = arguments.json("value")?;
                    let previous = context.session_mut().set_variable(key, value.clone());
                    Ok(json!({ "key": key, "value": value, "previous": previous }))
                },
            )
            .add(
                ActionSpec::new("GetVariable").param(key()),
                |_, context, arguments| {
                    let key = arguments.str("key")?;
                    let value = context.session().variable(key);
                    Ok(json!({ "key": key, "exists": value.is_some(), "value": value }))
                },
            )
            .add(
                ActionSpec::new("RemoveVariable").param(key()),
                |_, context, arguments| {
                    let key = arguments.str("key")?;
                    let removed = context.session_mut().remove_variable(key);
                    Ok(json!({ "key": key, "removed": removed.is_some(), "value": removed }))
                },
            )
            .add(ActionSpec::new("Snapshot"), |_, context, _| {
                Ok(context.session().snapshot())
            });
    }
}

/// Executed command log.
struct HistoryCommands;

impl CommandHandler for HistoryCommands {
    fn declare(&self, actions: &mut ActionTable<Self>) {
        actions
            .add(
                ActionSpec::new("GetAll")
                    .param(ParamSpec::optional("limit", ParamKind::Integer))
                    .describe("Returns recorded commands, most recent last"),
                |_, context, arguments| {
                    let limit = non_negative(arguments, "limit")?;
                    let history = &context.state().history;
                    let skip = limit.map_or(0, |limit| history.len().saturating_sub(limit));
                    let entries: Vec<_> = history.entries().skip(skip).collect();
                    Ok(json!({
                        "entries": entries,
                        "count": entries.len(),
                        "capacity": history.capacity(),
                    }))
                },
            )
            .add(ActionSpec::new("GetLast"), |_, context, _| {
                Ok(json!({ "entry": context.state().history.last() }))
            })
            .add(ActionSpec::new("Clear"), |_, context, _| {
                let history = &mut context.state().history;
                let cleared = history.len();
                history.clear();
                Ok(json!({ "cleared": cleared }))
            })
            .add(
                ActionSpec::new("SetCapacity")
                    .param(ParamSpec::required("capacity", ParamKind::Integer)),
                |_, context, arguments| {
                    let capacity = non_negative(arguments, "capacity")?.unwrap_or_default();
                    if capacity == 0 {
                        return Err(CommandError::handler("history capacity must be positive"));
                    }
                    let history = &mut context.state().history;
                    history.set_capacity(capacity);
                    Ok(json!({ "capacity": capacity, "count": history.len() }))
                },
            );
    }
}

/// Execution timings.
struct MetricsCommands;

impl CommandHandler for MetricsCommands {
    fn declare(&self, actions: &mut ActionTable<Self>) {
        actions
            .add(
                ActionSpec::new("Get")
                    .param(ParamSpec::optional("command_type", ParamKind::String))
                    .describe("Returns timings for one command type or all of them"),
                |_, context, arguments| {
                    let metrics = &context.state().metrics;
                    if let Some(command_type) = arguments.opt_str("command_type") {
                        let stats = metrics.get(command_type).ok_or_else(|| {
                            CommandError::handler(format!(
                                "no metrics recorded for '{command_type}'"
                            ))
                        })?;
                        return Ok(json!({
                            "commandType": command_type,
                            "metrics": stats.report(),
                        }));
                    }
                    let commands: Map<String, Value> = metrics
                        .iter()
                        .map(|(name, stats)| (name.to_owned(), json!(stats.report())))
                        .collect();
                    Ok(json!({
                        "commands": commands,
                        "totalExecutions": metrics.total_count(),
                    }))
                },
            )
            .add(ActionSpec::new("Reset"), |_, context, _| {
                context.state().metrics.reset();
                Ok(json!({ "reset": true }))
            });
    }
}

/// Error log inspection.
struct DiagnosticsCommands;

impl DiagnosticsCommands {
    const DEFAULT_LIMIT: usize = 20;

    fn error_logs(&mut self, context: &mut ActionContext<'_>, arguments: &Arguments) -> Outcome {
        let limit = non_negative(arguments, "limit")?.unwrap_or(Self::DEFAULT_LIMIT);
        let kind = arguments
            .opt_enum("error_type")
            .map(|name| {
                name.parse::<ErrorKind>()
                    .map_err(|_| CommandError::type_mismatch("error_type", "error kind", name))
            })
            .transpose()?;
        let errors = &context.state().errors;
        let records: Vec<&ErrorRecord> = errors.recent(kind, limit).collect();
        Ok(json!({
            "errors": records,
            "count": records.len(),
            "totalErrors": errors.total(),
        }))
    }
}

impl CommandHandler for DiagnosticsCommands {
    fn declare(&self, actions: &mut ActionTable<Self>) {
        actions
            .add(
                ActionSpec::new("GetErrorLogs")
                    .param(ParamSpec::optional("limit", ParamKind::Integer))
                    .param(ParamSpec::optional(
                        "error_type",
                        ParamKind::Enum(ERROR_KIND_NAMES),
                    ))
                    .describe("Lists recent failures, newest first"),
                Self::error_logs,
            )
            .add(
                ActionSpec::new("GetErrorDetails")
                    .param(ParamSpec::required("error_id", ParamKind::String)),
                |_, context, arguments| {
                    let id = arguments.str("error_id")?;
                    context
                        .state()
                        .errors
                        .find(id)
                        .map(|record| json!(record))
                        .ok_or_else(|| CommandError::handler(format!("no error with id '{id}'")))
                },
            )
            .add(ActionSpec::new("ClearErrorLogs"), |_, context, _| {
                let errors = &mut context.state().errors;
                let cleared = errors.len();
                errors.clear();
                Ok(json!({ "cleared": cleared }))
            });
    }
}
