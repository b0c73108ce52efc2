//! The command execution engine owned by the host thread.
//!
//! [`Engine`] ties the registry to the session, history, metrics and error
//! log. Requests reach it as [`HostDispatcher`](crate::dispatch::HostDispatcher)
//! work items, so every method here runs on the host thread. Two entry
//! points sit beside the registered domains: `batch` runs several commands
//! as one request, and `async` hands a command to the operation manager.

mod batch;
mod builtins;
mod executor;

use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use scenebridge_config::Config;
use scenebridge_protocol::{CommandName, CommandRequest, CommandResponse, DOMAIN_SEPARATOR};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::diagnostics::ErrorLog;
use crate::dispatch::DispatcherHandle;
use crate::history::{History, HistoryEntry};
use crate::metrics::CommandMetrics;
use crate::operations::{
    ASYNC_DOMAIN, OperationHandle, OperationJob, OperationLimits, OperationManager,
    OperationOutcome, async_actions,
};
use crate::registry::{
    ActionContext, ActionSpec, CommandError, CommandHandler, DomainDescriptor, RegistrationError,
    Router,
};
use crate::session::SessionContext;

pub use self::batch::{BATCH_DOMAIN, batch_actions};

/// Tracing target for engine activity.
pub(crate) const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");

/// Synchronous commands slower than this are logged as warnings.
pub const SLOW_COMMAND_THRESHOLD: Duration = Duration::from_secs(1);

/// Tunables for an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// History ring-buffer capacity.
    pub history_capacity: usize,
    /// Maximum commands in one batch.
    pub batch_size_limit: usize,
    /// Async operation bounds.
    pub operations: OperationLimits,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            history_capacity: scenebridge_config::DEFAULT_HISTORY_CAPACITY,
            batch_size_limit: scenebridge_config::DEFAULT_BATCH_SIZE_LIMIT,
            operations: OperationLimits::default(),
        }
    }
}

impl EngineOptions {
    /// Derives engine options from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            history_capacity: config.history_capacity(),
            batch_size_limit: config.batch_size_limit(),
            operations: OperationLimits {
                max_live: config.max_async_operations(),
                timeout: config.async_timeout(),
                retention: config.operation_retention(),
            },
        }
    }
}

/// Host-thread state reachable from action bodies.
#[derive(Debug)]
pub struct EngineState {
    pub(crate) session: SessionContext,
    pub(crate) history: History,
    pub(crate) metrics: CommandMetrics,
    pub(crate) errors: ErrorLog,
    pub(crate) catalogue: Vec<DomainDescriptor>,
    pub(crate) started: Instant,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(scenebridge_config::DEFAULT_HISTORY_CAPACITY)
    }
}

impl EngineState {
    /// Fresh state with an empty history of the given capacity.
    #[must_use]
    pub fn new(history_capacity: usize) -> Self {
        Self {
            session: SessionContext::new(),
            history: History::new(history_capacity),
            metrics: CommandMetrics::default(),
            errors: ErrorLog::default(),
            catalogue: Vec::new(),
            started: Instant::now(),
        }
    }

    pub(crate) fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Builds the response sent for an outcome.
#[must_use]
pub fn respond(outcome: &Result<Value, CommandError>) -> CommandResponse {
    match outcome {
        Ok(result) => CommandResponse::success(result.clone()),
        Err(error) => CommandResponse::error(error.to_string()),
    }
}

/// Registry, state and entry points of one running host.
#[derive(Debug)]
pub struct Engine {
    router: Router,
    state: EngineState,
    operations: OperationManager,
    options: EngineOptions,
}

impl Engine {
    /// Creates an engine with the built-in domains registered.
    ///
    /// Async operations are executed by queueing work on `dispatcher`.
    ///
    /// # Errors
    ///
    /// Fails only if the built-in domains conflict, which indicates a bug.
    pub fn new(
        options: EngineOptions,
        dispatcher: DispatcherHandle<Self>,
    ) -> Result<Self, RegistrationError> {
        let operations = OperationManager::new(Arc::new(dispatcher), options.operations);
        let mut engine = Self {
            router: Router::new(),
            state: EngineState::new(options.history_capacity),
            operations,
            options,
        };
        builtins::register(&mut engine)?;
        Ok(engine)
    }

    /// Registers a domain handler.
    ///
    /// # Errors
    ///
    /// Fails when the domain is taken (including the reserved `batch` and
    /// `async` entry points) or the handler's declarations are invalid.
    pub fn register<H: CommandHandler>(
        &mut self,
        domain: &str,
        handler: H,
    ) -> Result<(), RegistrationError> {
        if domain.eq_ignore_ascii_case(BATCH_DOMAIN) || domain.eq_ignore_ascii_case(ASYNC_DOMAIN) {
            return Err(RegistrationError::DuplicateDomain {
                domain: domain.to_owned(),
            });
        }
        self.router.register(domain, handler)?;
        self.refresh_catalogue();
        Ok(())
    }

    fn refresh_catalogue(&mut self) {
        let mut catalogue = self.router.catalogue();
        for (domain, actions) in [
            (BATCH_DOMAIN, batch_actions()),
            (ASYNC_DOMAIN, async_actions()),
        ] {
            catalogue.push(DomainDescriptor {
                domain: domain.to_owned(),
                actions: actions.iter().map(ActionSpec::descriptor).collect(),
            });
        }
        self.state.catalogue = catalogue;
    }

    /// Shared operation table.
    #[must_use]
    pub fn operations(&self) -> &OperationManager {
        &self.operations
    }

    /// Session state.
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.state.session
    }

    /// Executed command log.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.state.history
    }

    /// Per command-type timings.
    #[must_use]
    pub fn metrics(&self) -> &CommandMetrics {
        &self.state.metrics
    }

    /// Recent failures.
    #[must_use]
    pub fn errors(&self) -> &ErrorLog {
        &self.state.errors
    }

    /// Every domain and action, including the entry points.
    #[must_use]
    pub fn catalogue(&self) -> &[DomainDescriptor] {
        &self.state.catalogue
    }

    /// Configured options.
    #[must_use]
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Handles one framed request document.
    pub fn handle_frame(&mut self, frame: &[u8]) -> CommandResponse {
        match CommandRequest::parse(frame) {
            Ok(request) => self.handle_request(&request),
            Err(error) => {
                let error = CommandError::from(error);
                warn!(target: ENGINE_TARGET, %error, "malformed request");
                self.state
                    .errors
                    .record(&error, json!({"frameBytes": frame.len()}));
                respond(&Err(error))
            }
        }
    }

    /// Executes one top-level request and records it.
    pub fn handle_request(&mut self, request: &CommandRequest) -> CommandResponse {
        let started = Instant::now();
        let outcome = self.execute(request, None);
        let elapsed = started.elapsed();
        if elapsed > SLOW_COMMAND_THRESHOLD {
            warn!(
                target: ENGINE_TARGET,
                command = %request.command_type,
                elapsed_ms = elapsed.as_millis(),
                "slow command blocked the host thread"
            );
        }
        self.record(request, &outcome, elapsed, Value::Null);
        respond(&outcome)
    }

    /// Records a request that was executed off the host thread.
    pub fn record_external(
        &mut self,
        request: &CommandRequest,
        outcome: &Result<Value, CommandError>,
        elapsed: Duration,
    ) {
        self.record(request, outcome, elapsed, Value::Null);
    }

    /// Runs an async operation's command; called on the host thread.
    pub fn run_operation(&mut self, job: OperationJob) -> OperationOutcome {
        if job.handle.is_cancelled() {
            return Err(CommandError::Cancelled);
        }
        let request = CommandRequest::new(job.command_type, job.parameters);
        let started = Instant::now();
        let outcome = self.execute(&request, Some(&job.handle));
        self.record(
            &request,
            &outcome,
            started.elapsed(),
            json!({"operationId": job.handle.id()}),
        );
        outcome
    }

    /// Logs a failure that never reached command execution, such as a
    /// rejected frame, and returns its error id.
    pub fn record_error(&mut self, error: &CommandError, context: Value) -> String {
        self.state.errors.record(error, context)
    }

    /// Periodic housekeeping; call once per host tick.
    pub fn tick(&mut self) {
        self.operations.sweep();
    }

    /// Writes the history to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns any I/O failure.
    pub fn flush_history(&self, path: &Utf8Path) -> std::io::Result<()> {
        self.state.history.write_json(path)
    }

    /// Resolves and runs a command without recording it.
    pub(crate) fn execute(
        &mut self,
        request: &CommandRequest,
        operation: Option<&OperationHandle>,
    ) -> Result<Value, CommandError> {
        let name = request.name()?;
        let parameters = request.parameter_map()?;
        debug!(
            target: ENGINE_TARGET,
            domain = name.domain(),
            action = name.action(),
            "executing command"
        );
        if name.is_domain(BATCH_DOMAIN) {
            return self.execute_batch(&name, &parameters, operation);
        }
        if name.is_domain(ASYNC_DOMAIN) {
            return self.operations.execute_action(name.action(), &parameters);
        }
        let mut context = ActionContext::new(&mut self.state, operation);
        self.router.dispatch(&name, &parameters, &mut context)
    }

    fn record(
        &mut self,
        request: &CommandRequest,
        outcome: &Result<Value, CommandError>,
        elapsed: Duration,
        context: Value,
    ) {
        let command_type = request.command_type.trim();
        let key = metrics_key(&self.router, request);
        self.state.metrics.record(&key, elapsed);
        if let Err(error) = outcome {
            warn!(target: ENGINE_TARGET, command = command_type, %error, "command failed");
            let mut details = json!({"commandType": command_type});
            if let (Value::Object(details), Value::Object(extra)) = (&mut details, context) {
                details.extend(extra);
            }
            self.state.errors.record(error, details);
        }
        self.state.history.record(HistoryEntry::new(
            command_type,
            request.parameters.clone(),
            respond(outcome),
            elapsed,
        ));
    }
}

/// Key a request's timings are recorded under.
///
/// Every spelling of a registered action shares the registered
/// `domain.action`; other names keep their action as written.
fn metrics_key(router: &Router, request: &CommandRequest) -> String {
    match request.name() {
        Ok(name) => router.canonical_name(&name).unwrap_or_else(|| {
            format!(
                "{}{DOMAIN_SEPARATOR}{}",
                name.domain().to_ascii_lowercase(),
                name.action()
            )
        }),
        Err(_) => request.command_type.trim().to_owned(),
    }
}

/// Name of a request in the `async` domain, if it is one.
///
/// Such requests never touch host state and may be answered off the host
/// thread.
#[must_use]
pub fn async_command_name(request: &CommandRequest) -> Option<CommandName> {
    request
        .name()
        .ok()
        .filter(|name| name.is_domain(ASYNC_DOMAIN))
}
