//! The host thread's view of the engine.
//!
//! [`Host`] owns the engine and the dispatcher queue feeding it. Whoever
//! drives the host calls [`Host::tick`] periodically from a single thread;
//! connection threads and async operations only ever reach the engine
//! through the queue.

use std::io;

use camino::Utf8Path;
use scenebridge_config::Config;
use tracing::{info, warn};

use crate::dispatch::{DispatcherHandle, HostDispatcher};
use crate::engine::{Engine, EngineOptions};
use crate::registry::{CommandHandler, RegistrationError};
use crate::transport::CommandConnectionHandler;

const HOST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host");

/// Engine plus the queue that confines it to one thread.
#[derive(Debug)]
pub struct Host {
    config: Config,
    engine: Engine,
    dispatcher: HostDispatcher<Engine>,
}

impl Host {
    /// Builds a host with the built-in domains registered.
    ///
    /// # Errors
    ///
    /// Fails only if the built-in domains conflict.
    pub fn new(config: Config) -> Result<Self, RegistrationError> {
        let dispatcher = HostDispatcher::new();
        let engine = Engine::new(EngineOptions::from_config(&config), dispatcher.handle())?;
        Ok(Self {
            config,
            engine,
            dispatcher,
        })
    }

    /// Registers a domain handler.
    ///
    /// # Errors
    ///
    /// See [`Engine::register`].
    pub fn register<H: CommandHandler>(
        &mut self,
        domain: &str,
        handler: H,
    ) -> Result<(), RegistrationError> {
        self.engine.register(domain, handler)
    }

    /// Configuration the host was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The engine, for inspection between ticks.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The engine, mutably.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Handle for queueing work from other threads.
    #[must_use]
    pub fn dispatcher(&self) -> DispatcherHandle<Engine> {
        self.dispatcher.handle()
    }

    /// Connection handler serving this host's engine.
    #[must_use]
    pub fn connection_handler(&self) -> CommandConnectionHandler {
        CommandConnectionHandler::from_config(
            self.dispatcher.handle(),
            self.engine.operations().clone(),
            &self.config,
        )
    }

    /// Runs the work queued so far, then periodic housekeeping.
    ///
    /// Returns the number of work items run.
    pub fn tick(&mut self) -> usize {
        let ran = self.dispatcher.drain_once(&mut self.engine);
        self.engine.tick();
        ran
    }

    /// Stops accepting work and drops whatever is still queued.
    ///
    /// Threads waiting on dropped work are released with an error.
    pub fn close(&self) -> usize {
        self.dispatcher.close()
    }

    /// Writes the history to the configured file, if any.
    ///
    /// # Errors
    ///
    /// Returns any I/O failure while writing.
    pub fn flush_history(&self) -> io::Result<Option<&Utf8Path>> {
        let Some(path) = self.config.history_file() else {
            return Ok(None);
        };
        match self.engine.flush_history(path) {
            Ok(()) => {
                info!(
                    target: HOST_TARGET,
                    path = %path,
                    entries = self.engine.history().len(),
                    "history flushed"
                );
                Ok(Some(path))
            }
            Err(error) => {
                warn!(target: HOST_TARGET, path = %path, %error, "history flush failed");
                Err(error)
            }
        }
    }
}
