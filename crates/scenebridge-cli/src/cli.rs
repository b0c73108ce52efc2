//! Command-line arguments of the `scenebridge` client.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use scenebridge_config::{Config, Framing, SocketEndpoint};
use scenebridge_protocol::{ClientOptions, CommandRequest};
use serde_json::{Map, Value};

use crate::AppError;

/// Sends one command to a scenebridge host and prints its response.
#[derive(Parser, Debug)]
#[command(name = "scenebridge", version)]
pub(crate) struct Cli {
    /// Configuration file read before `SCENEBRIDGE_*` variables.
    #[arg(long, value_name = "PATH")]
    pub(crate) config_path: Option<PathBuf>,
    /// Host endpoint such as `tcp://127.0.0.1:8080`; overrides configuration.
    #[arg(long, value_name = "URL")]
    pub(crate) endpoint: Option<SocketEndpoint>,
    /// Wire framing (`length_prefixed` or `document`); overrides
    /// configuration.
    #[arg(long, value_name = "FRAMING")]
    pub(crate) framing: Option<Framing>,
    /// Seconds to wait for the response.
    #[arg(long, value_name = "SECS")]
    pub(crate) timeout_secs: Option<u64>,
    /// Adds one parameter. The value is read as JSON when it parses and as a
    /// string otherwise.
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE")]
    pub(crate) params: Vec<String>,
    /// Prints the response on a single line.
    #[arg(long)]
    pub(crate) compact: bool,
    /// Command type, for example `scene.Create` or `heartbeat`.
    #[arg(value_name = "TYPE")]
    pub(crate) command_type: String,
    /// Parameters as a JSON object.
    #[arg(value_name = "PARAMETERS")]
    pub(crate) parameters: Option<String>,
}

impl Cli {
    /// Endpoint to connect to: the flag when given, else the configured one.
    pub(crate) fn endpoint(&self, config: &Config) -> SocketEndpoint {
        self.endpoint
            .clone()
            .unwrap_or_else(|| config.daemon_socket().clone())
    }

    /// Client options for a single exchange.
    pub(crate) fn client_options(&self, config: &Config) -> ClientOptions {
        let defaults = ClientOptions::default();
        ClientOptions {
            framing: self.framing.unwrap_or_else(|| config.framing()),
            io_timeout: self
                .timeout_secs
                .map_or(defaults.io_timeout, Duration::from_secs),
            reconnect_delay: Duration::from_millis(200),
            max_reconnect_attempts: 1,
            ..defaults
        }
    }

    /// Builds the request from the positional parameters and `--param`
    /// flags; flags win over keys of the JSON object.
    pub(crate) fn request(&self) -> Result<CommandRequest, AppError> {
        let mut parameters = match self.parameters.as_deref().map(str::trim) {
            None | Some("") => Map::new(),
            Some(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                Ok(other) => return Err(AppError::InvalidParameters(format!("found {other}"))),
                Err(error) => return Err(AppError::InvalidParameters(error.to_string())),
            },
        };
        for param in &self.params {
            let (key, value) = param
                .split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| AppError::InvalidParam(param.clone()))?;
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| Value::String(value.to_owned()));
            parameters.insert(key.to_owned(), value);
        }
        let parameters = if parameters.is_empty() {
            Value::Null
        } else {
            Value::Object(parameters)
        };
        Ok(CommandRequest::new(self.command_type.clone(), parameters))
    }
}
