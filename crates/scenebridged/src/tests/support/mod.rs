//! Shared fixtures for the behaviour suites.

mod host;
mod reporter;

use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use scenebridge_config::Config;
use scenebridge_protocol::{Client, CommandResponse};
use serde_json::{Value, json};

pub use self::host::{RunningHost, is_closed, read_response};
pub use self::reporter::{HealthEvent, RecordingReporter};

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Looks up a dotted path such as `errors.0.message` in `value`.
pub fn field<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let pointer = format!("/{}", path.replace('.', "/"));
    value.pointer(&pointer)
}

/// Scenario state: a host started on demand and one client talking to it.
#[derive(Default)]
pub struct HostWorld {
    config: Config,
    host: Option<RunningHost>,
    client: Option<Client>,
    raw: Option<TcpStream>,
    response: Option<CommandResponse>,
    operation_id: Option<String>,
}

impl HostWorld {
    /// Adjusts the configuration used when the host starts.
    pub fn configure(&mut self, adjust: impl FnOnce(&mut Config)) {
        assert!(self.host.is_none(), "configure the host before it starts");
        adjust(&mut self.config);
    }

    /// Starts the host if it is not running yet.
    pub fn host(&mut self) -> &RunningHost {
        self.host
            .get_or_insert_with(|| RunningHost::start(self.config.clone()))
    }

    /// Sends a command over the shared client and keeps the response.
    pub fn send(&mut self, command_type: &str, parameters: Value) -> CommandResponse {
        if self.client.is_none() {
            let client = self.host().client();
            self.client = Some(client);
        }
        let client = self.client.as_mut().expect("client");
        let response = client
            .send_command(command_type, parameters)
            .expect("send command");
        self.response = Some(response.clone());
        response
    }

    /// Frames `payload` in the host's framing and sends it on a dedicated
    /// connection.
    pub fn send_raw(&mut self, payload: &[u8]) {
        let frame = self.host().frame(payload);
        self.send_raw_bytes(&frame);
    }

    /// Writes `bytes` unframed on a dedicated connection and keeps the
    /// response.
    pub fn send_raw_bytes(&mut self, bytes: &[u8]) {
        let host = self.host();
        let mut stream = host.raw_stream();
        let response = host.raw_exchange(&mut stream, bytes);
        self.raw = Some(stream);
        self.response = Some(response);
    }

    /// The raw connection opened by [`HostWorld::send_raw`].
    pub fn raw_stream(&mut self) -> &mut TcpStream {
        self.raw.as_mut().expect("no raw connection was opened")
    }

    /// Drops the shared client; the next command opens a new connection.
    pub fn disconnect(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.disconnect();
        }
    }

    /// The most recent response.
    pub fn response(&self) -> &CommandResponse {
        self.response.as_ref().expect("no command was sent")
    }

    /// The result of the most recent response, which must have succeeded.
    pub fn result(&self) -> &Value {
        let response = self.response();
        response
            .result()
            .unwrap_or_else(|| panic!("expected success, got {response:?}"))
    }

    /// Remembers an operation started by the last response.
    pub fn remember_operation(&mut self) {
        let id = self
            .result()
            .get("operationId")
            .and_then(Value::as_str)
            .expect("operationId")
            .to_owned();
        self.operation_id = Some(id);
    }

    /// The remembered operation id.
    pub fn operation_id(&self) -> String {
        self.operation_id.clone().expect("no operation was started")
    }

    /// Fetches the remembered operation's status snapshot.
    pub fn operation_status(&mut self) -> Value {
        let id = self.operation_id();
        let response = self.send("async.GetStatus", json!({ "operation_id": id }));
        response.result().cloned().expect("operation status")
    }
}

impl Drop for HostWorld {
    fn drop(&mut self) {
        if let Some(client) = self.client.as_mut() {
            client.disconnect();
        }
        if let Some(host) = self.host.take() {
            drop(host.shutdown());
        }
    }
}
