use super::*;

use std::cell::RefCell;
use std::io::{self, Read};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use rstest::{fixture, rstest};
use rstest_bdd_macros::{given, scenario, then, when};
use scenebridge_config::{Config, Framing, SocketEndpoint};
use scenebridge_protocol::{CommandRequest, FrameDecoder, write_frame};
use serde_json::{Value, json};

struct StaticConfigLoader {
    config: Config,
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _config_path: Option<&Path>) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Answers a single request with a canned response.
struct FakeHost {
    port: u16,
    requests: Arc<Mutex<Vec<CommandRequest>>>,
    result: Arc<Mutex<Option<Result<()>>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeHost {
    const ACCEPT_DEADLINE: Duration = Duration::from_secs(2);

    fn spawn(response: CommandResponse) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake host")?;
        listener
            .set_nonblocking(true)
            .context("make fake host non-blocking")?;
        let port = listener.local_addr().context("fake host address")?.port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let result = Arc::new(Mutex::new(None));
        let (recorded, outcome_slot) = (Arc::clone(&requests), Arc::clone(&result));
        let handle = thread::spawn(move || {
            let outcome = Self::serve(&listener, &response, &recorded);
            if let Ok(mut slot) = outcome_slot.lock() {
                *slot = Some(outcome);
            }
        });
        Ok(Self {
            port,
            requests,
            result,
            handle: Some(handle),
        })
    }

    fn serve(
        listener: &TcpListener,
        response: &CommandResponse,
        requests: &Mutex<Vec<CommandRequest>>,
    ) -> Result<()> {
        let deadline = Instant::now() + Self::ACCEPT_DEADLINE;
        let mut stream = loop {
            match listener.accept() {
                Ok((stream, _)) => break stream,
                Err(ref error)
                    if error.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline =>
                {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(error) => return Err(error).context("accept connection"),
            }
        };
        stream
            .set_nonblocking(false)
            .context("make connection blocking")?;
        let Some(frame) = Self::read_request(&mut stream)? else {
            return Ok(());
        };
        let request = CommandRequest::parse(&frame).context("parse request")?;
        requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?
            .push(request);
        write_frame(&mut stream, Framing::LengthPrefixed, &response.to_bytes())
            .context("write response")
    }

    fn read_request(stream: &mut TcpStream) -> Result<Option<Vec<u8>>> {
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 1 << 20);
        let mut chunk = [0_u8; 4096];
        loop {
            if let Some(frame) = decoder.next_frame().context("decode request")? {
                return Ok(Some(frame));
            }
            let read = stream.read(&mut chunk).context("read request")?;
            if read == 0 {
                return Ok(None);
            }
            decoder.push(chunk.get(..read).unwrap_or_default());
        }
    }

    /// Waits for the host thread and returns every recorded request.
    fn take_requests(&mut self) -> Result<Vec<CommandRequest>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("fake host thread panicked"))?;
        }
        if let Some(outcome) = self
            .result
            .lock()
            .map_err(|error| anyhow!("lock fake host result: {error}"))?
            .take()
        {
            outcome.context("fake host failed")?;
        }
        let requests = self
            .requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?;
        Ok(requests.clone())
    }
}

#[derive(Default)]
struct TestWorld {
    config: Config,
    host: Option<FakeHost>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<ExitCode>,
    requests: Vec<CommandRequest>,
}

impl TestWorld {
    fn start_host(&mut self, response: CommandResponse) {
        let host = FakeHost::spawn(response).expect("spawn fake host");
        self.config.daemon_socket = SocketEndpoint::tcp("127.0.0.1", host.port);
        self.host = Some(host);
    }

    fn host_endpoint(&self) -> String {
        let host = self.host.as_ref().expect("fake host running");
        format!("tcp://127.0.0.1:{}", host.port)
    }

    fn run(&mut self, command: &str) {
        self.stdout.clear();
        self.stderr.clear();
        let mut args = vec![OsString::from("scenebridge")];
        args.extend(command.split_whitespace().map(OsString::from));
        let loader = StaticConfigLoader {
            config: self.config.clone(),
        };
        let exit = run_with_loader(args, &mut self.stdout, &mut self.stderr, &loader);
        self.exit_code = Some(exit);
        if let Some(host) = self.host.as_mut() {
            self.requests = host.take_requests().expect("fake host requests");
        }
    }

    fn stdout_text(&self) -> String {
        String::from_utf8(self.stdout.clone()).expect("stdout utf8")
    }

    fn stderr_text(&self) -> String {
        String::from_utf8(self.stderr.clone()).expect("stderr utf8")
    }

    fn only_request(&self) -> &CommandRequest {
        assert_eq!(self.requests.len(), 1, "expected a single request");
        &self.requests[0]
    }
}

#[fixture]
fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}

#[given("a fake host answering {response}")]
fn given_fake_host(world: &RefCell<TestWorld>, response: String) {
    let response: CommandResponse = serde_json::from_str(&response).expect("response JSON");
    world.borrow_mut().start_host(response);
}

#[given("the configured endpoint is unreachable")]
fn given_unreachable(world: &RefCell<TestWorld>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("reserve port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    world.borrow_mut().config.daemon_socket = SocketEndpoint::tcp("127.0.0.1", port);
}

#[when("the operator runs {command}")]
fn when_operator_runs(world: &RefCell<TestWorld>, command: String) {
    world.borrow_mut().run(&command);
}

#[given("the configuration points elsewhere")]
fn given_configuration_elsewhere(world: &RefCell<TestWorld>) {
    world.borrow_mut().config.daemon_socket = SocketEndpoint::tcp("127.0.0.1", 9);
}

#[when("the operator targets the fake host with {command}")]
fn when_operator_targets_host(world: &RefCell<TestWorld>, command: String) {
    let mut world = world.borrow_mut();
    let endpoint = world.host_endpoint();
    world.run(&format!("--endpoint {endpoint} {command}"));
}

#[then("the host receives {command_type} with {parameters}")]
fn then_host_receives(world: &RefCell<TestWorld>, command_type: String, parameters: String) {
    let world = world.borrow();
    let request = world.only_request();
    let expected: Value = serde_json::from_str(&parameters).expect("parameters JSON");
    assert_eq!(request.command_type, command_type);
    assert_eq!(request.parameters, expected);
}

#[then("stdout contains {snippet}")]
fn then_stdout_contains(world: &RefCell<TestWorld>, snippet: String) {
    let stdout = world.borrow().stdout_text();
    assert!(stdout.contains(&snippet), "stdout {stdout:?} lacks {snippet:?}");
}

#[then("stderr contains {snippet}")]
fn then_stderr_contains(world: &RefCell<TestWorld>, snippet: String) {
    let stderr = world.borrow().stderr_text();
    assert!(stderr.contains(&snippet), "stderr {stderr:?} lacks {snippet:?}");
}

#[then("the CLI exits with code {status}")]
fn then_exit_code(world: &RefCell<TestWorld>, status: u8) {
    let exit = world.borrow().exit_code.expect("exit code recorded");
    assert_eq!(exit, ExitCode::from(status));
}

#[scenario(
    path = "tests/features/scenebridge_cli.feature",
    name = "A successful command prints the response"
)]
fn successful_command(#[from(world)] world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/scenebridge_cli.feature",
    name = "An error response sets the exit code"
)]
fn error_response(#[from(world)] world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/scenebridge_cli.feature",
    name = "Parameter flags extend the JSON parameters"
)]
fn parameter_flags(#[from(world)] world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/scenebridge_cli.feature",
    name = "The endpoint flag overrides configuration"
)]
fn endpoint_flag(#[from(world)] world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/scenebridge_cli.feature",
    name = "Parameters that are not an object are rejected"
)]
fn invalid_parameters(#[from(world)] world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/scenebridge_cli.feature",
    name = "An unreachable host is reported"
)]
fn unreachable_host(#[from(world)] world: RefCell<TestWorld>) {
    let _ = world;
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("scenebridge").chain(args.iter().copied()))
        .expect("parse arguments")
}

#[rstest]
#[case::no_parameters(&["ping"], Value::Null)]
#[case::json(&["scene.Get", r#"{"name":"Cube"}"#], json!({"name": "Cube"}))]
#[case::flag_wins(
    &["scene.Get", r#"{"name":"Cube"}"#, "--param", "name=Cone"],
    json!({"name": "Cone"})
)]
#[case::typed_flag(&["tasks.Sleep", "-p", "millis=5"], json!({"millis": 5}))]
fn builds_request_parameters(#[case] args: &[&str], #[case] expected: Value) {
    let request = cli(args).request().expect("request");
    assert_eq!(request.parameters, expected);
}

#[test]
fn rejects_params_without_a_key() {
    let error = cli(&["ping", "--param", "=1"]).request().expect_err("bad param");
    assert!(matches!(error, AppError::InvalidParam(_)));
}

#[test]
fn flags_override_configured_transport() {
    let config = Config {
        framing: Framing::LengthPrefixed,
        ..Config::default()
    };
    let cli = cli(&[
        "--endpoint",
        "tcp://10.0.0.1:9000",
        "--framing",
        "document",
        "ping",
    ]);
    assert_eq!(cli.endpoint(&config), SocketEndpoint::tcp("10.0.0.1", 9000));
    assert_eq!(cli.client_options(&config).framing, Framing::Document);
}

#[test]
fn help_goes_to_stdout() {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let loader = StaticConfigLoader {
        config: Config::default(),
    };
    let exit = run_with_loader(
        [OsString::from("scenebridge"), OsString::from("--help")],
        &mut stdout,
        &mut stderr,
        &loader,
    );
    assert_eq!(exit, ExitCode::SUCCESS);
    assert!(String::from_utf8_lossy(&stdout).contains("Usage"));
    assert!(stderr.is_empty());
}
