//! Blocking client for the scenebridge command server.
//!
//! The client keeps one connection open across commands, sends a heartbeat
//! when the connection has been idle for a while, and reconnects with a
//! linearly growing delay when the host drops the connection.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use scenebridge_config::{DEFAULT_MAX_FRAME_BYTES, Framing, SocketEndpoint};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};

use crate::errors::ClientError;
use crate::framing::{FrameDecoder, write_frame};
use crate::request::CommandRequest;
use crate::response::CommandResponse;

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Tunables for [`Client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Wire framing spoken by the host.
    pub framing: Framing,
    /// Bound on establishing a connection.
    pub connect_timeout: Duration,
    /// Bound on each socket read or write.
    pub io_timeout: Duration,
    /// Idle time after which a heartbeat precedes the next command.
    pub heartbeat_interval: Duration,
    /// Base delay between reconnection attempts; attempt `n` waits `n` times
    /// this long.
    pub reconnect_delay: Duration,
    /// Attempts made by [`Client::reconnect`] before giving up.
    pub max_reconnect_attempts: u32,
    /// Largest response frame accepted.
    pub max_frame_bytes: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(15),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(2),
            max_reconnect_attempts: 5,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    fn set_timeouts(&self, timeout: Duration) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                stream.set_nodelay(true)
            }
            #[cfg(unix)]
            Self::Unix(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))
            }
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Persistent connection to a command host.
pub struct Client {
    endpoint: SocketEndpoint,
    options: ClientOptions,
    connection: Option<Connection>,
    decoder: FrameDecoder,
    last_activity: Instant,
}

impl Client {
    /// Connects with default options.
    ///
    /// # Errors
    ///
    /// Returns an error when the endpoint cannot be resolved or reached.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, ClientError> {
        Self::connect_with(endpoint, ClientOptions::default())
    }

    /// Connects with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error when the endpoint cannot be resolved or reached.
    pub fn connect_with(
        endpoint: &SocketEndpoint,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let connection = open(endpoint, &options)?;
        info!(target: CLIENT_TARGET, %endpoint, "connected to host");
        Ok(Self {
            endpoint: endpoint.clone(),
            decoder: FrameDecoder::new(options.framing, options.max_frame_bytes),
            options,
            connection: Some(connection),
            last_activity: Instant::now(),
        })
    }

    /// Endpoint this client talks to.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Whether a connection is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Sends a command built from a type and parameters.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub fn send_command(
        &mut self,
        command_type: &str,
        parameters: Value,
    ) -> Result<CommandResponse, ClientError> {
        self.send(&CommandRequest::new(command_type, parameters))
    }

    /// Sends one request and waits for its response.
    ///
    /// An idle connection is refreshed with a heartbeat first. When the host
    /// has dropped the connection the client reconnects and retries once.
    /// Any other transport failure closes the connection, so a response
    /// that arrives late is never read as the answer to a later request;
    /// the next call reconnects.
    ///
    /// # Errors
    ///
    /// Returns transport, framing and parse failures, or
    /// [`ClientError::ReconnectExhausted`] when the host stays unreachable.
    pub fn send(&mut self, request: &CommandRequest) -> Result<CommandResponse, ClientError> {
        if self.connection.is_none() {
            self.reconnect()?;
        }
        if self.last_activity.elapsed() >= self.options.heartbeat_interval {
            match self.round_trip(&heartbeat_request()) {
                Ok(_) => {}
                Err(error) if error.is_connection_lost() => {
                    debug!(target: CLIENT_TARGET, %error, "idle connection dropped by host");
                    self.reconnect()?;
                }
                Err(error) => return Err(error),
            }
        }

        match self.round_trip(request) {
            Err(error) if error.is_connection_lost() => {
                warn!(target: CLIENT_TARGET, %error, "connection lost; reconnecting");
                self.reconnect()?;
                self.round_trip(request)
            }
            outcome => outcome,
        }
    }

    /// Sends `core.heartbeat`.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub fn heartbeat(&mut self) -> Result<CommandResponse, ClientError> {
        self.send(&heartbeat_request())
    }

    /// Drops the current connection and connects again.
    ///
    /// Attempt `n` (starting at 1) first waits `n * reconnect_delay`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ReconnectExhausted`] after
    /// `max_reconnect_attempts` failures.
    pub fn reconnect(&mut self) -> Result<(), ClientError> {
        self.disconnect();
        for attempt in 1..=self.options.max_reconnect_attempts {
            thread::sleep(self.options.reconnect_delay.saturating_mul(attempt));
            match open(&self.endpoint, &self.options) {
                Ok(connection) => {
                    info!(target: CLIENT_TARGET, attempt, "reconnected to host");
                    self.connection = Some(connection);
                    self.last_activity = Instant::now();
                    return Ok(());
                }
                Err(error) => {
                    warn!(
                        target: CLIENT_TARGET,
                        attempt,
                        max_attempts = self.options.max_reconnect_attempts,
                        %error,
                        "reconnection attempt failed"
                    );
                }
            }
        }
        Err(ClientError::ReconnectExhausted {
            attempts: self.options.max_reconnect_attempts,
        })
    }

    /// Closes the connection.
    pub fn disconnect(&mut self) {
        self.connection = None;
        self.decoder = FrameDecoder::new(self.options.framing, self.options.max_frame_bytes);
    }

    fn round_trip(&mut self, request: &CommandRequest) -> Result<CommandResponse, ClientError> {
        let outcome = self.exchange(request);
        if let Err(error) = &outcome
            && error.poisons_connection()
        {
            debug!(target: CLIENT_TARGET, %error, "discarding connection");
            self.disconnect();
        }
        outcome
    }

    fn exchange(&mut self, request: &CommandRequest) -> Result<CommandResponse, ClientError> {
        let payload = serde_json::to_vec(request).map_err(ClientError::Serialise)?;
        let framing = self.options.framing;
        let connection = self.connection.as_mut().ok_or(ClientError::Closed)?;
        write_frame(connection, framing, &payload).map_err(ClientError::Send)?;

        let mut chunk = [0_u8; 4096];
        let frame = loop {
            if let Some(frame) = self.decoder.next_frame()? {
                break frame;
            }
            let read = match connection.read(&mut chunk) {
                Ok(0) => return Err(ClientError::Closed),
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(ClientError::Receive(error)),
            };
            self.decoder.push(chunk.get(..read).unwrap_or_default());
        };
        self.last_activity = Instant::now();
        serde_json::from_slice(&frame).map_err(ClientError::Parse)
    }
}

fn heartbeat_request() -> CommandRequest {
    CommandRequest::new("core.heartbeat", json!({}))
}

fn open(endpoint: &SocketEndpoint, options: &ClientOptions) -> Result<Connection, ClientError> {
    let connection = match endpoint {
        SocketEndpoint::Tcp { host, port } => {
            let address = resolve_tcp_address(host, *port).map_err(|source| {
                ClientError::Resolve {
                    endpoint: endpoint.to_string(),
                    source,
                }
            })?;
            TcpStream::connect_timeout(&address, options.connect_timeout)
                .map(Connection::Tcp)
                .map_err(|source| ClientError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })?
        }
        SocketEndpoint::Unix { path } => {
            #[cfg(unix)]
            {
                connect_unix(path.as_str(), options.connect_timeout).map_err(|source| {
                    ClientError::Connect {
                        endpoint: endpoint.to_string(),
                        source,
                    }
                })?
            }

            #[cfg(not(unix))]
            {
                let _ = path;
                return Err(ClientError::UnsupportedUnixTransport(endpoint.to_string()));
            }
        }
    };
    connection
        .set_timeouts(options.io_timeout)
        .map_err(|source| ClientError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;
    Ok(connection)
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

#[cfg(unix)]
fn connect_unix(path: &str, timeout: Duration) -> io::Result<Connection> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, timeout)?;
    let stream: UnixStream = socket.into();
    Ok(Connection::Unix(stream))
}
