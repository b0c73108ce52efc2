//! Accept thread: polls a nonblocking socket and hands each connection to
//! its own thread.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use scenebridge_config::SocketEndpoint;
use tracing::{debug, info, warn};

use super::errors::SocketProbe;
use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, TransportError};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

/// Sleep between polls when nothing is waiting.
const IDLE_POLL: Duration = Duration::from_millis(25);
/// Sleep after an accept error.
const ERROR_POLL: Duration = Duration::from_millis(150);

/// Bound socket of either family.
#[derive(Debug)]
enum Acceptor {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Acceptor {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// Next pending connection, switched back to blocking mode.
    fn poll(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Socket bound to an endpoint but not yet accepting.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    acceptor: Acceptor,
}

impl SocketListener {
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, TransportError> {
        let acceptor = match endpoint {
            SocketEndpoint::Tcp { host, port } => Acceptor::Tcp(bind_tcp(endpoint, host, *port)?),
            #[cfg(unix)]
            SocketEndpoint::Unix { .. } => Acceptor::Unix(bind_unix(endpoint)?),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(TransportError::UnixUnsupported {
                    endpoint: endpoint.clone(),
                });
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            acceptor,
        })
    }

    /// Bound TCP address, with port 0 resolved to the assigned port.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match &self.acceptor {
            Acceptor::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Acceptor::Unix(_) => None,
        }
    }

    /// Moves the socket onto the accept thread.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, TransportError> {
        if let Err(source) = self.acceptor.set_nonblocking() {
            self.remove_socket_file();
            return Err(TransportError::AcceptThread { source });
        }
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("scenebridge-accept".to_owned())
            .spawn(move || self.accept_until(&flag, &handler))
            .map_err(|source| TransportError::AcceptThread { source })?;
        Ok(ListenerHandle {
            stop,
            thread: Some(thread),
        })
    }

    fn accept_until(self, stop: &AtomicBool, handler: &Arc<dyn ConnectionHandler>) {
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "accepting connections");
        let mut reported = None::<io::ErrorKind>;
        while !stop.load(Ordering::SeqCst) {
            match self.acceptor.poll() {
                Ok(Some(stream)) => {
                    reported = None;
                    spawn_connection(stream, handler);
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    // Repeated failures of one kind are logged once.
                    if reported.replace(error.kind()) != Some(error.kind()) {
                        warn!(target: LISTENER_TARGET, %error, "accept failed");
                    }
                    thread::sleep(ERROR_POLL);
                }
            }
        }
        self.remove_socket_file();
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "no longer accepting");
    }

    #[cfg(unix)]
    fn remove_socket_file(&self) {
        if let Some(path) = self.endpoint.unix_path()
            && let Err(error) = fs::remove_file(path.as_std_path())
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(target: LISTENER_TARGET, %error, %path, "socket file left behind");
        }
    }

    #[cfg(not(unix))]
    #[expect(clippy::unused_self, reason = "only unix sockets leave a file behind")]
    fn remove_socket_file(&self) {}
}

fn spawn_connection(stream: ConnectionStream, handler: &Arc<dyn ConnectionHandler>) {
    let handler = Arc::clone(handler);
    let spawned = thread::Builder::new()
        .name("scenebridge-connection".to_owned())
        .spawn(move || handler.handle(stream));
    match spawned {
        Ok(_) => debug!(target: LISTENER_TARGET, "connection accepted"),
        Err(error) => warn!(target: LISTENER_TARGET, %error, "connection thread not started"),
    }
}

/// Owner of the running accept thread.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    pub(crate) fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub(crate) fn join(mut self) -> Result<(), TransportError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| TransportError::AcceptPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn bind_tcp(
    endpoint: &SocketEndpoint,
    host: &str,
    port: u16,
) -> Result<TcpListener, TransportError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            endpoint: endpoint.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| TransportError::NoAddress {
            endpoint: endpoint.clone(),
        })?;
    TcpListener::bind(addr).map_err(|source| TransportError::Bind {
        endpoint: endpoint.clone(),
        source,
    })
}

/// Binds a unix socket, first removing a file left by a host that exited
/// without cleaning up. A file that still accepts connections is refused.
#[cfg(unix)]
fn bind_unix(endpoint: &SocketEndpoint) -> Result<UnixListener, TransportError> {
    let Some(path) = endpoint.unix_path() else {
        return Err(TransportError::UnixUnsupported {
            endpoint: endpoint.clone(),
        });
    };
    let path = path.as_std_path();
    let stale = |probe, source| TransportError::StaleSocket {
        endpoint: endpoint.clone(),
        probe,
        source,
    };

    match fs::symlink_metadata(path) {
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(stale(SocketProbe::Inspect, error)),
        Ok(metadata) if !metadata.file_type().is_socket() => {
            return Err(TransportError::NotASocket {
                endpoint: endpoint.clone(),
            });
        }
        Ok(_) => match UnixStream::connect(path) {
            Ok(_) => {
                return Err(TransportError::EndpointBusy {
                    endpoint: endpoint.clone(),
                });
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                debug!(target: LISTENER_TARGET, %endpoint, "removing stale socket file");
                fs::remove_file(path).map_err(|error| stale(SocketProbe::Remove, error))?;
            }
            Err(error) => return Err(stale(SocketProbe::Connect, error)),
        },
    }

    UnixListener::bind(path).map_err(|source| TransportError::Bind {
        endpoint: endpoint.clone(),
        source,
    })
}
