//! Failures raised while binding, serving or stopping the transport.

use std::io;
use std::time::Duration;

use scenebridge_config::SocketEndpoint;
use thiserror::Error;

/// Step of the leftover-socket check that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SocketProbe {
    /// Reading the file's metadata.
    Inspect,
    /// Connecting to see whether another host still owns it.
    Connect,
    /// Deleting the leftover file.
    Remove,
}

/// Errors from the transport server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The TCP host name did not resolve.
    #[error("cannot resolve {endpoint}: {source}")]
    Resolve {
        /// Requested endpoint.
        endpoint: SocketEndpoint,
        /// Resolver failure.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded with an empty address list.
    #[error("{endpoint} resolved to no addresses")]
    NoAddress {
        /// Requested endpoint.
        endpoint: SocketEndpoint,
    },
    /// The socket could not be bound.
    #[error("cannot listen on {endpoint}: {source}")]
    Bind {
        /// Requested endpoint.
        endpoint: SocketEndpoint,
        /// Bind failure.
        #[source]
        source: io::Error,
    },
    /// Unix sockets were requested on a platform without them.
    #[error("{endpoint} needs unix domain sockets, which this platform lacks")]
    UnixUnsupported {
        /// Requested endpoint.
        endpoint: SocketEndpoint,
    },
    /// A live host already answers on the socket path.
    #[error("{endpoint} is served by another process")]
    EndpointBusy {
        /// Requested endpoint.
        endpoint: SocketEndpoint,
    },
    /// Something other than a socket occupies the path.
    #[error("{endpoint} points at a file that is not a socket")]
    NotASocket {
        /// Requested endpoint.
        endpoint: SocketEndpoint,
    },
    /// The leftover socket file could not be checked or removed.
    #[error("stale socket at {endpoint}: {probe} failed: {source}")]
    StaleSocket {
        /// Requested endpoint.
        endpoint: SocketEndpoint,
        /// Step that failed.
        probe: SocketProbe,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be configured or spawned.
    #[error("cannot start the accept thread: {source}")]
    AcceptThread {
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("accept thread panicked")]
    AcceptPanicked,
    /// Connections outlived the shutdown grace period.
    #[error("{open} connections still open after {grace:?}")]
    GraceExceeded {
        /// Connections still registered.
        open: usize,
        /// Grace period that elapsed.
        grace: Duration,
    },
}
