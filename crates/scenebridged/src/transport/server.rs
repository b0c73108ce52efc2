//! Listener plus connection bookkeeping with a bounded stop.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use scenebridge_config::SocketEndpoint;
use tracing::{info, warn};

use super::listener::{ListenerHandle, SocketListener};
use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, TransportError};

const STOP_POLL: Duration = Duration::from_millis(10);

/// Open connections, kept so `stop` can close them.
#[derive(Debug, Default)]
struct ConnectionTracker {
    next_id: AtomicU64,
    streams: Mutex<HashMap<u64, ConnectionStream>>,
}

impl ConnectionTracker {
    fn streams(&self) -> MutexGuard<'_, HashMap<u64, ConnectionStream>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, stream: &ConnectionStream) -> Option<u64> {
        match stream.try_clone() {
            Ok(clone) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                self.streams().insert(id, clone);
                Some(id)
            }
            Err(error) => {
                warn!(target: LISTENER_TARGET, %error, "connection will not be tracked");
                None
            }
        }
    }

    fn close(&self, id: u64) {
        self.streams().remove(&id);
    }

    fn len(&self) -> usize {
        self.streams().len()
    }

    fn is_empty(&self) -> bool {
        self.streams().is_empty()
    }

    fn shutdown_all(&self) {
        for stream in self.streams().values() {
            if let Err(error) = stream.shutdown() {
                warn!(target: LISTENER_TARGET, %error, "failed to close connection");
            }
        }
    }
}

struct TrackedHandler {
    inner: Arc<dyn ConnectionHandler>,
    tracker: Arc<ConnectionTracker>,
}

impl ConnectionHandler for TrackedHandler {
    fn handle(&self, stream: ConnectionStream) {
        let id = self.tracker.open(&stream);
        self.inner.handle(stream);
        if let Some(id) = id {
            self.tracker.close(id);
        }
    }
}

/// Accepts connections on a background thread and serves each on its own
/// thread.
///
/// ```ignore
/// let mut server = TransportServer::start(&endpoint, handler, grace)?;
/// assert!(server.is_running());
/// server.stop()?;
/// ```
#[derive(Debug)]
pub struct TransportServer {
    endpoint: SocketEndpoint,
    local_addr: Option<SocketAddr>,
    listener: Option<ListenerHandle>,
    connections: Arc<ConnectionTracker>,
    grace: Duration,
}

impl TransportServer {
    /// Binds `endpoint` and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the endpoint cannot be bound.
    pub fn start(
        endpoint: &SocketEndpoint,
        handler: Arc<dyn ConnectionHandler>,
        grace: Duration,
    ) -> Result<Self, TransportError> {
        let listener = SocketListener::bind(endpoint)?;
        let local_addr = listener.local_addr();
        let connections = Arc::new(ConnectionTracker::default());
        let tracked = Arc::new(TrackedHandler {
            inner: handler,
            tracker: Arc::clone(&connections),
        });
        let listener = listener.start(tracked)?;
        Ok(Self {
            endpoint: endpoint.clone(),
            local_addr,
            listener: Some(listener),
            connections,
            grace,
        })
    }

    /// Endpoint as configured.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Bound TCP address; `None` for Unix sockets.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Whether the listener is accepting connections.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    /// Connections currently being served.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Closes the listener and every open connection, then waits up to the
    /// grace period for connection threads to finish.
    ///
    /// Stopping a stopped server does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AcceptPanicked`] when the accept thread
    /// panicked and [`TransportError::GraceExceeded`] when
    /// connections outlive the grace period.
    pub fn stop(&mut self) -> Result<(), TransportError> {
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };
        listener.shutdown();
        let joined = listener.join();

        self.connections.shutdown_all();
        let deadline = Instant::now() + self.grace;
        while !self.connections.is_empty() && Instant::now() < deadline {
            thread::sleep(STOP_POLL);
        }
        joined?;

        let open = self.connections.len();
        if open > 0 {
            return Err(TransportError::GraceExceeded {
                open,
                grace: self.grace,
            });
        }
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "transport stopped");
        Ok(())
    }
}

impl Drop for TransportServer {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            warn!(target: LISTENER_TARGET, %error, "transport did not stop cleanly");
        }
    }
}
