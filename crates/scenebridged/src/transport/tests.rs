//! Tests for the listener and transport server.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};
use scenebridge_config::{Config, SocketEndpoint};
use scenebridge_protocol::{CommandRequest, CommandResponse, FrameDecoder, encode_frame};

use crate::host::Host;

use super::listener::SocketListener;
use super::{ConnectionHandler, ConnectionStream, TransportError, TransportServer};

const GRACE: Duration = Duration::from_secs(2);

struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: ConnectionStream) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reads until the peer or the server closes the stream.
struct DrainingHandler;

impl ConnectionHandler for DrainingHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        let mut sink = Vec::new();
        let _bytes = stream.read_to_end(&mut sink);
    }
}

#[fixture]
fn tcp_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", 0)
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[rstest]
fn tcp_listener_accepts_connections(tcp_endpoint: SocketEndpoint) {
    let listener = SocketListener::bind(&tcp_endpoint).expect("bind tcp listener");
    let addr = listener
        .local_addr()
        .expect("listener should report local address");
    let (count, handler) = CountingHandler::new();
    let handle = listener.start(handler).expect("start listener");

    TcpStream::connect(addr).expect("connect first client");
    TcpStream::connect(addr).expect("connect second client");

    assert!(
        wait_until(|| count.load(Ordering::SeqCst) >= 2),
        "expected two connections"
    );
    handle.shutdown();
    handle.join().expect("join listener");
}

#[rstest]
fn stop_closes_open_connections(tcp_endpoint: SocketEndpoint) {
    let mut server =
        TransportServer::start(&tcp_endpoint, Arc::new(DrainingHandler), GRACE).expect("start");
    let addr = server.local_addr().expect("tcp address");
    let _client = TcpStream::connect(addr).expect("connect");
    assert!(wait_until(|| server.connection_count() == 1));

    server.stop().expect("stop within grace");
    assert!(!server.is_running());
    assert_eq!(server.connection_count(), 0);
    server.stop().expect("second stop is a no-op");
}

#[rstest]
fn connections_close_after_the_host_stops(tcp_endpoint: SocketEndpoint) {
    let host = Host::new(Config::default()).expect("host");
    let framing = host.config().framing();
    let handler = Arc::new(host.connection_handler());
    let mut server = TransportServer::start(&tcp_endpoint, handler, GRACE).expect("start");
    let addr = server.local_addr().expect("tcp address");
    host.close();

    let mut client = TcpStream::connect(addr).expect("connect");
    client
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("read timeout");
    let ping = serde_json::to_vec(&CommandRequest::new("core.ping", serde_json::json!({})))
        .expect("encode ping");
    client
        .write_all(&encode_frame(framing, &ping))
        .expect("send ping");

    let mut received = Vec::new();
    client
        .read_to_end(&mut received)
        .expect("host closes the connection");
    let mut decoder = FrameDecoder::new(framing, received.len().max(1));
    decoder.push(&received);
    let frame = decoder.next_frame().expect("frame").expect("one response");
    let response: CommandResponse = serde_json::from_slice(&frame).expect("response");
    assert_eq!(response.error_message(), Some("host is shutting down"));

    server.stop().expect("stop");
}

#[rstest]
fn stopped_server_refuses_connections(tcp_endpoint: SocketEndpoint) {
    let (_count, handler) = CountingHandler::new();
    let mut server = TransportServer::start(&tcp_endpoint, handler, GRACE).expect("start");
    let addr = server.local_addr().expect("tcp address");
    server.stop().expect("stop");
    assert!(TcpStream::connect(addr).is_err());
}

#[cfg(unix)]
mod unix {
    use std::os::unix::net::{UnixListener, UnixStream};

    use super::*;

    #[test]
    fn unix_listener_cleans_stale_socket_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("scenebridge.sock");
        {
            let _stale = UnixListener::bind(&path).expect("bind stale listener");
        }
        assert!(path.exists(), "stale socket should remain");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path").to_owned());
        let (count, handler) = CountingHandler::new();
        let mut server = TransportServer::start(&endpoint, handler, GRACE).expect("start");

        UnixStream::connect(&path).expect("connect unix client");
        assert!(wait_until(|| count.load(Ordering::SeqCst) == 1));

        server.stop().expect("stop");
        assert!(
            !path.exists(),
            "listener should remove unix socket on shutdown"
        );
    }

    #[test]
    fn unix_listener_rejects_in_use_socket() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("scenebridge.sock");
        let _existing = UnixListener::bind(&path).expect("bind existing listener");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path").to_owned());
        let error = SocketListener::bind(&endpoint).expect_err("should fail bind");
        assert!(matches!(error, TransportError::EndpointBusy { .. }));
    }

    #[test]
    fn unix_listener_rejects_regular_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("not-a-socket");
        std::fs::write(&path, b"").expect("write file");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path").to_owned());
        let error = SocketListener::bind(&endpoint).expect_err("should fail bind");
        assert!(matches!(error, TransportError::NotASocket { .. }));
    }
}
