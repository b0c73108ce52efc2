//! A host thread behind a live TCP transport.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use scenebridge_config::{Config, Framing, SocketEndpoint};
use scenebridge_protocol::{
    Client, ClientOptions, CommandResponse, FrameDecoder, encode_frame,
};

use crate::demo::register_demo_domains;
use crate::host::Host;
use crate::transport::TransportServer;

const TICK: Duration = Duration::from_millis(2);
const RESPONSE_LIMIT: usize = 1 << 20;

/// Host loop running on its own thread, serving a loopback port.
pub struct RunningHost {
    config: Config,
    endpoint: SocketEndpoint,
    server: TransportServer,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Host>>,
}

impl RunningHost {
    /// Starts a host with the demo domains; the configured socket is
    /// replaced by an ephemeral loopback port.
    pub fn start(config: Config) -> Self {
        let mut host = Host::new(config.clone()).expect("build host");
        register_demo_domains(host.engine_mut()).expect("register demo domains");
        let server = TransportServer::start(
            &SocketEndpoint::tcp("127.0.0.1", 0),
            Arc::new(host.connection_handler()),
            Duration::from_secs(2),
        )
        .expect("start transport");
        let port = server.local_addr().expect("tcp address").port();

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                host.tick();
                thread::sleep(TICK);
            }
            host.close();
            host
        });

        Self {
            config,
            endpoint: SocketEndpoint::tcp("127.0.0.1", port),
            server,
            stop,
            thread: Some(thread),
        }
    }

    /// Connects a client speaking the host's framing.
    pub fn client(&self) -> Client {
        let options = ClientOptions {
            framing: self.config.framing(),
            reconnect_delay: Duration::from_millis(20),
            max_reconnect_attempts: 2,
            ..ClientOptions::default()
        };
        Client::connect_with(&self.endpoint, options).expect("connect client")
    }

    /// Raw connection for exercising framing failures.
    pub fn raw_stream(&self) -> TcpStream {
        let SocketEndpoint::Tcp { host, port } = &self.endpoint else {
            panic!("test hosts listen on TCP");
        };
        let stream = TcpStream::connect((host.as_str(), *port)).expect("connect raw stream");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        stream
    }

    /// Writes pre-framed bytes and reads one response.
    pub fn raw_exchange(&self, stream: &mut TcpStream, frame: &[u8]) -> CommandResponse {
        stream.write_all(frame).expect("write frame");
        read_response(stream, self.config.framing())
    }

    /// Encodes `payload` in the host's framing.
    pub fn frame(&self, payload: &[u8]) -> Vec<u8> {
        encode_frame(self.config.framing(), payload)
    }

    /// Stops the host loop and the transport, returning the host.
    pub fn shutdown(mut self) -> Host {
        self.stop.store(true, Ordering::SeqCst);
        let host = self
            .thread
            .take()
            .expect("host thread")
            .join()
            .expect("host thread panicked");
        self.server.stop().expect("stop transport");
        host
    }
}

impl Drop for RunningHost {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            drop(thread.join());
        }
    }
}

/// Reads one framed response from `stream`.
pub fn read_response(stream: &mut TcpStream, framing: Framing) -> CommandResponse {
    let mut decoder = FrameDecoder::new(framing, RESPONSE_LIMIT);
    let mut chunk = [0_u8; 1024];
    loop {
        if let Some(frame) = decoder.next_frame().expect("decode response") {
            return serde_json::from_slice(&frame).expect("parse response");
        }
        let read = stream.read(&mut chunk).expect("read response");
        assert!(read > 0, "connection closed before a response arrived");
        decoder.push(chunk.get(..read).expect("chunk slice"));
    }
}

/// Whether the peer closed `stream`.
pub fn is_closed(stream: &mut TcpStream) -> bool {
    let mut byte = [0_u8; 1];
    matches!(stream.read(&mut byte), Ok(0))
}
