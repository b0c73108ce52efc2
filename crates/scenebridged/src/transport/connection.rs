//! Per-connection request loop.
//!
//! Each connection thread decodes one frame at a time, hands the request to
//! the host thread and writes the response before reading the next frame, so
//! a connection's requests run in the order they were sent. Responses are
//! produced on the host thread but written here; the stream never crosses
//! threads.

use std::io::{self, Read};
use std::sync::mpsc;
use std::time::Instant;

use scenebridge_config::{Config, Framing};
use scenebridge_protocol::{
    CommandName, CommandRequest, CommandResponse, FrameDecoder, FrameError, write_frame,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::dispatch::DispatcherHandle;
use crate::engine::{Engine, async_command_name, respond};
use crate::operations::OperationManager;
use crate::registry::CommandError;

use super::{ConnectionStream, LISTENER_TARGET};

const READ_CHUNK: usize = 8 * 1024;

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serves one connection until it closes. Implementations should avoid
    /// panicking.
    fn handle(&self, stream: ConnectionStream);
}

/// Serves framed command requests against an engine owned by the host
/// thread.
#[derive(Debug, Clone)]
pub struct CommandConnectionHandler {
    dispatcher: DispatcherHandle<Engine>,
    operations: OperationManager,
    framing: Framing,
    max_frame_bytes: usize,
}

impl CommandConnectionHandler {
    /// Creates a handler that queues work on `dispatcher`.
    ///
    /// `operations` must be the engine's own manager; `async` requests are
    /// answered from it without waiting for the host thread.
    #[must_use]
    pub fn new(
        dispatcher: DispatcherHandle<Engine>,
        operations: OperationManager,
        framing: Framing,
        max_frame_bytes: usize,
    ) -> Self {
        Self {
            dispatcher,
            operations,
            framing,
            max_frame_bytes,
        }
    }

    /// Creates a handler using the configured framing and frame limit.
    #[must_use]
    pub fn from_config(
        dispatcher: DispatcherHandle<Engine>,
        operations: OperationManager,
        config: &Config,
    ) -> Self {
        Self::new(
            dispatcher,
            operations,
            config.framing(),
            config.max_frame_bytes(),
        )
    }

    /// Answers every complete frame in `decoder`.
    ///
    /// Returns `Ok(false)` once the connection must close: after a rejected
    /// frame, or once the host has stopped taking work.
    fn answer_buffered(
        &self,
        decoder: &mut FrameDecoder,
        stream: &mut ConnectionStream,
    ) -> io::Result<bool> {
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => {
                    let response = self.serve(frame);
                    write_frame(stream, self.framing, &response.to_bytes())?;
                    if !self.dispatcher.is_open() {
                        debug!(target: LISTENER_TARGET, "host stopped; closing connection");
                        return Ok(false);
                    }
                }
                Ok(None) => return Ok(true),
                Err(error) => {
                    let response = self.reject_frame(&error);
                    write_frame(stream, self.framing, &response.to_bytes())?;
                    return Ok(false);
                }
            }
        }
    }

    fn serve(&self, frame: Vec<u8>) -> CommandResponse {
        let Ok(request) = CommandRequest::parse(&frame) else {
            return self.on_host(move |engine| engine.handle_frame(&frame));
        };
        if let Some(name) = async_command_name(&request) {
            return self.serve_async(&name, request);
        }
        self.on_host(move |engine| engine.handle_request(&request))
    }

    fn serve_async(&self, name: &CommandName, request: CommandRequest) -> CommandResponse {
        let started = Instant::now();
        let outcome = request
            .parameter_map()
            .map_err(CommandError::from)
            .and_then(|parameters| self.operations.execute_action(name.action(), &parameters));
        let elapsed = started.elapsed();
        let response = respond(&outcome);
        self.dispatcher.enqueue(move |engine: &mut Engine| {
            engine.record_external(&request, &outcome, elapsed);
        });
        response
    }

    fn reject_frame(&self, error: &FrameError) -> CommandResponse {
        warn!(target: LISTENER_TARGET, %error, "rejecting frame and closing connection");
        let error = match error {
            FrameError::TooLarge { max_size, .. } => {
                CommandError::limit_exceeded("frame size", *max_size)
            }
            FrameError::InvalidDocument { message } => CommandError::malformed(message.clone()),
        };
        let outcome = Err(error);
        let response = respond(&outcome);
        self.dispatcher.enqueue(move |engine: &mut Engine| {
            if let Err(error) = &outcome {
                engine.record_error(error, json!({"source": "transport"}));
            }
        });
        response
    }

    /// Runs `work` on the host thread and waits for its response.
    fn on_host<F>(&self, work: F) -> CommandResponse
    where
        F: FnOnce(&mut Engine) -> CommandResponse + Send + 'static,
    {
        let (reply, response) = mpsc::sync_channel(1);
        let queued = self.dispatcher.enqueue(move |engine: &mut Engine| {
            if reply.send(work(engine)).is_err() {
                debug!(target: LISTENER_TARGET, "connection closed before its response");
            }
        });
        if !queued {
            return shutting_down();
        }
        // Dropping the queued item on shutdown disconnects the channel.
        response.recv().unwrap_or_else(|_| shutting_down())
    }
}

fn shutting_down() -> CommandResponse {
    CommandResponse::error("host is shutting down")
}

impl ConnectionHandler for CommandConnectionHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        debug!(target: LISTENER_TARGET, "connection opened");
        let mut decoder = FrameDecoder::new(self.framing, self.max_frame_bytes);
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            match self.answer_buffered(&mut decoder, &mut stream) {
                Ok(true) => {}
                Ok(false) => return,
                Err(error) => {
                    warn!(target: LISTENER_TARGET, %error, "failed to write response");
                    return;
                }
            }
            match read_chunk_with_retry(&mut stream, &mut chunk) {
                Ok(0) => {
                    if !decoder.is_idle() {
                        debug!(
                            target: LISTENER_TARGET,
                            buffered = decoder.buffered(),
                            "peer closed mid-frame"
                        );
                    }
                    debug!(target: LISTENER_TARGET, "connection closed");
                    return;
                }
                Ok(read) => decoder.push(chunk.get(..read).unwrap_or_default()),
                Err(error) => {
                    warn!(target: LISTENER_TARGET, %error, "connection read failed");
                    return;
                }
            }
        }
    }
}

fn read_chunk_with_retry(stream: &mut ConnectionStream, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
}
