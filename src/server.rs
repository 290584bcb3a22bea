use crate::channel::Listener;
use crate::dispatcher::Dispatcher;
use crate::protocol::{Response, Status};
use std::io::{BufRead, BufReader, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(500);

fn write_response(conn: &mut impl Write, response: &Response) -> std::io::Result<()> {
    conn.write_all(response.encode().as_bytes())?;
    conn.flush()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Connected,
    Processing,
    Disconnecting,
    Stopped,
}

impl ServerState {
    pub fn is_running(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

pub fn can_transition(from: ServerState, to: ServerState) -> bool {
    matches!(
        (from, to),
        (ServerState::Idle, ServerState::Connected)
            | (ServerState::Idle, ServerState::Stopped)
            | (ServerState::Connected, ServerState::Processing)
            | (ServerState::Connected, ServerState::Disconnecting)
            | (ServerState::Processing, ServerState::Connected)
            | (ServerState::Processing, ServerState::Disconnecting)
            | (ServerState::Disconnecting, ServerState::Idle)
            | (ServerState::Disconnecting, ServerState::Stopped)
    ) || from == to
}

/// Accept / read / dispatch / write loop over a single-client channel.
pub struct PipeServer<L: Listener> {
    listener: L,
    dispatcher: Dispatcher,
    state: ServerState,
    observed: Arc<Mutex<ServerState>>,
    max_request_bytes: usize,
}

impl<L: Listener> PipeServer<L> {
    pub fn new(listener: L, dispatcher: Dispatcher, max_request_bytes: usize) -> Self {
        Self {
            listener,
            dispatcher,
            state: ServerState::Idle,
            observed: Arc::new(Mutex::new(ServerState::Idle)),
            max_request_bytes: max_request_bytes.max(1),
        }
    }

    /// Shared view of the loop state for the owning surface.
    pub fn state_handle(&self) -> Arc<Mutex<ServerState>> {
        self.observed.clone()
    }

    fn transition(&mut self, to: ServerState) {
        let from = self.state;
        if !can_transition(from, to) {
            tracing::warn!(?from, ?to, "unexpected control pipe state transition");
        }
        self.state = to;
        *self.observed.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    /// Serve clients until a stop is requested. The listener is released on return.
    pub fn run(mut self) {
        tracing::info!(address = self.listener.address(), "control pipe loop started");
        while !self.dispatcher.stop_requested() {
            let conn = match self.listener.accept() {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::warn!(%err, "failed to accept control client; retrying shortly");
                    thread::sleep(ACCEPT_RETRY_DELAY);
                    continue;
                }
            };
            self.transition(ServerState::Connected);
            tracing::debug!("control client connected");
            self.serve(conn);
            if !self.dispatcher.stop_requested() {
                self.transition(ServerState::Idle);
            }
        }
        self.transition(ServerState::Stopped);
        tracing::info!("control pipe loop exited");
    }

    fn serve(&mut self, conn: L::Conn) {
        let limit = self.max_request_bytes as u64;
        let mut reader = BufReader::with_capacity(self.max_request_bytes, conn);
        let mut buf = Vec::with_capacity(self.max_request_bytes);
        loop {
            buf.clear();
            match (&mut reader).take(limit).read_until(b'\n', &mut buf) {
                Ok(0) => {
                    tracing::debug!("control client closed the channel");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(%err, "control channel read failed");
                    break;
                }
            }
            self.transition(ServerState::Processing);

            // text is stored as received, so a request that is not UTF-8 is refused
            // rather than repaired
            let response = match std::str::from_utf8(&buf) {
                Ok(request) => {
                    tracing::debug!("request: {}", request.trim_end());
                    self.dispatcher.handle_line(request)
                }
                Err(err) => {
                    tracing::debug!(%err, "request is not valid UTF-8");
                    Response::with_status(Status::BadArgument)
                }
            };
            tracing::debug!("response: {response}");

            if let Err(err) = write_response(reader.get_mut(), &response) {
                tracing::debug!(%err, "control channel write failed");
                break;
            }

            if self.dispatcher.stop_requested() {
                tracing::info!("detected stop request");
                break;
            }
            self.transition(ServerState::Connected);
        }
        self.transition(ServerState::Disconnecting);
    }
}
