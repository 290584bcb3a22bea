use crate::channel::{self, Listener};
use crate::dispatcher::Dispatcher;
use crate::host::{RenderedText, TextPainter, WindowHost};
use crate::server::{PipeServer, ServerState};
use crate::settings::Settings;
use crate::state::SharedState;
use anyhow::Context;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// The control surface a host window owns: shared overlay state plus the background
/// thread serving the control channel.
///
/// Dropping the surface shuts the thread down.
pub struct ControlSurface {
    state: SharedState,
    host: Arc<dyn WindowHost>,
    shutdown: Arc<AtomicBool>,
    server_state: Arc<Mutex<ServerState>>,
    address: String,
    thread: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl ControlSurface {
    /// Acquire the channel named in `settings` and start serving it.
    pub fn start(settings: &Settings, host: Arc<dyn WindowHost>) -> anyhow::Result<Self> {
        let listener = channel::bind(&settings.pipe_name, settings.max_request_bytes)
            .with_context(|| format!("control channel '{}' unavailable", settings.pipe_name))?;
        Self::start_with_listener(listener, host, settings)
    }

    pub fn start_with_listener<L: Listener>(
        listener: L,
        host: Arc<dyn WindowHost>,
        settings: &Settings,
    ) -> anyhow::Result<Self> {
        let state = SharedState::default();
        let shutdown = Arc::new(AtomicBool::new(false));
        let address = listener.address().to_string();
        let dispatcher = Dispatcher::new(state.clone(), host.clone(), shutdown.clone());
        let server = PipeServer::new(listener, dispatcher, settings.max_request_bytes);
        let server_state = server.state_handle();

        let thread = std::thread::Builder::new()
            .name("control-pipe".into())
            .spawn(move || run_server_thread(server))
            .context("failed to spawn control pipe thread")?;

        tracing::info!(address = %address, "control surface started");
        Ok(Self {
            state,
            host,
            shutdown,
            server_state,
            address,
            thread: Some(thread),
            shutdown_timeout: settings.shutdown_timeout(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn server_state(&self) -> ServerState {
        *self
            .server_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Host message hook: run the mapped action and return its exit code, `0` when
    /// nothing is mapped. Blocks the calling thread while the action runs.
    pub fn handle_host_message(&self, message_id: u32) -> i32 {
        self.state.dispatch_host_message(message_id)
    }

    /// Paint every record. The records are copied out first so painting never holds
    /// the state lock.
    pub fn render(&self, painter: &mut dyn TextPainter) {
        for info in self.state.snapshot() {
            let extent = self.host.measure_text(&info.text);
            let bounds = info.bounds(extent);
            tracing::debug!("painting: {info}");
            painter.draw_text(&RenderedText { info, bounds });
        }
    }

    /// Stop the server thread and wait up to the configured timeout for it to exit.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        self.shutdown.store(true, Ordering::SeqCst);
        if !handle.is_finished() {
            // unblock a pending accept; the loop sees the flag once the peer hangs up
            match channel::connect(&self.address) {
                Ok(stream) => drop(stream),
                Err(err) => tracing::debug!(%err, "wake connection to control pipe failed"),
            }
        }
        join_with_timeout(handle, self.shutdown_timeout);
    }
}

impl Drop for ControlSurface {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_server_thread<L: Listener>(server: PipeServer<L>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| server.run())) {
        let panic_message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        tracing::error!(panic_message, "control pipe thread panicked");
    }
}

fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) {
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = done_tx.send(handle.join());
    });
    match done_rx.recv_timeout(timeout) {
        Ok(Ok(())) => {}
        Ok(Err(_)) => tracing::error!("control pipe thread panicked while joining"),
        Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!("control pipe thread join timed out; a client may still be connected")
        }
        Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
            tracing::error!("control pipe thread join channel disconnected")
        }
    }
}
