use super::Listener;
use anyhow::{bail, Context};
use std::fs;
use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long a new client may wait for the current one to leave before it is refused.
const BUSY_WAIT: Duration = Duration::from_millis(200);
const BUSY_POLL: Duration = Duration::from_millis(5);

/// Unix domain socket standing in for the named pipe.
///
/// A background thread owns the socket and hands out one connection at a time; clients
/// arriving while a connection is live are closed. The socket file is removed when the
/// listener is dropped.
pub struct UnixSocketListener {
    incoming: Receiver<UnixStream>,
    busy: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    path: PathBuf,
    address: String,
}

impl UnixSocketListener {
    pub fn bind(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            if UnixStream::connect(path).is_ok() {
                bail!("control channel {} is already in use", path.display());
            }
            fs::remove_file(path)
                .with_context(|| format!("failed to remove stale socket {}", path.display()))?;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(path)
            .with_context(|| format!("failed to bind control channel {}", path.display()))?;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));

        let (tx, rx) = channel();
        let busy = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        {
            let busy = busy.clone();
            let closed = closed.clone();
            thread::Builder::new()
                .name("control-pipe-accept".into())
                .spawn(move || accept_loop(listener, tx, busy, closed))
                .context("failed to spawn control channel accept thread")?;
        }

        Ok(Self {
            incoming: rx,
            busy,
            closed,
            path: path.to_path_buf(),
            address: path.to_string_lossy().into_owned(),
        })
    }
}

/// Claim the single connection slot, waiting up to [`BUSY_WAIT`] for it to free up.
fn claim_slot(busy: &AtomicBool) -> bool {
    let deadline = Instant::now() + BUSY_WAIT;
    loop {
        if busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(BUSY_POLL);
    }
}

fn accept_loop(
    listener: UnixListener,
    incoming: Sender<UnixStream>,
    busy: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
) {
    for stream in listener.incoming() {
        if closed.load(Ordering::SeqCst) {
            break;
        }
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(%err, "control channel accept failed");
                thread::sleep(BUSY_WAIT);
                continue;
            }
        };
        if !claim_slot(&busy) {
            tracing::debug!("control channel busy; refusing client");
            let _ = stream.shutdown(Shutdown::Both);
            continue;
        }
        if incoming.send(stream).is_err() {
            break;
        }
    }
    tracing::debug!("control channel accept thread exited");
}

impl Listener for UnixSocketListener {
    type Conn = UnixConnection;

    fn accept(&mut self) -> io::Result<UnixConnection> {
        let stream = self.incoming.recv().map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "control channel accept thread exited")
        })?;
        Ok(UnixConnection {
            stream,
            busy: self.busy.clone(),
        })
    }

    fn address(&self) -> &str {
        &self.address
    }
}

impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        // wake the accept thread so it sees the flag
        let _ = UnixStream::connect(&self.path);
        let _ = fs::remove_file(&self.path);
    }
}

/// The connected client. Dropping it frees the slot for the next client.
pub struct UnixConnection {
    stream: UnixStream,
    busy: Arc<AtomicBool>,
}

impl Read for UnixConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for UnixConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Drop for UnixConnection {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        self.busy.store(false, Ordering::SeqCst);
    }
}
