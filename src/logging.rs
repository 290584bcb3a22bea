use crate::settings::Settings;
use once_cell::sync::{Lazy, OnceCell};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const DIAGNOSTICS_FILE_NAME: &str = "deskband_pipe.log";

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(false);
static DIAGNOSTICS_PATH: Lazy<RwLock<PathBuf>> =
    Lazy::new(|| RwLock::new(default_diagnostics_path()));
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

pub fn default_diagnostics_path() -> PathBuf {
    std::env::temp_dir().join(DIAGNOSTICS_FILE_NAME)
}

/// Turn the diagnostics trace on or off. This is what `SET,LOGGING_ENABLED` drives.
pub fn set_diagnostics_enabled(enabled: bool) {
    let old = DIAGNOSTICS_ENABLED.swap(enabled, Ordering::SeqCst);
    if old != enabled {
        tracing::info!(enabled, "diagnostics logging toggled");
    }
}

pub fn diagnostics_enabled() -> bool {
    DIAGNOSTICS_ENABLED.load(Ordering::SeqCst)
}

pub fn set_diagnostics_path(path: impl Into<PathBuf>) {
    let mut guard = DIAGNOSTICS_PATH
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *guard = path.into();
}

pub fn diagnostics_path() -> PathBuf {
    DIAGNOSTICS_PATH
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Writer factory for the diagnostics layer.
///
/// Every event opens the diagnostics file in append mode and closes it again once the
/// line is written, so no handle stays open between events.
#[derive(Default)]
pub struct DiagnosticsWriter {
    lock: Mutex<()>,
}

pub enum DiagnosticsSink<'a> {
    Off,
    File {
        file: File,
        _guard: MutexGuard<'a, ()>,
    },
}

impl Write for DiagnosticsSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            DiagnosticsSink::Off => Ok(buf.len()),
            DiagnosticsSink::File { file, .. } => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            DiagnosticsSink::Off => Ok(()),
            DiagnosticsSink::File { file, .. } => file.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for DiagnosticsWriter {
    type Writer = DiagnosticsSink<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        if !diagnostics_enabled() {
            return DiagnosticsSink::Off;
        }
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(diagnostics_path())
        {
            Ok(file) => DiagnosticsSink::File {
                file,
                _guard: guard,
            },
            Err(_) => DiagnosticsSink::Off,
        }
    }
}

/// Layer writing every event at `debug` and above to the diagnostics file while
/// diagnostics are enabled.
pub fn diagnostics_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(DiagnosticsWriter::default())
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::DEBUG)
}

fn file_appender(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DIAGNOSTICS_FILE_NAME.into());
    tracing_appender::rolling::never(dir, file_name)
}

/// Initialise logging. In debug mode the level defaults to `debug` and can be
/// overridden through `RUST_LOG`; otherwise it is fixed at `info`.
///
/// `log_file` adds a persistent log written through a background worker. The
/// diagnostics layer is always installed and stays silent until enabled.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    // Without debug logging `RUST_LOG` is ignored so a stray variable in the host
    // environment cannot turn on verbose output.
    let level = if debug { "debug" } else { "info" };
    let filter = || {
        if debug {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
        } else {
            EnvFilter::new(level)
        }
    };

    let file_layer = log_file.map(|path| {
        let (writer, guard) = tracing_appender::non_blocking(file_appender(&path));
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(filter())
    });

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(filter()),
        )
        .with(file_layer)
        .with(diagnostics_layer())
        .try_init();
}

/// Apply the logging related settings and initialise logging.
pub fn init_from_settings(settings: &Settings) {
    if let Some(path) = &settings.diagnostics_file {
        set_diagnostics_path(path);
    }
    set_diagnostics_enabled(settings.diagnostics_enabled);
    init(
        settings.debug_logging,
        settings.log_file.as_ref().map(PathBuf::from),
    );
}
