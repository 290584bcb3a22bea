use serde::{Deserialize, Serialize};

/// Well-known name of the control channel.
pub const DEFAULT_PIPE_NAME: &str = "PyDeskbandControlPipe";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Channel name. On Windows this becomes `\\.\pipe\<name>`; elsewhere a socket
    /// in the temp directory unless the name is already a path.
    #[serde(default = "default_pipe_name")]
    pub pipe_name: String,
    /// When enabled the logger is initialised at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional persistent log file.
    #[serde(default)]
    pub log_file: Option<String>,
    /// Initial state of the flag toggled by `SET,LOGGING_ENABLED`.
    #[serde(default)]
    pub diagnostics_enabled: bool,
    /// Diagnostics output file. Defaults to `deskband_pipe.log` in the temp directory.
    #[serde(default)]
    pub diagnostics_file: Option<String>,
    /// Largest request read in one go.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    /// How long shutting down the control surface waits for the server thread.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_pipe_name() -> String {
    DEFAULT_PIPE_NAME.to_string()
}

fn default_max_request_bytes() -> usize {
    8 * 1024
}

fn default_shutdown_timeout_ms() -> u64 {
    2000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pipe_name: default_pipe_name(),
            debug_logging: false,
            log_file: None,
            diagnostics_enabled: false,
            diagnostics_file: None,
            max_request_bytes: default_max_request_bytes(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_timeout_ms)
    }
}
