use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionNotFound(pub u32);

impl fmt::Display for ActionNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no action registered for message {}", self.0)
    }
}

impl std::error::Error for ActionNotFound {}

/// Host message id to shell command.
#[derive(Debug, Default, Clone)]
pub struct ActionMap {
    actions: HashMap<u32, String>,
}

impl ActionMap {
    /// Insert or overwrite the command for `message_id`.
    pub fn set(&mut self, message_id: u32, command: impl Into<String>) {
        self.actions.insert(message_id, command.into());
    }

    pub fn unset(&mut self, message_id: u32) -> Result<String, ActionNotFound> {
        self.actions
            .remove(&message_id)
            .ok_or(ActionNotFound(message_id))
    }

    pub fn get(&self, message_id: u32) -> Option<&str> {
        self.actions.get(&message_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn shell_command(cmd: &str) -> std::process::Command {
    #[cfg(target_os = "windows")]
    {
        let mut c = std::process::Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    }
    #[cfg(not(target_os = "windows"))]
    {
        let mut c = std::process::Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Run `cmd` through the platform shell and wait for it to finish.
///
/// Returns the exit code, or `-1` when the process was terminated without one.
pub fn run_shell(cmd: &str) -> anyhow::Result<i32> {
    let status = shell_command(cmd).status()?;
    Ok(status.code().unwrap_or(-1))
}
