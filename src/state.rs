use crate::action_map::{run_shell, ActionMap};
use crate::store::{RecordStore, TextInfo};
use std::sync::{Arc, Mutex, PoisonError};

/// Everything the server thread and the host event thread both touch.
#[derive(Debug, Default)]
pub struct ControlState {
    pub store: RecordStore,
    pub actions: ActionMap,
}

/// Lock-guarded handle to [`ControlState`]. Each call holds the lock for one operation.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<ControlState>>,
}

impl SharedState {
    pub fn with<R>(&self, f: impl FnOnce(&mut ControlState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Copy of the records for painting without holding the lock.
    pub fn snapshot(&self) -> Vec<TextInfo> {
        self.with(|state| state.store.records().to_vec())
    }

    /// Run the action mapped to `message_id`, if any, and return its exit code.
    ///
    /// The lock is released before the process starts; the call blocks until the
    /// process exits. Unmapped messages return `0`.
    pub fn dispatch_host_message(&self, message_id: u32) -> i32 {
        let Some(command) = self.with(|state| state.actions.get(message_id).map(str::to_string))
        else {
            return 0;
        };
        tracing::debug!(message_id, command = %command, "running mapped action");
        match run_shell(&command) {
            Ok(code) => code,
            Err(err) => {
                tracing::error!(message_id, ?err, "failed to run mapped action");
                -1
            }
        }
    }
}
