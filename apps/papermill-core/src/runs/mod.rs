use crate::sessions::SessionId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState { Running, Completed, Cancelled, Failed }

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

/// Cooperative cancellation signal handed to one run.
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token nobody can cancel.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; never resolves if the
    /// supervisor side has gone away without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Runs `fut` unless cancellation arrives first (`None`).
    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("run {0} is already running")]
pub struct AlreadyRunning(pub SessionId);

struct RunEntry {
    state: RunState,
    cancel: watch::Sender<bool>,
}

/// In-process registry of runs started by this server.
#[derive(Clone, Default)]
pub struct RunsSupervisor {
    runs: Arc<RwLock<HashMap<SessionId, RunEntry>>>,
}

impl RunsSupervisor {
    pub fn new() -> Self { Self::default() }

    /// Registers `id` as running. Refused while a run with the same id is
    /// still active; finished entries are replaced.
    pub fn begin(&self, id: &SessionId) -> Result<CancelToken, AlreadyRunning> {
        let mut runs = self.runs.write();
        if runs.get(id).map(|e| e.state.is_active()).unwrap_or(false) {
            return Err(AlreadyRunning(id.clone()));
        }
        let (tx, rx) = watch::channel(false);
        runs.insert(id.clone(), RunEntry { state: RunState::Running, cancel: tx });
        Ok(CancelToken { rx })
    }

    pub fn finish(&self, id: &SessionId, state: RunState) {
        if let Some(e) = self.runs.write().get_mut(id) {
            e.state = state;
        }
    }

    pub fn state(&self, id: &SessionId) -> Option<RunState> {
        self.runs.read().get(id).map(|e| e.state)
    }

    /// Signals a running run. `false` if there is no active run with `id`.
    pub fn cancel(&self, id: &SessionId) -> bool {
        let runs = self.runs.read();
        match runs.get(id) {
            Some(e) if e.state.is_active() => {
                e.cancel.send_replace(true);
                true
            }
            _ => false,
        }
    }
}

pub mod runtime;
