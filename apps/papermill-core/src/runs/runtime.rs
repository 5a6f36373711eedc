use super::{CancelToken, RunState, RunsSupervisor};
use crate::app::SharedState;
use crate::research::{Pipeline, RunError, RunRequest};
use crate::runlog::RunLog;
use crate::sessions::SessionId;
use std::sync::Arc;

/// Starts `req` on its own OS thread with a current-thread runtime. The
/// caller must already hold `cancel` from [`RunsSupervisor::begin`]; the
/// supervisor entry is settled when the run ends.
pub fn spawn(state: SharedState, req: RunRequest, cancel: CancelToken) -> std::io::Result<()> {
    let pipeline = state.pipeline.clone();
    let runs = state.runs.clone();
    let id = req.session_id.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("run-{}", id))
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(session_id = %req.session_id, error = %e, "failed to build run runtime");
                    settle(&runs, &req.session_id, RunState::Failed);
                    return;
                }
            };
            let outcome = rt.block_on(execute(pipeline, &req, &cancel));
            settle(&runs, &req.session_id, outcome);
        });
    if let Err(e) = spawned {
        settle(&state.runs, &id, RunState::Failed);
        return Err(e);
    }
    Ok(())
}

fn settle(runs: &RunsSupervisor, id: &SessionId, outcome: RunState) {
    runs.finish(id, outcome);
    papermill_telemetry::inc_run(outcome.as_str());
    tracing::info!(session_id = %id, state = outcome.as_str(), "run finished");
}

async fn execute(pipeline: Arc<Pipeline>, req: &RunRequest, cancel: &CancelToken) -> RunState {
    let log_path = pipeline.store().log_path(&req.session_id);
    let log = match RunLog::create(&log_path, req.session_id.clone()) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(session_id = %req.session_id, path = %log_path.display(), error = %e, "cannot open run log");
            return RunState::Failed;
        }
    };
    match pipeline.run(req, &log, cancel).await {
        Ok(_) => RunState::Completed,
        Err(RunError::Cancelled(_)) => RunState::Cancelled,
        Err(e) => {
            log.error(format!("Workflow failed: {}", e));
            RunState::Failed
        }
    }
}
