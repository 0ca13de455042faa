//! Run lifecycle - at most one engine run at a time
//!
//! Starting a run stops any previous one, resets the store, clears the stop
//! sentinel, launches the engine and hands its stdout to a background event
//! processor. Stopping raises the sentinel, cancels the processor and
//! terminates the engine with a bounded grace period.

use std::sync::Arc;

use casepilot_common::TestCase;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::BufReader;
use tokio::process::ChildStdout;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::engine::EngineProcess;
use crate::error::{RunnerError, RunnerResult};
use crate::processor::{EventProcessor, ProcessSummary};
use crate::sentinel::StopSentinel;
use crate::store::{RunEpoch, StatusStore};

/// How a run ended
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub epoch: u64,
    pub summary: ProcessSummary,
    /// Engine exit code, if it exited normally
    pub exit_code: Option<i32>,
    /// The run was ended by a stop request
    pub stopped: bool,
    /// The engine ignored the terminate signal and was killed
    pub forced_kill: bool,
}

struct ActiveRun {
    epoch: RunEpoch,
    cancel: CancellationToken,
    task: JoinHandle<RunOutcome>,
}

pub struct RunSupervisor {
    config: RunnerConfig,
    store: Arc<StatusStore>,
    sentinel: StopSentinel,
    active: Mutex<Option<ActiveRun>>,
}

impl RunSupervisor {
    pub fn new(config: RunnerConfig) -> Self {
        let sentinel = StopSentinel::new(config.sentinel_path());
        Self {
            config,
            store: Arc::new(StatusStore::new()),
            sentinel,
            active: Mutex::new(None),
        }
    }

    /// Read access for polling collaborators
    pub fn store(&self) -> Arc<StatusStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn sentinel(&self) -> &StopSentinel {
        &self.sentinel
    }

    /// Start a new run over `test_cases`
    pub async fn start_run(&self, test_cases: &[TestCase]) -> RunnerResult<RunEpoch> {
        if test_cases.is_empty() {
            return Err(RunnerError::NoTestCases);
        }

        if let Some(previous) = self.stop_run().await? {
            info!("Stopped previous run {} before starting a new one", previous.epoch);
        }

        let epoch = self.store.reset();
        self.sentinel.clear()?;

        let (engine, stdout) = EngineProcess::spawn(&self.config.engine, test_cases)?;
        let cancel = CancellationToken::new();
        let processor = EventProcessor::new(self.store.clone(), epoch);
        let task = tokio::spawn(drive(
            epoch,
            engine,
            stdout,
            processor,
            cancel.clone(),
            self.config.stop_timeout(),
        ));

        let replaced = self.active.lock().replace(ActiveRun {
            epoch,
            cancel,
            task,
        });
        if let Some(stale) = replaced {
            // Lost a race with a concurrent start; its writes are already stale
            stale.cancel.cancel();
        }

        info!("Run {} started with {} test case(s)", epoch.value(), test_cases.len());
        Ok(epoch)
    }

    /// Stop the active run, if any, and wait for it to wind down.
    ///
    /// Once this returns, the stopped run no longer touches the store.
    pub async fn stop_run(&self) -> RunnerResult<Option<RunOutcome>> {
        let Some(active) = self.active.lock().take() else {
            return Ok(None);
        };

        info!("Stopping run {}", active.epoch.value());
        if let Err(e) = self.sentinel.raise() {
            warn!("Failed to write stop sentinel {}: {}", self.sentinel.path().display(), e);
        }
        active.cancel.cancel();

        let outcome = active
            .task
            .await
            .map_err(|e| RunnerError::Engine(format!("run task failed: {}", e)))?;
        Ok(Some(outcome))
    }

    /// Wait for the active run to finish on its own.
    ///
    /// The run is detached from the supervisor while waiting, so a
    /// concurrent `stop_run` will not see it.
    pub async fn wait(&self) -> RunnerResult<Option<RunOutcome>> {
        let Some(active) = self.active.lock().take() else {
            return Ok(None);
        };

        let outcome = active
            .task
            .await
            .map_err(|e| RunnerError::Engine(format!("run task failed: {}", e)))?;
        Ok(Some(outcome))
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|run| !run.task.is_finished())
            .unwrap_or(false)
    }
}

/// Background task for one run: process engine output, then reap the engine
async fn drive(
    epoch: RunEpoch,
    mut engine: EngineProcess,
    stdout: ChildStdout,
    processor: EventProcessor,
    cancel: CancellationToken,
    grace: std::time::Duration,
) -> RunOutcome {
    let summary = processor.run(BufReader::new(stdout), &cancel).await;
    let mut outcome = RunOutcome {
        epoch: epoch.value(),
        summary,
        exit_code: None,
        stopped: false,
        forced_kill: false,
    };

    let exited = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        status = engine.wait() => Some(status),
    };

    match exited {
        Some(Ok(status)) => {
            outcome.exit_code = status.code();
            if status.success() {
                info!("Engine finished run {}", epoch.value());
            } else {
                warn!("Engine exited with {} during run {}", status, epoch.value());
            }
        }
        Some(Err(e)) => warn!("Failed to wait for engine: {}", e),
        None => {
            outcome.stopped = true;
            match engine.terminate(grace).await {
                Ok(termination) => {
                    outcome.exit_code = termination.exit_code();
                    outcome.forced_kill = termination.forced();
                }
                Err(e) => warn!("Failed to terminate engine: {}", e),
            }
        }
    }

    outcome
}
