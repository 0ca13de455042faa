//! Engine process management - spawning, feeding and stopping the external
//! generation/execution engine

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use casepilot_common::TestCase;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{RunnerError, RunnerResult};

/// How a stop request ended the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited within the grace period
    Graceful(Option<i32>),
    /// Had to be killed
    Killed,
    /// Had already exited before the request
    AlreadyExited(Option<i32>),
}

impl Termination {
    pub fn forced(&self) -> bool {
        matches!(self, Termination::Killed)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Termination::Graceful(code) | Termination::AlreadyExited(code) => *code,
            Termination::Killed => None,
        }
    }
}

/// Handle to a running engine process
pub struct EngineProcess {
    child: Child,
    pid: Option<u32>,
}

impl EngineProcess {
    /// Launch the engine and hand it the test cases.
    ///
    /// The cases are written to stdin as one JSON array, after which stdin
    /// is closed. Stdout is returned for the event processor; stderr is
    /// drained into the debug log.
    pub fn spawn(config: &EngineConfig, test_cases: &[TestCase]) -> RunnerResult<(Self, ChildStdout)> {
        let payload = serde_json::to_vec(test_cases)?;

        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            RunnerError::EngineSpawn(format!("Failed to spawn {}: {}", config.program, e))
        })?;
        let pid = child.id();
        info!(
            "Spawned engine '{}' (pid: {:?}) with {} test case(s)",
            config.program,
            pid,
            test_cases.len()
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::EngineSpawn("engine stdout was not captured".to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    warn!("Failed to hand test cases to engine: {}", e);
                    return;
                }
                // Dropping stdin closes the pipe
                let _ = stdin.shutdown().await;
            });
        }

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                use tokio::io::AsyncBufReadExt;
                let mut lines = tokio::io::BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[engine stderr] {}", line);
                }
            });
        }

        Ok((Self { child, pid }, stdout))
    }

    /// Wait for the engine to exit on its own
    pub async fn wait(&mut self) -> RunnerResult<ExitStatus> {
        Ok(self.child.wait().await?)
    }

    /// Ask the engine to stop, killing it if it is still alive after `grace`
    pub async fn terminate(&mut self, grace: Duration) -> RunnerResult<Termination> {
        if let Some(status) = self.child.try_wait()? {
            return Ok(Termination::AlreadyExited(status.code()));
        }

        info!("Stopping engine (pid: {:?})", self.pid);

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.pid {
                if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    debug!("SIGTERM failed: {}", e);
                }
            }
        }

        match timeout(grace, self.child.wait()).await {
            Ok(status) => Ok(Termination::Graceful(status?.code())),
            Err(_) => {
                warn!("Engine did not exit within {:?}, killing", grace);
                self.child.kill().await?;
                Ok(Termination::Killed)
            }
        }
    }
}
