//! Supervised engine runs

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use casepilot_common::{ErrorLogEntry, ExecutionStatusEntry};
use casepilot_extract::extract_test_cases;
use casepilot_runner::{RunOutcome, RunSupervisor, RunnerConfig};
use clap::Args;
use tracing::{debug, warn};

use crate::output::{
    print_document, print_error, print_info, print_list, print_success, print_warning, truncate,
    OutputFormat, TableDisplay,
};

#[derive(Args)]
pub struct RunArgs {
    /// Spreadsheet to extract test cases from
    pub file: PathBuf,

    /// Runner configuration file
    #[arg(long, default_value = "casepilot.toml", env = "CASEPILOT_CONFIG")]
    pub config: PathBuf,

    /// Engine executable (overrides the configuration)
    #[arg(long)]
    pub engine: Option<String>,

    /// Engine argument, repeatable (replaces the configured arguments)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,
}

impl TableDisplay for ExecutionStatusEntry {
    fn headers() -> Vec<&'static str> {
        vec!["Test Case", "Status", "Attempts", "Healing", "Failure Reason", "Updated"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.test_case_id.clone(),
            self.status.to_string(),
            self.attempts.to_string(),
            self.healing_type.map(|h| h.to_string()).unwrap_or_default(),
            truncate(&self.failure_reason, 60),
            self.timestamp.clone(),
        ]
    }
}

impl TableDisplay for ErrorLogEntry {
    fn headers() -> Vec<&'static str> {
        vec!["Test Case", "Attempt", "Healing", "Error", "Screenshot", "Time"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.testcase_id.clone(),
            self.attempt.to_string(),
            self.healing_type.map(|h| h.to_string()).unwrap_or_default(),
            truncate(&self.error_message, 60),
            self.screenshot_path.clone(),
            self.timestamp.clone(),
        ]
    }
}

fn resolve_config(args: &RunArgs) -> Result<RunnerConfig> {
    let mut config = RunnerConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(engine) = &args.engine {
        config.engine.program = engine.clone();
    }
    if !args.engine_args.is_empty() {
        config.engine.args = args.engine_args.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Print live messages that changed since the last poll
fn print_live_changes(current: BTreeMap<String, String>, shown: &mut BTreeMap<String, String>) {
    for (id, message) in current {
        if shown.get(&id) != Some(&message) {
            println!("[{}] {}", id, message);
            shown.insert(id, message);
        }
    }
}

fn report_outcome(outcome: &RunOutcome) {
    if outcome.stopped {
        let how = if outcome.forced_kill { "killed" } else { "stopped" };
        print_warning(&format!("Run {} was {} before completion", outcome.epoch, how));
    } else if outcome.exit_code.unwrap_or(0) != 0 {
        print_error(&format!(
            "Engine exited with code {}",
            outcome.exit_code.unwrap_or_default()
        ));
    } else if outcome.summary.completed {
        print_success("All test cases have been processed");
    } else {
        print_warning("Engine exited without reporting completion");
    }
}

/// Test cases that never reached Passed or Failed
fn unfinished_cases(statuses: &[ExecutionStatusEntry]) -> usize {
    statuses.iter().filter(|entry| !entry.status.is_terminal()).count()
}

/// Poll the active run until it finishes or `stop` resolves
async fn watch_run(
    supervisor: &RunSupervisor,
    stop: impl Future<Output = ()>,
    verbose: bool,
    shown: &mut BTreeMap<String, String>,
) -> Result<Option<RunOutcome>> {
    let store = supervisor.store();
    let mut ticker = tokio::time::interval(supervisor.config().poll_interval());
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => {
                if verbose {
                    print_warning("Stop requested, terminating engine");
                }
                return Ok(supervisor.stop_run().await?);
            }
            _ = ticker.tick() => {
                if verbose {
                    print_live_changes(store.live_messages(), shown);
                }
                if !supervisor.is_running() {
                    return Ok(supervisor.wait().await?);
                }
            }
        }
    }
}

pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<()> {
    let config = resolve_config(&args)?;
    let table = super::load_table(&args.file)?;
    let cases = extract_test_cases(&table)?;
    let verbose = !format.is_structured();

    if verbose {
        print_info(&format!(
            "Extracted {} test case(s) from {}",
            cases.len(),
            args.file.display()
        ));
    }

    let supervisor = RunSupervisor::new(config);
    supervisor.start_run(&cases).await?;

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let store = supervisor.store();
    let mut shown = BTreeMap::new();
    let outcome = watch_run(&supervisor, ctrl_c, verbose, &mut shown).await?;
    debug!("Run outcome: {:?}", outcome);

    if !verbose {
        print_document(&store.snapshot(), format);
        return Ok(());
    }

    print_live_changes(store.live_messages(), &mut shown);
    println!();
    let statuses = store.statuses();
    print_list(&statuses, format);

    let errors = store.error_log();
    if !errors.is_empty() {
        println!();
        println!("Error log:");
        print_list(&errors, format);
    }

    if let Some(outcome) = &outcome {
        report_outcome(outcome);
    }
    let unfinished = unfinished_cases(&statuses);
    if unfinished > 0 {
        print_warning(&format!("{} test case(s) did not reach a final result", unfinished));
    }
    Ok(())
}
