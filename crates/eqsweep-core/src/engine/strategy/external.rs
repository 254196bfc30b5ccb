//! The external-process strategy: drives an installed GEM-style solver
//! through input/output artifacts under a hard wall-clock timeout.

use super::CalculationStrategy;
use crate::core::io::artifact::{self, TaskDocument};
use crate::core::io::parser;
use crate::core::models::result::{CalculationResult, FailureKind};
use crate::core::models::task::CalculationTask;
use crate::engine::error::EngineError;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Budget for the validation probe at construction.
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs a named solver executable per task: writes the input artifact,
/// invokes `<exe> --input <path> --output <path>`, and parses the output
/// artifact. Exit-code interpretation and output parsing are independent:
/// a zero exit with unparseable output is still a parse failure, never a
/// silent success.
pub struct ExternalProcessStrategy {
    executable: PathBuf,
    database: Option<PathBuf>,
    input_dir: PathBuf,
    raw_output_dir: PathBuf,
}

impl ExternalProcessStrategy {
    /// Validates the executable once, up front. A solver that cannot even
    /// answer `--help` would fail every task in the batch, so this is the
    /// fatal configuration check of the error taxonomy.
    pub fn new(
        executable: PathBuf,
        database: Option<PathBuf>,
        input_dir: PathBuf,
        raw_output_dir: PathBuf,
    ) -> Result<Self, EngineError> {
        validate_executable(&executable)?;
        Ok(Self {
            executable,
            database,
            input_dir,
            raw_output_dir,
        })
    }
}

impl CalculationStrategy for ExternalProcessStrategy {
    fn name(&self) -> &'static str {
        "external-solver"
    }

    fn run(&self, task: &CalculationTask) -> CalculationResult {
        let started = Instant::now();
        let input_path = artifact::input_path(&self.input_dir, &task.id);
        let output_path = artifact::raw_output_path(&self.raw_output_dir, &task.id);

        // The input artifact is normally written up front by the sweep
        // workflow; write it here only if it is missing.
        if !input_path.exists() {
            if let Err(e) = TaskDocument::from_task(task).write(&input_path) {
                return with_time(
                    CalculationResult::failed(
                        FailureKind::Io,
                        format!("Failed to write input artifact: {e}"),
                    ),
                    started,
                );
            }
        }
        if let Some(parent) = output_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return with_time(
                    CalculationResult::failed(
                        FailureKind::Io,
                        format!("Failed to create output directory: {e}"),
                    ),
                    started,
                );
            }
        }

        let mut command = Command::new(&self.executable);
        command
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(database) = &self.database {
            command.arg("--database").arg(database);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return with_time(
                    CalculationResult::failed(
                        FailureKind::Other,
                        format!("Failed to spawn solver: {e}"),
                    ),
                    started,
                );
            }
        };

        let timeout = Duration::from_secs(task.conditions.timeout_secs);
        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                // Hard timeout: terminate the solver so no orphan survives
                // the task, then record the expiry.
                let _ = child.kill();
                let _ = child.wait();
                warn!(id = %task.id, timeout_secs = task.conditions.timeout_secs, "Solver timed out; process killed.");
                return with_time(
                    CalculationResult::failed(
                        FailureKind::Timeout,
                        format!("Timeout after {}s", task.conditions.timeout_secs),
                    ),
                    started,
                );
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return with_time(
                    CalculationResult::failed(
                        FailureKind::Other,
                        format!("Failed to wait on solver: {e}"),
                    ),
                    started,
                );
            }
        };

        if !status.success() {
            let stderr = child
                .wait_with_output()
                .map(|o| String::from_utf8_lossy(&o.stderr).trim().to_string())
                .unwrap_or_default();
            return with_time(
                CalculationResult::failed(
                    FailureKind::Convergence,
                    format!("Solver exited with {status}: {stderr}"),
                ),
                started,
            );
        }

        debug!(id = %task.id, output = %output_path.display(), "Solver finished; parsing output.");
        let mut result = parser::parse(&output_path);
        if result.method.is_empty() {
            result.method = self.name().to_string();
        }
        with_time(result, started)
    }
}

fn with_time(mut result: CalculationResult, started: Instant) -> CalculationResult {
    result.execution_time_s = started.elapsed().as_secs_f64();
    result
}

/// A usable solver must exist and answer `--help` with exit code 0 or a
/// usage banner within a short budget.
fn validate_executable(executable: &std::path::Path) -> Result<(), EngineError> {
    if !executable.is_file() {
        return Err(EngineError::Configuration(format!(
            "Solver executable not found: {}",
            executable.display()
        )));
    }

    let mut child = Command::new(executable)
        .arg("--help")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            EngineError::Configuration(format!(
                "Solver executable could not be launched ({}): {e}",
                executable.display()
            ))
        })?;

    match child.wait_timeout(VALIDATION_TIMEOUT) {
        Ok(Some(status)) => {
            let output = child.wait_with_output().map_err(|e| {
                EngineError::Configuration(format!("Failed to read solver output: {e}"))
            })?;
            let combined = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )
            .to_lowercase();
            if status.success() || combined.contains("usage") {
                Ok(())
            } else {
                Err(EngineError::Configuration(format!(
                    "Solver executable failed its --help probe: {}",
                    executable.display()
                )))
            }
        }
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(EngineError::Configuration(format!(
                "Solver executable timed out on --help: {}",
                executable.display()
            )))
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(EngineError::Configuration(format!(
                "Failed to probe solver executable: {e}"
            )))
        }
    }
}
