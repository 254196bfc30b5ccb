//! Calculation strategies: how one equilibrium calculation is executed.
//!
//! Two implementations exist behind the [`CalculationStrategy`] trait: an
//! external-process strategy driving an installed GEM-style solver, and a
//! heuristic stoichiometric approximation requiring no external tool. The
//! choice is made once, at construction, via capability discovery; call
//! sites never branch on it.

pub mod external;
pub mod heuristic;

use crate::core::models::result::CalculationResult;
use crate::core::models::task::CalculationTask;
use crate::engine::config::StrategyConfig;
use crate::engine::error::EngineError;
use external::ExternalProcessStrategy;
use heuristic::HeuristicApproximationStrategy;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Executes one equilibrium calculation.
///
/// Implementations never return domain failures as errors: non-convergence,
/// timeouts, and parse failures are encoded on the returned
/// [`CalculationResult`] so the orchestrator can record them and continue.
/// Only construction may fail, and only for configuration reasons.
pub trait CalculationStrategy: Send + Sync {
    /// A short label identifying the implementation, recorded on results.
    fn name(&self) -> &'static str;

    fn run(&self, task: &CalculationTask) -> CalculationResult;
}

/// Executable names tried during discovery, most specific first.
const SOLVER_EXECUTABLE_NAMES: [&str; 4] = ["gems3k", "gems-cli", "cemgems", "xgems"];

/// Install locations checked before falling back to PATH.
const COMMON_INSTALL_DIRS: [&str; 4] = ["/usr/local/bin", "/opt/gems", "/opt/cemgems", "/usr/bin"];

/// Selects the calculation strategy for a run.
///
/// An explicitly configured executable must validate; a broken explicit
/// path is a [`EngineError::Configuration`]. Without one, discovery walks
/// the common install locations and PATH, and when nothing usable turns
/// up the heuristic approximation is selected, with a logged warning, so
/// the fallback is recorded rather than silent.
pub fn select_strategy(
    config: &StrategyConfig,
    input_dir: &Path,
    raw_output_dir: &Path,
) -> Result<Box<dyn CalculationStrategy>, EngineError> {
    if let Some(executable) = &config.executable {
        let strategy = ExternalProcessStrategy::new(
            executable.clone(),
            config.database.clone(),
            input_dir.to_path_buf(),
            raw_output_dir.to_path_buf(),
        )?;
        info!(executable = %executable.display(), "Using configured external solver.");
        return Ok(Box::new(strategy));
    }

    if config.discover {
        if let Some(executable) = discover_executable() {
            match ExternalProcessStrategy::new(
                executable.clone(),
                config.database.clone(),
                input_dir.to_path_buf(),
                raw_output_dir.to_path_buf(),
            ) {
                Ok(strategy) => {
                    info!(executable = %executable.display(), "Discovered external solver.");
                    return Ok(Box::new(strategy));
                }
                Err(e) => {
                    warn!(
                        executable = %executable.display(),
                        error = %e,
                        "Discovered solver failed validation; continuing the search."
                    );
                }
            }
        }
    }

    warn!(
        "No usable equilibrium solver found; falling back to the heuristic \
         approximation. Results will be labeled as approximate."
    );
    Ok(Box::new(HeuristicApproximationStrategy::new()))
}

/// Walks common install locations, then PATH, for a known solver name.
fn discover_executable() -> Option<PathBuf> {
    for dir in COMMON_INSTALL_DIRS {
        for name in SOLVER_EXECUTABLE_NAMES {
            let candidate = Path::new(dir).join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    SOLVER_EXECUTABLE_NAMES
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_explicit_executable_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let config = StrategyConfig {
            executable: Some(dir.path().join("no-such-solver")),
            database: None,
            discover: false,
        };
        let result = select_strategy(&config, dir.path(), dir.path());
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn no_solver_and_no_discovery_selects_the_heuristic() {
        let dir = tempdir().unwrap();
        let config = StrategyConfig {
            executable: None,
            database: None,
            discover: false,
        };
        let strategy = select_strategy(&config, dir.path(), dir.path()).unwrap();
        assert_eq!(strategy.name(), "heuristic-approximation");
    }
}
