//! The sweep workflow: the end-to-end procedure from design-space
//! enumeration to a finished batch of equilibrium results.

use crate::core::chem::phases::PhaseFormulaDb;
use crate::core::composition::{BulkComposition, CompositionEngine};
use crate::core::design::{DesignPoint, RawMaterialMasses, REFERENCE_GANGUE_MASS_G};
use crate::core::io::artifact::{self, TaskDocument};
use crate::core::materials::MaterialLibrary;
use crate::core::models::result::CalculationResult;
use crate::core::models::task::{CalculationTask, Conditions, default_enabled_phases};
use crate::engine::batch::BatchOrchestrator;
use crate::engine::config::SweepConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::BatchSummary;
use crate::engine::strategy::{CalculationStrategy, select_strategy};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Everything a finished sweep hands back: the statistics, the results
/// keyed by design point id, the enumerated points, and the compositions
/// that produced the tasks (for derived columns at aggregation time).
#[derive(Debug)]
pub struct SweepOutcome {
    pub summary: BatchSummary,
    pub results: BTreeMap<String, CalculationResult>,
    pub points: Vec<DesignPoint>,
    pub compositions: BTreeMap<String, BulkComposition>,
    pub strategy_name: &'static str,
}

/// Runs a complete sweep: enumerate, derive compositions, write input
/// artifacts, select a strategy, and orchestrate the batch.
#[instrument(skip_all, name = "sweep_workflow")]
pub fn run(
    config: &SweepConfig,
    reporter: &ProgressReporter,
) -> Result<SweepOutcome, EngineError> {
    run_with(config, reporter, None)
}

/// Like [`run`], but with an injected strategy (deterministic stubs in
/// tests, pre-validated solvers in daemons). `None` selects via discovery.
pub fn run_with(
    config: &SweepConfig,
    reporter: &ProgressReporter,
    strategy: Option<Box<dyn CalculationStrategy>>,
) -> Result<SweepOutcome, EngineError> {
    // === Phase 1: Enumerate the design space ===
    reporter.report(Progress::PhaseStart {
        name: "Enumerating design space",
    });
    let points = config.design.enumerate()?;
    info!(points = points.len(), "Design space enumerated.");
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Derive compositions and build tasks ===
    reporter.report(Progress::PhaseStart {
        name: "Deriving compositions",
    });
    let library = MaterialLibrary::builtin();
    let formulas = PhaseFormulaDb::builtin();
    let engine = CompositionEngine::new(&library, &formulas)
        .with_mass_balance_tolerance(config.mass_balance_tolerance);
    let pressure_atm = config.pressure_bar / 1.01325;

    let mut tasks = Vec::with_capacity(points.len());
    let mut compositions = BTreeMap::new();
    let mut worst_balance: f64 = 0.0;
    for point in &points {
        let masses = RawMaterialMasses::derive(
            &point.variables,
            REFERENCE_GANGUE_MASS_G,
            library.silicate_water_fraction(),
        )?;
        let composition = engine.from_masses(
            &masses,
            point.variables.co2_fraction,
            config.temperature_k,
            pressure_atm,
        )?;
        let report = engine.validate_mass_balance(&composition, masses.total_g);
        worst_balance = worst_balance.max(report.relative_error);

        compositions.insert(point.id.clone(), composition.clone());
        tasks.push(CalculationTask {
            id: point.id.clone(),
            composition,
            conditions: Conditions {
                temperature_k: config.temperature_k,
                pressure_bar: config.pressure_bar,
                co2_fraction: point.variables.co2_fraction,
                enabled_phases: default_enabled_phases(),
                timeout_secs: config.timeout_secs,
            },
        });
    }
    if worst_balance > config.mass_balance_tolerance {
        warn!(
            worst_relative_error = worst_balance,
            tolerance = config.mass_balance_tolerance,
            "Mass balance exceeds tolerance for some mixes (gas-phase CO2 estimate)."
        );
    }
    info!(tasks = tasks.len(), worst_balance, "Tasks prepared.");
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Write input artifacts ===
    reporter.report(Progress::PhaseStart {
        name: "Writing input artifacts",
    });
    for task in &tasks {
        let path = artifact::input_path(&config.batch.input_dir, &task.id);
        if !path.exists() {
            TaskDocument::from_task(task).write(&path)?;
        }
    }
    reporter.report(Progress::PhaseFinish);

    // === Phase 4: Select the calculation strategy ===
    // Configuration problems surface here, before any task runs.
    let strategy = match strategy {
        Some(strategy) => strategy,
        None => select_strategy(
            &config.strategy,
            &config.batch.input_dir,
            &config.batch.raw_output_dir,
        )?,
    };
    let strategy_name = strategy.name();
    reporter.report(Progress::Message(format!(
        "Calculation strategy: {strategy_name}"
    )));

    // === Phase 5: Orchestrate the batch ===
    reporter.report(Progress::PhaseStart {
        name: "Running equilibrium calculations",
    });
    let orchestrator = BatchOrchestrator::new(tasks, strategy, config.batch.clone());
    let outcome = orchestrator.run(reporter)?;
    reporter.report(Progress::PhaseFinish);

    info!(
        completed = outcome.summary.completed,
        failed = outcome.summary.failed,
        strategy = strategy_name,
        "Sweep finished."
    );

    Ok(SweepOutcome {
        summary: outcome.summary,
        results: outcome.results,
        points,
        compositions,
        strategy_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::design::DesignSpace;
    use crate::engine::config::{SchedulingMode, SweepConfigBuilder};
    use crate::engine::strategy::heuristic::HeuristicApproximationStrategy;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn small_space() -> DesignSpace {
        DesignSpace {
            binder_aggregate_ratios: vec![0.3, 0.9],
            fly_ash_fractions: vec![0.0, 0.5],
            co2_fractions: vec![0.0, 0.25],
            silicate_dosages: vec![0.03],
            water_binder_ratios: vec![1.4],
        }
    }

    #[test]
    fn full_sweep_with_heuristic_strategy_covers_every_point() {
        let dir = tempdir().unwrap();
        let config = SweepConfigBuilder::new()
            .design(small_space())
            .work_dir(dir.path().to_path_buf())
            .discover(false)
            .build()
            .unwrap();

        let outcome = run_with(
            &config,
            &ProgressReporter::new(),
            Some(Box::new(HeuristicApproximationStrategy::new())),
        )
        .unwrap();

        assert_eq!(outcome.points.len(), 8);
        assert_eq!(outcome.results.len(), 8);
        assert_eq!(outcome.summary.completed, 8);
        assert_eq!(outcome.summary.failed, 0);

        let ids: HashSet<_> = outcome.results.keys().collect();
        assert_eq!(ids.len(), 8);

        // Input and result artifacts exist for every point.
        for point in &outcome.points {
            assert!(artifact::input_path(&dir.path().join("inputs"), &point.id).exists());
            assert!(artifact::result_path(&dir.path().join("results"), &point.id).exists());
        }
    }

    #[test]
    fn rerunning_a_finished_sweep_processes_nothing() {
        let dir = tempdir().unwrap();
        let config = SweepConfigBuilder::new()
            .design(small_space())
            .work_dir(dir.path().to_path_buf())
            .discover(false)
            .build()
            .unwrap();

        let first = run_with(
            &config,
            &ProgressReporter::new(),
            Some(Box::new(HeuristicApproximationStrategy::new())),
        )
        .unwrap();
        assert_eq!(first.summary.total, 8);

        let second = run_with(
            &config,
            &ProgressReporter::new(),
            Some(Box::new(HeuristicApproximationStrategy::new())),
        )
        .unwrap();
        assert_eq!(second.summary.total, 0, "all tasks resumed from disk");
    }

    #[test]
    fn parallel_sweep_matches_sequential_results() {
        let sequential_dir = tempdir().unwrap();
        let parallel_dir = tempdir().unwrap();

        let run_mode = |dir: &std::path::Path, scheduling| {
            let config = SweepConfigBuilder::new()
                .design(small_space())
                .work_dir(dir.to_path_buf())
                .scheduling(scheduling)
                .discover(false)
                .build()
                .unwrap();
            run_with(
                &config,
                &ProgressReporter::new(),
                Some(Box::new(HeuristicApproximationStrategy::new())),
            )
            .unwrap()
        };

        let sequential = run_mode(sequential_dir.path(), SchedulingMode::Sequential);
        let parallel = run_mode(
            parallel_dir.path(),
            SchedulingMode::Parallel { workers: 4 },
        );

        assert_eq!(sequential.summary.completed, parallel.summary.completed);
        // The heuristic is deterministic, so per-point results agree.
        for (id, result) in &sequential.results {
            assert_eq!(result.phases, parallel.results[id].phases, "{id}");
        }
    }

    #[test]
    fn compositions_are_cached_for_every_task() {
        let dir = tempdir().unwrap();
        let config = SweepConfigBuilder::new()
            .design(small_space())
            .work_dir(dir.path().to_path_buf())
            .discover(false)
            .build()
            .unwrap();

        let outcome = run_with(
            &config,
            &ProgressReporter::new(),
            Some(Box::new(HeuristicApproximationStrategy::new())),
        )
        .unwrap();

        assert_eq!(outcome.compositions.len(), outcome.points.len());
        for composition in outcome.compositions.values() {
            assert!(composition.total_element_mass_g > 0.0);
        }
    }
}
