//! The batch orchestrator: schedules calculation tasks across the design
//! space, sequentially or via a bounded worker pool, with idempotent
//! resume, bounded retries of the failed subset, and run statistics.

use crate::core::io::artifact;
use crate::core::models::result::CalculationResult;
use crate::core::models::task::CalculationTask;
use crate::engine::config::{BatchOptions, SchedulingMode};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{BatchRun, BatchSummary, TaskOutcome};
use crate::engine::strategy::CalculationStrategy;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Outcome of one orchestration run: the finalized statistics plus the
/// results keyed by design point id.
#[derive(Debug)]
pub struct BatchOutcome {
    pub summary: BatchSummary,
    pub results: BTreeMap<String, CalculationResult>,
}

pub struct BatchOrchestrator {
    tasks: Vec<CalculationTask>,
    strategy: Arc<dyn CalculationStrategy>,
    options: BatchOptions,
}

impl BatchOrchestrator {
    pub fn new(
        tasks: Vec<CalculationTask>,
        strategy: Box<dyn CalculationStrategy>,
        options: BatchOptions,
    ) -> Self {
        Self {
            tasks,
            strategy: Arc::from(strategy),
            options,
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// The tasks still to run: the full list minus those whose result
    /// artifact already exists when `skip_existing` is set. This is the
    /// resume mechanism: re-running over the same results directory
    /// submits nothing twice.
    pub fn pending_tasks(&self, skip_existing: bool) -> Vec<CalculationTask> {
        if !skip_existing {
            return self.tasks.clone();
        }
        self.tasks
            .iter()
            .filter(|task| !artifact::result_path(&self.options.results_dir, &task.id).exists())
            .cloned()
            .collect()
    }

    /// Runs all pending tasks under the configured scheduling mode.
    #[instrument(skip_all, name = "batch_run")]
    pub fn run(&self, reporter: &ProgressReporter) -> Result<BatchOutcome, EngineError> {
        let pending = self.pending_tasks(self.options.skip_existing);
        let skipped = self.tasks.len() - pending.len();
        if skipped > 0 {
            info!(skipped, "Resuming: tasks with existing results are skipped.");
            reporter.report(Progress::Message(format!(
                "Resuming: {skipped} task(s) already have results."
            )));
        }

        let mut run = BatchRun::start(pending.len());
        let mut results = BTreeMap::new();

        reporter.report(Progress::TaskStart {
            total_steps: pending.len() as u64,
        });
        match self.options.scheduling {
            SchedulingMode::Sequential => {
                self.drive_sequential(&pending, &mut run, &mut results, reporter)?;
            }
            SchedulingMode::Parallel { workers } => {
                self.drive_parallel(&pending, workers, &mut run, &mut results, reporter)?;
            }
        }
        reporter.report(Progress::TaskFinish);

        for round in 1..=self.options.retry_rounds {
            let failed: Vec<CalculationTask> = pending
                .iter()
                .filter(|task| {
                    results
                        .get(&task.id)
                        .is_some_and(|r: &CalculationResult| !r.is_success())
                })
                .cloned()
                .collect();
            if failed.is_empty() {
                break;
            }
            info!(round, failed = failed.len(), "Retrying failed tasks.");
            reporter.report(Progress::Message(format!(
                "Retry round {round}: {} failed task(s).",
                failed.len()
            )));
            results = self.retry_round(&failed, results, &mut run, reporter)?;
        }

        let summary = run.finalize();
        info!(
            total = summary.total,
            completed = summary.completed,
            failed = summary.failed,
            "Batch run finished."
        );
        Ok(BatchOutcome { summary, results })
    }

    fn drive_sequential(
        &self,
        pending: &[CalculationTask],
        run: &mut BatchRun,
        results: &mut BTreeMap<String, CalculationResult>,
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError> {
        for task in pending {
            let outcome = execute_task(self.strategy.as_ref(), task, &self.options)?;
            results.insert(outcome.id.clone(), outcome.result.clone());
            run.record(&outcome);
            self.report_progress(run, reporter);
        }
        Ok(())
    }

    /// Bounded worker pool. Workers only execute and send their outcome
    /// back over a channel; all statistics folding happens here, on the
    /// orchestrator thread.
    fn drive_parallel(
        &self,
        pending: &[CalculationTask],
        workers: usize,
        run: &mut BatchRun,
        results: &mut BTreeMap<String, CalculationResult>,
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
            .map_err(|e| EngineError::WorkerPool(e.to_string()))?;

        let (sender, receiver) = mpsc::channel::<Result<TaskOutcome, EngineError>>();
        for task in pending.iter().cloned() {
            let strategy = Arc::clone(&self.strategy);
            let options = self.options.clone();
            let sender = sender.clone();
            pool.spawn(move || {
                let outcome = execute_task(strategy.as_ref(), &task, &options);
                // The receiver only disappears if the orchestrator bailed
                // out, in which case the outcome has nowhere to go anyway.
                let _ = sender.send(outcome);
            });
        }
        drop(sender);

        let mut first_error = None;
        for outcome in receiver {
            match outcome {
                Ok(outcome) => {
                    results.insert(outcome.id.clone(), outcome.result.clone());
                    run.record(&outcome);
                    self.report_progress(run, reporter);
                }
                Err(e) => {
                    // Keep draining so the pool finishes cleanly.
                    warn!(error = %e, "Worker reported an artifact error.");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Re-runs the failed subset and merges the outcomes into a fresh
    /// results map: retried rows that now succeed are substituted and the
    /// rest carried over, so no shared row is mutated while iterating.
    fn retry_round(
        &self,
        failed: &[CalculationTask],
        previous: BTreeMap<String, CalculationResult>,
        run: &mut BatchRun,
        reporter: &ProgressReporter,
    ) -> Result<BTreeMap<String, CalculationResult>, EngineError> {
        let mut retried = BTreeMap::new();
        for task in failed {
            let outcome = execute_task(self.strategy.as_ref(), task, &self.options)?;
            if outcome.result.is_success() {
                // The task moves from failed to completed: count the new
                // outcome and release the tally its first attempt left.
                run.record(&outcome);
                if let Some(kind) = previous.get(&task.id).and_then(|r| r.failure) {
                    run.release_failure(kind);
                }
            }
            retried.insert(task.id.clone(), outcome.result);
        }

        reporter.report(Progress::StatusUpdate {
            text: format!("Retry merged {} result(s).", retried.len()),
        });

        Ok(previous
            .into_iter()
            .map(|(id, result)| match retried.remove(&id) {
                Some(new_result) if new_result.is_success() => (id, new_result),
                _ => (id, result),
            })
            .collect())
    }

    fn report_progress(&self, run: &BatchRun, reporter: &ProgressReporter) {
        reporter.report(Progress::TaskIncrement);
        let interval = self.options.progress_interval.max(1);
        if run.processed() % interval == 0 {
            reporter.report(Progress::StatusUpdate {
                text: format!(
                    "{}/{} done, {} failed, ETA {:.1}s",
                    run.processed(),
                    run.total,
                    run.failed,
                    run.eta().as_secs_f64()
                ),
            });
        }
    }
}

/// Runs one task and persists its result artifact. Strategy failures are
/// data on the result; only an unwritable results directory is an error,
/// because resumability is gone without the artifact.
fn execute_task(
    strategy: &dyn CalculationStrategy,
    task: &CalculationTask,
    options: &BatchOptions,
) -> Result<TaskOutcome, EngineError> {
    let started = Instant::now();
    let result = strategy.run(task);
    artifact::write_result(&options.results_dir, &task.id, &result)?;
    Ok(TaskOutcome {
        id: task.id.clone(),
        result,
        duration: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::result::FailureKind;
    use crate::core::models::task::Conditions;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Deterministic stub: counts invocations, fails a configurable id set.
    struct StubStrategy {
        invocations: Arc<AtomicUsize>,
        fail_ids: Vec<String>,
        fail_kind: FailureKind,
        /// Number of failures per id before succeeding (0 = always fail).
        succeed_after: usize,
        attempts: std::sync::Mutex<BTreeMap<String, usize>>,
    }

    impl StubStrategy {
        fn always_ok(invocations: Arc<AtomicUsize>) -> Self {
            Self {
                invocations,
                fail_ids: Vec::new(),
                fail_kind: FailureKind::Convergence,
                succeed_after: 0,
                attempts: std::sync::Mutex::new(BTreeMap::new()),
            }
        }

        fn failing(
            invocations: Arc<AtomicUsize>,
            fail_ids: Vec<String>,
            fail_kind: FailureKind,
            succeed_after: usize,
        ) -> Self {
            Self {
                invocations,
                fail_ids,
                fail_kind,
                succeed_after,
                attempts: std::sync::Mutex::new(BTreeMap::new()),
            }
        }
    }

    impl CalculationStrategy for StubStrategy {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn run(&self, task: &CalculationTask) -> CalculationResult {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.contains(&task.id) {
                let mut attempts = self.attempts.lock().unwrap();
                let n = attempts.entry(task.id.clone()).or_insert(0);
                *n += 1;
                if self.succeed_after == 0 || *n <= self.succeed_after {
                    return CalculationResult::failed(self.fail_kind, "stubbed failure");
                }
            }
            CalculationResult {
                converged: true,
                method: "stub".to_string(),
                phases: [("Calcite".to_string(), 0.1)].into_iter().collect(),
                ph: Some(12.0),
                ..CalculationResult::default()
            }
        }
    }

    fn tasks(n: usize) -> Vec<CalculationTask> {
        use crate::core::chem::phases::PhaseFormulaDb;
        use crate::core::composition::CompositionEngine;
        use crate::core::design::{MixVariables, RawMaterialMasses, REFERENCE_GANGUE_MASS_G};
        use crate::core::materials::MaterialLibrary;

        let library = MaterialLibrary::builtin();
        let formulas = PhaseFormulaDb::builtin();
        let engine = CompositionEngine::new(&library, &formulas);
        let variables = MixVariables {
            binder_aggregate_ratio: 0.6,
            fly_ash_fraction: 0.5,
            co2_fraction: 0.2,
            silicate_dosage: 0.03,
            water_binder_ratio: 1.4,
        };
        let masses =
            RawMaterialMasses::derive(&variables, REFERENCE_GANGUE_MASS_G, 0.416).unwrap();
        let composition = engine.from_masses(&masses, 0.2, 298.15, 1.0).unwrap();

        (0..n)
            .map(|i| CalculationTask {
                id: format!("MIX_{i:04}"),
                composition: composition.clone(),
                conditions: Conditions::default(),
            })
            .collect()
    }

    fn options(dir: &Path, scheduling: SchedulingMode, retry_rounds: usize) -> BatchOptions {
        BatchOptions {
            input_dir: dir.join("inputs"),
            results_dir: dir.join("results"),
            raw_output_dir: dir.join("raw"),
            skip_existing: true,
            scheduling,
            retry_rounds,
            progress_interval: 100,
        }
    }

    #[test]
    fn sequential_run_processes_every_task_once() {
        let dir = tempdir().unwrap();
        let invocations = Arc::new(AtomicUsize::new(0));
        let orchestrator = BatchOrchestrator::new(
            tasks(5),
            Box::new(StubStrategy::always_ok(invocations.clone())),
            options(dir.path(), SchedulingMode::Sequential, 0),
        );

        let outcome = orchestrator.run(&ProgressReporter::new()).unwrap();
        assert_eq!(invocations.load(Ordering::SeqCst), 5);
        assert_eq!(outcome.summary.total, 5);
        assert_eq!(outcome.summary.completed, 5);
        assert_eq!(outcome.summary.failed, 0);
        assert_eq!(outcome.results.len(), 5);
        // Every result artifact was persisted.
        for i in 0..5 {
            assert!(artifact::result_path(&dir.path().join("results"), &format!("MIX_{i:04}"))
                .exists());
        }
    }

    #[test]
    fn second_run_with_skip_existing_issues_zero_invocations() {
        let dir = tempdir().unwrap();
        let invocations = Arc::new(AtomicUsize::new(0));
        let make = || {
            BatchOrchestrator::new(
                tasks(4),
                Box::new(StubStrategy::always_ok(invocations.clone())),
                options(dir.path(), SchedulingMode::Sequential, 0),
            )
        };

        make().run(&ProgressReporter::new()).unwrap();
        assert_eq!(invocations.load(Ordering::SeqCst), 4);

        let second = make().run(&ProgressReporter::new()).unwrap();
        assert_eq!(invocations.load(Ordering::SeqCst), 4, "no new invocations");
        assert_eq!(second.summary.total, 0);
    }

    #[test]
    fn parallel_and_sequential_produce_identical_statistics() {
        let sequential_dir = tempdir().unwrap();
        let parallel_dir = tempdir().unwrap();
        let fail_ids = vec!["MIX_0001".to_string(), "MIX_0003".to_string()];

        let run_with = |dir: &Path, scheduling| {
            let orchestrator = BatchOrchestrator::new(
                tasks(6),
                Box::new(StubStrategy::failing(
                    Arc::new(AtomicUsize::new(0)),
                    fail_ids.clone(),
                    FailureKind::Convergence,
                    0,
                )),
                options(dir, scheduling, 0),
            );
            orchestrator.run(&ProgressReporter::new()).unwrap().summary
        };

        let sequential = run_with(sequential_dir.path(), SchedulingMode::Sequential);
        let parallel = run_with(
            parallel_dir.path(),
            SchedulingMode::Parallel { workers: 3 },
        );

        assert_eq!(sequential.total, parallel.total);
        assert_eq!(sequential.completed, parallel.completed);
        assert_eq!(sequential.failed, parallel.failed);
        assert_eq!(sequential.failure_breakdown, parallel.failure_breakdown);
    }

    #[test]
    fn timeout_failure_is_recorded_and_the_batch_continues() {
        let dir = tempdir().unwrap();
        let orchestrator = BatchOrchestrator::new(
            tasks(3),
            Box::new(StubStrategy::failing(
                Arc::new(AtomicUsize::new(0)),
                vec!["MIX_0001".to_string()],
                FailureKind::Timeout,
                0,
            )),
            options(dir.path(), SchedulingMode::Sequential, 0),
        );

        let outcome = orchestrator.run(&ProgressReporter::new()).unwrap();
        assert_eq!(outcome.summary.total, 3);
        assert_eq!(
            outcome.summary.total,
            outcome.summary.completed + outcome.summary.failed
        );
        assert_eq!(outcome.summary.timeout, 1);
        assert_eq!(outcome.summary.failure_breakdown["timeout"], 1);
        // The non-failing tasks after the timeout still ran.
        assert!(outcome.results["MIX_0002"].converged);
    }

    #[test]
    fn retry_replaces_rows_that_now_succeed() {
        let dir = tempdir().unwrap();
        let invocations = Arc::new(AtomicUsize::new(0));
        let orchestrator = BatchOrchestrator::new(
            tasks(3),
            Box::new(StubStrategy::failing(
                invocations.clone(),
                vec!["MIX_0001".to_string()],
                FailureKind::Convergence,
                1, // fail once, then succeed
            )),
            options(dir.path(), SchedulingMode::Sequential, 3),
        );

        let outcome = orchestrator.run(&ProgressReporter::new()).unwrap();
        // 3 initial + 1 retry; later rounds stop early with nothing failed.
        assert_eq!(invocations.load(Ordering::SeqCst), 4);
        assert!(outcome.results["MIX_0001"].converged);
        assert_eq!(outcome.summary.failed, 0);
        assert_eq!(outcome.summary.completed, 3);
    }

    #[test]
    fn retry_rounds_stop_at_the_configured_limit() {
        let dir = tempdir().unwrap();
        let invocations = Arc::new(AtomicUsize::new(0));
        let orchestrator = BatchOrchestrator::new(
            tasks(2),
            Box::new(StubStrategy::failing(
                invocations.clone(),
                vec!["MIX_0000".to_string()],
                FailureKind::Convergence,
                0, // never succeeds
            )),
            options(dir.path(), SchedulingMode::Sequential, 2),
        );

        let outcome = orchestrator.run(&ProgressReporter::new()).unwrap();
        // 2 initial + 2 retries of the one failing task.
        assert_eq!(invocations.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.summary.failed, 1);
        assert!(!outcome.results["MIX_0000"].converged);
    }

    #[test]
    fn pending_tasks_ignores_results_when_not_skipping() {
        let dir = tempdir().unwrap();
        let invocations = Arc::new(AtomicUsize::new(0));
        let orchestrator = BatchOrchestrator::new(
            tasks(2),
            Box::new(StubStrategy::always_ok(invocations)),
            options(dir.path(), SchedulingMode::Sequential, 0),
        );

        orchestrator.run(&ProgressReporter::new()).unwrap();
        assert_eq!(orchestrator.pending_tasks(true).len(), 0);
        assert_eq!(orchestrator.pending_tasks(false).len(), 2);
    }
}
