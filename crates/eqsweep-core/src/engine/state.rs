//! Mutable batch statistics, owned exclusively by the orchestrator.
//!
//! Workers never touch a [`BatchRun`]; they hand their outcome back and
//! the orchestrator folds it in after the fact, so the statistics stay
//! race-free under any scheduling mode.

use crate::core::models::result::{CalculationResult, FailureKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// The outcome of one task, as handed back by a worker.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub id: String,
    pub result: CalculationResult,
    pub duration: Duration,
}

/// Counters accumulated over one orchestration run.
#[derive(Debug)]
pub struct BatchRun {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub timeout: usize,
    pub non_converged: usize,
    error_kinds: BTreeMap<&'static str, usize>,
    started: Instant,
    task_time: Duration,
    min_task_time: Option<Duration>,
    max_task_time: Option<Duration>,
}

impl BatchRun {
    pub fn start(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            timeout: 0,
            non_converged: 0,
            error_kinds: BTreeMap::new(),
            started: Instant::now(),
            task_time: Duration::ZERO,
            min_task_time: None,
            max_task_time: None,
        }
    }

    /// Folds one task outcome into the counters.
    pub fn record(&mut self, outcome: &TaskOutcome) {
        match outcome.result.failure {
            None => {
                self.completed += 1;
                if !outcome.result.converged {
                    self.non_converged += 1;
                }
            }
            Some(kind) => {
                self.failed += 1;
                if kind == FailureKind::Timeout {
                    self.timeout += 1;
                }
                *self.error_kinds.entry(kind.label()).or_insert(0) += 1;
            }
        }
        self.task_time += outcome.duration;
        self.min_task_time = Some(match self.min_task_time {
            Some(min) => min.min(outcome.duration),
            None => outcome.duration,
        });
        self.max_task_time = Some(match self.max_task_time {
            Some(max) => max.max(outcome.duration),
            None => outcome.duration,
        });
    }

    /// Releases a previously recorded failure tally, used when a retry of
    /// the task later succeeds and [`record`](Self::record)s that success.
    pub fn release_failure(&mut self, kind: FailureKind) {
        self.failed = self.failed.saturating_sub(1);
        if kind == FailureKind::Timeout {
            self.timeout = self.timeout.saturating_sub(1);
        }
        if let Some(count) = self.error_kinds.get_mut(kind.label()) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.error_kinds.remove(kind.label());
            }
        }
    }

    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }

    /// Mean wall-clock time per processed task so far.
    pub fn mean_task_time(&self) -> Duration {
        let processed = self.processed();
        if processed == 0 {
            Duration::ZERO
        } else {
            self.task_time / processed as u32
        }
    }

    /// Extrapolated time remaining, from the mean per-task time so far.
    pub fn eta(&self) -> Duration {
        let remaining = self.total.saturating_sub(self.processed());
        self.mean_task_time() * remaining as u32
    }

    /// Finalizes the run into an immutable summary.
    pub fn finalize(self) -> BatchSummary {
        let processed = self.processed();
        let converged = self.completed - self.non_converged;
        BatchSummary {
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            timeout: self.timeout,
            non_converged: self.non_converged,
            success_rate: rate(self.completed, self.total),
            convergence_rate: rate(converged, self.total),
            wall_clock_s: self.started.elapsed().as_secs_f64(),
            total_task_time_s: self.task_time.as_secs_f64(),
            mean_task_time_s: if processed == 0 {
                0.0
            } else {
                self.task_time.as_secs_f64() / processed as f64
            },
            min_task_time_s: self.min_task_time.map(|d| d.as_secs_f64()).unwrap_or(0.0),
            max_task_time_s: self.max_task_time.map(|d| d.as_secs_f64()).unwrap_or(0.0),
            failure_breakdown: self
                .error_kinds
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Immutable summary of one finished batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub timeout: usize,
    pub non_converged: usize,
    pub success_rate: f64,
    pub convergence_rate: f64,
    pub wall_clock_s: f64,
    pub total_task_time_s: f64,
    pub mean_task_time_s: f64,
    pub min_task_time_s: f64,
    pub max_task_time_s: f64,
    /// Failure counts keyed by error kind label.
    pub failure_breakdown: BTreeMap<String, usize>,
}
