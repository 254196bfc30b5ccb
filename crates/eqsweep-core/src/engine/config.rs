use crate::core::design::DesignSpace;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

/// How pending tasks are scheduled across the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingMode {
    /// Single thread of control, deterministic task order.
    Sequential,
    /// Bounded worker pool; each worker drives one external calculation at
    /// a time, so a stuck solver only stalls its own slot.
    Parallel { workers: usize },
}

/// Calculation-strategy selection inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyConfig {
    /// Explicit solver executable. When set, it must validate; a broken
    /// explicit path is a configuration error rather than a fallback.
    pub executable: Option<PathBuf>,
    /// Thermodynamic database handed to the solver, if any.
    pub database: Option<PathBuf>,
    /// Allow searching common install locations and PATH when no explicit
    /// executable is configured.
    pub discover: bool,
}

/// Batch execution options.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Where task input artifacts are written.
    pub input_dir: PathBuf,
    /// Where result artifacts are written (and looked up on resume).
    pub results_dir: PathBuf,
    /// Where raw solver output is written by the external strategy.
    pub raw_output_dir: PathBuf,
    /// Skip tasks whose result artifact already exists.
    pub skip_existing: bool,
    pub scheduling: SchedulingMode,
    /// Retry rounds for the failed subset after the initial batch.
    pub retry_rounds: usize,
    /// Report progress every this many completed tasks.
    pub progress_interval: usize,
}

/// Complete configuration of one sweep run.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub design: DesignSpace,
    pub temperature_k: f64,
    pub pressure_bar: f64,
    pub timeout_secs: u64,
    pub mass_balance_tolerance: f64,
    pub strategy: StrategyConfig,
    pub batch: BatchOptions,
}

#[derive(Default)]
pub struct SweepConfigBuilder {
    design: Option<DesignSpace>,
    temperature_k: Option<f64>,
    pressure_bar: Option<f64>,
    timeout_secs: Option<u64>,
    mass_balance_tolerance: Option<f64>,
    executable: Option<PathBuf>,
    database: Option<PathBuf>,
    discover: bool,
    work_dir: Option<PathBuf>,
    skip_existing: Option<bool>,
    scheduling: Option<SchedulingMode>,
    retry_rounds: Option<usize>,
    progress_interval: Option<usize>,
}

impl SweepConfigBuilder {
    pub fn new() -> Self {
        Self {
            discover: true,
            ..Self::default()
        }
    }

    pub fn design(mut self, design: DesignSpace) -> Self {
        self.design = Some(design);
        self
    }
    pub fn temperature_k(mut self, value: f64) -> Self {
        self.temperature_k = Some(value);
        self
    }
    pub fn pressure_bar(mut self, value: f64) -> Self {
        self.pressure_bar = Some(value);
        self
    }
    pub fn timeout_secs(mut self, value: u64) -> Self {
        self.timeout_secs = Some(value);
        self
    }
    pub fn mass_balance_tolerance(mut self, value: f64) -> Self {
        self.mass_balance_tolerance = Some(value);
        self
    }
    pub fn executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }
    pub fn database(mut self, path: PathBuf) -> Self {
        self.database = Some(path);
        self
    }
    pub fn discover(mut self, discover: bool) -> Self {
        self.discover = discover;
        self
    }
    /// Root directory for artifacts; inputs, results, and raw solver
    /// output land in subdirectories beneath it.
    pub fn work_dir(mut self, path: PathBuf) -> Self {
        self.work_dir = Some(path);
        self
    }
    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = Some(skip);
        self
    }
    pub fn scheduling(mut self, mode: SchedulingMode) -> Self {
        self.scheduling = Some(mode);
        self
    }
    pub fn retry_rounds(mut self, rounds: usize) -> Self {
        self.retry_rounds = Some(rounds);
        self
    }
    pub fn progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<SweepConfig, ConfigError> {
        let work_dir = self.work_dir.ok_or(ConfigError::MissingParameter("work_dir"))?;

        Ok(SweepConfig {
            design: self.design.unwrap_or_default(),
            temperature_k: self
                .temperature_k
                .unwrap_or(crate::core::models::task::DEFAULT_TEMPERATURE_K),
            pressure_bar: self
                .pressure_bar
                .unwrap_or(crate::core::models::task::DEFAULT_PRESSURE_BAR),
            timeout_secs: self
                .timeout_secs
                .unwrap_or(crate::core::models::task::DEFAULT_TIMEOUT_SECS),
            mass_balance_tolerance: self
                .mass_balance_tolerance
                .unwrap_or(crate::core::composition::DEFAULT_MASS_BALANCE_TOLERANCE),
            strategy: StrategyConfig {
                executable: self.executable,
                database: self.database,
                discover: self.discover,
            },
            batch: BatchOptions {
                input_dir: work_dir.join("inputs"),
                results_dir: work_dir.join("results"),
                raw_output_dir: work_dir.join("raw"),
                skip_existing: self.skip_existing.unwrap_or(true),
                scheduling: self.scheduling.unwrap_or(SchedulingMode::Sequential),
                retry_rounds: self.retry_rounds.unwrap_or(0),
                progress_interval: self.progress_interval.unwrap_or(100),
            },
        })
    }
}
