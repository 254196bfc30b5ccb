//! The aggregation workflow: parses every result artifact of a finished
//! (or partially finished) sweep, validates it, joins it with the design
//! points, and writes the tabular exports.

use crate::core::composition::BulkComposition;
use crate::core::design::DesignSpace;
use crate::core::io::aggregate::{self, AggregateSummary};
use crate::core::io::{artifact, parser, validator};
use crate::core::models::result::CalculationResult;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Configuration of one aggregation pass.
#[derive(Debug, Clone)]
pub struct AggregateConfig {
    /// The design space the results belong to; points are re-enumerated
    /// deterministically from it.
    pub design: DesignSpace,
    /// Directory holding the result artifacts.
    pub results_dir: PathBuf,
    /// Directory the exports are written to.
    pub out_dir: PathBuf,
}

/// Paths of the written exports plus the summary document.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub wide_csv: PathBuf,
    pub long_csv: PathBuf,
    pub summary_json: PathBuf,
    pub summary: AggregateSummary,
    /// Ids whose parsed result failed plausibility validation, with the
    /// warnings raised.
    pub validation_warnings: BTreeMap<String, Vec<String>>,
}

/// Parses, validates, joins, and exports. Missing artifacts become
/// placeholder rows; a single bad artifact never aborts the pass.
#[instrument(skip_all, name = "aggregate_workflow")]
pub fn run(
    config: &AggregateConfig,
    compositions: Option<&BTreeMap<String, BulkComposition>>,
    reporter: &ProgressReporter,
) -> Result<AggregateOutcome, EngineError> {
    let points = config.design.enumerate()?;

    reporter.report(Progress::PhaseStart {
        name: "Parsing result artifacts",
    });
    reporter.report(Progress::TaskStart {
        total_steps: points.len() as u64,
    });

    let mut results: BTreeMap<String, CalculationResult> = BTreeMap::new();
    let mut validation_warnings = BTreeMap::new();
    for point in &points {
        let path = artifact::result_path(&config.results_dir, &point.id);
        if path.exists() {
            let result = parser::parse(&path);
            let validation = validator::validate(&result);
            if !validation.is_valid {
                warn!(id = %point.id, warnings = ?validation.warnings, "Result failed validation.");
                validation_warnings.insert(point.id.clone(), validation.warnings);
            }
            results.insert(point.id.clone(), result);
        }
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    info!(
        points = points.len(),
        parsed = results.len(),
        invalid = validation_warnings.len(),
        "Result artifacts parsed."
    );

    reporter.report(Progress::PhaseStart {
        name: "Writing exports",
    });
    let aggregate = aggregate::aggregate(&points, &results, compositions);

    std::fs::create_dir_all(&config.out_dir).map_err(|e| {
        EngineError::Artifact {
            source: crate::core::io::IoError::Io {
                path: config.out_dir.to_string_lossy().to_string(),
                source: e,
            },
        }
    })?;
    let wide_csv = config.out_dir.join("results_wide.csv");
    let long_csv = config.out_dir.join("results_long.csv");
    let summary_json = config.out_dir.join("summary.json");

    aggregate.write_wide_csv(&wide_csv)?;
    aggregate.write_long_csv(&long_csv)?;
    aggregate.write_summary_json(&summary_json)?;
    reporter.report(Progress::PhaseFinish);

    let summary = aggregate.summary();
    info!(
        rows = summary.total_points,
        converged = summary.converged,
        "Exports written."
    );

    Ok(AggregateOutcome {
        wide_csv,
        long_csv,
        summary_json,
        summary,
        validation_warnings,
    })
}

/// Convenience joining a sweep outcome directly, without re-reading disk.
pub fn export_outcome(
    points: &[crate::core::design::DesignPoint],
    results: &BTreeMap<String, CalculationResult>,
    compositions: Option<&BTreeMap<String, BulkComposition>>,
    out_dir: &Path,
) -> Result<AggregateOutcome, EngineError> {
    std::fs::create_dir_all(out_dir).map_err(|e| EngineError::Artifact {
        source: crate::core::io::IoError::Io {
            path: out_dir.to_string_lossy().to_string(),
            source: e,
        },
    })?;

    let aggregate = aggregate::aggregate(points, results, compositions);
    let wide_csv = out_dir.join("results_wide.csv");
    let long_csv = out_dir.join("results_long.csv");
    let summary_json = out_dir.join("summary.json");

    aggregate.write_wide_csv(&wide_csv)?;
    aggregate.write_long_csv(&long_csv)?;
    aggregate.write_summary_json(&summary_json)?;

    let mut validation_warnings = BTreeMap::new();
    for (id, result) in results {
        let validation = validator::validate(result);
        if !validation.is_valid {
            validation_warnings.insert(id.clone(), validation.warnings);
        }
    }

    Ok(AggregateOutcome {
        wide_csv,
        long_csv,
        summary_json,
        summary: aggregate.summary(),
        validation_warnings,
    })
}
