//! Joins design points with calculation results into tabular exports.
//!
//! The aggregate is a left join: every design point appears exactly once,
//! and points with no recorded result become non-converged placeholder
//! rows, so the exports always cover the full design space.

use super::IoError;
use crate::core::chem::elements::Element;
use crate::core::composition::BulkComposition;
use crate::core::design::DesignPoint;
use crate::core::models::result::CalculationResult;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// Epsilon added to denominators of derived ratios.
///
/// Derived columns (carbonation degree, Ca/Si ratio) are approximations
/// whenever the denominator is near zero.
pub const RATIO_EPSILON: f64 = 1e-10;

/// One joined row: a design point plus its (possibly placeholder) result.
#[derive(Debug, Clone)]
pub struct AggregateRow {
    pub point: DesignPoint,
    pub result: CalculationResult,
    /// False when this row is a placeholder for a missing result.
    pub has_result: bool,
    /// Input Ca and Si moles, when the bulk composition is available.
    pub input_ca_mol: Option<f64>,
    pub input_si_mol: Option<f64>,
}

impl AggregateRow {
    /// Moles of calcite formed per mole of input calcium. Approximate when
    /// the input calcium is near zero.
    pub fn carbonation_degree(&self) -> Option<f64> {
        let calcite = self.result.phases.get("Calcite")?;
        let input_ca = self.input_ca_mol?;
        Some(calcite / (input_ca + RATIO_EPSILON))
    }

    /// Input Ca/Si molar ratio. Approximate when silicon is near zero.
    pub fn ca_si_ratio(&self) -> Option<f64> {
        let ca = self.input_ca_mol?;
        let si = self.input_si_mol?;
        Some(ca / (si + RATIO_EPSILON))
    }
}

/// The joined dataset plus the union of observed phase names.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub rows: Vec<AggregateRow>,
    pub phase_names: Vec<String>,
}

/// Convergence-rate statistics for one level of one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelStat {
    pub level: f64,
    pub total: usize,
    pub converged: usize,
    pub convergence_rate: f64,
}

/// The JSON summary document exported next to the tables.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSummary {
    pub total_points: usize,
    pub with_result: usize,
    pub converged: usize,
    pub convergence_rate: f64,
    pub unique_phases: usize,
    pub total_execution_time_s: f64,
    pub mean_execution_time_s: f64,
    /// Convergence breakdown per independent variable, level by level.
    pub by_variable: BTreeMap<String, Vec<LevelStat>>,
}

/// Left-joins design points to results by id. Points without a result get
/// a non-converged placeholder row. `compositions` (when provided) supplies
/// the input Ca/Si moles used for the derived columns.
pub fn aggregate(
    points: &[DesignPoint],
    results: &BTreeMap<String, CalculationResult>,
    compositions: Option<&BTreeMap<String, BulkComposition>>,
) -> Aggregate {
    let mut phase_names = BTreeSet::new();
    let mut rows = Vec::with_capacity(points.len());

    for point in points {
        let has_result = results.contains_key(&point.id);
        let result = results.get(&point.id).cloned().unwrap_or_else(|| {
            CalculationResult {
                converged: false,
                error: Some("No result recorded for this design point".to_string()),
                ..CalculationResult::default()
            }
        });
        phase_names.extend(result.phases.keys().cloned());

        let composition = compositions.and_then(|map| map.get(&point.id));
        rows.push(AggregateRow {
            point: point.clone(),
            result,
            has_result,
            input_ca_mol: composition.map(|c| c.moles(Element::Ca)),
            input_si_mol: composition.map(|c| c.moles(Element::Si)),
        });
    }

    info!(
        rows = rows.len(),
        phases = phase_names.len(),
        "Aggregated design points with results."
    );

    Aggregate {
        rows,
        phase_names: phase_names.into_iter().collect(),
    }
}

impl Aggregate {
    /// Writes the wide table: one row per design point, one column per
    /// phase (zero where absent), plus scalar properties and derived
    /// columns.
    pub fn write_wide_csv(&self, path: &Path) -> Result<(), IoError> {
        let as_csv = |e: csv::Error| IoError::Csv {
            path: path.to_string_lossy().to_string(),
            source: e,
        };

        let mut writer = csv::Writer::from_path(path).map_err(as_csv)?;

        let mut header = vec![
            "mix_id".to_string(),
            "R".to_string(),
            "f_FA".to_string(),
            "yCO2".to_string(),
            "w_SS".to_string(),
            "w_b".to_string(),
            "converged".to_string(),
            "method".to_string(),
            "pH".to_string(),
            "pe".to_string(),
            "ionic_strength".to_string(),
            "n_phases".to_string(),
            "execution_time_s".to_string(),
        ];
        header.extend(self.phase_names.iter().map(|p| format!("{p}_mol")));
        header.push("ca_si_ratio".to_string());
        header.push("carbonation_degree".to_string());
        writer.write_record(&header).map_err(as_csv)?;

        for row in &self.rows {
            let vars = &row.point.variables;
            let mut record = vec![
                row.point.id.clone(),
                format_f64(vars.binder_aggregate_ratio),
                format_f64(vars.fly_ash_fraction),
                format_f64(vars.co2_fraction),
                format_f64(vars.silicate_dosage),
                format_f64(vars.water_binder_ratio),
                row.result.converged.to_string(),
                row.result.method.clone(),
                format_optional(row.result.ph),
                format_optional(row.result.pe),
                format_optional(row.result.ionic_strength),
                row.result.phases.len().to_string(),
                format_f64(row.result.execution_time_s),
            ];
            for phase in &self.phase_names {
                let amount = row.result.phases.get(phase).copied().unwrap_or(0.0);
                record.push(format_f64(amount));
            }
            record.push(format_optional(row.ca_si_ratio()));
            record.push(format_optional(row.carbonation_degree()));
            writer.write_record(&record).map_err(as_csv)?;
        }

        writer.flush().map_err(|e| IoError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Ok(())
    }

    /// Writes the long table: one row per design point × phase pair, with
    /// zero-amount phases dropped.
    pub fn write_long_csv(&self, path: &Path) -> Result<(), IoError> {
        let as_csv = |e: csv::Error| IoError::Csv {
            path: path.to_string_lossy().to_string(),
            source: e,
        };

        let mut writer = csv::Writer::from_path(path).map_err(as_csv)?;
        writer
            .write_record(["mix_id", "R", "f_FA", "yCO2", "w_SS", "w_b", "phase", "amount_mol"])
            .map_err(as_csv)?;

        for row in &self.rows {
            let vars = &row.point.variables;
            for (phase, amount) in &row.result.phases {
                if *amount <= 0.0 {
                    continue;
                }
                writer
                    .write_record([
                        row.point.id.as_str(),
                        &format_f64(vars.binder_aggregate_ratio),
                        &format_f64(vars.fly_ash_fraction),
                        &format_f64(vars.co2_fraction),
                        &format_f64(vars.silicate_dosage),
                        &format_f64(vars.water_binder_ratio),
                        phase,
                        &format_f64(*amount),
                    ])
                    .map_err(as_csv)?;
            }
        }

        writer.flush().map_err(|e| IoError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Ok(())
    }

    /// Builds the summary document: counts, rates, timing, and a
    /// convergence-rate breakdown per variable level.
    pub fn summary(&self) -> AggregateSummary {
        let total_points = self.rows.len();
        let with_result = self.rows.iter().filter(|r| r.has_result).count();
        let converged = self.rows.iter().filter(|r| r.result.converged).count();
        let total_time: f64 = self.rows.iter().map(|r| r.result.execution_time_s).sum();

        let variables: [(&str, fn(&DesignPoint) -> f64); 5] = [
            ("R", |p| p.variables.binder_aggregate_ratio),
            ("f_FA", |p| p.variables.fly_ash_fraction),
            ("yCO2", |p| p.variables.co2_fraction),
            ("w_SS", |p| p.variables.silicate_dosage),
            ("w_b", |p| p.variables.water_binder_ratio),
        ];

        let mut by_variable = BTreeMap::new();
        for (name, accessor) in variables {
            // Group by the level's bit pattern; levels come from finite
            // config lists, so equal levels are bit-identical.
            let mut groups: BTreeMap<u64, (f64, usize, usize)> = BTreeMap::new();
            for row in &self.rows {
                let level = accessor(&row.point);
                let entry = groups.entry(level.to_bits()).or_insert((level, 0, 0));
                entry.1 += 1;
                if row.result.converged {
                    entry.2 += 1;
                }
            }
            let mut stats: Vec<LevelStat> = groups
                .into_values()
                .map(|(level, total, converged)| LevelStat {
                    level,
                    total,
                    converged,
                    convergence_rate: converged as f64 / total as f64,
                })
                .collect();
            stats.sort_by(|a, b| a.level.total_cmp(&b.level));
            by_variable.insert(name.to_string(), stats);
        }

        AggregateSummary {
            total_points,
            with_result,
            converged,
            convergence_rate: if total_points > 0 {
                converged as f64 / total_points as f64
            } else {
                0.0
            },
            unique_phases: self.phase_names.len(),
            total_execution_time_s: total_time,
            mean_execution_time_s: if with_result > 0 {
                total_time / with_result as f64
            } else {
                0.0
            },
            by_variable,
        }
    }

    pub fn write_summary_json(&self, path: &Path) -> Result<(), IoError> {
        super::artifact::write_json_atomic(path, &self.summary())
    }
}

fn format_f64(value: f64) -> String {
    format!("{value:.8}")
}

fn format_optional(value: Option<f64>) -> String {
    value.map(format_f64).unwrap_or_default()
}
