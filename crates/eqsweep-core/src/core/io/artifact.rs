//! Task input and result artifacts.
//!
//! Each design point gets one self-describing input document and, once
//! processed, one result document, both at deterministic paths derived
//! from the design point id. Absence of a result artifact means "not yet
//! processed"; presence (even non-converged) means "processing attempted
//! and recorded". All writes go through a temp-file-and-rename so a crash
//! mid-write never leaves a truncated file that looks complete.

use super::IoError;
use crate::core::models::result::CalculationResult;
use crate::core::models::task::CalculationTask;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Deterministic input-artifact path for a design point id.
pub fn input_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.json"))
}

/// Deterministic result-artifact path for a design point id.
pub fn result_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.json"))
}

/// Deterministic raw-solver-output path for a design point id.
pub fn raw_output_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.out"))
}

/// The self-describing input document handed to a solver: element moles,
/// conditions, gas-phase composition, and the enabled-phase list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub name: String,
    pub temperature_k: f64,
    pub pressure_bar: f64,
    pub pco2_bar: f64,
    /// Element symbol → moles.
    pub bulk_composition: BTreeMap<String, f64>,
    /// Gas species → partial pressure in bar.
    pub gas_phase: BTreeMap<String, f64>,
    pub enabled_phases: Vec<String>,
}

impl TaskDocument {
    pub fn from_task(task: &CalculationTask) -> Self {
        let conditions = &task.conditions;
        let pco2 = conditions.pco2_bar();

        // The remainder of the gas phase is treated as water vapor; the
        // gas phase is omitted entirely when there is no CO2.
        let mut gas_phase = BTreeMap::new();
        if pco2 > 1e-10 {
            gas_phase.insert("CO2".to_string(), pco2);
            let ph2o = conditions.pressure_bar - pco2;
            if ph2o > 0.0 {
                gas_phase.insert("H2O_gas".to_string(), ph2o);
            }
        }

        Self {
            name: task.id.clone(),
            temperature_k: conditions.temperature_k,
            pressure_bar: conditions.pressure_bar,
            pco2_bar: pco2,
            bulk_composition: task.composition.to_symbol_map(),
            gas_phase,
            enabled_phases: conditions.enabled_phases.clone(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), IoError> {
        write_json_atomic(path, self)
    }

    pub fn read(path: &Path) -> Result<Self, IoError> {
        let content = fs::read_to_string(path).map_err(|e| IoError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| IoError::Json {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}

/// Persists a calculation result at its deterministic path.
pub fn write_result(dir: &Path, id: &str, result: &CalculationResult) -> Result<(), IoError> {
    write_json_atomic(&result_path(dir, id), result)
}

/// Serializes `value` to `path` atomically: the document is written to a
/// sibling temp file and renamed into place, so readers either see the old
/// artifact or the complete new one, never a partial write.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let as_io = |e: std::io::Error| IoError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(as_io)?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|e| IoError::Json {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content).map_err(as_io)?;
    fs::rename(&tmp_path, path).map_err(as_io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::result::FailureKind;
    use crate::core::models::task::Conditions;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn sample_task() -> CalculationTask {
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
            co2_fraction: 0.25,
            silicate_dosage: 0.03,
            water_binder_ratio: 1.4,
        };
        let masses =
            RawMaterialMasses::derive(&variables, REFERENCE_GANGUE_MASS_G, 0.416).unwrap();
        let composition = engine.from_masses(&masses, 0.25, 298.15, 1.0).unwrap();

        CalculationTask {
            id: "MIX_0042".to_string(),
            composition,
            conditions: Conditions {
                co2_fraction: 0.25,
                ..Conditions::default()
            },
        }
    }

    #[test]
    fn input_document_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let task = sample_task();
        let document = TaskDocument::from_task(&task);

        let path = input_path(dir.path(), &task.id);
        document.write(&path).unwrap();
        let read_back = TaskDocument::read(&path).unwrap();

        assert_eq!(read_back, document);
        assert_eq!(read_back.name, "MIX_0042");
    }

    #[test]
    fn gas_phase_carries_co2_and_water_vapor_partial_pressures() {
        let task = sample_task();
        let document = TaskDocument::from_task(&task);

        let pco2 = document.gas_phase["CO2"];
        let ph2o = document.gas_phase["H2O_gas"];
        assert_relative_eq!(pco2, 0.25 * task.conditions.pressure_bar, epsilon = 1e-12);
        assert_relative_eq!(pco2 + ph2o, task.conditions.pressure_bar, epsilon = 1e-12);
    }

    #[test]
    fn gas_phase_is_omitted_without_co2() {
        let mut task = sample_task();
        task.conditions.co2_fraction = 0.0;
        let document = TaskDocument::from_task(&task);
        assert!(document.gas_phase.is_empty());
    }

    #[test]
    fn result_write_is_atomic_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let result = CalculationResult::failed(FailureKind::Convergence, "did not converge");

        write_result(dir.path(), "MIX_0001", &result).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["MIX_0001.json"]);

        let content = std::fs::read_to_string(result_path(dir.path(), "MIX_0001")).unwrap();
        let read_back: CalculationResult = serde_json::from_str(&content).unwrap();
        assert_eq!(read_back, result);
    }

    #[test]
    fn write_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("runs").join("equilibrium");
        let result = CalculationResult::default();
        write_result(&nested, "MIX_0000", &result).unwrap();
        assert!(result_path(&nested, "MIX_0000").exists());
    }
}
