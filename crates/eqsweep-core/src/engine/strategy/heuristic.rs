//! The heuristic approximation strategy: a stoichiometric limiting-reagent
//! model of carbonation and hydrate formation.
//!
//! This is not an iterative solver; it always reports `converged = true`
//! and labels its results with a distinct `method` so downstream consumers
//! can tell approximations from solver-verified equilibria.

use super::CalculationStrategy;
use crate::core::chem::elements::Element;
use crate::core::models::result::CalculationResult;
use crate::core::models::task::CalculationTask;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

/// CO2 partial pressure (bar) at which carbonation is treated as complete.
const FULL_CONVERSION_PCO2_BAR: f64 = 0.4;

/// pCO2 below this contributes no carbonation.
const CARBONATION_PCO2_THRESHOLD_BAR: f64 = 1e-4;

/// Phase amounts below this are dropped from the assemblage.
const PHASE_CUTOFF_MOL: f64 = 1e-6;

// Ca/Si regime boundaries of the hydrate model.
const CA_RICH_RATIO: f64 = 2.0;
const SI_RICH_RATIO: f64 = 0.8;
const CA_RICH_HYDRATE_RATIO: f64 = 1.7;

pub struct HeuristicApproximationStrategy;

impl HeuristicApproximationStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicApproximationStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl CalculationStrategy for HeuristicApproximationStrategy {
    fn name(&self) -> &'static str {
        "heuristic-approximation"
    }

    fn run(&self, task: &CalculationTask) -> CalculationResult {
        let started = Instant::now();
        let composition = &task.composition;

        let ca = composition.moles(Element::Ca);
        let si = composition.moles(Element::Si);
        let al = composition.moles(Element::Al);
        let mg = composition.moles(Element::Mg);
        let s = composition.moles(Element::S);
        let c = composition.moles(Element::C);

        let mut phases: BTreeMap<String, f64> = BTreeMap::new();
        let mut insert = |name: String, amount: f64| {
            if amount > PHASE_CUTOFF_MOL {
                phases.insert(name, amount);
            }
        };

        // Carbonation: Ca(OH)2 + CO2 -> CaCO3 + H2O, limited by whichever
        // of calcium and carbon runs out, scaled by the CO2 partial
        // pressure up to full conversion.
        let pco2 = task.conditions.pco2_bar();
        let conversion = if pco2 > CARBONATION_PCO2_THRESHOLD_BAR {
            (pco2 / FULL_CONVERSION_PCO2_BAR).min(1.0)
        } else {
            0.0
        };
        let calcite = ca.min(c) * conversion;
        insert("Calcite".to_string(), calcite);
        let ca_remaining = ca - calcite;

        // Calcium-silicate-hydrate formation, apportioned by the Ca/Si
        // molar ratio in three regimes.
        let mut portlandite = 0.0;
        let mut silica_gel = 0.0;
        if si > PHASE_CUTOFF_MOL && ca_remaining > PHASE_CUTOFF_MOL {
            let ca_si_ratio = ca_remaining / si;
            if ca_si_ratio > CA_RICH_RATIO {
                // Calcium excess: hydrate saturates at Ca/Si = 1.7 and the
                // leftover calcium precipitates as portlandite.
                portlandite = ca_remaining - si * CA_RICH_HYDRATE_RATIO;
                insert("C-S-H_1.7".to_string(), si);
                insert("Portlandite".to_string(), portlandite);
            } else if ca_si_ratio < SI_RICH_RATIO {
                // Silicon excess: hydrate forms at Ca/Si = 1.0 and the
                // leftover silicon reports as silica gel.
                silica_gel = si - ca_remaining;
                insert("C-S-H_1.0".to_string(), ca_remaining);
                insert("Silica_gel".to_string(), silica_gel);
            } else {
                insert(format!("C-S-H_{ca_si_ratio:.2}"), si);
            }
        }

        // Sulfoaluminate: 6Ca + 2Al + 3S with aluminum or sulfate limiting.
        if al > PHASE_CUTOFF_MOL && s > PHASE_CUTOFF_MOL {
            insert("Ettringite".to_string(), (al / 2.0).min(s / 3.0) * 0.5);
        }

        // Layered double hydroxide from magnesium and aluminum.
        if mg > PHASE_CUTOFF_MOL && al > PHASE_CUTOFF_MOL {
            insert("Hydrotalcite".to_string(), mg.min(al) * 0.3);
        }

        // pH from the dominant regime: portlandite buffers high, advancing
        // carbonation pulls it down, carbonate systems sit near neutral.
        let ph = if portlandite > PHASE_CUTOFF_MOL {
            12.5 - conversion * 1.5
        } else if phases.contains_key("Calcite") {
            8.5 + (1.0 - conversion) * 2.0
        } else if silica_gel > PHASE_CUTOFF_MOL {
            10.0
        } else {
            10.5
        };

        debug!(
            id = %task.id,
            phases = phases.len(),
            ph,
            "Heuristic equilibrium approximation computed."
        );

        CalculationResult {
            converged: true,
            method: self.name().to_string(),
            phases,
            ph: Some(ph),
            // Typical redox state of a cementitious pore solution.
            pe: Some(4.0),
            ionic_strength: None,
            gibbs_energy: None,
            temperature_k: Some(task.conditions.temperature_k),
            pressure_bar: Some(task.conditions.pressure_bar),
            error: None,
            failure: None,
            execution_time_s: started.elapsed().as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chem::phases::PhaseFormulaDb;
    use crate::core::composition::CompositionEngine;
    use crate::core::design::{MixVariables, RawMaterialMasses, REFERENCE_GANGUE_MASS_G};
    use crate::core::materials::MaterialLibrary;
    use crate::core::models::task::Conditions;

    fn task_for(co2_fraction: f64, fly_ash_fraction: f64) -> CalculationTask {
        let library = MaterialLibrary::builtin();
        let formulas = PhaseFormulaDb::builtin();
        let engine = CompositionEngine::new(&library, &formulas);
        let variables = MixVariables {
            binder_aggregate_ratio: 0.9,
            fly_ash_fraction,
            co2_fraction,
            silicate_dosage: 0.03,
            water_binder_ratio: 1.4,
        };
        let masses =
            RawMaterialMasses::derive(&variables, REFERENCE_GANGUE_MASS_G, 0.416).unwrap();
        let composition = engine
            .from_masses(&masses, co2_fraction, 298.15, 1.0)
            .unwrap();
        CalculationTask {
            id: "MIX_TEST".to_string(),
            composition,
            conditions: Conditions {
                co2_fraction,
                ..Conditions::default()
            },
        }
    }

    #[test]
    fn always_converges_and_labels_the_method() {
        let strategy = HeuristicApproximationStrategy::new();
        let result = strategy.run(&task_for(0.2, 0.5));
        assert!(result.converged);
        assert!(result.is_success());
        assert_eq!(result.method, "heuristic-approximation");
    }

    #[test]
    fn no_co2_means_no_calcite() {
        let strategy = HeuristicApproximationStrategy::new();
        let result = strategy.run(&task_for(0.0, 0.5));
        assert!(!result.phases.contains_key("Calcite"));
    }

    #[test]
    fn calcite_grows_with_co2_fraction() {
        let strategy = HeuristicApproximationStrategy::new();
        let low = strategy.run(&task_for(0.15, 0.5));
        let high = strategy.run(&task_for(0.40, 0.5));
        assert!(high.phases["Calcite"] > low.phases["Calcite"]);
    }

    #[test]
    fn silicon_rich_mixes_form_silica_gel() {
        // Pure fly ash binder over a siliceous gangue: silicon dominates.
        let strategy = HeuristicApproximationStrategy::new();
        let result = strategy.run(&task_for(0.0, 1.0));
        assert!(result.phases.contains_key("Silica_gel"));
        assert!(!result.phases.contains_key("Portlandite"));
    }

    #[test]
    fn aluminum_and_sulfate_form_ettringite() {
        // Cement-rich mix carries both Al and SO3.
        let strategy = HeuristicApproximationStrategy::new();
        let result = strategy.run(&task_for(0.2, 0.0));
        assert!(result.phases.contains_key("Ettringite"));
        assert!(result.phases.contains_key("Hydrotalcite"));
    }

    #[test]
    fn ph_is_physically_plausible_across_the_design_space() {
        let strategy = HeuristicApproximationStrategy::new();
        for co2 in [0.0, 0.15, 0.40] {
            for f_fa in [0.0, 0.5, 1.0] {
                let result = strategy.run(&task_for(co2, f_fa));
                let ph = result.ph.unwrap();
                assert!((7.0..=13.0).contains(&ph), "pH {ph} for yCO2={co2}, f_FA={f_fa}");
            }
        }
    }

    #[test]
    fn carbonation_lowers_the_ph() {
        let strategy = HeuristicApproximationStrategy::new();
        let uncarbonated = strategy.run(&task_for(0.0, 0.0)).ph.unwrap();
        let carbonated = strategy.run(&task_for(0.40, 0.0)).ph.unwrap();
        assert!(carbonated < uncarbonated);
    }
}
