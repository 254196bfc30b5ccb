use crate::core::composition::BulkComposition;
use serde::{Deserialize, Serialize};

/// Default thermodynamic conditions of the reference study: 25 °C, 1 atm.
pub const DEFAULT_TEMPERATURE_K: f64 = 298.15;
pub const DEFAULT_PRESSURE_BAR: f64 = 1.01325;

/// Default per-calculation wall-clock budget.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Thermodynamic conditions and solver constraints for one calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub temperature_k: f64,
    pub pressure_bar: f64,
    /// CO2 volume fraction of the gas phase.
    pub co2_fraction: f64,
    /// Phases the solver may consider.
    pub enabled_phases: Vec<String>,
    /// Wall-clock budget for one calculation.
    pub timeout_secs: u64,
}

impl Default for Conditions {
    fn default() -> Self {
        Self {
            temperature_k: DEFAULT_TEMPERATURE_K,
            pressure_bar: DEFAULT_PRESSURE_BAR,
            co2_fraction: 0.0,
            enabled_phases: default_enabled_phases(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Conditions {
    /// CO2 partial pressure in bar.
    pub fn pco2_bar(&self) -> f64 {
        self.co2_fraction * self.pressure_bar
    }
}

/// The phase selection offered to the solver for the cement–fly-ash–gangue
/// carbonation system.
pub fn default_enabled_phases() -> Vec<String> {
    [
        // Clinker and sulfate phases.
        "C3S",
        "C2S",
        "C3A",
        "C4AF",
        "Gypsum",
        "Anhydrite",
        // Hydration products.
        "Portlandite",
        "CSHQ_TobH",
        "Ettringite",
        "Monosulfoaluminate",
        "Hydrotalcite",
        "Hydrogarnet",
        // Alkali-activated gels.
        "NASH_gel",
        "CNASH_gel",
        // Carbonation products.
        "Calcite",
        "Aragonite",
        "Vaterite",
        "Monocarboaluminate",
        // Silica.
        "SiO2am",
        "Quartz",
        // Clay minerals from the gangue.
        "Kaolinite",
        "Illite",
        "Montmorillonite",
        // Fly ash minerals.
        "Mullite",
        "Magnetite",
        "Hematite",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// One unit of work: a bulk composition plus conditions, bound to a design
/// point id. Submitted exactly once per design point unless retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationTask {
    pub id: String,
    pub composition: BulkComposition,
    pub conditions: Conditions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pco2_is_the_fraction_of_total_pressure() {
        let conditions = Conditions {
            co2_fraction: 0.4,
            ..Conditions::default()
        };
        assert_relative_eq!(conditions.pco2_bar(), 0.4 * DEFAULT_PRESSURE_BAR);
    }

    #[test]
    fn default_phase_selection_covers_carbonation_products() {
        let phases = default_enabled_phases();
        for phase in ["Calcite", "Portlandite", "Ettringite", "Hydrotalcite"] {
            assert!(phases.iter().any(|p| p == phase), "missing {phase}");
        }
    }
}
