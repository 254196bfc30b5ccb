//! Design-space enumeration and raw-material mass derivation.
//!
//! A design point is one combination of the five independent mix variables.
//! The full factorial space of the reference study is 4 × 11 × 7 × 4 × 4 =
//! 4,928 points. Raw-material masses follow from a closed-form solution of
//! the self-referential dosage equation, normalized to a reference gangue
//! mass.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Reference coal gangue mass (g) every mix is normalized to.
pub const REFERENCE_GANGUE_MASS_G: f64 = 100.0;

#[derive(Debug, Error, PartialEq)]
pub enum DesignError {
    #[error("Variable '{0}' has no levels defined")]
    EmptyVariable(&'static str),

    #[error("Silicate dosage must lie in [0, 1), got {0}")]
    DosageOutOfRange(f64),
}

/// One combination of the independent mix variables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixVariables {
    /// R: (cement + fly ash) / coal gangue, by mass.
    pub binder_aggregate_ratio: f64,
    /// f_FA: fly ash / (cement + fly ash), by mass.
    pub fly_ash_fraction: f64,
    /// yCO2: CO2 volume fraction of the gas phase.
    pub co2_fraction: f64,
    /// w_SS: sodium silicate / total slurry mass.
    pub silicate_dosage: f64,
    /// w/b: water / (cement + fly ash), by mass.
    pub water_binder_ratio: f64,
}

/// An immutable point of the design space, identified by a zero-padded
/// sequential id (`MIX_0000`, `MIX_0001`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignPoint {
    pub id: String,
    pub index: usize,
    pub variables: MixVariables,
}

/// Ordered level lists for each independent variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSpace {
    pub binder_aggregate_ratios: Vec<f64>,
    pub fly_ash_fractions: Vec<f64>,
    pub co2_fractions: Vec<f64>,
    pub silicate_dosages: Vec<f64>,
    pub water_binder_ratios: Vec<f64>,
}

impl Default for DesignSpace {
    /// The full factorial design of the reference study (4,928 points).
    fn default() -> Self {
        Self {
            binder_aggregate_ratios: vec![0.3, 0.6, 0.9, 1.2],
            fly_ash_fractions: vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0],
            co2_fractions: vec![0.00, 0.15, 0.20, 0.25, 0.30, 0.35, 0.40],
            silicate_dosages: vec![0.02, 0.03, 0.04, 0.05],
            water_binder_ratios: vec![1.1, 1.4, 1.7, 2.0],
        }
    }
}

impl DesignSpace {
    pub fn len(&self) -> usize {
        self.binder_aggregate_ratios.len()
            * self.fly_ash_fractions.len()
            * self.co2_fractions.len()
            * self.silicate_dosages.len()
            * self.water_binder_ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_levels(&self) -> Result<(), DesignError> {
        let lists: [(&'static str, &Vec<f64>); 5] = [
            ("binder_aggregate_ratios", &self.binder_aggregate_ratios),
            ("fly_ash_fractions", &self.fly_ash_fractions),
            ("co2_fractions", &self.co2_fractions),
            ("silicate_dosages", &self.silicate_dosages),
            ("water_binder_ratios", &self.water_binder_ratios),
        ];
        for (name, levels) in lists {
            if levels.is_empty() {
                return Err(DesignError::EmptyVariable(name));
            }
        }
        Ok(())
    }

    /// Enumerates the full cartesian product as design points.
    ///
    /// The variable order (R, f_FA, yCO2, w_SS, w/b) fixes the id sequence,
    /// so a given space always enumerates to the same ids.
    pub fn enumerate(&self) -> Result<Vec<DesignPoint>, DesignError> {
        self.check_levels()?;

        let levels = [
            &self.binder_aggregate_ratios,
            &self.fly_ash_fractions,
            &self.co2_fractions,
            &self.silicate_dosages,
            &self.water_binder_ratios,
        ];

        let points: Vec<DesignPoint> = levels
            .into_iter()
            .map(|l| l.iter().copied())
            .multi_cartesian_product()
            .enumerate()
            .map(|(index, values)| DesignPoint {
                id: format!("MIX_{index:04}"),
                index,
                variables: MixVariables {
                    binder_aggregate_ratio: values[0],
                    fly_ash_fraction: values[1],
                    co2_fraction: values[2],
                    silicate_dosage: values[3],
                    water_binder_ratio: values[4],
                },
            })
            .collect();

        debug!(points = points.len(), "Enumerated design space.");
        Ok(points)
    }
}

/// Raw-material masses of one design point, in grams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawMaterialMasses {
    pub cement_g: f64,
    pub fly_ash_g: f64,
    pub gangue_g: f64,
    pub water_g: f64,
    pub sodium_silicate_g: f64,
    pub total_g: f64,
}

impl RawMaterialMasses {
    /// Derives the five raw-material masses from the mix variables.
    ///
    /// The silicate dosage is self-referential: w_SS = m_SS / m_total where
    /// m_total includes m_SS itself, and the silicate solution carries its
    /// own water (a fraction α of its mass) which is debited from the
    /// free-water budget. Substituting
    /// `m_total = m_dry + (m_water - α·m_SS) + m_SS` into the dosage
    /// definition and rearranging gives the closed form
    /// `m_SS = w_SS * (m_dry + m_water) / (1 - w_SS·(1 - α))`
    /// (the `m_SS = w_SS * (m_dry + m_water) / (1 - w_SS)` form at α = 0),
    /// so no fixed-point iteration is needed.
    ///
    /// A negative free-water balance is clamped to zero and the total mass
    /// adjusted accordingly; the dosage invariant is only guaranteed when
    /// the clamp did not engage.
    pub fn derive(
        variables: &MixVariables,
        reference_gangue_mass: f64,
        silicate_water_fraction: f64,
    ) -> Result<Self, DesignError> {
        let w_ss = variables.silicate_dosage;
        if !(0.0..1.0).contains(&w_ss) {
            return Err(DesignError::DosageOutOfRange(w_ss));
        }

        let gangue = reference_gangue_mass;
        let binder = variables.binder_aggregate_ratio * gangue;
        let fly_ash = variables.fly_ash_fraction * binder;
        let cement = binder - fly_ash;
        let water_from_ratio = variables.water_binder_ratio * binder;

        let dry = cement + fly_ash + gangue;
        let sodium_silicate = w_ss * (dry + water_from_ratio)
            / (1.0 - w_ss * (1.0 - silicate_water_fraction));

        let water_from_silicate = sodium_silicate * silicate_water_fraction;
        let water = (water_from_ratio - water_from_silicate).max(0.0);

        let total = cement + fly_ash + gangue + water + sodium_silicate;

        Ok(Self {
            cement_g: cement,
            fly_ash_g: fly_ash,
            gangue_g: gangue,
            water_g: water,
            sodium_silicate_g: sodium_silicate,
            total_g: total,
        })
    }

    /// The dosage fraction recomputed from the derived masses.
    pub fn dosage_fraction(&self) -> f64 {
        self.sodium_silicate_g / self.total_g
    }

    /// Total water in the system: free water plus the water carried by the
    /// silicate solution.
    pub fn total_water_g(&self, silicate_water_fraction: f64) -> f64 {
        self.water_g + self.sodium_silicate_g * silicate_water_fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    const SILICATE_WATER: f64 = 0.416;

    fn variables(r: f64, f_fa: f64, w_ss: f64, w_b: f64) -> MixVariables {
        MixVariables {
            binder_aggregate_ratio: r,
            fly_ash_fraction: f_fa,
            co2_fraction: 0.2,
            silicate_dosage: w_ss,
            water_binder_ratio: w_b,
        }
    }

    #[test]
    fn default_space_has_the_full_factorial_size() {
        let space = DesignSpace::default();
        assert_eq!(space.len(), 4 * 11 * 7 * 4 * 4);
        assert_eq!(space.enumerate().unwrap().len(), 4928);
    }

    #[test]
    fn enumeration_produces_unique_zero_padded_ids() {
        let space = DesignSpace {
            binder_aggregate_ratios: vec![0.3, 0.6],
            fly_ash_fractions: vec![0.0, 0.5],
            co2_fractions: vec![0.0],
            silicate_dosages: vec![0.02],
            water_binder_ratios: vec![1.1],
        };
        let points = space.enumerate().unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].id, "MIX_0000");
        assert_eq!(points[3].id, "MIX_0003");

        let ids: HashSet<_> = points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), points.len());
    }

    #[test]
    fn enumeration_varies_the_last_variable_fastest() {
        let space = DesignSpace {
            binder_aggregate_ratios: vec![0.3],
            fly_ash_fractions: vec![0.0],
            co2_fractions: vec![0.0],
            silicate_dosages: vec![0.02],
            water_binder_ratios: vec![1.1, 2.0],
        };
        let points = space.enumerate().unwrap();
        assert_eq!(points[0].variables.water_binder_ratio, 1.1);
        assert_eq!(points[1].variables.water_binder_ratio, 2.0);
    }

    #[test]
    fn empty_level_list_is_a_design_error() {
        let space = DesignSpace {
            co2_fractions: vec![],
            ..DesignSpace::default()
        };
        assert_eq!(
            space.enumerate(),
            Err(DesignError::EmptyVariable("co2_fractions"))
        );
    }

    #[test]
    fn derived_masses_satisfy_the_dosage_invariant() {
        // The closed-form solution must reproduce the input dosage exactly
        // (up to rounding) whenever the water clamp does not engage.
        let space = DesignSpace::default();
        for point in space.enumerate().unwrap() {
            let masses = RawMaterialMasses::derive(
                &point.variables,
                REFERENCE_GANGUE_MASS_G,
                SILICATE_WATER,
            )
            .unwrap();
            if masses.water_g > 0.0 {
                assert_relative_eq!(
                    masses.dosage_fraction(),
                    point.variables.silicate_dosage,
                    max_relative = 1e-6
                );
            }
        }
    }

    #[test]
    fn binder_split_follows_the_fly_ash_fraction() {
        let vars = variables(0.6, 0.25, 0.03, 1.4);
        let masses =
            RawMaterialMasses::derive(&vars, REFERENCE_GANGUE_MASS_G, SILICATE_WATER).unwrap();

        assert_relative_eq!(masses.gangue_g, 100.0);
        assert_relative_eq!(masses.cement_g + masses.fly_ash_g, 60.0, epsilon = 1e-9);
        assert_relative_eq!(masses.fly_ash_g, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn negative_free_water_is_clamped_to_zero() {
        // A dosage fraction near 1 forces a huge silicate mass whose own
        // water exceeds the water/binder budget.
        let vars = variables(0.3, 0.0, 0.9, 1.1);
        let masses =
            RawMaterialMasses::derive(&vars, REFERENCE_GANGUE_MASS_G, SILICATE_WATER).unwrap();

        assert_eq!(masses.water_g, 0.0);
        assert_relative_eq!(
            masses.total_g,
            masses.cement_g + masses.fly_ash_g + masses.gangue_g + masses.sodium_silicate_g,
            epsilon = 1e-9
        );
    }

    #[test]
    fn dosage_of_one_or_more_is_rejected() {
        let vars = variables(0.3, 0.0, 1.0, 1.1);
        assert_eq!(
            RawMaterialMasses::derive(&vars, REFERENCE_GANGUE_MASS_G, SILICATE_WATER),
            Err(DesignError::DosageOutOfRange(1.0))
        );
    }

    #[test]
    fn total_water_includes_the_silicate_contribution() {
        let vars = variables(0.6, 0.5, 0.04, 1.7);
        let masses =
            RawMaterialMasses::derive(&vars, REFERENCE_GANGUE_MASS_G, SILICATE_WATER).unwrap();

        // Water debited from the free budget reappears via the silicate.
        assert_relative_eq!(
            masses.total_water_g(SILICATE_WATER),
            vars.water_binder_ratio * 60.0,
            epsilon = 1e-9
        );
    }
}
