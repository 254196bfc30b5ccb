use super::ChemError;
use super::elements::Element;
use serde::{Deserialize, Serialize};

/// An oxide species reported by XRF analysis of a raw material.
///
/// Raw-material compositions are given as oxide weight percentages; the
/// composition engine converts them to elemental masses through the
/// stoichiometric factors below.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Oxide {
    CaO,
    SiO2,
    Al2O3,
    Fe2O3,
    MgO,
    K2O,
    Na2O,
    SO3,
    H2O,
    CO2,
}

impl Oxide {
    pub const ALL: [Oxide; 10] = [
        Oxide::CaO,
        Oxide::SiO2,
        Oxide::Al2O3,
        Oxide::Fe2O3,
        Oxide::MgO,
        Oxide::K2O,
        Oxide::Na2O,
        Oxide::SO3,
        Oxide::H2O,
        Oxide::CO2,
    ];

    pub fn formula(&self) -> &'static str {
        match self {
            Oxide::CaO => "CaO",
            Oxide::SiO2 => "SiO2",
            Oxide::Al2O3 => "Al2O3",
            Oxide::Fe2O3 => "Fe2O3",
            Oxide::MgO => "MgO",
            Oxide::K2O => "K2O",
            Oxide::Na2O => "Na2O",
            Oxide::SO3 => "SO3",
            Oxide::H2O => "H2O",
            Oxide::CO2 => "CO2",
        }
    }

    pub fn from_formula(formula: &str) -> Result<Self, ChemError> {
        match formula.trim() {
            "CaO" => Ok(Oxide::CaO),
            "SiO2" => Ok(Oxide::SiO2),
            "Al2O3" => Ok(Oxide::Al2O3),
            "Fe2O3" => Ok(Oxide::Fe2O3),
            "MgO" => Ok(Oxide::MgO),
            "K2O" => Ok(Oxide::K2O),
            "Na2O" => Ok(Oxide::Na2O),
            "SO3" => Ok(Oxide::SO3),
            "H2O" => Ok(Oxide::H2O),
            "CO2" => Ok(Oxide::CO2),
            other => Err(ChemError::UnknownOxide(other.to_string())),
        }
    }

    /// Stoichiometric components: the cation (or H/C) count and the oxygen
    /// count per formula unit.
    pub fn components(&self) -> &'static [(Element, u32)] {
        match self {
            Oxide::CaO => &[(Element::Ca, 1), (Element::O, 1)],
            Oxide::SiO2 => &[(Element::Si, 1), (Element::O, 2)],
            Oxide::Al2O3 => &[(Element::Al, 2), (Element::O, 3)],
            Oxide::Fe2O3 => &[(Element::Fe, 2), (Element::O, 3)],
            Oxide::MgO => &[(Element::Mg, 1), (Element::O, 1)],
            Oxide::K2O => &[(Element::K, 2), (Element::O, 1)],
            Oxide::Na2O => &[(Element::Na, 2), (Element::O, 1)],
            Oxide::SO3 => &[(Element::S, 1), (Element::O, 3)],
            Oxide::H2O => &[(Element::H, 2), (Element::O, 1)],
            Oxide::CO2 => &[(Element::C, 1), (Element::O, 2)],
        }
    }

    /// Molar mass in g/mol, derived from the component stoichiometry.
    pub fn molar_mass(&self) -> f64 {
        self.components()
            .iter()
            .map(|(element, count)| f64::from(*count) * element.atomic_mass())
            .sum()
    }

    /// Mass fraction of `element` in this oxide, i.e. the factor converting
    /// oxide mass to element mass. Zero for elements not in the formula.
    pub fn element_mass_fraction(&self, element: Element) -> f64 {
        self.components()
            .iter()
            .find(|(e, _)| *e == element)
            .map(|(e, count)| f64::from(*count) * e.atomic_mass() / self.molar_mass())
            .unwrap_or(0.0)
    }
}

impl std::fmt::Display for Oxide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.formula())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn formula_round_trips_for_all_oxides() {
        for oxide in Oxide::ALL {
            assert_eq!(Oxide::from_formula(oxide.formula()).unwrap(), oxide);
        }
    }

    #[test]
    fn molar_masses_match_reference_values() {
        assert_relative_eq!(Oxide::CaO.molar_mass(), 56.0774, epsilon = 1e-3);
        assert_relative_eq!(Oxide::SiO2.molar_mass(), 60.0843, epsilon = 1e-3);
        assert_relative_eq!(Oxide::Al2O3.molar_mass(), 101.9613, epsilon = 1e-3);
        assert_relative_eq!(Oxide::Fe2O3.molar_mass(), 159.6882, epsilon = 1e-3);
        assert_relative_eq!(Oxide::SO3.molar_mass(), 80.0632, epsilon = 1e-3);
        assert_relative_eq!(Oxide::H2O.molar_mass(), 18.01528, epsilon = 1e-3);
        assert_relative_eq!(Oxide::CO2.molar_mass(), 44.0095, epsilon = 1e-3);
    }

    #[test]
    fn element_fractions_of_each_oxide_sum_to_one() {
        for oxide in Oxide::ALL {
            let total: f64 = oxide
                .components()
                .iter()
                .map(|(element, _)| oxide.element_mass_fraction(*element))
                .sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn element_mass_fraction_is_zero_for_absent_elements() {
        assert_eq!(Oxide::CaO.element_mass_fraction(Element::Si), 0.0);
        assert_eq!(Oxide::CO2.element_mass_fraction(Element::Ca), 0.0);
    }

    #[test]
    fn calcium_fraction_of_lime_matches_hand_calculation() {
        let expected = 40.078 / (40.078 + 15.9994);
        assert_relative_eq!(
            Oxide::CaO.element_mass_fraction(Element::Ca),
            expected,
            epsilon = 1e-12
        );
    }
}
