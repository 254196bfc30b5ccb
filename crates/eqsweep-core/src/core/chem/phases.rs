use super::ChemError;
use super::elements::Element;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Elemental stoichiometry of one mineral phase: element → atoms per
/// formula unit.
pub type PhaseFormula = BTreeMap<Element, f64>;

/// A database of mineral phase formulas, used to convert a phase mass into
/// elemental moles.
///
/// The built-in set covers the clinker, supplementary-material, and
/// hydration phases of the cement–fly-ash–gangue system. Amorphous phases
/// (glass, mixed iron oxides) have no fixed formula and are deliberately
/// absent; callers resolve those through an oxide sub-composition instead.
#[derive(Debug, Clone, Default)]
pub struct PhaseFormulaDb {
    formulas: HashMap<String, PhaseFormula>,
}

impl PhaseFormulaDb {
    /// The built-in formula set.
    pub fn builtin() -> Self {
        use Element::*;

        let mut formulas = HashMap::new();
        let mut insert = |name: &str, entries: &[(Element, f64)]| {
            formulas.insert(name.to_string(), entries.iter().copied().collect());
        };

        // Clinker phases (cement-chemistry shorthand names).
        insert("C3S", &[(Ca, 3.0), (Si, 1.0), (O, 5.0)]);
        insert("C2S", &[(Ca, 2.0), (Si, 1.0), (O, 4.0)]);
        insert("C3A", &[(Ca, 3.0), (Al, 2.0), (O, 6.0)]);
        insert("C4AF", &[(Ca, 4.0), (Al, 2.0), (Fe, 2.0), (O, 10.0)]);
        insert("Gypsum", &[(Ca, 1.0), (S, 1.0), (O, 6.0), (H, 4.0)]);
        insert("Anhydrite", &[(Ca, 1.0), (S, 1.0), (O, 4.0)]);
        insert("Periclase", &[(Mg, 1.0), (O, 1.0)]);

        // Fly ash and coal gangue mineralogy.
        insert("Quartz", &[(Si, 1.0), (O, 2.0)]);
        insert("Mullite", &[(Al, 6.0), (Si, 2.0), (O, 13.0)]);
        insert("Magnetite", &[(Fe, 3.0), (O, 4.0)]);
        insert("Hematite", &[(Fe, 2.0), (O, 3.0)]);
        insert("Kaolinite", &[(Al, 2.0), (Si, 2.0), (O, 9.0), (H, 4.0)]);
        // Illite stoichiometry is approximate.
        insert(
            "Illite",
            &[(K, 1.0), (Al, 4.0), (Si, 7.0), (O, 24.0), (H, 8.0)],
        );

        // Hydration and carbonation products.
        insert("Portlandite", &[(Ca, 1.0), (O, 2.0), (H, 2.0)]);
        insert(
            "Ettringite",
            &[(Ca, 6.0), (Al, 2.0), (S, 3.0), (O, 38.0), (H, 64.0)],
        );
        insert("Calcite", &[(Ca, 1.0), (C, 1.0), (O, 3.0)]);

        Self { formulas }
    }

    /// Loads a formula database from a TOML table of the shape
    /// `[PhaseName] Ca = 3.0, Si = 1.0, O = 5.0`.
    pub fn load(path: &Path) -> Result<Self, ChemError> {
        let content = std::fs::read_to_string(path).map_err(|e| ChemError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let raw: HashMap<String, HashMap<String, f64>> =
            toml::from_str(&content).map_err(|e| ChemError::Toml {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;

        let mut formulas = HashMap::with_capacity(raw.len());
        for (phase, entries) in raw {
            let mut formula = PhaseFormula::new();
            for (symbol, count) in entries {
                formula.insert(Element::from_symbol(&symbol)?, count);
            }
            formulas.insert(phase, formula);
        }
        Ok(Self { formulas })
    }

    pub fn get(&self, phase: &str) -> Option<&PhaseFormula> {
        self.formulas.get(phase)
    }

    pub fn contains(&self, phase: &str) -> bool {
        self.formulas.contains_key(phase)
    }

    /// Molar mass of a phase in g/mol, if its formula is known.
    pub fn molar_mass(&self, phase: &str) -> Option<f64> {
        self.get(phase).map(|formula| {
            formula
                .iter()
                .map(|(element, count)| count * element.atomic_mass())
                .sum()
        })
    }

    /// Converts a phase mass (g) into elemental moles via the phase formula.
    ///
    /// Returns `None` for phases not in the database; callers fall back to
    /// an oxide-route conversion for those.
    pub fn phase_mass_to_element_moles(
        &self,
        phase: &str,
        mass_g: f64,
    ) -> Option<BTreeMap<Element, f64>> {
        let formula = self.get(phase)?;
        let molar_mass = self.molar_mass(phase)?;
        let phase_moles = mass_g / molar_mass;
        Some(
            formula
                .iter()
                .map(|(element, count)| (*element, count * phase_moles))
                .collect(),
        )
    }
}
