use super::ChemError;
use phf::{Map, phf_map};
use serde::{Deserialize, Serialize};

/// The independent components of the chemical system handed to an
/// equilibrium calculation, in canonical bulk-composition order.
pub const SYSTEM_ELEMENTS: [Element; 11] = [
    Element::Ca,
    Element::Si,
    Element::Al,
    Element::Fe,
    Element::Mg,
    Element::K,
    Element::Na,
    Element::S,
    Element::O,
    Element::H,
    Element::C,
];

/// A chemical element tracked by the composition engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Element {
    Ca,
    Si,
    Al,
    Fe,
    Mg,
    K,
    Na,
    S,
    O,
    H,
    C,
}

static ATOMIC_MASSES: Map<&'static str, f64> = phf_map! {
    "Ca" => 40.078,
    "Si" => 28.0855,
    "Al" => 26.9815,
    "Fe" => 55.845,
    "Mg" => 24.305,
    "K" => 39.0983,
    "Na" => 22.9898,
    "S" => 32.065,
    "O" => 15.9994,
    "H" => 1.00794,
    "C" => 12.0107,
};

impl Element {
    pub fn symbol(&self) -> &'static str {
        match self {
            Element::Ca => "Ca",
            Element::Si => "Si",
            Element::Al => "Al",
            Element::Fe => "Fe",
            Element::Mg => "Mg",
            Element::K => "K",
            Element::Na => "Na",
            Element::S => "S",
            Element::O => "O",
            Element::H => "H",
            Element::C => "C",
        }
    }

    pub fn from_symbol(symbol: &str) -> Result<Self, ChemError> {
        match symbol.trim() {
            "Ca" => Ok(Element::Ca),
            "Si" => Ok(Element::Si),
            "Al" => Ok(Element::Al),
            "Fe" => Ok(Element::Fe),
            "Mg" => Ok(Element::Mg),
            "K" => Ok(Element::K),
            "Na" => Ok(Element::Na),
            "S" => Ok(Element::S),
            "O" => Ok(Element::O),
            "H" => Ok(Element::H),
            "C" => Ok(Element::C),
            other => Err(ChemError::UnknownElement(other.to_string())),
        }
    }

    /// Standard atomic mass in g/mol.
    pub fn atomic_mass(&self) -> f64 {
        *ATOMIC_MASSES
            .get(self.symbol())
            .expect("atomic mass table covers every element variant")
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}
