//! The raw-material library: XRF oxide compositions and mineral phase
//! breakdowns for each input material of the mix.
//!
//! The built-in data reproduces the measured XRF tables and the estimated
//! mineralogy of the reference study (a belite-rich cement, a class-F fly
//! ash, and a kaolinite-bearing coal gangue). A library can also be loaded
//! from a TOML file to model other materials.

use crate::core::chem::oxides::Oxide;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Tolerance on the sum of phase mass fractions per material.
pub const PHASE_FRACTION_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("Unknown material name: '{0}'")]
    UnknownMaterial(String),

    #[error(
        "Phase fractions for material '{material}' sum to {sum}, expected 1.0 ± {tolerance}"
    )]
    PhaseFractionSum {
        material: String,
        sum: f64,
        tolerance: f64,
    },

    #[error("Negative {what} for material '{material}': {value}")]
    NegativeValue {
        material: String,
        what: &'static str,
        value: f64,
    },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Chem(#[from] crate::core::chem::ChemError),
}

/// The raw input materials of a mix design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaterialKind {
    Cement,
    FlyAsh,
    Gangue,
    SodiumSilicate,
    Water,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 5] = [
        MaterialKind::Cement,
        MaterialKind::FlyAsh,
        MaterialKind::Gangue,
        MaterialKind::SodiumSilicate,
        MaterialKind::Water,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MaterialKind::Cement => "cement",
            MaterialKind::FlyAsh => "fly_ash",
            MaterialKind::Gangue => "gangue",
            MaterialKind::SodiumSilicate => "sodium_silicate",
            MaterialKind::Water => "water",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, MaterialError> {
        match name {
            "cement" => Ok(MaterialKind::Cement),
            "fly_ash" => Ok(MaterialKind::FlyAsh),
            "gangue" => Ok(MaterialKind::Gangue),
            "sodium_silicate" => Ok(MaterialKind::SodiumSilicate),
            "water" => Ok(MaterialKind::Water),
            other => Err(MaterialError::UnknownMaterial(other.to_string())),
        }
    }
}

/// One mineral phase of a material's phase breakdown: its mass fraction of
/// the material, plus an oxide sub-composition (wt%) for phases that have
/// no fixed formula in the phase database.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseEntry {
    pub fraction: f64,
    pub oxides: Option<BTreeMap<Oxide, f64>>,
}

/// A material's mineral phase breakdown, e.g. from Rietveld refinement or a
/// Bogue-style estimate. Invariant: fractions sum to 1.0 within
/// [`PHASE_FRACTION_TOLERANCE`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseComposition {
    entries: BTreeMap<String, PhaseEntry>,
}

impl PhaseComposition {
    pub fn new(entries: BTreeMap<String, PhaseEntry>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PhaseEntry)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fraction_sum(&self) -> f64 {
        self.entries.values().map(|e| e.fraction).sum()
    }

    fn validate(&self, material: &str) -> Result<(), MaterialError> {
        for entry in self.entries.values() {
            if entry.fraction < 0.0 {
                return Err(MaterialError::NegativeValue {
                    material: material.to_string(),
                    what: "phase fraction",
                    value: entry.fraction,
                });
            }
        }
        let sum = self.fraction_sum();
        if (sum - 1.0).abs() > PHASE_FRACTION_TOLERANCE {
            return Err(MaterialError::PhaseFractionSum {
                material: material.to_string(),
                sum,
                tolerance: PHASE_FRACTION_TOLERANCE,
            });
        }
        Ok(())
    }
}

/// One raw material: its XRF oxide composition (wt%) and, when available,
/// a mineral phase breakdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    pub oxide_wt_percent: BTreeMap<Oxide, f64>,
    pub phases: Option<PhaseComposition>,
}

/// The library of all raw materials used by the composition engine.
#[derive(Debug, Clone)]
pub struct MaterialLibrary {
    materials: HashMap<MaterialKind, Material>,
}

impl MaterialLibrary {
    /// The built-in reference library.
    pub fn builtin() -> Self {
        let mut materials = HashMap::new();

        let cement_oxides = oxide_table(&[
            (Oxide::SiO2, 19.76),
            (Oxide::Al2O3, 11.47),
            (Oxide::Fe2O3, 0.50),
            (Oxide::CaO, 45.63),
            (Oxide::MgO, 6.27),
            (Oxide::SO3, 13.68),
        ]);
        // Bogue estimate from the XRF data. This cement is belite-rich:
        // no alite at all, belite dominant.
        let cement_phases = phase_table(&[
            ("C2S", 0.6455, None),
            ("C3A", 0.1618, None),
            ("C4AF", 0.0083, None),
            ("Gypsum", 0.1610, None),
            ("Periclase", 0.0234, None),
        ]);
        materials.insert(
            MaterialKind::Cement,
            Material {
                oxide_wt_percent: cement_oxides,
                phases: Some(cement_phases),
            },
        );

        let fly_ash_oxides = oxide_table(&[
            (Oxide::SiO2, 52.61),
            (Oxide::Al2O3, 12.60),
            (Oxide::Fe2O3, 8.24),
            (Oxide::CaO, 18.23),
            (Oxide::MgO, 1.47),
            (Oxide::K2O, 1.44),
        ]);
        // The glass fraction has no fixed formula; it carries the bulk XRF
        // table as its oxide sub-composition.
        let fly_ash_phases = phase_table(&[
            ("Glass", 0.7095, Some(&fly_ash_oxides)),
            ("Quartz", 0.1223, None),
            ("Mullite", 0.0652, None),
            ("Magnetite", 0.0412, None),
            ("Hematite", 0.0618, None),
        ]);
        materials.insert(
            MaterialKind::FlyAsh,
            Material {
                oxide_wt_percent: fly_ash_oxides.clone(),
                phases: Some(fly_ash_phases),
            },
        );

        let gangue_oxides = oxide_table(&[
            (Oxide::SiO2, 57.74),
            (Oxide::Al2O3, 20.58),
            (Oxide::Fe2O3, 4.31),
            (Oxide::CaO, 0.20),
            (Oxide::MgO, 1.00),
            (Oxide::K2O, 2.76),
        ]);
        let iron_oxide_sub = oxide_table(&[(Oxide::Fe2O3, 100.0)]);
        let gangue_phases = phase_table(&[
            ("Quartz", 0.3506, None),
            ("Kaolinite", 0.3005, None),
            ("Illite", 0.1503, None),
            ("Iron_oxides", 0.0506, Some(&iron_oxide_sub)),
            ("Amorphous", 0.1480, Some(&gangue_oxides)),
        ]);
        materials.insert(
            MaterialKind::Gangue,
            Material {
                oxide_wt_percent: gangue_oxides.clone(),
                phases: Some(gangue_phases),
            },
        );

        materials.insert(
            MaterialKind::SodiumSilicate,
            Material {
                oxide_wt_percent: oxide_table(&[
                    (Oxide::Na2O, 29.2),
                    (Oxide::SiO2, 29.2),
                    (Oxide::H2O, 41.6),
                ]),
                phases: None,
            },
        );

        materials.insert(
            MaterialKind::Water,
            Material {
                oxide_wt_percent: oxide_table(&[(Oxide::H2O, 100.0)]),
                phases: None,
            },
        );

        Self { materials }
    }

    /// Loads a material library from a TOML file of the shape:
    ///
    /// ```toml
    /// [cement.oxides]
    /// CaO = 45.63
    /// SiO2 = 19.76
    ///
    /// [cement.phases.C2S]
    /// fraction = 0.6455
    /// ```
    pub fn load(path: &Path) -> Result<Self, MaterialError> {
        let content = std::fs::read_to_string(path).map_err(|e| MaterialError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let raw: HashMap<String, RawMaterial> =
            toml::from_str(&content).map_err(|e| MaterialError::Toml {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;

        let mut materials = HashMap::with_capacity(raw.len());
        for (name, raw_material) in raw {
            let kind = MaterialKind::from_name(&name)?;
            materials.insert(kind, raw_material.into_material()?);
        }
        let library = Self { materials };
        library.validate()?;
        Ok(library)
    }

    pub fn get(&self, kind: MaterialKind) -> Option<&Material> {
        self.materials.get(&kind)
    }

    /// Mass fraction of water in the sodium silicate solution (0..1).
    ///
    /// The mass derivation debits this water from the free-water budget so
    /// the water/binder ratio counts all water, not just the added water.
    pub fn silicate_water_fraction(&self) -> f64 {
        self.get(MaterialKind::SodiumSilicate)
            .and_then(|m| m.oxide_wt_percent.get(&Oxide::H2O))
            .map(|wt| wt / 100.0)
            .unwrap_or(0.0)
    }

    /// Checks every phase breakdown sums to 1.0 within tolerance and no
    /// table carries negative values.
    pub fn validate(&self) -> Result<(), MaterialError> {
        for (kind, material) in &self.materials {
            for (oxide, wt) in &material.oxide_wt_percent {
                if *wt < 0.0 {
                    return Err(MaterialError::NegativeValue {
                        material: format!("{} ({oxide})", kind.name()),
                        what: "oxide weight percent",
                        value: *wt,
                    });
                }
            }
            if let Some(phases) = &material.phases {
                phases.validate(kind.name())?;
            }
        }
        Ok(())
    }
}

impl Default for MaterialLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn oxide_table(entries: &[(Oxide, f64)]) -> BTreeMap<Oxide, f64> {
    entries.iter().copied().collect()
}

fn phase_table(
    entries: &[(&str, f64, Option<&BTreeMap<Oxide, f64>>)],
) -> PhaseComposition {
    PhaseComposition::new(
        entries
            .iter()
            .map(|(name, fraction, oxides)| {
                (
                    name.to_string(),
                    PhaseEntry {
                        fraction: *fraction,
                        oxides: oxides.cloned(),
                    },
                )
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
struct RawMaterial {
    #[serde(default)]
    oxides: BTreeMap<String, f64>,
    #[serde(default)]
    phases: BTreeMap<String, RawPhaseEntry>,
}

#[derive(Debug, Deserialize)]
struct RawPhaseEntry {
    fraction: f64,
    #[serde(default)]
    oxides: Option<BTreeMap<String, f64>>,
}

impl RawMaterial {
    fn into_material(self) -> Result<Material, MaterialError> {
        let oxide_wt_percent = parse_oxide_table(&self.oxides)?;
        let phases = if self.phases.is_empty() {
            None
        } else {
            let mut entries = BTreeMap::new();
            for (phase, raw) in self.phases {
                let oxides = raw.oxides.as_ref().map(parse_oxide_table).transpose()?;
                entries.insert(
                    phase,
                    PhaseEntry {
                        fraction: raw.fraction,
                        oxides,
                    },
                );
            }
            Some(PhaseComposition::new(entries))
        };
        Ok(Material {
            oxide_wt_percent,
            phases,
        })
    }
}

fn parse_oxide_table(
    raw: &BTreeMap<String, f64>,
) -> Result<BTreeMap<Oxide, f64>, MaterialError> {
    raw.iter()
        .map(|(formula, wt)| Ok((Oxide::from_formula(formula)?, *wt)))
        .collect()
}
