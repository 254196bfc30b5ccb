pub mod elements;
pub mod oxides;
pub mod phases;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChemError {
    #[error("Unknown element symbol: '{0}'")]
    UnknownElement(String),

    #[error("Unknown oxide formula: '{0}'")]
    UnknownOxide(String),

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
}
