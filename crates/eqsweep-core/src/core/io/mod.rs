pub mod aggregate;
pub mod artifact;
pub mod parser;
pub mod validator;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("JSON serialization error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("CSV writing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
}
