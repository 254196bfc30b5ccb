use crate::core::composition::CompositionError;
use crate::core::design::DesignError;
use crate::core::io::IoError;
use crate::core::materials::MaterialError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A precondition of the whole batch is unmet (unusable executable,
    /// missing database). Checked once, before any task runs; the only
    /// error kind that aborts a batch.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Design space error: {source}")]
    Design {
        #[from]
        source: DesignError,
    },

    #[error("Composition error: {source}")]
    Composition {
        #[from]
        source: CompositionError,
    },

    #[error("Material library error: {source}")]
    Material {
        #[from]
        source: MaterialError,
    },

    #[error("Artifact I/O error: {source}")]
    Artifact {
        #[from]
        source: IoError,
    },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}
