//! Top-level error type of the engine.

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::format::FormatError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Load could not determine what to annotate
    #[error("Nothing to load: {0}")]
    NothingToLoad(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
