// error.rs
// Crate-wide error type for setup and output paths.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid scenario configuration, detected before the first solve.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scenario file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to decode checkpoint: {0}")]
    Checkpoint(String),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Config(msg.into())
    }
}
