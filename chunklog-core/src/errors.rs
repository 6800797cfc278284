use std::io;

use thiserror::Error;

/// Result type used across the chunklog core crate.
pub type Result<T> = std::result::Result<T, ChunkLogError>;

/// Canonical error representation shared by all crates.
#[derive(Debug, Error)]
pub enum ChunkLogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("general error: {0}")]
    General(String),
}

impl From<serde_json::Error> for ChunkLogError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            ChunkLogError::Io(err.into())
        } else if err.is_data() || err.is_syntax() || err.is_eof() {
            ChunkLogError::Deserialization(err.to_string())
        } else {
            ChunkLogError::Serialization(err.to_string())
        }
    }
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidEnvVar { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ChunkLogError {
    fn from(value: ConfigError) -> Self {
        ChunkLogError::Config(value.to_string())
    }
}
