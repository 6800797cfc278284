//! Core shared library for chunklog.
//!
//! This crate exposes the primitives every other crate depends on: the
//! canonical error type, configuration loading and logging setup.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{
    ChunkLogConfig, Environment, IteratorConfig, IteratorStrategy, StoreBackend, StoreConfig,
};
pub use errors::{ChunkLogError, ConfigError, Result as CoreResult};
