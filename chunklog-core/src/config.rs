use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ChunkLogError, ConfigError};

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Blob store backend holding the chunk bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local store, useful for tests and development.
    #[default]
    InMemory,
    Local {
        path: String,
    },
    S3 {
        bucket: String,
        region: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Key prefix prepended to every chunk key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Iteration strategy used when opening a single log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IteratorStrategy {
    Sequential,
    #[default]
    Batched,
    Parallel,
}

impl FromStr for IteratorStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "sequential" | "serialized" => Ok(IteratorStrategy::Sequential),
            "batched" => Ok(IteratorStrategy::Batched),
            "parallel" | "parallelized" => Ok(IteratorStrategy::Parallel),
            other => Err(format!("unknown iterator strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IteratorConfig {
    #[serde(default)]
    pub strategy: IteratorStrategy,
    /// Chunks fetched per window by the batched strategy.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Concurrent fetches allowed by the parallel strategy.
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,
}

fn default_batch_size() -> usize {
    4
}

fn default_parallel_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4)
}

impl Default for IteratorConfig {
    fn default() -> Self {
        Self {
            strategy: IteratorStrategy::default(),
            batch_size: default_batch_size(),
            parallel_workers: default_parallel_workers(),
        }
    }
}

/// Global configuration for log retrieval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLogConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub iterators: IteratorConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl ChunkLogConfig {
    pub const ENV_PREFIX: &'static str = "CHUNKLOG_";

    /// Loads configuration from the process environment (and `.env`, if any).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_with_prefix(Self::ENV_PREFIX)
    }

    /// Loads configuration from env vars prefixed with the provided value (e.g. `CHUNKLOG_`).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}{}", prefix, suffix);

        let environment = env::var(key("ENV"))
            .map(|raw| Environment::parse(&raw))
            .unwrap_or_default();

        let store_kind = read_trimmed(&key("STORE")).map(|raw| raw.to_ascii_lowercase());
        let backend = match store_kind.as_deref() {
            None | Some("memory") | Some("in_memory") => StoreBackend::InMemory,
            Some("local") => {
                let path_key = key("STORE_PATH");
                let path =
                    read_trimmed(&path_key).ok_or(ConfigError::MissingEnvVar(path_key))?;
                StoreBackend::Local { path }
            }
            Some("s3") => {
                let bucket_key = key("S3_BUCKET");
                let bucket =
                    read_trimmed(&bucket_key).ok_or(ConfigError::MissingEnvVar(bucket_key))?;
                let region =
                    read_trimmed(&key("S3_REGION")).unwrap_or_else(|| "us-east-1".to_string());
                StoreBackend::S3 { bucket, region }
            }
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar {
                    key: key("STORE"),
                    value: other.to_string(),
                })
            }
        };
        let prefix_value = read_trimmed(&key("STORE_PREFIX"));

        let strategy = parse_env(&key("ITERATOR"), IteratorStrategy::default())?;
        let batch_size = parse_env(&key("BATCH_SIZE"), default_batch_size())?;
        let parallel_workers = parse_env(&key("PARALLEL_WORKERS"), default_parallel_workers())?;
        let log_level = read_trimmed(&key("LOG_LEVEL"));

        let config = Self {
            environment,
            store: StoreConfig {
                backend,
                prefix: prefix_value,
            },
            iterators: IteratorConfig {
                strategy,
                batch_size,
                parallel_workers,
            },
            log_level,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration previously written with [`write_to_file`](Self::write_to_file).
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ChunkLogError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ChunkLogError> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterators.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.iterators.parallel_workers == 0 {
            return Err(ConfigError::Invalid(
                "parallel_workers must be at least 1".into(),
            ));
        }
        match &self.store.backend {
            StoreBackend::Local { path } if path.trim().is_empty() => Err(ConfigError::Invalid(
                "local store requires a path".into(),
            )),
            StoreBackend::S3 { bucket, .. } if bucket.trim().is_empty() => Err(
                ConfigError::Invalid("s3 store requires a bucket".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Whether the service is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}

/// Helper that loads config and converts to the canonical error type.
pub fn load_config() -> Result<ChunkLogConfig, ChunkLogError> {
    Ok(ChunkLogConfig::from_env()?)
}

fn read_trimmed(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match read_trimmed(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidEnvVar {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_without_variables() {
        let cfg = ChunkLogConfig::from_env_with_prefix("CHUNKLOG_TEST_DEFAULTS_")
            .expect("config should load");
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.store.backend, StoreBackend::InMemory);
        assert_eq!(cfg.iterators.strategy, IteratorStrategy::Batched);
        assert_eq!(cfg.iterators.batch_size, 4);
        assert!(cfg.iterators.parallel_workers >= 1);
    }

    #[test]
    fn reads_local_store_and_iterator_settings() {
        let prefix = "CHUNKLOG_TEST_LOCAL_";
        env::set_var(format!("{prefix}ENV"), "prod");
        env::set_var(format!("{prefix}STORE"), "local");
        env::set_var(format!("{prefix}STORE_PATH"), "/var/lib/chunks");
        env::set_var(format!("{prefix}STORE_PREFIX"), "logs");
        env::set_var(format!("{prefix}ITERATOR"), "parallel");
        env::set_var(format!("{prefix}PARALLEL_WORKERS"), "16");

        let cfg = ChunkLogConfig::from_env_with_prefix(prefix).expect("config should load");
        assert!(cfg.is_production());
        assert_eq!(
            cfg.store.backend,
            StoreBackend::Local {
                path: "/var/lib/chunks".into()
            }
        );
        assert_eq!(cfg.store.prefix.as_deref(), Some("logs"));
        assert_eq!(cfg.iterators.strategy, IteratorStrategy::Parallel);
        assert_eq!(cfg.iterators.parallel_workers, 16);
    }

    #[test]
    fn local_store_requires_path() {
        let prefix = "CHUNKLOG_TEST_NOPATH_";
        env::set_var(format!("{prefix}STORE"), "local");
        let err = ChunkLogConfig::from_env_with_prefix(prefix).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key.ends_with("STORE_PATH")));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let prefix = "CHUNKLOG_TEST_ZERO_";
        env::set_var(format!("{prefix}BATCH_SIZE"), "0");
        let err = ChunkLogConfig::from_env_with_prefix(prefix).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unparseable_values() {
        let prefix = "CHUNKLOG_TEST_BAD_";
        env::set_var(format!("{prefix}ITERATOR"), "random");
        let err = ChunkLogConfig::from_env_with_prefix(prefix).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { value, .. } if value == "random"));
    }

    #[test]
    fn file_roundtrip_preserves_configuration() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chunklog.json");
        let cfg = ChunkLogConfig {
            environment: Environment::Staging,
            store: StoreConfig {
                backend: StoreBackend::S3 {
                    bucket: "build-logs".into(),
                    region: "eu-west-1".into(),
                },
                prefix: Some("task-output".into()),
            },
            iterators: IteratorConfig {
                strategy: IteratorStrategy::Sequential,
                batch_size: 8,
                parallel_workers: 3,
            },
            log_level: Some("debug".into()),
        };

        cfg.write_to_file(&path).expect("write");
        let loaded = ChunkLogConfig::load_from_file(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{"iterators": {"strategy": "parallel"}}"#).expect("write");

        let loaded = ChunkLogConfig::load_from_file(&path).expect("load");
        assert_eq!(loaded.iterators.strategy, IteratorStrategy::Parallel);
        assert_eq!(loaded.iterators.batch_size, 4);
        assert_eq!(loaded.store.backend, StoreBackend::InMemory);
    }
}
