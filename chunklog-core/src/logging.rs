use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

use crate::config::ChunkLogConfig;
use crate::errors::{ChunkLogError, Result};

/// Environment variable holding filter directives; overrides any level
/// passed in.
pub const LOG_ENV: &str = "CHUNKLOG_LOG";

const CRATES: [&str; 4] = ["chunklog", "chunklog_core", "chunklog_protocol", "chunklog_iter"];

/// Filter directives that log the chunklog crates at `level` and everything
/// else at `warn`, so object store and runtime chatter stays quiet.
pub fn directives(level: &str) -> String {
    let mut out = String::from("warn");
    for krate in CRATES {
        out.push_str(&format!(",{krate}={level}"));
    }
    out
}

fn filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }
    EnvFilter::try_new(directives(level))
        .map_err(|err| ChunkLogError::Config(format!("invalid log level {level:?}: {err}")))
}

/// Installs the global tracing subscriber. `level` defaults to `info`.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let level = level.unwrap_or("info");
    SubscriberBuilder::default()
        .with_env_filter(filter(level)?)
        .with_target(true)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ChunkLogError::General(err.to_string()))?;

    tracing::info!(level, "tracing initialised");
    Ok(())
}

/// Same as [`init_tracing`] with the level from `config.log_level`.
pub fn init_from_config(config: &ChunkLogConfig) -> Result<()> {
    init_tracing(config.log_level.as_deref())
}
