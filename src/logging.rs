//! Logger setup for the `log` facade.
//!
//! The library only emits through `log` macros; applications pick a backend.
//! These helpers install `env_logger` with a level and a target.

use crate::core::error::{FilterError, FilterResult};
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    Stderr,
    /// Appended to a file, created when missing
    File(PathBuf),
}

/// Logger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub level: LevelFilter,
    pub target: LogTarget,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Warn,
            target: LogTarget::Stderr,
        }
    }
}

impl LoggerConfig {
    /// Stderr logging at a level name such as `info` or `debug`.
    pub fn with_level_name(level: &str) -> FilterResult<Self> {
        let level = LevelFilter::from_str(level.trim()).map_err(|_| {
            FilterError::InvalidParameter(format!("unknown log level '{}'", level))
        })?;
        Ok(Self {
            level,
            ..Self::default()
        })
    }

    pub fn to_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.target = LogTarget::File(path.into());
        self
    }
}

fn builder(config: &LoggerConfig) -> FilterResult<Builder> {
    let mut builder = Builder::new();
    builder.filter_level(config.level).format_timestamp_millis();
    match &config.target {
        LogTarget::Stdout => {
            builder.target(Target::Stdout);
        }
        LogTarget::Stderr => {
            builder.target(Target::Stderr);
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| FilterError::io(path.display(), e))?;
            builder.target(Target::Pipe(Box::new(file)));
        }
    }
    Ok(builder)
}

/// Install the logger.
///
/// Returns `false` when another logger was already installed, which leaves
/// that logger in place.
pub fn attach(config: &LoggerConfig) -> FilterResult<bool> {
    let installed = builder(config)?.try_init().is_ok();
    if installed {
        log::debug!("logging at {} to {:?}", config.level, config.target);
    }
    Ok(installed)
}

/// Install a stderr logger honoring `RUST_LOG`, defaulting to `warn`.
pub fn attach_default() -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .try_init()
        .is_ok()
}
