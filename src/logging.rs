//! Tracing subscriber setup
//!
//! File output always goes through a non-blocking rolling appender. Plain-text
//! mode also echoes to stdout; JSON mode writes the file only.

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Targets capped below the configured level (sqlx logs every statement at info)
const QUIET_TARGETS: &[&str] = &["sqlx=warn", "hyper=warn"];

/// Map the `rotation` config value to an appender rotation
pub fn rotation(name: &str) -> anyhow::Result<Rotation> {
    match name {
        "hourly" => Ok(Rotation::HOURLY),
        "daily" => Ok(Rotation::DAILY),
        "never" => Ok(Rotation::NEVER),
        other => anyhow::bail!("unknown log rotation '{}' (hourly, daily, never)", other),
    }
}

/// Filter directives for `level`, used when `RUST_LOG` is unset
fn filter_directives(level: &str) -> String {
    std::iter::once(level)
        .chain(QUIET_TARGETS.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber
///
/// Keep the returned guard alive until shutdown or buffered file output is
/// lost.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<WorkerGuard> {
    let file_appender = RollingFileAppender::builder()
        .rotation(rotation(&config.rotation)?)
        .filename_prefix(&config.log_file)
        .build(&config.log_dir)
        .with_context(|| format!("Failed to open log directory {}", config.log_dir))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(&config.log_level))
            .with_context(|| format!("Invalid log_level '{}'", config.log_level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).try_init()
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).try_init()
    };
    installed.context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_names() {
        assert_eq!(rotation("hourly").unwrap(), Rotation::HOURLY);
        assert_eq!(rotation("daily").unwrap(), Rotation::DAILY);
        assert_eq!(rotation("never").unwrap(), Rotation::NEVER);
        assert!(rotation("weekly").is_err());
    }

    #[test]
    fn test_filter_quiets_driver_targets() {
        assert_eq!(filter_directives("debug"), "debug,sqlx=warn,hyper=warn");
        assert!(EnvFilter::try_new(filter_directives("info")).is_ok());
    }
}
