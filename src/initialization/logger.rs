//! Logger initialization.
//!
//! The crate itself only logs through the `log` facade; applications that
//! embed it may call [`init_logger_with`] to get the same output format the
//! test suite uses.

use std::io::Write;

use colored::*;
use log::LevelFilter;

use crate::config::{LogFormat, LogLevel};
use crate::error_handling::InitializationError;

/// Initializes the logger with the specified level and format.
///
/// Configures `env_logger` with plain text (colored) or JSON line output.
/// `level` is the default for everything, `sqlx` statement logging defaults
/// to warnings, and any directive in `RUST_LOG` overrides both.
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already set.
///
/// # Examples
///
/// ```bash
/// # Per-module filtering via RUST_LOG
/// RUST_LOG=hostdb=debug,sqlx=info cargo test
/// ```
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let mut builder = filtered_builder(level, rust_log.as_deref());

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{{\"ts\":{},\"level\":\"{}\",\"target\":\"{}\",\"msg\":{}}}",
                    chrono::Utc::now().timestamp_millis(),
                    record.level(),
                    record.target(),
                    serde_json::to_string(&record.args().to_string())
                        .unwrap_or_else(|_| "\"\"".into())
                )
            });
        }
        LogFormat::Plain => {
            colored::control::set_override(true);
            builder.format(|buf, record| {
                let level = match record.level() {
                    log::Level::Error => "ERROR".red().bold(),
                    log::Level::Warn => "WARN ".yellow(),
                    log::Level::Info => "INFO ".green(),
                    log::Level::Debug => "DEBUG".blue(),
                    log::Level::Trace => "TRACE".purple(),
                };
                writeln!(
                    buf,
                    "{} {} {} {}",
                    chrono::Utc::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                    level,
                    record.target().cyan(),
                    record.args()
                )
            });
        }
    }

    builder.try_init().map_err(InitializationError::from)
}

/// Builder with the default filters, then the `RUST_LOG` directives on top.
fn filtered_builder(level: LevelFilter, rust_log: Option<&str>) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.filter_module("sqlx", LevelFilter::Warn);
    if let Some(directives) = rust_log {
        builder.parse_filters(directives);
    }
    builder
}

/// [`init_logger_with`] for a [`LogLevel`].
pub fn init_logger(level: LogLevel, format: LogFormat) -> Result<(), InitializationError> {
    init_logger_with(level.into(), format)
}
