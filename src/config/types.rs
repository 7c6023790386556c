//! Configuration types.
//!
//! This module defines the logging enums and the `StoreConfig` struct a
//! `HostDb` is built from.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::constants::{
    DEFAULT_DB_PATH, DEFAULT_HOSTS_INDEX, DEFAULT_MAX_CONNECTIONS, DEFAULT_PAGE_SIZE,
    DEFAULT_PREFIX, DEFAULT_TIMEOUT, DEFAULT_VIEWS_INDEX,
};
use crate::merge::MergeScope;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON lines for machine parsing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Which kind of host database a connection serves.
///
/// Both flavors share the record model and the default mapping; they differ
/// only in the logical name of their hosts index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Flavor {
    /// Records straight from scans.
    #[default]
    Active,
    /// Records merged across scans.
    View,
}

impl Flavor {
    /// Logical hosts index name used when the URL does not override it.
    pub fn default_hosts_index(&self) -> &'static str {
        match self {
            Flavor::Active => DEFAULT_HOSTS_INDEX,
            Flavor::View => DEFAULT_VIEWS_INDEX,
        }
    }
}

/// Storage backend selected by the connection URL scheme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// SQLite database file, or `:memory:` for a private in-memory database.
    Sqlite { path: PathBuf },
    /// In-process store, lost when the `HostDb` is dropped.
    Memory,
}

/// Connection credentials taken from the URL userinfo.
///
/// Carried through to the backend; verifying them is the backend's job.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Host database configuration (no URL required).
///
/// # Examples
///
/// ```
/// use hostdb::{Backend, StoreConfig};
///
/// let config = StoreConfig {
///     backend: Backend::Memory,
///     prefix: "test-".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.hosts_index, "hosts");
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: Backend,

    pub flavor: Flavor,

    /// Prepended to every logical index name
    pub prefix: String,

    /// Logical name of the hosts index
    pub hosts_index: String,

    /// Bound on each backend call
    pub timeout: Duration,

    /// Records per scan page
    pub page_size: usize,

    /// SQLite connection pool size
    pub max_connections: u32,

    /// Which stored record an ingested record merges into
    pub merge_scope: MergeScope,

    pub credentials: Option<Credentials>,

    /// URL options this crate does not consume, kept for the caller
    pub extra_options: BTreeMap<String, String>,
}

impl StoreConfig {
    /// Default configuration for a flavor.
    pub fn for_flavor(flavor: Flavor) -> Self {
        Self {
            flavor,
            hosts_index: flavor.default_hosts_index().to_string(),
            ..Default::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite {
                path: PathBuf::from(DEFAULT_DB_PATH),
            },
            flavor: Flavor::Active,
            prefix: DEFAULT_PREFIX.to_string(),
            hosts_index: DEFAULT_HOSTS_INDEX.to_string(),
            timeout: DEFAULT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            merge_scope: MergeScope::default(),
            credentials: None,
            extra_options: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_log_level_ordering() {
        let error = log::LevelFilter::from(LogLevel::Error);
        let warn = log::LevelFilter::from(LogLevel::Warn);
        let info = log::LevelFilter::from(LogLevel::Info);
        let debug = log::LevelFilter::from(LogLevel::Debug);
        let trace = log::LevelFilter::from(LogLevel::Trace);

        assert!(error < warn);
        assert!(warn < info);
        assert!(info < debug);
        assert!(debug < trace);
    }

    #[test]
    fn test_flavor_index_names() {
        assert_eq!(StoreConfig::for_flavor(Flavor::Active).hosts_index, "hosts");
        assert_eq!(StoreConfig::for_flavor(Flavor::View).hosts_index, "views");
        assert_eq!(StoreConfig::default().prefix, "ivre-");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "scanner".to_string(),
            password: Some("hunter2".to_string()),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("scanner"));
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
    }
}
