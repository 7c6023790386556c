//! Connection URL parsing.
//!
//! `scheme://[user[:pass]@][host[:port]]/[prefix]?[options]`

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, warn};
use url::Url;

use crate::config::constants::{DEFAULT_DB_PATH, DEFAULT_PREFIX, MEMORY_DB};
use crate::config::types::{Backend, Credentials, Flavor, StoreConfig};
use crate::error_handling::DatabaseError;

impl StoreConfig {
    /// Builds a configuration from a connection URL.
    ///
    /// Supported schemes are `sqlite` and `memory`. The URL path becomes the
    /// index prefix. Recognised options: `db`, `indexname_hosts`, `timeout`
    /// (seconds), `page_size`, `merge_scope` and `max_connections`; any other
    /// option is kept in `extra_options`.
    ///
    /// # Errors
    ///
    /// `DatabaseError::ConfigError` for unparsable URLs, unsupported schemes
    /// and malformed option values.
    pub fn from_url(url: &str, flavor: Flavor) -> Result<StoreConfig, DatabaseError> {
        let parsed = Url::parse(url)
            .map_err(|e| DatabaseError::ConfigError(format!("invalid URL {url:?}: {e}")))?;

        let mut config = StoreConfig::for_flavor(flavor);
        let mut db_path: Option<String> = None;

        config.prefix = match parsed.path().trim_start_matches('/') {
            "" => DEFAULT_PREFIX.to_string(),
            prefix => prefix.to_string(),
        };

        if !parsed.username().is_empty() {
            config.credentials = Some(Credentials {
                username: parsed.username().to_string(),
                password: parsed.password().map(str::to_string),
            });
        }

        if let Some(host) = parsed.host_str().filter(|h| !h.is_empty()) {
            debug!("Connection URL host {host} is not used by local backends");
        }

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "db" => db_path = Some(value.into_owned()),
                "indexname_hosts" => {
                    if value.is_empty() {
                        return Err(DatabaseError::ConfigError(
                            "indexname_hosts must not be empty".to_string(),
                        ));
                    }
                    config.hosts_index = value.into_owned();
                }
                "timeout" => {
                    let secs: u64 = parse_number(&key, &value)?;
                    config.timeout = Duration::from_secs(secs);
                }
                "page_size" => config.page_size = parse_number(&key, &value)?,
                "max_connections" => config.max_connections = parse_number(&key, &value)?,
                "merge_scope" => config.merge_scope = value.parse()?,
                _ => {
                    debug!("Keeping unrecognised connection option {key}={value}");
                    config
                        .extra_options
                        .insert(key.to_string(), value.to_string());
                }
            }
        }

        config.backend = match parsed.scheme() {
            "sqlite" => Backend::Sqlite {
                path: PathBuf::from(db_path.as_deref().unwrap_or(DEFAULT_DB_PATH)),
            },
            "memory" => {
                if db_path.is_some() {
                    warn!("Option db is ignored by the memory backend");
                }
                Backend::Memory
            }
            other => {
                return Err(DatabaseError::ConfigError(format!(
                    "unsupported backend {other:?}"
                )))
            }
        };

        Ok(config)
    }

    /// Whether the SQLite backend should open a private in-memory database.
    pub fn is_memory_sqlite(&self) -> bool {
        matches!(&self.backend, Backend::Sqlite { path } if path.as_os_str() == MEMORY_DB)
    }
}

/// Parses a strictly positive numeric option.
fn parse_number<T>(key: &str, value: &str) -> Result<T, DatabaseError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    match value.parse::<T>() {
        Ok(n) if n != T::default() => Ok(n),
        _ => Err(DatabaseError::ConfigError(format!(
            "option {key} must be a positive integer, got {value:?}"
        ))),
    }
}
