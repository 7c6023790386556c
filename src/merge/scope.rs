//! Which stored record an ingested record merges into.

use std::fmt;
use std::str::FromStr;

use crate::error_handling::DatabaseError;
use crate::filter::{Field, FieldValue, Filter};
use crate::record::HostRecord;

/// Merge key choice for store-or-merge ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeScope {
    /// One record per address, whatever scan it came from.
    Global,
    /// One record per address and source. Records without a source form
    /// their own scope.
    #[default]
    PerSource,
}

impl MergeScope {
    /// Filter selecting the stored records `record` should merge into.
    pub fn key_filter(&self, record: &HostRecord) -> Filter {
        let host = Filter::host(record.addr);
        match self {
            MergeScope::Global => host,
            MergeScope::PerSource => {
                let source = match &record.source {
                    Some(source) => Filter::Equals {
                        field: Field::Source,
                        value: FieldValue::Text(source.clone()),
                    },
                    None => !Filter::Exists {
                        field: Field::Source,
                    },
                };
                Filter::and([host, source])
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeScope::Global => "global",
            MergeScope::PerSource => "source",
        }
    }
}

impl fmt::Display for MergeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeScope {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(MergeScope::Global),
            "source" | "per_source" => Ok(MergeScope::PerSource),
            other => Err(DatabaseError::ConfigError(format!(
                "unknown merge scope {other:?} (expected global or source)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::eval::matches;

    #[test]
    fn test_per_source_separates_sources() {
        let weekly = HostRecord::new("192.0.2.1".parse().unwrap()).with_source("weekly");
        let daily = weekly.clone().with_source("daily");
        let none = HostRecord::new("192.0.2.1".parse().unwrap());

        let key = MergeScope::PerSource.key_filter(&weekly);
        let doc = |r: &HostRecord| serde_json::to_value(r).unwrap();
        assert!(matches(&key, &doc(&weekly)));
        assert!(!matches(&key, &doc(&daily)));
        assert!(!matches(&key, &doc(&none)));

        let unsourced = MergeScope::PerSource.key_filter(&none);
        assert!(matches(&unsourced, &doc(&none)));
        assert!(!matches(&unsourced, &doc(&weekly)));
    }

    #[test]
    fn test_global_ignores_source() {
        let weekly = HostRecord::new("192.0.2.1".parse().unwrap()).with_source("weekly");
        let key = MergeScope::Global.key_filter(&weekly);
        assert_eq!(key, Filter::host(weekly.addr));
    }

    #[test]
    fn test_parse() {
        assert_eq!("global".parse::<MergeScope>().unwrap(), MergeScope::Global);
        assert_eq!("source".parse::<MergeScope>().unwrap(), MergeScope::PerSource);
        assert!("everything".parse::<MergeScope>().is_err());
        assert_eq!(MergeScope::default(), MergeScope::PerSource);
    }
}
