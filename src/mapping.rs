//! Index mappings.
//!
//! A mapping is explicit configuration data (`field -> type`) handed to
//! index initialization; it is never inferred from stored values. Records
//! are stored whole, but only mapped fields can be queried: a filter naming
//! an unmapped field, or comparing a field with a value of the wrong type,
//! fails with `DatabaseError::QueryError`.

use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter as EnumIterMacro;

use crate::error_handling::DatabaseError;
use crate::filter::{format_time, Field, FieldValue, Filter};

/// Key under which binary fields are mapped.
pub const BINARY_FIELD: &str = "binary";

/// Storage type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIterMacro)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Ip,
    Keyword,
    Integer,
    Date,
    Boolean,
    Binary,
}

/// Field-name-to-type schema of one index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping(BTreeMap<String, FieldType>);

impl Mapping {
    pub fn new() -> Self {
        Mapping(BTreeMap::new())
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.0.insert(name.into(), ty);
        self
    }

    pub fn get(&self, name: &str) -> Option<FieldType> {
        self.0.get(name).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Mapping used by both the hosts and the views indexes.
    pub fn hosts_default() -> Self {
        Mapping::new()
            .with_field("addr", FieldType::Ip)
            .with_field("source", FieldType::Keyword)
            .with_field("scan_start", FieldType::Date)
            .with_field("scan_end", FieldType::Date)
            .with_field("tags", FieldType::Keyword)
            .with_field("hostnames", FieldType::Keyword)
            .with_field("ports.port", FieldType::Integer)
            .with_field("ports.protocol", FieldType::Keyword)
            .with_field("ports.seen", FieldType::Date)
            .with_field("ports.state", FieldType::Keyword)
            .with_field("ports.service_name", FieldType::Keyword)
            .with_field("ports.service_product", FieldType::Keyword)
            .with_field(BINARY_FIELD, FieldType::Binary)
    }

    /// Checks that the mapping can back a hosts index.
    ///
    /// `addr` must be mapped as `ip`, every other key must be a catalogue
    /// field or `binary`, and only `binary` may use the binary type.
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.get("addr") != Some(FieldType::Ip) {
            return Err(DatabaseError::ConfigError(
                "mapping must map addr as ip".to_string(),
            ));
        }
        for (name, ty) in self.fields() {
            if name == BINARY_FIELD {
                if ty != FieldType::Binary {
                    return Err(DatabaseError::ConfigError(format!(
                        "{BINARY_FIELD} must be mapped as binary"
                    )));
                }
                continue;
            }
            Field::parse(name).map_err(|e| DatabaseError::ConfigError(e.to_string()))?;
            if ty == FieldType::Binary {
                return Err(DatabaseError::ConfigError(format!(
                    "{name}: only {BINARY_FIELD} may be mapped as binary"
                )));
            }
        }
        Ok(())
    }

    /// Checks a filter against the mapping and returns it with every value
    /// in the canonical form stored documents use.
    pub fn resolve(&self, filter: &Filter) -> Result<Filter, DatabaseError> {
        filter.try_map_leaves(&mut |leaf| match leaf {
            Filter::Equals { field, value } => Ok(Filter::Equals {
                field: field.clone(),
                value: self.coerce(field, value)?,
            }),
            Filter::In { field, values } => Ok(Filter::In {
                field: field.clone(),
                values: values
                    .iter()
                    .map(|v| self.coerce(field, v))
                    .collect::<Result<_, _>>()?,
            }),
            Filter::Exists { field } => {
                self.field_type(field)?;
                Ok(leaf.clone())
            }
            other => Ok(other.clone()),
        })
    }

    fn field_type(&self, field: &Field) -> Result<FieldType, DatabaseError> {
        let ty = self.get(&field.name()).ok_or_else(|| {
            DatabaseError::QueryError(format!("field {field} is not mapped"))
        })?;
        if ty == FieldType::Binary {
            return Err(DatabaseError::QueryError(format!(
                "binary field {field} cannot be queried"
            )));
        }
        Ok(ty)
    }

    fn coerce(&self, field: &Field, value: &FieldValue) -> Result<FieldValue, DatabaseError> {
        let ty = self.field_type(field)?;
        let mismatch = || {
            DatabaseError::QueryError(format!(
                "value {value:?} does not fit {field} ({ty:?})"
            ))
        };
        match (ty, value) {
            (FieldType::Ip, FieldValue::Addr(a)) => Ok(FieldValue::Text(a.to_string())),
            (FieldType::Ip, FieldValue::Text(s)) => s
                .parse::<IpAddr>()
                .map(|a| FieldValue::Text(a.to_string()))
                .map_err(|_| mismatch()),
            (FieldType::Keyword, FieldValue::Text(s)) => Ok(FieldValue::Text(s.clone())),
            (FieldType::Keyword, FieldValue::Addr(a)) => Ok(FieldValue::Text(a.to_string())),
            (FieldType::Integer, FieldValue::Int(i)) => Ok(FieldValue::Int(*i)),
            (FieldType::Date, FieldValue::Time(t)) => Ok(FieldValue::Text(format_time(t))),
            (FieldType::Date, FieldValue::Text(s)) => DateTime::parse_from_rfc3339(s)
                .map(|t| FieldValue::Text(format_time(&t.with_timezone(&Utc))))
                .map_err(|_| mismatch()),
            (FieldType::Boolean, FieldValue::Bool(b)) => Ok(FieldValue::Bool(*b)),
            _ => Err(mismatch()),
        }
    }
}

/// A concrete index name paired with its mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub mapping: Mapping,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, mapping: Mapping) -> Self {
        IndexSpec {
            name: name.into(),
            mapping,
        }
    }
}
