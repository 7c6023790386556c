//! Backend-neutral record filters.
//!
//! A [`Filter`] is an immutable predicate over host record fields. Building
//! one never touches a backend; translation into a concrete query happens
//! inside each storage adapter after the filter has been resolved against
//! the index mapping.
//!
//! Matching on set-valued fields (`tags`, `hostnames`) and on port
//! attributes follows search-engine term semantics: the leaf matches when
//! any element matches.

mod dsl;
pub(crate) mod eval;
mod field;

use std::net::IpAddr;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error_handling::DatabaseError;

pub use field::{Field, FieldShape};

/// A value compared against a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Addr(IpAddr),
    Time(DateTime<Utc>),
}

impl FieldValue {
    /// JSON form of the value, as it appears inside stored documents.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::from(*i),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Addr(a) => serde_json::Value::String(a.to_string()),
            FieldValue::Time(t) => serde_json::Value::String(format_time(t)),
        }
    }
}

/// Formats a timestamp exactly as record serialization does.
pub(crate) fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<IpAddr> for FieldValue {
    fn from(v: IpAddr) -> Self {
        FieldValue::Addr(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Time(v)
    }
}

/// A composable predicate over host records.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every record.
    All,
    Equals { field: Field, value: FieldValue },
    /// Matches when the field equals any of the values. An empty set matches nothing.
    In { field: Field, values: Vec<FieldValue> },
    /// Matches when the field holds at least one non-null value.
    Exists { field: Field },
    Not(Box<Filter>),
    /// Conjunction. An empty conjunction matches everything.
    And(Vec<Filter>),
    /// Disjunction. An empty disjunction matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn all() -> Filter {
        Filter::All
    }

    /// Field equality.
    ///
    /// # Errors
    ///
    /// `DatabaseError::UnknownField` if `field` is not in the catalogue.
    pub fn equals(field: &str, value: impl Into<FieldValue>) -> Result<Filter, DatabaseError> {
        Ok(Filter::Equals {
            field: Field::parse(field)?,
            value: value.into(),
        })
    }

    /// Set membership.
    ///
    /// # Errors
    ///
    /// `DatabaseError::UnknownField` if `field` is not in the catalogue.
    pub fn in_set<V, I>(field: &str, values: I) -> Result<Filter, DatabaseError>
    where
        V: Into<FieldValue>,
        I: IntoIterator<Item = V>,
    {
        Ok(Filter::In {
            field: Field::parse(field)?,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Field presence.
    ///
    /// # Errors
    ///
    /// `DatabaseError::UnknownField` if `field` is not in the catalogue.
    pub fn exists(field: &str) -> Result<Filter, DatabaseError> {
        Ok(Filter::Exists {
            field: Field::parse(field)?,
        })
    }

    /// Matches records with the given address.
    pub fn host(addr: IpAddr) -> Filter {
        Filter::Equals {
            field: Field::Addr,
            value: FieldValue::Addr(addr),
        }
    }

    pub fn negate(self) -> Filter {
        Filter::Not(Box::new(self))
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Filter {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Filter {
        Filter::Or(filters.into_iter().collect())
    }

    /// Visits every leaf predicate.
    pub(crate) fn try_map_leaves<F>(&self, f: &mut F) -> Result<Filter, DatabaseError>
    where
        F: FnMut(&Filter) -> Result<Filter, DatabaseError>,
    {
        match self {
            Filter::Not(inner) => Ok(Filter::Not(Box::new(inner.try_map_leaves(f)?))),
            Filter::And(items) => Ok(Filter::And(
                items
                    .iter()
                    .map(|i| i.try_map_leaves(f))
                    .collect::<Result<_, _>>()?,
            )),
            Filter::Or(items) => Ok(Filter::Or(
                items
                    .iter()
                    .map(|i| i.try_map_leaves(f))
                    .collect::<Result<_, _>>()?,
            )),
            leaf => f(leaf),
        }
    }
}

impl std::ops::Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        self.negate()
    }
}
