//! Field catalogue for host record filters.

use std::fmt;

use crate::error_handling::DatabaseError;

const PORTS_PREFIX: &str = "ports.";

/// A queryable host record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Addr,
    Source,
    ScanStart,
    ScanEnd,
    Tags,
    Hostnames,
    /// An attribute of each port finding (`ports.port`, `ports.state`, ...).
    Port(String),
}

/// Where a field's values live inside a stored record document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape<'a> {
    /// A single value under a top-level key.
    Scalar(&'static str),
    /// An array of values under a top-level key.
    Set(&'static str),
    /// A key inside every element of the `ports` array.
    PortAttr(&'a str),
}

impl Field {
    /// Parses a dotted field name.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::UnknownField` for names outside the catalogue.
    /// Port attributes must be lower-case identifiers (`[a-z][a-z0-9_]*`).
    pub fn parse(name: &str) -> Result<Field, DatabaseError> {
        match name {
            "addr" => Ok(Field::Addr),
            "source" => Ok(Field::Source),
            "scan_start" => Ok(Field::ScanStart),
            "scan_end" => Ok(Field::ScanEnd),
            "tags" => Ok(Field::Tags),
            "hostnames" => Ok(Field::Hostnames),
            _ => match name.strip_prefix(PORTS_PREFIX) {
                Some(key) if is_attribute_name(key) => Ok(Field::Port(key.to_string())),
                _ => Err(DatabaseError::UnknownField(name.to_string())),
            },
        }
    }

    pub fn name(&self) -> String {
        match self {
            Field::Port(key) => format!("{PORTS_PREFIX}{key}"),
            other => other.top_level_key().to_string(),
        }
    }

    pub fn shape(&self) -> FieldShape<'_> {
        match self {
            Field::Tags | Field::Hostnames => FieldShape::Set(self.top_level_key()),
            Field::Port(key) => FieldShape::PortAttr(key),
            _ => FieldShape::Scalar(self.top_level_key()),
        }
    }

    fn top_level_key(&self) -> &'static str {
        match self {
            Field::Addr => "addr",
            Field::Source => "source",
            Field::ScanStart => "scan_start",
            Field::ScanEnd => "scan_end",
            Field::Tags => "tags",
            Field::Hostnames => "hostnames",
            Field::Port(_) => "ports",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn is_attribute_name(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top_level_fields() {
        assert_eq!(Field::parse("addr").unwrap(), Field::Addr);
        assert_eq!(Field::parse("tags").unwrap(), Field::Tags);
        assert_eq!(Field::parse("scan_end").unwrap(), Field::ScanEnd);
    }

    #[test]
    fn test_parse_port_attributes() {
        assert_eq!(
            Field::parse("ports.service_name").unwrap(),
            Field::Port("service_name".to_string())
        );
        assert_eq!(Field::parse("ports.port").unwrap().name(), "ports.port");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        for name in ["", "address", "ports.", "ports.Port", "ports.1x", "ports.a.b", "binary"] {
            assert!(
                matches!(Field::parse(name), Err(DatabaseError::UnknownField(_))),
                "{name:?} should be unknown"
            );
        }
    }

    #[test]
    fn test_shapes() {
        assert_eq!(Field::Addr.shape(), FieldShape::Scalar("addr"));
        assert_eq!(Field::Hostnames.shape(), FieldShape::Set("hostnames"));
        let state = Field::Port("state".into());
        assert_eq!(state.shape(), FieldShape::PortAttr("state"));
    }
}
