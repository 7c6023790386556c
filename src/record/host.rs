//! Host record types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Storage-assigned identifier of a record.
///
/// Only the storage layer creates ids; callers can read them but never set
/// them on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(i64);

impl RecordId {
    pub(crate) fn new(raw: i64) -> Self {
        RecordId(raw)
    }

    /// Returns the backend's raw identifier.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One port finding on a host.
///
/// `protocol` and `port` form the merge key. Everything else the scanner
/// reported (state, service name, banner, script output, ...) lives in
/// `details`, whose shape varies from one finding to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub protocol: String,
    pub port: u16,
    /// When this finding was observed. Filled from the record's `scan_end`
    /// on ingestion when the scanner did not provide it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Port {
    pub fn new(protocol: impl Into<String>, port: u16) -> Self {
        Port {
            protocol: protocol.into(),
            port,
            seen: None,
            details: Map::new(),
        }
    }

    pub fn with_seen(mut self, seen: DateTime<Utc>) -> Self {
        self.seen = Some(seen);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// The `(port, protocol)` merge key.
    pub fn key(&self) -> (u16, &str) {
        (self.port, self.protocol.as_str())
    }
}

/// One observed network host over one observation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    #[serde(skip)]
    id: Option<RecordId>,
    pub addr: IpAddr,
    /// Scan or collection the record came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub hostnames: BTreeSet<String>,
    #[serde(
        default,
        with = "crate::codec::base64_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub binary: BTreeMap<String, Vec<u8>>,
}

impl HostRecord {
    pub fn new(addr: IpAddr) -> Self {
        HostRecord {
            id: None,
            addr,
            source: None,
            scan_start: None,
            scan_end: None,
            ports: Vec::new(),
            tags: BTreeSet::new(),
            hostnames: BTreeSet::new(),
            binary: BTreeMap::new(),
        }
    }

    /// The storage id, present once the record has been stored or read back.
    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub(crate) fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_scan_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.scan_start = Some(start);
        self.scan_end = Some(end);
        self
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostnames.insert(hostname.into());
        self
    }

    pub fn with_binary(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.binary.insert(name.into(), data.into());
        self
    }

    /// Looks up a port finding by its merge key.
    pub fn port(&self, port: u16, protocol: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.key() == (port, protocol))
    }
}
