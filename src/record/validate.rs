//! Record validation, parsing and normalization.
//!
//! Everything here is pure: no backend is touched, so a rejected record never
//! causes a partial write.

use std::collections::HashSet;

use serde_json::Value;

use super::host::HostRecord;
use crate::codec;
use crate::error_handling::DatabaseError;

/// Field names of [`Port`](super::Port) itself. Details share the finding's
/// JSON object, so a detail under one of these names would shadow the field.
const RESERVED_PORT_KEYS: [&str; 3] = ["protocol", "port", "seen"];

/// Checks the record invariants.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidRecord` when:
/// - the address is unspecified (`0.0.0.0` or `::`)
/// - `scan_start` is after `scan_end`
/// - a port has an empty protocol, or two ports share a `(port, protocol)` key
/// - a port detail reuses one of the port's own field names
/// - a tag, hostname or binary field name is empty
pub fn validate(record: &HostRecord) -> Result<(), DatabaseError> {
    if record.addr.is_unspecified() {
        return Err(DatabaseError::InvalidRecord(format!(
            "unspecified address {}",
            record.addr
        )));
    }

    if let (Some(start), Some(end)) = (record.scan_start, record.scan_end) {
        if start > end {
            return Err(DatabaseError::InvalidRecord(format!(
                "{}: scan_start {} is after scan_end {}",
                record.addr, start, end
            )));
        }
    }

    let mut keys = HashSet::with_capacity(record.ports.len());
    for port in &record.ports {
        if port.protocol.trim().is_empty() {
            return Err(DatabaseError::InvalidRecord(format!(
                "{}: port {} has an empty protocol",
                record.addr, port.port
            )));
        }
        if let Some(key) = RESERVED_PORT_KEYS
            .iter()
            .find(|k| port.details.contains_key(**k))
        {
            return Err(DatabaseError::InvalidRecord(format!(
                "{}: port {}/{} has a detail named {key:?}",
                record.addr, port.port, port.protocol
            )));
        }
        if !keys.insert(port.key()) {
            return Err(DatabaseError::InvalidRecord(format!(
                "{}: duplicate finding for {}/{}",
                record.addr, port.port, port.protocol
            )));
        }
    }

    if record.tags.iter().any(|t| t.is_empty()) {
        return Err(DatabaseError::InvalidRecord(format!(
            "{}: empty tag",
            record.addr
        )));
    }
    if record.hostnames.iter().any(|h| h.is_empty()) {
        return Err(DatabaseError::InvalidRecord(format!(
            "{}: empty hostname",
            record.addr
        )));
    }
    if record.binary.keys().any(|k| k.is_empty()) {
        return Err(DatabaseError::InvalidRecord(format!(
            "{}: empty binary field name",
            record.addr
        )));
    }

    Ok(())
}

/// Parses a raw JSON document into a record.
///
/// # Errors
///
/// - `InvalidRecord` if `addr` is missing or malformed, or another field has
///   the wrong shape
/// - `DecodeError` if a binary field is not valid base64
pub fn parse_record(doc: Value) -> Result<HostRecord, DatabaseError> {
    match doc.get("addr") {
        None | Some(Value::Null) => {
            return Err(DatabaseError::InvalidRecord("missing addr".to_string()))
        }
        Some(Value::String(addr)) => {
            if addr.parse::<std::net::IpAddr>().is_err() {
                return Err(DatabaseError::InvalidRecord(format!(
                    "malformed addr {addr:?}"
                )));
            }
        }
        Some(other) => {
            return Err(DatabaseError::InvalidRecord(format!(
                "malformed addr {other}"
            )))
        }
    }

    // Surface corrupt binary data as a decode error rather than a shape error
    if let Some(Value::Object(binary)) = doc.get("binary") {
        for text in binary.values().filter_map(Value::as_str) {
            codec::decode(text)?;
        }
    }

    serde_json::from_value(doc).map_err(|e| DatabaseError::InvalidRecord(e.to_string()))
}

/// Stamps every port finding without an observation time with the record's
/// `scan_end`.
///
/// Ingestion always normalizes first, so storing a record and merging the
/// same record again compare equal finding by finding.
pub fn normalize(mut record: HostRecord) -> HostRecord {
    if let Some(end) = record.scan_end {
        for port in record.ports.iter_mut().filter(|p| p.seen.is_none()) {
            port.seen = Some(end);
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Port;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn addr(s: &str) -> std::net::IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_valid_record_passes() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let record = HostRecord::new(addr("192.0.2.1"))
            .with_scan_window(start, end)
            .with_port(Port::new("tcp", 80))
            .with_port(Port::new("udp", 80))
            .with_tag("CDN");
        assert!(validate(&record).is_ok());
    }

    #[test]
    fn test_unspecified_address_rejected() {
        let err = validate(&HostRecord::new(addr("0.0.0.0"))).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidRecord(_)));
        assert!(validate(&HostRecord::new(addr("::"))).is_err());
    }

    #[test]
    fn test_inverted_window_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = HostRecord::new(addr("192.0.2.1")).with_scan_window(start, end);
        assert!(matches!(
            validate(&record),
            Err(DatabaseError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_equal_window_accepted() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = HostRecord::new(addr("2001:db8::1")).with_scan_window(t, t);
        assert!(validate(&record).is_ok());
    }

    #[test]
    fn test_duplicate_port_key_rejected() {
        let record = HostRecord::new(addr("192.0.2.1"))
            .with_port(Port::new("tcp", 443))
            .with_port(Port::new("tcp", 443).with_detail("state", "open"));
        assert!(validate(&record).is_err());
    }

    #[test]
    fn test_detail_cannot_shadow_port_fields() {
        for key in ["port", "protocol", "seen"] {
            let record = HostRecord::new(addr("192.0.2.1"))
                .with_port(Port::new("tcp", 80).with_detail(key, 8080));
            assert!(
                matches!(validate(&record), Err(DatabaseError::InvalidRecord(ref msg)) if msg.contains(key)),
                "detail {key} accepted"
            );
        }
    }

    #[test]
    fn test_empty_protocol_rejected() {
        let record = HostRecord::new(addr("192.0.2.1")).with_port(Port::new(" ", 22));
        assert!(validate(&record).is_err());
    }

    #[test]
    fn test_parse_missing_addr() {
        let err = parse_record(json!({"ports": []})).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidRecord(msg) if msg.contains("missing")));
    }

    #[test]
    fn test_parse_malformed_addr() {
        assert!(matches!(
            parse_record(json!({"addr": "300.1.2.3"})),
            Err(DatabaseError::InvalidRecord(_))
        ));
        assert!(matches!(
            parse_record(json!({"addr": 12})),
            Err(DatabaseError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_parse_keeps_port_details() {
        let record = parse_record(json!({
            "addr": "192.0.2.7",
            "ports": [{
                "protocol": "tcp",
                "port": 22,
                "state": "open",
                "service_name": "ssh",
                "scripts": [{"id": "ssh-hostkey", "output": "..."}]
            }],
            "binary": {"cert": "aXZyZQ=="}
        }))
        .unwrap();
        let port = record.port(22, "tcp").unwrap();
        assert_eq!(port.details["service_name"], json!("ssh"));
        assert_eq!(port.details["scripts"][0]["id"], json!("ssh-hostkey"));
        assert_eq!(record.binary["cert"], b"ivre".to_vec());
        assert!(record.id().is_none());
    }

    #[test]
    fn test_parse_corrupt_binary_is_decode_error() {
        let err = parse_record(json!({"addr": "192.0.2.7", "binary": {"cert": "%%%"}})).unwrap_err();
        assert!(matches!(err, DatabaseError::DecodeError(_)));
    }

    #[test]
    fn test_document_round_trip() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let record = HostRecord::new(addr("2001:db8::42"))
            .with_source("weekly")
            .with_scan_window(t, t)
            .with_port(Port::new("tcp", 443).with_detail("banner", "nginx"))
            .with_tag("web")
            .with_hostname("www.example.com")
            .with_binary("cert", vec![0u8, 159, 255]);
        let doc = serde_json::to_value(&record).unwrap();
        assert_eq!(doc["binary"]["cert"], json!("AJ//"));
        assert_eq!(doc["addr"], json!("2001:db8::42"));
        assert_eq!(parse_record(doc).unwrap(), record);
    }

    #[test]
    fn test_normalize_fills_seen_from_scan_end() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let record = HostRecord::new(addr("192.0.2.1"))
            .with_scan_window(start, end)
            .with_port(Port::new("tcp", 80))
            .with_port(Port::new("tcp", 443).with_seen(earlier));
        let normalized = normalize(record);
        assert_eq!(normalized.ports[0].seen, Some(end));
        assert_eq!(normalized.ports[1].seen, Some(earlier));
        assert_eq!(normalize(normalized.clone()), normalized);
    }
}
