//! Pure merge of two observations of the same host.

use chrono::{DateTime, Utc};

use crate::record::{HostRecord, Port};

/// Merges `incoming` into `existing` and returns the combined record.
///
/// - Ports are unioned by `(port, protocol)`. When both records hold the
///   same key, the finding observed later wins, where a finding without
///   `seen` is dated by its record's `scan_end`. Ties go to `incoming`.
///   Existing ports keep their order; new ones are appended in incoming order.
/// - Tags and hostnames are unioned.
/// - The scan window widens to cover both records.
/// - Binary entries are unioned; on a name clash the incoming value wins
///   unless the incoming record ended strictly earlier.
/// - The id and source of `existing` are kept (a missing source is filled).
pub fn merge_records(existing: &HostRecord, incoming: &HostRecord) -> HostRecord {
    let mut merged = existing.clone();

    for port in &incoming.ports {
        let incoming_time = observed(port, incoming);
        match merged.ports.iter_mut().find(|p| p.key() == port.key()) {
            Some(current) => {
                if incoming_time >= observed(current, existing) {
                    *current = port.clone();
                }
            }
            None => merged.ports.push(port.clone()),
        }
    }

    merged.tags.extend(incoming.tags.iter().cloned());
    merged.hostnames.extend(incoming.hostnames.iter().cloned());

    let (start, end) = widen_window(existing, incoming);
    merged.scan_start = start;
    merged.scan_end = end;

    let incoming_newer = incoming.scan_end >= existing.scan_end;
    for (name, data) in &incoming.binary {
        if incoming_newer || !merged.binary.contains_key(name) {
            merged.binary.insert(name.clone(), data.clone());
        }
    }

    if merged.source.is_none() {
        merged.source = incoming.source.clone();
    }

    merged
}

fn observed(port: &Port, owner: &HostRecord) -> Option<DateTime<Utc>> {
    port.seen.or(owner.scan_end)
}

/// Window covering both records. When each side only knows one bound, every
/// known timestamp is folded into both ends so that `start <= end` holds.
fn widen_window(
    existing: &HostRecord,
    incoming: &HostRecord,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let start = earliest(existing.scan_start, incoming.scan_start);
    let end = existing.scan_end.max(incoming.scan_end);
    match (start, end) {
        (Some(s), Some(e)) if s > e => {
            let known = [
                existing.scan_start,
                existing.scan_end,
                incoming.scan_start,
                incoming.scan_end,
            ];
            let known = known.iter().flatten();
            (known.clone().min().copied(), known.max().copied())
        }
        window => window,
    }
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordId;
    use chrono::TimeZone;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn host() -> HostRecord {
        HostRecord::new("192.0.2.1".parse().unwrap())
    }

    #[test]
    fn test_ports_and_tags_are_unioned() {
        let existing = host()
            .with_port(Port::new("tcp", 22))
            .with_tag("a")
            .with_scan_window(t(1), t(2));
        let incoming = host()
            .with_port(Port::new("tcp", 80))
            .with_tag("b")
            .with_scan_window(t(3), t(4));

        let merged = merge_records(&existing, &incoming);
        let keys: Vec<_> = merged.ports.iter().map(Port::key).collect();
        assert_eq!(keys, vec![(22, "tcp"), (80, "tcp")]);
        assert_eq!(merged.tags.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(merged.scan_start, Some(t(1)));
        assert_eq!(merged.scan_end, Some(t(4)));
    }

    #[test]
    fn test_half_open_windows_stay_ordered() {
        let mut ended = host();
        ended.scan_end = Some(t(1));
        let mut started = host();
        started.scan_start = Some(t(5));

        let merged = merge_records(&ended, &started);
        assert_eq!(merged.scan_start, Some(t(1)));
        assert_eq!(merged.scan_end, Some(t(5)));
        assert!(crate::record::validate(&merged).is_ok());

        let merged = merge_records(&started, &ended);
        assert_eq!((merged.scan_start, merged.scan_end), (Some(t(1)), Some(t(5))));
    }

    #[test]
    fn test_later_port_finding_wins() {
        let existing = host().with_port(
            Port::new("tcp", 80)
                .with_seen(t(5))
                .with_detail("state", "open"),
        );
        let stale = host().with_port(
            Port::new("tcp", 80)
                .with_seen(t(4))
                .with_detail("state", "closed"),
        );
        let merged = merge_records(&existing, &stale);
        assert_eq!(merged.port(80, "tcp").unwrap().details["state"], "open");

        let fresh = host().with_port(
            Port::new("tcp", 80)
                .with_seen(t(6))
                .with_detail("state", "closed"),
        );
        let merged = merge_records(&existing, &fresh);
        assert_eq!(merged.port(80, "tcp").unwrap().details["state"], "closed");
    }

    #[test]
    fn test_port_time_falls_back_to_scan_end() {
        let existing = host()
            .with_scan_window(t(1), t(2))
            .with_port(Port::new("udp", 53).with_detail("state", "open"));
        let incoming = host()
            .with_scan_window(t(0), t(1))
            .with_port(Port::new("udp", 53).with_detail("state", "closed"));
        let merged = merge_records(&existing, &incoming);
        assert_eq!(merged.port(53, "udp").unwrap().details["state"], "open");
    }

    #[test]
    fn test_binary_conflict_uses_scan_end() {
        let existing = host()
            .with_scan_window(t(1), t(5))
            .with_binary("screenshot", b"old".to_vec());
        let older = host()
            .with_scan_window(t(1), t(3))
            .with_binary("screenshot", b"older".to_vec())
            .with_binary("cert", b"c".to_vec());
        let merged = merge_records(&existing, &older);
        assert_eq!(merged.binary["screenshot"], b"old");
        assert_eq!(merged.binary["cert"], b"c");

        let newer = host()
            .with_scan_window(t(1), t(5))
            .with_binary("screenshot", b"new".to_vec());
        assert_eq!(merge_records(&existing, &newer).binary["screenshot"], b"new");
    }

    #[test]
    fn test_keeps_existing_identity() {
        let existing = host().with_id(RecordId::new(9)).with_source("weekly");
        let incoming = host().with_source("daily");
        let merged = merge_records(&existing, &incoming);
        assert_eq!(merged.id(), Some(RecordId::new(9)));
        assert_eq!(merged.source.as_deref(), Some("weekly"));

        let unsourced = host();
        let merged = merge_records(&unsourced, &incoming);
        assert_eq!(merged.source.as_deref(), Some("daily"));
    }

    #[test]
    fn test_merging_same_record_is_identity() {
        let record = host()
            .with_scan_window(t(1), t(2))
            .with_port(Port::new("tcp", 443).with_seen(t(2)))
            .with_tag("web")
            .with_binary("b", vec![0u8, 1, 2]);
        assert_eq!(merge_records(&record, &record), record);
    }
}
