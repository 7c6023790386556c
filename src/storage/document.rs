// storage/document.rs
// Conversion between records and stored JSON documents

use crate::error_handling::DatabaseError;
use crate::record::{parse_record, HostRecord, RecordId};

/// Serializes a record for storage. The id is never part of the document.
pub(crate) fn to_document(record: &HostRecord) -> Result<String, DatabaseError> {
    serde_json::to_string(record)
        .map_err(|e| DatabaseError::StoreError(format!("cannot serialize {}: {e}", record.addr)))
}

/// Rebuilds a record read back from a backend and stamps its id.
pub(crate) fn from_document(id: RecordId, doc: &str) -> Result<HostRecord, DatabaseError> {
    let value: serde_json::Value = serde_json::from_str(doc)
        .map_err(|e| DatabaseError::StoreError(format!("corrupt document {id}: {e}")))?;
    Ok(parse_record(value)?.with_id(id))
}
