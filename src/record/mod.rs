// record/mod.rs
// Host record model

mod host;
mod validate;

pub use host::{HostRecord, Port, RecordId};
pub use validate::{normalize, parse_record, validate};
