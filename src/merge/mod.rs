//! Merging repeated observations of a host.
//!
//! This module provides:
//! - `merge_records`, the pure merge of two records
//! - `MergeScope`, which stored record an observation belongs to
//! - `store_or_merge` / `merge_only`, the conditional-write ingestion loop

mod ingest;
mod policy;
mod scope;

pub use ingest::{merge_only, merge_retry_strategy, store_or_merge, MergeOutcome};
pub use policy::merge_records;
pub use scope::MergeScope;
