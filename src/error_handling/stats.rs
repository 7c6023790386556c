//! Operation statistics tracking.
//!
//! Thread-safe counters for the operations a host database performs and the
//! errors they end with.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;

use super::types::ErrorKind;

/// Operations tracked by [`StoreStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum Operation {
    InitIndex,
    Store,
    Count,
    Scan,
    Remove,
    /// `store_or_merge` inserted a new record.
    MergeInsert,
    /// `store_or_merge` merged into an existing record.
    MergeUpdate,
    /// `store_or_merge` found nothing new to write.
    MergeUnchanged,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::InitIndex => "index init",
            Operation::Store => "store",
            Operation::Count => "count",
            Operation::Scan => "scan",
            Operation::Remove => "remove",
            Operation::MergeInsert => "merge (inserted)",
            Operation::MergeUpdate => "merge (updated)",
            Operation::MergeUnchanged => "merge (unchanged)",
        }
    }
}

/// Thread-safe operation statistics tracker.
///
/// All operations and error kinds are initialized to zero on creation, so
/// the counters can be shared across tasks through `Arc` without locking.
pub struct StoreStats {
    operations: HashMap<Operation, AtomicUsize>,
    errors: HashMap<ErrorKind, AtomicUsize>,
}

impl StoreStats {
    pub fn new() -> Self {
        let mut operations = HashMap::new();
        for op in Operation::iter() {
            operations.insert(op, AtomicUsize::new(0));
        }

        let mut errors = HashMap::new();
        for kind in ErrorKind::iter() {
            errors.insert(kind, AtomicUsize::new(0));
        }

        StoreStats { operations, errors }
    }

    /// Increment an operation counter.
    pub fn increment_operation(&self, op: Operation) {
        if let Some(counter) = self.operations.get(&op) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment operation counter for {:?} which is not in the map",
                op
            );
        }
    }

    /// Increment an error counter.
    pub fn increment_error(&self, kind: ErrorKind) {
        if let Some(counter) = self.errors.get(&kind) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment error counter for {:?} which is not in the map",
                kind
            );
        }
    }

    pub fn get_operation_count(&self, op: Operation) -> usize {
        self.operations
            .get(&op)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn get_error_count(&self, kind: ErrorKind) -> usize {
        self.errors
            .get(&kind)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn total_operations(&self) -> usize {
        self.operations
            .values()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    pub fn total_errors(&self) -> usize {
        self.errors.values().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// `name: count` for every non-zero counter, operations first.
    pub fn summary_lines(&self) -> Vec<String> {
        let operations = Operation::iter().map(|op| (op.as_str(), self.get_operation_count(op)));
        let errors = ErrorKind::iter().map(|kind| (kind.as_str(), self.get_error_count(kind)));
        operations
            .chain(errors)
            .filter(|(_, count)| *count > 0)
            .map(|(name, count)| format!("{name}: {count}"))
            .collect()
    }

    /// Logs every non-zero counter at info level.
    pub fn log_summary(&self) {
        for line in self.summary_lines() {
            log::info!("{line}");
        }
    }
}

impl Default for StoreStats {
    fn default() -> Self {
        Self::new()
    }
}
