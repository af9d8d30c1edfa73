//! Export pipeline
//!
//! The pipeline turns selected sets into CSV files:
//! - [`selector`] picks the `(namespace, set)` pairs to export
//! - [`predicate`] builds the server-side filter for each namespace
//! - [`worker`] scans one set and writes its file
//! - [`coordinator`] runs workers on a bounded pool and collects outcomes
//!
//! Columns are discovered while scanning, so every worker owns its own
//! [`schema::SchemaRegistry`] and writes rows to a scratch file until the
//! header is known.

use std::path::PathBuf;
use std::time::Duration;

pub mod coordinator;
pub mod materializer;
pub mod predicate;
pub mod progress;
pub mod schema;
pub mod selector;
pub mod worker;
pub mod writers;

pub use coordinator::{ExportCoordinator, ExportSummary};
pub use materializer::{Row, RowMaterializer};
pub use predicate::{PredicateBuilder, StorageClass};
pub use progress::ProgressTracker;
pub use schema::{PrefixColumns, SchemaRegistry};
pub use selector::PartitionSelector;
pub use worker::{PartitionExportWorker, PartitionOutcome, WorkerState};

/// Record filter and row layout shared by every worker of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParams {
    /// Inclusive lower bound on last-update time, nanoseconds since epoch
    pub start_time_ns: i64,
    /// Inclusive upper bound on last-update time
    pub end_time_ns: i64,
    /// Inclusive lower bound on the record's storage size
    pub min_size: i64,
    /// Inclusive upper bound on the record's storage size
    pub max_size: i64,
    /// Maximum rows per set; 0 means unlimited
    pub record_limit: u64,
    /// Emit `_generation` and `_expiry` columns
    pub record_metadata: bool,
    /// Emit the `_digest` column
    pub include_digest: bool,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            start_time_ns: 0,
            end_time_ns: i64::MAX,
            min_size: 0,
            max_size: i64::MAX,
            record_limit: 0,
            record_metadata: false,
            include_digest: false,
        }
    }
}

impl FilterParams {
    pub fn prefix(&self) -> PrefixColumns {
        PrefixColumns::new(self.include_digest, self.record_metadata)
    }

    /// Record limit, `None` when unlimited.
    pub fn limit(&self) -> Option<u64> {
        (self.record_limit > 0).then_some(self.record_limit)
    }
}

/// How a run is executed, independent of which records it exports.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    /// Maximum number of sets exported at the same time
    pub concurrency: usize,
    pub show_progress: bool,
    /// Upper bound on the whole run before outstanding workers are abandoned
    pub wait_limit: Duration,
}

/// Roughly 68 years, the longest wait `tokio::time` handles comfortably.
pub const DEFAULT_WAIT_LIMIT: Duration = Duration::from_secs(i32::MAX as u64);

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            concurrency: 1,
            show_progress: false,
            wait_limit: DEFAULT_WAIT_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_params_defaults() {
        let params = FilterParams::default();
        assert_eq!(params.limit(), None);
        assert!(params.prefix().is_empty());
        assert_eq!(params.end_time_ns, i64::MAX);
    }

    #[test]
    fn test_filter_params_limit_and_prefix() {
        let params = FilterParams {
            record_limit: 7,
            record_metadata: true,
            include_digest: true,
            ..FilterParams::default()
        };
        assert_eq!(params.limit(), Some(7));
        assert_eq!(params.prefix().len(), 3);
    }
}
