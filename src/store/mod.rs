//! Store client contract
//!
//! The exporter never talks to the cluster directly. Everything it needs is
//! expressed through [`StoreClient`]:
//! - `list_partitions`: every `(namespace, set)` pair present in the cluster
//! - `namespace_config`: key/value properties of one namespace
//! - `scan`: a streaming scan of one set under a server-side filter
//!
//! A scan is a pull-based [`RecordStream`]. The consumer asks for records one
//! at a time and, when it wants to end early, calls [`RecordStream::stop`]
//! with a [`StopReason`] saying whether the stop is a normal completion
//! (record limit reached) or caused by a failure on the consumer side.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

pub mod filter;
pub mod memory;
pub mod snapshot;
pub mod value;

pub use filter::{FilterExpression, Operand, RecordMetrics};
pub use memory::MemoryStore;
pub use value::Value;

/// Identity of one exportable partition (a set inside a namespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId {
    pub namespace: String,
    pub set_name: String,
}

impl PartitionId {
    pub fn new(namespace: impl Into<String>, set_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set_name: set_name.into(),
        }
    }

    /// File name of the finished export: `{namespace}.{set}.csv`
    pub fn output_file_name(&self) -> String {
        format!("{}.{}.csv", self.namespace, self.set_name)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.set_name)
    }
}

/// Record key as delivered by a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub namespace: String,
    pub set_name: String,
    /// Hash digest identifying the record inside its namespace.
    pub digest: Vec<u8>,
}

/// One record: named bins plus server metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    /// Bins in the order the server delivered them.
    pub bins: Vec<(String, Value)>,
    pub generation: u32,
    pub expiration: u32,
}

impl Record {
    pub fn new(bins: Vec<(String, Value)>, generation: u32, expiration: u32) -> Self {
        Self {
            bins,
            generation,
            expiration,
        }
    }

    /// Look up a bin by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bins
            .iter()
            .find(|(bin, _)| bin == name)
            .map(|(_, value)| value)
    }

    pub fn bin_names(&self) -> impl Iterator<Item = &str> {
        self.bins.iter().map(|(name, _)| name.as_str())
    }
}

/// A record together with its key, as produced by a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedRecord {
    pub key: Key,
    pub record: Record,
}

/// Why a consumer ends a scan before the stream is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Expected termination, e.g. the record limit was reached.
    Normal,
    /// The consumer hit an error and cannot accept more records.
    Error,
}

/// Decision taken by the consumer after handling one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop(StopReason),
}

/// Pull-based stream of scan results.
#[async_trait]
pub trait RecordStream: Send {
    /// Fetch the next matching record, or `None` once the scan is exhausted.
    async fn next_record(&mut self) -> Result<Option<ScannedRecord>>;

    /// Terminate the scan early. Further `next_record` calls return `None`.
    async fn stop(&mut self, reason: StopReason) -> Result<()>;
}

/// Client for the key-value store cluster.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// List every `(namespace, set)` pair present in the cluster.
    async fn list_partitions(&self) -> Result<Vec<PartitionId>>;

    /// Read the configuration properties of a namespace.
    async fn namespace_config(&self, namespace: &str) -> Result<HashMap<String, String>>;

    /// Start a scan of one set; the filter is evaluated by the store.
    async fn scan(
        &self,
        partition: &PartitionId,
        filter: &FilterExpression,
    ) -> Result<Box<dyn RecordStream>>;
}
