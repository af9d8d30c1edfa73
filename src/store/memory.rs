//! In-process store
//!
//! `MemoryStore` holds a whole cluster in memory. It backs the snapshot
//! source used by the binary and the fake collaborator used in tests. Filters
//! are evaluated before a record is delivered, the same way a real cluster
//! evaluates them server-side.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DiscoveryError, ExportError, Result};

use super::{
    FilterExpression, Key, PartitionId, Record, RecordMetrics, RecordStream, ScannedRecord,
    StopReason, StoreClient, Value,
};

/// A record as held by the store, including the metadata filters look at.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub digest: Option<Vec<u8>>,
    pub record: Record,
    pub metrics: RecordMetrics,
}

impl StoredRecord {
    pub fn new(bins: Vec<(&str, Value)>) -> Self {
        Self {
            digest: None,
            record: Record::new(
                bins.into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
                1,
                0,
            ),
            metrics: RecordMetrics::default(),
        }
    }

    pub fn with_generation(mut self, generation: u32) -> Self {
        self.record.generation = generation;
        self
    }

    pub fn with_expiration(mut self, expiration: u32) -> Self {
        self.record.expiration = expiration;
        self
    }

    pub fn with_digest(mut self, digest: Vec<u8>) -> Self {
        self.digest = Some(digest);
        self
    }

    pub fn with_metrics(mut self, metrics: RecordMetrics) -> Self {
        self.metrics = metrics;
        self
    }
}

/// How a scan ended, as observed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTermination {
    Exhausted,
    Stopped(StopReason),
    Failed,
}

#[derive(Debug, Default)]
struct NamespaceData {
    config: HashMap<String, String>,
    sets: BTreeMap<String, Vec<StoredRecord>>,
}

/// Cluster held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: BTreeMap<String, NamespaceData>,
    /// Partition -> number of records delivered before the scan errors out.
    failures: HashMap<PartitionId, usize>,
    unreachable: bool,
    terminations: Arc<Mutex<Vec<(PartitionId, ScanTermination)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a namespace and its configuration properties.
    pub fn with_namespace(mut self, namespace: &str, config: &[(&str, &str)]) -> Self {
        let data = self.namespaces.entry(namespace.to_string()).or_default();
        for (key, value) in config {
            data.config.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Declare an empty set.
    pub fn with_set(mut self, partition: &PartitionId) -> Self {
        self.set_entry(partition);
        self
    }

    /// Add a record to a set, creating the namespace and set if needed.
    pub fn insert(&mut self, partition: &PartitionId, record: StoredRecord) {
        let records = self.set_entry(partition);
        let mut record = record;
        if record.digest.is_none() {
            record.digest = Some(synthetic_digest(records.len()));
        }
        records.push(record);
    }

    /// Builder form of [`MemoryStore::insert`].
    pub fn with_record(mut self, partition: &PartitionId, record: StoredRecord) -> Self {
        self.insert(partition, record);
        self
    }

    /// Make scans of `partition` fail after `delivered` records.
    pub fn fail_scan_after(mut self, partition: &PartitionId, delivered: usize) -> Self {
        self.failures.insert(partition.clone(), delivered);
        self
    }

    /// Make every discovery call fail.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// How each scan started so far has ended.
    pub fn terminations(&self) -> Vec<(PartitionId, ScanTermination)> {
        self.terminations
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn set_entry(&mut self, partition: &PartitionId) -> &mut Vec<StoredRecord> {
        self.namespaces
            .entry(partition.namespace.clone())
            .or_default()
            .sets
            .entry(partition.set_name.clone())
            .or_default()
    }
}

/// 20-byte digest derived from the insertion index.
fn synthetic_digest(index: usize) -> Vec<u8> {
    let mut digest = vec![0u8; 20];
    digest[12..].copy_from_slice(&(index as u64).to_be_bytes());
    digest
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn list_partitions(&self) -> Result<Vec<PartitionId>> {
        if self.unreachable {
            return Err(DiscoveryError::ListPartitions("cluster unreachable".to_string()).into());
        }

        Ok(self
            .namespaces
            .iter()
            .flat_map(|(namespace, data)| {
                data.sets
                    .keys()
                    .map(move |set_name| PartitionId::new(namespace.clone(), set_name.clone()))
            })
            .collect())
    }

    async fn namespace_config(&self, namespace: &str) -> Result<HashMap<String, String>> {
        if self.unreachable {
            return Err(DiscoveryError::NamespaceConfig {
                namespace: namespace.to_string(),
                message: "cluster unreachable".to_string(),
            }
            .into());
        }

        self.namespaces
            .get(namespace)
            .map(|data| data.config.clone())
            .ok_or_else(|| {
                DiscoveryError::NamespaceConfig {
                    namespace: namespace.to_string(),
                    message: "unknown namespace".to_string(),
                }
                .into()
            })
    }

    async fn scan(
        &self,
        partition: &PartitionId,
        filter: &FilterExpression,
    ) -> Result<Box<dyn RecordStream>> {
        let stored = self
            .namespaces
            .get(&partition.namespace)
            .and_then(|data| data.sets.get(&partition.set_name))
            .ok_or_else(|| ExportError::Scan {
                partition: partition.to_string(),
                message: "set does not exist".to_string(),
            })?;

        let records: VecDeque<ScannedRecord> = stored
            .iter()
            .filter(|stored| filter.evaluate(&stored.metrics))
            .map(|stored| ScannedRecord {
                key: Key {
                    namespace: partition.namespace.clone(),
                    set_name: partition.set_name.clone(),
                    digest: stored.digest.clone().unwrap_or_default(),
                },
                record: stored.record.clone(),
            })
            .collect();

        debug!(
            partition = %partition,
            matching = records.len(),
            total = stored.len(),
            "Starting in-memory scan"
        );

        Ok(Box::new(MemoryRecordStream {
            partition: partition.clone(),
            records,
            delivered: 0,
            fail_after: self.failures.get(partition).copied(),
            finished: false,
            terminations: Arc::clone(&self.terminations),
        }))
    }
}

struct MemoryRecordStream {
    partition: PartitionId,
    records: VecDeque<ScannedRecord>,
    delivered: usize,
    fail_after: Option<usize>,
    finished: bool,
    terminations: Arc<Mutex<Vec<(PartitionId, ScanTermination)>>>,
}

impl MemoryRecordStream {
    fn finish(&mut self, how: ScanTermination) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.records.clear();
        if let Ok(mut log) = self.terminations.lock() {
            log.push((self.partition.clone(), how));
        }
    }
}

#[async_trait]
impl RecordStream for MemoryRecordStream {
    async fn next_record(&mut self) -> Result<Option<ScannedRecord>> {
        if self.finished {
            return Ok(None);
        }

        if self.fail_after == Some(self.delivered) {
            self.finish(ScanTermination::Failed);
            return Err(ExportError::Scan {
                partition: self.partition.to_string(),
                message: format!("node connection lost after {} records", self.delivered),
            }
            .into());
        }

        match self.records.pop_front() {
            Some(record) => {
                self.delivered += 1;
                Ok(Some(record))
            }
            None => {
                self.finish(ScanTermination::Exhausted);
                Ok(None)
            }
        }
    }

    async fn stop(&mut self, reason: StopReason) -> Result<()> {
        self.finish(ScanTermination::Stopped(reason));
        Ok(())
    }
}
