//! JSON cluster snapshots
//!
//! Loads a snapshot file into a [`MemoryStore`], which lets the exporter run
//! against a captured cluster without network access. Layout:
//!
//! ```json
//! {
//!   "namespaces": {
//!     "test": {
//!       "config": { "storage-engine": "device" },
//!       "sets": {
//!         "demo": [
//!           { "generation": 2, "expiration": 0, "device_size": 120,
//!             "last_update_ns": 1700000000000000000,
//!             "bins": { "a": 1, "blob": { "$bytes": "00ff" } } }
//!         ]
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::memory::StoredRecord;
use super::{MemoryStore, PartitionId, Record, RecordMetrics, Value};

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    namespaces: BTreeMap<String, SnapshotNamespace>,
}

#[derive(Debug, Deserialize)]
struct SnapshotNamespace {
    #[serde(default)]
    config: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    sets: BTreeMap<String, Vec<SnapshotRecord>>,
}

#[derive(Debug, Deserialize)]
struct SnapshotRecord {
    /// Hex-encoded digest; synthesized when absent.
    #[serde(default)]
    digest: Option<String>,
    #[serde(default = "default_generation")]
    generation: u32,
    #[serde(default)]
    expiration: u32,
    #[serde(default)]
    last_update_ns: i64,
    #[serde(default)]
    device_size: i64,
    #[serde(default)]
    memory_size: i64,
    #[serde(default)]
    bins: serde_json::Map<String, serde_json::Value>,
}

fn default_generation() -> u32 {
    1
}

/// Read a snapshot file from disk.
pub async fn load_snapshot(path: &Path) -> Result<MemoryStore> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        ConfigError::FileNotFound(format!("{}: {}", path.display(), e))
    })?;
    let store = parse_snapshot(&text)?;
    info!("Loaded cluster snapshot from {}", path.display());
    Ok(store)
}

/// Parse snapshot JSON text.
pub fn parse_snapshot(text: &str) -> Result<MemoryStore> {
    let snapshot: SnapshotFile = serde_json::from_str(text)
        .map_err(|e| ConfigError::InvalidFormat(format!("snapshot: {e}")))?;

    let mut store = MemoryStore::new();
    for (namespace, data) in snapshot.namespaces {
        let config: Vec<(String, String)> = data
            .config
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect();
        let pairs: Vec<(&str, &str)> = config
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        store = store.with_namespace(&namespace, &pairs);

        for (set_name, records) in data.sets {
            let partition = PartitionId::new(namespace.clone(), set_name);
            debug!(partition = %partition, records = records.len(), "Snapshot set");
            store = store.with_set(&partition);
            for record in records {
                store.insert(&partition, into_stored(record)?);
            }
        }
    }

    Ok(store)
}

fn into_stored(record: SnapshotRecord) -> Result<StoredRecord> {
    let digest = match record.digest {
        Some(encoded) => Some(hex::decode(&encoded).map_err(|e| ConfigError::InvalidValue {
            field: "digest".to_string(),
            value: format!("{encoded} ({e})"),
        })?),
        None => None,
    };

    Ok(StoredRecord {
        digest,
        record: Record::new(
            record
                .bins
                .into_iter()
                .map(|(name, value)| (name, Value::from(value)))
                .collect(),
            record.generation,
            record.expiration,
        ),
        metrics: RecordMetrics {
            last_update_ns: record.last_update_ns,
            device_size: record.device_size,
            memory_size: record.memory_size,
        },
    })
}
