//! Scan filter construction
//!
//! Every scan carries a filter bounding last-update time and record size.
//! Which size metric applies depends on the namespace's storage engine:
//! device size for namespaces on disk, memory size for in-memory ones.
//! The storage classification is asked of the cluster once per namespace
//! and memoized for the rest of the run.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::store::{FilterExpression, Operand, StoreClient};

use super::FilterParams;

/// Where a namespace keeps its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Device,
    Memory,
}

impl StorageClass {
    /// Classify from namespace configuration properties.
    ///
    /// `storage-engine=memory` or `data-in-memory=true` mean in-memory.
    pub fn from_config(config: &HashMap<String, String>) -> Self {
        let engine_memory = config
            .get("storage-engine")
            .is_some_and(|v| v.eq_ignore_ascii_case("memory"));
        let data_in_memory = config
            .get("data-in-memory")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        if engine_memory || data_in_memory {
            StorageClass::Memory
        } else {
            StorageClass::Device
        }
    }

    pub fn size_operand(&self) -> Operand {
        match self {
            StorageClass::Device => Operand::DeviceSize,
            StorageClass::Memory => Operand::MemorySize,
        }
    }
}

/// Run-scoped memo of namespace storage classes. No eviction.
#[derive(Debug, Default)]
pub struct StorageClassCache {
    entries: RwLock<HashMap<String, StorageClass>>,
}

impl StorageClassCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, namespace: &str) -> Option<StorageClass> {
        self.entries.read().await.get(namespace).copied()
    }

    /// Cached classification, querying the cluster on first use.
    pub async fn resolve(&self, client: &dyn StoreClient, namespace: &str) -> Result<StorageClass> {
        if let Some(class) = self.get(namespace).await {
            return Ok(class);
        }

        let config = client.namespace_config(namespace).await?;
        let class = StorageClass::from_config(&config);
        debug!(namespace, ?class, "Classified namespace storage");

        let mut entries = self.entries.write().await;
        Ok(*entries.entry(namespace.to_string()).or_insert(class))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Builds the per-namespace scan filter.
pub struct PredicateBuilder {
    client: Arc<dyn StoreClient>,
    cache: StorageClassCache,
}

impl PredicateBuilder {
    pub fn new(client: Arc<dyn StoreClient>) -> Self {
        Self {
            client,
            cache: StorageClassCache::new(),
        }
    }

    pub fn cache(&self) -> &StorageClassCache {
        &self.cache
    }

    pub async fn build_filter(
        &self,
        namespace: &str,
        params: &FilterParams,
    ) -> Result<FilterExpression> {
        let class = self.cache.resolve(self.client.as_ref(), namespace).await?;
        Ok(Self::filter_for(class, params))
    }

    /// `start <= last_update <= end` and `min <= size <= max`.
    pub fn filter_for(class: StorageClass, params: &FilterParams) -> FilterExpression {
        let size = class.size_operand();
        FilterExpression::And(vec![
            FilterExpression::le(Operand::Int(params.start_time_ns), Operand::LastUpdate),
            FilterExpression::le(Operand::LastUpdate, Operand::Int(params.end_time_ns)),
            FilterExpression::le(Operand::Int(params.min_size), size),
            FilterExpression::le(size, Operand::Int(params.max_size)),
        ])
    }
}
