//! Chooses which sets to export
//!
//! Namespace and set filters are lists of regular expressions matched
//! against the whole name. An empty list matches everything, so running
//! without filters exports every set in the cluster.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::debug;

use crate::error::{ConfigError, ExporterError, Result};
use crate::store::{PartitionId, StoreClient};

#[derive(Debug, Clone)]
pub struct PartitionSelector {
    namespaces: Vec<Regex>,
    sets: Vec<Regex>,
}

impl PartitionSelector {
    /// Compile the filter patterns. Each pattern must match the full name.
    pub fn new<S: AsRef<str>>(namespace_patterns: &[S], set_patterns: &[S]) -> Result<Self> {
        Ok(Self {
            namespaces: compile_all(namespace_patterns)?,
            sets: compile_all(set_patterns)?,
        })
    }

    /// Selector with no filters.
    pub fn all() -> Self {
        Self {
            namespaces: Vec::new(),
            sets: Vec::new(),
        }
    }

    pub fn matches(&self, partition: &PartitionId) -> bool {
        matches_any(&self.namespaces, &partition.namespace)
            && matches_any(&self.sets, &partition.set_name)
    }

    /// Ask the cluster for its sets and keep the matching ones.
    ///
    /// Duplicates reported by the cluster collapse; the result is sorted.
    pub async fn select(&self, client: &dyn StoreClient) -> Result<Vec<PartitionId>> {
        let available = client.list_partitions().await?;
        let total = available.len();

        let selected: BTreeSet<PartitionId> = available
            .into_iter()
            .filter(|partition| {
                let keep = self.matches(partition);
                if keep {
                    debug!(namespace = %partition.namespace, set = %partition.set_name, "Selected set");
                }
                keep
            })
            .collect();

        debug!("Selected {} of {} sets", selected.len(), total);
        Ok(selected.into_iter().collect())
    }
}

fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                ExporterError::from(ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            })
        })
        .collect()
}

fn matches_any(patterns: &[Regex], name: &str) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| p.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn cluster() -> MemoryStore {
        MemoryStore::new()
            .with_set(&PartitionId::new("test", "demo"))
            .with_set(&PartitionId::new("test", "demo_archive"))
            .with_set(&PartitionId::new("test", "users"))
            .with_set(&PartitionId::new("bar", "demo"))
            .with_set(&PartitionId::new("prod1", "events"))
    }

    #[tokio::test]
    async fn test_empty_filters_select_everything() {
        let store = cluster();
        let selected = PartitionSelector::all().select(&store).await.unwrap();
        assert_eq!(selected.len(), 5);

        let empty: [&str; 0] = [];
        let selected = PartitionSelector::new(&empty, &empty)
            .unwrap()
            .select(&store)
            .await
            .unwrap();
        assert_eq!(selected.len(), 5);
    }

    #[tokio::test]
    async fn test_literal_patterns_full_match() {
        let store = cluster();
        let selector = PartitionSelector::new(&["test"], &["demo"]).unwrap();
        let selected = selector.select(&store).await.unwrap();
        // "demo" must not select "demo_archive"
        assert_eq!(selected, vec![PartitionId::new("test", "demo")]);
    }

    #[tokio::test]
    async fn test_regex_patterns() {
        let store = cluster();
        let selector = PartitionSelector::new(&["prod\\d+", "bar"], &[]).unwrap();
        let selected = selector.select(&store).await.unwrap();
        assert_eq!(
            selected,
            vec![
                PartitionId::new("bar", "demo"),
                PartitionId::new("prod1", "events"),
            ]
        );

        let selector = PartitionSelector::new(&[], &["demo.*"]).unwrap();
        let selected = selector.select(&store).await.unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_matches_requires_both() {
        let selector = PartitionSelector::new(&["test"], &["users|demo"]).unwrap();
        assert!(selector.matches(&PartitionId::new("test", "users")));
        assert!(!selector.matches(&PartitionId::new("bar", "users")));
        assert!(!selector.matches(&PartitionId::new("test", "events")));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PartitionSelector::new(&["("], &[]).unwrap_err();
        assert!(err.is_fatal_before_scan());
    }

    #[tokio::test]
    async fn test_no_match_is_not_an_error() {
        let store = cluster();
        let selector = PartitionSelector::new(&["nothing"], &[]).unwrap();
        assert!(selector.select(&store).await.unwrap().is_empty());
    }
}
