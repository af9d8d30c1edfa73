//! Bounded fan-out of set exports
//!
//! Every selected set becomes one task on a `JoinSet`; a `Semaphore` with
//! `concurrency` permits keeps at most that many scans running. Filters are
//! built for every namespace before the first task starts, so a namespace
//! whose configuration cannot be read aborts the run before any file is
//! touched. Once tasks are running, a failing set only affects its own
//! outcome.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use indicatif::MultiProgress;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info};

use crate::error::{ConfigError, ExportError, Result};
use crate::store::{FilterExpression, PartitionId, StoreClient};

use super::predicate::PredicateBuilder;
use super::progress::ProgressTracker;
use super::selector::PartitionSelector;
use super::worker::{PartitionExportWorker, PartitionOutcome, WorkerState};
use super::writers;
use super::{ExportOptions, FilterParams};

/// Outcomes of one run, sorted by partition.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub outcomes: Vec<PartitionOutcome>,
    pub elapsed_ms: u64,
}

impl ExportSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn total_records(&self) -> u64 {
        self.outcomes.iter().map(|o| o.records).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, partition: &PartitionId) -> Option<&PartitionOutcome> {
        self.outcomes.iter().find(|o| &o.partition == partition)
    }
}

pub struct ExportCoordinator {
    client: Arc<dyn StoreClient>,
    params: Arc<FilterParams>,
    options: ExportOptions,
    predicates: PredicateBuilder,
}

impl ExportCoordinator {
    pub fn new(client: Arc<dyn StoreClient>, params: Arc<FilterParams>, options: ExportOptions) -> Self {
        let predicates = PredicateBuilder::new(Arc::clone(&client));
        Self {
            client,
            params,
            options,
            predicates,
        }
    }

    /// Select sets with `selector` and export each of them.
    pub async fn export_matching(&self, selector: &PartitionSelector) -> Result<ExportSummary> {
        writers::validate_output_dir(&self.options.output_dir)?;

        let partitions = selector.select(self.client.as_ref()).await?;
        if partitions.is_empty() {
            info!("No sets matched the namespace and set filters");
            return Ok(ExportSummary::default());
        }

        info!("Exporting {} sets", partitions.len());
        self.run(partitions).await
    }

    /// Export `partitions` with at most `options.concurrency` running at once.
    ///
    /// Duplicates are exported once. Only errors detected before any scan
    /// starts are returned as `Err`. Per-set failures, panics and the overall
    /// wait limit are reported as failed outcomes.
    pub async fn run<I>(&self, partitions: I) -> Result<ExportSummary>
    where
        I: IntoIterator<Item = PartitionId>,
    {
        let concurrency = self.options.concurrency;
        if concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency".to_string(),
                value: "0 (must be at least 1)".to_string(),
            }
            .into());
        }

        let partitions: BTreeSet<PartitionId> = partitions.into_iter().collect();
        let start = Instant::now();
        let jobs = self.prepare(partitions).await?;
        debug!(sets = jobs.len(), concurrency, "Dispatching export workers");

        let multi = self.options.show_progress.then(MultiProgress::new);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<Id, PartitionId> = HashMap::new();

        for (partition, filter) in jobs {
            let tracker = ProgressTracker::new(
                &partition.to_string(),
                self.params.limit(),
                multi.as_ref(),
            );
            let worker = PartitionExportWorker::new(
                Arc::clone(&self.client),
                partition.clone(),
                filter,
                Arc::clone(&self.params),
                &self.options.output_dir,
            )
            .with_tracker(tracker);
            let semaphore = Arc::clone(&semaphore);

            let handle = tasks.spawn(async move {
                // Held for the whole export; released when the task ends.
                let _permit = semaphore.acquire_owned().await;
                worker.run().await
            });
            pending.insert(handle.id(), partition);
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        let wait_limit = self.options.wait_limit;
        let collected = tokio::time::timeout(wait_limit, async {
            while let Some(joined) = tasks.join_next_with_id().await {
                match joined {
                    Ok((id, outcome)) => {
                        pending.remove(&id);
                        outcomes.push(outcome);
                    }
                    Err(join_error) => {
                        let Some(partition) = pending.remove(&join_error.id()) else {
                            continue;
                        };
                        let cause = ExportError::WorkerPanicked(join_error.to_string());
                        error!(
                            namespace = %partition.namespace,
                            set = %partition.set_name,
                            "Error processing {}: {}",
                            partition,
                            cause
                        );
                        outcomes.push(failed_outcome(partition, cause.to_string()));
                    }
                }
            }
        })
        .await;

        if collected.is_err() {
            let cause = ExportError::Timeout(wait_limit);
            error!("{}; abandoning {} unfinished sets", cause, pending.len());
            tasks.abort_all();
            // Aborted workers drop their scratch guards as they unwind. A worker
            // may still finish on its own before the abort lands.
            while let Some(joined) = tasks.join_next_with_id().await {
                if let Ok((id, outcome)) = joined {
                    pending.remove(&id);
                    outcomes.push(outcome);
                }
            }
            for (_, partition) in pending.drain() {
                outcomes.push(failed_outcome(partition, cause.to_string()));
            }
        }

        outcomes.sort_by(|a, b| a.partition.cmp(&b.partition));
        let summary = ExportSummary {
            outcomes,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            records = summary.total_records(),
            "Export finished in {}ms",
            summary.elapsed_ms
        );
        Ok(summary)
    }

    /// Pair every partition with its namespace filter. Each distinct
    /// namespace's configuration is read once, concurrently.
    async fn prepare(
        &self,
        partitions: BTreeSet<PartitionId>,
    ) -> Result<Vec<(PartitionId, FilterExpression)>> {
        let namespaces: BTreeSet<&str> = partitions.iter().map(|p| p.namespace.as_str()).collect();
        let built = try_join_all(
            namespaces
                .iter()
                .map(|namespace| self.predicates.build_filter(namespace, &self.params)),
        )
        .await?;
        let filters: HashMap<&str, FilterExpression> = namespaces.into_iter().zip(built).collect();

        let mut jobs = Vec::with_capacity(partitions.len());
        for partition in &partitions {
            if let Some(filter) = filters.get(partition.namespace.as_str()) {
                jobs.push((partition.clone(), filter.clone()));
            }
        }
        Ok(jobs)
    }
}

fn failed_outcome(partition: PartitionId, error: String) -> PartitionOutcome {
    PartitionOutcome {
        partition,
        state: WorkerState::Failed,
        records: 0,
        columns: 0,
        limit_reached: false,
        output: None,
        file_size_bytes: 0,
        error: Some(error),
        elapsed_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::StoredRecord;
    use crate::store::{MemoryStore, RecordStream, ScannedRecord, StopReason, Value};
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    /// Delays every record by `delay`; scans of `panic_on` panic.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
        panic_on: Option<PartitionId>,
    }

    struct SlowStream {
        inner: Box<dyn RecordStream>,
        delay: Duration,
    }

    #[async_trait]
    impl StoreClient for SlowStore {
        async fn list_partitions(&self) -> Result<Vec<PartitionId>> {
            self.inner.list_partitions().await
        }

        async fn namespace_config(&self, namespace: &str) -> Result<HashMap<String, String>> {
            self.inner.namespace_config(namespace).await
        }

        async fn scan(
            &self,
            partition: &PartitionId,
            filter: &FilterExpression,
        ) -> Result<Box<dyn RecordStream>> {
            if self.panic_on.as_ref() == Some(partition) {
                panic!("scan of {partition} crashed");
            }
            let inner = self.inner.scan(partition, filter).await?;
            Ok(Box::new(SlowStream {
                inner,
                delay: self.delay,
            }))
        }
    }

    #[async_trait]
    impl RecordStream for SlowStream {
        async fn next_record(&mut self) -> Result<Option<ScannedRecord>> {
            tokio::time::sleep(self.delay).await;
            self.inner.next_record().await
        }

        async fn stop(&mut self, reason: StopReason) -> Result<()> {
            self.inner.stop(reason).await
        }
    }

    fn file_names(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }

    fn store(sets: &[&str]) -> MemoryStore {
        let mut store = MemoryStore::new().with_namespace("test", &[("storage-engine", "memory")]);
        for set in sets {
            let partition = PartitionId::new("test", *set);
            for i in 0..3 {
                store.insert(&partition, StoredRecord::new(vec![("n", Value::Int(i))]));
            }
        }
        store
    }

    fn coordinator(store: MemoryStore, dir: &Path, concurrency: usize) -> ExportCoordinator {
        ExportCoordinator::new(
            Arc::new(store),
            Arc::new(FilterParams::default()),
            ExportOptions {
                output_dir: dir.to_path_buf(),
                concurrency,
                ..ExportOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(store(&["a"]), dir.path(), 0);
        let err = tokio_test::assert_err!(coordinator.run(vec![PartitionId::new("test", "a")]).await);
        assert!(err.is_fatal_before_scan());
        assert!(!dir.path().join("test.a.csv").exists());
    }

    #[tokio::test]
    async fn test_exports_every_partition() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(store(&["a", "b", "c"]), dir.path(), 2);
        let summary = tokio_test::assert_ok!(coordinator.export_matching(&PartitionSelector::all()).await);

        assert_eq!(summary.succeeded(), 3);
        assert_eq!(summary.total_records(), 9);
        for set in ["a", "b", "c"] {
            assert!(dir.path().join(format!("test.{set}.csv")).exists());
        }
    }

    #[tokio::test]
    async fn test_unknown_namespace_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(store(&["a"]), dir.path(), 1);
        let err = coordinator
            .run(vec![PartitionId::new("test", "a"), PartitionId::new("missing", "x")])
            .await
            .unwrap_err();
        assert!(err.is_fatal_before_scan());
        assert!(!dir.path().join("test.a.csv").exists());
    }

    #[tokio::test]
    async fn test_missing_output_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(store(&["a"]), &dir.path().join("nope"), 1);
        let err = coordinator
            .export_matching(&PartitionSelector::all())
            .await
            .unwrap_err();
        assert!(err.is_fatal_before_scan());
    }

    #[tokio::test]
    async fn test_no_matching_sets() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(store(&["a"]), dir.path(), 1);
        let selector = PartitionSelector::new(&["other"], &[]).unwrap();
        let summary = coordinator.export_matching(&selector).await.unwrap();
        assert!(summary.outcomes.is_empty());
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_duplicate_partitions_exported_once() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(store(&["a"]), dir.path(), 2);
        let a = PartitionId::new("test", "a");
        let summary = tokio_test::assert_ok!(coordinator.run(vec![a.clone(), a.clone()]).await);

        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.outcome(&a).unwrap().records, 3);
        assert_eq!(file_names(dir.path()), vec!["test.a.csv".to_string()]);
    }

    #[tokio::test]
    async fn test_wait_limit_fails_unfinished_sets_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut inner = MemoryStore::new().with_namespace("t", &[]);
        for set in ["s0", "s1", "s2"] {
            let partition = PartitionId::new("t", set);
            for i in 0..1000 {
                inner.insert(&partition, StoredRecord::new(vec![("n", Value::Int(i))]));
            }
        }
        let client = SlowStore {
            inner,
            delay: Duration::from_millis(10),
            panic_on: None,
        };
        let coordinator = ExportCoordinator::new(
            Arc::new(client),
            Arc::new(FilterParams::default()),
            ExportOptions {
                output_dir: dir.path().to_path_buf(),
                concurrency: 2,
                wait_limit: Duration::from_millis(100),
                ..ExportOptions::default()
            },
        );

        let summary = tokio_test::assert_ok!(coordinator.export_matching(&PartitionSelector::all()).await);

        assert_eq!(summary.outcomes.len(), 3);
        assert_eq!(summary.failed(), 3);
        for outcome in &summary.outcomes {
            assert_eq!(outcome.state, WorkerState::Failed);
            assert!(outcome.error.as_deref().unwrap().contains("did not finish within 100ms"));
        }
        assert!(file_names(dir.path()).is_empty(), "{:?}", file_names(dir.path()));
    }

    #[tokio::test]
    async fn test_worker_panic_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let crashing = PartitionId::new("test", "b");
        let client = SlowStore {
            inner: store(&["a", "b", "c"]),
            delay: Duration::ZERO,
            panic_on: Some(crashing.clone()),
        };
        let coordinator = ExportCoordinator::new(
            Arc::new(client),
            Arc::new(FilterParams::default()),
            ExportOptions {
                output_dir: dir.path().to_path_buf(),
                concurrency: 3,
                ..ExportOptions::default()
            },
        );

        let summary = tokio_test::assert_ok!(coordinator.export_matching(&PartitionSelector::all()).await);

        assert_eq!(summary.outcomes.len(), 3);
        assert_eq!(summary.succeeded(), 2);
        let failed = summary.outcome(&crashing).unwrap();
        assert_eq!(failed.state, WorkerState::Failed);
        assert!(failed.error.as_deref().unwrap().contains("Worker task failed"));

        let mut names = file_names(dir.path());
        names.sort();
        assert_eq!(names, vec!["test.a.csv".to_string(), "test.c.csv".to_string()]);
    }
}
