//! Single-set export
//!
//! A worker moves through `Idle -> Scanning -> Finalizing -> Done`, or ends in
//! `Failed`. While scanning it pulls records from the store, materializes
//! each into a row and appends the row to a scratch file. Reaching the record
//! limit stops the scan with [`StopReason::Normal`]; a write failure stops it
//! with [`StopReason::Error`]. Once the scan is over the final file is
//! written as header + scratch contents.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::error::{ExportError, ExporterError, Result};
use crate::store::{
    FilterExpression, PartitionId, RecordStream, ScanControl, ScannedRecord, StopReason,
    StoreClient,
};

use super::FilterParams;
use super::materializer::RowMaterializer;
use super::progress::ProgressTracker;
use super::schema::SchemaRegistry;
use super::writers::{self, CsvScratchFiles, RowSink, ScratchGuard, SinkFactory};

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Scanning,
    Finalizing,
    Done,
    Failed,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Scanning => "scanning",
            WorkerState::Finalizing => "finalizing",
            WorkerState::Done => "done",
            WorkerState::Failed => "failed",
        }
    }
}

/// What happened to one set.
#[derive(Debug, Clone)]
pub struct PartitionOutcome {
    pub partition: PartitionId,
    /// `Done` or `Failed`
    pub state: WorkerState,
    /// Rows written to the scratch file
    pub records: u64,
    /// Columns in the final header
    pub columns: usize,
    /// Whether the scan ended because of the record limit
    pub limit_reached: bool,
    /// Final file, when the export succeeded
    pub output: Option<PathBuf>,
    /// Size of the final file in bytes
    pub file_size_bytes: u64,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl PartitionOutcome {
    pub fn is_success(&self) -> bool {
        self.state == WorkerState::Done
    }
}

/// Per-scan bookkeeping owned by the worker.
struct ScanState {
    registry: SchemaRegistry,
    writer: Box<dyn RowSink>,
    count: u64,
    /// Set when a record could not be written.
    failure: Option<ExporterError>,
}

/// Summary of a finished scan.
struct ScanSummary {
    records: u64,
    limit_reached: bool,
}

/// A set written to its final file.
struct Exported {
    scan: ScanSummary,
    columns: usize,
    destination: PathBuf,
    file_size_bytes: u64,
}

pub struct PartitionExportWorker {
    client: Arc<dyn StoreClient>,
    partition: PartitionId,
    filter: FilterExpression,
    params: Arc<FilterParams>,
    output_dir: PathBuf,
    materializer: RowMaterializer,
    sinks: Arc<dyn SinkFactory>,
    tracker: ProgressTracker,
    state: WorkerState,
}

impl PartitionExportWorker {
    pub fn new(
        client: Arc<dyn StoreClient>,
        partition: PartitionId,
        filter: FilterExpression,
        params: Arc<FilterParams>,
        output_dir: &Path,
    ) -> Self {
        let materializer = RowMaterializer::new(params.prefix());
        Self {
            client,
            partition,
            filter,
            params,
            output_dir: output_dir.to_path_buf(),
            materializer,
            sinks: Arc::new(CsvScratchFiles),
            tracker: ProgressTracker::hidden(),
            state: WorkerState::Idle,
        }
    }

    pub fn with_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    #[cfg(test)]
    fn with_sinks(mut self, sinks: Arc<dyn SinkFactory>) -> Self {
        self.sinks = sinks;
        self
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(
            partition = %self.partition,
            from = self.state.as_str(),
            to = next.as_str(),
            "Worker state change"
        );
        self.state = next;
    }

    /// Export the set. Failures are logged and reported in the outcome;
    /// they never propagate to the caller.
    pub async fn run(mut self) -> PartitionOutcome {
        let start = Instant::now();
        let result = self.export().await;
        self.tracker.finish();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(exported) => {
                self.transition(WorkerState::Done);
                info!(
                    namespace = %self.partition.namespace,
                    set = %self.partition.set_name,
                    records = exported.scan.records,
                    columns = exported.columns,
                    "Namespace: {}, Set: {}, output {} records",
                    self.partition.namespace,
                    self.partition.set_name,
                    exported.scan.records
                );
                PartitionOutcome {
                    partition: self.partition,
                    state: WorkerState::Done,
                    records: exported.scan.records,
                    columns: exported.columns,
                    limit_reached: exported.scan.limit_reached,
                    output: Some(exported.destination),
                    file_size_bytes: exported.file_size_bytes,
                    error: None,
                    elapsed_ms,
                }
            }
            Err(e) => {
                self.transition(WorkerState::Failed);
                error!(
                    namespace = %self.partition.namespace,
                    set = %self.partition.set_name,
                    "Error processing {}: {}",
                    self.partition,
                    e
                );
                PartitionOutcome {
                    partition: self.partition,
                    state: WorkerState::Failed,
                    records: self.tracker.processed(),
                    columns: 0,
                    limit_reached: false,
                    output: None,
                    file_size_bytes: 0,
                    error: Some(e.to_string()),
                    elapsed_ms,
                }
            }
        }
    }

    /// The scratch file is removed by its guard on every path out of here
    /// except a completed rewrite, including the task being aborted.
    async fn export(&mut self) -> Result<Exported> {
        let (scratch, destination) = writers::partition_paths(&self.output_dir, &self.partition)?;

        self.transition(WorkerState::Scanning);
        debug!(partition = %self.partition, filter = %self.filter, "Starting scan");

        let mut guard = ScratchGuard::new(&scratch);
        let writer = self
            .sinks
            .open(&scratch)
            .await
            .map_err(|e| self.write_error(e))?;
        let mut scan = ScanState {
            registry: SchemaRegistry::new(),
            writer,
            count: 0,
            failure: None,
        };

        let mut stream = self.client.scan(&self.partition, &self.filter).await?;
        let summary = self.drive_scan(stream.as_mut(), &mut scan).await?;

        self.transition(WorkerState::Finalizing);
        let ScanState {
            registry, writer, ..
        } = scan;
        writer.finish().await.map_err(|e| self.write_error(e))?;

        let columns = registry.snapshot();
        let file_size_bytes = writers::write_with_header(&scratch, &destination, &columns)
            .await
            .map_err(|e| ExportError::Finalize {
                partition: self.partition.to_string(),
                message: e.to_string(),
            })?;
        guard.disarm();

        Ok(Exported {
            scan: summary,
            columns: columns.len(),
            destination,
            file_size_bytes,
        })
    }

    /// Pull records until the stream ends or a record asks to stop.
    async fn drive_scan(
        &self,
        stream: &mut dyn RecordStream,
        scan: &mut ScanState,
    ) -> Result<ScanSummary> {
        loop {
            let scanned = match stream.next_record().await? {
                Some(scanned) => scanned,
                None => {
                    return Ok(ScanSummary {
                        records: scan.count,
                        limit_reached: false,
                    });
                }
            };

            match self.on_record(&scanned, scan).await {
                ScanControl::Continue => {}
                ScanControl::Stop(StopReason::Normal) => {
                    debug!(partition = %self.partition, limit = self.params.record_limit, "Record limit reached");
                    stream.stop(StopReason::Normal).await?;
                    return Ok(ScanSummary {
                        records: scan.count,
                        limit_reached: true,
                    });
                }
                ScanControl::Stop(StopReason::Error) => {
                    if let Err(e) = stream.stop(StopReason::Error).await {
                        warn!(partition = %self.partition, "Failed to stop scan: {}", e);
                    }
                    return Err(scan.failure.take().unwrap_or_else(|| {
                        ExporterError::from(ExportError::Scan {
                            partition: self.partition.to_string(),
                            message: "scan stopped on error".to_string(),
                        })
                    }));
                }
            }
        }
    }

    /// Handle one record and decide whether the scan goes on.
    async fn on_record(&self, scanned: &ScannedRecord, scan: &mut ScanState) -> ScanControl {
        let row = self
            .materializer
            .materialize(&scanned.key, &scanned.record, &mut scan.registry);

        if let Err(e) = scan.writer.write_row(&row).await {
            scan.failure = Some(self.write_error(e));
            return ScanControl::Stop(StopReason::Error);
        }

        scan.count += 1;
        self.tracker.update(scan.count);

        match self.params.limit() {
            Some(limit) if scan.count >= limit => ScanControl::Stop(StopReason::Normal),
            _ => ScanControl::Continue,
        }
    }

    fn write_error(&self, e: std::io::Error) -> ExporterError {
        ExportError::Write {
            partition: self.partition.to_string(),
            message: e.to_string(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{ScanTermination, StoredRecord};
    use crate::export::materializer::Row;
    use crate::export::writers::ScratchWriter;
    use crate::store::{MemoryStore, Value};
    use async_trait::async_trait;
    use std::io;
    use tokio::fs;

    /// Real scratch file whose writes start failing after `accepted` rows.
    struct FullDisk {
        accepted: usize,
    }

    struct FullDiskSink {
        inner: ScratchWriter,
        remaining: usize,
    }

    #[async_trait]
    impl SinkFactory for FullDisk {
        async fn open(&self, path: &Path) -> io::Result<Box<dyn RowSink>> {
            Ok(Box::new(FullDiskSink {
                inner: ScratchWriter::create(path).await?,
                remaining: self.accepted,
            }))
        }
    }

    #[async_trait]
    impl RowSink for FullDiskSink {
        async fn write_row(&mut self, row: &Row) -> io::Result<()> {
            if self.remaining == 0 {
                return Err(io::Error::other("no space left on device"));
            }
            self.remaining -= 1;
            self.inner.write_row(row).await
        }

        async fn finish(self: Box<Self>) -> io::Result<u64> {
            self.inner.finish().await
        }
    }

    async fn file_names(dir: &Path) -> Vec<String> {
        let mut entries = fs::read_dir(dir).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names
    }

    fn demo() -> PartitionId {
        PartitionId::new("test", "demo")
    }

    fn store_with(count: usize) -> MemoryStore {
        let mut store = MemoryStore::new().with_namespace("test", &[("storage-engine", "device")]);
        store = store.with_set(&demo());
        for i in 0..count {
            store.insert(&demo(), StoredRecord::new(vec![("n", Value::Int(i as i64))]));
        }
        store
    }

    fn worker(store: Arc<MemoryStore>, params: FilterParams, dir: &Path) -> PartitionExportWorker {
        PartitionExportWorker::new(
            store,
            demo(),
            FilterExpression::And(vec![]),
            Arc::new(params),
            dir,
        )
    }

    #[tokio::test]
    async fn test_limit_writes_exactly_limit_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_with(10));
        let params = FilterParams {
            record_limit: 4,
            ..FilterParams::default()
        };

        let outcome = worker(store.clone(), params, dir.path()).run().await;
        assert!(outcome.is_success());
        assert_eq!(outcome.records, 4);
        assert!(outcome.limit_reached);

        let content = fs::read_to_string(dir.path().join("test.demo.csv")).await.unwrap();
        assert_eq!(content.lines().count(), 5);
        assert_eq!(
            store.terminations(),
            vec![(demo(), ScanTermination::Stopped(StopReason::Normal))]
        );
    }

    #[tokio::test]
    async fn test_limit_equal_to_record_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_with(3));
        let params = FilterParams {
            record_limit: 3,
            ..FilterParams::default()
        };
        let outcome = worker(store, params, dir.path()).run().await;
        assert!(outcome.is_success());
        assert_eq!(outcome.records, 3);
    }

    #[tokio::test]
    async fn test_unlimited_writes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_with(25));
        let outcome = worker(store.clone(), FilterParams::default(), dir.path()).run().await;

        assert!(outcome.is_success());
        assert_eq!(outcome.records, 25);
        assert!(!outcome.limit_reached);
        assert_eq!(outcome.columns, 1);
        assert_eq!(store.terminations(), vec![(demo(), ScanTermination::Exhausted)]);
    }

    #[tokio::test]
    async fn test_scratch_file_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_with(2));
        worker(store, FilterParams::default(), dir.path()).run().await;
        assert_eq!(file_names(dir.path()).await, vec!["test.demo.csv".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_set_writes_empty_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_with(0));
        let outcome = worker(store, FilterParams::default(), dir.path()).run().await;

        assert!(outcome.is_success());
        assert_eq!(outcome.records, 0);
        let content = fs::read_to_string(dir.path().join("test.demo.csv")).await.unwrap();
        assert_eq!(content, "\n");
    }

    #[tokio::test]
    async fn test_mid_scan_failure_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_with(5).fail_scan_after(&demo(), 2));
        let outcome = worker(store, FilterParams::default(), dir.path()).run().await;

        assert_eq!(outcome.state, WorkerState::Failed);
        assert!(outcome.output.is_none());
        assert!(outcome.error.unwrap().contains("test.demo"));
        assert!(!dir.path().join("test.demo.csv").exists());
        assert!(file_names(dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_stops_scan_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_with(10));
        let outcome = worker(store.clone(), FilterParams::default(), dir.path())
            .with_sinks(Arc::new(FullDisk { accepted: 3 }))
            .run()
            .await;

        assert_eq!(outcome.state, WorkerState::Failed);
        assert_eq!(outcome.records, 3);
        assert!(outcome.output.is_none());
        let message = outcome.error.unwrap();
        assert!(message.contains("Failed to write row for test.demo"), "{message}");
        assert!(message.contains("no space left on device"), "{message}");

        assert_eq!(
            store.terminations(),
            vec![(demo(), ScanTermination::Stopped(StopReason::Error))]
        );
        assert!(file_names(dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_set_name_with_separator_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let partition = PartitionId::new("test", "../escape");
        let store = Arc::new(
            MemoryStore::new()
                .with_namespace("test", &[])
                .with_record(&partition, StoredRecord::new(vec![("n", Value::Int(1))])),
        );

        let outcome = PartitionExportWorker::new(
            store.clone(),
            partition,
            FilterExpression::And(vec![]),
            Arc::new(FilterParams::default()),
            dir.path(),
        )
        .run()
        .await;

        assert_eq!(outcome.state, WorkerState::Failed);
        assert!(outcome.error.unwrap().contains("path separator"));
        assert!(store.terminations().is_empty());
        assert!(file_names(dir.path()).await.is_empty());
        assert!(!dir.path().parent().unwrap().join("escape.csv").exists());
    }

    #[tokio::test]
    async fn test_missing_output_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_with(1));
        let outcome = worker(store, FilterParams::default(), &dir.path().join("nope"))
            .run()
            .await;
        assert_eq!(outcome.state, WorkerState::Failed);
    }
}
