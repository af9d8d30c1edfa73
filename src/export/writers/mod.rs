//! File writers for export operations
//!
//! A set is first streamed into a scratch file whose rows follow the
//! column order known at write time. Once the scan ends, the final file is
//! produced by writing the header and copying the scratch bytes after it.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::warn;
use uuid::Uuid;

use crate::error::{ConfigError, ExportError, Result};
use crate::export::materializer::Row;
use crate::store::PartitionId;

pub mod csv;

pub use csv::{ScratchWriter, header_line, write_with_header};

/// Buffer size for scratch and output files
const WRITE_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Destination for the rows of one scan
#[async_trait]
pub trait RowSink: Send {
    /// Append one row
    async fn write_row(&mut self, row: &Row) -> io::Result<()>;

    /// Flush and close, returning the number of rows written
    async fn finish(self: Box<Self>) -> io::Result<u64>;
}

/// Opens a [`RowSink`] for a scratch path
#[async_trait]
pub trait SinkFactory: Send + Sync {
    async fn open(&self, path: &Path) -> io::Result<Box<dyn RowSink>>;
}

/// Scratch rows go to a buffered CSV file
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvScratchFiles;

#[async_trait]
impl SinkFactory for CsvScratchFiles {
    async fn open(&self, path: &Path) -> io::Result<Box<dyn RowSink>> {
        Ok(Box::new(ScratchWriter::create(path).await?))
    }
}

/// Helper function to create a buffered file writer
pub(crate) async fn create_writer(path: &Path) -> io::Result<BufWriter<File>> {
    let file = File::create(path).await?;
    Ok(BufWriter::with_capacity(WRITE_BUFFER_CAPACITY, file))
}

/// Check that the output directory exists and is a directory
pub fn validate_output_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(ConfigError::InvalidValue {
            field: "directory".to_string(),
            value: format!("{} (not an existing directory)", dir.display()),
        }
        .into());
    }
    Ok(())
}

/// Reject names that would place a file outside the output directory
fn check_file_component(partition: &PartitionId, name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("empty name")
    } else if name == "." || name == ".." {
        Some("name is a relative path component")
    } else if name.contains(['/', '\\', '\0']) {
        Some("name contains a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ExportError::InvalidName {
            partition: partition.to_string(),
            reason: format!("{reason} ({name:?})"),
        }
        .into()),
        None => Ok(()),
    }
}

/// Scratch and final paths for a set, in that order
///
/// Scratch files are named `{namespace}.{set}.{uuid}.csv.part`, final files
/// `{namespace}.{set}.csv`.
pub fn partition_paths(dir: &Path, partition: &PartitionId) -> Result<(PathBuf, PathBuf)> {
    check_file_component(partition, &partition.namespace)?;
    check_file_component(partition, &partition.set_name)?;

    let scratch = dir.join(format!("{}.{}.csv.part", partition, Uuid::new_v4().simple()));
    let destination = dir.join(partition.output_file_name());
    Ok((scratch, destination))
}

/// Removes the scratch file when dropped, unless disarmed
///
/// Covers error returns as well as a worker task being aborted mid-scan.
pub struct ScratchGuard {
    path: PathBuf,
    armed: bool,
}

impl ScratchGuard {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    /// The scratch file has been consumed; leave the path alone.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove scratch file {}: {}", self.path.display(), e);
            }
        }
    }
}
