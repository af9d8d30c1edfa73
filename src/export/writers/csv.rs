//! CSV writing for export operations
//!
//! Rows are written to a scratch file as they arrive. The header is only
//! known once the scan ends, so the final file is assembled afterwards:
//! header line first, scratch bytes copied verbatim behind it.
//!
//! The header line ends every column name with a comma, including the last
//! one. Rows carry exactly as many fields as the registry had columns when
//! they were written, so early rows may be shorter than the header.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::export::materializer::Row;
use crate::formatter::{PlainTextConverter, ValueConverter};

use super::{RowSink, create_writer};

/// Writer for the per-set scratch file
pub struct ScratchWriter {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the scratch file
    path: PathBuf,
    /// Number of rows written
    rows: u64,
    /// Converter for values to plain text
    converter: PlainTextConverter,
}

impl ScratchWriter {
    /// Create the scratch file, truncating anything already there
    pub async fn create(path: &Path) -> io::Result<Self> {
        let writer = create_writer(path).await?;

        debug!("Created scratch file: {}", path.display());

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
            converter: PlainTextConverter::new(),
        })
    }

    /// Write a single row as a CSV line
    pub async fn write_row(&mut self, row: &Row) -> io::Result<()> {
        let line = self.format_row(row);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and close the scratch file, returning the number of rows
    pub async fn finish(mut self) -> io::Result<u64> {
        self.writer.flush().await?;
        self.writer.get_mut().sync_all().await?;
        debug!("Closed scratch file: {} ({} rows)", self.path.display(), self.rows);
        Ok(self.rows)
    }

    fn format_row(&self, row: &Row) -> String {
        let fields: Vec<String> = row
            .iter()
            .map(|cell| Self::escape_csv_value(&self.converter.convert_optional(cell.as_ref())))
            .collect();
        fields.join(",")
    }

    /// Quote a value if it contains a comma, quote, or line break
    fn escape_csv_value(value: &str) -> String {
        if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
            // Wrap in quotes and escape internal quotes by doubling them
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

#[async_trait]
impl RowSink for ScratchWriter {
    async fn write_row(&mut self, row: &Row) -> io::Result<()> {
        ScratchWriter::write_row(self, row).await
    }

    async fn finish(self: Box<Self>) -> io::Result<u64> {
        ScratchWriter::finish(*self).await
    }
}

/// Header line: every column name followed by a comma, then a newline
pub fn header_line(columns: &[String]) -> String {
    let mut line = String::with_capacity(columns.iter().map(|c| c.len() + 1).sum::<usize>() + 1);
    for name in columns {
        line.push_str(name);
        line.push(',');
    }
    line.push('\n');
    line
}

/// Write `destination` as the header followed by the scratch file's bytes,
/// then delete the scratch file. Returns the size of the final file.
pub async fn write_with_header(
    scratch: &Path,
    destination: &Path,
    columns: &[String],
) -> io::Result<u64> {
    let mut writer = create_writer(destination).await?;
    let header = header_line(columns);
    writer.write_all(header.as_bytes()).await?;

    let mut source = File::open(scratch).await?;
    let copied = tokio::io::copy(&mut source, &mut writer).await?;
    writer.flush().await?;
    drop(source);

    tokio::fs::remove_file(scratch).await?;

    let size = header.len() as u64 + copied;
    debug!(
        "Wrote {} ({} columns, {} bytes)",
        destination.display(),
        columns.len(),
        size
    );
    Ok(size)
}
