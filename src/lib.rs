//! setdump library
//!
//! Bulk export of key-value store sets into per-set CSV files. Columns are
//! discovered while a set streams in, so sets whose records carry different
//! bins still produce a single rectangular header.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `connection`: Builds the store client from connection settings
//! - `error`: Error types and handling
//! - `export`: Selection, filtering, column discovery and the worker pool
//! - `formatter`: Field rendering and the run summary
//! - `store`: Store client contract plus the in-memory and snapshot stores
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use setdump::export::{ExportCoordinator, ExportOptions, FilterParams, PartitionSelector};
//! use setdump::store::snapshot::load_snapshot;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = load_snapshot("cluster.json".as_ref()).await?;
//!     let coordinator = ExportCoordinator::new(
//!         Arc::new(store),
//!         Arc::new(FilterParams::default()),
//!         ExportOptions::default(),
//!     );
//!
//!     let selector = PartitionSelector::new(&["test"], &[])?;
//!     let summary = coordinator.export_matching(&selector).await?;
//!     println!("{} sets exported", summary.succeeded());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod export;
pub mod formatter;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{ExporterError, Result};
pub use export::{ExportCoordinator, ExportSummary, FilterParams, PartitionSelector};
pub use store::{PartitionId, StoreClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
