//! Error handling for export runs.
//!
//! Errors fall into two groups:
//! - Configuration, connection, and discovery errors stop the run before any
//!   partition is scanned.
//! - Export errors belong to one partition and never reach sibling partitions.
//!
//! # Example
//!
//! ```rust,no_run
//! use setdump::error::{ConfigError, Result};
//!
//! fn check_concurrency(value: i64) -> Result<usize> {
//!     if value <= 0 {
//!         return Err(ConfigError::InvalidValue {
//!             field: "concurrency".to_string(),
//!             value: value.to_string(),
//!         }
//!         .into());
//!     }
//!     Ok(value as usize)
//! }
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    ConfigError, ConnectionError, DiscoveryError, ExportError, ExporterError, Result,
};
