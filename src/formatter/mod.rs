//! Output formatting
//!
//! - [`PlainTextConverter`] renders bin values into CSV fields
//! - [`SummaryFormatter`] renders the end-of-run table

mod converter;
mod summary;

pub use converter::{PlainTextConverter, ValueConverter};
pub use summary::{SummaryFormatter, TableStyle};
