//! Per-set column registry
//!
//! Tracks the ordered list of output columns discovered while a set streams
//! in. Layout once initialized:
//!
//! ```text
//! [_digest] [_generation _expiry] <first record's bins, sorted> <later bins, first-seen order>
//! ```
//!
//! Positions are append-only: a column never moves once placed, and the set
//! of names only grows. A registry belongs to exactly one worker, so plain
//! `&mut self` access is all the exclusion it needs.

use std::collections::HashMap;

/// Column holding the base64 record digest.
pub const DIGEST_COLUMN: &str = "_digest";
/// Column holding the record generation.
pub const GENERATION_COLUMN: &str = "_generation";
/// Column holding the record expiration.
pub const EXPIRY_COLUMN: &str = "_expiry";

/// Which reserved prefix columns a registry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrefixColumns {
    pub include_digest: bool,
    pub record_metadata: bool,
}

impl PrefixColumns {
    pub fn new(include_digest: bool, record_metadata: bool) -> Self {
        Self {
            include_digest,
            record_metadata,
        }
    }

    /// Reserved column names, in their fixed order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(3);
        if self.include_digest {
            names.push(DIGEST_COLUMN);
        }
        if self.record_metadata {
            names.push(GENERATION_COLUMN);
            names.push(EXPIRY_COLUMN);
        }
        names
    }

    pub fn len(&self) -> usize {
        usize::from(self.include_digest) + if self.record_metadata { 2 } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
    prefix_len: usize,
    initialized: bool,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(1) membership test.
    pub fn is_known(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Lay out the prefix columns and the first record's bins.
    ///
    /// The bins are sorted lexicographically. Calling this again is a no-op.
    pub fn ensure_initialized<'a, I>(&mut self, first_record_fields: I, prefix: PrefixColumns)
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.initialized {
            return;
        }
        self.initialized = true;

        for name in prefix.names() {
            self.push(name);
        }
        self.prefix_len = self.columns.len();

        let mut fields: Vec<&str> = first_record_fields.into_iter().collect();
        fields.sort_unstable();
        for name in fields {
            self.append_if_new(name);
        }
    }

    /// Position of `name`, appending it at the end if unseen.
    pub fn append_if_new(&mut self, name: &str) -> usize {
        match self.positions.get(name) {
            Some(&position) => position,
            None => self.push(name),
        }
    }

    fn push(&mut self, name: &str) -> usize {
        let position = self.columns.len();
        self.columns.push(name.to_string());
        self.positions.insert(name.to_string(), position);
        position
    }

    /// Number of reserved prefix columns.
    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Bin columns, i.e. everything after the reserved prefix.
    pub fn data_columns(&self) -> &[String] {
        &self.columns[self.prefix_len..]
    }

    /// Current column order, for the header line.
    pub fn snapshot(&self) -> Vec<String> {
        self.columns.clone()
    }
}
