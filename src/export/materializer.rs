//! Turns scanned records into positional rows
//!
//! A row is aligned with the registry's column order at the moment it is
//! built. Bins first seen in this record are appended to the registry and
//! to the end of the row, so the row length always equals the registry
//! length after the call. Rows written before a later column was discovered
//! stay shorter than the final header; they are never padded.

use crate::store::{Key, Record, Value};

use super::schema::{PrefixColumns, SchemaRegistry};

/// One output line: `None` marks a column the record does not have.
pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, Copy)]
pub struct RowMaterializer {
    prefix: PrefixColumns,
}

impl RowMaterializer {
    pub fn new(prefix: PrefixColumns) -> Self {
        Self { prefix }
    }

    pub fn materialize(&self, key: &Key, record: &Record, registry: &mut SchemaRegistry) -> Row {
        registry.ensure_initialized(record.bin_names(), self.prefix);

        let mut row: Row = Vec::with_capacity(registry.len());
        if self.prefix.include_digest {
            row.push(Some(Value::Bytes(key.digest.clone())));
        }
        if self.prefix.record_metadata {
            row.push(Some(Value::Int(i64::from(record.generation))));
            row.push(Some(Value::Int(i64::from(record.expiration))));
        }

        for column in registry.data_columns() {
            row.push(record.get(column).cloned());
        }

        for (name, value) in &record.bins {
            if !registry.is_known(name) {
                registry.append_if_new(name);
                row.push(Some(value.clone()));
            }
        }

        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> Key {
        Key {
            namespace: "test".to_string(),
            set_name: "demo".to_string(),
            digest: vec![7; 20],
        }
    }

    fn record(bins: &[(&str, i64)]) -> Record {
        Record::new(
            bins.iter()
                .map(|(name, v)| (name.to_string(), Value::Int(*v)))
                .collect(),
            5,
            300,
        )
    }

    #[test]
    fn test_rows_track_registry_growth() {
        let materializer = RowMaterializer::new(PrefixColumns::default());
        let mut registry = SchemaRegistry::new();

        let first = materializer.materialize(&key(), &record(&[("b", 2), ("a", 1)]), &mut registry);
        assert_eq!(first, vec![Some(Value::Int(1)), Some(Value::Int(2))]);

        let second = materializer.materialize(&key(), &record(&[("a", 1), ("c", 3)]), &mut registry);
        assert_eq!(
            second,
            vec![Some(Value::Int(1)), None, Some(Value::Int(3))]
        );

        let third = materializer.materialize(&key(), &record(&[("a", 1)]), &mut registry);
        assert_eq!(third, vec![Some(Value::Int(1)), None, None]);

        assert_eq!(registry.snapshot(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_row_length_equals_registry_size() {
        let materializer = RowMaterializer::new(PrefixColumns::new(true, true));
        let mut registry = SchemaRegistry::new();
        let records = [
            record(&[("x", 1)]),
            record(&[("y", 2), ("z", 3)]),
            record(&[]),
            record(&[("x", 4), ("w", 5)]),
        ];

        for rec in &records {
            let row = materializer.materialize(&key(), rec, &mut registry);
            assert_eq!(row.len(), registry.len());
        }
    }

    #[test]
    fn test_prefix_values() {
        let materializer = RowMaterializer::new(PrefixColumns::new(true, true));
        let mut registry = SchemaRegistry::new();
        let row = materializer.materialize(&key(), &record(&[("a", 9)]), &mut registry);

        assert_eq!(row[0], Some(Value::Bytes(vec![7; 20])));
        assert_eq!(row[1], Some(Value::Int(5)));
        assert_eq!(row[2], Some(Value::Int(300)));
        assert_eq!(row[3], Some(Value::Int(9)));
        assert_eq!(
            registry.snapshot(),
            vec!["_digest", "_generation", "_expiry", "a"]
        );
    }
}
