//! Server-side filter expressions
//!
//! A small expression tree sent along with a scan. The store evaluates it
//! against each record's metadata before delivering the record, so the
//! exporter never re-filters rows itself.

use std::fmt;

/// Metadata a filter can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordMetrics {
    /// Last update time in nanoseconds since the Unix epoch.
    pub last_update_ns: i64,
    /// Size of the record on the storage device.
    pub device_size: i64,
    /// Size of the record in memory.
    pub memory_size: i64,
}

/// Leaf of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Int(i64),
    LastUpdate,
    DeviceSize,
    MemorySize,
}

impl Operand {
    fn resolve(&self, metrics: &RecordMetrics) -> i64 {
        match self {
            Operand::Int(n) => *n,
            Operand::LastUpdate => metrics.last_update_ns,
            Operand::DeviceSize => metrics.device_size,
            Operand::MemorySize => metrics.memory_size,
        }
    }
}

/// Boolean filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpression {
    /// `left <= right`
    LessEq(Operand, Operand),
    /// All sub-expressions hold. An empty `And` is true.
    And(Vec<FilterExpression>),
}

impl FilterExpression {
    pub fn le(left: Operand, right: Operand) -> Self {
        FilterExpression::LessEq(left, right)
    }

    pub fn evaluate(&self, metrics: &RecordMetrics) -> bool {
        match self {
            FilterExpression::LessEq(left, right) => {
                left.resolve(metrics) <= right.resolve(metrics)
            }
            FilterExpression::And(parts) => parts.iter().all(|p| p.evaluate(metrics)),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(n) => write!(f, "{n}"),
            Operand::LastUpdate => write!(f, "last_update"),
            Operand::DeviceSize => write!(f, "device_size"),
            Operand::MemorySize => write!(f, "memory_size"),
        }
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpression::LessEq(left, right) => write!(f, "{left} <= {right}"),
            FilterExpression::And(parts) => {
                let rendered: Vec<String> = parts.iter().map(|p| format!("({p})")).collect();
                write!(f, "{}", rendered.join(" and "))
            }
        }
    }
}
