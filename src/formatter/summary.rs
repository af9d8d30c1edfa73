//! Run summary rendering using tabled
//!
//! One row per exported set with its final state, row and column counts,
//! and either the output file or the failure cause. A short totals line
//! follows the table.

use tabled::{
    Table,
    builder::Builder,
    settings::{Alignment, Color, Modify, Style, object::Columns, object::Rows, width::Width},
};

use crate::export::ExportSummary;

/// Maximum width for the output/error column (characters)
const MAX_DETAIL_WIDTH: usize = 60;

const HEADERS: [&str; 6] = ["namespace", "set", "status", "records", "columns", "output"];

/// Available table styles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStyle {
    Modern,
    Ascii,
}

/// Renders an [`ExportSummary`] as a table
pub struct SummaryFormatter {
    style: TableStyle,
    use_colors: bool,
}

impl Default for SummaryFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryFormatter {
    pub fn new() -> Self {
        Self {
            style: TableStyle::Modern,
            use_colors: false,
        }
    }

    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Format the summary as a table followed by a totals line
    pub fn format(&self, summary: &ExportSummary) -> String {
        if summary.outcomes.is_empty() {
            return "(no sets exported)".to_string();
        }

        let mut builder = Builder::default();
        builder.push_record(HEADERS);

        for outcome in &summary.outcomes {
            let detail = match (&outcome.output, &outcome.error) {
                (_, Some(error)) => error.clone(),
                (Some(path), None) => path.display().to_string(),
                (None, None) => String::new(),
            };
            builder.push_record([
                outcome.partition.namespace.clone(),
                outcome.partition.set_name.clone(),
                outcome.state.as_str().to_string(),
                outcome.records.to_string(),
                outcome.columns.to_string(),
                detail,
            ]);
        }

        let mut table = builder.build();
        self.apply_style(&mut table);

        // Long paths and error messages wrap instead of stretching the table
        let last = HEADERS.len() - 1;
        table.with(Modify::new(Columns::new(last..=last)).with(Width::wrap(MAX_DETAIL_WIDTH)));
        table.with(Modify::new(Columns::new(3..=4)).with(Alignment::right()));

        if self.use_colors {
            table.modify(Rows::first(), Color::FG_CYAN | Color::BOLD);
        }

        format!("{}\n{}", table, self.totals(summary))
    }

    /// One-line totals
    fn totals(&self, summary: &ExportSummary) -> String {
        format!(
            "{} sets exported, {} failed, {} records in {}ms",
            summary.succeeded(),
            summary.failed(),
            summary.total_records(),
            summary.elapsed_ms
        )
    }

    fn apply_style(&self, table: &mut Table) {
        match self.style {
            TableStyle::Modern => table.with(Style::modern()),
            TableStyle::Ascii => table.with(Style::ascii()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{PartitionOutcome, WorkerState};
    use crate::store::PartitionId;
    use std::path::PathBuf;

    fn outcome(set: &str, state: WorkerState, records: u64) -> PartitionOutcome {
        let failed = state == WorkerState::Failed;
        PartitionOutcome {
            partition: PartitionId::new("test", set),
            state,
            records,
            columns: 2,
            limit_reached: false,
            output: (!failed).then(|| PathBuf::from(format!("/out/test.{set}.csv"))),
            file_size_bytes: 0,
            error: failed.then(|| "scan failed".to_string()),
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_empty_summary() {
        let formatter = SummaryFormatter::new();
        assert_eq!(formatter.format(&ExportSummary::default()), "(no sets exported)");
    }

    #[test]
    fn test_summary_rows() {
        let summary = ExportSummary {
            outcomes: vec![
                outcome("demo", WorkerState::Done, 12),
                outcome("users", WorkerState::Failed, 3),
            ],
            elapsed_ms: 40,
        };
        let text = SummaryFormatter::new()
            .with_style(TableStyle::Ascii)
            .format(&summary);

        assert!(text.contains("namespace"));
        assert!(text.contains("/out/test.demo.csv"));
        assert!(text.contains("scan failed"));
        assert!(text.contains("failed"));
        assert!(text.ends_with("1 sets exported, 1 failed, 15 records in 40ms"));
    }

    #[test]
    fn test_colored_header() {
        let summary = ExportSummary {
            outcomes: vec![outcome("demo", WorkerState::Done, 1)],
            elapsed_ms: 1,
        };
        let plain = SummaryFormatter::new().format(&summary);
        let colored = SummaryFormatter::new().with_colors(true).format(&summary);

        assert!(!plain.contains('\u{1b}'));
        assert!(colored.contains('\u{1b}'));
        assert!(colored.contains("namespace"));
    }
}
