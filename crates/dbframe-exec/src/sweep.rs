//! Eager cache population.
//!
//! Per table: `len`, `shape`. Per column: `count`, `na_count`, `min`, `max`,
//! `describe`; numeric columns add `sum`, `avg`, `median`; text and integer
//! columns add `mode`, `unique`, `value_counts` when the table is smaller than
//! `sweep_row_limit`. Every call goes through the normal admission path, so a
//! second sweep only produces hits.

use serde::Serialize;

use dbframe_core::schema::ValueKind;
use dbframe_core::Result;

use crate::column::Column;
use crate::database::Database;
use crate::metrics::emit_span;

/// Outcome of one sweep. Counts are cache admissions/rejections observed
/// while it ran, nested calls included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub operations: u64,
    pub admitted: u64,
    pub rejected: u64,
    /// Operations left out by the row limit.
    pub skipped: u64,
}

pub(crate) fn populate(db: &Database) -> Result<SweepReport> {
    let before = db.cache().stats();
    let limit = db.config().sweep_row_limit;
    let mut report = SweepReport::default();

    for table in db.tables()? {
        let len = table.len()?;
        table.shape()?;
        report.operations += 2;

        let small = u64::try_from(len).map_or(false, |n| n < limit);
        for column in table.columns() {
            report.operations += sweep_column(&column, small, &mut report.skipped)?;
        }
    }

    let after = db.cache().stats();
    report.admitted = after.admitted - before.admitted;
    report.rejected = (after.rejected_item + after.rejected_budget)
        - (before.rejected_item + before.rejected_budget);

    #[cfg(feature = "tracing")]
    tracing::info!(
        operations = report.operations,
        admitted = report.admitted,
        rejected = report.rejected,
        skipped = report.skipped,
        entries = db.cache().len(),
        bytes = db.cache().total_bytes(),
        "cache sweep finished"
    );
    emit_span(
        "sweep",
        &[
            ("operations", report.operations.to_string()),
            ("admitted", report.admitted.to_string()),
        ],
    );
    Ok(report)
}

fn sweep_column(column: &Column<'_>, small: bool, skipped: &mut u64) -> Result<u64> {
    let mut ran = 0;
    column.count()?;
    column.na_count()?;
    column.min()?;
    column.max()?;
    column.describe()?;
    ran += 5;

    if column.kind().is_numeric() {
        column.sum()?;
        column.avg()?;
        column.median()?;
        ran += 3;
    }

    if matches!(column.kind(), ValueKind::Text | ValueKind::Integer) {
        if small {
            column.mode()?;
            column.unique()?;
            column.value_counts()?;
            ran += 3;
        } else {
            *skipped += 3;
        }
    }
    Ok(ran)
}
