// src/load/table.rs
//
// Assembly of per-board records out of a parsed table, grand-total
// reconciliation, the generation merge, and the per-capita scaling pass.

use std::collections::BTreeMap;

use crate::parse::RawTable;
use crate::series::{BoardRecord, BoardSeries, CountSeries, ScaleFactors, GRAND_TOTAL};

/// Where a table's `Grand Total` comes from.
#[derive(Clone, Copy)]
pub enum Aggregate<'a> {
    /// The source carries the aggregate column; trust it verbatim (after
    /// sentinel normalization).
    Trusted,
    /// The source omits the column. Sum the per-board raw values, no-data
    /// contributing zero, plus any named facility columns that fold into
    /// the aggregate without being exposed as boards.
    Reconciled { folded: &'a [&'a str] },
}

fn row_aggregate(
    table: &RawTable,
    row: &crate::parse::RawRow,
    boards: &[String],
    aggregate: Aggregate,
) -> Option<i64> {
    match aggregate {
        Aggregate::Trusted => table.value(row, GRAND_TOTAL),
        Aggregate::Reconciled { folded } => {
            let boards_sum: i64 = boards
                .iter()
                .filter_map(|b| table.value(row, b))
                .sum();
            let folded_sum: i64 = folded.iter().filter_map(|f| table.value(row, f)).sum();
            // All-missing rows still reconcile to zero, not to no-data.
            Some(boards_sum + folded_sum)
        }
    }
}

/// Build the date-keyed records: every canonical board plus the aggregate
/// key in every record, `None` for boards this generation does not carry.
/// A date repeated within one file keeps the last row.
pub fn board_records(
    table: &RawTable,
    boards: &[String],
    aggregate: Aggregate,
) -> BoardSeries<i64> {
    let mut series = BoardSeries::new();
    for row in &table.rows {
        let mut record: BoardRecord<i64> = boards
            .iter()
            .map(|b| (b.clone(), table.value(row, b)))
            .collect();
        record.insert(GRAND_TOTAL.to_string(), row_aggregate(table, row, boards, aggregate));
        series.insert(row.date, record);
    }
    series
}

/// Date→aggregate-only view of a table, used for the simplified
/// intensive-care series.
pub fn total_records(table: &RawTable, boards: &[String], aggregate: Aggregate) -> CountSeries {
    table
        .rows
        .iter()
        .map(|row| (row.date, row_aggregate(table, row, boards, aggregate)))
        .collect()
}

/// Date→single-column view of a table (deceased counts).
pub fn column_records(table: &RawTable, column: &str) -> CountSeries {
    table
        .rows
        .iter()
        .map(|row| (row.date, table.value(row, column)))
        .collect()
}

/// Merge the two schema generations: current data is authoritative for
/// every date it covers, whole-record replacement; legacy survives only
/// for dates the current file does not reach.
pub fn merge<K: Ord, V>(legacy: BTreeMap<K, V>, current: BTreeMap<K, V>) -> BTreeMap<K, V> {
    let mut merged = legacy;
    merged.extend(current);
    merged
}

/// Per-capita scaling: divide every value, the aggregate included, by the
/// matching scale factor. Record keys always come from the canonical board
/// set, so every key has a factor.
pub fn scale_records(records: BoardSeries<i64>, scale: &ScaleFactors) -> BoardSeries<f64> {
    records
        .into_iter()
        .map(|(date, record)| {
            let scaled = record
                .into_iter()
                .map(|(board, value)| {
                    let factor = scale.get(&board).copied().unwrap_or(1.0);
                    (board, value.map(|v| v as f64 / factor))
                })
                .collect();
            (date, scaled)
        })
        .collect()
}
