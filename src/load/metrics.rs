// src/load/metrics.rs
//
// The four concrete metric loaders: each wires the generation merge and
// the grand-total rule for its column layout. Cases and deaths are
// per-capita scaled; intensive-care occupancy and cumulative deceased
// counts stay raw.

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::load::table::{board_records, column_records, merge, scale_records, total_records, Aggregate};
use crate::parse::read_table;
use crate::series::{BoardSeries, CountSeries, Population};

/// National facility reported in the current-generation intensive-care
/// file. It folds into the aggregate but is not a health board.
pub const GOLDEN_JUBILEE: &str = "Golden Jubilee";

/// Single count column of the deceased files.
const DECEASED_HEADER: &str = "Deceased";

/// Confirmed cases: legacy generation with a trusted aggregate, current
/// generation reconciled, merged and per-capita scaled.
pub fn load_cases(legacy: &Path, current: &Path, pop: &Population) -> Result<BoardSeries<f64>> {
    info!("reading cases data");
    let legacy = read_table(legacy)?;
    let current = read_table(current)?;
    let merged = merge(
        board_records(&legacy, &pop.boards, Aggregate::Trusted),
        board_records(&current, &pop.boards, Aggregate::Reconciled { folded: &[] }),
    );
    Ok(scale_records(merged, &pop.scale))
}

/// Deaths: published in the legacy format only, aggregate trusted,
/// per-capita scaled.
pub fn load_deaths(legacy: &Path, pop: &Population) -> Result<BoardSeries<f64>> {
    info!("reading deaths data");
    let legacy = read_table(legacy)?;
    let records = board_records(&legacy, &pop.boards, Aggregate::Trusted);
    Ok(scale_records(records, &pop.scale))
}

/// Intensive-care occupancy per board: current generation only, raw
/// counts, Golden Jubilee folded into the aggregate.
pub fn load_icu_by_board(current: &Path, pop: &Population) -> Result<BoardSeries<i64>> {
    info!("reading intensive care data");
    let current = read_table(current)?;
    Ok(board_records(
        &current,
        &pop.boards,
        Aggregate::Reconciled { folded: &[GOLDEN_JUBILEE] },
    ))
}

/// Intensive-care occupancy nationwide: legacy trusted aggregate merged
/// with the reconciled current-generation sums, raw counts.
pub fn load_icu_total(legacy: &Path, current: &Path, pop: &Population) -> Result<CountSeries> {
    info!("reading intensive care totals");
    let legacy = read_table(legacy)?;
    let current = read_table(current)?;
    Ok(merge(
        total_records(&legacy, &pop.boards, Aggregate::Trusted),
        total_records(&current, &pop.boards, Aggregate::Reconciled { folded: &[GOLDEN_JUBILEE] }),
    ))
}

/// Cumulative deceased counts: single column, both generations, raw.
pub fn load_deceased(legacy: &Path, current: &Path) -> Result<CountSeries> {
    info!("reading deceased data");
    let legacy = read_table(legacy)?;
    let current = read_table(current)?;
    Ok(merge(
        column_records(&legacy, DECEASED_HEADER),
        column_records(&current, DECEASED_HEADER),
    ))
}
