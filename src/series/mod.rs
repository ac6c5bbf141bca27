// src/series/mod.rs
//
// Data model for the normalized dataset. BTreeMaps keep both the dates
// and the board keys in sorted order, which is what callers iterate over.

use std::collections::BTreeMap;

use chrono::NaiveDate;

/// Key of the synthetic whole-of-Scotland aggregate, alongside the real
/// health boards in every record.
pub const GRAND_TOTAL: &str = "Grand Total";

/// Per-capita normalization base: scaled figures are per 100,000 people.
pub const NUMBERS_PER: f64 = 100_000.0;

/// Board (or aggregate) name → positive divisor, population / NUMBERS_PER.
pub type ScaleFactors = BTreeMap<String, f64>;

/// One date's worth of data: every canonical board plus the aggregate key,
/// `None` meaning "no data" (distinct from zero).
pub type BoardRecord<T> = BTreeMap<String, Option<T>>;

/// Date-ordered series of per-board records. `T = f64` for per-capita
/// scaled metrics, `T = i64` for raw counts.
pub type BoardSeries<T> = BTreeMap<NaiveDate, BoardRecord<T>>;

/// Date-ordered series with no per-board breakdown (deceased totals,
/// simplified intensive-care occupancy).
pub type CountSeries = BTreeMap<NaiveDate, Option<i64>>;

/// Canonical board list plus scale factors, both derived from the
/// population file exactly once per process.
#[derive(Debug, Clone)]
pub struct Population {
    /// Sorted health board names, aggregate excluded.
    pub boards: Vec<String>,
    /// Scale factors for every board plus the aggregate key.
    pub scale: ScaleFactors,
}
