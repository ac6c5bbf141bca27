// src/lib.rs
//
// Scottish COVID-19 surveillance data pipeline: fetch the upstream CSV
// exports, reconcile their two schema generations into one date-indexed
// series per metric, scale by health board population, and track whether
// the local cache is behind the upstream revision.

pub mod error;
pub mod fetch;
pub mod load;
pub mod parse;
pub mod series;
pub mod store;

pub use error::{Error, Result};
pub use fetch::{GithubUpstream, Upstream};
pub use store::Dataset;
