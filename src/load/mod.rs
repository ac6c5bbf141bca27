// src/load/mod.rs

pub mod metrics;
pub mod population;
pub mod table;

pub use metrics::{load_cases, load_deaths, load_deceased, load_icu_by_board, load_icu_total};
pub use population::load_population;
