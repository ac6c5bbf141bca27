// src/load/population.rs
//
// The canonical board list and the scale factors both come from the
// population file, exactly once. Metric files never contribute board
// names: their column sets are inconsistent across schema generations.

use std::fs;
use std::io;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::parse::{clean_cell, normalize_cell, split_line};
use crate::series::{Population, ScaleFactors, GRAND_TOTAL, NUMBERS_PER};

const NAME_HEADER: &str = "Name";
const POPULATION_HEADER: &str = "Population";

/// Parse the population file into the sorted board list and the scale
/// factors. The aggregate factor is a running sum of per-board factors;
/// a literal `Grand Total` row is skipped rather than trusted.
pub fn load_population(path: &Path) -> Result<Population> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!(file = %file, "reading health board data");

    let text = fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::MissingDataFile { path: path.to_path_buf() }
        } else {
            Error::Io(e)
        }
    })?;

    let mut lines = text.lines().enumerate();
    let headers: Vec<String> = match lines.find(|(_, l)| !l.trim().is_empty()) {
        Some((_, header_line)) => split_line(header_line)
            .into_iter()
            .map(|h| clean_cell(h).to_string())
            .collect(),
        None => {
            return Err(Error::MalformedRecord {
                file,
                line: 0,
                detail: "file has no header row".to_string(),
            })
        }
    };
    let name_col = column(&headers, NAME_HEADER, &file)?;
    let pop_col = column(&headers, POPULATION_HEADER, &file)?;

    let mut boards: Vec<String> = Vec::new();
    let mut scale = ScaleFactors::new();
    let mut aggregate = 0.0;

    for (idx, raw_line) in lines {
        let line = idx + 1;
        if raw_line.trim().is_empty() {
            continue;
        }
        let fields = split_line(raw_line);

        let name = match fields.get(name_col).copied().and_then(normalize_cell) {
            None => continue,
            // Aggregate rows and repeated headers carry no board of their own.
            Some(n) if n == GRAND_TOTAL || n == NAME_HEADER => continue,
            Some(n) => n.to_string(),
        };
        if scale.contains_key(&name) {
            continue; // first row for a board wins
        }

        let population = fields
            .get(pop_col)
            .copied()
            .and_then(normalize_cell)
            .ok_or_else(|| Error::MalformedRecord {
                file: file.clone(),
                line,
                detail: format!("board '{name}' has no population"),
            })?
            .parse::<f64>()
            .map_err(|_| Error::MalformedRecord {
                file: file.clone(),
                line,
                detail: format!("non-numeric population for board '{name}'"),
            })?;

        let factor = population / NUMBERS_PER;
        aggregate += factor;
        scale.insert(name.clone(), factor);
        boards.push(name);
    }

    scale.insert(GRAND_TOTAL.to_string(), aggregate);
    boards.sort();
    info!(boards = boards.len(), "read health boards");
    Ok(Population { boards, scale })
}

fn column(headers: &[String], name: &str, file: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| Error::MalformedRecord {
            file: file.to_string(),
            line: 1,
            detail: format!("no '{name}' column in header"),
        })
}
