// src/parse/mod.rs
//
// Cell parsing is two separate stages: first collapse the inconsistent
// "no data" vocabularies the two schema generations use into one internal
// representation, then parse the surviving string as the declared type.
// Both stages are pure and tested on their own.

use std::fs;
use std::io;
use std::path::Path;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{Error, Result};

/// Calendar-date format used by every generation of the exports.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Header of the date column in every date-indexed file.
pub const DATE_HEADER: &str = "Date";

/// No-data sentinels, case-sensitive, uniform across all loaders.
const SENTINELS: [&str; 3] = ["X", "*", "NA"];

/// Trim whitespace and strip one pair of outer quotes if present.
pub fn clean_cell(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Stage one: map a raw cell to `Some(value)` or `None` for the sentinel
/// vocabulary (`"X"`, `"*"`, `"NA"`, blank).
pub fn normalize_cell(raw: &str) -> Option<&str> {
    let value = clean_cell(raw);
    if value.is_empty() || SENTINELS.contains(&value) {
        None
    } else {
        Some(value)
    }
}

/// Stage two for count columns. A literal header string in a data position
/// is an artifact of concatenating a header-carrying legacy file and also
/// normalizes to no data; anything else non-numeric is malformed.
pub fn parse_count(raw: &str, header: &str, file: &str, line: usize) -> Result<Option<i64>> {
    match normalize_cell(raw) {
        None => Ok(None),
        Some(value) if value == header => Ok(None),
        Some(value) => value.parse::<i64>().map(Some).map_err(|_| Error::MalformedRecord {
            file: file.to_string(),
            line,
            detail: format!("expected a count in column '{header}', got '{value}'"),
        }),
    }
}

/// Split one CSV line on commas, honoring double-quoted fields.
pub fn split_line(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, b) in line.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => {
                fields.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(&line[start..]);
    fields
}

/// One parsed data row: a date plus one `Option<i64>` per header (the
/// date column's own slot stays `None`).
#[derive(Debug)]
pub struct RawRow {
    pub date: NaiveDate,
    pub cells: Vec<Option<i64>>,
}

/// A date-indexed count table with the sentinel vocabulary already
/// collapsed and every cell typed, but no scaling or board knowledge yet.
#[derive(Debug)]
pub struct RawTable {
    pub file: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    /// Index of a named column, if this generation of the file has it.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Value of a named column in a row; `None` when the column itself is
    /// absent from this generation's layout.
    pub fn value(&self, row: &RawRow, name: &str) -> Option<i64> {
        self.column(name).and_then(|i| row.cells.get(i).copied().flatten())
    }
}

/// Read a date-indexed count table. Rows whose date cell is blank, a
/// sentinel, or a repeated header are dropped (trailing blank rows and
/// concatenation artifacts); any other unparseable date is malformed.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

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

    let date_col = headers.iter().position(|h| h == DATE_HEADER).ok_or_else(|| {
        Error::MalformedRecord {
            file: file.clone(),
            line: 1,
            detail: format!("no '{DATE_HEADER}' column in header"),
        }
    })?;

    let mut rows = Vec::new();
    for (idx, raw_line) in lines {
        let line = idx + 1;
        if raw_line.trim().is_empty() {
            continue;
        }
        let fields = split_line(raw_line);

        let date = match fields.get(date_col).copied().and_then(normalize_cell) {
            None => continue,
            Some(value) if value == DATE_HEADER => continue,
            Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
                Error::MalformedRecord {
                    file: file.clone(),
                    line,
                    detail: format!("unparseable date '{value}'"),
                }
            })?,
        };

        let mut cells = Vec::with_capacity(headers.len());
        for (col, header) in headers.iter().enumerate() {
            if col == date_col {
                cells.push(None);
                continue;
            }
            let cell = fields.get(col).copied().unwrap_or("");
            cells.push(parse_count(cell, header, &file, line)?);
        }
        rows.push(RawRow { date, cells });
    }

    debug!(file = %file, rows = rows.len(), "read table");
    Ok(RawTable { file, headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_cell_trims_and_strips_quotes() {
        assert_eq!(clean_cell("  NHS Borders "), "NHS Borders");
        assert_eq!(clean_cell("\"Grand Total\""), "Grand Total");
        assert_eq!(clean_cell("\""), "\"");
    }

    #[test]
    fn sentinels_normalize_to_no_data() {
        for raw in ["X", "*", "NA", "", "   "] {
            assert_eq!(normalize_cell(raw), None, "raw {raw:?}");
        }
        assert_eq!(normalize_cell("x"), Some("x"));
        assert_eq!(normalize_cell("42"), Some("42"));
    }

    #[test]
    fn counts_parse_or_reject() {
        assert_eq!(parse_count("17", "NHS Fife", "f.csv", 3).unwrap(), Some(17));
        assert_eq!(parse_count("X", "NHS Fife", "f.csv", 3).unwrap(), None);
        // Header repeated in a data position is a concatenation artifact.
        assert_eq!(parse_count("NHS Fife", "NHS Fife", "f.csv", 3).unwrap(), None);
        let err = parse_count("lots", "NHS Fife", "f.csv", 3).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { line: 3, .. }));
    }

    #[test]
    fn split_line_honors_quotes() {
        assert_eq!(split_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_line("\"a,b\",c"), vec!["\"a,b\"", "c"]);
        assert_eq!(split_line(""), vec![""]);
    }

    fn write_table(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_rows_and_drops_dateless_ones() {
        let (_dir, path) = write_table(
            "Date,NHS Fife,Grand Total\n\
             2020-03-01,5,5\n\
             ,,\n\
             Date,NHS Fife,Grand Total\n\
             2020-03-02,X,7\n",
        );
        let table = read_table(&path).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.value(&table.rows[0], "NHS Fife"), Some(5));
        assert_eq!(table.value(&table.rows[1], "NHS Fife"), None);
        assert_eq!(table.value(&table.rows[1], "Grand Total"), Some(7));
        assert_eq!(table.value(&table.rows[0], "NHS Lothian"), None);
    }

    #[test]
    fn bad_date_is_malformed() {
        let (_dir, path) = write_table("Date,NHS Fife\n03/01/2020,5\n");
        assert!(matches!(
            read_table(&path).unwrap_err(),
            Error::MalformedRecord { line: 2, .. }
        ));
    }

    #[test]
    fn missing_file_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, Error::MissingDataFile { .. }));
    }
}
