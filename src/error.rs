use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the data pipeline. Staleness is never an error;
/// it is a boolean signal from `Dataset::is_stale`.
#[derive(Debug, Error)]
pub enum Error {
    /// A required local file is absent and the upstream collaborator did
    /// not (or could not) supply it.
    #[error("required data file {} is missing", path.display())]
    MissingDataFile { path: PathBuf },

    /// An unparseable date or a non-numeric value in a numeric position,
    /// outside the recognized no-data sentinels. Aborts the load of that
    /// metric; nothing partial is cached.
    #[error("{file}:{line}: {detail}")]
    MalformedRecord {
        file: String,
        line: usize,
        detail: String,
    },

    #[error("upstream request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
