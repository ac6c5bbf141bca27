// src/fetch/mod.rs

use std::fs;
use std::path::Path;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;

/// Population file: board names and populations, aggregate row ignored.
pub const POPULATIONS_FILE: &str = "HB_Populations.csv";
/// Legacy-generation cases, per board plus a trusted aggregate column.
pub const LEGACY_CASES_FILE: &str = "regional_cases.csv";
/// Current-generation cases, per board, no aggregate column.
pub const CURRENT_CASES_FILE: &str = "hb_cases.csv";
/// Deaths, legacy format only.
pub const DEATHS_FILE: &str = "regional_deaths.csv";
/// Legacy intensive-care occupancy; only its aggregate column is consumed.
pub const LEGACY_ICU_FILE: &str = "scot_icu.csv";
/// Current intensive-care occupancy per board, Golden Jubilee included.
pub const CURRENT_ICU_FILE: &str = "hb_icu.csv";
/// Cumulative deceased counts, both generations, single column.
pub const LEGACY_DECEASED_FILE: &str = "scot_deceased.csv";
pub const CURRENT_DECEASED_FILE: &str = "daily_deceased.csv";

/// Every file a full refresh fetches.
pub const ALL_FILES: &[&str] = &[
    POPULATIONS_FILE,
    LEGACY_CASES_FILE,
    CURRENT_CASES_FILE,
    DEATHS_FILE,
    LEGACY_ICU_FILE,
    CURRENT_ICU_FILE,
    LEGACY_DECEASED_FILE,
    CURRENT_DECEASED_FILE,
];

const RAW_BASE: &str =
    "https://raw.githubusercontent.com/watty62/Scot_covid19/master/data/processed";
const COMMITS_URL: &str = "https://api.github.com/repos/watty62/Scot_covid19/commits/master";
const USER_AGENT: &str = concat!("scotscraper/", env!("CARGO_PKG_VERSION"));

/// The upstream the pipeline consumes: named-file retrieval and the
/// current revision token. A trait so tests can substitute an in-memory
/// source.
pub trait Upstream {
    /// Retrieve a named remote file into `dest`.
    fn fetch_file(&self, name: &str, dest: &Path) -> Result<()>;

    /// Identifier of the upstream dataset's current state.
    fn latest_revision(&self) -> Result<String>;
}

/// Production upstream: raw files out of the publisher's GitHub repo, with
/// the branch head commit SHA as the revision token.
pub struct GithubUpstream {
    client: Client,
    raw_base: String,
    commits_url: String,
}

#[derive(Deserialize)]
struct Commit {
    sha: String,
}

impl GithubUpstream {
    pub fn new() -> Result<Self> {
        Self::with_urls(RAW_BASE, COMMITS_URL)
    }

    /// Point at a different raw base / commits endpoint (mirrors).
    pub fn with_urls(raw_base: &str, commits_url: &str) -> Result<Self> {
        // GitHub's API rejects requests without a User-Agent.
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            raw_base: raw_base.trim_end_matches('/').to_string(),
            commits_url: commits_url.to_string(),
        })
    }
}

impl Upstream for GithubUpstream {
    fn fetch_file(&self, name: &str, dest: &Path) -> Result<()> {
        let url = format!("{}/{}", self.raw_base, name);
        debug!(%url, dest = %dest.display(), "downloading");
        let body = self.client.get(&url).send()?.error_for_status()?.bytes()?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, &body)?;
        Ok(())
    }

    fn latest_revision(&self) -> Result<String> {
        debug!(url = %self.commits_url, "checking upstream revision");
        let commit: Commit = self
            .client
            .get(&self.commits_url)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(commit.sha)
    }
}
