// src/store/mod.rs
//
// The `Dataset` owns everything the pipeline caches: one mutex-guarded
// slot per entity, populated lazily on first access and handed out as
// `Arc` clones. A refresh swaps the whole cache in one assignment, so a
// reader never observes a mix of pre- and post-refresh data.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fetch::{self, Upstream};
use crate::load::{
    load_cases, load_deaths, load_deceased, load_icu_by_board, load_icu_total, load_population,
};
use crate::series::{BoardSeries, CountSeries, Population, ScaleFactors};

/// Persisted revision token, inside the data directory.
const REVISION_FILE: &str = ".revision";

#[derive(Default)]
struct Cache {
    population: Option<Arc<Population>>,
    cases: Option<Arc<BoardSeries<f64>>>,
    deaths: Option<Arc<BoardSeries<f64>>>,
    icu_by_board: Option<Arc<BoardSeries<i64>>>,
    icu_total: Option<Arc<CountSeries>>,
    deceased: Option<Arc<CountSeries>>,
}

pub struct Dataset<U: Upstream> {
    data_dir: PathBuf,
    upstream: U,
    cache: Mutex<Cache>,
}

impl<U: Upstream> Dataset<U> {
    pub fn new(data_dir: impl Into<PathBuf>, upstream: U) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            upstream,
            cache: Mutex::new(Cache::default()),
        })
    }

    /// Sorted health board names, aggregate excluded.
    pub fn health_boards(&self) -> Result<Vec<String>> {
        let mut cache = self.cache.lock().unwrap();
        Ok(self.population(&mut cache)?.boards.clone())
    }

    /// Board → per-capita divisor, aggregate key included.
    pub fn scale_factors(&self) -> Result<ScaleFactors> {
        let mut cache = self.cache.lock().unwrap();
        Ok(self.population(&mut cache)?.scale.clone())
    }

    /// Confirmed cases per 100,000, both generations merged.
    pub fn cases(&self) -> Result<Arc<BoardSeries<f64>>> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(series) = &cache.cases {
            return Ok(series.clone());
        }
        let pop = self.population(&mut cache)?;
        let legacy = self.ensure_file(fetch::LEGACY_CASES_FILE)?;
        let current = self.ensure_file(fetch::CURRENT_CASES_FILE)?;
        let series = Arc::new(load_cases(&legacy, &current, &pop)?);
        log_coverage("cases", &series);
        cache.cases = Some(series.clone());
        Ok(series)
    }

    /// Deaths per 100,000, legacy generation only.
    pub fn deaths(&self) -> Result<Arc<BoardSeries<f64>>> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(series) = &cache.deaths {
            return Ok(series.clone());
        }
        let pop = self.population(&mut cache)?;
        let legacy = self.ensure_file(fetch::DEATHS_FILE)?;
        let series = Arc::new(load_deaths(&legacy, &pop)?);
        log_coverage("deaths", &series);
        cache.deaths = Some(series.clone());
        Ok(series)
    }

    /// Intensive-care occupancy per board, raw counts, current generation.
    pub fn intensive_care_by_board(&self) -> Result<Arc<BoardSeries<i64>>> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(series) = &cache.icu_by_board {
            return Ok(series.clone());
        }
        let pop = self.population(&mut cache)?;
        let current = self.ensure_file(fetch::CURRENT_ICU_FILE)?;
        let series = Arc::new(load_icu_by_board(&current, &pop)?);
        log_coverage("intensive care", &series);
        cache.icu_by_board = Some(series.clone());
        Ok(series)
    }

    /// Nationwide intensive-care occupancy, raw counts, both generations.
    pub fn intensive_care_total(&self) -> Result<Arc<CountSeries>> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(series) = &cache.icu_total {
            return Ok(series.clone());
        }
        let pop = self.population(&mut cache)?;
        let legacy = self.ensure_file(fetch::LEGACY_ICU_FILE)?;
        let current = self.ensure_file(fetch::CURRENT_ICU_FILE)?;
        let series = Arc::new(load_icu_total(&legacy, &current, &pop)?);
        log_coverage("intensive care totals", &series);
        cache.icu_total = Some(series.clone());
        Ok(series)
    }

    /// Cumulative deceased counts, both generations.
    pub fn deceased(&self) -> Result<Arc<CountSeries>> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(series) = &cache.deceased {
            return Ok(series.clone());
        }
        let legacy = self.ensure_file(fetch::LEGACY_DECEASED_FILE)?;
        let current = self.ensure_file(fetch::CURRENT_DECEASED_FILE)?;
        let series = Arc::new(load_deceased(&legacy, &current)?);
        log_coverage("deceased", &series);
        cache.deceased = Some(series.clone());
        Ok(series)
    }

    /// Whether the locally cached files are behind the upstream source.
    pub fn is_stale(&self) -> Result<bool> {
        info!("checking upstream for updated data");
        let remote = self.upstream.latest_revision()?;
        let local = self.local_revision()?;
        let stale = local.as_deref() != Some(remote.as_str());
        debug!(
            local = local.as_deref().unwrap_or("<none>"),
            remote = %remote,
            stale,
            "revision comparison"
        );
        Ok(stale)
    }

    /// Re-fetch files when forced or stale. A restricted `only` refresh
    /// leaves the persisted token alone; a full refresh advances it to the
    /// revision just fetched. Any fetch invalidates every cached entity.
    pub fn refresh(&self, force: bool, only: Option<&[&str]>) -> Result<()> {
        info!(forced = force, restricted = only.is_some(), "refreshing data");
        let remote = self.upstream.latest_revision()?;
        if !force && self.local_revision()?.as_deref() == Some(remote.as_str()) {
            debug!(revision = %remote, "local data already current");
            return Ok(());
        }

        let files = only.unwrap_or(fetch::ALL_FILES);
        for name in files {
            self.upstream.fetch_file(name, &self.data_dir.join(name))?;
        }
        if only.is_none() {
            fs::write(self.revision_path(), &remote)?;
        }

        *self.cache.lock().unwrap() = Cache::default();
        Ok(())
    }

    fn population(&self, cache: &mut Cache) -> Result<Arc<Population>> {
        if let Some(pop) = &cache.population {
            return Ok(pop.clone());
        }
        let path = self.ensure_file(fetch::POPULATIONS_FILE)?;
        let pop = Arc::new(load_population(&path)?);
        cache.population = Some(pop.clone());
        Ok(pop)
    }

    fn ensure_file(&self, name: &str) -> Result<PathBuf> {
        let path = self.data_dir.join(name);
        if !path.exists() {
            info!(file = name, "local copy absent, fetching");
            self.upstream.fetch_file(name, &path)?;
        }
        if !path.exists() {
            return Err(Error::MissingDataFile { path });
        }
        Ok(path)
    }

    fn revision_path(&self) -> PathBuf {
        self.data_dir.join(REVISION_FILE)
    }

    fn local_revision(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.revision_path()) {
            Ok(token) => {
                let token = token.trim().to_string();
                Ok((!token.is_empty()).then_some(token))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn log_coverage<V>(metric: &str, series: &BTreeMap<NaiveDate, V>) {
    if let (Some(first), Some(last)) = (series.keys().next(), series.keys().next_back()) {
        debug!(metric, %first, %last, "read series");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{
        ALL_FILES, CURRENT_CASES_FILE, CURRENT_DECEASED_FILE, CURRENT_ICU_FILE, DEATHS_FILE,
        LEGACY_CASES_FILE, LEGACY_DECEASED_FILE, LEGACY_ICU_FILE, POPULATIONS_FILE,
    };
    use crate::series::GRAND_TOTAL;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::path::Path;

    struct StubUpstream {
        files: Mutex<HashMap<&'static str, String>>,
        revision: Mutex<String>,
        fetch_log: Mutex<Vec<String>>,
    }

    impl StubUpstream {
        fn with_fixtures() -> Self {
            let mut files = HashMap::new();
            files.insert(
                POPULATIONS_FILE,
                "Name,Population\nA,200000\nB,100000\n".to_string(),
            );
            files.insert(
                LEGACY_CASES_FILE,
                "Date,A,B,Grand Total\n2020-02-28,2,1,3\n".to_string(),
            );
            files.insert(CURRENT_CASES_FILE, "Date,A,B\n2020-03-01,20,10\n".to_string());
            files.insert(
                DEATHS_FILE,
                "Date,A,B,Grand Total\n2020-03-05,4,1,5\n".to_string(),
            );
            files.insert(
                LEGACY_ICU_FILE,
                "Date,A,B,Grand Total\n2020-04-01,5,5,10\n".to_string(),
            );
            files.insert(
                CURRENT_ICU_FILE,
                "Date,A,B,Golden Jubilee\n2020-04-02,3,NA,2\n".to_string(),
            );
            files.insert(LEGACY_DECEASED_FILE, "Date,Deceased\n2020-03-10,1\n".to_string());
            files.insert(CURRENT_DECEASED_FILE, "Date,Deceased\n2020-03-11,4\n".to_string());
            Self {
                files: Mutex::new(files),
                revision: Mutex::new("abc123".to_string()),
                fetch_log: Mutex::new(Vec::new()),
            }
        }

        fn set_revision(&self, token: &str) {
            *self.revision.lock().unwrap() = token.to_string();
        }

        fn set_file(&self, name: &'static str, content: &str) {
            self.files.lock().unwrap().insert(name, content.to_string());
        }

        fn fetches(&self) -> Vec<String> {
            self.fetch_log.lock().unwrap().clone()
        }
    }

    impl Upstream for StubUpstream {
        fn fetch_file(&self, name: &str, dest: &Path) -> Result<()> {
            self.fetch_log.lock().unwrap().push(name.to_string());
            match self.files.lock().unwrap().get(name) {
                Some(content) => {
                    fs::write(dest, content)?;
                    Ok(())
                }
                None => Err(Error::MissingDataFile { path: dest.to_path_buf() }),
            }
        }

        fn latest_revision(&self) -> Result<String> {
            Ok(self.revision.lock().unwrap().clone())
        }
    }

    fn dataset() -> (tempfile::TempDir, Dataset<StubUpstream>) {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::new(dir.path().join("data"), StubUpstream::with_fixtures()).unwrap();
        (dir, dataset)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn boards_and_scale_factors_agree() {
        let (_dir, dataset) = dataset();
        let boards = dataset.health_boards().unwrap();
        assert_eq!(boards, vec!["A", "B"]);
        let scale = dataset.scale_factors().unwrap();
        let sum: f64 = boards.iter().map(|b| scale[b]).sum();
        assert!((scale[GRAND_TOTAL] - sum).abs() < 1e-9);
    }

    #[test]
    fn accessors_memoize_and_fetch_each_file_once() {
        let (_dir, dataset) = dataset();
        let first = dataset.cases().unwrap();
        let fetched_after_first = dataset.upstream.fetches().len();
        let second = dataset.cases().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(dataset.upstream.fetches().len(), fetched_after_first);

        let mut wanted = vec![POPULATIONS_FILE, LEGACY_CASES_FILE, CURRENT_CASES_FILE];
        wanted.sort_unstable();
        let mut got = dataset.upstream.fetches();
        got.sort_unstable();
        assert_eq!(got, wanted);
    }

    #[test]
    fn every_metric_loads() {
        let (_dir, dataset) = dataset();
        assert_eq!(dataset.cases().unwrap().len(), 2);
        let deaths = dataset.deaths().unwrap();
        assert_eq!(deaths[&date("2020-03-05")]["A"], Some(2.0));
        let icu = dataset.intensive_care_by_board().unwrap();
        assert_eq!(icu[&date("2020-04-02")][GRAND_TOTAL], Some(5));
        let icu_total = dataset.intensive_care_total().unwrap();
        assert_eq!(icu_total[&date("2020-04-01")], Some(10));
        assert_eq!(icu_total[&date("2020-04-02")], Some(5));
        let deceased = dataset.deceased().unwrap();
        assert_eq!(deceased[&date("2020-03-11")], Some(4));
    }

    #[test]
    fn staleness_follows_the_revision_token() {
        let (_dir, dataset) = dataset();
        // No local token recorded yet.
        assert!(dataset.is_stale().unwrap());

        dataset.refresh(false, None).unwrap();
        assert!(!dataset.is_stale().unwrap());

        dataset.upstream.set_revision("xyz999");
        assert!(dataset.is_stale().unwrap());

        dataset.refresh(false, None).unwrap();
        assert!(!dataset.is_stale().unwrap());
        let token = fs::read_to_string(dataset.revision_path()).unwrap();
        assert_eq!(token.trim(), "xyz999");
    }

    #[test]
    fn full_refresh_fetches_all_files() {
        let (_dir, dataset) = dataset();
        dataset.refresh(true, None).unwrap();
        assert_eq!(dataset.upstream.fetches().len(), ALL_FILES.len());
    }

    #[test]
    fn restricted_refresh_leaves_the_token_alone() {
        let (_dir, dataset) = dataset();
        dataset.refresh(false, None).unwrap();
        dataset.upstream.set_revision("xyz999");
        dataset
            .refresh(true, Some(&[POPULATIONS_FILE]))
            .unwrap();
        let token = fs::read_to_string(dataset.revision_path()).unwrap();
        assert_eq!(token.trim(), "abc123");
        assert!(dataset.is_stale().unwrap());
    }

    #[test]
    fn unforced_refresh_is_a_no_op_when_current() {
        let (_dir, dataset) = dataset();
        dataset.refresh(false, None).unwrap();
        let fetched = dataset.upstream.fetches().len();
        dataset.refresh(false, None).unwrap();
        assert_eq!(dataset.upstream.fetches().len(), fetched);
    }

    #[test]
    fn refresh_invalidates_every_cached_entity() {
        let (_dir, dataset) = dataset();
        let before = dataset.cases().unwrap();
        dataset.refresh(true, None).unwrap();
        let after = dataset.cases().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn failed_load_does_not_poison_the_cache() {
        let (_dir, dataset) = dataset();
        dataset
            .upstream
            .set_file(CURRENT_CASES_FILE, "Date,A,B\n2020-03-01,lots,10\n");
        assert!(matches!(
            dataset.cases().unwrap_err(),
            Error::MalformedRecord { .. }
        ));

        // Repair the already-downloaded local copy; the next call must
        // re-parse instead of serving a cached failure or partial series.
        fs::write(
            dataset.data_dir.join(CURRENT_CASES_FILE),
            "Date,A,B\n2020-03-01,20,10\n",
        )
        .unwrap();
        let cases = dataset.cases().unwrap();
        assert_eq!(cases[&date("2020-03-01")][GRAND_TOTAL], Some(10.0));
    }
}
