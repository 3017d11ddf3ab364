// File-backed datasets: the day's listing and snapshot tables, the all-time
// history table, and the write-once per-contest outputs.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use ledger_core::contest::{Contest, ContestId, ContestListing};
use ledger_core::entrant::EntrantRecord;
use ledger_core::merge::{fold_batches, merge};
use ledger_core::results::ContestResults;
use ledger_core::LedgerError;

use crate::context::{parse_day_label, RunContext};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> StoreError + '_ {
    move |source| StoreError::Csv {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> StoreError + '_ {
    move |source| StoreError::Json {
        path: path.display().to_string(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Which contest table a load or save targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKey {
    /// One day's snapshot (`<dd_mm_YYYY>_tournaments.csv`).
    Daily(NaiveDate),
    /// The all-time table (`datasets/tournaments.csv`).
    History,
}

/// Storage for contest tables.
pub trait Repository {
    /// Load a table. A missing table is `LedgerError::MissingSourceFile`.
    fn load(&self, key: DatasetKey) -> Result<Vec<Contest>, StoreError>;

    /// Replace a table with `contests`.
    fn save(&self, key: DatasetKey, contests: &[Contest]) -> Result<(), StoreError>;

    fn exists(&self, key: DatasetKey) -> bool;

    /// Days with a snapshot table, oldest first.
    fn daily_keys(&self) -> Result<Vec<NaiveDate>, StoreError>;

    fn load_or_empty(&self, key: DatasetKey) -> Result<Vec<Contest>, StoreError> {
        if self.exists(key) {
            self.load(key)
        } else {
            Ok(Vec::new())
        }
    }
}

/// Load `key`, merge `incoming` on top of it, save and return the result.
pub fn merge_into<R: Repository + ?Sized>(
    repo: &R,
    key: DatasetKey,
    incoming: Vec<Contest>,
) -> Result<Vec<Contest>, StoreError> {
    let existing = repo.load_or_empty(key)?;
    let merged = merge(existing, incoming);
    repo.save(key, &merged)?;
    Ok(merged)
}

/// Fold every daily snapshot, oldest day first, into the history table.
pub fn fold_history<R: Repository + ?Sized>(repo: &R) -> Result<Vec<Contest>, StoreError> {
    let base = repo.load_or_empty(DatasetKey::History)?;
    let days = repo.daily_keys()?;

    let mut batches = Vec::with_capacity(days.len());
    for day in &days {
        batches.push(repo.load(DatasetKey::Daily(*day))?);
    }

    let history = fold_batches(base, batches);
    repo.save(DatasetKey::History, &history)?;
    info!("history holds {} contests from {} days", history.len(), days.len());
    Ok(history)
}

// ---------------------------------------------------------------------------
// Reader-based loaders
// ---------------------------------------------------------------------------

/// Contest tables are rewritten after every load, so an unreadable row
/// fails the whole load instead of being dropped from the file.
fn contests_from_reader<R: Read>(rdr: R) -> Result<Vec<Contest>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    reader.deserialize::<Contest>().collect()
}

fn listings_from_reader<R: Read>(rdr: R) -> Result<Vec<ContestListing>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut listings = Vec::new();
    for result in reader.deserialize::<ContestListing>() {
        match result {
            Ok(listing) => listings.push(listing),
            Err(e) => warn!("skipping malformed listing row: {}", e),
        }
    }
    Ok(listings)
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// Dataset files under a [`RunContext`] root.
#[derive(Debug, Clone)]
pub struct FileStore {
    ctx: RunContext,
}

impl FileStore {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    fn path_for(&self, key: DatasetKey) -> PathBuf {
        match key {
            DatasetKey::Daily(day) => self.ctx.tournaments_file(day),
            DatasetKey::History => self.ctx.history_file(),
        }
    }

    // -- Listings --

    /// The day's lobby listing, empty when nothing was listed yet.
    pub fn load_listings(&self, day: NaiveDate) -> Result<Vec<ContestListing>, StoreError> {
        let path = self.ctx.contests_file(day);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).map_err(io_error(&path))?;
        listings_from_reader(file).map_err(csv_error(&path))
    }

    pub fn save_listings(&self, day: NaiveDate, listings: &[ContestListing]) -> Result<(), StoreError> {
        let path = self.ctx.contests_file(day);
        write_rows(&path, listings)
    }

    // -- No-results record --

    pub fn save_no_results(&self, day: NaiveDate, ids: &[ContestId]) -> Result<(), StoreError> {
        let path = self.ctx.no_results_file(day);
        let file = create_file(&path)?;
        serde_json::to_writer(file, ids).map_err(json_error(&path))?;
        debug!("recorded {} contests without results in {}", ids.len(), path.display());
        Ok(())
    }

    pub fn load_no_results(&self, day: NaiveDate) -> Result<Vec<ContestId>, StoreError> {
        let path = self.ctx.no_results_file(day);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).map_err(io_error(&path))?;
        serde_json::from_reader(file).map_err(json_error(&path))
    }

    // -- Results outputs (write-once) --

    /// Write `datasets/results/<id>.csv`. Returns false if it already exists.
    pub fn write_results(&self, results: &ContestResults) -> Result<bool, StoreError> {
        let path = self
            .ctx
            .processed_results_dir()
            .join(format!("{}.csv", results.contest_id));
        if path.exists() {
            debug!("results for {} already written", results.contest_id);
            return Ok(false);
        }
        let file = create_file(&path)?;
        results.write_results(file).map_err(csv_error(&path))?;
        Ok(true)
    }

    /// Write `datasets/most_picked/<id>.csv`. Returns false if it already exists.
    pub fn write_most_picked(&self, results: &ContestResults) -> Result<bool, StoreError> {
        let path = self
            .ctx
            .most_picked_dir()
            .join(format!("{}.csv", results.contest_id));
        if path.exists() {
            debug!("most-picked players for {} already written", results.contest_id);
            return Ok(false);
        }
        let file = create_file(&path)?;
        results.write_most_picked(file).map_err(csv_error(&path))?;
        Ok(true)
    }

    /// Results exports waiting in the day's `results/` folder, sorted by name.
    pub fn result_exports(&self, day: NaiveDate) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths: Vec<PathBuf> = list_dir(&self.ctx.results_dir(day))?
            .into_iter()
            .map(|name| self.ctx.results_dir(day).join(name))
            .collect();
        paths.sort();
        Ok(paths)
    }

    // -- Salaries folder --

    pub fn salary_files(&self, day: NaiveDate) -> Result<Vec<String>, StoreError> {
        let mut names = list_dir(&self.ctx.salaries_dir(day))?;
        names.sort();
        Ok(names)
    }

    pub fn remove_salary_file(&self, day: NaiveDate, name: &str) -> Result<(), StoreError> {
        let path = self.ctx.salaries_dir(day).join(name);
        std::fs::remove_file(&path).map_err(io_error(&path))?;
        info!("removed obsolete salary file {}", path.display());
        Ok(())
    }

    // -- Entrants --

    pub fn save_entrants(
        &self,
        day: NaiveDate,
        contest_id: &ContestId,
        entrants: &[EntrantRecord],
    ) -> Result<(), StoreError> {
        let path = self.ctx.entrants_file(day, contest_id.as_str());
        write_rows(&path, entrants)
    }
}

impl Repository for FileStore {
    fn load(&self, key: DatasetKey) -> Result<Vec<Contest>, StoreError> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LedgerError::MissingSourceFile { path }.into());
            }
            Err(e) => return Err(io_error(&path)(e)),
        };
        contests_from_reader(file).map_err(csv_error(&path))
    }

    fn save(&self, key: DatasetKey, contests: &[Contest]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        write_rows(&path, contests)?;
        debug!("saved {} contests to {}", contests.len(), path.display());
        Ok(())
    }

    fn exists(&self, key: DatasetKey) -> bool {
        self.path_for(key).is_file()
    }

    fn daily_keys(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let data_dir = self.ctx.root.join("draft_kings_data");
        let mut days: Vec<NaiveDate> = list_dir(&data_dir)?
            .iter()
            .filter_map(|name| parse_day_label(name))
            .filter(|day| self.exists(DatasetKey::Daily(*day)))
            .collect();
        days.sort();
        Ok(days)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn create_file(path: &Path) -> Result<File, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    File::create(path).map_err(io_error(path))
}

fn write_rows<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let file = create_file(path)?;
    let mut wtr = csv::Writer::from_writer(file);
    for row in rows {
        wtr.serialize(row).map_err(csv_error(path))?;
    }
    wtr.flush().map_err(io_error(path))?;
    Ok(())
}

/// File names in `dir`; a missing directory is empty.
fn list_dir(dir: &Path) -> Result<Vec<String>, StoreError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(dir)(e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(io_error(dir))?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}
