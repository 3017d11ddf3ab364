// Scraped input. The browser automation that drives the contest site runs
// outside this crate and drops its findings as JSON under the inbox:
//
//   <inbox>/<dd_mm_YYYY>/listing.json          array of lobby rows
//   <inbox>/<dd_mm_YYYY>/details/<id>.json     contest pop-up
//   <inbox>/<dd_mm_YYYY>/entrants/<id>.json    entrant cells (arrays of spans)

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tracing::debug;

use ledger_core::contest::{ContestId, RawContestDetail, RawListing};
use ledger_core::entrant::RawSpan;
use ledger_core::LedgerError;

use crate::context::day_label;
use crate::store::StoreError;

/// Source of raw scraped data for a day.
pub trait Scraper {
    /// Lobby rows. Missing input is `LedgerError::MissingSourceFile`.
    fn listings(&self, day: NaiveDate) -> Result<Vec<RawListing>, StoreError>;

    /// Contest pop-up, if it was captured.
    fn contest_detail(
        &self,
        day: NaiveDate,
        contest_id: &ContestId,
    ) -> Result<Option<RawContestDetail>, StoreError>;

    /// Entrant cells, if they were captured.
    fn entrants(
        &self,
        day: NaiveDate,
        contest_id: &ContestId,
    ) -> Result<Option<Vec<Vec<RawSpan>>>, StoreError>;
}

/// Reads scraper dumps from the inbox directory.
#[derive(Debug, Clone)]
pub struct DumpScraper {
    inbox: PathBuf,
}

impl DumpScraper {
    pub fn new(inbox: impl Into<PathBuf>) -> Self {
        Self {
            inbox: inbox.into(),
        }
    }

    fn day_dir(&self, day: NaiveDate) -> PathBuf {
        self.inbox.join(day_label(day))
    }
}

impl Scraper for DumpScraper {
    fn listings(&self, day: NaiveDate) -> Result<Vec<RawListing>, StoreError> {
        let path = self.day_dir(day).join("listing.json");
        read_json(&path)?.ok_or_else(|| LedgerError::MissingSourceFile { path }.into())
    }

    fn contest_detail(
        &self,
        day: NaiveDate,
        contest_id: &ContestId,
    ) -> Result<Option<RawContestDetail>, StoreError> {
        let path = self
            .day_dir(day)
            .join("details")
            .join(format!("{contest_id}.json"));
        read_json(&path)
    }

    fn entrants(
        &self,
        day: NaiveDate,
        contest_id: &ContestId,
    ) -> Result<Option<Vec<Vec<RawSpan>>>, StoreError> {
        let path = self
            .day_dir(day)
            .join("entrants")
            .join(format!("{contest_id}.json"));
        read_json(&path)
    }
}

/// Parse a JSON dump; `None` when the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no dump at {}", path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(StoreError::Io {
                path: path.display().to_string(),
                source: e,
            })
        }
    };
    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|e| StoreError::Json {
            path: path.display().to_string(),
            source: e,
        })
}
