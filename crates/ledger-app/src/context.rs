// Per-run context: which day is being processed and where its files live.
//
// Layout under the data root:
//
//   draft_kings_data/<dd_mm_YYYY>/<dd_mm_YYYY>_contests.csv
//                                 <dd_mm_YYYY>_tournaments.csv
//                                 <dd_mm_YYYY>_no_results.json
//                                 salaries/
//                                 results/
//                                 tournaments_details/<id>_players.csv
//   datasets/tournaments.csv
//   datasets/results/<id>.csv
//   datasets/most_picked/<id>.csv
//   datasets/players.csv

use std::path::{Path, PathBuf};

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};

use crate::config::{Config, ConfigError};

/// Format of the per-day folder names.
pub const DAY_LABEL_FORMAT: &str = "%d_%m_%Y";

#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub root: PathBuf,
    pub inbox: PathBuf,
    pub today: NaiveDate,
    pub scraped_at: NaiveDateTime,
}

impl RunContext {
    pub fn new(root: impl Into<PathBuf>, inbox: impl Into<PathBuf>, scraped_at: NaiveDateTime) -> Self {
        Self {
            root: root.into(),
            inbox: inbox.into(),
            today: scraped_at.date(),
            scraped_at,
        }
    }

    /// Context for `day` (defaults to today), stamped with the current time.
    pub fn from_config(config: &Config, day: Option<NaiveDate>) -> Result<Self, ConfigError> {
        let now = Local::now().naive_local();
        let mut ctx = Self::new(config.root_dir()?, config.inbox_dir()?, now);
        if let Some(day) = day {
            ctx.today = day;
        }
        Ok(ctx)
    }

    pub fn yesterday(&self) -> NaiveDate {
        self.today - Duration::days(1)
    }

    // -- Day folders --

    pub fn day_dir(&self, day: NaiveDate) -> PathBuf {
        self.root.join("draft_kings_data").join(day_label(day))
    }

    pub fn contests_file(&self, day: NaiveDate) -> PathBuf {
        self.day_file(day, "contests.csv")
    }

    pub fn tournaments_file(&self, day: NaiveDate) -> PathBuf {
        self.day_file(day, "tournaments.csv")
    }

    pub fn no_results_file(&self, day: NaiveDate) -> PathBuf {
        self.day_file(day, "no_results.json")
    }

    pub fn salaries_dir(&self, day: NaiveDate) -> PathBuf {
        self.day_dir(day).join("salaries")
    }

    pub fn results_dir(&self, day: NaiveDate) -> PathBuf {
        self.day_dir(day).join("results")
    }

    pub fn details_dir(&self, day: NaiveDate) -> PathBuf {
        self.day_dir(day).join("tournaments_details")
    }

    pub fn entrants_file(&self, day: NaiveDate, contest_id: &str) -> PathBuf {
        self.details_dir(day).join(format!("{contest_id}_players.csv"))
    }

    fn day_file(&self, day: NaiveDate, suffix: &str) -> PathBuf {
        self.day_dir(day).join(format!("{}_{suffix}", day_label(day)))
    }

    // -- All-time datasets --

    pub fn datasets_dir(&self) -> PathBuf {
        self.root.join("datasets")
    }

    pub fn history_file(&self) -> PathBuf {
        self.datasets_dir().join("tournaments.csv")
    }

    pub fn processed_results_dir(&self) -> PathBuf {
        self.datasets_dir().join("results")
    }

    pub fn most_picked_dir(&self) -> PathBuf {
        self.datasets_dir().join("most_picked")
    }

    pub fn players_export_file(&self) -> PathBuf {
        self.datasets_dir().join("players.csv")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // -- Scraper dumps --

    pub fn inbox_day_dir(&self, day: NaiveDate) -> PathBuf {
        self.inbox.join(day_label(day))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn day_label(day: NaiveDate) -> String {
    day.format(DAY_LABEL_FORMAT).to_string()
}

pub fn parse_day_label(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(label, DAY_LABEL_FORMAT).ok()
}
