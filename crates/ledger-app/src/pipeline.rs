// Batch driver: one step per stage of a day's run.
//
// Each step reads what the previous steps left on disk, so they can be run
// separately from the command line or chained by `daily`. Per-contest and
// per-row failures are logged and skipped; only storage failures abort.

use std::collections::HashSet;
use std::fs::File;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use ledger_core::contest::{new_listings, Contest, ContestId};
use ledger_core::entrant::entrants_from_cells;
use ledger_core::merge::merge;
use ledger_core::results::{classify_export, ExportKind, ResultRecordBuilder};
use ledger_core::salary::{assign_salary_ids, plan_salary_files, SalaryGroups, SalaryPlan};

use crate::db::{Database, ImportSummary};
use crate::scraper::Scraper;
use crate::store::{fold_history, DatasetKey, FileStore, Repository};

/// Outcome of [`Pipeline::refresh_contests`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContestRefresh {
    /// Contests with a parsed detail pop-up.
    pub detailed: usize,
    /// Contests kept as listing-only rows.
    pub listed_only: usize,
    /// Contests whose detail dump could not be read or did not parse.
    pub skipped: usize,
    /// Contests left without a salary id.
    pub unresolved: usize,
}

/// Outcome of [`Pipeline::process_results`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsRun {
    pub results_written: usize,
    pub most_picked_written: usize,
    pub skipped_files: usize,
    pub no_results: Vec<ContestId>,
}

pub struct Pipeline<S: Scraper> {
    store: FileStore,
    scraper: S,
    db: Database,
    builder: ResultRecordBuilder,
}

impl<S: Scraper> Pipeline<S> {
    pub fn new(store: FileStore, scraper: S, db: Database, builder: ResultRecordBuilder) -> Self {
        Self {
            store,
            scraper,
            db,
            builder,
        }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    // ------------------------------------------------------------------
    // Contests
    // ------------------------------------------------------------------

    /// Add newly scraped lobby rows to the day's listing. Returns the number
    /// of contests that were not listed before.
    pub fn refresh_listings(&self, day: NaiveDate) -> Result<usize> {
        let mut known = self.store.load_listings(day)?;
        let raw = self
            .scraper
            .listings(day)
            .context("failed to read lobby listing")?;

        let fresh = new_listings(&known, &raw);
        let added = fresh.len();
        known.extend(fresh);
        self.store.save_listings(day, &known)?;

        info!("{added} new contests listed ({} total)", known.len());
        Ok(added)
    }

    /// Build contest rows for every listed contest, merge them into the
    /// day's snapshot and assign salary ids.
    pub fn refresh_contests(&self, day: NaiveDate) -> Result<ContestRefresh> {
        let listings = self.store.load_listings(day)?;
        let existing = self.store.load_or_empty(DatasetKey::Daily(day))?;
        let known: HashSet<&ContestId> = existing.iter().map(|c| &c.contest_id).collect();
        let scraped_at = self.store.context().scraped_at;

        let mut summary = ContestRefresh::default();
        let mut incoming = Vec::new();
        for listing in &listings {
            let detail = match self.scraper.contest_detail(day, &listing.contest_id) {
                Ok(detail) => detail,
                Err(e) => {
                    warn!("skipping contest {}: {e}", listing.contest_id);
                    summary.skipped += 1;
                    continue;
                }
            };
            match detail {
                Some(raw) => match Contest::from_detail(listing, &raw, scraped_at) {
                    Ok(contest) => {
                        incoming.push(contest);
                        summary.detailed += 1;
                    }
                    Err(e) => {
                        warn!("skipping contest {}: {e}", listing.contest_id);
                        summary.skipped += 1;
                    }
                },
                None if !known.contains(&listing.contest_id) => {
                    incoming.push(Contest::from_listing(listing, scraped_at));
                    summary.listed_only += 1;
                }
                None => {}
            }
        }

        let mut contests = merge(existing, incoming);
        summary.unresolved = self.resolve_salaries(&mut contests);
        self.store.save(DatasetKey::Daily(day), &contests)?;

        info!(
            "day snapshot has {} contests: {} detailed, {} listing-only, {} skipped",
            contests.len(),
            summary.detailed,
            summary.listed_only,
            summary.skipped
        );
        Ok(summary)
    }

    /// Re-run salary id assignment on the day's snapshot.
    pub fn assign_salaries(&self, day: NaiveDate) -> Result<Vec<Contest>> {
        let mut contests = self
            .store
            .load(DatasetKey::Daily(day))
            .context("failed to load the day's contests")?;
        self.resolve_salaries(&mut contests);
        self.store.save(DatasetKey::Daily(day), &contests)?;
        Ok(contests)
    }

    fn resolve_salaries(&self, contests: &mut [Contest]) -> usize {
        let unresolved = assign_salary_ids(contests);
        for e in &unresolved {
            warn!("{e}");
        }
        unresolved.len()
    }

    /// Compare the day's salary groups with the salaries folder. Obsolete
    /// pricing sheets are deleted once every group is accounted for.
    pub fn plan_salaries(&self, day: NaiveDate) -> Result<SalaryPlan> {
        let contests = self
            .store
            .load(DatasetKey::Daily(day))
            .context("failed to load the day's contests")?;
        let needed = SalaryGroups::from_contests(&contests).salary_ids();
        let files = self.store.salary_files(day)?;
        let plan = plan_salary_files(&needed, &files);

        if plan.is_complete() {
            for name in &plan.obsolete {
                self.store.remove_salary_file(day, name)?;
            }
            info!("all {} salary groups accounted for", needed.len());
        } else {
            let pending: Vec<&str> = plan.pending.iter().map(|id| id.as_str()).collect();
            error!(
                "{} of {} salary groups have no pricing sheet: {}",
                pending.len(),
                needed.len(),
                pending.join(", ")
            );
        }
        Ok(plan)
    }

    // ------------------------------------------------------------------
    // History and SQLite
    // ------------------------------------------------------------------

    /// Fold every day's snapshot into the all-time table.
    pub fn update_history(&self) -> Result<Vec<Contest>> {
        fold_history(&self.store).context("failed to update contest history")
    }

    /// Import the day's snapshot into SQLite.
    pub fn persist_contests(&self, day: NaiveDate) -> Result<ImportSummary> {
        let contests = self
            .store
            .load(DatasetKey::Daily(day))
            .context("failed to load the day's contests")?;
        let summary = self.db.import_contests(&contests)?;
        info!(
            "stored {} contests and {} new payouts ({} skipped)",
            summary.contests, summary.payouts, summary.skipped
        );
        Ok(summary)
    }

    /// Save entrant badges of every listed contest and record the players.
    /// Returns the number of entrants recorded.
    pub fn record_entrants(&self, day: NaiveDate) -> Result<usize> {
        let listings = self.store.load_listings(day)?;
        let mut recorded = 0;
        for listing in &listings {
            let cells = match self.scraper.entrants(day, &listing.contest_id) {
                Ok(Some(cells)) => cells,
                Ok(None) => continue,
                Err(e) => {
                    warn!("skipping entrants of contest {}: {e}", listing.contest_id);
                    continue;
                }
            };
            let entrants = entrants_from_cells(&cells);
            self.store.save_entrants(day, &listing.contest_id, &entrants)?;
            self.db.upsert_entrants(&entrants)?;
            info!("saved {} entrants for contest {}", entrants.len(), listing.contest_id);
            recorded += entrants.len();
        }
        Ok(recorded)
    }

    /// Write `datasets/players.csv` from SQLite.
    pub fn export_players(&self) -> Result<usize> {
        let path = self.store.context().players_export_file();
        let count = self.db.export_players_csv(&path)?;
        info!("exported {count} players to {}", path.display());
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------

    /// Clean every results export of `day` into the all-time results and
    /// most-picked tables, and record which of the day's contests have no
    /// standings.
    pub fn process_results(&self, day: NaiveDate) -> Result<ResultsRun> {
        let mut run = ResultsRun::default();
        let mut with_standings: HashSet<ContestId> = HashSet::new();

        for path in self.store.result_exports(day)? {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((contest_id, kind)) = classify_export(file_name) else {
                warn!("not a results export: {}", path.display());
                run.skipped_files += 1;
                continue;
            };

            let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
            let results = match self.builder.build_from_reader(&contest_id, file) {
                Ok(results) => results,
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    run.skipped_files += 1;
                    continue;
                }
            };

            if kind == ExportKind::Standings {
                if results.entries.is_empty() {
                    warn!("no standings rows in {}", path.display());
                    continue;
                }
                with_standings.insert(contest_id.clone());
                if self.store.write_results(&results)? {
                    run.results_written += 1;
                }
            }
            if !results.most_picked.is_empty() && self.store.write_most_picked(&results)? {
                run.most_picked_written += 1;
            }
        }

        if self.store.exists(DatasetKey::Daily(day)) {
            let contests = self.store.load(DatasetKey::Daily(day))?;
            run.no_results = contests
                .iter()
                .map(|c| c.contest_id.clone())
                .filter(|id| !with_standings.contains(id))
                .collect();
            self.store.save_no_results(day, &run.no_results)?;
        }

        info!(
            "results: {} written, {} most-picked, {} skipped files, {} contests without results",
            run.results_written,
            run.most_picked_written,
            run.skipped_files,
            run.no_results.len()
        );
        Ok(run)
    }

    // ------------------------------------------------------------------
    // Full run
    // ------------------------------------------------------------------

    /// The whole day: listing, contests, salaries, entrants, history,
    /// SQLite, then the previous day's results.
    pub fn daily(&self) -> Result<()> {
        let ctx = self.store.context();
        let today = ctx.today;

        self.refresh_listings(today)?;
        self.refresh_contests(today)?;
        self.plan_salaries(today)?;
        self.record_entrants(today)?;
        self.update_history()?;
        self.persist_contests(today)?;
        self.process_results(ctx.yesterday())?;
        Ok(())
    }
}
