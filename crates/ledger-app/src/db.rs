// SQLite sink for contests, payouts and entrants.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use ledger_core::columns::format_datetime;
use ledger_core::contest::{Contest, ContestId};
use ledger_core::entrant::EntrantRecord;
use ledger_core::payout::{expand_payouts, PayoutRecord, PayoutValue};

/// Counts from one [`Database::import_contests`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub contests: usize,
    pub payouts: usize,
    pub skipped: usize,
}

/// SQLite-backed persistence for the contest history.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tournaments (
                contest_id      TEXT PRIMARY KEY,
                tournament_date TEXT,
                name            TEXT NOT NULL,
                style           TEXT NOT NULL,
                buy_in          REAL,
                entrants        INTEGER,
                max_entrants    INTEGER,
                total_prize     REAL,
                crowns          REAL,
                my_entries      INTEGER,
                multi_entry     INTEGER,
                scraped_date    TEXT NOT NULL,
                summary         TEXT NOT NULL DEFAULT '',
                payouts         TEXT NOT NULL DEFAULT '{}',
                salary_id       TEXT
            );

            CREATE TABLE IF NOT EXISTS payouts (
                contest_id TEXT NOT NULL,
                ranking    INTEGER NOT NULL,
                payout,
                PRIMARY KEY (contest_id, ranking)
            );

            CREATE TABLE IF NOT EXISTS players (
                nickname   TEXT PRIMARY KEY,
                experience INTEGER NOT NULL DEFAULT 0
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Contests
    // ------------------------------------------------------------------

    /// Insert a contest row, replacing any previous row with the same id.
    pub fn upsert_contest(&self, contest: &Contest) -> Result<()> {
        let conn = self.conn();
        upsert_contest_with(&conn, contest)
    }

    /// Insert payout records. Ranks already stored for a contest are left
    /// untouched. Returns the number of rows actually inserted.
    pub fn insert_payouts(&self, records: &[PayoutRecord]) -> Result<usize> {
        let conn = self.conn();
        let mut inserted = 0;
        for record in records {
            inserted += insert_payout_with(&conn, record)?;
        }
        Ok(inserted)
    }

    /// Import a batch of contests and their expanded payouts in a single
    /// transaction. A contest whose payout table does not expand is logged
    /// and skipped as a whole.
    pub fn import_contests(&self, contests: &[Contest]) -> Result<ImportSummary> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;
        let mut summary = ImportSummary::default();

        for contest in contests {
            let records = match expand_payouts(&contest.contest_id, &contest.payouts) {
                Ok(records) => records,
                Err(e) => {
                    warn!("skipping contest {}: {e}", contest.contest_id);
                    summary.skipped += 1;
                    continue;
                }
            };

            upsert_contest_with(&tx, contest)?;
            for record in &records {
                summary.payouts += insert_payout_with(&tx, record)?;
            }
            summary.contests += 1;
        }

        tx.commit().context("failed to commit contest import")?;
        debug!(
            "imported {} contests, {} payouts, skipped {}",
            summary.contests, summary.payouts, summary.skipped
        );
        Ok(summary)
    }

    pub fn contest_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tournaments", [], |row| row.get(0))
            .context("failed to count tournaments")?;
        Ok(count as usize)
    }

    /// Stored tournament name and salary id of a contest.
    pub fn load_contest_summary(&self, contest_id: &ContestId) -> Result<Option<(String, Option<String>)>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT name, salary_id FROM tournaments WHERE contest_id = ?1",
            params![contest_id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .context("failed to load tournament")
    }

    /// Payout records of a contest ordered by rank.
    pub fn load_payouts(&self, contest_id: &ContestId) -> Result<Vec<PayoutRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT ranking, payout FROM payouts WHERE contest_id = ?1 ORDER BY ranking")
            .context("failed to prepare load_payouts query")?;

        let records = stmt
            .query_map(params![contest_id.as_str()], |row| {
                let rank: u32 = row.get(0)?;
                let payout: Value = row.get(1)?;
                Ok(PayoutRecord {
                    contest_id: contest_id.clone(),
                    rank,
                    payout: payout_from_sql(payout),
                })
            })
            .context("failed to query payouts")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read payout row")?;
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Record entrants. Known nicknames keep the larger of their stored and
    /// new experience level.
    pub fn upsert_entrants(&self, entrants: &[EntrantRecord]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        for entrant in entrants {
            tx.execute(
                "INSERT INTO players (nickname, experience) VALUES (?1, ?2)
                 ON CONFLICT(nickname) DO UPDATE SET
                    experience = MAX(experience, excluded.experience)",
                params![entrant.nickname, entrant.experience],
            )
            .context("failed to upsert player")?;
        }
        tx.commit().context("failed to commit players")?;
        Ok(())
    }

    pub fn player_experience(&self, nickname: &str) -> Result<Option<u8>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT experience FROM players WHERE nickname = ?1",
            params![nickname],
            |row| row.get(0),
        )
        .optional()
        .context("failed to load player")
    }

    /// Write every known player as `nickname,experience` to `path`.
    /// Returns the number of players written.
    pub fn export_players_csv(&self, path: &Path) -> Result<usize> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT nickname, experience FROM players ORDER BY nickname")
            .context("failed to prepare players export")?;
        let players = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u8>(1)?)))
            .context("failed to query players")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read player row")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        wtr.write_record(["nickname", "experience"])?;
        for (nickname, experience) in &players {
            wtr.write_record([nickname.clone(), experience.to_string()])?;
        }
        wtr.flush()?;
        Ok(players.len())
    }
}

// ---------------------------------------------------------------------------
// Statement helpers shared by single-row and transactional paths
// ---------------------------------------------------------------------------

fn upsert_contest_with(conn: &Connection, contest: &Contest) -> Result<()> {
    let payouts_json =
        serde_json::to_string(&contest.payouts).context("failed to serialize payouts")?;
    conn.execute(
        "INSERT OR REPLACE INTO tournaments
            (contest_id, tournament_date, name, style, buy_in, entrants, max_entrants,
             total_prize, crowns, my_entries, multi_entry, scraped_date, summary, payouts, salary_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            contest.contest_id.as_str(),
            contest.tournament_date.as_ref().map(format_datetime),
            contest.tournament,
            contest.style,
            contest.buy_in,
            contest.entrants,
            contest.max_entrants,
            contest.total_prize,
            contest.crowns,
            contest.my_entries,
            contest.multi_entry,
            format_datetime(&contest.scraped_date),
            contest.summary,
            payouts_json,
            contest.salary_id.as_ref().map(|id| id.as_str()),
        ],
    )
    .with_context(|| format!("failed to upsert contest {}", contest.contest_id))?;
    Ok(())
}

fn insert_payout_with(conn: &Connection, record: &PayoutRecord) -> Result<usize> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO payouts (contest_id, ranking, payout) VALUES (?1, ?2, ?3)",
            params![record.contest_id.as_str(), record.rank, payout_to_sql(&record.payout)],
        )
        .context("failed to insert payout")?;
    Ok(inserted)
}

fn payout_to_sql(payout: &PayoutValue) -> Value {
    match payout {
        PayoutValue::Cash(amount) => Value::Real(*amount),
        PayoutValue::Ticket(text) | PayoutValue::Unparsed(text) => Value::Text(text.clone()),
    }
}

fn payout_from_sql(value: Value) -> PayoutValue {
    match value {
        Value::Real(amount) => PayoutValue::Cash(amount),
        Value::Integer(amount) => PayoutValue::Cash(amount as f64),
        Value::Text(text) => PayoutValue::parse(&text),
        Value::Null | Value::Blob(_) => PayoutValue::Unparsed(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use ledger_core::contest::ContestListing;
    use ledger_core::payout::PayoutTable;

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn scraped_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 2, 28)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    /// Helper: a contest with a small payout table.
    fn sample_contest(id: &str, name: &str) -> Contest {
        let listing = ContestListing {
            contest_id: ContestId::from(id),
            tournament: name.to_string(),
            style: "Classic".to_string(),
        };
        let mut contest = Contest::from_listing(&listing, scraped_at());
        let mut payouts = PayoutTable::new();
        payouts.insert("1", PayoutValue::Cash(100.0));
        payouts.insert("2 - 4", PayoutValue::parse("1x $2 Ticket"));
        contest.payouts = payouts;
        contest
    }

    fn entrant(nickname: &str, experience: u8) -> EntrantRecord {
        EntrantRecord {
            nickname: nickname.to_string(),
            entries: 1,
            experience,
        }
    }

    // ------------------------------------------------------------------
    // Schema / open
    // ------------------------------------------------------------------

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"tournaments".to_string()));
        assert!(tables.contains(&"payouts".to_string()));
        assert!(tables.contains(&"players".to_string()));
    }

    // ------------------------------------------------------------------
    // Contests and payouts
    // ------------------------------------------------------------------

    #[test]
    fn upsert_contest_replaces_on_conflict() {
        let db = test_db();
        db.upsert_contest(&sample_contest("10", "old name")).unwrap();
        let mut newer = sample_contest("10", "new name");
        newer.salary_id = Some(ContestId::from("9"));
        db.upsert_contest(&newer).unwrap();

        assert_eq!(db.contest_count().unwrap(), 1);
        assert_eq!(
            db.load_contest_summary(&ContestId::from("10")).unwrap(),
            Some(("new name".to_string(), Some("9".to_string())))
        );
        assert_eq!(db.load_contest_summary(&ContestId::from("11")).unwrap(), None);
    }

    #[test]
    fn payout_inserts_ignore_existing_ranks() {
        let db = test_db();
        let id = ContestId::from("10");
        let first = PayoutRecord {
            contest_id: id.clone(),
            rank: 1,
            payout: PayoutValue::Cash(100.0),
        };
        let second = PayoutRecord {
            payout: PayoutValue::Cash(5.0),
            ..first.clone()
        };

        assert_eq!(db.insert_payouts(&[first]).unwrap(), 1);
        assert_eq!(db.insert_payouts(&[second]).unwrap(), 0);

        let stored = db.load_payouts(&id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].payout, PayoutValue::Cash(100.0));
    }

    #[test]
    fn import_contests_expands_payouts() {
        let db = test_db();
        let summary = db.import_contests(&[sample_contest("10", "A")]).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                contests: 1,
                payouts: 3,
                skipped: 0
            }
        );

        let stored = db.load_payouts(&ContestId::from("10")).unwrap();
        let ranks: Vec<u32> = stored.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(stored[1].payout, PayoutValue::Ticket("1x $2 Ticket".into()));
    }

    #[test]
    fn import_contests_is_idempotent() {
        let db = test_db();
        db.import_contests(&[sample_contest("10", "A")]).unwrap();
        let again = db.import_contests(&[sample_contest("10", "A")]).unwrap();
        assert_eq!(again.contests, 1);
        assert_eq!(again.payouts, 0);
        assert_eq!(db.load_payouts(&ContestId::from("10")).unwrap().len(), 3);
    }

    #[test]
    fn import_skips_contest_with_malformed_range() {
        let db = test_db();
        let mut bad = sample_contest("11", "bad");
        bad.payouts.insert("9 - 3", PayoutValue::Cash(1.0));

        let summary = db
            .import_contests(&[bad, sample_contest("10", "good")])
            .unwrap();
        assert_eq!(summary.contests, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(db.load_contest_summary(&ContestId::from("11")).unwrap(), None);
        assert!(db.load_payouts(&ContestId::from("11")).unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    #[test]
    fn upsert_entrants_keeps_larger_experience() {
        let db = test_db();
        db.upsert_entrants(&[entrant("hoopsfan", 3), entrant("rookie", 0)]).unwrap();
        db.upsert_entrants(&[entrant("hoopsfan", 1), entrant("rookie", 2)]).unwrap();

        assert_eq!(db.player_experience("hoopsfan").unwrap(), Some(3));
        assert_eq!(db.player_experience("rookie").unwrap(), Some(2));
        assert_eq!(db.player_experience("nobody").unwrap(), None);
    }

    #[test]
    fn export_players_writes_csv() {
        let db = test_db();
        db.upsert_entrants(&[entrant("zed", 1), entrant("amy", 5)]).unwrap();

        let tmp = std::env::temp_dir().join("ledger_db_test_export");
        let _ = std::fs::remove_dir_all(&tmp);
        let path = tmp.join("datasets/players.csv");

        assert_eq!(db.export_players_csv(&path).unwrap(), 2);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "nickname,experience\namy,5\nzed,1\n");

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
