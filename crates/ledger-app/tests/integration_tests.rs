// Integration tests for the contest ledger.
//
// These exercise the library's public API end-to-end: scraper dumps in an
// inbox flow through the day's snapshot, salary grouping and the history
// fold, then into SQLite.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use ledger_app::context::RunContext;
use ledger_app::db::Database;
use ledger_app::pipeline::Pipeline;
use ledger_app::scraper::DumpScraper;
use ledger_app::store::{DatasetKey, FileStore, Repository};
use ledger_core::contest::{Contest, ContestId, ContestListing};
use ledger_core::lineup::LineupParser;
use ledger_core::results::ResultRecordBuilder;

// ===========================================================================
// Test helpers
// ===========================================================================

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 2, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn detail_json(id: &str, title: &str, date: &str, buy_in: &str) -> String {
    format!(
        r#"{{"contest_id": "{id}", "full_date": "{date}", "title": "{title}",
            "info": ["{buy_in}", "1.2K/50K", "$10,000", "0", "1", "No Multi-Entry"],
            "summary": "A 50000-player contest",
            "payouts": [{{"place": "1st", "prize": "$1,000"}}, {{"place": "2nd - 5th", "prize": "1x $2 Ticket"}}]}}"#
    )
}

/// Build a pipeline over a fresh root for the day of `scraped_at`.
fn pipeline_at(root: &Path, scraped_at: NaiveDateTime) -> Pipeline<DumpScraper> {
    let ctx = RunContext::new(root, root.join("inbox"), scraped_at);
    Pipeline::new(
        FileStore::new(ctx),
        DumpScraper::new(root.join("inbox")),
        Database::open(":memory:").unwrap(),
        ResultRecordBuilder::new(LineupParser::default()),
    )
}

fn by_id(contests: &[Contest]) -> HashMap<String, &Contest> {
    contests
        .iter()
        .map(|c| (c.contest_id.to_string(), c))
        .collect()
}

fn temp_root(name: &str) -> PathBuf {
    let tmp = std::env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&tmp);
    fs::create_dir_all(&tmp).unwrap();
    tmp
}

// ===========================================================================
// End-to-end
// ===========================================================================

#[test]
fn day_batch_updates_history_and_keeps_other_contests() {
    let root = temp_root("ledger_it_day_batch");

    // A prior history with an older version of contest 50 and an unrelated
    // contest from an earlier day.
    let prior = pipeline_at(&root, at(27, 9));
    let old_listing = ContestListing {
        contest_id: ContestId::from("50"),
        tournament: "Old name".into(),
        style: "Classic".into(),
    };
    let unrelated = ContestListing {
        contest_id: ContestId::from("7"),
        tournament: "Earlier contest".into(),
        style: "Classic".into(),
    };
    prior
        .store()
        .save(
            DatasetKey::History,
            &[
                Contest::from_listing(&old_listing, at(27, 9)),
                Contest::from_listing(&unrelated, at(27, 9)),
            ],
        )
        .unwrap();

    // The day's inbox: 50 and 30 share style and start, 10 is a showdown.
    let inbox = root.join("inbox").join("28_02_2020");
    write(
        &inbox.join("listing.json"),
        r#"[
            {"contest_id": 50, "tournament": "NBA $5", "style": "Classic"},
            {"contest_id": 30, "tournament": "NBA $2", "style": "Classic"},
            {"contest_id": 10, "tournament": "NBA Showdown", "style": "Showdown Captain Mode (BOS vs MIA)"},
            {"contest_id": 50, "tournament": "NBA $5", "style": "Classic"}
        ]"#,
    );
    write(&inbox.join("details/50.json"), &detail_json("50", "New name", "28/02 19:00 GMT", "$5"));
    write(&inbox.join("details/30.json"), &detail_json("30", "NBA $2", "28/02 19:00 GMT", "Free"));
    write(&inbox.join("details/10.json"), &detail_json("10", "NBA Showdown", "28/02 19:00 GMT", "$1"));

    let p = pipeline_at(&root, at(28, 9));
    let day = p.store().context().today;
    assert_eq!(p.refresh_listings(day).unwrap(), 3);
    let refresh = p.refresh_contests(day).unwrap();
    assert_eq!(refresh.detailed, 3);

    let history = p.update_history().unwrap();
    let history = by_id(&history);
    assert_eq!(history.len(), 4);

    // Newest version wins.
    let fifty = history["50"];
    assert_eq!(fifty.tournament, "New name");
    assert_eq!(fifty.buy_in, Some(5.0));
    assert_eq!(fifty.max_entrants, Some(50000));
    assert_eq!(fifty.entrants, Some(1200));
    assert_eq!(fifty.multi_entry, Some(false));
    assert_eq!(fifty.tournament_date, Some(at(28, 19)));

    // Untouched contest stays as it was.
    assert_eq!(history["7"].tournament, "Earlier contest");
    assert_eq!(history["7"].salary_id, None);

    // Salary grouping invariant.
    assert_eq!(history["30"].buy_in, Some(0.0));
    assert_eq!(history["50"].salary_id, Some(ContestId::from("30")));
    assert_eq!(history["30"].salary_id, Some(ContestId::from("30")));
    assert_eq!(history["10"].salary_id, Some(ContestId::from("10")));
    assert_eq!(history["10"].style, "Showdown Captain Mode");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn rerunning_the_day_is_idempotent() {
    let root = temp_root("ledger_it_idempotent");
    let inbox = root.join("inbox").join("28_02_2020");
    write(
        &inbox.join("listing.json"),
        r#"[{"contest_id": "50", "tournament": "NBA $5", "style": "Classic"}]"#,
    );
    write(&inbox.join("details/50.json"), &detail_json("50", "NBA $5", "28/02 19:00 GMT", "$5"));

    let p = pipeline_at(&root, at(28, 9));
    let day = p.store().context().today;
    p.refresh_listings(day).unwrap();
    p.refresh_contests(day).unwrap();
    let first = p.update_history().unwrap();
    let stored = p.persist_contests(day).unwrap();
    assert_eq!(stored.payouts, 4);

    p.refresh_listings(day).unwrap();
    p.refresh_contests(day).unwrap();
    assert_eq!(p.update_history().unwrap(), first);
    assert_eq!(p.persist_contests(day).unwrap().payouts, 0);
    assert_eq!(p.db().contest_count().unwrap(), 1);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn default_config_is_valid_toml() {
    let content = fs::read_to_string("defaults/ledger.toml").expect("defaults/ledger.toml should exist");
    let parsed: Result<toml::Value, _> = toml::from_str(&content);
    assert!(parsed.is_ok(), "defaults/ledger.toml is not valid TOML: {:?}", parsed.err());
}
