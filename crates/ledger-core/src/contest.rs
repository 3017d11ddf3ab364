// Contest records: identifiers, lobby listings and the detail-pass parser.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use chrono::{Datelike, NaiveDateTime};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::columns;
use crate::error::{LedgerError, Result};
use crate::payout::{PayoutTable, RawPayoutRow};

/// Style label for every raw style starting with `In-Game`.
pub const IN_GAME_SHOWDOWN: &str = "In-Game Showdown";
/// Style label for every raw style starting with `Showdown`.
pub const SHOWDOWN_CAPTAIN_MODE: &str = "Showdown Captain Mode";

// ---------------------------------------------------------------------------
// Contest identifier
// ---------------------------------------------------------------------------

/// Opaque contest identifier as issued by the site.
///
/// Ordering is numeric when both ids are numeric (the site issues
/// increasing integers), which is what the salary-group minimum relies on.
/// Non-numeric ids sort after numeric ones, lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContestId(String);

impl ContestId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the id, if it is all digits.
    pub fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for ContestId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ContestId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ContestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContestId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ContestId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl PartialEq<&str> for ContestId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = ContestId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a contest id as a string or an unsigned integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<ContestId, E> {
        Ok(ContestId::new(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<ContestId, E> {
        Ok(ContestId(v.to_string()))
    }
}

/// Table cells are read verbatim, so `"00123"` stays `"00123"`.
impl<'de> Deserialize<'de> for ContestId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        d.deserialize_string(IdVisitor)
    }
}

/// Scraper dumps carry ids as JSON numbers or strings; both are accepted.
pub fn dump_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<ContestId, D::Error> {
    d.deserialize_any(IdVisitor)
}

// ---------------------------------------------------------------------------
// Lobby listings
// ---------------------------------------------------------------------------

/// A lobby row exactly as the scraper extracted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListing {
    #[serde(deserialize_with = "dump_id")]
    pub contest_id: ContestId,
    pub tournament: String,
    pub style: String,
}

/// A lobby row with its style normalized; one row of the day's
/// `<date>_contests.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestListing {
    pub contest_id: ContestId,
    pub tournament: String,
    pub style: String,
}

impl ContestListing {
    pub fn from_raw(raw: &RawListing) -> Self {
        Self {
            contest_id: raw.contest_id.clone(),
            tournament: raw.tournament.trim().to_string(),
            style: normalize_style(&raw.style),
        }
    }
}

/// Collapse the many showdown style variants into their two canonical labels.
pub fn normalize_style(raw: &str) -> String {
    let style = raw.trim();
    if style.starts_with("In-Game") {
        IN_GAME_SHOWDOWN.to_string()
    } else if style.starts_with("Showdown") {
        SHOWDOWN_CAPTAIN_MODE.to_string()
    } else {
        style.to_string()
    }
}

/// Normalize freshly scraped lobby rows, dropping ids already present in
/// `known` and repeated ids within the batch (first occurrence wins; the
/// lobby is scanned more than once per run).
pub fn new_listings(known: &[ContestListing], raw: &[RawListing]) -> Vec<ContestListing> {
    let mut seen: HashSet<&ContestId> = known.iter().map(|l| &l.contest_id).collect();
    let mut fresh = Vec::new();
    for row in raw {
        if seen.insert(&row.contest_id) {
            fresh.push(ContestListing::from_raw(row));
        }
    }
    fresh
}

// ---------------------------------------------------------------------------
// Contest
// ---------------------------------------------------------------------------

/// One row of the contest snapshot table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub contest_id: ContestId,
    #[serde(with = "columns::optional_datetime", default)]
    pub tournament_date: Option<NaiveDateTime>,
    pub tournament: String,
    pub style: String,
    pub buy_in: Option<f64>,
    #[serde(with = "columns::optional_count", default)]
    pub entrants: Option<u32>,
    #[serde(with = "columns::optional_count", default)]
    pub max_entrants: Option<u32>,
    #[serde(rename = "prize")]
    pub total_prize: Option<f64>,
    pub crowns: Option<f64>,
    #[serde(with = "columns::optional_count", default)]
    pub my_entries: Option<u32>,
    pub multi_entry: Option<bool>,
    #[serde(with = "columns::datetime")]
    pub scraped_date: NaiveDateTime,
    #[serde(default)]
    pub summary: String,
    #[serde(with = "columns::payout_literal", default)]
    pub payouts: PayoutTable,
    pub salary_id: Option<ContestId>,
}

/// The contest pop-up as the scraper read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContestDetail {
    #[serde(deserialize_with = "dump_id")]
    pub contest_id: ContestId,
    /// Start date without a year, e.g. `"28/02 19:00 GMT"`.
    pub full_date: String,
    pub title: String,
    /// Info paragraphs in page order: buy-in, entrants, prize, crowns and,
    /// when present, my entries and the multi-entry label.
    pub info: Vec<String>,
    /// Fallback multi-entry label rendered outside the paragraph list.
    #[serde(default)]
    pub extra_long: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub payouts: Vec<RawPayoutRow>,
}

impl Contest {
    /// A contest known only from the lobby. Detail fields stay empty until
    /// the detail pass runs.
    pub fn from_listing(listing: &ContestListing, scraped_at: NaiveDateTime) -> Self {
        Self {
            contest_id: listing.contest_id.clone(),
            tournament_date: None,
            tournament: listing.tournament.clone(),
            style: listing.style.clone(),
            buy_in: None,
            entrants: None,
            max_entrants: None,
            total_prize: None,
            crowns: None,
            my_entries: None,
            multi_entry: None,
            scraped_date: scraped_at,
            summary: String::new(),
            payouts: PayoutTable::new(),
            salary_id: None,
        }
    }

    /// Build the full contest row from its lobby listing and detail pop-up.
    ///
    /// The style always comes from the listing. `salary_id` is left unset
    /// for the salary resolver.
    pub fn from_detail(
        listing: &ContestListing,
        raw: &RawContestDetail,
        scraped_at: NaiveDateTime,
    ) -> Result<Self> {
        let malformed = |field: &str, message: String| LedgerError::MalformedContestDetail {
            contest_id: raw.contest_id.to_string(),
            field: field.to_string(),
            message,
        };

        if raw.info.len() < 4 {
            return Err(malformed(
                "info",
                format!("expected at least 4 paragraphs, got {}", raw.info.len()),
            ));
        }

        let buy_in = parse_money(&raw.info[0])
            .ok_or_else(|| malformed("buy_in", format!("`{}`", raw.info[0])))?;
        let (entrants, max_entrants) = parse_entrants(&raw.info[1], &raw.summary)
            .ok_or_else(|| malformed("entrants", format!("`{}`", raw.info[1])))?;
        let total_prize = parse_money(&raw.info[2])
            .ok_or_else(|| malformed("prize", format!("`{}`", raw.info[2])))?;
        let crowns = parse_money(&raw.info[3]);

        let (my_entries, multi_entry) = if raw.info.len() == 4 {
            (None, None)
        } else {
            let label = raw
                .info
                .get(5)
                .or(raw.extra_long.as_ref())
                .map(String::as_str)
                .unwrap_or("");
            (parse_count(&raw.info[4]), parse_multi_entry(label))
        };

        let tournament_date = parse_tournament_date(&raw.full_date, scraped_at)
            .ok_or_else(|| malformed("tournament_date", format!("`{}`", raw.full_date)))?;

        let tournament = if raw.title.trim().is_empty() {
            listing.tournament.clone()
        } else {
            raw.title.trim().to_string()
        };

        Ok(Self {
            contest_id: listing.contest_id.clone(),
            tournament_date: Some(tournament_date),
            tournament,
            style: listing.style.clone(),
            buy_in: Some(buy_in),
            entrants: Some(entrants),
            max_entrants: Some(max_entrants),
            total_prize: Some(total_prize),
            crowns,
            my_entries,
            multi_entry,
            scraped_date: scraped_at,
            summary: raw.summary.clone(),
            payouts: PayoutTable::from_raw_rows(&raw.payouts),
            salary_id: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Field cleaning
// ---------------------------------------------------------------------------

/// Parse a money cell: `"$1,250"` is 1250, `"Free"` is 0.
pub fn parse_money(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("free") {
        return Some(0.0);
    }
    let cleaned = raw.replace('$', "").replace(',', "");
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
}

/// Parse a count cell, expanding the `K` abbreviation: `"1.2K"` is 1200.
pub fn parse_count(raw: &str) -> Option<u32> {
    let cleaned = raw.trim().replace(',', "");
    if let Some(thousands) = cleaned
        .strip_suffix('K')
        .or_else(|| cleaned.strip_suffix('k'))
    {
        let value: f64 = thousands.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        return Some((value * 1000.0).round() as u32);
    }
    cleaned.parse().ok()
}

/// Parse the `"<registered>/<max>"` entrants cell.
///
/// An abbreviated maximum (`"50K"`) is only an estimate; when the summary
/// spells out the exact size (`"... a 50000-player contest ..."`) the larger
/// of the two wins.
pub fn parse_entrants(raw: &str, summary: &str) -> Option<(u32, u32)> {
    let (registered, max) = raw.split_once('/')?;
    let registered = parse_count(registered)?;
    let estimated = parse_count(max)?;

    let max_entrants = if max.trim().to_uppercase().ends_with('K') {
        estimated.max(summary_player_cap(summary))
    } else {
        estimated
    };
    Some((registered, max_entrants))
}

/// The largest `<n>-player` figure mentioned in a contest summary, or 0.
pub fn summary_player_cap(summary: &str) -> u32 {
    summary
        .split_whitespace()
        .filter_map(|word| word.split_once("-player"))
        .filter_map(|(count, _)| count.replace(',', "").parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// `"No Multi-Entry"` is false, any other non-empty label is true.
pub fn parse_multi_entry(raw: &str) -> Option<bool> {
    let label = raw.trim().to_lowercase();
    if label.is_empty() {
        return None;
    }
    Some(!(label.contains("no multi-entry") || label.contains("single entry")))
}

/// Parse a year-less start date such as `"28/02 19:00 GMT"`.
///
/// The year is taken from the scrape time. A January start scraped in
/// December belongs to the following year. Time zone names are ignored.
pub fn parse_tournament_date(raw: &str, scraped_at: NaiveDateTime) -> Option<NaiveDateTime> {
    let stamp: Vec<&str> = raw
        .split_whitespace()
        .filter(|token| !token.chars().any(|c| c.is_alphabetic()))
        .collect();
    if stamp.is_empty() {
        return None;
    }
    let stamp = stamp.join(" ");

    let parse_in = |year: i32| {
        NaiveDateTime::parse_from_str(&format!("{year} {stamp}"), "%Y %d/%m %H:%M").ok()
    };

    let date = parse_in(scraped_at.year())?;
    if scraped_at.month() == 12 && date.month() == 1 {
        return parse_in(scraped_at.year() + 1);
    }
    Some(date)
}
