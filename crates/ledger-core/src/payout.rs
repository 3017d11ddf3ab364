// Payout tables: prize cleaning and rank-range expansion.
//
// A contest's payout block arrives as an ordered list of (place, prize)
// pairs where the place is either a single rank ("1st") or a range
// ("11th - 20th"). The table keeps that compressed form; `expand_payouts`
// flattens it into one record per rank for the persistence sink.

use std::collections::HashSet;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::contest::ContestId;
use crate::error::{LedgerError, Result};

/// Separator between the two boundaries of a rank range key.
pub const RANGE_SEPARATOR: &str = " - ";

/// Whether a range key `"from - to"` emits its upper boundary.
///
/// The range is walked from `from` while the current rank differs from
/// `to`, so the top rank of every multi-rank range is not emitted. A range
/// whose boundaries are equal emits that single rank.
pub const RANGE_INCLUDES_UPPER_BOUND: bool = false;

/// Ordinal suffixes stripped from place labels, in the order they are removed.
const PLACE_SUFFIXES: [&str; 4] = ["st", "th", "rd", "nd"];

// ---------------------------------------------------------------------------
// Prize values
// ---------------------------------------------------------------------------

/// A cleaned prize cell.
#[derive(Debug, Clone, PartialEq)]
pub enum PayoutValue {
    /// Cash amount with currency symbols and separators removed.
    Cash(f64),
    /// Non-cash prize, kept verbatim (e.g. "1x $5 Ticket").
    Ticket(String),
    /// Anything that is neither a ticket nor a parseable amount.
    Unparsed(String),
}

impl PayoutValue {
    /// Clean a raw prize string.
    ///
    /// - contains "ticket" (any case): kept verbatim as a ticket descriptor
    /// - contains "no prizes": cash 0
    /// - otherwise `$` and `,` are stripped and the rest parsed as an amount,
    ///   falling back to the raw string
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower.contains("ticket") {
            return PayoutValue::Ticket(raw.to_string());
        }
        if lower.contains("no prizes") {
            return PayoutValue::Cash(0.0);
        }
        let cleaned = raw.replace('$', "").replace(',', "");
        match cleaned.trim().parse::<f64>() {
            Ok(amount) if amount.is_finite() => PayoutValue::Cash(amount),
            _ => PayoutValue::Unparsed(raw.to_string()),
        }
    }

    /// The cash amount, if this is a cash prize.
    pub fn amount(&self) -> Option<f64> {
        match self {
            PayoutValue::Cash(amount) => Some(*amount),
            _ => None,
        }
    }

    /// The textual descriptor for ticket or unparsed prizes.
    pub fn text(&self) -> Option<&str> {
        match self {
            PayoutValue::Cash(_) => None,
            PayoutValue::Ticket(text) | PayoutValue::Unparsed(text) => Some(text),
        }
    }
}

impl fmt::Display for PayoutValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayoutValue::Cash(amount) => write!(f, "{amount}"),
            PayoutValue::Ticket(text) | PayoutValue::Unparsed(text) => f.write_str(text),
        }
    }
}

impl Serialize for PayoutValue {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PayoutValue::Cash(amount) => s.serialize_f64(*amount),
            PayoutValue::Ticket(text) | PayoutValue::Unparsed(text) => s.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for PayoutValue {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Stored {
            Number(f64),
            Text(String),
        }

        Ok(match Stored::deserialize(d)? {
            Stored::Number(amount) => PayoutValue::Cash(amount),
            Stored::Text(text) if text.to_lowercase().contains("ticket") => {
                PayoutValue::Ticket(text)
            }
            Stored::Text(text) => PayoutValue::Unparsed(text),
        })
    }
}

// ---------------------------------------------------------------------------
// Payout table
// ---------------------------------------------------------------------------

/// One row of a contest's payout block as the scraper read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPayoutRow {
    pub place: String,
    pub prize: String,
}

/// Ordered mapping of rank-or-range key to prize, e.g.
/// `{"1": 1000.0, "2": 500.0, "3 - 10": 50.0}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PayoutTable {
    tiers: Vec<(String, PayoutValue)>,
}

impl PayoutTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from the raw payout rows, stripping ordinal suffixes
    /// from places and cleaning prizes.
    pub fn from_raw_rows(rows: &[RawPayoutRow]) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.insert(clean_place(&row.place), PayoutValue::parse(&row.prize));
        }
        table
    }

    /// Insert a tier. A key that is already present keeps its position and
    /// takes the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: PayoutValue) {
        let key = key.into();
        match self.tiers.iter_mut().find(|(k, _)| *k == key) {
            Some(tier) => tier.1 = value,
            None => self.tiers.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PayoutValue> {
        self.tiers.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayoutValue)> {
        self.tiers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl Serialize for PayoutTable {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.tiers.len()))?;
        for (key, value) in &self.tiers {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PayoutTable {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = PayoutTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of rank or rank range to prize")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<PayoutTable, A::Error> {
                let mut table = PayoutTable::new();
                while let Some((key, value)) = access.next_entry::<String, PayoutValue>()? {
                    table.insert(key, value);
                }
                Ok(table)
            }
        }

        d.deserialize_map(TableVisitor)
    }
}

/// Strip ordinal suffixes from a place label: `"11th - 20th"` becomes
/// `"11 - 20"`.
pub fn clean_place(raw: &str) -> String {
    let mut place = raw.trim().to_string();
    for suffix in PLACE_SUFFIXES {
        place = place.replace(suffix, "");
    }
    place
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

/// A single rank's prize in a single contest.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutRecord {
    pub contest_id: ContestId,
    pub rank: u32,
    pub payout: PayoutValue,
}

/// Flatten a contest's payout table into one record per rank.
///
/// Records come out in table order. When two keys cover the same rank the
/// first one wins. Any key with non-numeric, zero or descending boundaries
/// fails the whole contest with `MalformedPayoutRange`.
pub fn expand_payouts(contest_id: &ContestId, table: &PayoutTable) -> Result<Vec<PayoutRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (key, payout) in table.iter() {
        for rank in ranks_for_key(contest_id, key)? {
            if !seen.insert(rank) {
                debug!("contest {contest_id}: rank {rank} already paid, ignoring `{key}`");
                continue;
            }
            records.push(PayoutRecord {
                contest_id: contest_id.clone(),
                rank,
                payout: payout.clone(),
            });
        }
    }

    Ok(records)
}

fn ranks_for_key(contest_id: &ContestId, key: &str) -> Result<Vec<u32>> {
    let malformed = || LedgerError::MalformedPayoutRange {
        contest_id: contest_id.to_string(),
        key: key.to_string(),
    };

    let Some((from, to)) = key.split_once(RANGE_SEPARATOR) else {
        return parse_rank(key).map(|rank| vec![rank]).ok_or_else(malformed);
    };

    let from = parse_rank(from).ok_or_else(malformed)?;
    let to = parse_rank(to).ok_or_else(malformed)?;

    if from > to {
        return Err(malformed());
    }
    if from == to {
        return Ok(vec![from]);
    }

    let ranks = if RANGE_INCLUDES_UPPER_BOUND {
        (from..=to).collect()
    } else {
        (from..to).collect()
    };
    Ok(ranks)
}

fn parse_rank(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|rank| *rank > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid() -> ContestId {
        ContestId::from("81234567")
    }

    fn table(entries: &[(&str, PayoutValue)]) -> PayoutTable {
        let mut table = PayoutTable::new();
        for (key, value) in entries {
            table.insert(*key, value.clone());
        }
        table
    }

    fn ranks(records: &[PayoutRecord]) -> Vec<u32> {
        records.iter().map(|r| r.rank).collect()
    }

    // -- Prize cleaning --

    #[test]
    fn cash_prize_strips_dollar_and_commas() {
        assert_eq!(PayoutValue::parse("$1,000"), PayoutValue::Cash(1000.0));
        assert_eq!(PayoutValue::parse("$2.50"), PayoutValue::Cash(2.5));
    }

    #[test]
    fn no_prizes_is_zero() {
        assert_eq!(PayoutValue::parse("No prizes"), PayoutValue::Cash(0.0));
    }

    #[test]
    fn ticket_is_kept_verbatim() {
        let raw = "1x $3 Ticket to NBA $3 Quarter Jukebox";
        assert_eq!(PayoutValue::parse(raw), PayoutValue::Ticket(raw.to_string()));
    }

    #[test]
    fn unparseable_prize_falls_back_to_raw() {
        assert_eq!(
            PayoutValue::parse("Signed jersey"),
            PayoutValue::Unparsed("Signed jersey".to_string())
        );
        assert_eq!(PayoutValue::parse("NaN"), PayoutValue::Unparsed("NaN".to_string()));
    }

    // -- Place cleaning --

    #[test]
    fn clean_place_strips_ordinals() {
        assert_eq!(clean_place("1st"), "1");
        assert_eq!(clean_place("2nd"), "2");
        assert_eq!(clean_place("3rd"), "3");
        assert_eq!(clean_place("11th - 20th"), "11 - 20");
    }

    #[test]
    fn from_raw_rows_builds_clean_table() {
        let rows = vec![
            RawPayoutRow { place: "1st".into(), prize: "$1,000".into() },
            RawPayoutRow { place: "2nd - 5th".into(), prize: "$20".into() },
        ];
        let table = PayoutTable::from_raw_rows(&rows);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("1"), Some(&PayoutValue::Cash(1000.0)));
        assert_eq!(table.get("2 - 5"), Some(&PayoutValue::Cash(20.0)));
    }

    // -- Expansion --

    #[test]
    fn literal_rank_yields_one_record() {
        let t = table(&[("1", PayoutValue::parse("$1,000"))]);
        let records = expand_payouts(&cid(), &t).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rank, 1);
        assert_eq!(records[0].payout, PayoutValue::Cash(1000.0));
        assert_eq!(records[0].contest_id, cid());
    }

    #[test]
    fn range_excludes_terminal_rank() {
        let t = table(&[("10 - 13", PayoutValue::Cash(5.0))]);
        let records = expand_payouts(&cid(), &t).unwrap();
        assert_eq!(ranks(&records), vec![10, 11, 12]);
        assert!(records.iter().all(|r| r.payout == PayoutValue::Cash(5.0)));
    }

    #[test]
    fn range_with_equal_bounds_yields_single_rank() {
        let t = table(&[("7 - 7", PayoutValue::Cash(3.0))]);
        let records = expand_payouts(&cid(), &t).unwrap();
        assert_eq!(ranks(&records), vec![7]);
    }

    #[test]
    fn mixed_table_keeps_order() {
        let t = table(&[
            ("1", PayoutValue::Cash(100.0)),
            ("2", PayoutValue::Cash(50.0)),
            ("3 - 6", PayoutValue::Cash(10.0)),
            ("6 - 9", PayoutValue::Ticket("1x Ticket".into())),
        ]);
        let records = expand_payouts(&cid(), &t).unwrap();
        assert_eq!(ranks(&records), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(records[5].payout, PayoutValue::Ticket("1x Ticket".into()));
    }

    #[test]
    fn overlapping_keys_keep_first_record_per_rank() {
        let t = table(&[
            ("1 - 4", PayoutValue::Cash(10.0)),
            ("2", PayoutValue::Cash(99.0)),
        ]);
        let records = expand_payouts(&cid(), &t).unwrap();
        assert_eq!(ranks(&records), vec![1, 2, 3]);
        assert_eq!(records[1].payout, PayoutValue::Cash(10.0));
    }

    #[test]
    fn no_prizes_expands_to_zero() {
        let t = table(&[("1", PayoutValue::parse("No prizes"))]);
        let records = expand_payouts(&cid(), &t).unwrap();
        assert_eq!(records[0].payout.amount(), Some(0.0));
    }

    #[test]
    fn malformed_range_fails_whole_contest() {
        let t = table(&[
            ("1", PayoutValue::Cash(100.0)),
            ("abc - 10", PayoutValue::Cash(5.0)),
        ]);
        let err = expand_payouts(&cid(), &t).unwrap_err();
        match err {
            LedgerError::MalformedPayoutRange { contest_id, key } => {
                assert_eq!(contest_id, "81234567");
                assert_eq!(key, "abc - 10");
            }
            other => panic!("expected MalformedPayoutRange, got: {other}"),
        }
    }

    #[test]
    fn descending_range_is_malformed() {
        let t = table(&[("20 - 11", PayoutValue::Cash(5.0))]);
        assert!(matches!(
            expand_payouts(&cid(), &t),
            Err(LedgerError::MalformedPayoutRange { .. })
        ));
    }

    #[test]
    fn zero_rank_is_malformed() {
        let t = table(&[("0", PayoutValue::Cash(5.0))]);
        assert!(expand_payouts(&cid(), &t).is_err());
    }

    #[test]
    fn empty_table_expands_to_nothing() {
        assert!(expand_payouts(&cid(), &PayoutTable::new()).unwrap().is_empty());
    }

    // -- Serialization --

    #[test]
    fn table_json_preserves_order_and_kinds() {
        let t = table(&[
            ("2", PayoutValue::Cash(50.0)),
            ("1", PayoutValue::Cash(100.0)),
            ("3 - 5", PayoutValue::Ticket("1x $2 Ticket".into())),
        ]);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"2":50.0,"1":100.0,"3 - 5":"1x $2 Ticket"}"#);

        let back: PayoutTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.iter().next().map(|(k, _)| k), Some("2"));
    }

    #[test]
    fn insert_existing_key_replaces_in_place() {
        let mut t = PayoutTable::new();
        t.insert("1", PayoutValue::Cash(1.0));
        t.insert("2", PayoutValue::Cash(2.0));
        t.insert("1", PayoutValue::Cash(9.0));
        assert_eq!(t.len(), 2);
        assert_eq!(t.iter().next(), Some(("1", &PayoutValue::Cash(9.0))));
    }
}
