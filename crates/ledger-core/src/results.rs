// Results exports.
//
// A contest's standings export holds two tables side by side: the standings
// (Rank, EntryId, EntryName, TimeRemaining, Points, Lineup), a blank
// separator column, then the most-picked players (Player, Roster Position,
// %Drafted, FPTS). The tables share rows but are otherwise unrelated, and
// the shorter one leaves its cells empty.

use std::io::{Read, Write};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::contest::ContestId;
use crate::entry_name::parse_entry_name;
use crate::lineup::{Lineup, LineupParser};

/// One standings row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub contest_id: ContestId,
    pub rank: Option<u32>,
    pub nickname: String,
    pub entry_number: u32,
    pub entries_total: u32,
    pub points: Option<f64>,
    pub lineup: Lineup,
}

/// One row of the most-picked-players table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MostPickedPlayer {
    pub player: String,
    pub position: String,
    pub pct_drafted: Option<f64>,
    pub points: Option<f64>,
}

/// Both tables of one contest's export, cleaned.
#[derive(Debug, Clone, PartialEq)]
pub struct ContestResults {
    pub contest_id: ContestId,
    pub entries: Vec<ResultEntry>,
    /// Every position seen in the contest's lineups, first-seen order.
    pub positions: Vec<String>,
    pub most_picked: Vec<MostPickedPlayer>,
    /// Standings rows dropped because their lineup did not parse.
    pub skipped_rows: usize,
}

impl ContestResults {
    /// Write the standings table: `rank, points, nickname, entries,
    /// entry_nb` followed by one column per position.
    pub fn write_results<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = WriterBuilder::new().from_writer(writer);

        let mut header = vec!["rank", "points", "nickname", "entries", "entry_nb"];
        header.extend(self.positions.iter().map(String::as_str));
        wtr.write_record(&header)?;

        for entry in &self.entries {
            let mut row = vec![
                entry.rank.map(|r| r.to_string()).unwrap_or_default(),
                entry.points.map(|p| p.to_string()).unwrap_or_default(),
                entry.nickname.clone(),
                entry.entries_total.to_string(),
                entry.entry_number.to_string(),
            ];
            for position in &self.positions {
                row.push(entry.lineup.get(position).unwrap_or_default().to_string());
            }
            wtr.write_record(&row)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Write the most-picked table: `player, position, pct_drafted, points`.
    pub fn write_most_picked<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        if self.most_picked.is_empty() {
            wtr.write_record(["player", "position", "pct_drafted", "points"])?;
        }
        for player in &self.most_picked {
            wtr.serialize(player)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Export file names
// ---------------------------------------------------------------------------

/// Which table(s) an export file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Standings, usually with the most-picked table alongside.
    Standings,
    /// Most-picked table on its own.
    MostPicked,
}

/// Contest id and kind of a results export, from its file name:
/// `<id>_results.csv`, `contest-standings-<id>.csv` or
/// `<id>_most_picked_players.csv`.
pub fn classify_export(file_name: &str) -> Option<(ContestId, ExportKind)> {
    let (id, kind) = if let Some(id) = file_name.strip_suffix("_results.csv") {
        (id, ExportKind::Standings)
    } else if let Some(id) = file_name
        .strip_prefix("contest-standings-")
        .and_then(|rest| rest.strip_suffix(".csv"))
    {
        (id, ExportKind::Standings)
    } else if let Some(id) = file_name.strip_suffix("_most_picked_players.csv") {
        (id, ExportKind::MostPicked)
    } else {
        return None;
    };

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((ContestId::new(id), kind))
}

pub fn contest_id_from_export_name(file_name: &str) -> Option<ContestId> {
    classify_export(file_name).map(|(id, _)| id)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Column positions in an export's header row. Any of them may be absent.
#[derive(Debug, Default)]
struct ExportColumns {
    rank: Option<usize>,
    entry_name: Option<usize>,
    points: Option<usize>,
    lineup: Option<usize>,
    player: Option<usize>,
    roster_position: Option<usize>,
    pct_drafted: Option<usize>,
    fpts: Option<usize>,
}

impl ExportColumns {
    fn from_headers(headers: &StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        Self {
            rank: find("Rank"),
            entry_name: find("EntryName"),
            points: find("Points"),
            lineup: find("Lineup"),
            player: find("Player"),
            roster_position: find("Roster Position"),
            pct_drafted: find("%Drafted"),
            fpts: find("FPTS"),
        }
    }
}

fn cell(record: &StringRecord, column: Option<usize>) -> &str {
    column
        .and_then(|i| record.get(i))
        .map(str::trim)
        .unwrap_or_default()
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Turns raw results exports into [`ContestResults`].
#[derive(Debug, Clone, Default)]
pub struct ResultRecordBuilder {
    parser: LineupParser,
}

impl ResultRecordBuilder {
    pub fn new(parser: LineupParser) -> Self {
        Self { parser }
    }

    pub fn build_from_reader<R: Read>(
        &self,
        contest_id: &ContestId,
        rdr: R,
    ) -> Result<ContestResults, csv::Error> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let columns = ExportColumns::from_headers(reader.headers()?);

        let mut results = ContestResults {
            contest_id: contest_id.clone(),
            entries: Vec::new(),
            positions: Vec::new(),
            most_picked: Vec::new(),
            skipped_rows: 0,
        };

        for record in reader.records() {
            let record = record?;
            self.push_standing(&mut results, &record, &columns);
            push_most_picked(&mut results, &record, &columns);
        }

        debug!(
            "contest {contest_id}: {} entries, {} most-picked players, {} skipped",
            results.entries.len(),
            results.most_picked.len(),
            results.skipped_rows
        );
        Ok(results)
    }

    fn push_standing(&self, results: &mut ContestResults, record: &StringRecord, columns: &ExportColumns) {
        let entry_name = cell(record, columns.entry_name);
        if entry_name.is_empty() {
            return;
        }

        let lineup = match self.parser.parse(cell(record, columns.lineup)) {
            Ok(lineup) => lineup,
            Err(e) => {
                warn!("contest {}: skipping row: {e}", results.contest_id);
                results.skipped_rows += 1;
                return;
            }
        };

        for position in lineup.positions() {
            if !results.positions.iter().any(|p| p == position) {
                results.positions.push(position.to_string());
            }
        }

        let name = parse_entry_name(entry_name);
        results.entries.push(ResultEntry {
            contest_id: results.contest_id.clone(),
            rank: cell(record, columns.rank).parse().ok(),
            nickname: name.nickname,
            entry_number: name.entry_number,
            entries_total: name.entries_total,
            points: parse_float(cell(record, columns.points)),
            lineup,
        });
    }
}

fn push_most_picked(results: &mut ContestResults, record: &StringRecord, columns: &ExportColumns) {
    let player = cell(record, columns.player);
    let position = cell(record, columns.roster_position);
    let pct = cell(record, columns.pct_drafted);
    let fpts = cell(record, columns.fpts);
    if player.is_empty() && position.is_empty() && pct.is_empty() && fpts.is_empty() {
        return;
    }

    results.most_picked.push(MostPickedPlayer {
        player: player.to_string(),
        position: position.to_string(),
        pct_drafted: parse_float(pct),
        points: parse_float(fpts),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Rank,EntryId,EntryName,TimeRemaining,Points,Lineup,,Player,Roster Position,%Drafted,FPTS
1,111,player1 (2/5),0,301.25,PG John Smith SG Jane Doe,,John Smith,PG,45.67%,55.5
2,112,soloplayer,0,280.5,SG Jane Doe C Big Man,,Jane Doe,SG,30%,41
3,113,player1 (1/5),0,250,PG John Smith C Big Man,,,,,
";

    fn build(input: &str) -> ContestResults {
        ResultRecordBuilder::default()
            .build_from_reader(&ContestId::from("87654321"), input.as_bytes())
            .unwrap()
    }

    fn write_results(results: &ContestResults) -> String {
        let mut buf = Vec::new();
        results.write_results(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // -- Building --

    #[test]
    fn builds_standings() {
        let results = build(EXPORT);
        assert_eq!(results.entries.len(), 3);

        let first = &results.entries[0];
        assert_eq!(first.rank, Some(1));
        assert_eq!(first.nickname, "player1");
        assert_eq!(first.entry_number, 2);
        assert_eq!(first.entries_total, 5);
        assert_eq!(first.points, Some(301.25));
        assert_eq!(first.lineup.get("SG"), Some("Jane Doe"));
    }

    #[test]
    fn positions_in_first_seen_order() {
        let results = build(EXPORT);
        assert_eq!(results.positions, vec!["PG", "SG", "C"]);
    }

    #[test]
    fn most_picked_drops_empty_rows_and_strips_percent() {
        let results = build(EXPORT);
        assert_eq!(results.most_picked.len(), 2);
        assert_eq!(results.most_picked[0].player, "John Smith");
        assert_eq!(results.most_picked[0].position, "PG");
        assert_eq!(results.most_picked[0].pct_drafted, Some(45.67));
        assert_eq!(results.most_picked[1].points, Some(41.0));
    }

    #[test]
    fn most_picked_rows_longer_than_standings() {
        let input = "\
Rank,EntryId,EntryName,TimeRemaining,Points,Lineup,,Player,Roster Position,%Drafted,FPTS
1,111,soloplayer,0,99,PG John Smith,,John Smith,PG,80%,40
,,,,,,,Jane Doe,SG,12.5%,20
";
        let results = build(input);
        assert_eq!(results.entries.len(), 1);
        assert_eq!(results.most_picked.len(), 2);
        assert_eq!(results.most_picked[1].pct_drafted, Some(12.5));
    }

    #[test]
    fn malformed_lineup_row_is_skipped() {
        let input = "\
Rank,EntryId,EntryName,TimeRemaining,Points,Lineup
1,111,good,0,99,PG John Smith
2,112,bad,0,98,John Smith PG Someone
";
        let results = build(input);
        assert_eq!(results.entries.len(), 1);
        assert_eq!(results.skipped_rows, 1);
        assert_eq!(results.entries[0].nickname, "good");
    }

    #[test]
    fn standalone_most_picked_export() {
        let input = "\
Player,Roster Position,%Drafted,FPTS
John Smith,PG,45.67%,55.5
";
        let results = build(input);
        assert!(results.entries.is_empty());
        assert_eq!(results.most_picked.len(), 1);
    }

    // -- Writing --

    #[test]
    fn results_table_layout() {
        let out = write_results(&build(EXPORT));
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("rank,points,nickname,entries,entry_nb,PG,SG,C"));
        assert_eq!(
            lines.next(),
            Some("1,301.25,player1,5,2,John Smith,Jane Doe,")
        );
        assert_eq!(lines.next(), Some("2,280.5,soloplayer,1,1,,Jane Doe,Big Man"));
    }

    #[test]
    fn most_picked_table_layout() {
        let results = build(EXPORT);
        let mut buf = Vec::new();
        results.write_most_picked(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("player,position,pct_drafted,points"));
        assert_eq!(lines.next(), Some("John Smith,PG,45.67,55.5"));
    }

    // -- File names --

    #[test]
    fn export_names() {
        assert_eq!(
            classify_export("87654321_results.csv"),
            Some((ContestId::from("87654321"), ExportKind::Standings))
        );
        assert_eq!(
            contest_id_from_export_name("contest-standings-87654321.csv"),
            Some(ContestId::from("87654321"))
        );
        assert_eq!(
            classify_export("87654321_most_picked_players.csv"),
            Some((ContestId::from("87654321"), ExportKind::MostPicked))
        );
        assert_eq!(classify_export("notes.csv"), None);
        assert_eq!(classify_export("abc_results.csv"), None);
    }
}
