// Entrant badges from the contest lobby. Each table cell holds a handful of
// spans: the username, an experience badge (`experienced-user-3`) and, for
// multi-entry players, an entry-count badge (`bdg` class, title "3 entries").

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One `<span>` as dumped by the scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSpan {
    pub class: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// One entrant of a contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrantRecord {
    pub nickname: String,
    pub entries: u32,
    pub experience: u8,
}

impl EntrantRecord {
    /// Build an entrant from one cell's spans. Cells whose nickname is one
    /// character or shorter are not entrants.
    pub fn from_spans(spans: &[RawSpan]) -> Option<Self> {
        let mut nickname = String::new();
        let mut entries = 1;
        let mut experience = 0;

        for span in spans {
            let class = span.class.trim();
            let title = span.title.as_deref().unwrap_or_default();

            if class == "entrant-username" {
                nickname = title.trim().to_string();
            }
            if class.contains("experienced") {
                experience = class
                    .chars()
                    .last()
                    .and_then(|c| c.to_digit(10))
                    .and_then(|d| u8::try_from(d).ok())
                    .unwrap_or(0);
            }
            if class.contains("bdg") {
                entries = title
                    .split_whitespace()
                    .next()
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(1);
            }
        }

        if nickname.chars().count() > 1 {
            Some(Self {
                nickname,
                entries,
                experience,
            })
        } else {
            None
        }
    }
}

/// Entrants of every cell, in table order.
pub fn entrants_from_cells(cells: &[Vec<RawSpan>]) -> Vec<EntrantRecord> {
    let entrants: Vec<EntrantRecord> = cells
        .iter()
        .filter_map(|spans| EntrantRecord::from_spans(spans))
        .collect();
    debug!("{} entrants out of {} cells", entrants.len(), cells.len());
    entrants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(class: &str, title: Option<&str>) -> RawSpan {
        RawSpan {
            class: class.to_string(),
            title: title.map(str::to_string),
        }
    }

    #[test]
    fn full_badges() {
        let entrant = EntrantRecord::from_spans(&[
            span("entrant-username", Some("hoopsfan")),
            span("icon experienced-user-4", None),
            span("bdg bdg-entries", Some("3 entries")),
        ])
        .unwrap();
        assert_eq!(entrant.nickname, "hoopsfan");
        assert_eq!(entrant.experience, 4);
        assert_eq!(entrant.entries, 3);
    }

    #[test]
    fn defaults_without_badges() {
        let entrant = EntrantRecord::from_spans(&[span("entrant-username", Some("rookie"))]).unwrap();
        assert_eq!(entrant.entries, 1);
        assert_eq!(entrant.experience, 0);
    }

    #[test]
    fn short_nickname_is_dropped() {
        assert_eq!(EntrantRecord::from_spans(&[span("entrant-username", Some("x"))]), None);
        assert_eq!(EntrantRecord::from_spans(&[span("bdg", Some("2 entries"))]), None);
    }

    #[test]
    fn cells_keep_table_order() {
        let cells = vec![
            vec![span("entrant-username", Some("alpha"))],
            vec![span("entrant-username", Some(""))],
            vec![span("entrant-username", Some("beta"))],
        ];
        let names: Vec<String> = entrants_from_cells(&cells)
            .into_iter()
            .map(|e| e.nickname)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }
}
