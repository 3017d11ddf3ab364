// Lineup strings from the results export, e.g.
// "C Nikola Jokic F LeBron James G Stephen Curry UTIL Joel Embiid".

use std::collections::HashSet;

use crate::error::{LedgerError, Result};

/// Roster slot labels for NBA classic and showdown contests.
pub const NBA_POSITIONS: &[&str] = &[
    "SF", "C", "P", "SG", "PG", "G", "CPT", "UTIL", "PF", "F", "T1", "T2", "T3", "T4", "T5", "T6",
];

/// Position label to player name, in lineup order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineup {
    slots: Vec<(String, String)>,
}

impl Lineup {
    pub fn get(&self, position: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|(p, _)| p == position)
            .map(|(_, player)| player.as_str())
    }

    pub fn positions(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(p, _)| p.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.slots.iter().map(|(p, player)| (p.as_str(), player.as_str()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// A repeated label gets a numbered key (`UTIL`, `UTIL_2`, ...).
    fn push(&mut self, position: &str, player: String) {
        if position.is_empty() {
            return;
        }
        let mut key = position.to_string();
        let mut n = 1;
        while self.slots.iter().any(|(p, _)| *p == key) {
            n += 1;
            key = format!("{position}_{n}");
        }
        self.slots.push((key, player));
    }
}

/// Splits a lineup string on a closed vocabulary of position labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineupParser {
    positions: HashSet<String>,
}

impl Default for LineupParser {
    fn default() -> Self {
        Self::new(NBA_POSITIONS.iter().copied())
    }
}

impl LineupParser {
    pub fn new<I, S>(positions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positions: positions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_position(&self, token: &str) -> bool {
        self.positions.contains(token)
    }

    /// Parse one lineup string.
    ///
    /// Every position token closes the previous slot and opens a new one;
    /// the player name is the remaining tokens joined by single spaces. A
    /// position followed directly by another position keeps an empty name.
    pub fn parse(&self, raw: &str) -> Result<Lineup> {
        let mut lineup = Lineup::default();
        let mut tokens = raw.split_whitespace();

        let Some(first) = tokens.next() else {
            return Ok(lineup);
        };
        if !self.is_position(first) {
            return Err(LedgerError::MalformedLineupRow {
                token: first.to_string(),
                lineup: raw.to_string(),
            });
        }

        let mut position = first;
        let mut buffer: Vec<&str> = Vec::new();
        for token in tokens {
            if self.is_position(token) {
                lineup.push(position, buffer.join(" "));
                buffer.clear();
                position = token;
            } else {
                buffer.push(token);
            }
        }
        lineup.push(position, buffer.join(" "));

        Ok(lineup)
    }
}
