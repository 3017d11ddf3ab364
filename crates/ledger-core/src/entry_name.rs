// Entry names in the results export: "nickname (2/5)" for the second of five
// entries a player submitted, or just "nickname" for a single entry.

/// Nickname plus entry multiplicity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryName {
    pub nickname: String,
    pub entry_number: u32,
    pub entries_total: u32,
}

/// Parse an entry name. Anything other than exactly two tokens, or a second
/// token not shaped like `(a/b)`, counts as a single entry.
pub fn parse_entry_name(raw: &str) -> EntryName {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let nickname = tokens.first().copied().unwrap_or_default().to_string();

    let (entry_number, entries_total) = match tokens.as_slice() {
        [_, counts] => parse_counts(counts).unwrap_or((1, 1)),
        _ => (1, 1),
    };

    EntryName {
        nickname,
        entry_number,
        entries_total,
    }
}

fn parse_counts(token: &str) -> Option<(u32, u32)> {
    let inner = token.strip_prefix('(')?.strip_suffix(')')?;
    let (a, b) = inner.split_once('/')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_entry_name() {
        let name = parse_entry_name("player1 (2/5)");
        assert_eq!(name.nickname, "player1");
        assert_eq!(name.entry_number, 2);
        assert_eq!(name.entries_total, 5);
    }

    #[test]
    fn single_entry_name() {
        let name = parse_entry_name("soloplayer");
        assert_eq!(name.nickname, "soloplayer");
        assert_eq!((name.entry_number, name.entries_total), (1, 1));
    }

    #[test]
    fn malformed_counts_fall_back_to_single() {
        let name = parse_entry_name("player1 (x/5)");
        assert_eq!(name.nickname, "player1");
        assert_eq!((name.entry_number, name.entries_total), (1, 1));
    }

    #[test]
    fn three_tokens_fall_back_to_single() {
        let name = parse_entry_name("some player (2/5)");
        assert_eq!(name.nickname, "some");
        assert_eq!((name.entry_number, name.entries_total), (1, 1));
    }

    #[test]
    fn empty_name() {
        let name = parse_entry_name("");
        assert_eq!(name.nickname, "");
        assert_eq!(name.entry_number, 1);
    }
}
