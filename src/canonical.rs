use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use crate::error::AliasError;

pub const MAX_ALIAS_DEPTH: usize = 64;

const ZERO_WIDTH: [char; 7] = [
    '\u{200b}', '\u{200c}', '\u{200d}', '\u{200e}', '\u{200f}', '\u{2060}', '\u{feff}',
];

/// Cyrillic letters that are routinely typed in place of Latin ones.
const HOMOGLYPHS: [(char, char); 28] = [
    ('А', 'A'),
    ('В', 'B'),
    ('Е', 'E'),
    ('К', 'K'),
    ('М', 'M'),
    ('Н', 'H'),
    ('О', 'O'),
    ('Р', 'P'),
    ('С', 'S'),
    ('Т', 'T'),
    ('Х', 'X'),
    ('І', 'I'),
    ('Ј', 'J'),
    ('У', 'Y'),
    ('а', 'a'),
    ('е', 'e'),
    ('о', 'o'),
    ('р', 'p'),
    ('с', 's'),
    ('х', 'x'),
    ('у', 'y'),
    ('к', 'k'),
    ('м', 'm'),
    ('т', 't'),
    ('н', 'h'),
    ('і', 'i'),
    ('ј', 'j'),
    ('ѵ', 'y'),
];

/// Maps a display name to the key used for every comparison in a run.
///
/// NFKC first, so composed and decomposed accents, ligatures and full-width
/// forms agree. Then zero-width marks are dropped, Cyrillic lookalikes mapped
/// to Latin, and the result lowercased with its whitespace collapsed.
pub fn canonicalize(name: &str) -> String {
    let folded: String = name
        .nfkc()
        .filter(|c| !ZERO_WIDTH.contains(c))
        .map(|c| {
            HOMOGLYPHS
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect();
    folded
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical alias -> canonical target, resolved to the final representative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    resolved: BTreeMap<String, String>,
}

impl AliasMap {
    /// Builds the map from `(from, to)` pairs in file order. Both sides are
    /// canonicalized; the first row for a source wins and self-maps are ignored.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, AliasError>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut raw: BTreeMap<String, String> = BTreeMap::new();
        for (from, to) in pairs {
            let from = canonicalize(from.as_ref());
            let to = canonicalize(to.as_ref());
            if from.is_empty() || to.is_empty() || from == to {
                continue;
            }
            raw.entry(from).or_insert(to);
        }
        Self::resolve(&raw, MAX_ALIAS_DEPTH)
    }

    fn resolve(raw: &BTreeMap<String, String>, max_depth: usize) -> Result<Self, AliasError> {
        let mut resolved = BTreeMap::new();
        for source in raw.keys() {
            let mut current = source;
            let mut seen = BTreeSet::from([source]);
            let mut steps = 0;
            while let Some(target) = raw.get(current) {
                if !seen.insert(target) {
                    return Err(AliasError::Cycle {
                        start: source.clone(),
                    });
                }
                steps += 1;
                if steps > max_depth {
                    return Err(AliasError::TooDeep {
                        start: source.clone(),
                        max_depth,
                    });
                }
                current = target;
            }
            if current != source {
                resolved.insert(source.clone(), current.clone());
            }
        }
        Ok(Self { resolved })
    }

    pub fn resolve_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.resolved.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Canonicalizes `name` and follows the alias chain.
    pub fn key_for(&self, name: &str) -> String {
        let key = canonicalize(name);
        self.resolve_key(&key).to_string()
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

/// Looser key for spotting likely renames: separators dropped, `0`/`1` read as `o`/`l`.
pub fn match_key(name: &str) -> String {
    canonicalize(name)
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .map(|c| match c {
            '0' => 'o',
            '1' => 'l',
            _ => c,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasSuggestion {
    pub display_name: String,
    pub player_key: String,
    pub history_key: String,
    pub reason: String,
}

/// Suggests alias rows for members without history whose name loosely
/// matches a different key that does have history. One suggestion per member.
pub fn alias_suggestions<'a>(
    members: impl IntoIterator<Item = (&'a str, &'a str)>,
    history_keys: &BTreeSet<String>,
) -> Vec<AliasSuggestion> {
    let mut by_match: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for key in history_keys {
        let loose = match_key(key);
        if !loose.is_empty() {
            by_match.entry(loose).or_default().insert(key.as_str());
        }
    }

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for (player_key, display_name) in members {
        if history_keys.contains(player_key) || !seen.insert(player_key) {
            continue;
        }
        let Some(matches) = by_match.get(&match_key(display_name)) else {
            continue;
        };
        if let Some(target) = matches.iter().find(|k| **k != player_key) {
            out.push(AliasSuggestion {
                display_name: display_name.to_string(),
                player_key: player_key.to_string(),
                history_key: target.to_string(),
                reason: "normalized match (space/case/dash, 0/o, 1/l)".to_string(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_zero_width_and_collapses_whitespace() {
        assert_eq!(canonicalize(" Zero\u{200b} Width   Name "), "zero width name");
    }

    #[test]
    fn folds_homoglyphs_and_width() {
        assert_eq!(canonicalize("M\u{0430}rio"), "mario");
        assert_eq!(canonicalize("ＡＢＣ\u{3000}Ｄ"), "abc d");
        assert_eq!(canonicalize("Evil   Activities"), "evil activities");
        assert_eq!(canonicalize("No\u{00a0}Break"), "no break");
    }

    #[test]
    fn accents_and_ligatures_share_one_key() {
        assert_eq!(canonicalize("Jose\u{301}"), canonicalize("José"));
        assert_eq!(canonicalize("José"), "jos\u{e9}");
        assert_eq!(canonicalize("\u{fb01}re"), "fire");
        assert_eq!(canonicalize("Ⅻ Legion"), "xii legion");
    }

    #[test]
    fn aliases_resolve_transitively() {
        let map = AliasMap::from_pairs([("Old Name", "Mid"), ("mid", "New Name"), ("old name", "ignored")])
            .unwrap();
        assert_eq!(map.key_for("OLD  name"), "new name");
        assert_eq!(map.key_for("Mid"), "new name");
        assert_eq!(map.key_for("stranger"), "stranger");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn alias_cycles_are_rejected() {
        let err = AliasMap::from_pairs([("a", "b"), ("b", "c"), ("c", "a")]).unwrap_err();
        assert!(matches!(err, AliasError::Cycle { .. }));
    }

    #[test]
    fn overly_long_chains_are_rejected() {
        let names: Vec<String> = (0..=MAX_ALIAS_DEPTH + 1).map(|i| format!("p{i}")).collect();
        let pairs = names.windows(2).map(|w| (w[0].clone(), w[1].clone()));
        let err = AliasMap::from_pairs(pairs).unwrap_err();
        assert!(matches!(err, AliasError::TooDeep { .. }));
    }

    #[test]
    fn suggests_loose_matches_for_members_without_history() {
        let history = BTreeSet::from(["dark-w0lf".to_string(), "known".to_string()]);
        let members = [("dark wolf", "Dark Wolf"), ("known", "Known"), ("nobody", "Nobody")];
        let out = alias_suggestions(members, &history);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].player_key, "dark wolf");
        assert_eq!(out[0].history_key, "dark-w0lf");
        assert_eq!(match_key("Dark_W0lf 1"), "darkwolfl");
    }
}
