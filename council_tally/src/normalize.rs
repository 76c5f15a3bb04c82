//! Canonicalization of the messy identifiers shared by the two sources:
//! voter names, agenda item numbers, and raw vote tokens.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use crate::config::VoteValue;

/// Authored mapping of known misspellings and spacing variants to canonical
/// names. This is maintained data, not inference: a variant missing from
/// this table creates a new member identity and is flagged in the build
/// report so an operator can extend the table.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("Adam  Bazaldua", "Adam Bazaldua"),
    ("Adam  Medrano", "Adam Medrano"),
    ("B. Adam McGough", "Adam McGough"),
    ("Carolyn Arnold", "Carolyn King Arnold"),
    ("Carolyn King  Arnold", "Carolyn King Arnold"),
    ("Gay Donnel Willis", "Gay Donnell Willis"),
    ("Jaynie Schultz", "Jaynie Shultz"),
    ("Jennifer S.  Gates", "Jennifer S. Gates"),
    ("Jesse  Moreno", "Jesse Moreno"),
    ("Tennel Atkins", "Tennell Atkins"),
    ("Tennell  Atkins", "Tennell Atkins"),
    ("Zarin D. Gracey", "Zarin Gracey"),
];

/// Short-name overrides for members where the last word is not the surname.
const SHORT_NAME_OVERRIDES: &[(&str, &str)] = &[("Casey Thomas II", "Thomas")];

/// The variant-to-canonical alias table, loaded once per build.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AliasTable {
    map: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn builtin() -> AliasTable {
        AliasTable {
            map: BUILTIN_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// The built-in table with operator-supplied pairs merged on top.
    /// Operator entries win on conflict.
    pub fn with_extra(pairs: &[(String, String)]) -> AliasTable {
        let mut table = AliasTable::builtin();
        for (variant, canonical) in pairs {
            table.map.insert(variant.clone(), canonical.clone());
        }
        table
    }

    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.map.get(raw).map(|s| s.as_str())
    }

    fn canonical_names(&self) -> BTreeSet<String> {
        self.map.values().cloned().collect()
    }
}

/// Collapses interior whitespace runs to single spaces and trims the ends.
pub fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Resolves raw voter-name strings to canonical names and keeps the
/// distinct-name registry for the build report.
///
/// Resolution order: exact alias lookup on the trimmed string, then
/// whitespace collapsing, then a second alias lookup. A name that resolves
/// through neither is returned collapsed and flagged as a new variant.
/// This never errors.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    aliases: AliasTable,
    known_canonicals: BTreeSet<String>,
    /// canonical name -> raw variants observed for it
    seen: BTreeMap<String, BTreeSet<String>>,
    unknown: BTreeSet<String>,
}

impl NameNormalizer {
    pub fn new(aliases: AliasTable) -> NameNormalizer {
        let known_canonicals = aliases.canonical_names();
        NameNormalizer {
            aliases,
            known_canonicals,
            seen: BTreeMap::new(),
            unknown: BTreeSet::new(),
        }
    }

    pub fn normalize(&mut self, raw: &str) -> String {
        let trimmed = raw.trim();
        let canonical = if let Some(c) = self.aliases.lookup(trimmed) {
            c.to_string()
        } else {
            let collapsed = collapse_spaces(trimmed);
            match self.aliases.lookup(&collapsed) {
                Some(c) => c.to_string(),
                None => {
                    if !collapsed.is_empty()
                        && !self.known_canonicals.contains(&collapsed)
                        && self.unknown.insert(collapsed.clone())
                    {
                        warn!(
                            "normalize: unmapped name variant {:?}, add it to the alias table if it is a known member",
                            collapsed
                        );
                    }
                    collapsed
                }
            }
        };
        if !canonical.is_empty() {
            self.seen
                .entry(canonical.clone())
                .or_default()
                .insert(trimmed.to_string());
        }
        canonical
    }

    /// Distinct canonical names observed so far.
    pub fn distinct_names(&self) -> usize {
        self.seen.len()
    }

    pub fn variants_of(&self, canonical: &str) -> Vec<String> {
        self.seen
            .get(canonical)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names that resolved through neither the alias table nor a known
    /// canonical, for operator review.
    pub fn unknown_variants(&self) -> Vec<String> {
        self.unknown.iter().cloned().collect()
    }
}

/// Short display name: the last word of the canonical name, unless an
/// authored override applies.
pub fn short_name(full: &str) -> String {
    for (name, short) in SHORT_NAME_OVERRIDES {
        if full == *name {
            return short.to_string();
        }
    }
    full.split_whitespace()
        .last()
        .unwrap_or_default()
        .to_string()
}

/// Normalizes an agenda item number for cross-source matching. The calendar
/// source writes trailing periods ("62."), the vote source plain numbers
/// ("62"); all-digit values also lose leading zeros. Non-numeric numbers
/// ("Z15") keep their prefix and never collide with plain numerics.
pub fn normalize_agenda_number(raw: &str) -> String {
    let cleaned = raw.trim().trim_end_matches('.');
    if !cleaned.is_empty() && cleaned.chars().all(|c| c.is_ascii_digit()) {
        let stripped = cleaned.trim_start_matches('0');
        if stripped.is_empty() {
            return "0".to_string();
        }
        return stripped.to_string();
    }
    cleaned.to_string()
}

/// Maps one raw vote token to its normalized value. The table is closed;
/// anything outside it is `Unknown`, never a guessed vote.
pub fn map_vote_token(raw: &str) -> VoteValue {
    let token = raw.trim().to_uppercase();
    match token.as_str() {
        "" => VoteValue::Empty,
        "N/A" => VoteValue::NotApplicable,
        "YES" => VoteValue::Aye,
        "NO" => VoteValue::Nay,
        "AWVT" => VoteValue::Absent,
        "ABSNT" => VoteValue::Absent,
        "ABSNT_CB" => VoteValue::Absent,
        "ABST" => VoteValue::Abstain,
        _ => VoteValue::Unknown,
    }
}
