//! Joins the two sources: per-member roll-call rows against agenda-item
//! rows, by date and normalized agenda number, with a text-similarity
//! fallback. Every vote group survives the join; groups with no acceptable
//! candidate are kept as vote-only results for synthetic items.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::config::{AgendaRow, RollCallRow};
use crate::normalize::normalize_agenda_number;

/// One agenda item's full roll call, grouped from per-member rows.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteGroup {
    pub date: String,
    pub raw_number: String,
    /// Normalized agenda number; may be empty for closed-session items.
    pub number: String,
    pub description: String,
    pub item_type: String,
    pub final_action: String,
    /// (raw voter name, raw vote token), in source order.
    pub ballots: Vec<(String, String)>,
}

/// Result of the join for one output item.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Correlated {
    /// A vote group matched an agenda row and inherits its metadata.
    Matched { agenda: usize, group: VoteGroup },
    /// An agenda row with no roll call (a non-voted item).
    AgendaOnly { agenda: usize },
    /// A vote group with no acceptable agenda row; becomes a synthetic item.
    VotesOnly { group: VoteGroup },
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Correlation {
    pub items: Vec<Correlated>,
    pub matched: usize,
    pub unmatched: usize,
}

/// Groups per-member rows into vote groups keyed by (date, normalized
/// number). Groups without a usable number key on the item description
/// instead, so distinct number-less roll calls on one date stay distinct.
/// The returned order is the key order, which makes the downstream
/// traversal deterministic.
pub fn group_roll_calls(rows: &[RollCallRow]) -> Vec<VoteGroup> {
    let mut groups: BTreeMap<(String, String, String), VoteGroup> = BTreeMap::new();
    for row in rows {
        let number = normalize_agenda_number(&row.item_number);
        let sub_key = if number.is_empty() {
            row.description.clone()
        } else {
            String::new()
        };
        let key = (row.date.clone(), number.clone(), sub_key);
        let group = groups.entry(key).or_insert_with(|| VoteGroup {
            date: row.date.clone(),
            raw_number: row.item_number.clone(),
            number,
            description: row.description.clone(),
            item_type: row.item_type.clone(),
            final_action: row.final_action.clone(),
            ballots: Vec::new(),
        });
        // First row wins the metadata; later rows only add ballots.
        if group.final_action.is_empty() {
            group.final_action = row.final_action.clone();
        }
        group
            .ballots
            .push((row.voter_name.clone(), row.vote.clone()));
    }
    groups.into_values().collect()
}

fn title_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Matches each vote group to at most one agenda row. Exact normalized
/// number first; otherwise the most similar same-date title, accepted only
/// strictly above `threshold`. A claimed agenda row leaves the candidate
/// pool, so two groups can never share a row.
pub fn correlate(agenda: &[AgendaRow], groups: Vec<VoteGroup>, threshold: f64) -> Correlation {
    // First occurrence wins when two agenda rows share a key.
    let mut by_key: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut by_date: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, row) in agenda.iter().enumerate() {
        let number = normalize_agenda_number(&row.agenda_number);
        if !number.is_empty() {
            by_key.entry((row.date.clone(), number)).or_insert(idx);
        }
        by_date.entry(row.date.clone()).or_default().push(idx);
    }

    let mut claimed: Vec<Option<VoteGroup>> = vec![None; agenda.len()];
    let mut votes_only: Vec<VoteGroup> = Vec::new();
    let mut matched = 0usize;

    for group in groups {
        let exact = if group.number.is_empty() {
            None
        } else {
            by_key
                .get(&(group.date.clone(), group.number.clone()))
                .copied()
                .filter(|idx| claimed[*idx].is_none())
        };
        if let Some(idx) = exact {
            claimed[idx] = Some(group);
            matched += 1;
            continue;
        }

        // Fallback: best title similarity among unclaimed same-date rows.
        let mut best: Option<(usize, f64)> = None;
        if let Some(candidates) = by_date.get(&group.date) {
            for &idx in candidates {
                if claimed[idx].is_some() {
                    continue;
                }
                let score = title_similarity(&group.description, &agenda[idx].title);
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((idx, score));
                }
            }
        }
        match best {
            Some((idx, score)) if score > threshold => {
                debug!(
                    "correlate: similarity match {:.3} for {:?} item {:?}",
                    score, group.date, group.raw_number
                );
                claimed[idx] = Some(group);
                matched += 1;
            }
            _ => {
                debug!(
                    "correlate: no agenda row for {:?} item {:?}, keeping as synthetic",
                    group.date, group.raw_number
                );
                votes_only.push(group);
            }
        }
    }

    let unmatched = votes_only.len();
    let mut items: Vec<Correlated> = Vec::with_capacity(agenda.len() + unmatched);
    for (idx, slot) in claimed.into_iter().enumerate() {
        match slot {
            Some(group) => items.push(Correlated::Matched { agenda: idx, group }),
            None => items.push(Correlated::AgendaOnly { agenda: idx }),
        }
    }
    for group in votes_only {
        items.push(Correlated::VotesOnly { group });
    }

    info!(
        "correlate: {} groups matched, {} unmatched across {} agenda rows",
        matched,
        unmatched,
        agenda.len()
    );
    Correlation {
        items,
        matched,
        unmatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roll(date: &str, number: &str, desc: &str, voter: &str, vote: &str) -> RollCallRow {
        RollCallRow {
            date: date.to_string(),
            item_number: number.to_string(),
            description: desc.to_string(),
            item_type: String::new(),
            final_action: "APPROVED".to_string(),
            voter_name: voter.to_string(),
            vote: vote.to_string(),
        }
    }

    fn agenda_row(date: &str, number: &str, title: &str) -> AgendaRow {
        AgendaRow {
            date: date.to_string(),
            agenda_number: number.to_string(),
            title: title.to_string(),
            ..AgendaRow::default()
        }
    }

    #[test]
    fn rows_group_into_one_roll_call() {
        let rows = vec![
            roll("2025-04-09", "62", "A contract", "A", "YES"),
            roll("2025-04-09", "62", "A contract", "B", "NO"),
            roll("2025-04-09", "63", "Another", "A", "YES"),
        ];
        let groups = group_roll_calls(&rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].number, "62");
        assert_eq!(groups[0].ballots.len(), 2);
    }

    #[test]
    fn numberless_groups_split_by_description() {
        let rows = vec![
            roll("2025-04-09", "", "Closed session A", "A", "YES"),
            roll("2025-04-09", "", "Closed session B", "A", "YES"),
        ];
        let groups = group_roll_calls(&rows);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn trailing_period_and_leading_zero_match_exactly() {
        let agenda = vec![agenda_row("2025-04-09", "62.", "A contract")];
        let groups = group_roll_calls(&[roll("2025-04-09", "062", "A contract", "A", "YES")]);
        let corr = correlate(&agenda, groups, 0.85);
        assert_eq!(corr.matched, 1);
        assert!(matches!(corr.items[0], Correlated::Matched { agenda: 0, .. }));
    }

    #[test]
    fn prefixed_number_does_not_match_numeric() {
        let agenda = vec![agenda_row("2025-04-09", "15.", "A plat correction downtown")];
        let groups = group_roll_calls(&[roll(
            "2025-04-09",
            "Z15",
            "An unrelated zoning roll call",
            "A",
            "YES",
        )]);
        let corr = correlate(&agenda, groups, 0.85);
        assert_eq!(corr.matched, 0);
        assert_eq!(corr.unmatched, 1);
    }

    #[test]
    fn similarity_fallback_accepts_close_titles_only() {
        // Same date, number missing on the agenda side; titles differ by a typo.
        let agenda = vec![agenda_row(
            "2025-04-09",
            "",
            "Authorize a three-year service contract for fleet maintenance",
        )];
        let groups = group_roll_calls(&[roll(
            "2025-04-09",
            "44",
            "Authorize a three-year service contract for fleet maintenence",
            "A",
            "YES",
        )]);
        let corr = correlate(&agenda, groups, 0.85);
        assert_eq!(corr.matched, 1);

        let groups = group_roll_calls(&[roll(
            "2025-04-09",
            "44",
            "A completely different closed-session matter",
            "A",
            "YES",
        )]);
        let corr = correlate(&agenda, groups, 0.85);
        assert_eq!(corr.matched, 0);
        assert_eq!(corr.unmatched, 1);
    }

    #[test]
    fn a_claimed_row_leaves_the_pool() {
        let agenda = vec![agenda_row("2025-04-09", "62.", "A contract")];
        let rows = vec![
            roll("2025-04-09", "62", "A contract", "A", "YES"),
            roll("2025-04-09", "62x", "A contract", "A", "YES"),
        ];
        let corr = correlate(&agenda, group_roll_calls(&rows), 0.85);
        // The exact match claims the row; the near-duplicate group cannot
        // take it again and stays synthetic.
        assert_eq!(corr.matched, 1);
        assert_eq!(corr.unmatched, 1);
    }

    #[test]
    fn no_group_is_ever_dropped() {
        let agenda = vec![agenda_row("2025-04-09", "1.", "Item one")];
        let rows = vec![
            roll("2025-04-09", "1", "Item one", "A", "YES"),
            roll("2025-04-09", "99", "No counterpart here", "A", "NO"),
            roll("2025-05-01", "1", "Different date entirely", "A", "YES"),
        ];
        let corr = correlate(&agenda, group_roll_calls(&rows), 0.85);
        let synthetic = corr
            .items
            .iter()
            .filter(|i| matches!(i, Correlated::VotesOnly { .. }))
            .count();
        assert_eq!(corr.matched, 1);
        assert_eq!(synthetic, 2);
        assert_eq!(corr.items.len(), 3);
    }
}
