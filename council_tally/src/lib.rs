mod config;
pub mod classify;
pub mod correlate;
pub mod manual;
pub mod normalize;

use log::{debug, info};

use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use crate::config::*;

use crate::classify::{classify_non_voted, classify_section, classify_topics, derive_outcome};
use crate::correlate::{correlate, group_roll_calls, Correlated, VoteGroup};
use crate::normalize::{map_vote_token, short_name, AliasTable, NameNormalizer};

// **** Private structures ****

/// Roster data for one canonical name, merged across Persons files.
#[derive(Debug, Clone, Default)]
struct RosterEntry {
    district: Option<u32>,
    titles: BTreeSet<String>,
    first_seen: String,
    last_seen: String,
    raw_names: BTreeSet<String>,
    periods: BTreeSet<String>,
}

/// One output item before identifiers are assigned: the union of an agenda
/// row and/or its vote group.
#[derive(Debug, Clone)]
struct ItemDraft {
    date: String,
    body: String,
    event_id: String,
    location: String,
    item_id: String,
    raw_number: String,
    sequence: Option<u32>,
    title: String,
    matter: MatterInfo,
    passed: Option<bool>,
    final_action: String,
    agenda_info: String,
    links: DocumentLinks,
    group: Option<VoteGroup>,
    synthetic: bool,
}

/// Runs the full correlation and aggregation pass over one build's input.
///
/// Arguments:
/// * `agenda` the agenda-item rows from the legislative calendar source
/// * `roll_calls` the per-member vote rows from the open-data source
/// * `persons` the roster rows, tagged with their file's period label
/// * `options` threshold, current-member rule and extra aliases
///
/// Identifiers are assigned from 1 in a deterministic traversal, so the
/// same input always produces the same result.
pub fn run_council_tally(
    agenda: &[AgendaRow],
    roll_calls: &[RollCallRow],
    persons: &[PersonRow],
    options: &TallyOptions,
) -> Result<TallyResult, TallyErrors> {
    if agenda.is_empty() && roll_calls.is_empty() {
        return Err(TallyErrors::EmptyInput);
    }
    if !(0.0..=1.0).contains(&options.match_threshold) {
        return Err(TallyErrors::InvalidThreshold);
    }
    info!(
        "Processing {} agenda rows, {} roll-call rows, {} roster rows",
        agenda.len(),
        roll_calls.len(),
        persons.len()
    );

    let mut normalizer = NameNormalizer::new(AliasTable::with_extra(&options.extra_aliases));

    // Roster first, so every later name lookup resolves through the same
    // normalizer state.
    let roster = build_roster(persons, &mut normalizer);
    let current = current_members(&roster, options.current_rule);
    let member_ids = assign_member_ids(&roster);
    for (name, mid) in member_ids.iter() {
        debug!("Member: {}: {}", mid.0, name);
    }

    let groups = group_roll_calls(roll_calls);
    info!("Grouped {} roll calls", groups.len());
    let correlation = correlate(agenda, groups, options.match_threshold);

    let mut drafts: Vec<ItemDraft> = correlation
        .items
        .iter()
        .map(|c| make_draft(agenda, c))
        .collect();

    // Meetings: one per (date, body), identifiers ascending by date with
    // ties broken by first appearance in input order.
    let mut meeting_first: BTreeMap<(String, String), usize> = BTreeMap::new();
    for (pos, draft) in drafts.iter().enumerate() {
        meeting_first
            .entry((draft.date.clone(), draft.body.clone()))
            .or_insert(pos);
    }
    let mut meeting_keys: Vec<((String, String), usize)> = meeting_first
        .iter()
        .map(|(key, &pos)| (key.clone(), pos))
        .collect();
    meeting_keys.sort_by_key(|(key, pos)| (key.0.clone(), *pos));
    let mut meeting_index: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut meetings: Vec<MeetingRecord> = Vec::new();
    for (key, _) in meeting_keys {
        let idx = meetings.len();
        meetings.push(MeetingRecord {
            id: MeetingId(idx as u32 + 1),
            event_id: String::new(),
            date: key.0.clone(),
            body: key.1.clone(),
            location: String::new(),
            links: DocumentLinks::default(),
        });
        meeting_index.insert(key, idx);
    }
    // The first non-empty value wins for every meeting-level field.
    for draft in &drafts {
        let idx = meeting_index[&(draft.date.clone(), draft.body.clone())];
        merge_meeting_fields(&mut meetings[idx], draft);
    }

    drafts.sort_by(|a, b| {
        (a.date.as_str(), a.sequence.unwrap_or(0), a.raw_number.as_str()).cmp(&(
            b.date.as_str(),
            b.sequence.unwrap_or(0),
            b.raw_number.as_str(),
        ))
    });
    let draft_meeting: Vec<usize> = drafts
        .iter()
        .map(|d| meeting_index[&(d.date.clone(), d.body.clone())])
        .collect();

    // Item and vote identifiers: meetings in id order, items within a
    // meeting in sequence order, one global counter each.
    let mut order: Vec<usize> = (0..drafts.len()).collect();
    order.sort_by(|&a, &b| {
        (
            draft_meeting[a],
            drafts[a].sequence.unwrap_or(0),
            drafts[a].raw_number.as_str(),
        )
            .cmp(&(
                draft_meeting[b],
                drafts[b].sequence.unwrap_or(0),
                drafts[b].raw_number.as_str(),
            ))
    });

    let mut items: Vec<AgendaItemRecord> = Vec::with_capacity(drafts.len());
    let mut votes: Vec<VoteRecord> = Vec::new();
    let mut unknown_tokens: BTreeSet<String> = BTreeSet::new();
    let mut unrostered: BTreeSet<String> = BTreeSet::new();
    let mut positions: HashMap<usize, u32> = HashMap::new();

    for &draft_idx in &order {
        let draft = &drafts[draft_idx];
        let meeting = &meetings[draft_meeting[draft_idx]];
        let position = positions.entry(draft_meeting[draft_idx]).or_insert(0);
        let sequence = draft.sequence.unwrap_or(*position);
        *position += 1;

        let item_id = ItemId(items.len() as u32 + 1);
        let number = display_number(&draft.raw_number, sequence);

        let (vote_id, outcome, non_voted) = match &draft.group {
            Some(group) => {
                let id = VoteId(votes.len() as u32 + 1);
                let outcome =
                    derive_outcome(draft.passed, &draft.final_action, &draft.matter.status);
                votes.push(build_vote_record(
                    id,
                    item_id,
                    meeting.id,
                    &draft.date,
                    outcome,
                    group,
                    &member_ids,
                    &mut normalizer,
                    &mut unknown_tokens,
                    &mut unrostered,
                ));
                (Some(id), outcome, None)
            }
            None => (
                None,
                ItemOutcome::NoVote,
                Some(classify_non_voted(
                    &draft.title,
                    &draft.matter.kind,
                    &draft.matter.status,
                    &draft.final_action,
                )),
            ),
        };

        items.push(AgendaItemRecord {
            id: item_id,
            meeting: meeting.id,
            date: draft.date.clone(),
            number,
            sequence,
            title: draft.title.clone(),
            description: draft.matter.title.clone(),
            matter: draft.matter.clone(),
            final_action: draft.final_action.clone(),
            outcome,
            section: classify_section(&draft.matter.status, &draft.title, &draft.agenda_info),
            topics: classify_topics(&draft.title),
            non_voted,
            vote: vote_id,
            synthetic: draft.synthetic,
            item_id: draft.item_id.clone(),
        });
    }

    let members = build_members(&roster, &member_ids, &current, &normalizer, &votes);
    let alignment = build_alignment(&members, &votes);

    let report = BuildReport {
        matched_groups: correlation.matched,
        unmatched_groups: correlation.unmatched,
        skipped_rows: 0,
        unknown_vote_tokens: unknown_tokens.into_iter().collect(),
        unknown_name_variants: normalizer.unknown_variants(),
        unrostered_voters: unrostered.into_iter().collect(),
    };
    info!(
        "Tally complete: {} meetings, {} items, {} votes, {} members",
        meetings.len(),
        items.len(),
        votes.len(),
        members.len()
    );

    Ok(TallyResult {
        meetings,
        items,
        votes,
        members,
        alignment,
        report,
    })
}

fn make_draft(agenda: &[AgendaRow], correlated: &Correlated) -> ItemDraft {
    match correlated {
        Correlated::Matched { agenda: idx, group } => {
            let row = &agenda[*idx];
            ItemDraft {
                date: row.date.clone(),
                body: row.body.clone(),
                event_id: row.event_id.clone(),
                location: row.location.clone(),
                item_id: row.item_id.clone(),
                raw_number: row.agenda_number.clone(),
                sequence: row.sequence,
                title: if row.title.is_empty() {
                    group.description.clone()
                } else {
                    row.title.clone()
                },
                matter: row.matter.clone(),
                passed: row.passed,
                final_action: if group.final_action.is_empty() {
                    row.final_action.clone()
                } else {
                    group.final_action.clone()
                },
                agenda_info: if row.agenda_info.is_empty() {
                    group.item_type.clone()
                } else {
                    row.agenda_info.clone()
                },
                links: row.links.clone(),
                group: Some(group.clone()),
                synthetic: false,
            }
        }
        Correlated::AgendaOnly { agenda: idx } => {
            let row = &agenda[*idx];
            ItemDraft {
                date: row.date.clone(),
                body: row.body.clone(),
                event_id: row.event_id.clone(),
                location: row.location.clone(),
                item_id: row.item_id.clone(),
                raw_number: row.agenda_number.clone(),
                sequence: row.sequence,
                title: row.title.clone(),
                matter: row.matter.clone(),
                passed: row.passed,
                final_action: row.final_action.clone(),
                agenda_info: row.agenda_info.clone(),
                links: row.links.clone(),
                group: None,
                synthetic: false,
            }
        }
        Correlated::VotesOnly { group } => ItemDraft {
            date: group.date.clone(),
            // Roll calls with no calendar counterpart still belong to the
            // council's own session.
            body: "City Council".to_string(),
            event_id: String::new(),
            location: String::new(),
            item_id: String::new(),
            raw_number: group.raw_number.clone(),
            sequence: None,
            title: group.description.clone(),
            matter: MatterInfo::default(),
            passed: None,
            final_action: group.final_action.clone(),
            agenda_info: group.item_type.clone(),
            links: DocumentLinks::default(),
            group: Some(group.clone()),
            synthetic: true,
        },
    }
}

fn merge_meeting_fields(meeting: &mut MeetingRecord, draft: &ItemDraft) {
    if meeting.event_id.is_empty() {
        meeting.event_id = draft.event_id.clone();
    }
    if meeting.location.is_empty() {
        meeting.location = draft.location.clone();
    }
    if meeting.links.agenda.is_empty() {
        meeting.links.agenda = draft.links.agenda.clone();
    }
    if meeting.links.minutes.is_empty() {
        meeting.links.minutes = draft.links.minutes.clone();
    }
    if meeting.links.video.is_empty() {
        meeting.links.video = draft.links.video.clone();
    }
}

fn display_number(raw: &str, sequence: u32) -> String {
    let trimmed = raw.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        sequence.to_string()
    } else {
        trimmed.to_string()
    }
}

fn build_roster(
    persons: &[PersonRow],
    normalizer: &mut NameNormalizer,
) -> BTreeMap<String, RosterEntry> {
    let mut roster: BTreeMap<String, RosterEntry> = BTreeMap::new();
    for row in persons {
        let canonical = normalizer.normalize(&row.voter_name);
        if canonical.is_empty() {
            continue;
        }
        let entry = roster.entry(canonical).or_default();
        entry.raw_names.insert(row.voter_name.trim().to_string());
        if !row.period.is_empty() {
            entry.periods.insert(row.period.clone());
        }
        if !row.title.is_empty() {
            entry.titles.insert(row.title.clone());
        }
        if entry.district.is_none() {
            entry.district = row.district;
        }
        if !row.first_seen.is_empty()
            && (entry.first_seen.is_empty() || row.first_seen < entry.first_seen)
        {
            entry.first_seen = row.first_seen.clone();
        }
        if !row.last_seen.is_empty() && row.last_seen > entry.last_seen {
            entry.last_seen = row.last_seen.clone();
        }
    }
    info!("Roster: {} unique members", roster.len());
    roster
}

/// Which members count as currently seated, under the configured rule.
fn current_members(
    roster: &BTreeMap<String, RosterEntry>,
    rule: CurrentMemberRule,
) -> BTreeSet<String> {
    match rule {
        CurrentMemberRule::LatestRoster => {
            let latest = roster
                .values()
                .flat_map(|e| e.periods.iter())
                .max()
                .cloned();
            match latest {
                Some(latest) => roster
                    .iter()
                    .filter(|(_, e)| e.periods.contains(&latest))
                    .map(|(name, _)| name.clone())
                    .collect(),
                None => roster.keys().cloned().collect(),
            }
        }
        CurrentMemberRule::LastSeen => {
            let newest = roster
                .values()
                .map(|e| e.last_seen.as_str())
                .filter(|d| !d.is_empty())
                .max()
                .map(|d| d.to_string());
            match newest {
                Some(newest) => roster
                    .iter()
                    .filter(|(_, e)| e.last_seen == newest)
                    .map(|(name, _)| name.clone())
                    .collect(),
                None => roster.keys().cloned().collect(),
            }
        }
    }
}

/// Identifiers ascend by (first seen, name), starting at 1.
fn assign_member_ids(roster: &BTreeMap<String, RosterEntry>) -> BTreeMap<String, MemberId> {
    let mut names: Vec<(&String, &RosterEntry)> = roster.iter().collect();
    names.sort_by(|a, b| (a.1.first_seen.as_str(), a.0).cmp(&(b.1.first_seen.as_str(), b.0)));
    names
        .iter()
        .enumerate()
        .map(|(i, (name, _))| ((*name).clone(), MemberId(i as u32 + 1)))
        .collect()
}

fn build_vote_record(
    id: VoteId,
    item: ItemId,
    meeting: MeetingId,
    date: &str,
    outcome: ItemOutcome,
    group: &VoteGroup,
    member_ids: &BTreeMap<String, MemberId>,
    normalizer: &mut NameNormalizer,
    unknown_tokens: &mut BTreeSet<String>,
    unrostered: &mut BTreeSet<String>,
) -> VoteRecord {
    let mut ballots: BTreeMap<MemberId, VoteValue> = BTreeMap::new();
    for (raw_name, token) in &group.ballots {
        let canonical = normalizer.normalize(raw_name);
        let value = map_vote_token(token);
        if value == VoteValue::Unknown {
            unknown_tokens.insert(token.trim().to_uppercase());
        }
        match member_ids.get(&canonical) {
            Some(mid) => {
                ballots.entry(*mid).or_insert(value);
            }
            None => {
                unrostered.insert(canonical);
            }
        }
    }
    let count = |v: VoteValue| ballots.values().filter(|&&b| b == v).count() as u32;
    VoteRecord {
        id,
        item,
        meeting,
        date: date.to_string(),
        outcome,
        ayes: count(VoteValue::Aye),
        noes: count(VoteValue::Nay),
        abstain: count(VoteValue::Abstain),
        absent: count(VoteValue::Absent),
        ballots: ballots.into_iter().collect(),
    }
}

fn pct(n: u32, d: u32) -> f64 {
    if d == 0 {
        0.0
    } else {
        (n as f64 / d as f64 * 1000.0).round() / 10.0
    }
}

fn ballot_of(vote: &VoteRecord, mid: MemberId) -> Option<VoteValue> {
    vote.ballots
        .binary_search_by_key(&mid, |(m, _)| *m)
        .ok()
        .map(|i| vote.ballots[i].1)
}

fn compute_member_stats(mid: MemberId, votes: &[VoteRecord]) -> MemberStats {
    let mut stats = MemberStats::default();
    let mut special = 0u32;
    for vote in votes {
        let value = match ballot_of(vote, mid) {
            Some(v) if v.is_counted() => v,
            _ => continue,
        };
        stats.total_votes += 1;
        match value {
            VoteValue::Aye => stats.aye_count += 1,
            VoteValue::Nay => stats.nay_count += 1,
            VoteValue::Abstain => stats.abstain_count += 1,
            VoteValue::Absent => stats.absent_count += 1,
            _ => {}
        }
        if vote.outcome.is_decided() {
            let on_losing = (vote.outcome == ItemOutcome::Passed && value == VoteValue::Nay)
                || (vote.outcome == ItemOutcome::Failed && value == VoteValue::Aye);
            if on_losing {
                stats.votes_on_losing_side += 1;
                let margin = (vote.ayes as i64 - vote.noes as i64).abs();
                if margin <= 2 {
                    stats.close_vote_dissents += 1;
                }
            }
        } else {
            special += 1;
        }
    }

    let participating = stats.total_votes - stats.absent_count - stats.abstain_count;
    let dissent_denom = if participating > special {
        participating - special
    } else {
        1
    };
    stats.aye_percentage = pct(stats.aye_count, stats.total_votes);
    stats.participation_rate = pct(participating, stats.total_votes);
    stats.dissent_rate = pct(stats.votes_on_losing_side, dissent_denom);
    stats.votes_on_winning_side = participating - stats.votes_on_losing_side;
    stats
}

fn position_of(titles: &BTreeSet<String>) -> String {
    for title in ["Mayor", "Mayor Pro Tem", "Deputy Mayor Pro Tem"] {
        if titles.contains(title) {
            return title.to_string();
        }
    }
    "Council Member".to_string()
}

fn build_members(
    roster: &BTreeMap<String, RosterEntry>,
    member_ids: &BTreeMap<String, MemberId>,
    current: &BTreeSet<String>,
    normalizer: &NameNormalizer,
    votes: &[VoteRecord],
) -> Vec<MemberRecord> {
    // Short names, disambiguated with a first initial when two members
    // share a surname.
    let mut shorts: BTreeMap<String, String> = BTreeMap::new();
    let mut short_counts: BTreeMap<String, u32> = BTreeMap::new();
    for name in roster.keys() {
        let short = short_name(name);
        *short_counts.entry(short.clone()).or_insert(0) += 1;
        shorts.insert(name.clone(), short);
    }
    for (name, short) in shorts.iter_mut() {
        if short_counts.get(short.as_str()).copied().unwrap_or(0) > 1 {
            let initial = name.chars().next().unwrap_or('?');
            *short = format!("{}. {}", initial, short);
        }
    }

    let mut members: Vec<MemberRecord> = roster
        .iter()
        .map(|(name, entry)| {
            let id = member_ids[name];
            let mut raw_names: BTreeSet<String> = entry.raw_names.clone();
            raw_names.extend(normalizer.variants_of(name));
            MemberRecord {
                id,
                name: name.clone(),
                short_name: shorts[name].clone(),
                district: entry.district,
                position: position_of(&entry.titles),
                first_seen: entry.first_seen.clone(),
                last_seen: entry.last_seen.clone(),
                is_current: current.contains(name),
                raw_names: raw_names.into_iter().collect(),
                titles: entry.titles.iter().cloned().collect(),
                stats: compute_member_stats(id, votes),
            }
        })
        .collect();
    members.sort_by_key(|m| m.id);
    members
}

fn build_alignment(members: &[MemberRecord], votes: &[VoteRecord]) -> Vec<AlignmentPair> {
    let current: Vec<MemberId> = members
        .iter()
        .filter(|m| m.is_current)
        .map(|m| m.id)
        .collect();

    let mut pairs: Vec<AlignmentPair> = Vec::new();
    for (i, &m1) in current.iter().enumerate() {
        for &m2 in current.iter().skip(i + 1) {
            let mut shared = 0u32;
            let mut agreements = 0u32;
            for vote in votes {
                let v1 = ballot_of(vote, m1);
                let v2 = ballot_of(vote, m2);
                if let (Some(a), Some(b)) = (v1, v2) {
                    if a.is_cast() && b.is_cast() {
                        shared += 1;
                        if a == b {
                            agreements += 1;
                        }
                    }
                }
            }
            if shared > 0 {
                pairs.push(AlignmentPair {
                    member1: m1,
                    member2: m2,
                    shared_votes: shared,
                    agreements,
                    agreement_rate: pct(agreements, shared),
                });
            }
        }
    }
    pairs.sort_by(|a, b| {
        a.agreement_rate
            .partial_cmp(&b.agreement_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then((a.member1, a.member2).cmp(&(b.member1, b.member2)))
    });
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(period: &str, name: &str, district: u32, first: &str, last: &str) -> PersonRow {
        PersonRow {
            period: period.to_string(),
            district: Some(district),
            voter_name: name.to_string(),
            title: "Councilmember".to_string(),
            first_seen: first.to_string(),
            last_seen: last.to_string(),
            vote_count: None,
        }
    }

    fn agenda_row(date: &str, body: &str, number: &str, seq: u32, title: &str) -> AgendaRow {
        AgendaRow {
            event_id: format!("E-{}", date),
            date: date.to_string(),
            body: body.to_string(),
            item_id: format!("{}-{}", date, seq),
            agenda_number: number.to_string(),
            sequence: Some(seq),
            title: title.to_string(),
            final_action: "APPROVED".to_string(),
            ..AgendaRow::default()
        }
    }

    fn roll(date: &str, number: &str, desc: &str, voter: &str, vote: &str) -> RollCallRow {
        RollCallRow {
            date: date.to_string(),
            item_number: number.to_string(),
            description: desc.to_string(),
            item_type: String::new(),
            // Left empty so the agenda row's final action drives outcomes.
            final_action: String::new(),
            voter_name: voter.to_string(),
            vote: vote.to_string(),
        }
    }

    fn base_persons() -> Vec<PersonRow> {
        vec![
            person("2025-Q1", "Ann Alpha", 1, "2024-01-10", "2025-02-01"),
            person("2025-Q1", "Bob Beta", 2, "2024-01-10", "2025-02-01"),
            person("2025-Q2", "Ann Alpha", 1, "2024-01-10", "2025-05-01"),
            person("2025-Q2", "Bob Beta", 2, "2024-01-10", "2025-05-01"),
        ]
    }

    #[test]
    fn empty_input_is_a_configuration_error() {
        let res = run_council_tally(&[], &[], &base_persons(), &TallyOptions::default());
        assert_eq!(res, Err(TallyErrors::EmptyInput));
    }

    #[test]
    fn bad_threshold_is_rejected() {
        let mut options = TallyOptions::default();
        options.match_threshold = 1.5;
        let agenda = vec![agenda_row("2025-02-01", "City Council", "1.", 1, "An item")];
        let res = run_council_tally(&agenda, &[], &base_persons(), &options);
        assert_eq!(res, Err(TallyErrors::InvalidThreshold));
    }

    #[test]
    fn two_bodies_on_one_date_are_two_meetings() {
        let agenda = vec![
            agenda_row("2025-02-01", "City Council", "1.", 1, "Council item"),
            agenda_row("2025-02-01", "Housing Committee", "1.", 1, "Committee item"),
        ];
        let res =
            run_council_tally(&agenda, &[], &base_persons(), &TallyOptions::default()).unwrap();
        assert_eq!(res.meetings.len(), 2);
        assert_eq!(res.meetings[0].id, MeetingId(1));
        assert_eq!(res.meetings[1].id, MeetingId(2));
        assert_ne!(res.meetings[0].body, res.meetings[1].body);
    }

    #[test]
    fn item_ids_continue_across_meetings() {
        let agenda = vec![
            agenda_row("2025-02-01", "City Council", "2.", 2, "Second of first"),
            agenda_row("2025-02-01", "City Council", "1.", 1, "First of first"),
            agenda_row("2025-03-01", "City Council", "1.", 1, "First of second"),
        ];
        let res =
            run_council_tally(&agenda, &[], &base_persons(), &TallyOptions::default()).unwrap();
        assert_eq!(res.items.len(), 3);
        // Within a meeting the sequence wins over input order; the counter
        // never resets at the meeting boundary.
        assert_eq!(res.items[0].title, "First of first");
        assert_eq!(res.items[0].id, ItemId(1));
        assert_eq!(res.items[1].id, ItemId(2));
        assert_eq!(res.items[2].title, "First of second");
        assert_eq!(res.items[2].id, ItemId(3));
        assert_eq!(res.items[2].meeting, MeetingId(2));
    }

    #[test]
    fn roll_call_ballots_keep_na_and_empty_values() {
        let mut persons = base_persons();
        persons.push(person("2025-Q2", "Cara Gamma", 3, "2024-01-10", "2025-05-01"));
        let agenda = vec![agenda_row("2025-02-01", "City Council", "1.", 1, "An item")];
        let rolls = vec![
            roll("2025-02-01", "1", "An item", "Ann Alpha", "YES"),
            roll("2025-02-01", "1", "An item", "Bob Beta", "N/A"),
            roll("2025-02-01", "1", "An item", "Cara Gamma", ""),
        ];
        let res = run_council_tally(&agenda, &rolls, &persons, &TallyOptions::default()).unwrap();
        assert_eq!(res.votes.len(), 1);
        let vote = &res.votes[0];
        // All three seats appear, the unseated ones with distinct values
        // rather than omission.
        assert_eq!(vote.ballots.len(), 3);
        assert!(vote
            .ballots
            .iter()
            .any(|(_, v)| *v == VoteValue::NotApplicable));
        assert!(vote.ballots.iter().any(|(_, v)| *v == VoteValue::Empty));
        assert_eq!(vote.ayes, 1);
        // N/A and empty values never count toward statistics.
        let bob = res.members.iter().find(|m| m.name == "Bob Beta").unwrap();
        assert_eq!(bob.stats.total_votes, 0);
    }

    #[test]
    fn unknown_tokens_surface_in_the_report() {
        let agenda = vec![agenda_row("2025-02-01", "City Council", "1.", 1, "An item")];
        let rolls = vec![
            roll("2025-02-01", "1", "An item", "Ann Alpha", "YEA"),
            roll("2025-02-01", "1", "An item", "Bob Beta", "YES"),
        ];
        let res =
            run_council_tally(&agenda, &rolls, &base_persons(), &TallyOptions::default()).unwrap();
        assert_eq!(res.report.unknown_vote_tokens, vec!["YEA".to_string()]);
        let vote = &res.votes[0];
        // The unknown token is present as UNKNOWN_CODE, not guessed as a vote.
        assert!(vote.ballots.iter().any(|(_, v)| *v == VoteValue::Unknown));
        assert_eq!(vote.ayes, 1);
    }

    #[test]
    fn name_variants_merge_into_one_member_with_summed_counts() {
        let mut persons = vec![
            person("2025-Q1", "Jesse  Moreno", 2, "2024-01-10", "2025-02-01"),
            person("2025-Q2", "Jesse Moreno", 2, "2024-01-10", "2025-05-01"),
        ];
        persons.push(person("2025-Q1", "Ann Alpha", 1, "2024-01-10", "2025-02-01"));
        persons.push(person("2025-Q2", "Ann Alpha", 1, "2024-01-10", "2025-05-01"));
        let agenda = vec![
            agenda_row("2025-02-01", "City Council", "1.", 1, "Q1 item"),
            agenda_row("2025-05-01", "City Council", "1.", 1, "Q2 item"),
        ];
        let rolls = vec![
            roll("2025-02-01", "1", "Q1 item", "Jesse  Moreno", "YES"),
            roll("2025-05-01", "1", "Q2 item", "Jesse Moreno", "NO"),
        ];
        let res =
            run_council_tally(&agenda, &rolls, &persons, &TallyOptions::default()).unwrap();
        let moreno: Vec<&MemberRecord> = res
            .members
            .iter()
            .filter(|m| m.name == "Jesse Moreno")
            .collect();
        assert_eq!(moreno.len(), 1);
        // One vote from each quarter lands on the same record.
        assert_eq!(moreno[0].stats.total_votes, 2);
        assert_eq!(moreno[0].stats.aye_count, 1);
        assert_eq!(moreno[0].stats.nay_count, 1);
        assert!(moreno[0]
            .raw_names
            .contains(&"Jesse  Moreno".to_string()));
    }

    #[test]
    fn current_member_rules_differ_on_departed_members() {
        // Bob is in the latest roster file but stopped appearing mid-quarter;
        // Cara left after Q1 entirely.
        let persons = vec![
            person("2025-Q1", "Ann Alpha", 1, "2024-01-10", "2025-02-01"),
            person("2025-Q1", "Cara Gamma", 3, "2024-01-10", "2025-02-01"),
            person("2025-Q2", "Ann Alpha", 1, "2024-01-10", "2025-05-01"),
            person("2025-Q2", "Bob Beta", 2, "2024-01-10", "2025-04-15"),
        ];
        let agenda = vec![agenda_row("2025-02-01", "City Council", "1.", 1, "An item")];

        let latest =
            run_council_tally(&agenda, &[], &persons, &TallyOptions::default()).unwrap();
        let by_name = |r: &TallyResult, n: &str| {
            r.members.iter().find(|m| m.name == n).unwrap().is_current
        };
        assert!(by_name(&latest, "Ann Alpha"));
        assert!(by_name(&latest, "Bob Beta"));
        assert!(!by_name(&latest, "Cara Gamma"));

        let mut options = TallyOptions::default();
        options.current_rule = CurrentMemberRule::LastSeen;
        let last_seen = run_council_tally(&agenda, &[], &persons, &options).unwrap();
        assert!(by_name(&last_seen, "Ann Alpha"));
        // Bob's last-seen date trails the newest in the data, so the
        // last-seen rule drops him while the roster rule keeps him.
        assert!(!by_name(&last_seen, "Bob Beta"));
        assert!(!by_name(&last_seen, "Cara Gamma"));
    }

    #[test]
    fn alignment_covers_current_pairs_over_cast_votes() {
        let agenda = vec![
            agenda_row("2025-02-01", "City Council", "1.", 1, "Item one"),
            agenda_row("2025-02-01", "City Council", "2.", 2, "Item two"),
            agenda_row("2025-02-01", "City Council", "3.", 3, "Item three"),
        ];
        let rolls = vec![
            roll("2025-02-01", "1", "Item one", "Ann Alpha", "YES"),
            roll("2025-02-01", "1", "Item one", "Bob Beta", "YES"),
            roll("2025-02-01", "2", "Item two", "Ann Alpha", "YES"),
            roll("2025-02-01", "2", "Item two", "Bob Beta", "NO"),
            // Absences do not create a shared vote.
            roll("2025-02-01", "3", "Item three", "Ann Alpha", "YES"),
            roll("2025-02-01", "3", "Item three", "Bob Beta", "ABSNT"),
        ];
        let res =
            run_council_tally(&agenda, &rolls, &base_persons(), &TallyOptions::default()).unwrap();
        assert_eq!(res.alignment.len(), 1);
        let pair = &res.alignment[0];
        assert_eq!(pair.shared_votes, 2);
        assert_eq!(pair.agreements, 1);
        assert_eq!(pair.agreement_rate, 50.0);
    }

    #[test]
    fn member_stats_follow_the_documented_formulas() {
        let agenda = vec![
            agenda_row("2025-02-01", "City Council", "1.", 1, "Item one"),
            agenda_row("2025-02-01", "City Council", "2.", 2, "Item two"),
        ];
        let mut failed_row = agenda_row("2025-02-01", "City Council", "3.", 3, "Item three");
        failed_row.final_action = "DENIED".to_string();
        let agenda = [agenda, vec![failed_row]].concat();
        let rolls = vec![
            roll("2025-02-01", "1", "Item one", "Ann Alpha", "YES"),
            roll("2025-02-01", "2", "Item two", "Ann Alpha", "ABSNT"),
            roll("2025-02-01", "3", "Item three", "Ann Alpha", "YES"),
        ];
        let res =
            run_council_tally(&agenda, &rolls, &base_persons(), &TallyOptions::default()).unwrap();
        let ann = res.members.iter().find(|m| m.name == "Ann Alpha").unwrap();
        assert_eq!(ann.stats.total_votes, 3);
        assert_eq!(ann.stats.aye_count, 2);
        assert_eq!(ann.stats.absent_count, 1);
        // Two participating votes, one on the losing side of a 1-0 failure.
        assert_eq!(ann.stats.votes_on_losing_side, 1);
        assert_eq!(ann.stats.close_vote_dissents, 1);
        assert_eq!(ann.stats.participation_rate, 66.7);
        assert_eq!(ann.stats.dissent_rate, 50.0);
    }

    #[test]
    fn same_input_always_yields_the_same_result() {
        let agenda = vec![
            agenda_row("2025-02-01", "City Council", "1.", 1, "Item one"),
            agenda_row("2025-03-01", "City Council", "1.", 1, "Item two"),
        ];
        let rolls = vec![
            roll("2025-02-01", "1", "Item one", "Ann Alpha", "YES"),
            roll("2025-03-01", "1", "Item two", "Bob Beta", "NO"),
        ];
        let a = run_council_tally(&agenda, &rolls, &base_persons(), &TallyOptions::default())
            .unwrap();
        let b = run_council_tally(&agenda, &rolls, &base_persons(), &TallyOptions::default())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn synthetic_items_carry_their_votes_to_output() {
        let agenda = vec![agenda_row("2025-02-01", "City Council", "1.", 1, "Item one")];
        let rolls = vec![
            roll("2025-02-01", "1", "Item one", "Ann Alpha", "YES"),
            roll("2025-02-01", "77", "Closed session roll call", "Ann Alpha", "YES"),
        ];
        let res =
            run_council_tally(&agenda, &rolls, &base_persons(), &TallyOptions::default()).unwrap();
        assert_eq!(res.items.len(), 2);
        assert_eq!(res.votes.len(), 2);
        let synthetic = res.items.iter().find(|i| i.synthetic).unwrap();
        assert_eq!(synthetic.title, "Closed session roll call");
        assert!(synthetic.matter.file.is_empty());
        assert_eq!(res.report.unmatched_groups, 1);
        assert_eq!(res.report.matched_groups, 1);
    }
}
