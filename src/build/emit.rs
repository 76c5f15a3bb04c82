// Emission of the JSON documents consumed by the static frontend. Every
// document builder is a pure function of the tally result, so rebuilding
// from identical input produces byte-identical files.

use std::fs;
use std::path::Path;

use log::info;
use serde_json::{json, Map as JSMap, Value as JSValue};
use snafu::prelude::*;

use council_tally::{
    AgendaItemRecord, ItemOutcome, MeetingRecord, MemberRecord, TallyResult, VoteRecord,
};

use crate::build::{BuildResult, OutputDirSnafu, ParsingJsonSnafu, WritingDocSnafu};

/// Hard cap on the non-voted item list, to bound the document size.
pub const NON_VOTED_ITEM_CAP: usize = 5000;

fn opt_str(s: &str) -> JSValue {
    if s.is_empty() {
        JSValue::Null
    } else {
        json!(s)
    }
}

fn year_of(date: &str) -> &str {
    date.get(..4).unwrap_or("")
}

fn rate(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        (n as f64 / d as f64 * 1000.0).round() / 10.0
    }
}

/// Identifiers are assigned densely from 1, so id - 1 indexes the vectors.
fn item_of<'a>(result: &'a TallyResult, vote: &VoteRecord) -> &'a AgendaItemRecord {
    &result.items[vote.item.0 as usize - 1]
}

fn member_of<'a>(result: &'a TallyResult, id: council_tally::MemberId) -> &'a MemberRecord {
    &result.members[id.0 as usize - 1]
}

/// Votes in display order: newest first, then by item number.
fn votes_newest_first(result: &TallyResult) -> Vec<&VoteRecord> {
    let mut votes: Vec<&VoteRecord> = result.votes.iter().collect();
    votes.sort_by(|a, b| {
        let ka = (a.date.as_str(), item_of(result, a).number.as_str());
        let kb = (b.date.as_str(), item_of(result, b).number.as_str());
        kb.cmp(&ka)
    });
    votes
}

fn meetings_newest_first(result: &TallyResult) -> Vec<&MeetingRecord> {
    let mut meetings: Vec<&MeetingRecord> = result.meetings.iter().collect();
    meetings.sort_by(|a, b| (b.date.as_str(), a.id).cmp(&(a.date.as_str(), b.id)));
    meetings
}

/// Writes every document, after clearing the previous build's output so no
/// stale files with dead identifiers survive.
pub fn emit_all(out_dir: &Path, result: &TallyResult) -> BuildResult<()> {
    if out_dir.exists() {
        fs::remove_dir_all(out_dir).context(OutputDirSnafu {
            path: out_dir.display().to_string(),
        })?;
    }
    for sub in ["council", "meetings", "votes"] {
        fs::create_dir_all(out_dir.join(sub)).context(OutputDirSnafu {
            path: out_dir.display().to_string(),
        })?;
    }

    write_doc(&out_dir.join("stats.json"), &stats_json(result))?;
    write_doc(&out_dir.join("council.json"), &council_json(result))?;
    for member in &result.members {
        write_doc(
            &out_dir.join("council").join(format!("{}.json", member.id.0)),
            &member_json(result, member),
        )?;
    }
    write_doc(&out_dir.join("meetings.json"), &meetings_json(result))?;
    for meeting in &result.meetings {
        write_doc(
            &out_dir.join("meetings").join(format!("{}.json", meeting.id.0)),
            &meeting_json(result, meeting),
        )?;
    }
    write_doc(&out_dir.join("votes.json"), &votes_json(result))?;
    for (year, doc) in votes_by_year(result) {
        write_doc(&out_dir.join(format!("votes-{}.json", year)), &doc)?;
    }
    write_doc(&out_dir.join("votes-index.json"), &votes_index_json(result))?;
    for vote in &result.votes {
        write_doc(
            &out_dir.join("votes").join(format!("{}.json", vote.id.0)),
            &vote_json(result, vote),
        )?;
    }
    write_doc(&out_dir.join("alignment.json"), &alignment_json(result))?;
    write_doc(
        &out_dir.join("agenda-items.json"),
        &agenda_items_json(result, NON_VOTED_ITEM_CAP),
    )?;
    Ok(())
}

fn write_doc(path: &Path, doc: &JSValue) -> BuildResult<()> {
    let encoded = serde_json::to_string(doc).context(ParsingJsonSnafu {})?;
    fs::write(path, encoded).context(WritingDocSnafu {
        path: path.display().to_string(),
    })?;
    info!("Written {}", path.display());
    Ok(())
}

// --- stats.json ---

pub fn stats_json(result: &TallyResult) -> JSValue {
    let total_votes = result.votes.len();
    let pass_count = result
        .votes
        .iter()
        .filter(|v| v.outcome == ItemOutcome::Passed)
        .count();
    let unanimous = result
        .votes
        .iter()
        .filter(|v| v.noes == 0 && v.abstain == 0 && v.outcome.is_decided())
        .count();

    let mut all_dates: Vec<&str> = result
        .votes
        .iter()
        .map(|v| v.date.as_str())
        .chain(result.meetings.iter().map(|m| m.date.as_str()))
        .collect();
    all_dates.sort_unstable();
    all_dates.dedup();

    let total_non_voted = result.items.iter().filter(|i| i.vote.is_none()).count();
    let first_readings = result
        .items
        .iter()
        .filter(|i| {
            i.non_voted
                .map(|c| c.category == "first_reading")
                .unwrap_or(false)
        })
        .count();

    json!({
        "success": true,
        "stats": {
            "total_meetings": result.meetings.len(),
            "total_votes": total_votes,
            "total_council_members": result.members.len(),
            "total_agenda_items": result.items.len(),
            "total_non_voted_items": total_non_voted,
            "first_readings": first_readings,
            "pass_rate": rate(pass_count, total_votes),
            "unanimous_rate": rate(unanimous, total_votes),
            "date_range": {
                "start": all_dates.first().copied().unwrap_or(""),
                "end": all_dates.last().copied().unwrap_or(""),
            },
        },
    })
}

// --- council.json and council/{id}.json ---

fn member_stats_js(member: &MemberRecord) -> JSValue {
    let s = &member.stats;
    json!({
        "total_votes": s.total_votes,
        "aye_count": s.aye_count,
        "nay_count": s.nay_count,
        "abstain_count": s.abstain_count,
        "absent_count": s.absent_count,
        "aye_percentage": s.aye_percentage,
        "participation_rate": s.participation_rate,
        "dissent_rate": s.dissent_rate,
        "votes_on_losing_side": s.votes_on_losing_side,
        "votes_on_winning_side": s.votes_on_winning_side,
        "close_vote_dissents": s.close_vote_dissents,
    })
}

fn member_summary_js(member: &MemberRecord) -> JSValue {
    json!({
        "id": member.id.0,
        "full_name": member.name,
        "short_name": member.short_name,
        "position": member.position,
        "district": member.district,
        "start_date": member.first_seen,
        "end_date": if member.is_current { JSValue::Null } else { json!(member.last_seen) },
        "is_current": member.is_current,
        "stats": member_stats_js(member),
    })
}

pub fn council_json(result: &TallyResult) -> JSValue {
    let members: Vec<JSValue> = result.members.iter().map(member_summary_js).collect();
    json!({ "success": true, "members": members })
}

pub fn member_json(result: &TallyResult, member: &MemberRecord) -> JSValue {
    let mut recent_votes: Vec<JSValue> = Vec::new();
    for vote in votes_newest_first(result) {
        let choice = vote
            .ballots
            .iter()
            .find(|(mid, _)| *mid == member.id)
            .map(|(_, v)| *v);
        let choice = match choice {
            Some(v) if v.is_counted() => v,
            _ => continue,
        };
        let item = item_of(result, vote);
        recent_votes.push(json!({
            "vote_id": vote.id.0,
            "meeting_date": vote.date,
            "item_number": item.number,
            "title": item.title,
            "vote_choice": choice.as_str(),
            "outcome": vote.outcome.as_str(),
            "topics": item.topics,
            "meeting_type": "regular",
        }));
    }

    let mut member_js = match member_summary_js(member) {
        JSValue::Object(m) => m,
        _ => JSMap::new(),
    };
    member_js.insert("recent_votes".to_string(), JSValue::Array(recent_votes));
    json!({ "success": true, "member": member_js })
}

// --- meetings.json and meetings/{id}.json ---

struct MeetingCounts {
    agenda_items: usize,
    votes: usize,
    non_voted: usize,
    first_readings: usize,
}

fn meeting_counts(result: &TallyResult, meeting: &MeetingRecord) -> MeetingCounts {
    let items = result.items.iter().filter(|i| i.meeting == meeting.id);
    let mut counts = MeetingCounts {
        agenda_items: 0,
        votes: 0,
        non_voted: 0,
        first_readings: 0,
    };
    for item in items {
        counts.agenda_items += 1;
        if item.vote.is_some() {
            counts.votes += 1;
        } else {
            counts.non_voted += 1;
            if item
                .non_voted
                .map(|c| c.category == "first_reading")
                .unwrap_or(false)
            {
                counts.first_readings += 1;
            }
        }
    }
    counts
}

fn meeting_summary_js(result: &TallyResult, meeting: &MeetingRecord) -> JSValue {
    let counts = meeting_counts(result, meeting);
    json!({
        "id": meeting.id.0,
        "event_id": opt_str(&meeting.event_id),
        "meeting_date": meeting.date,
        "meeting_type": "regular",
        "body": meeting.body,
        "location": opt_str(&meeting.location),
        "agenda_url": opt_str(&meeting.links.agenda),
        "minutes_url": opt_str(&meeting.links.minutes),
        "video_url": opt_str(&meeting.links.video),
        "agenda_item_count": counts.agenda_items,
        "vote_count": counts.votes,
        "non_voted_count": counts.non_voted,
        "first_reading_count": counts.first_readings,
    })
}

pub fn meetings_json(result: &TallyResult) -> JSValue {
    let meetings: Vec<JSValue> = meetings_newest_first(result)
        .into_iter()
        .map(|m| meeting_summary_js(result, m))
        .collect();
    let mut years: Vec<i64> = result
        .meetings
        .iter()
        .filter_map(|m| year_of(&m.date).parse::<i64>().ok())
        .collect();
    years.sort_unstable();
    years.dedup();
    years.reverse();
    json!({ "success": true, "meetings": meetings, "available_years": years })
}

fn agenda_item_js(result: &TallyResult, item: &AgendaItemRecord) -> JSValue {
    match item.vote {
        Some(vote_id) => {
            let vote = &result.votes[vote_id.0 as usize - 1];
            json!({
                "agenda_sequence": item.sequence,
                "item_type": "voted",
                "item_number": item.number,
                "title": item.title,
                "section": item.section.as_str(),
                "matter_file": opt_str(&item.matter.file),
                "matter_type": opt_str(&item.matter.kind),
                "topics": item.topics,
                "vote": {
                    "id": vote.id.0,
                    "outcome": vote.outcome.as_str(),
                    "ayes": vote.ayes,
                    "noes": vote.noes,
                    "abstain": vote.abstain,
                    "absent": vote.absent,
                },
            })
        }
        None => {
            let class = item.non_voted.unwrap_or(council_tally::NonVotedClass {
                category: "other",
                importance: "low",
                display_type: "procedural",
            });
            json!({
                "agenda_sequence": item.sequence,
                "item_type": "non_voted",
                "category": class.category,
                "importance": class.importance,
                "display_type": class.display_type,
                "title": item.title,
                "matter_file": opt_str(&item.matter.file),
                "matter_type": opt_str(&item.matter.kind),
                "action": opt_str(&item.final_action),
                "description": opt_str(&item.description),
                "topics": if class.importance == "high" { json!(item.topics) } else { JSValue::Null },
                "vote": JSValue::Null,
            })
        }
    }
}

pub fn meeting_json(result: &TallyResult, meeting: &MeetingRecord) -> JSValue {
    let agenda_items: Vec<JSValue> = result
        .items
        .iter()
        .filter(|i| i.meeting == meeting.id)
        .map(|i| agenda_item_js(result, i))
        .collect();
    let mut meeting_js = match meeting_summary_js(result, meeting) {
        JSValue::Object(m) => m,
        _ => JSMap::new(),
    };
    meeting_js.insert("agenda_items".to_string(), JSValue::Array(agenda_items));
    json!({ "success": true, "meeting": meeting_js })
}

// --- votes.json, votes-{year}.json, votes-index.json, votes/{id}.json ---

fn vote_summary_js(result: &TallyResult, vote: &VoteRecord) -> JSValue {
    let item = item_of(result, vote);
    json!({
        "id": vote.id.0,
        "outcome": vote.outcome.as_str(),
        "ayes": vote.ayes,
        "noes": vote.noes,
        "abstain": vote.abstain,
        "absent": vote.absent,
        "item_number": item.number,
        "section": item.section.as_str(),
        "title": item.title,
        "meeting_date": vote.date,
        "meeting_type": "regular",
        "topics": item.topics,
    })
}

pub fn votes_json(result: &TallyResult) -> JSValue {
    let votes: Vec<JSValue> = votes_newest_first(result)
        .into_iter()
        .map(|v| vote_summary_js(result, v))
        .collect();
    json!({ "success": true, "votes": votes })
}

pub fn votes_by_year(result: &TallyResult) -> Vec<(String, JSValue)> {
    let mut years: Vec<String> = result
        .votes
        .iter()
        .map(|v| year_of(&v.date).to_string())
        .filter(|y| !y.is_empty())
        .collect();
    years.sort();
    years.dedup();
    years
        .into_iter()
        .map(|year| {
            let votes: Vec<JSValue> = votes_newest_first(result)
                .into_iter()
                .filter(|v| year_of(&v.date) == year)
                .map(|v| vote_summary_js(result, v))
                .collect();
            (year, json!({ "success": true, "votes": votes }))
        })
        .collect()
}

pub fn votes_index_json(result: &TallyResult) -> JSValue {
    let mut years: Vec<i64> = result
        .votes
        .iter()
        .filter_map(|v| year_of(&v.date).parse::<i64>().ok())
        .collect();
    years.sort_unstable();
    years.dedup();
    years.reverse();
    json!({ "success": true, "available_years": years })
}

pub fn vote_json(result: &TallyResult, vote: &VoteRecord) -> JSValue {
    let item = item_of(result, vote);
    let mut ballots: Vec<&(council_tally::MemberId, council_tally::VoteValue)> = vote
        .ballots
        .iter()
        .filter(|(_, v)| v.is_counted())
        .collect();
    ballots.sort_by(|a, b| member_of(result, a.0).name.cmp(&member_of(result, b.0).name));
    let member_votes: Vec<JSValue> = ballots
        .into_iter()
        .map(|(mid, value)| {
            let member = member_of(result, *mid);
            json!({
                "member_id": member.id.0,
                "full_name": member.name,
                "vote_choice": value.as_str(),
            })
        })
        .collect();

    json!({
        "success": true,
        "vote": {
            "id": vote.id.0,
            "item_number": item.number,
            "title": item.title,
            "description": item.description,
            "outcome": vote.outcome.as_str(),
            "ayes": vote.ayes,
            "noes": vote.noes,
            "abstain": vote.abstain,
            "absent": vote.absent,
            "meeting_id": vote.meeting.0,
            "meeting_date": vote.date,
            "meeting_type": "regular",
            "member_votes": member_votes,
            "topics": item.topics,
        },
    })
}

// --- alignment.json ---

pub fn alignment_json(result: &TallyResult) -> JSValue {
    let mut current: Vec<&MemberRecord> = result.members.iter().filter(|m| m.is_current).collect();
    current.sort_by(|a, b| a.name.cmp(&b.name));

    let pairs: Vec<JSValue> = result
        .alignment
        .iter()
        .map(|p| {
            json!({
                "member1": member_of(result, p.member1).short_name,
                "member2": member_of(result, p.member2).short_name,
                "shared_votes": p.shared_votes,
                "agreements": p.agreements,
                "agreement_rate": p.agreement_rate,
            })
        })
        .collect();

    // The alignment pairs arrive sorted by ascending agreement rate.
    let least_aligned: Vec<JSValue> = pairs.iter().take(3).cloned().collect();
    let most_aligned: Vec<JSValue> = pairs.iter().rev().take(3).cloned().collect();

    json!({
        "success": true,
        "members": current.iter().map(|m| m.short_name.clone()).collect::<Vec<String>>(),
        "alignment_pairs": pairs,
        "most_aligned": most_aligned,
        "least_aligned": least_aligned,
    })
}

// --- agenda-items.json ---

pub fn agenda_items_json(result: &TallyResult, cap: usize) -> JSValue {
    let items: Vec<JSValue> = result
        .items
        .iter()
        .filter(|i| i.vote.is_none())
        .filter(|i| {
            i.non_voted
                .map(|c| c.category != "committee_header")
                .unwrap_or(true)
        })
        .take(cap)
        .map(|item| {
            json!({
                "event_item_id": opt_str(&item.item_id),
                "meeting_date": item.date,
                "meeting_id": item.meeting.0,
                "agenda_sequence": item.sequence,
                "title": item.title,
                "matter_file": opt_str(&item.matter.file),
                "matter_type": opt_str(&item.matter.kind),
                "action": opt_str(&item.final_action),
                "category": item.non_voted.map(|c| c.category).unwrap_or("other"),
                "topics": item.topics,
                "description_preview": item.title.chars().take(200).collect::<String>(),
            })
        })
        .collect();
    json!({ "success": true, "agenda_items": items })
}
