// Readers for the quarterly CSV exports: the wide Votes layout with one
// column per council member, and the Persons roster files.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::debug;
use snafu::prelude::*;

use council_tally::{AgendaRow, DocumentLinks, MatterInfo, PersonRow, RollCallRow};

use crate::build::{BuildResult, CsvOpenSnafu};

/// The fixed columns of the Votes/Voted-Items layout, in canonical order.
/// Every header outside this list is a council member's vote column.
pub const FIXED_COLUMNS: &[&str] = &[
    // Meeting-level
    "event_id",
    "event_date",
    "event_time",
    "event_body",
    "event_location",
    // Agenda item
    "event_item_id",
    "agenda_number",
    "agenda_sequence",
    "title",
    // Matter metadata
    "matter_file",
    "matter_type",
    "matter_status",
    "matter_id",
    "matter_title",
    "matter_intro_date",
    "matter_enactment_number",
    "matter_requester",
    "matter_body_name",
    // Outcome fields
    "passed",
    "vote_type",
    "consent",
    "tally",
    "mover",
    "seconder",
    "roll_call_flag",
    // Vote-source fields
    "socrata_item_number",
    "socrata_agenda_info",
    "socrata_final_action",
    // Links
    "agenda_link",
    "minutes_link",
    "video_link",
    "attachment_links",
];

/// Accumulates the decomposed rows across all Votes files of one build,
/// deduplicating items repeated between quarterly exports.
#[derive(Debug, Default)]
pub struct VotesData {
    pub agenda: Vec<AgendaRow>,
    pub roll_calls: Vec<RollCallRow>,
    pub skipped: usize,
    seen_items: HashSet<(String, String)>,
}

fn field<'r>(index: &HashMap<&str, usize>, record: &'r csv::StringRecord, name: &str) -> &'r str {
    index
        .get(name)
        .and_then(|&i| record.get(i))
        .unwrap_or("")
        .trim()
}

/// Reads one Votes CSV. Each data row yields an agenda-item row when it
/// carries a source-system item identity, and one roll-call row per member
/// column when the row carries any vote token. Rows with the wrong column
/// count are skipped and counted, never fatal.
pub fn read_votes(path: &Path, data: &mut VotesData) -> BuildResult<()> {
    let display = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu {
            path: display.clone(),
        })?;
    let headers = rdr
        .headers()
        .context(CsvOpenSnafu {
            path: display.clone(),
        })?
        .clone();
    let fixed: HashSet<&str> = FIXED_COLUMNS.iter().copied().collect();
    let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();
    let member_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !fixed.contains(h))
        .map(|(i, h)| (i, h.to_string()))
        .collect();
    debug!(
        "read_votes: {} with {} member columns",
        display,
        member_cols.len()
    );

    for record_r in rdr.records() {
        let record = match record_r {
            Ok(r) => r,
            Err(e) => {
                debug!("read_votes: skipping unreadable row in {}: {}", display, e);
                data.skipped += 1;
                continue;
            }
        };
        if record.len() != headers.len() {
            data.skipped += 1;
            continue;
        }
        let date = field(&index, &record, "event_date");
        let title = field(&index, &record, "title");
        if date.is_empty() || title.is_empty() {
            // Blank separator rows, not data errors.
            continue;
        }

        let item_id = field(&index, &record, "event_item_id");
        let number = field(&index, &record, "agenda_number");
        let dedup_key = if item_id.is_empty() {
            format!(
                "{}_{}_{}",
                field(&index, &record, "agenda_sequence"),
                number,
                title.chars().take(50).collect::<String>()
            )
        } else {
            item_id.to_string()
        };
        if !data.seen_items.insert((date.to_string(), dedup_key)) {
            continue;
        }

        let sequence = field(&index, &record, "agenda_sequence").parse::<u32>().ok();
        let passed = match field(&index, &record, "passed") {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        };

        if !item_id.is_empty() {
            data.agenda.push(AgendaRow {
                event_id: field(&index, &record, "event_id").to_string(),
                date: date.to_string(),
                time: field(&index, &record, "event_time").to_string(),
                body: field(&index, &record, "event_body").to_string(),
                location: field(&index, &record, "event_location").to_string(),
                item_id: item_id.to_string(),
                agenda_number: number.to_string(),
                sequence,
                title: title.to_string(),
                matter: MatterInfo {
                    file: field(&index, &record, "matter_file").to_string(),
                    kind: field(&index, &record, "matter_type").to_string(),
                    status: field(&index, &record, "matter_status").to_string(),
                    id: field(&index, &record, "matter_id").to_string(),
                    title: field(&index, &record, "matter_title").to_string(),
                    intro_date: field(&index, &record, "matter_intro_date").to_string(),
                    enactment_number: field(&index, &record, "matter_enactment_number").to_string(),
                    requester: field(&index, &record, "matter_requester").to_string(),
                    body_name: field(&index, &record, "matter_body_name").to_string(),
                },
                passed,
                final_action: field(&index, &record, "socrata_final_action").to_string(),
                agenda_info: field(&index, &record, "socrata_agenda_info").to_string(),
                links: DocumentLinks {
                    agenda: field(&index, &record, "agenda_link").to_string(),
                    minutes: field(&index, &record, "minutes_link").to_string(),
                    video: field(&index, &record, "video_link").to_string(),
                    attachments: field(&index, &record, "attachment_links")
                        .split('|')
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                        .collect(),
                },
            });
        }

        let has_votes = member_cols
            .iter()
            .any(|(i, _)| record.get(*i).map(|v| !v.trim().is_empty()).unwrap_or(false));
        if has_votes {
            let vote_number = if field(&index, &record, "socrata_item_number").is_empty() {
                number
            } else {
                field(&index, &record, "socrata_item_number")
            };
            for (i, name) in &member_cols {
                let token = record.get(*i).unwrap_or("").trim();
                data.roll_calls.push(RollCallRow {
                    date: date.to_string(),
                    item_number: vote_number.to_string(),
                    description: title.to_string(),
                    item_type: field(&index, &record, "socrata_agenda_info").to_string(),
                    final_action: field(&index, &record, "socrata_final_action").to_string(),
                    voter_name: name.clone(),
                    vote: token.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Reads one Persons CSV. The period label ties each row to its quarterly
/// snapshot for the current-member rule.
pub fn read_persons(path: &Path, period: &str) -> BuildResult<(Vec<PersonRow>, usize)> {
    let display = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu {
            path: display.clone(),
        })?;
    let headers = rdr
        .headers()
        .context(CsvOpenSnafu {
            path: display.clone(),
        })?
        .clone();
    let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

    let mut rows: Vec<PersonRow> = Vec::new();
    let mut skipped = 0usize;
    for record_r in rdr.records() {
        let record = match record_r {
            Ok(r) => r,
            Err(e) => {
                debug!("read_persons: skipping unreadable row in {}: {}", display, e);
                skipped += 1;
                continue;
            }
        };
        if record.len() != headers.len() {
            skipped += 1;
            continue;
        }
        let name = field(&index, &record, "voter_name");
        if name.is_empty() {
            continue;
        }
        rows.push(PersonRow {
            period: period.to_string(),
            district: field(&index, &record, "district").parse::<u32>().ok(),
            voter_name: name.to_string(),
            title: field(&index, &record, "title").to_string(),
            first_seen: field(&index, &record, "first_seen").to_string(),
            last_seen: field(&index, &record, "last_seen").to_string(),
            vote_count: field(&index, &record, "vote_count").parse::<u64>().ok(),
        });
    }
    Ok((rows, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VOTES_HEADER: &str = "event_id,event_date,event_time,event_body,event_location,\
event_item_id,agenda_number,agenda_sequence,title,matter_file,matter_type,matter_status,\
matter_id,matter_title,matter_intro_date,matter_enactment_number,matter_requester,\
matter_body_name,passed,vote_type,consent,tally,mover,seconder,roll_call_flag,\
socrata_item_number,socrata_agenda_info,socrata_final_action,agenda_link,minutes_link,\
video_link,attachment_links,Ann Alpha,Bob Beta";

    fn votes_row(
        date: &str,
        item_id: &str,
        number: &str,
        seq: &str,
        title: &str,
        ann: &str,
        bob: &str,
    ) -> String {
        format!(
            "E1,{date},9:00 AM,City Council,Council Chambers,{item_id},{number},{seq},{title},\
,,,,,,,,,,,,,,,0,{number},,APPROVED,,,,,{ann},{bob}",
        )
    }

    fn write_file(dir: &Path, name: &str, lines: &[String]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn rows_decompose_into_agenda_and_roll_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "Dallas-TX-2025-Q1-Votes.csv",
            &[
                VOTES_HEADER.to_string(),
                votes_row("2025-02-01", "I1", "1.", "1", "A voted item", "YES", "NO"),
                votes_row("2025-02-01", "I2", "2.", "2", "A non-voted item", "", ""),
            ],
        );
        let mut data = VotesData::default();
        read_votes(&path, &mut data).unwrap();
        assert_eq!(data.agenda.len(), 2);
        // Only the voted row produces roll calls, one per member column.
        assert_eq!(data.roll_calls.len(), 2);
        assert_eq!(data.roll_calls[0].voter_name, "Ann Alpha");
        assert_eq!(data.roll_calls[0].vote, "YES");
        assert_eq!(data.skipped, 0);
    }

    #[test]
    fn vote_only_rows_have_no_agenda_side() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "Dallas-TX-2025-Q1-Votes.csv",
            &[
                VOTES_HEADER.to_string(),
                // No event_item_id: an item reconstructed from the vote
                // source during extraction.
                votes_row("2025-02-01", "", "77", "", "Closed session", "YES", "YES"),
            ],
        );
        let mut data = VotesData::default();
        read_votes(&path, &mut data).unwrap();
        assert!(data.agenda.is_empty());
        assert_eq!(data.roll_calls.len(), 2);
    }

    #[test]
    fn malformed_rows_are_skipped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "Dallas-TX-2025-Q1-Votes.csv",
            &[
                VOTES_HEADER.to_string(),
                "E1,2025-02-01,too,short".to_string(),
                votes_row("2025-02-01", "I1", "1.", "1", "A voted item", "YES", "NO"),
            ],
        );
        let mut data = VotesData::default();
        read_votes(&path, &mut data).unwrap();
        assert_eq!(data.skipped, 1);
        assert_eq!(data.agenda.len(), 1);
    }

    #[test]
    fn repeated_items_across_files_are_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let row = votes_row("2025-03-31", "I9", "5.", "5", "A carried-over item", "YES", "YES");
        let q1 = write_file(
            dir.path(),
            "Dallas-TX-2025-Q1-Votes.csv",
            &[VOTES_HEADER.to_string(), row.clone()],
        );
        let q2 = write_file(
            dir.path(),
            "Dallas-TX-2025-Q2-Votes.csv",
            &[VOTES_HEADER.to_string(), row],
        );
        let mut data = VotesData::default();
        read_votes(&q1, &mut data).unwrap();
        read_votes(&q2, &mut data).unwrap();
        assert_eq!(data.agenda.len(), 1);
        assert_eq!(data.roll_calls.len(), 2);
    }

    #[test]
    fn persons_rows_carry_their_period() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "Dallas-TX-2025-Q1-Persons.csv",
            &[
                "district,voter_name,title,first_seen,last_seen,vote_count".to_string(),
                "1,Ann Alpha,Councilmember,2024-01-10,2025-02-01,120".to_string(),
                "0,Mel Mayor,Mayor,2024-01-10,2025-02-01,118".to_string(),
                "bad row".to_string(),
            ],
        );
        let (rows, skipped) = read_persons(&path, "2025-Q1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(rows[0].period, "2025-Q1");
        assert_eq!(rows[0].district, Some(1));
        assert_eq!(rows[0].vote_count, Some(120));
        // District 0 is the reserved at-large seat.
        assert_eq!(rows[1].district, Some(0));
    }
}
