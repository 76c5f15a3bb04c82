// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// Matter (legislation) metadata carried by an agenda item, when the item
/// tracks a piece of legislation. All fields may be empty for procedural
/// items.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct MatterInfo {
    pub file: String,
    /// The matter type label from the source system (RESOLUTION, ORDINANCE, ...).
    pub kind: String,
    pub status: String,
    pub id: String,
    pub title: String,
    pub intro_date: String,
    pub enactment_number: String,
    pub requester: String,
    pub body_name: String,
}

/// Links to the published documents for a meeting.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct DocumentLinks {
    pub agenda: String,
    pub minutes: String,
    pub video: String,
    pub attachments: Vec<String>,
}

/// One line item of a meeting agenda, as published by the legislative
/// calendar source. This side of the join carries the legislative metadata
/// but no per-member votes.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct AgendaRow {
    pub event_id: String,
    /// ISO date (YYYY-MM-DD) of the meeting.
    pub date: String,
    pub time: String,
    pub body: String,
    pub location: String,
    /// The source system's item identifier, kept for display and debugging.
    pub item_id: String,
    /// Raw display number; the calendar source writes trailing periods ("62.").
    pub agenda_number: String,
    pub sequence: Option<u32>,
    pub title: String,
    pub matter: MatterInfo,
    /// Explicit passed flag when the source recorded one.
    pub passed: Option<bool>,
    pub final_action: String,
    pub agenda_info: String,
    pub links: DocumentLinks,
}

/// One per-member roll-call entry from the open-data vote source. A full
/// roll call is a group of these sharing (date, item number).
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RollCallRow {
    pub date: String,
    /// Raw agenda item number on the vote side; plain, without trailing periods.
    pub item_number: String,
    pub description: String,
    pub item_type: String,
    pub final_action: String,
    /// Raw, not normalized. Variants are resolved by the name normalizer.
    pub voter_name: String,
    /// Raw vote token (YES, NO, AWVT, ...). Mapped by the vote code mapper.
    pub vote: String,
}

/// One roster row from a Persons file.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct PersonRow {
    /// The quarter the file covers, e.g. "2025-Q2". Used to pick the most
    /// recent roster snapshot.
    pub period: String,
    /// District 1..N; 0 is the reserved at-large (mayoral) seat.
    pub district: Option<u32>,
    pub voter_name: String,
    pub title: String,
    pub first_seen: String,
    pub last_seen: String,
    pub vote_count: Option<u64>,
}

/// A normalized vote value. The mapper is closed: tokens outside the fixed
/// table surface as `Unknown` and are never coerced to a real vote.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum VoteValue {
    Aye,
    Nay,
    Absent,
    Abstain,
    /// The member held no seat when this vote was taken. Recorded as a
    /// distinct value rather than omitted, so a roll call always covers the
    /// roster observed for its row.
    NotApplicable,
    Empty,
    Unknown,
}

impl VoteValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteValue::Aye => "AYE",
            VoteValue::Nay => "NAY",
            VoteValue::Absent => "ABSENT",
            VoteValue::Abstain => "ABSTAIN",
            VoteValue::NotApplicable => "NOT_APPLICABLE",
            VoteValue::Empty => "EMPTY",
            VoteValue::Unknown => "UNKNOWN_CODE",
        }
    }

    /// True for the values that count toward a member's statistics.
    pub fn is_counted(&self) -> bool {
        matches!(
            self,
            VoteValue::Aye | VoteValue::Nay | VoteValue::Absent | VoteValue::Abstain
        )
    }

    /// True when the member actually cast a position (used for alignment).
    pub fn is_cast(&self) -> bool {
        matches!(self, VoteValue::Aye | VoteValue::Nay)
    }
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct MemberId(pub u32);

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct MeetingId(pub u32);

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct ItemId(pub u32);

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct VoteId(pub u32);

/// Outcome of an agenda item.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ItemOutcome {
    Passed,
    Failed,
    Continued,
    Withdrawn,
    Tabled,
    NoVote,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Passed => "PASS",
            ItemOutcome::Failed => "FAIL",
            ItemOutcome::Continued => "CONTINUED",
            ItemOutcome::Withdrawn => "WITHDRAWN",
            ItemOutcome::Tabled => "TABLED",
            ItemOutcome::NoVote => "NO_VOTE",
        }
    }

    /// The outcomes that resolve to a decision, as opposed to deferrals.
    pub fn is_decided(&self) -> bool {
        matches!(self, ItemOutcome::Passed | ItemOutcome::Failed)
    }
}

/// Agenda section an item was heard under.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Section {
    Consent,
    General,
    PublicHearing,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Consent => "CONSENT",
            Section::General => "GENERAL",
            Section::PublicHearing => "PUBLIC_HEARING",
        }
    }
}

/// Classification of an agenda item that carried no roll call.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct NonVotedClass {
    pub category: &'static str,
    pub importance: &'static str,
    pub display_type: &'static str,
}

/// One legislative session. One record per unique (date, body) pair.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MeetingRecord {
    pub id: MeetingId,
    pub event_id: String,
    pub date: String,
    pub body: String,
    pub location: String,
    pub links: DocumentLinks,
}

/// One line item on a meeting's agenda, matched or synthetic.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AgendaItemRecord {
    pub id: ItemId,
    pub meeting: MeetingId,
    pub date: String,
    /// Display number: the raw number with trailing periods stripped, or the
    /// sequence position when the source carried no number.
    pub number: String,
    pub sequence: u32,
    pub title: String,
    /// The matter title, when one exists; used as the long description.
    pub description: String,
    pub matter: MatterInfo,
    pub final_action: String,
    pub outcome: ItemOutcome,
    pub section: Section,
    pub topics: Vec<String>,
    /// Set for items without a roll call.
    pub non_voted: Option<NonVotedClass>,
    /// The roll call taken on this item, if any.
    pub vote: Option<VoteId>,
    /// True when the item was reconstructed from an unmatched vote group and
    /// carries no legislative metadata.
    pub synthetic: bool,
    pub item_id: String,
}

/// One roll-call event. Ballots cover every member column observed for the
/// source row, including `NotApplicable` and `Empty` entries.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteRecord {
    pub id: VoteId,
    pub item: ItemId,
    pub meeting: MeetingId,
    pub date: String,
    pub outcome: ItemOutcome,
    /// Sorted by member id.
    pub ballots: Vec<(MemberId, VoteValue)>,
    pub ayes: u32,
    pub noes: u32,
    pub abstain: u32,
    pub absent: u32,
}

/// Aggregate voting statistics for one member, over the filtered range.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct MemberStats {
    pub total_votes: u32,
    pub aye_count: u32,
    pub nay_count: u32,
    pub abstain_count: u32,
    pub absent_count: u32,
    pub aye_percentage: f64,
    pub participation_rate: f64,
    pub dissent_rate: f64,
    pub votes_on_losing_side: u32,
    pub votes_on_winning_side: u32,
    /// Dissents on votes decided by a margin of two or fewer.
    pub close_vote_dissents: u32,
}

/// One council seat-holder.
#[derive(PartialEq, Debug, Clone)]
pub struct MemberRecord {
    pub id: MemberId,
    pub name: String,
    pub short_name: String,
    pub district: Option<u32>,
    pub position: String,
    pub first_seen: String,
    pub last_seen: String,
    pub is_current: bool,
    /// Raw spellings observed for this member, for alias-table maintenance.
    pub raw_names: Vec<String>,
    pub titles: Vec<String>,
    pub stats: MemberStats,
}

/// Agreement between two currently-seated members over their shared votes.
#[derive(PartialEq, Debug, Clone)]
pub struct AlignmentPair {
    pub member1: MemberId,
    pub member2: MemberId,
    pub shared_votes: u32,
    pub agreements: u32,
    pub agreement_rate: f64,
}

/// Per-build anomaly counts. Everything here was recovered locally, not
/// fatal; the operator uses it to maintain the alias table and spot new
/// vote tokens.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct BuildReport {
    pub matched_groups: usize,
    pub unmatched_groups: usize,
    pub skipped_rows: usize,
    pub unknown_vote_tokens: Vec<String>,
    pub unknown_name_variants: Vec<String>,
    pub unrostered_voters: Vec<String>,
}

/// Everything one build produces. Identifiers are assigned from 1 in a
/// deterministic traversal and have no meaning across builds.
#[derive(PartialEq, Debug, Clone)]
pub struct TallyResult {
    pub meetings: Vec<MeetingRecord>,
    pub items: Vec<AgendaItemRecord>,
    pub votes: Vec<VoteRecord>,
    pub members: Vec<MemberRecord>,
    pub alignment: Vec<AlignmentPair>,
    pub report: BuildReport,
}

/// Errors that prevent the aggregation from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyErrors {
    EmptyInput,
    InvalidThreshold,
}

impl Error for TallyErrors {}

impl Display for TallyErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TallyErrors::EmptyInput => write!(f, "no agenda or roll-call rows to process"),
            TallyErrors::InvalidThreshold => {
                write!(f, "match threshold must lie within [0, 1]")
            }
        }
    }
}

// ********* Configuration **********

/// How "current member" status is determined. The source documentation is
/// ambiguous on this point, so it is an explicit choice rather than a guess.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum CurrentMemberRule {
    /// Current if the member appears in the most recent roster snapshot
    /// within the active filter.
    LatestRoster,
    /// Current if the member's merged last-seen date equals the newest
    /// last-seen date in the filtered data.
    LastSeen,
}

/// The tuning knobs of one build.
#[derive(PartialEq, Debug, Clone)]
pub struct TallyOptions {
    /// Acceptance threshold for the text-similarity fallback. A candidate is
    /// accepted only when its score is strictly greater than this.
    pub match_threshold: f64,
    pub current_rule: CurrentMemberRule,
    /// Operator-supplied alias pairs merged over the built-in table.
    pub extra_aliases: Vec<(String, String)>,
}

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.85;

impl Default for TallyOptions {
    fn default() -> TallyOptions {
        TallyOptions {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            current_rule: CurrentMemberRule::LatestRoster,
            extra_aliases: Vec::new(),
        }
    }
}
