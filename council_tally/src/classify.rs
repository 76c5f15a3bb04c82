//! Derivation of item outcomes and classification tags from the free-text
//! fields of the sources. The keyword tables are authored data carried over
//! from the extraction research; the source text contains typos, so keyword
//! containment tolerates a single edit.

use crate::config::{ItemOutcome, NonVotedClass, Section};

/// Final-action keywords that indicate approval.
const APPROVAL_KEYWORDS: &[&str] = &[
    "APPROVED",
    "ADOPTED",
    "PASSED",
    "CONFIRMED",
    "ACCEPTED",
    "GRANTED",
    "SUSTAINED",
    "RATIFIED",
];

/// Final-action keywords that indicate denial or failure.
const DENIAL_KEYWORDS: &[&str] = &["DENIED", "REJECTED", "DEFEATED", "FAILED"];

/// Titles that are agenda section headers, not real items.
const SECTION_HEADERS: &[&str] = &[
    "AGENDA",
    "ORDER OF BUSINESS",
    "INVOCATION",
    "PLEDGE OF ALLEGIANCE",
    "OPEN MICROPHONE",
    "MINUTES",
    "CONSENT AGENDA",
    "ITEMS FOR INDIVIDUAL CONSIDERATION",
    "ADDITIONS",
    "ZONING",
    "PUBLIC HEARINGS AND RELATED ACTIONS",
    "ADJOURNMENT",
    "BRIEFINGS",
    "PRESENTATIONS",
];

/// Topic labels with the title keywords that select them.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Appointments",
        &["appointment", "board", "commission", "nominate", "nominee"],
    ),
    (
        "Budget & Finance",
        &[
            "budget",
            "appropriation",
            "revenue",
            "fiscal",
            "tax increment",
            "financing",
            "financial",
            "fund",
            "bond",
        ],
    ),
    (
        "Community Services",
        &[
            "library",
            "libraries",
            "social service",
            "community",
            "nonprofit",
            "non-profit",
            "youth",
            "senior",
        ],
    ),
    (
        "Contracts & Agreements",
        &[
            "contract",
            "agreement",
            "memorandum of understanding",
            "mou",
            "vendor",
            "procurement",
            "rfp",
            "supplemental agreement",
            "interlocal",
            "professional services",
        ],
    ),
    (
        "Economic Development",
        &[
            "economic development",
            "incentive",
            "redevelopment",
            "tif",
            "tax increment",
            "business",
            "commercial",
        ],
    ),
    (
        "Emergency Services",
        &[
            "police",
            "fire",
            "ems",
            "emergency",
            "disaster",
            "dpd",
            "fire-rescue",
            "public safety",
            "law enforcement",
        ],
    ),
    (
        "Health & Safety",
        &[
            "health",
            "safety",
            "code enforcement",
            "sanitation",
            "environmental",
            "hazardous",
            "pollution",
        ],
    ),
    (
        "Housing",
        &[
            "housing",
            "affordable",
            "residential",
            "tenant",
            "homeless",
            "shelter",
        ],
    ),
    (
        "Infrastructure",
        &[
            "infrastructure",
            "water",
            "sewer",
            "drainage",
            "storm",
            "utility",
            "utilities",
            "pipeline",
            "watershed",
            "dwu",
        ],
    ),
    (
        "Ordinances & Resolutions",
        &[
            "ordinance",
            "resolution",
            "municipal code",
            "amend",
            "chapter",
            "code amendment",
        ],
    ),
    (
        "Parks & Recreation",
        &["park", "recreation", "trail", "playground", "open space"],
    ),
    (
        "Planning & Development",
        &[
            "zoning",
            "land use",
            "planning",
            "permit",
            "plat",
            "specific use",
            "comprehensive plan",
            "variance",
            "planned development",
            "cpc",
        ],
    ),
    (
        "Property & Real Estate",
        &[
            "property",
            "real estate",
            "easement",
            "lease",
            "deed",
            "right-of-way",
            "right of way",
            "conveyance",
        ],
    ),
    (
        "Public Works",
        &[
            "street",
            "road",
            "maintenance",
            "waste",
            "sanitary",
            "facilities",
            "construction",
            "repair",
            "renovation",
            "design-build",
        ],
    ),
    (
        "Transportation",
        &[
            "transportation",
            "transit",
            "traffic",
            "signal",
            "dart",
            "pedestrian",
            "bicycle",
            "bike",
            "parking",
            "txdot",
            "highway",
            "freeway",
        ],
    ),
];

const MAX_TOPICS: usize = 3;

/// Keyword containment tolerant to a single-edit misspelling. Exact
/// substring containment is tried first; otherwise each word of the text is
/// compared to single-word keywords with an edit distance of at most one.
/// Short keywords stay exact so "FUND" does not absorb "FOUND".
fn fuzzy_contains(text_upper: &str, keyword: &str) -> bool {
    if text_upper.contains(keyword) {
        return true;
    }
    if keyword.len() < 5 || keyword.contains(' ') {
        return false;
    }
    text_upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| {
            word.len() + 1 >= keyword.len()
                && keyword.len() + 1 >= word.len()
                && strsim::levenshtein(word, keyword) <= 1
        })
}

fn fuzzy_contains_any(text_upper: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| fuzzy_contains(text_upper, kw))
}

/// Derives a voted item's outcome. Precedence: the explicit passed flag,
/// then keywords in the free-text final action, then the matter status.
/// Voted items with no signal default to passed, which is how consent
/// calendars read in the source data.
pub fn derive_outcome(passed: Option<bool>, final_action: &str, matter_status: &str) -> ItemOutcome {
    let fa = final_action.trim().to_uppercase();
    let ms = matter_status.trim().to_uppercase();

    match passed {
        Some(true) => return ItemOutcome::Passed,
        Some(false) => {
            // The flag settles pass/fail; the action text only refines the
            // failure flavor.
            if fuzzy_contains(&fa, "DENIED") {
                return ItemOutcome::Failed;
            }
            if fuzzy_contains(&fa, "DEFERRED") {
                return ItemOutcome::Continued;
            }
            if fuzzy_contains(&fa, "DELETED") {
                return ItemOutcome::Withdrawn;
            }
            return ItemOutcome::Failed;
        }
        None => {}
    }

    if fuzzy_contains_any(&fa, APPROVAL_KEYWORDS) || fuzzy_contains(&fa, "AMENDED") {
        return ItemOutcome::Passed;
    }
    if fuzzy_contains_any(&fa, DENIAL_KEYWORDS) {
        return ItemOutcome::Failed;
    }
    if fuzzy_contains(&fa, "DEFERRED") || fa.contains("HELD") || fuzzy_contains(&fa, "REMANDED") {
        return ItemOutcome::Continued;
    }
    if fuzzy_contains(&fa, "DELETED") || fuzzy_contains(&fa, "WITHDRAWN") {
        return ItemOutcome::Withdrawn;
    }
    if fuzzy_contains(&fa, "TABLED") {
        return ItemOutcome::Tabled;
    }

    if fuzzy_contains(&ms, "APPROVED") {
        return ItemOutcome::Passed;
    }
    if fuzzy_contains(&ms, "DEFERRED") {
        return ItemOutcome::Continued;
    }

    ItemOutcome::Passed
}

/// Classifies the agenda section an item was heard under.
pub fn classify_section(matter_status: &str, title: &str, agenda_info: &str) -> Section {
    let ms = matter_status.to_uppercase();
    let t = title.to_uppercase();
    let ai = agenda_info.to_uppercase();

    if ms.contains("HEARING") || t.contains("HEARING") || ai.contains("HEARING") {
        return Section::PublicHearing;
    }
    if ms.contains("CONSENT") || ai.contains("CONSENT") {
        return Section::Consent;
    }
    if ms.contains("INDIVIDUAL") || ai.contains("INDIVIDUAL") {
        return Section::General;
    }
    if t.contains("ZONING") {
        return Section::PublicHearing;
    }

    // Most council business moves on the consent calendar.
    Section::Consent
}

/// Assigns up to three topic tags based on title keywords.
pub fn classify_topics(title: &str) -> Vec<String> {
    if title.is_empty() {
        return vec!["General".to_string()];
    }
    let title_lower = title.to_lowercase();
    let mut matches: Vec<String> = Vec::new();
    for (topic, keywords) in TOPIC_KEYWORDS {
        if keywords.iter().any(|kw| title_lower.contains(kw)) {
            matches.push(topic.to_string());
        }
    }
    if matches.is_empty() {
        return vec!["General".to_string()];
    }
    matches.truncate(MAX_TOPICS);
    matches
}

/// Classifies an agenda item that carried no roll call.
pub fn classify_non_voted(
    title: &str,
    _matter_type: &str,
    matter_status: &str,
    final_action: &str,
) -> NonVotedClass {
    let t = title.trim().to_uppercase();
    let ms = matter_status.trim().to_uppercase();
    let fa = final_action.trim().to_uppercase();

    for header in SECTION_HEADERS {
        if t == *header || t.starts_with(&format!("{}\n", header)) {
            return NonVotedClass {
                category: "committee_header",
                importance: "medium",
                display_type: "section_header",
            };
        }
    }

    if (fa.contains("FIRST") && fa.contains("READ")) || t.contains("FIRST READING") {
        return NonVotedClass {
            category: "first_reading",
            importance: "high",
            display_type: "legislation",
        };
    }

    if fa.contains("READ") && fa.contains("FILED") {
        return NonVotedClass {
            category: "read_and_filed",
            importance: "low",
            display_type: "procedural",
        };
    }

    if fa.contains("ADOPTED") || ms.contains("APPROVED") {
        return NonVotedClass {
            category: "adopted_no_vote",
            importance: "medium",
            display_type: "legislation",
        };
    }

    if fa.contains("CORRECT") || ms.contains("CORRECT") {
        return NonVotedClass {
            category: "corrections",
            importance: "low",
            display_type: "procedural",
        };
    }

    if t.contains("HEARING") {
        return NonVotedClass {
            category: "other",
            importance: "medium",
            display_type: "legislation",
        };
    }

    NonVotedClass {
        category: "other",
        importance: "low",
        display_type: "procedural",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_wins_over_action_text() {
        // passed=1 beats a contradictory DENIED in the action text.
        assert_eq!(
            derive_outcome(Some(true), "DENIED", ""),
            ItemOutcome::Passed
        );
        assert_eq!(
            derive_outcome(Some(false), "DENIED", ""),
            ItemOutcome::Failed
        );
        assert_eq!(
            derive_outcome(Some(false), "DEFERRED TO NEXT SESSION", ""),
            ItemOutcome::Continued
        );
    }

    #[test]
    fn keywords_derive_outcome_without_flag() {
        assert_eq!(
            derive_outcome(None, "APPROVED AS AMENDED", ""),
            ItemOutcome::Passed
        );
        assert_eq!(derive_outcome(None, "MOTION FAILED", ""), ItemOutcome::Failed);
        assert_eq!(derive_outcome(None, "TABLED", ""), ItemOutcome::Tabled);
        assert_eq!(
            derive_outcome(None, "HELD UNDER ADVISEMENT", ""),
            ItemOutcome::Continued
        );
        assert_eq!(
            derive_outcome(None, "", "Approved as Briefed"),
            ItemOutcome::Passed
        );
    }

    #[test]
    fn misspelled_keywords_still_match() {
        // The source data contains single-edit typos like these.
        assert_eq!(derive_outcome(None, "APROVED", ""), ItemOutcome::Passed);
        assert_eq!(derive_outcome(None, "ADOPTD", ""), ItemOutcome::Passed);
        assert_eq!(derive_outcome(None, "DENID", ""), ItemOutcome::Failed);
    }

    #[test]
    fn short_keywords_stay_exact() {
        assert!(!fuzzy_contains("HELP WANTED", "HELD"));
        assert!(fuzzy_contains("APROVED BY COUNCIL", "APPROVED"));
        assert!(!fuzzy_contains("UNRELATED TEXT", "APPROVED"));
    }

    #[test]
    fn sections_classify_from_status_and_title() {
        assert_eq!(
            classify_section("PUBLIC HEARING", "", ""),
            Section::PublicHearing
        );
        assert_eq!(
            classify_section("", "A zoning change for district 2", ""),
            Section::PublicHearing
        );
        assert_eq!(
            classify_section("ITEMS FOR INDIVIDUAL CONSIDERATION", "", ""),
            Section::General
        );
        assert_eq!(classify_section("", "Authorize a contract", ""), Section::Consent);
    }

    #[test]
    fn topics_cap_at_three_with_general_fallback() {
        let topics = classify_topics(
            "Authorize a construction contract for street and water infrastructure near the park",
        );
        assert_eq!(topics.len(), 3);
        assert_eq!(classify_topics("Honoring a visiting delegation"), vec!["General"]);
        assert_eq!(classify_topics(""), vec!["General"]);
    }

    #[test]
    fn non_voted_items_classify() {
        let header = classify_non_voted("CONSENT AGENDA", "", "", "");
        assert_eq!(header.category, "committee_header");

        let first = classify_non_voted("An ordinance", "", "", "FIRST READING HELD");
        assert_eq!(first.category, "first_reading");
        assert_eq!(first.importance, "high");

        let filed = classify_non_voted("Communication", "", "", "READ AND FILED");
        assert_eq!(filed.category, "read_and_filed");

        let other = classify_non_voted("Briefing on operations", "", "", "");
        assert_eq!(other.category, "other");
        assert_eq!(other.display_type, "procedural");
    }
}
