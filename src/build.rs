// Orchestration of one site build: discover the quarterly CSV exports,
// correlate and aggregate them, emit the JSON documents, and report the
// per-row anomalies that were recovered along the way.

use log::{info, warn};
use snafu::{prelude::*, Snafu};

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::Path;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use council_tally::{
    run_council_tally, CurrentMemberRule, PersonRow, TallyOptions, TallyResult,
    DEFAULT_MATCH_THRESHOLD,
};

use crate::args::Args;

pub mod emit;
pub mod input;
pub mod io_csv;

#[derive(Debug, Snafu)]
pub enum BuildError {
    #[snafu(display("Input directory {path} is missing or unreadable"))]
    InputDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("No input files under {dir} match the year filter '{filter}'"))]
    NoInputFiles { dir: String, filter: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display(""))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error preparing output directory {path}"))]
    OutputDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingDoc {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Tally failed: {source}"))]
    Tally { source: council_tally::TallyErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type BuildResult<T> = Result<T, BuildError>;

/// The inclusive year range selecting input files, or the `all` sentinel.
/// Filtering happens at file granularity only.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum YearFilter {
    All,
    Range(u32, u32),
}

impl YearFilter {
    pub fn parse(s: &str) -> BuildResult<YearFilter> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("all") {
            return Ok(YearFilter::All);
        }
        if let Some((a, b)) = t.split_once('-') {
            match (a.trim().parse::<u32>(), b.trim().parse::<u32>()) {
                (Ok(start), Ok(end)) if start <= end => Ok(YearFilter::Range(start, end)),
                _ => whatever!("Cannot parse year range {:?}", s),
            }
        } else {
            match t.parse::<u32>() {
                Ok(year) => Ok(YearFilter::Range(year, year)),
                Err(_) => whatever!("Cannot parse year filter {:?}", s),
            }
        }
    }

    /// Files whose name embeds no year are undated and always pass.
    pub fn accepts(&self, year: Option<u32>) -> bool {
        match (self, year) {
            (YearFilter::All, _) => true,
            (_, None) => true,
            (YearFilter::Range(start, end), Some(y)) => *start <= y && y <= *end,
        }
    }
}

impl Display for YearFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YearFilter::All => write!(f, "all"),
            YearFilter::Range(a, b) if a == b => write!(f, "{}", a),
            YearFilter::Range(a, b) => write!(f, "{}-{}", a, b),
        }
    }
}

/// The resolved configuration of one build.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub input_dir: String,
    pub out_dir: String,
    pub years: YearFilter,
    pub aliases_path: Option<String>,
    pub match_threshold: f64,
    pub current_rule: CurrentMemberRule,
    pub reference: Option<String>,
}

impl BuildSettings {
    pub fn from_args(args: &Args) -> BuildResult<BuildSettings> {
        let years = match &args.years {
            Some(s) => YearFilter::parse(s)?,
            None => YearFilter::All,
        };
        let current_rule = match args.current_rule.as_deref() {
            None | Some("latest-roster") => CurrentMemberRule::LatestRoster,
            Some("last-seen") => CurrentMemberRule::LastSeen,
            Some(other) => whatever!("Unknown current-member rule {:?}", other),
        };
        Ok(BuildSettings {
            input_dir: args.input.clone().unwrap_or_else(|| "csv".to_string()),
            out_dir: args
                .out
                .clone()
                .unwrap_or_else(|| "frontend/data".to_string()),
            years,
            aliases_path: args.aliases.clone(),
            match_threshold: args.match_threshold.unwrap_or(DEFAULT_MATCH_THRESHOLD),
            current_rule,
            reference: args.reference.clone(),
        })
    }
}

/// An operator-maintained JSON object of raw name variant -> canonical name.
fn read_aliases(path: &str) -> BuildResult<Vec<(String, String)>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let table: BTreeMap<String, String> =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(table.into_iter().collect())
}

pub fn run_build(settings: &BuildSettings) -> BuildResult<()> {
    let inputs = input::discover(&settings.input_dir, &settings.years)?;
    // Voted-Items files are a derived subset of the Votes files and are
    // discovered but not re-read.
    info!(
        "Found {} Votes, {} Voted-Items, {} Persons files under {}",
        inputs.votes.len(),
        inputs.voted_items.len(),
        inputs.persons.len(),
        settings.input_dir
    );

    let mut persons: Vec<PersonRow> = Vec::new();
    let mut skipped = 0usize;
    for path in &inputs.persons {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let period = input::period_label(name).unwrap_or_default();
        let (mut rows, s) = io_csv::read_persons(path, &period)?;
        persons.append(&mut rows);
        skipped += s;
    }

    let mut data = io_csv::VotesData::default();
    for path in &inputs.votes {
        io_csv::read_votes(path, &mut data)?;
    }
    skipped += data.skipped;
    if skipped > 0 {
        warn!("Skipped {} malformed CSV rows", skipped);
    }

    let extra_aliases = match &settings.aliases_path {
        Some(path) => read_aliases(path)?,
        None => Vec::new(),
    };
    let options = TallyOptions {
        match_threshold: settings.match_threshold,
        current_rule: settings.current_rule,
        extra_aliases,
    };
    let mut result =
        run_council_tally(&data.agenda, &data.roll_calls, &persons, &options).context(TallySnafu)?;
    result.report.skipped_rows = skipped;

    emit::emit_all(Path::new(&settings.out_dir), &result)?;
    print_summary(&settings.out_dir, &result);

    if let Some(reference_path) = &settings.reference {
        check_reference(reference_path, &result)?;
    }
    Ok(())
}

/// The build-summary report: entity counts plus every recovered anomaly.
fn print_summary(out_dir: &str, result: &TallyResult) {
    let report = &result.report;
    println!("Build complete, documents written to {}", out_dir);
    println!("  meetings:     {}", result.meetings.len());
    println!(
        "  agenda items: {} ({} synthetic)",
        result.items.len(),
        result.items.iter().filter(|i| i.synthetic).count()
    );
    println!(
        "  roll calls:   {} ({} matched, {} unmatched)",
        result.votes.len(),
        report.matched_groups,
        report.unmatched_groups
    );
    println!("  members:      {}", result.members.len());
    if report.skipped_rows > 0 {
        println!("  skipped rows: {}", report.skipped_rows);
    }
    if !report.unknown_vote_tokens.is_empty() {
        println!("  unknown vote tokens: {:?}", report.unknown_vote_tokens);
    }
    if !report.unknown_name_variants.is_empty() {
        println!(
            "  unmapped name variants (extend the alias table): {:?}",
            report.unknown_name_variants
        );
    }
    if !report.unrostered_voters.is_empty() {
        println!(
            "  voters missing from the roster files: {:?}",
            report.unrostered_voters
        );
    }
}

fn read_reference(path: &str) -> BuildResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

/// Compares the generated statistics against a reference document, printing
/// a diff on mismatch.
fn check_reference(path: &str, result: &TallyResult) -> BuildResult<()> {
    let reference = read_reference(path)?;
    let stats = emit::stats_json(result);
    let pretty_reference =
        serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
    let pretty_stats = serde_json::to_string_pretty(&stats).context(ParsingJsonSnafu {})?;
    if pretty_reference != pretty_stats {
        warn!("Found differences with the reference document");
        print_diff(pretty_reference.as_str(), pretty_stats.as_ref(), "\n");
        whatever!("Difference detected between generated statistics and the reference document");
    }
    Ok(())
}
