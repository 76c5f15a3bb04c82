// Discovery of the quarterly CSV exports and the filename-based year filter.

use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use snafu::prelude::*;

use crate::build::{BuildResult, InputDirSnafu, NoInputFilesSnafu, YearFilter};

/// The CSV files selected for one build, one list per file type, sorted by
/// name so quarterly periods are traversed in order.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct InputSet {
    pub votes: Vec<PathBuf>,
    pub voted_items: Vec<PathBuf>,
    pub persons: Vec<PathBuf>,
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})-Q(\d)").unwrap())
}

/// The 4-digit year immediately preceding -Q<digit> in a file name, if any.
pub fn filename_year(name: &str) -> Option<u32> {
    year_re()
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// The "{year}-Q{quarter}" period label embedded in a file name.
pub fn period_label(name: &str) -> Option<String> {
    year_re()
        .captures(name)
        .map(|c| format!("{}-Q{}", &c[1], &c[2]))
}

/// Scans `dir` for the {City}-{State}-{Year}-Q{Quarter}-{Type}.csv naming
/// convention and applies the year filter. Files whose name embeds no year
/// are treated as undated and always included. Finding no Votes file at all
/// is a configuration error, not an empty build.
pub fn discover(dir: &str, years: &YearFilter) -> BuildResult<InputSet> {
    let entries = fs::read_dir(dir).context(InputDirSnafu { path: dir })?;
    let mut set = InputSet::default();
    for entry in entries {
        let entry = entry.context(InputDirSnafu { path: dir })?;
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if !years.accepts(filename_year(&name)) {
            debug!("discover: {} rejected by year filter", name);
            continue;
        }
        if name.ends_with("-Votes.csv") {
            set.votes.push(path);
        } else if name.ends_with("-Voted-Items.csv") {
            set.voted_items.push(path);
        } else if name.ends_with("-Persons.csv") {
            set.persons.push(path);
        }
    }
    set.votes.sort();
    set.voted_items.sort();
    set.persons.sort();

    if set.votes.is_empty() {
        return NoInputFilesSnafu {
            dir,
            filter: years.to_string(),
        }
        .fail();
    }
    Ok(set)
}
