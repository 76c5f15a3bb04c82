use clap::Parser;

/// Builds the JSON documents for a council voting-record site from
/// quarterly CSV exports.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (directory path) The directory holding the quarterly CSV exports,
    /// named {City}-{State}-{Year}-Q{Quarter}-{Votes,Voted-Items,Persons}.csv.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (directory path) Where the generated JSON documents are written. The
    /// directory is cleared before each build so no stale documents survive.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (year filter) 'all', a single year ('2024') or an inclusive range
    /// ('2023-2025'). Files without a recognizable year in their name are
    /// always included.
    #[clap(short, long, value_parser)]
    pub years: Option<String>,

    /// (file path or empty) A JSON object mapping raw voter-name variants to
    /// canonical names, merged over the built-in alias table.
    #[clap(long, value_parser)]
    pub aliases: Option<String>,

    /// (0.0-1.0, default 0.85) Acceptance threshold for the text-similarity
    /// fallback used when a vote group has no agenda number match.
    #[clap(long, value_parser)]
    pub match_threshold: Option<f64>,

    /// ('latest-roster' or 'last-seen', default latest-roster) How current
    /// council membership is determined.
    #[clap(long, value_parser)]
    pub current_rule: Option<String>,

    /// (file path) A reference statistics document in JSON format. If
    /// provided, cityvotes will check that the generated statistics match
    /// the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
