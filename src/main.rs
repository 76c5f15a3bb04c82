use clap::Parser;
use snafu::ErrorCompat;

mod args;
mod build;

fn main() {
    let parsed = args::Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if parsed.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let res = build::BuildSettings::from_args(&parsed)
        .and_then(|settings| build::run_build(&settings));
    if let Err(e) = res {
        eprintln!("An error occurred: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
