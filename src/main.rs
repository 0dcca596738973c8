//! Songbook CLI entry point.

use std::{io, process, str::FromStr};

use clap::Parser;
use log::{debug, info, LevelFilter};

use songbook::cli::{self, Args};
use songbook::config::Config;

fn main() {
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    let level = args.effective_log_level(&config);
    let log_level = LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {level}. Using 'warn' instead.");
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    info!("songbook v{}", env!("CARGO_PKG_VERSION"));
    debug!("{args:?}");

    let stdout = io::stdout();
    if let Err(err) = cli::run(&args, &config, &mut stdout.lock()) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
