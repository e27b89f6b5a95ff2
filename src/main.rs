//! rs-api - command line client for the RightScale API and the RightLink10 proxy

use std::ffi::OsString;
use std::io::Write;

use clap::Parser;
use colored::Colorize;

mod cli;
mod client;
mod config;
mod error;
mod output;
mod pipeline;
mod recording;
mod select;

use cli::Cli;

#[tokio::main]
async fn main() {
    let args: Vec<OsString> = std::env::args_os().collect();
    let cli = Cli::parse_from(&args);
    init_logging(cli.debug);

    let raw_args = cli::lossy_args(args.get(1..).unwrap_or_default());
    let outcome = cli::run(&cli, &raw_args).await;

    if !outcome.stderr.is_empty() {
        eprintln!("{} {}", "Error:".red().bold(), outcome.stderr);
    }

    // process::exit skips destructors, so flush explicitly
    let mut stdout = std::io::stdout().lock();
    if let Err(err) = stdout
        .write_all(outcome.stdout.as_bytes())
        .and_then(|()| stdout.flush())
    {
        log::warn!("Cannot write output: {}", err);
    }

    std::process::exit(outcome.exit_code);
}

/// Logs go to stderr. `--debug` turns on this crate's debug output;
/// `RUST_LOG` overrides both.
fn init_logging(debug: bool) {
    let default_filter = if debug { "rs_api=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
}
