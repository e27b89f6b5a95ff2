//! Global CLI options
//!
//! Connection and logging flags gathered into one struct so configuration
//! resolution does not depend on the clap types.

use std::path::PathBuf;

use crate::cli::Cli;

/// Connection, configuration and recording flags.
///
/// # Precedence
///
/// The precedence is: CLI flag > environment variable > config file > default.
/// This struct captures the CLI/env layer; config file defaults are resolved
/// later by `Settings::resolve`.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// API host, or `host:port` of the RightLink10 proxy
    pub host: Option<String>,

    /// API refresh token, or the proxy secret in RL10 mode
    pub key: Option<String>,

    pub account: Option<String>,

    pub api_version: Option<String>,

    /// Go through the RightLink10 proxy
    pub rl10: bool,

    pub secret_file: Option<PathBuf>,

    /// Custom config file path (defaults to ~/.rs-api/config.yaml)
    pub config: Option<PathBuf>,

    pub debug: bool,

    /// Append a recording of this command to the given file
    pub record: Option<PathBuf>,
}

impl GlobalOptions {
    /// Create GlobalOptions from a parsed CLI struct.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            host: cli.host.clone(),
            key: cli.key.clone(),
            account: cli.account.clone(),
            api_version: cli.api_version.clone(),
            rl10: cli.rl10,
            secret_file: cli.secret_file.clone(),
            config: cli.config.clone(),
            debug: cli.debug,
            record: cli.record.clone(),
        }
    }
}
