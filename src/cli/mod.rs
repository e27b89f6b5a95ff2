//! CLI definition and command runner

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::pipeline::{self, Invocation, Outcome};
use crate::recording;

pub mod args;
pub mod context;

pub use args::{ExtractArgs, GlobalOptions};
pub use context::CommandContext;

const LONG_ABOUT: &str = "\
rs-api issues API requests to the RightScale platform or to RightLink10, either directly or
through the proxy built into RightLink10. The command line follows the REST API documentation
closely: each request is anchored at a resource-href such as /api/servers or
/api/clouds/1/instances/123, performs an action on it (index, show, destroy, launch, ...) and
takes the unescaped parameters, e.g. server[instance][href]=/api/clouds/1/instances/123.

Shortcuts: `self` denotes the instance's own href (RightLink10 proxy only) and a single word is
expanded to /api/<word>.

By default the JSON response is printed. Use --x1, --xm or --xj to extract values with a
JSON:select expression instead, or --xh to print a response header.

Non-zero exit codes indicate a problem.";

/// RightScale/RightLink10 API command line client
#[derive(Parser, Debug)]
#[command(name = "rs-api")]
#[command(version, about, long_about = LONG_ABOUT)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Enable verbose request and response logging
    #[arg(long, env = "RS_API_DEBUG", hide_env = true)]
    pub debug: bool,

    /// host[:port] of the API endpoint or RightLink10 proxy
    #[arg(long)]
    pub host: Option<String>,

    /// RightScale API key, or the RightLink10 proxy secret
    #[arg(long)]
    pub key: Option<String>,

    /// Account ID sent with every request
    #[arg(long, env = "RS_ACCOUNT", hide_env = true)]
    pub account: Option<String>,

    /// API version header value [default: 1.5]
    #[arg(long, env = "RS_API_VERSION", hide_env = true)]
    pub api_version: Option<String>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Use the RightLink10 proxy and auto-detect port and secret unless given
    #[arg(long)]
    pub rl10: bool,

    /// Location of the RightLink10 proxy secret file
    #[arg(long, value_name = "PATH", env = "RS_RLL_SECRET_FILE", hide_env = true)]
    pub secret_file: Option<PathBuf>,

    /// Override config file location
    #[arg(long, value_name = "PATH", env = "RS_API_CONFIG", hide_env = true)]
    pub config: Option<PathBuf>,

    /// For test generation: append a recording of this request to FILE
    #[arg(long, value_name = "FILE")]
    pub record: Option<PathBuf>,

    #[command(flatten)]
    pub extract: ExtractArgs,

    /// Name of the action, e.g. index, show, create, destroy, launch
    pub action: String,

    /// Href of the resource to operate on, or a shortcut: servers, self, ...
    pub resource_href: String,

    /// Arguments to the API call, e.g. 'server[instance][href]=/api/instances/1'
    pub parameters: Vec<String>,
}

impl Cli {
    pub fn invocation(&self) -> Invocation {
        Invocation {
            action: self.action.clone(),
            resource_href: self.resource_href.clone(),
            arguments: self.parameters.clone(),
            extraction: self.extract.extraction(),
            pretty: self.pretty,
        }
    }
}

/// Process arguments as text for the recording. Non-UTF-8 bytes are replaced.
pub fn lossy_args(args: &[OsString]) -> Vec<String> {
    args.iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

/// Run one command. `raw_args` are the process arguments without the
/// program name and only feed the recording.
pub async fn run(cli: &Cli, raw_args: &[String]) -> Outcome {
    let options = GlobalOptions::from_cli(cli);

    let ctx = match CommandContext::new(&options).await {
        Ok(ctx) => ctx,
        Err(err) => return Outcome::failure(&err),
    };

    let outcome = pipeline::execute(&ctx.client, &cli.invocation()).await;
    ctx.save_recording(recording::capture_cmd_args(raw_args), &outcome);
    outcome
}
