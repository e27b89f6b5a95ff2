//! The request/response pipeline behind every command
//!
//! Takes a parsed invocation and a client, performs exactly one API call (plus
//! the lookups `self` needs) and produces the text and exit code for `main`.

use log::debug;

use crate::client::{ApiRequest, QueryArgs, RightScaleApi};
use crate::error::{Error, Result};
use crate::output::{self, Extraction};

pub mod action;
pub mod self_href;

pub use action::{ResourceHref, Route};

/// One command as typed by the user
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub action: String,
    pub resource_href: String,
    /// `key=value` query arguments
    pub arguments: Vec<String>,
    pub extraction: Extraction,
    pub pretty: bool,
}

/// Everything a command produces; printing and exiting is left to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Outcome {
    pub fn success(stdout: String) -> Self {
        Self {
            exit_code: 0,
            stdout,
            stderr: String::new(),
        }
    }

    /// The error line, followed by the response body when there is one
    pub fn failure(err: &Error) -> Self {
        let mut stderr = err.to_string();
        if let Some(details) = err.details() {
            stderr.push('\n');
            stderr.push_str(details);
        }
        Self {
            exit_code: err.exit_code(),
            stdout: String::new(),
            stderr,
        }
    }

    #[allow(dead_code)]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `invocation` against `api`
pub async fn execute(api: &dyn RightScaleApi, invocation: &Invocation) -> Outcome {
    match run(api, invocation).await {
        Ok(stdout) => Outcome::success(stdout),
        Err(err) => {
            debug!("Command failed: {:?}", err);
            Outcome::failure(&err)
        }
    }
}

async fn run(api: &dyn RightScaleApi, invocation: &Invocation) -> Result<String> {
    let query = QueryArgs::from_cli_args(&invocation.arguments)?;

    let href = match ResourceHref::parse(&invocation.resource_href)? {
        ResourceHref::SelfHref => self_href::resolve(api).await?,
        ResourceHref::Path(path) => path,
    };

    let route = Route::resolve(&invocation.action, &href);
    debug!("{} {} -> {} {}", invocation.action, invocation.resource_href, route.method, route.path);

    let request = ApiRequest::new(route.method, route.path).query(query);
    let response = api.execute(&request).await?;

    output::render(&response, &invocation.extraction, invocation.pretty)
        .map_err(|err| err.with_body(&response.raw))
}
