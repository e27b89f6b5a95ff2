//! Request/response recording for replay tests
//!
//! With `--record <file>` every completed HTTP exchange of a command is
//! captured, and once the command finishes one entry holding the scrubbed
//! arguments, exit code, stdout and exchanges is appended to the file.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Request headers never written to a recording
const STRIPPED_REQUEST_HEADERS: &[&str] = &["authorization", "x-rll-secret", "user-agent"];

/// Response headers dropped to keep recordings small and stable
const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "cache-control",
    "connection",
    "set-cookie",
    "strict-transport-security",
    "x-request-uuid",
    "date",
    "content-length",
];

/// Placeholder written instead of a real API key
pub const RECORDED_KEY: &str = "test-key";

/// One HTTP exchange as stored in a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub verb: String,
    /// Full request URL including the query string
    pub uri: String,
    #[serde(default)]
    pub req_header: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub req_body: String,
    pub status: u16,
    #[serde(default)]
    pub resp_header: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub resp_body: String,
}

impl Exchange {
    pub fn new(
        method: &Method,
        uri: &str,
        req_headers: &HeaderMap,
        req_body: Option<&str>,
        status: StatusCode,
        resp_headers: &HeaderMap,
        resp_body: &[u8],
    ) -> Self {
        Self {
            verb: method.to_string(),
            uri: uri.to_string(),
            req_header: header_table(req_headers, STRIPPED_REQUEST_HEADERS),
            req_body: req_body.unwrap_or_default().to_string(),
            status: status.as_u16(),
            resp_header: header_table(resp_headers, STRIPPED_RESPONSE_HEADERS),
            resp_body: String::from_utf8_lossy(resp_body).into_owned(),
        }
    }
}

fn header_table(headers: &HeaderMap, stripped: &[&str]) -> BTreeMap<String, Vec<String>> {
    let mut table: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        if stripped.contains(&name.as_str()) {
            continue;
        }
        table
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    table
}

/// Receives completed exchanges from the client
pub trait ExchangeSink: Send + Sync {
    fn record(&self, exchange: Exchange) -> Result<()>;
}

/// Collects the exchanges of one command in memory
#[derive(Debug, Default)]
pub struct Recorder {
    exchanges: Mutex<Vec<Exchange>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in order
    pub fn exchanges(&self) -> Vec<Exchange> {
        match self.exchanges.lock() {
            Ok(exchanges) => exchanges.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ExchangeSink for Recorder {
    fn record(&self, exchange: Exchange) -> Result<()> {
        match self.exchanges.lock() {
            Ok(mut exchanges) => exchanges.push(exchange),
            Err(poisoned) => poisoned.into_inner().push(exchange),
        }
        Ok(())
    }
}

/// One recorded command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingEntry {
    pub cmd_args: Vec<String>,
    pub exit_code: i32,
    pub stdout: String,
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl RecordingEntry {
    pub fn new(cmd_args: Vec<String>, exit_code: i32, stdout: String, exchanges: Vec<Exchange>) -> Self {
        Self {
            cmd_args,
            exit_code,
            stdout,
            exchanges,
            recorded_at: Some(Utc::now()),
        }
    }

    /// Append this entry to `path`, creating the file if needed
    pub fn append_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        write!(file, "\n{}\n", json)?;
        Ok(())
    }
}

/// Read every entry of a recording file (a stream of JSON objects)
#[allow(dead_code)]
pub fn read_entries(contents: &str) -> Result<Vec<RecordingEntry>> {
    let entries = serde_json::Deserializer::from_str(contents)
        .into_iter::<RecordingEntry>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Command-line arguments as they should appear in a recording.
///
/// `--record <file>` and `--host <host>` are dropped, and the value after
/// `--key` becomes a placeholder.
pub fn capture_cmd_args<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    let mut recorded = Vec::with_capacity(args.len());
    let mut iter = args.iter().map(AsRef::as_ref);
    while let Some(arg) = iter.next() {
        match arg {
            "--record" | "--host" => {
                iter.next();
            }
            "--key" => {
                recorded.push(arg.to_string());
                recorded.push(RECORDED_KEY.to_string());
                iter.next();
            }
            _ => recorded.push(arg.to_string()),
        }
    }
    recorded
}
