//! Response classification
//!
//! The body of every exchange is read into an owned buffer exactly once. JSON
//! decoding, logging and recording all work from that buffer, so nothing
//! depends on the transport stream being readable twice.

use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Outcome of one HTTP exchange
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Body exactly as received, captured before any decoding
    pub raw: Vec<u8>,
    /// Decoded body, `None` when the body was empty (or undecodable on error)
    pub data: Option<Value>,
    /// Body text (or status line) of an error-status response
    pub error_message: Option<String>,
}

impl Response {
    /// First value of the named header, if present and printable
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Location` header, set on creates and redirects
    #[allow(dead_code)]
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }
}

/// Decode a body as JSON. An empty (or all-whitespace) body is no data, not an error.
pub fn parse_body(raw: &[u8]) -> std::result::Result<Option<Value>, serde_json::Error> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(raw).map(Some)
}

/// Success is 200 up to but excluding 299
fn is_success(status: StatusCode) -> bool {
    (200..299).contains(&status.as_u16())
}

/// Turn a completed exchange into a `Response`, or an error carrying it.
///
/// `path` is the request path without the query string and only serves as
/// context in error messages.
pub fn classify(
    method: &Method,
    path: &str,
    status: StatusCode,
    headers: HeaderMap,
    raw: Vec<u8>,
) -> Result<Response> {
    if is_success(status) {
        let data = match parse_body(&raw) {
            Ok(data) => data,
            Err(e) => {
                let error_message = String::from_utf8_lossy(&raw).into_owned();
                return Err(ApiError::Serialization {
                    method: method.clone(),
                    path: path.to_string(),
                    message: e.to_string(),
                    response: Box::new(Response {
                        status,
                        headers,
                        raw,
                        data: None,
                        error_message: Some(error_message),
                    }),
                }
                .into());
            }
        };
        return Ok(Response {
            status,
            headers,
            raw,
            data,
            error_message: None,
        });
    }

    // Structured error bodies (e.g. `error_description`) stay reachable through `data`
    let data = parse_body(&raw).ok().flatten();
    let error_message = if raw.is_empty() {
        status.to_string()
    } else {
        String::from_utf8_lossy(&raw).into_owned()
    };

    let response = Box::new(Response {
        status,
        headers,
        raw,
        data,
        error_message: Some(error_message),
    });
    let method = method.clone();
    let path = path.to_string();

    let err = if status.is_client_error() {
        ApiError::Client {
            method,
            path,
            status,
            response,
        }
    } else if status.is_server_error() {
        ApiError::Server {
            method,
            path,
            status,
            response,
        }
    } else {
        ApiError::Unexpected {
            method,
            path,
            status,
            response,
        }
    };
    Err(err.into())
}
