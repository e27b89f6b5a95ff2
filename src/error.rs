//! Error types for the rs-api CLI

use std::path::PathBuf;

use reqwest::{Method, StatusCode};
use thiserror::Error;

use crate::client::Response;

/// Result type alias for rs-api operations
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for request, response and extraction failures
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for configuration problems
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for rejected or malformed authentication
pub const EXIT_AUTH: i32 = 3;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A response was fetched but could not be turned into output.
    /// The body is kept so it can be shown for troubleshooting.
    #[error("{source}")]
    Output {
        #[source]
        source: Box<Error>,
        body: String,
    },
}

impl Error {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => EXIT_CONFIG,
            Error::Auth(_) => EXIT_AUTH,
            Error::Output { source, .. } => source.exit_code(),
            _ => EXIT_FAILURE,
        }
    }

    /// Extra text worth showing below the error line, usually a response body
    pub fn details(&self) -> Option<&str> {
        match self {
            Error::Api(api) => api.response().and_then(|r| r.error_message.as_deref()),
            Error::Output { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }

    /// Attach the response body that was being rendered when this error occurred
    pub fn with_body(self, body: &[u8]) -> Self {
        Error::Output {
            source: Box::new(self),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

/// Errors produced while talking to the API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed (connection, DNS, timeout)
    #[error("HTTP {method} {path}: {message}")]
    Transport {
        method: Method,
        path: String,
        message: String,
    },

    /// 4xx: the request needs fixing, never retried
    #[error("HTTP {method} {path}: {status}")]
    Client {
        method: Method,
        path: String,
        status: StatusCode,
        response: Box<Response>,
    },

    /// 5xx: retried, then surfaced
    #[error("HTTP {method} {path}: {status}")]
    Server {
        method: Method,
        path: String,
        status: StatusCode,
        response: Box<Response>,
    },

    /// Any other non-2xx status (1xx, unfollowed 3xx)
    #[error("HTTP {method} {path}: {status}")]
    Unexpected {
        method: Method,
        path: String,
        status: StatusCode,
        response: Box<Response>,
    },

    /// A 2xx body that claimed to be JSON but did not decode
    #[error("HTTP {method} {path}: error decoding json: {message}")]
    Serialization {
        method: Method,
        path: String,
        message: String,
        response: Box<Response>,
    },

    /// The request could not be built (bad URL, bad header value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Build a transport error from a reqwest failure
    pub fn transport(method: &Method, path: &str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "Request timed out".to_string()
        } else if err.is_connect() {
            format!("Failed to connect to API: {}", err)
        } else {
            err.to_string()
        };
        ApiError::Transport {
            method: method.clone(),
            path: path.to_string(),
            message,
        }
    }

    /// The response carried by an error-status failure, if any
    pub fn response(&self) -> Option<&Response> {
        match self {
            ApiError::Client { response, .. }
            | ApiError::Server { response, .. }
            | ApiError::Unexpected { response, .. }
            | ApiError::Serialization { response, .. } => Some(response),
            _ => None,
        }
    }

    /// HTTP status carried by an error-status failure, if any
    #[allow(dead_code)]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Client { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Unexpected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Reading proxy secret file {path}: {reason}")]
    SecretFile { path: PathBuf, reason: String },

    #[error("Cannot find or parse {key} in {path}")]
    MissingSecretKey { key: &'static str, path: PathBuf },

    #[error("API host not configured. Use --host or set RS_api_hostname.")]
    MissingHost,

    #[error("API key not configured. Use --key or set RS_api_key.")]
    MissingApiKey,

    #[error("Proxy host '{0}' is not of the form host:port")]
    InvalidProxyHost(String),

    #[error("resourceHref '{0}' is not valid")]
    InvalidResourceHref(String),

    #[error("argument '{0}' is not valid")]
    InvalidArgument(String),

    #[error("Cannot make query string from {0}")]
    InvalidQueryValue(String),

    #[error("Cannot retrieve self-href when not using RightLink proxy")]
    SelfHrefRequiresProxy,

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Direct-mode token exchange failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("OAuth failed: {0}")]
    Rejected(String),

    #[error("Invalid oauth response: <<{0}>>")]
    InvalidResponse(String),

    #[error("OAuth response doesn't have access token: {0}")]
    MissingAccessToken(String),
}

/// Selector parsing and extraction errors
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("Invalid selector '{expression}' at position {position}: {message}")]
    Parse {
        expression: String,
        position: usize,
        message: String,
    },

    #[error("No value could be selected")]
    NoMatch,

    #[error("Multiple values selected ({0} matches)")]
    MultipleMatches(usize),

    #[error("Response has no JSON body to select from")]
    NoDocument,

    #[error("Error printing selected value: {0}")]
    Encode(String),
}
