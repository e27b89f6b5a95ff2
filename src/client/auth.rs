//! Credentials and how they are obtained
//!
//! There are two ways in. The RightLink10 proxy accepts a shared secret read
//! from a local file (or given explicitly) and needs no round trip; it only
//! allows the calls an instance role may make. Going direct exchanges an API
//! refresh token for a bearer token once, when the client is built.

use std::path::Path;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use reqwest::RequestBuilder;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;

use super::query::QueryArgs;
use super::{ApiRequest, RightScaleApi};
use crate::error::{AuthError, ConfigError, Error, Result};

/// Header carrying the proxy shared secret
pub const SECRET_HEADER: &str = "X-RLL-Secret";

/// Token exchange endpoint for direct connections
pub const OAUTH_PATH: &str = "/api/oauth2";

static PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RS_RLL_PORT=(\d+)").expect("port regex"));
static SECRET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RS_RLL_SECRET=([A-Za-z0-9]+)").expect("secret regex"));
static HOST_PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([-A-Za-z0-9.]+):([0-9]+)$").expect("host:port regex"));

/// Credential attached to every request
#[derive(Clone)]
pub enum Credential {
    /// Shared secret for the local RightLink10 proxy
    Proxy { secret: String },
    /// OAuth bearer token from a direct token exchange
    Direct { access_token: String },
}

impl Credential {
    /// Attach this credential's header to an outgoing request
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Credential::Proxy { secret } => builder.header(SECRET_HEADER, secret),
            Credential::Direct { access_token } => {
                builder.header(AUTHORIZATION, format!("Bearer {}", access_token))
            }
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Credential::Proxy { .. })
    }
}

// Keep secrets out of debug output
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Proxy { .. } => f.write_str("Credential::Proxy(<hidden>)"),
            Credential::Direct { .. } => f.write_str("Credential::Direct(<hidden>)"),
        }
    }
}

/// Contents of the proxy secret file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySecret {
    pub port: u16,
    pub secret: String,
}

impl ProxySecret {
    /// Extract port and secret from the file text. Lines may come in any order
    /// and unrelated lines are ignored.
    pub fn parse(contents: &str, path: &Path) -> std::result::Result<Self, ConfigError> {
        let missing = |key| ConfigError::MissingSecretKey {
            key,
            path: path.to_path_buf(),
        };

        let port = PORT_RE
            .captures(contents)
            .and_then(|c| c[1].parse::<u16>().ok())
            .ok_or_else(|| missing("RS_RLL_PORT"))?;
        let secret = SECRET_RE
            .captures(contents)
            .map(|c| c[1].to_string())
            .ok_or_else(|| missing("RS_RLL_SECRET"))?;

        Ok(Self { port, secret })
    }

    /// Read and parse the secret file at `path`
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::SecretFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&contents, path)
    }
}

/// Where the proxy listens and the secret it expects
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub secret: String,
}

impl std::fmt::Debug for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl ProxyEndpoint {
    /// Resolve the proxy location.
    ///
    /// The secret file is only read when `host` or `secret` is missing;
    /// explicit values always win over what the file says.
    pub fn discover(
        host: Option<&str>,
        secret: Option<&str>,
        secret_file: &Path,
    ) -> std::result::Result<Self, ConfigError> {
        let explicit = host
            .map(|h| {
                // An explicit http:// scheme is allowed
                let bare = h.strip_prefix("http://").unwrap_or(h).trim_end_matches('/');
                let caps = HOST_PORT_RE
                    .captures(bare)
                    .ok_or_else(|| ConfigError::InvalidProxyHost(h.to_string()))?;
                let port = caps[2]
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidProxyHost(h.to_string()))?;
                Ok::<_, ConfigError>((caps[1].to_string(), port))
            })
            .transpose()?;

        match (explicit, secret) {
            (Some((host, port)), Some(secret)) => Ok(Self {
                host,
                port,
                secret: secret.to_string(),
            }),
            (explicit, secret) => {
                debug!("Reading proxy secret from {}", secret_file.display());
                let file = ProxySecret::load(secret_file)?;
                let (host, port) = explicit.unwrap_or_else(|| ("localhost".to_string(), file.port));
                Ok(Self {
                    host,
                    port,
                    secret: secret.map(str::to_string).unwrap_or(file.secret),
                })
            }
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn credential(&self) -> Credential {
        Credential::Proxy {
            secret: self.secret.clone(),
        }
    }
}

/// Exchange an API refresh token for a bearer credential.
///
/// `api` must be a client without credentials pointed at the API host.
pub async fn authenticate(api: &dyn RightScaleApi, api_key: &str) -> Result<Credential> {
    let query = QueryArgs::new()
        .with("grant_type", "refresh_token")
        .with("refresh_token", api_key);
    let request = ApiRequest::post(OAUTH_PATH).query(query);

    let response = match api.execute(&request).await {
        Ok(response) => response,
        Err(Error::Api(err)) => {
            let mut msg = err.to_string();
            let description = err
                .response()
                .and_then(|r| r.data.as_ref())
                .and_then(|d| d.get("error_description"))
                .and_then(Value::as_str);
            if let Some(description) = description {
                msg.push_str(&format!(" \"{}\"", description));
            }
            return Err(AuthError::Rejected(msg).into());
        }
        Err(err) => return Err(err),
    };

    let data = match response.data.as_ref().and_then(Value::as_object) {
        Some(data) if !data.is_empty() => data,
        _ => {
            let raw = String::from_utf8_lossy(&response.raw).into_owned();
            return Err(AuthError::InvalidResponse(raw).into());
        }
    };

    let access_token = data
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::MissingAccessToken(Value::Object(data.clone()).to_string()))?;

    if let Some(expires_in) = data.get("expires_in").and_then(Value::as_i64) {
        debug!("OAuth token obtained, expires in {}s", expires_in);
    }

    Ok(Credential::Direct {
        access_token: access_token.to_string(),
    })
}
