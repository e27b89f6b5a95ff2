//! Configuration management for rs-api
//!
//! Settings come from, in order of precedence: command-line flags,
//! environment variables, an optional YAML file and built-in defaults.
//! Flags and most environment variables are handled by clap; the direct-mode
//! host and key fall back to the `RS_api_*` variables only when not going
//! through the proxy.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cli::args::GlobalOptions;
use crate::client::rightscale::DEFAULT_API_VERSION;
use crate::error::{ConfigError, Result};

/// Environment fallback for the direct-mode API host
pub const HOST_ENV: &str = "RS_api_hostname";
/// Environment fallback for the direct-mode API key
pub const KEY_ENV: &str = "RS_api_key";

/// Optional defaults read from `~/.rs-api/config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// API host for direct connections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// API refresh token for direct connections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Use the RightLink10 proxy by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rl10: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_file: Option<PathBuf>,
}

impl FileConfig {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".rs-api").join("config.yaml"))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields empty defaults; a missing explicit file
    /// is an error.
    pub fn load_at(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }

        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: FileConfig = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        debug!("Loaded configuration from {}", path.display());

        Ok(config)
    }
}

/// Where RightLink10 writes the proxy port and secret
pub fn default_secret_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\ProgramData\RightScale\RightLink\rll-secret")
    } else {
        PathBuf::from("/var/run/rll-secret")
    }
}

/// How to reach the API
#[derive(Clone, PartialEq)]
pub enum Connection {
    /// Through the RightLink10 proxy. Missing values come from `secret_file`.
    Proxy {
        host: Option<String>,
        secret: Option<String>,
        secret_file: PathBuf,
    },
    /// Straight to the platform with an API refresh token
    Direct { host: String, key: String },
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connection::Proxy {
                host, secret_file, ..
            } => f
                .debug_struct("Proxy")
                .field("host", host)
                .field("secret_file", secret_file)
                .finish_non_exhaustive(),
            Connection::Direct { host, .. } => f
                .debug_struct("Direct")
                .field("host", host)
                .finish_non_exhaustive(),
        }
    }
}

/// Fully layered settings for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub connection: Connection,
    pub account: Option<String>,
    pub api_version: String,
}

impl Settings {
    /// Layer flags over the environment (looked up through `env`) over the file
    pub fn resolve<F>(
        options: &GlobalOptions,
        file: &FileConfig,
        env: F,
    ) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        let connection = if options.rl10 || file.rl10.unwrap_or(false) {
            Connection::Proxy {
                host: flag(&options.host),
                secret: flag(&options.key),
                secret_file: options
                    .secret_file
                    .clone()
                    .or_else(|| file.secret_file.clone())
                    .unwrap_or_else(default_secret_path),
            }
        } else {
            let from_env = |name: &str| env(name).filter(|v| !v.is_empty());
            let host = flag(&options.host)
                .or_else(|| from_env(HOST_ENV))
                .or_else(|| flag(&file.host))
                .ok_or(ConfigError::MissingHost)?;
            let key = flag(&options.key)
                .or_else(|| from_env(KEY_ENV))
                .or_else(|| flag(&file.key))
                .ok_or(ConfigError::MissingApiKey)?;
            Connection::Direct { host, key }
        };

        Ok(Self {
            connection,
            account: flag(&options.account).or_else(|| flag(&file.account)),
            api_version: flag(&options.api_version)
                .or_else(|| flag(&file.api_version))
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        })
    }
}
