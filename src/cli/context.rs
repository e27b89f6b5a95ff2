//! Command execution context
//!
//! Loads configuration, builds the authenticated client and owns the
//! recorder for one invocation.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};

use crate::cli::args::GlobalOptions;
use crate::client::{ClientOptions, ProxyEndpoint, RightScaleClient};
use crate::config::{Connection, FileConfig, Settings};
use crate::error::Result;
use crate::pipeline::Outcome;
use crate::recording::{Recorder, RecordingEntry};

/// Everything a command needs besides its own arguments
pub struct CommandContext {
    /// Authenticated API client
    pub client: RightScaleClient,
    recording: Option<(PathBuf, Arc<Recorder>)>,
}

impl CommandContext {
    /// Create a new command context with full initialization.
    ///
    /// This handles:
    /// - Loading the config file (explicit path or default location)
    /// - Layering flags, environment and file into `Settings`
    /// - Discovering the proxy or exchanging the API key for a token
    /// - Attaching a recorder when `--record` was given
    ///
    /// # Errors
    /// Returns error if configuration is incomplete or authentication fails.
    pub async fn new(options: &GlobalOptions) -> Result<Self> {
        let file = FileConfig::load_at(options.config.as_deref())?;
        let settings = Settings::resolve(options, &file, |name| std::env::var(name).ok())?;
        debug!("Connection: {:?}", settings.connection);

        let client_options = ClientOptions {
            api_version: settings.api_version,
            account: settings.account,
            debug: options.debug,
            ..ClientOptions::default()
        };

        let client = match &settings.connection {
            Connection::Proxy {
                host,
                secret,
                secret_file,
            } => {
                let endpoint =
                    ProxyEndpoint::discover(host.as_deref(), secret.as_deref(), secret_file)?;
                RightScaleClient::proxy(&endpoint, client_options)?
            }
            Connection::Direct { host, key } => {
                RightScaleClient::direct(host, key, client_options).await?
            }
        };

        // Attached after authentication so the token exchange is never recorded
        let recording = options
            .record
            .clone()
            .map(|path| (path, Arc::new(Recorder::new())));
        let client = match &recording {
            Some((_, recorder)) => client.with_recorder(recorder.clone()),
            None => client,
        };

        Ok(Self { client, recording })
    }

    /// Append this command to the recording file, if recording.
    /// Failures are logged, never fatal.
    pub fn save_recording(&self, cmd_args: Vec<String>, outcome: &Outcome) {
        let Some((path, recorder)) = &self.recording else {
            return;
        };
        let entry = RecordingEntry::new(
            cmd_args,
            outcome.exit_code,
            outcome.stdout.clone(),
            recorder.exchanges(),
        );
        match entry.append_to(path) {
            Ok(()) => debug!("Recorded {} exchange(s) to {}", entry.exchanges.len(), path.display()),
            Err(err) => warn!("Cannot write recording to {}: {}", path.display(), err),
        }
    }
}
