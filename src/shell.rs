//! Command surface consumed by the editor UI.
//!
//! [`ShellCore`] wires the settings store, the artifact synchronizer and the
//! process supervisor together. Opening a core runs the startup sync to
//! completion first, so every later `start` sees whatever artifacts the last
//! successful sync installed.
//!
//! Commands never fail outright: errors come back as
//! [`ShellReply::Error`] carrying the text the UI shows verbatim.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::run_blocking;
use crate::settings::{SettingsMap, SettingsStore};
use crate::supervisor::{LaunchConfig, ProcessSupervisor, Run};
use crate::sync::{ArtifactSource, UpdateSynchronizer};

/// A request issued by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    /// Run the saved file at `path`.
    Start {
        /// Target file; empty when the buffer was never saved.
        path: String,
        /// Extra arguments passed after the target.
        args: Vec<String>,
    },
    /// Stop the running program.
    Stop,
    /// Forward one line of user input.
    SendInput {
        /// Line text without its terminator.
        text: String,
    },
    /// Re-run the artifact sync.
    CheckAndSync,
    /// Read the persisted settings record.
    LoadSettings,
    /// Merge keys into the persisted settings record.
    SaveSettings {
        /// Keys to overlay.
        patch: SettingsMap,
    },
}

/// Outcome of a [`ShellCommand`].
#[derive(Debug)]
pub enum ShellReply {
    /// The program started; subscribe to its events.
    Started(Run),
    /// The command succeeded with nothing to return.
    Done,
    /// Sync finished; whether artifacts were replaced.
    Synced {
        /// `true` when a new version was installed.
        updated: bool,
    },
    /// Current settings, `None` if nothing was ever saved.
    Settings(Option<SettingsMap>),
    /// User-visible error text.
    Error(String),
}

impl ShellReply {
    /// Whether the reply reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// The execution core of one editor session.
#[derive(Debug)]
pub struct ShellCore {
    config: Arc<GlobalConfig>,
    settings: Arc<SettingsStore>,
    synchronizer: UpdateSynchronizer,
    supervisor: ProcessSupervisor,
    updated_on_open: bool,
}

impl ShellCore {
    /// Build the core and run the startup sync to completion.
    ///
    /// Sync failures are logged and do not prevent the session opening.
    pub async fn open(config: GlobalConfig, source: Arc<dyn ArtifactSource>) -> Self {
        let settings = Arc::new(SettingsStore::new(
            config.settings_path(),
            config.update.stamp_key.clone(),
        ));
        let synchronizer = UpdateSynchronizer::new(&config, source, Arc::clone(&settings));
        let supervisor = ProcessSupervisor::new(LaunchConfig::from_config(&config));

        let updated_on_open = synchronizer.sync_before_session().await;
        if updated_on_open {
            info!("interpreter files were updated to the latest version");
        }

        Self {
            config: Arc::new(config),
            settings,
            synchronizer,
            supervisor,
            updated_on_open,
        }
    }

    /// Whether the startup sync installed a new version.
    #[must_use]
    pub fn updated_on_open(&self) -> bool {
        self.updated_on_open
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// The session's process supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// The session's artifact synchronizer.
    #[must_use]
    pub fn synchronizer(&self) -> &UpdateSynchronizer {
        &self.synchronizer
    }

    /// The persisted settings record.
    #[must_use]
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Execute one UI command.
    pub async fn dispatch(&self, command: ShellCommand) -> ShellReply {
        match command {
            ShellCommand::Start { path, args } => {
                match self.supervisor.start(&path, &args, &[]).await {
                    Ok(run) => ShellReply::Started(run),
                    Err(err) => ShellReply::Error(err.to_string()),
                }
            }
            ShellCommand::Stop => match self.supervisor.stop().await {
                Ok(()) => ShellReply::Done,
                Err(err) => ShellReply::Error(err.to_string()),
            },
            ShellCommand::SendInput { text } => match self.supervisor.send_input(&text).await {
                Ok(()) => ShellReply::Done,
                Err(err) => ShellReply::Error(err.to_string()),
            },
            ShellCommand::CheckAndSync if !self.synchronizer.is_enabled() => {
                debug!("artifact sync disabled");
                ShellReply::Synced { updated: false }
            }
            ShellCommand::CheckAndSync => match self.synchronizer.check_and_sync().await {
                Ok(updated) => ShellReply::Synced { updated },
                Err(err) => {
                    warn!(%err, "artifact sync failed");
                    ShellReply::Synced { updated: false }
                }
            },
            ShellCommand::LoadSettings => {
                let settings = Arc::clone(&self.settings);
                match run_blocking(move || settings.load()).await {
                    Ok(record) => ShellReply::Settings(record),
                    Err(err) => ShellReply::Error(err.to_string()),
                }
            }
            ShellCommand::SaveSettings { patch } => {
                let settings = Arc::clone(&self.settings);
                match run_blocking(move || settings.merge(patch)).await {
                    Ok(record) => ShellReply::Settings(Some(record)),
                    Err(err) => ShellReply::Error(err.to_string()),
                }
            }
        }
    }
}
