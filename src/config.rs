//! Global configuration parsing and validation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

const REPO_RAW_BASE: &str = "https://raw.githubusercontent.com/ImpulseDevMomentum/Lumen/main";

/// How the interpreter process is launched.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct RunnerConfig {
    /// Interpreter binary (e.g., `python3`).
    pub interpreter: String,
    /// Front-end script passed to the interpreter before the target file,
    /// relative to the install directory. Empty disables it.
    pub entry_script: String,
    /// Execution-specific environment overrides layered on top of the
    /// parent environment.
    pub env: BTreeMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            entry_script: "shell.py".into(),
            env: default_runner_env(),
        }
    }
}

fn default_interpreter() -> String {
    if cfg!(windows) {
        "python".into()
    } else {
        "python3".into()
    }
}

fn default_runner_env() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("PYTHONIOENCODING".to_owned(), "utf-8".to_owned()),
        ("PYTHONUNBUFFERED".to_owned(), "1".to_owned()),
    ])
}

/// Remote artifact synchronization settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct UpdateConfig {
    /// Whether the startup sync runs at all.
    pub enabled: bool,
    /// Location of the remote version descriptor.
    pub manifest_url: String,
    /// Component key inside the descriptor.
    pub component: String,
    /// Field holding the version token inside the component entry.
    pub version_field: String,
    /// Settings key holding the last synced version.
    pub stamp_key: String,
    /// Per-request timeout.
    pub request_timeout_seconds: u64,
    /// Logical artifact file name to fetch URL.
    pub artifacts: BTreeMap<String, String>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            manifest_url: format!("{REPO_RAW_BASE}/version.json"),
            component: "LANG".into(),
            version_field: "VERSION".into(),
            stamp_key: "VERSION_LANG".into(),
            request_timeout_seconds: 30,
            artifacts: default_artifacts(),
        }
    }
}

fn default_artifacts() -> BTreeMap<String, String> {
    ["lang.py", "shell.py", "errorcomp.py"]
        .into_iter()
        .map(|name| (name.to_owned(), format!("{REPO_RAW_BASE}/{name}")))
        .collect()
}

impl UpdateConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct GlobalConfig {
    /// Directory holding interpreter artifacts and the settings record.
    pub install_dir: PathBuf,
    /// Settings file name, relative to `install_dir` unless absolute.
    pub settings_file: PathBuf,
    /// Interpreter launch settings.
    pub runner: RunnerConfig,
    /// Artifact synchronization settings.
    pub update: UpdateConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from("."),
            settings_file: PathBuf::from("settings.json"),
            runner: RunnerConfig::default(),
            update: UpdateConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Absolute or install-relative path of the settings record.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.install_dir.join(&self.settings_file)
    }

    /// Path of the interpreter front-end script, if one is configured.
    #[must_use]
    pub fn entry_script_path(&self) -> Option<PathBuf> {
        if self.runner.entry_script.is_empty() {
            None
        } else {
            Some(self.install_dir.join(&self.runner.entry_script))
        }
    }

    fn validate(&self) -> Result<()> {
        if self.runner.interpreter.trim().is_empty() {
            return Err(AppError::Config("runner.interpreter must not be empty".into()));
        }

        if !self.update.enabled {
            return Ok(());
        }

        if self.update.manifest_url.trim().is_empty() {
            return Err(AppError::Config(
                "update.manifest_url must not be empty when updates are enabled".into(),
            ));
        }

        if self.update.artifacts.is_empty() {
            return Err(AppError::Config(
                "update.artifacts must declare at least one file".into(),
            ));
        }

        for name in self.update.artifacts.keys() {
            if !is_plain_file_name(name) {
                return Err(AppError::Config(format!(
                    "artifact name must be a plain file name: {name}"
                )));
            }
        }

        Ok(())
    }
}

/// An artifact name may not carry directories, so it always lands directly
/// inside the install directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
