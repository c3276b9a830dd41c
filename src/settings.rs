//! Persisted settings record.
//!
//! One JSON object holds arbitrary user preferences (theme, font, …) plus
//! the artifact version stamp. Every write is a merge: keys in the patch
//! overlay the stored record, all other keys are preserved. The file is
//! replaced atomically through a temporary file in the same directory.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{AppError, Result};

/// JSON object type used for the settings record.
pub type SettingsMap = Map<String, Value>;

/// Editor preferences written with the first version stamp.
#[must_use]
pub fn default_settings() -> SettingsMap {
    let mut defaults = SettingsMap::new();
    defaults.insert("theme".into(), Value::from("dark"));
    defaults.insert("font_size".into(), Value::from(12));
    defaults.insert("font_family".into(), Value::from("Consolas"));
    defaults
}

/// File-backed settings store with merge-on-write semantics.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    stamp_key: String,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Create a store for the record at `path`, with the version stamp
    /// kept under `stamp_key`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, stamp_key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stamp_key: stamp_key.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, or `None` when no settings have been saved yet.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Settings` if the file exists but cannot be read or
    /// is not a JSON object.
    pub fn load(&self) -> Result<Option<SettingsMap>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(AppError::Settings(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )))
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(AppError::Settings(format!(
                "{} does not hold a JSON object",
                self.path.display()
            ))),
            Err(err) => Err(AppError::Settings(format!(
                "invalid JSON in {}: {err}",
                self.path.display()
            ))),
        }
    }

    /// Overlay `patch` onto the stored record and write the result back.
    ///
    /// Returns the merged record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Settings` if the existing record is unreadable or
    /// the merged record cannot be written.
    pub fn merge(&self, patch: SettingsMap) -> Result<SettingsMap> {
        self.merge_onto(SettingsMap::new, patch)
    }

    fn merge_onto(
        &self,
        seed: impl FnOnce() -> SettingsMap,
        patch: SettingsMap,
    ) -> Result<SettingsMap> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::Settings("settings lock poisoned".into()))?;

        let mut record = self.load()?.unwrap_or_else(seed);
        for (key, value) in patch {
            record.insert(key, value);
        }

        self.write_atomic(&record)?;
        debug!(path = %self.path.display(), keys = record.len(), "settings merged");
        Ok(record)
    }

    /// The last successfully synced version token, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Settings` if the record cannot be loaded.
    pub fn version_stamp(&self) -> Result<Option<String>> {
        let Some(record) = self.load()? else {
            return Ok(None);
        };

        Ok(match record.get(&self.stamp_key) {
            Some(Value::String(token)) => Some(token.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
    }

    /// Persist `token` as the synced version, preserving every other key.
    ///
    /// On a first install, when no record exists yet, the stamp is written
    /// alongside [`default_settings`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Settings` if the merge fails.
    pub fn set_version_stamp(&self, token: &str) -> Result<()> {
        let mut patch = SettingsMap::new();
        patch.insert(self.stamp_key.clone(), Value::String(token.to_owned()));
        self.merge_onto(default_settings, patch).map(|_| ())
    }

    fn write_atomic(&self, record: &SettingsMap) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        std::fs::create_dir_all(parent).map_err(|err| {
            AppError::Settings(format!(
                "failed to create settings directory {}: {err}",
                parent.display()
            ))
        })?;

        let mut body = serde_json::to_vec_pretty(record)
            .map_err(|err| AppError::Settings(format!("failed to encode settings: {err}")))?;
        body.push(b'\n');

        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|err| AppError::Settings(format!("failed to create temporary file: {err}")))?;
        tmp.write_all(&body)
            .map_err(|err| AppError::Settings(format!("failed to write temporary file: {err}")))?;
        tmp.persist(&self.path).map_err(|err| {
            AppError::Settings(format!(
                "failed to persist settings to {}: {err}",
                self.path.display()
            ))
        })?;

        Ok(())
    }
}
