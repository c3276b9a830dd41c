//! Stage-then-commit artifact synchronizer.
//!
//! A sync compares the remote manifest's version token with the stamp in
//! the settings record. When they differ every declared artifact is fetched
//! into a temporary file next to its final path. Nothing is renamed into
//! place until all of them are staged, and the stamp is written last, so a
//! failed attempt leaves the previous artifacts and stamp untouched.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::settings::SettingsStore;
use crate::sync::manifest::{ArtifactSpec, VersionManifest};
use crate::sync::source::ArtifactSource;
use crate::{run_blocking, AppError, Result};

/// An artifact written to a temporary file, awaiting commit.
#[derive(Debug)]
struct StagedArtifact {
    name: String,
    target: PathBuf,
    file: NamedTempFile,
}

/// Keeps local interpreter artifacts in step with the remote manifest.
pub struct UpdateSynchronizer {
    source: Arc<dyn ArtifactSource>,
    settings: Arc<SettingsStore>,
    install_dir: PathBuf,
    enabled: bool,
    manifest_url: String,
    component: String,
    version_field: String,
    artifacts: Vec<ArtifactSpec>,
}

impl std::fmt::Debug for UpdateSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSynchronizer")
            .field("install_dir", &self.install_dir)
            .field("enabled", &self.enabled)
            .field("manifest_url", &self.manifest_url)
            .field("artifacts", &self.artifacts)
            .finish_non_exhaustive()
    }
}

impl UpdateSynchronizer {
    /// Build a synchronizer from the `[update]` section of `config`.
    #[must_use]
    pub fn new(
        config: &GlobalConfig,
        source: Arc<dyn ArtifactSource>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        let artifacts = config
            .update
            .artifacts
            .iter()
            .map(|(name, url)| ArtifactSpec {
                name: name.clone(),
                url: url.clone(),
            })
            .collect();

        Self {
            source,
            settings,
            install_dir: config.install_dir.clone(),
            enabled: config.update.enabled,
            manifest_url: config.update.manifest_url.clone(),
            component: config.update.component.clone(),
            version_field: config.update.version_field.clone(),
            artifacts,
        }
    }

    /// Whether `[update]` is enabled in the configuration.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Declared artifacts, in install order.
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactSpec] {
        &self.artifacts
    }

    /// Fetch the manifest and, if the remote version differs from the local
    /// stamp, replace every artifact and record the new stamp.
    ///
    /// Returns whether an update was applied.
    ///
    /// # Errors
    ///
    /// - `AppError::Settings` — the local stamp could not be read or written.
    /// - `AppError::Network` — the manifest or an artifact could not be
    ///   fetched; no artifact has been touched.
    /// - `AppError::Parse` — the manifest is malformed.
    /// - `AppError::ArtifactWrite` — staging or installing failed; installed
    ///   files have been restored.
    pub async fn check_and_sync(&self) -> Result<bool> {
        let settings = Arc::clone(&self.settings);
        let local = run_blocking(move || settings.version_stamp()).await?;

        let body = self.source.fetch(&self.manifest_url).await?;
        let manifest = VersionManifest::parse(&body)?;
        let remote = manifest.version_of(&self.component, &self.version_field)?;

        if local.as_deref() == Some(remote.as_str()) {
            debug!(version = %remote, "interpreter artifacts up to date");
            return Ok(false);
        }

        info!(
            from = local.as_deref().unwrap_or("none"),
            to = %remote,
            "updating interpreter artifacts"
        );

        let staged = self.stage_all().await?;
        let settings = Arc::clone(&self.settings);
        let token = remote.clone();
        run_blocking(move || {
            commit(staged)?;
            settings.set_version_stamp(&token)
        })
        .await?;

        info!(version = %remote, count = self.artifacts.len(), "interpreter artifacts updated");
        Ok(true)
    }

    /// Startup variant of [`Self::check_and_sync`]: never fails.
    ///
    /// Errors are logged and reported as "no update"; the session proceeds
    /// with whatever artifacts are already installed.
    pub async fn sync_before_session(&self) -> bool {
        if !self.enabled {
            debug!("artifact sync disabled");
            return false;
        }

        match self.check_and_sync().await {
            Ok(updated) => updated,
            Err(err) => {
                warn!(%err, "artifact sync failed; continuing with installed files");
                false
            }
        }
    }

    async fn stage_all(&self) -> Result<Vec<StagedArtifact>> {
        let dir = self.install_dir.clone();
        run_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|err| {
                AppError::ArtifactWrite(format!(
                    "failed to create install directory {}: {err}",
                    dir.display()
                ))
            })
        })
        .await?;

        let mut staged = Vec::with_capacity(self.artifacts.len());
        for artifact in &self.artifacts {
            // Dropping `staged` on error deletes every temporary file.
            let body = self.source.fetch(&artifact.url).await?;
            let bytes = body.len();
            let dir = self.install_dir.clone();
            let spec = artifact.clone();
            staged.push(run_blocking(move || stage(&dir, &spec, &body)).await?);
            debug!(artifact = %artifact.name, bytes, "artifact staged");
        }

        Ok(staged)
    }
}

fn stage(dir: &Path, artifact: &ArtifactSpec, body: &[u8]) -> Result<StagedArtifact> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!(".{}.", artifact.name))
        .suffix(".staged")
        .tempfile_in(dir)
        .map_err(|err| {
            AppError::ArtifactWrite(format!("failed to stage {}: {err}", artifact.name))
        })?;

    file.write_all(body)
        .and_then(|()| file.flush())
        .map_err(|err| {
            AppError::ArtifactWrite(format!("failed to write staged {}: {err}", artifact.name))
        })?;

    Ok(StagedArtifact {
        name: artifact.name.clone(),
        target: dir.join(&artifact.name),
        file,
    })
}

/// Move every staged file into place. If one rename fails, files already
/// installed in this pass get their previous content back.
fn commit(staged: Vec<StagedArtifact>) -> Result<()> {
    let mut installed: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(staged.len());

    for artifact in staged {
        let previous = match std::fs::read(&artifact.target) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                restore(&installed);
                return Err(AppError::ArtifactWrite(format!(
                    "failed to read current {}: {err}",
                    artifact.name
                )));
            }
        };

        if let Err(err) = artifact.file.persist(&artifact.target) {
            restore(&installed);
            return Err(AppError::ArtifactWrite(format!(
                "failed to install {}: {}",
                artifact.name, err.error
            )));
        }

        installed.push((artifact.target, previous));
    }

    Ok(())
}

fn restore(installed: &[(PathBuf, Option<Vec<u8>>)]) {
    for (path, previous) in installed.iter().rev() {
        let result = match previous {
            Some(bytes) => std::fs::write(path, bytes),
            None => std::fs::remove_file(path),
        };
        if let Err(err) = result {
            warn!(path = %path.display(), %err, "failed to restore artifact after aborted update");
        }
    }
}
