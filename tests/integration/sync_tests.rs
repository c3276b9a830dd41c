//! Artifact synchronization: version comparison, all-or-nothing install,
//! and stamp handling.

use std::sync::Arc;

use lumen_runner::settings::SettingsStore;
use lumen_runner::sync::UpdateSynchronizer;
use lumen_runner::AppError;

use super::test_helpers::{
    dir_entries, read_artifact, seed_install, test_config, FakeSource, ARTIFACTS, MANIFEST_URL,
};

fn synchronizer(
    dir: &std::path::Path,
    source: FakeSource,
) -> (UpdateSynchronizer, Arc<SettingsStore>, Arc<FakeSource>) {
    let config = test_config(dir);
    let settings = Arc::new(SettingsStore::new(
        config.settings_path(),
        config.update.stamp_key.clone(),
    ));
    let source = Arc::new(source);
    let sync = UpdateSynchronizer::new(&config, source.clone(), Arc::clone(&settings));
    (sync, settings, source)
}

#[tokio::test]
async fn matching_stamp_skips_artifact_fetches() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "2.0");
    let (sync, settings, source) = synchronizer(dir.path(), FakeSource::new().release("2.0"));

    let updated = sync.check_and_sync().await.expect("sync");

    assert!(!updated);
    assert_eq!(source.calls(), [MANIFEST_URL]);
    assert_eq!(settings.version_stamp().expect("stamp").as_deref(), Some("2.0"));
    assert_eq!(read_artifact(dir.path(), "lang.py"), "# lang.py old\n");
}

#[tokio::test]
async fn unset_stamp_installs_every_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (sync, settings, _source) = synchronizer(dir.path(), FakeSource::new().release("1.0"));

    let updated = sync.check_and_sync().await.expect("sync");

    assert!(updated);
    for (name, _) in ARTIFACTS {
        assert_eq!(read_artifact(dir.path(), name), format!("# {name} 1.0\n"));
    }
    assert_eq!(settings.version_stamp().expect("stamp").as_deref(), Some("1.0"));
}

#[tokio::test]
async fn newer_remote_replaces_artifacts_and_keeps_preferences() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "1.0");
    let (sync, settings, source) = synchronizer(dir.path(), FakeSource::new().release("2.0"));

    assert!(sync.check_and_sync().await.expect("sync"));

    assert_eq!(source.calls().len(), 1 + ARTIFACTS.len());
    assert_eq!(read_artifact(dir.path(), "shell.py"), "# shell.py 2.0\n");
    let record = settings.load().expect("load").expect("record");
    assert_eq!(record.get("theme"), Some(&serde_json::json!("dark")));
    assert_eq!(settings.version_stamp().expect("stamp").as_deref(), Some("2.0"));
    assert_eq!(
        dir_entries(dir.path()),
        ["errorcomp.py", "lang.py", "settings.json", "shell.py"]
    );
}

#[tokio::test]
async fn failed_second_fetch_leaves_install_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "1.0");
    let source = FakeSource::new()
        .release("2.0")
        .fail(ARTIFACTS[1].1, "connection reset");
    let (sync, settings, source) = synchronizer(dir.path(), source);

    let result = sync.check_and_sync().await;

    assert!(matches!(result, Err(AppError::Network(msg)) if msg.contains("connection reset")));
    assert_eq!(settings.version_stamp().expect("stamp").as_deref(), Some("1.0"));
    for (name, _) in ARTIFACTS {
        assert_eq!(read_artifact(dir.path(), name), format!("# {name} old\n"));
    }
    // The third artifact is never requested and no staged file survives.
    assert_eq!(source.calls().len(), 3);
    assert_eq!(
        dir_entries(dir.path()),
        ["errorcomp.py", "lang.py", "settings.json", "shell.py"]
    );
}

#[tokio::test]
async fn failed_install_restores_already_moved_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "1.0");
    // The last artifact's target is a directory, so installing it fails
    // after the first two have been moved into place.
    std::fs::remove_file(dir.path().join("shell.py")).expect("remove");
    std::fs::create_dir(dir.path().join("shell.py")).expect("mkdir");
    let (sync, settings, _source) = synchronizer(dir.path(), FakeSource::new().release("2.0"));

    let result = sync.check_and_sync().await;

    assert!(matches!(result, Err(AppError::ArtifactWrite(_))));
    assert_eq!(read_artifact(dir.path(), "errorcomp.py"), "# errorcomp.py old\n");
    assert_eq!(read_artifact(dir.path(), "lang.py"), "# lang.py old\n");
    assert_eq!(settings.version_stamp().expect("stamp").as_deref(), Some("1.0"));
}

#[tokio::test]
async fn unreachable_manifest_is_network_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "1.0");
    let (sync, settings, source) = synchronizer(dir.path(), FakeSource::new());

    let result = sync.check_and_sync().await;

    assert!(matches!(result, Err(AppError::Network(_))));
    assert_eq!(source.calls(), [MANIFEST_URL]);
    assert_eq!(settings.version_stamp().expect("stamp").as_deref(), Some("1.0"));
}

#[tokio::test]
async fn malformed_manifest_is_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (sync, _settings, _source) =
        synchronizer(dir.path(), FakeSource::new().serve(MANIFEST_URL, "not json"));

    assert!(matches!(
        sync.check_and_sync().await,
        Err(AppError::Parse(_))
    ));
}

#[tokio::test]
async fn startup_sync_absorbs_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "1.0");
    let source = FakeSource::new().release("2.0").fail(ARTIFACTS[0].1, "503");
    let (sync, settings, _source) = synchronizer(dir.path(), source);

    assert!(!sync.sync_before_session().await);
    assert_eq!(settings.version_stamp().expect("stamp").as_deref(), Some("1.0"));
}

#[tokio::test]
async fn startup_sync_reports_applied_update() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "1.0");
    let (sync, _settings, _source) = synchronizer(dir.path(), FakeSource::new().release("1.1"));

    assert!(sync.sync_before_session().await);
    assert_eq!(read_artifact(dir.path(), "lang.py"), "# lang.py 1.1\n");
}

#[tokio::test]
async fn disabled_sync_never_fetches() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = test_config(dir.path());
    config.update.enabled = false;
    let settings = Arc::new(SettingsStore::new(config.settings_path(), "VERSION_LANG"));
    let source = Arc::new(FakeSource::new().release("9.9"));
    let sync = UpdateSynchronizer::new(&config, source.clone(), settings);

    assert!(!sync.sync_before_session().await);
    assert!(source.calls().is_empty());
}
