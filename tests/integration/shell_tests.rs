//! The UI command surface end to end.

use std::sync::Arc;

use lumen_runner::supervisor::events::RunEvent;
use lumen_runner::{ShellCommand, ShellCore, ShellReply};
use serde_json::json;

use super::test_helpers::{
    collect_until_exit, read_artifact, seed_install, stdout_text, test_config, FakeSource,
};

async fn open(dir: &std::path::Path, source: FakeSource) -> ShellCore {
    ShellCore::open(test_config(dir), Arc::new(source)).await
}

fn patch(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("patch must be an object, got {other}"),
    }
}

#[tokio::test]
async fn opens_even_when_sync_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "1.0");

    let core = open(dir.path(), FakeSource::new()).await;

    assert!(!core.updated_on_open());
    assert_eq!(read_artifact(dir.path(), "shell.py"), "# shell.py old\n");
}

#[tokio::test]
async fn open_applies_pending_update() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "1.0");

    let core = open(dir.path(), FakeSource::new().release("1.2")).await;

    assert!(core.updated_on_open());
    assert_eq!(read_artifact(dir.path(), "shell.py"), "# shell.py 1.2\n");
    assert!(matches!(
        core.dispatch(ShellCommand::CheckAndSync).await,
        ShellReply::Synced { updated: false }
    ));
}

#[tokio::test]
async fn failed_manual_sync_reports_no_update() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = open(dir.path(), FakeSource::new()).await;

    assert!(matches!(
        core.dispatch(ShellCommand::CheckAndSync).await,
        ShellReply::Synced { updated: false }
    ));
}

#[tokio::test]
async fn lifecycle_errors_carry_user_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = open(dir.path(), FakeSource::new()).await;

    let reply = core
        .dispatch(ShellCommand::Start {
            path: String::new(),
            args: Vec::new(),
        })
        .await;
    assert!(
        matches!(&reply, ShellReply::Error(text) if text == "Please save your file before running.")
    );

    let reply = core.dispatch(ShellCommand::Stop).await;
    assert!(matches!(&reply, ShellReply::Error(text) if text == "No program is running"));

    let reply = core
        .dispatch(ShellCommand::SendInput { text: "1".into() })
        .await;
    assert!(reply.is_error());
}

#[cfg(unix)]
#[tokio::test]
async fn start_dispatch_returns_event_stream() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("hi.sh");
    std::fs::write(&target, "echo \"hi $1\"\n").expect("write");
    let core = open(dir.path(), FakeSource::new()).await;

    let reply = core
        .dispatch(ShellCommand::Start {
            path: target.display().to_string(),
            args: vec!["there".into()],
        })
        .await;
    let ShellReply::Started(mut run) = reply else {
        panic!("expected Started, got {reply:?}");
    };

    let events = collect_until_exit(&mut run).await;
    assert_eq!(stdout_text(&events), "hi there\n");
    assert_eq!(events.last(), Some(&RunEvent::Exited { code: Some(0) }));
}

#[tokio::test]
async fn settings_round_trip_through_dispatch() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "1.0");
    let core = open(dir.path(), FakeSource::new()).await;

    let reply = core
        .dispatch(ShellCommand::SaveSettings {
            patch: patch(json!({"font_size": 14})),
        })
        .await;
    let ShellReply::Settings(Some(saved)) = reply else {
        panic!("expected saved settings, got {reply:?}");
    };
    assert_eq!(saved.get("font_size"), Some(&json!(14)));
    assert_eq!(saved.get("theme"), Some(&json!("dark")));

    let reply = core.dispatch(ShellCommand::LoadSettings).await;
    let ShellReply::Settings(Some(loaded)) = reply else {
        panic!("expected settings, got {reply:?}");
    };
    assert_eq!(loaded, saved);
    assert_eq!(loaded.get("VERSION_LANG"), Some(&json!("1.0")));
}

#[tokio::test]
async fn load_without_record_is_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = open(dir.path(), FakeSource::new()).await;

    assert!(matches!(
        core.dispatch(ShellCommand::LoadSettings).await,
        ShellReply::Settings(None)
    ));
}

#[tokio::test]
async fn manual_sync_honours_disabled_updates() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_install(dir.path(), "old", "1.0");
    let mut config = test_config(dir.path());
    config.update.enabled = false;
    let source = Arc::new(FakeSource::new().release("2.0"));

    let core = ShellCore::open(config, source.clone()).await;
    let reply = core.dispatch(ShellCommand::CheckAndSync).await;

    assert!(matches!(reply, ShellReply::Synced { updated: false }));
    assert!(source.calls().is_empty());
    assert_eq!(read_artifact(dir.path(), "lang.py"), "# lang.py old\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_saves_keep_every_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = open(dir.path(), FakeSource::new()).await;

    let (left, right) = tokio::join!(
        core.dispatch(ShellCommand::SaveSettings {
            patch: patch(json!({"font_size": 18})),
        }),
        core.dispatch(ShellCommand::SaveSettings {
            patch: patch(json!({"theme": "light"})),
        }),
    );
    assert!(!left.is_error(), "{left:?}");
    assert!(!right.is_error(), "{right:?}");

    let ShellReply::Settings(Some(record)) = core.dispatch(ShellCommand::LoadSettings).await else {
        panic!("expected settings");
    };
    assert_eq!(record.get("font_size"), Some(&json!(18)));
    assert_eq!(record.get("theme"), Some(&json!("light")));
}
