//! Display format and grouping of `AppError`.

use lumen_runner::AppError;

#[test]
fn lifecycle_errors_render_user_text_verbatim() {
    assert_eq!(
        AppError::AlreadyRunning.to_string(),
        "Program is already running"
    );
    assert_eq!(
        AppError::MissingTarget.to_string(),
        "Please save your file before running."
    );
    assert_eq!(AppError::NoActiveProcess.to_string(), "No program is running");
}

#[test]
fn detail_errors_carry_prefix() {
    assert_eq!(
        AppError::Network("timed out".into()).to_string(),
        "network: timed out"
    );
    assert_eq!(
        AppError::ArtifactWrite("disk full".into()).to_string(),
        "artifact write: disk full"
    );
    assert!(AppError::Spawn("no such file".into())
        .to_string()
        .starts_with("spawn:"));
    assert!(AppError::IoWrite("broken".into())
        .to_string()
        .starts_with("input write:"));
}

#[test]
fn lifecycle_group_is_exact() {
    assert!(AppError::AlreadyRunning.is_lifecycle());
    assert!(AppError::MissingTarget.is_lifecycle());
    assert!(AppError::NoActiveProcess.is_lifecycle());
    assert!(!AppError::Spawn("x".into()).is_lifecycle());
    assert!(!AppError::Network("x".into()).is_lifecycle());
}

#[test]
fn sync_group_is_exact() {
    assert!(AppError::Network("x".into()).is_sync());
    assert!(AppError::Parse("x".into()).is_sync());
    assert!(AppError::ArtifactWrite("x".into()).is_sync());
    assert!(!AppError::Settings("x".into()).is_sync());
    assert!(!AppError::NoActiveProcess.is_sync());
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: AppError = io.into();
    assert!(matches!(err, AppError::Io(msg) if msg.contains("pipe closed")));
}

#[test]
fn json_errors_convert_to_parse() {
    let json = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
    let err: AppError = json.into();
    assert!(err.to_string().starts_with("parse:"));
}
