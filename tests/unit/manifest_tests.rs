use lumen_runner::sync::VersionManifest;
use lumen_runner::AppError;

#[test]
fn extracts_component_version() {
    let manifest =
        VersionManifest::parse(br#"{"LANG": {"VERSION": "2.0", "NOTES": "x"}, "IDE": {"VERSION": "0.9"}}"#)
            .expect("parse");

    assert_eq!(manifest.version_of("LANG", "VERSION").expect("lang"), "2.0");
    assert_eq!(manifest.version_of("IDE", "VERSION").expect("ide"), "0.9");
}

#[test]
fn missing_component_is_parse_error() {
    let manifest = VersionManifest::parse(br#"{"IDE": {"VERSION": "1"}}"#).expect("parse");
    assert!(matches!(
        manifest.version_of("LANG", "VERSION"),
        Err(AppError::Parse(msg)) if msg.contains("LANG")
    ));
}

#[test]
fn missing_field_is_parse_error() {
    let manifest = VersionManifest::parse(br#"{"LANG": {}}"#).expect("parse");
    assert!(matches!(
        manifest.version_of("LANG", "VERSION"),
        Err(AppError::Parse(_))
    ));
}

#[test]
fn non_scalar_token_is_parse_error() {
    let manifest = VersionManifest::parse(br#"{"LANG": {"VERSION": ["2"]}}"#).expect("parse");
    assert!(matches!(
        manifest.version_of("LANG", "VERSION"),
        Err(AppError::Parse(_))
    ));
}

#[test]
fn blank_token_is_parse_error() {
    let manifest = VersionManifest::parse(br#"{"LANG": {"VERSION": "  "}}"#).expect("parse");
    assert!(manifest.version_of("LANG", "VERSION").is_err());
}

#[test]
fn non_object_body_is_parse_error() {
    assert!(matches!(
        VersionManifest::parse(b"<html>rate limited</html>"),
        Err(AppError::Parse(_))
    ));
    assert!(matches!(
        VersionManifest::parse(b"[1,2]"),
        Err(AppError::Parse(_))
    ));
}
