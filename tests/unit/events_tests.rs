use lumen_runner::supervisor::events::{describe_exit, STOPPED_BANNER};

#[test]
fn exit_banner_reports_code_literally() {
    assert_eq!(describe_exit(Some(0)), "\n--- Program finished with code 0 ---\n");
    assert_eq!(describe_exit(Some(-2)), "\n--- Program finished with code -2 ---\n");
}

#[test]
fn exit_banner_for_signal_death() {
    assert!(describe_exit(None).contains("terminated by signal"));
}

#[test]
fn stopped_banner_text() {
    assert_eq!(STOPPED_BANNER, "\n--- Program stopped ---\n");
}
