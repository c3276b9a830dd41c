//! Events emitted by a supervised run.

use crate::prompt::PromptKind;

/// Synthetic output chunk emitted once when a run is stopped by request.
pub const STOPPED_BANNER: &str = "\n--- Program stopped ---\n";

/// One observable occurrence during a run, delivered in arrival order on
/// the run's own channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Decoded stdout fragment, newlines preserved.
    Output(String),
    /// Decoded stderr fragment, newlines preserved.
    Error(String),
    /// The interpreter printed an input marker and is waiting on stdin.
    InputRequested {
        /// Kind of value requested.
        kind: PromptKind,
    },
    /// The process has exited and both output streams are drained.
    ///
    /// Always the last event of a run.
    Exited {
        /// Exit code, `None` when the process died from a signal.
        code: Option<i32>,
    },
}

/// Informational banner shown to the user when a run exits.
#[must_use]
pub fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(
        || "\n--- Program terminated by signal ---\n".to_owned(),
        |c| format!("\n--- Program finished with code {c} ---\n"),
    )
}
