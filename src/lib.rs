#![forbid(unsafe_code)]

//! Execution core of the Lumen editor shell.
//!
//! Supervises the external interpreter process behind an interactive
//! stdin/stdout bridge and keeps the interpreter's support files in sync
//! with the published version.

pub mod config;
pub mod errors;
pub mod prompt;
pub mod settings;
pub mod shell;
pub mod supervisor;
pub mod sync;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
pub use shell::{ShellCommand, ShellCore, ShellReply};
pub use supervisor::{ProcessSupervisor, Run};

/// Run blocking filesystem work on tokio's blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AppError::Io(format!("blocking task failed: {err}")))?
}
