//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// The three lifecycle variants render as the exact text shown to the
/// user; every other variant carries a `prefix: detail` message.
#[derive(Debug)]
pub enum AppError {
    /// A program is already running under this supervisor.
    AlreadyRunning,
    /// `start` was called without a target file.
    MissingTarget,
    /// No live child process is available for the requested operation.
    NoActiveProcess,
    /// The interpreter process could not be spawned.
    Spawn(String),
    /// Writing to the child's standard input failed.
    IoWrite(String),
    /// Manifest or artifact fetch failed.
    Network(String),
    /// Manifest could not be parsed or lacks the expected version field.
    Parse(String),
    /// Staging or installing an artifact file failed.
    ArtifactWrite(String),
    /// The persisted settings record could not be read or written.
    Settings(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether the error belongs to the process lifecycle group that is
    /// surfaced verbatim to the user.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning | Self::MissingTarget | Self::NoActiveProcess
        )
    }

    /// Whether the error belongs to the artifact synchronization group,
    /// which is logged and absorbed rather than shown.
    #[must_use]
    pub fn is_sync(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Parse(_) | Self::ArtifactWrite(_)
        )
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => f.write_str("Program is already running"),
            Self::MissingTarget => f.write_str("Please save your file before running."),
            Self::NoActiveProcess => f.write_str("No program is running"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::IoWrite(msg) => write!(f, "input write: {msg}"),
            Self::Network(msg) => write!(f, "network: {msg}"),
            Self::Parse(msg) => write!(f, "parse: {msg}"),
            Self::ArtifactWrite(msg) => write!(f, "artifact write: {msg}"),
            Self::Settings(msg) => write!(f, "settings: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
