//! Interpreter artifact synchronization.
//!
//! - `manifest`: remote version descriptor parsing.
//! - `source`: the fetch seam and its HTTPS implementation.
//! - `synchronizer`: stage-then-commit update of the local artifacts.

pub mod manifest;
pub mod source;
pub mod synchronizer;

pub use manifest::{ArtifactSpec, VersionManifest};
pub use source::{ArtifactSource, FetchFuture, HttpSource};
pub use synchronizer::UpdateSynchronizer;
