//! Remote version descriptor.
//!
//! The descriptor is a JSON object keyed by component name:
//!
//! ```json
//! { "LANG": { "VERSION": "2.0" } }
//! ```
//!
//! Version tokens are compared textually; numeric tokens are rendered with
//! their JSON spelling so `2.0` and `"2.0"` compare equal.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::{AppError, Result};

/// Parsed remote version descriptor.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct VersionManifest {
    components: HashMap<String, Value>,
}

impl VersionManifest {
    /// Parse the raw descriptor body.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` if the body is not a JSON object.
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|err| AppError::Parse(format!("invalid version manifest: {err}")))
    }

    /// Version token declared for `component` under `field`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` if the component or field is missing, the
    /// token is not a string or number, or the token is empty.
    pub fn version_of(&self, component: &str, field: &str) -> Result<String> {
        let entry = self
            .components
            .get(component)
            .ok_or_else(|| AppError::Parse(format!("manifest has no component {component}")))?;

        let token = match entry.get(field) {
            Some(Value::String(token)) => token.trim().to_owned(),
            Some(Value::Number(number)) => number.to_string(),
            Some(_) => {
                return Err(AppError::Parse(format!(
                    "{component}.{field} is neither a string nor a number"
                )))
            }
            None => {
                return Err(AppError::Parse(format!(
                    "manifest component {component} has no {field} field"
                )))
            }
        };

        if token.is_empty() {
            return Err(AppError::Parse(format!("{component}.{field} is empty")));
        }

        Ok(token)
    }
}

/// One interpreter support file and where to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// File name inside the install directory.
    pub name: String,
    /// Fetch location.
    pub url: String,
}
