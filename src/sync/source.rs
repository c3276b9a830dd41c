//! Artifact fetch backends.
//!
//! The synchronizer only needs "GET this URL, give me the body". The
//! [`ArtifactSource`] trait is that seam; [`HttpSource`] is the production
//! implementation over `reqwest`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::{AppError, Result};

/// Boxed future returned by [`ArtifactSource::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;

/// Something that can retrieve the body behind a URL.
pub trait ArtifactSource: Send + Sync {
    /// Fetch the full body at `url`.
    ///
    /// Implementations return `AppError::Network` for transport failures and
    /// non-success responses.
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}

/// HTTPS fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Build a client with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Network` if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lumen-runner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| AppError::Network(format!("failed to build http client: {err}")))?;
        Ok(Self { client })
    }
}

impl ArtifactSource for HttpSource {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| AppError::Network(format!("GET {url} failed: {err}")))?
                .error_for_status()
                .map_err(|err| AppError::Network(format!("GET {url} rejected: {err}")))?;

            let body = response
                .bytes()
                .await
                .map_err(|err| AppError::Network(format!("failed to read body of {url}: {err}")))?;

            debug!(url, bytes = body.len(), "fetched remote file");
            Ok(body.to_vec())
        })
    }
}
