//! Boundary to the third-party music catalog used to look up tracks before queueing them.

#[cfg(feature = "spotify-catalog")]
pub mod spotify;

use futures::future::BoxFuture;
use thiserror::Error;

/// Track metadata as returned by a catalog search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub catalog_id: String,
    pub title: String,
    /// Artist names joined with `", "`.
    pub artist: String,
    pub artwork_url: String,
    pub preview_url: Option<String>,
    pub duration_ms: u64,
}

/// Failures raised while talking to a catalog provider.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No catalog provider is configured for this deployment.
    #[error("no catalog provider configured")]
    NotConfigured,
    /// Required environment variable is missing.
    #[error("missing catalog environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// The provider refused to issue an access token.
    #[error("catalog authentication failed with status {status}")]
    Authentication { status: u16 },
    /// The provider answered the search with a non-success status.
    #[error("catalog search failed with status {status}")]
    SearchStatus { status: u16 },
    /// Transport or decoding failure.
    #[error("catalog request failed: {message}")]
    Transport { message: String },
}

/// Search abstraction over a music catalog provider.
pub trait TrackCatalog: Send + Sync {
    fn search(&self, query: String) -> BoxFuture<'static, Result<Vec<CatalogTrack>, CatalogError>>;
}
