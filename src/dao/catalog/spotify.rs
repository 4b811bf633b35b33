//! Spotify Web API catalog using the client-credentials flow.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::{CatalogError, CatalogTrack, TrackCatalog};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const SEARCH_LIMIT: &str = "10";
/// Tokens are refreshed this long before the provider-declared expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Runtime configuration describing how to authenticate against Spotify.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl SpotifyConfig {
    /// Build a configuration by reading `SPOTIFY_CLIENT_ID` and `SPOTIFY_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self, CatalogError> {
        let client_id = std::env::var("SPOTIFY_CLIENT_ID").map_err(|_| {
            CatalogError::MissingEnvVar {
                var: "SPOTIFY_CLIENT_ID",
            }
        })?;
        let client_secret = std::env::var("SPOTIFY_CLIENT_SECRET").map_err(|_| {
            CatalogError::MissingEnvVar {
                var: "SPOTIFY_CLIENT_SECRET",
            }
        })?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

#[derive(Clone)]
pub struct SpotifyCatalog {
    client: Client,
    config: Arc<SpotifyConfig>,
    token: Arc<Mutex<Option<CachedToken>>>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Deserialize)]
struct TrackPage {
    items: Vec<SpotifyTrack>,
}

#[derive(Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
    preview_url: Option<String>,
    duration_ms: u64,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Deserialize)]
struct SpotifyAlbum {
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Deserialize)]
struct SpotifyImage {
    url: String,
}

impl From<SpotifyTrack> for CatalogTrack {
    fn from(track: SpotifyTrack) -> Self {
        Self {
            catalog_id: track.id,
            title: track.name,
            artist: track
                .artists
                .into_iter()
                .map(|artist| artist.name)
                .collect::<Vec<_>>()
                .join(", "),
            artwork_url: track
                .album
                .images
                .into_iter()
                .next()
                .map(|image| image.url)
                .unwrap_or_default(),
            preview_url: track.preview_url,
            duration_ms: track.duration_ms,
        }
    }
}

impl SpotifyCatalog {
    pub fn new(config: SpotifyConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
            token: Arc::new(Mutex::new(None)),
        }
    }

    async fn access_token(&self) -> Result<String, CatalogError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| Instant::now() < t.expires_at) {
            return Ok(token.value.clone());
        }

        debug!("requesting a fresh Spotify client token");
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(CatalogError::Authentication {
                status: response.status().as_u16(),
            });
        }

        let payload: TokenResponse = response.json().await.map_err(transport)?;
        let lifetime = Duration::from_secs(payload.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        guard.replace(CachedToken {
            value: payload.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(payload.access_token)
    }

    async fn search_tracks(&self, query: String) -> Result<Vec<CatalogTrack>, CatalogError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(SEARCH_URL)
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("type", "track"), ("limit", SEARCH_LIMIT)])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(CatalogError::SearchStatus {
                status: response.status().as_u16(),
            });
        }

        let payload: SearchResponse = response.json().await.map_err(transport)?;
        Ok(payload.tracks.items.into_iter().map(Into::into).collect())
    }
}

impl TrackCatalog for SpotifyCatalog {
    fn search(&self, query: String) -> BoxFuture<'static, Result<Vec<CatalogTrack>, CatalogError>> {
        let catalog = self.clone();
        Box::pin(async move { catalog.search_tracks(query).await })
    }
}

fn transport(err: reqwest::Error) -> CatalogError {
    CatalogError::Transport {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spotify_track_maps_to_catalog_track() {
        let raw = r#"{
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "name": "Never Gonna Give You Up",
            "artists": [{"name": "Rick Astley"}, {"name": "Guest"}],
            "album": {"images": [{"url": "https://img/large"}, {"url": "https://img/small"}]},
            "preview_url": null,
            "duration_ms": 213573
        }"#;
        let track: SpotifyTrack = serde_json::from_str(raw).unwrap();
        let mapped = CatalogTrack::from(track);

        assert_eq!(mapped.catalog_id, "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(mapped.artist, "Rick Astley, Guest");
        assert_eq!(mapped.artwork_url, "https://img/large");
        assert_eq!(mapped.preview_url, None);
        assert_eq!(mapped.duration_ms, 213_573);
    }

    #[test]
    fn missing_artwork_defaults_to_empty() {
        let raw = r#"{"id": "x", "name": "y", "artists": [], "album": {}, "duration_ms": 1}"#;
        let track: SpotifyTrack = serde_json::from_str(raw).unwrap();
        assert_eq!(CatalogTrack::from(track).artwork_url, "");
    }
}
