//! Spotify Web API client.
//!
//! Catalog reads use the caller's bearer token. The app's own token, issued
//! through the Client Credentials flow, is only handed out by `/access_token`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::catalog::{AlbumItem, CatalogLookup, TrackItem};
use crate::error::CatalogError;

pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const API_BASE: &str = "https://api.spotify.com/v1";

/// Spotify API client with app token caching.
#[derive(Clone)]
pub struct SpotifyClient {
    client: Client,
    api_base: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl SpotifyClient {
    /// Builds a client over a shared HTTP client, which carries the request timeout.
    pub fn new(
        client: Client,
        client_id: String,
        client_secret: String,
        api_base: &str,
        token_url: &str,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            client_id,
            client_secret,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Binds a caller's bearer token, yielding a catalog the aggregator can resolve against.
    pub fn catalog(&self, bearer: &str) -> SpotifyCatalog {
        SpotifyCatalog {
            client: self.clone(),
            bearer: bearer.to_string(),
        }
    }

    /// Returns a valid app access token, refreshing if needed.
    pub async fn access_token(&self) -> Result<String, CatalogError> {
        {
            let guard = self.token.read().await;
            if let Some(ref t) = *guard {
                if t.expires_at > Instant::now() {
                    return Ok(t.access_token.clone());
                }
            }
        }

        let token = self.fetch_token().await?;
        {
            let mut guard = self.token.write().await;
            *guard = Some(token.clone());
        }
        Ok(token.access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, CatalogError> {
        let params = [("grant_type", "client_credentials")];
        let auth = base64::engine::general_purpose::STANDARD.encode(
            format!("{}:{}", self.client_id, self.client_secret).as_bytes(),
        );

        let res = self
            .client
            .post(&self.token_url)
            .header("Authorization", format!("Basic {}", auth))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| CatalogError::Upstream(format!("token request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CatalogError::from_status(status, &body));
        }

        let body: TokenResponse = res
            .json()
            .await
            .map_err(|e| CatalogError::Upstream(format!("token parse failed: {}", e)))?;
        let expires_at = Instant::now() + Duration::from_secs(body.expires_in.saturating_sub(60));
        tracing::info!(expires_in = body.expires_in, "fetched app access token");

        Ok(CachedToken {
            access_token: body.access_token,
            expires_at,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, bearer: &str, url: &str) -> Result<T, CatalogError> {
        let res = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", bearer))
            .send()
            .await
            .map_err(|e| CatalogError::Upstream(format!("request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            tracing::debug!(%status, url, "catalog request rejected");
            return Err(CatalogError::from_status(status, &body));
        }

        res.json()
            .await
            .map_err(|e| CatalogError::Upstream(format!("parse failed: {}", e)))
    }

    /// GET /tracks/{id}
    pub async fn get_track(&self, bearer: &str, id: &str) -> Result<Track, CatalogError> {
        let url = format!("{}/tracks/{}", self.api_base, urlencoding::encode(id));
        self.get_json(bearer, &url).await
    }

    /// GET /albums/{id}
    pub async fn get_album(&self, bearer: &str, id: &str) -> Result<Album, CatalogError> {
        let url = format!("{}/albums/{}", self.api_base, urlencoding::encode(id));
        self.get_json(bearer, &url).await
    }

    /// Searches the catalog by kind: `artist`, `genre`, `track` or `album`.
    pub async fn search(&self, bearer: &str, kind: &str, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let q = urlencoding::encode(query);
        let hits: Vec<SearchHit> = match kind {
            "artist" => {
                let url = format!("{}/search?q={}&type=artist&limit=1", self.api_base, q);
                let found: ArtistSearchResponse = self.get_json(bearer, &url).await?;
                let artist = found
                    .artists
                    .items
                    .into_iter()
                    .next()
                    .ok_or(SearchError::Empty("no artist found with given name"))?;
                let url = format!(
                    "{}/artists/{}/top-tracks?country=US",
                    self.api_base,
                    urlencoding::encode(&artist.id)
                );
                let top: TrackList = self.get_json(bearer, &url).await?;
                top.tracks.iter().map(SearchHit::from_track).collect()
            }
            "genre" => {
                let url = format!(
                    "{}/recommendations?limit=20&market=US&seed_genres={}",
                    self.api_base, q
                );
                let recs: TrackList = self.get_json(bearer, &url).await?;
                if recs.tracks.is_empty() {
                    return Err(SearchError::Empty("no genre found"));
                }
                recs.tracks.iter().map(SearchHit::from_track).collect()
            }
            "track" => {
                let url = format!("{}/search?q={}&type=track&market=US&limit=5", self.api_base, q);
                let found: TrackSearchResponse = self.get_json(bearer, &url).await?;
                found.tracks.items.iter().map(SearchHit::from_track).collect()
            }
            "album" => {
                let url = format!("{}/search?q={}&type=album&market=US&limit=10", self.api_base, q);
                let found: AlbumSearchResponse = self.get_json(bearer, &url).await?;
                found.albums.items.iter().map(SearchHit::from_album).collect()
            }
            other => return Err(SearchError::UnknownKind(other.to_string())),
        };
        tracing::debug!(kind, query, hits = hits.len(), "search complete");
        Ok(hits)
    }
}

/// Search failure: either the catalog failed or the request made no sense.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("unsupported search type: {0}")]
    UnknownKind(String),
    #[error("{0}")]
    Empty(&'static str),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Catalog view bound to one caller's bearer token.
#[derive(Clone)]
pub struct SpotifyCatalog {
    client: SpotifyClient,
    bearer: String,
}

#[async_trait]
impl CatalogLookup for SpotifyCatalog {
    async fn track(&self, id: &str) -> Result<TrackItem, CatalogError> {
        self.client.get_track(&self.bearer, id).await.map(TrackItem::from)
    }

    async fn album(&self, id: &str) -> Result<AlbumItem, CatalogError> {
        self.client.get_album(&self.bearer, id).await.map(AlbumItem::from)
    }
}

/// One search result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    pub artists: Vec<String>,
    pub trackid: String,
}

impl SearchHit {
    fn from_track(t: &Track) -> Self {
        Self {
            name: t.name.clone(),
            album: t.album.as_ref().map(|a| a.name.clone()),
            artists: t.artists.iter().map(|a| a.name.clone()).collect(),
            trackid: t.id.clone(),
        }
    }

    fn from_album(a: &Album) -> Self {
        Self {
            name: a.name.clone(),
            album: None,
            artists: a.artists.iter().map(|a| a.name.clone()).collect(),
            trackid: a.id.clone(),
        }
    }
}

impl From<Track> for TrackItem {
    fn from(t: Track) -> Self {
        let (album_name, album_id) = match t.album {
            Some(a) => (Some(a.name), a.id),
            None => (None, None),
        };
        TrackItem {
            id: t.id,
            name: t.name,
            album_name,
            album_id,
            artist_names: t.artists.into_iter().map(|a| a.name).collect(),
        }
    }
}

impl From<Album> for AlbumItem {
    fn from(a: Album) -> Self {
        AlbumItem {
            id: a.id,
            name: a.name,
            artist_names: a.artists.into_iter().map(|a| a.name).collect(),
            genre_names: a.genres,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct ArtistSearchResponse {
    artists: Page<Artist>,
}

#[derive(Deserialize)]
struct TrackSearchResponse {
    tracks: Page<Track>,
}

#[derive(Deserialize)]
struct AlbumSearchResponse {
    albums: Page<Album>,
}

#[derive(Deserialize)]
struct TrackList {
    tracks: Vec<Track>,
}

/// A Spotify track (simplified).
#[derive(Clone, Debug, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Artist {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

/// Album as embedded in a track.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct AlbumRef {
    pub id: Option<String>,
    pub name: String,
}

/// A full Spotify album.
#[derive(Clone, Debug, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub genres: Vec<String>,
}
