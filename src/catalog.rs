//! Catalog items as seen by the aggregator, and the lookup seam it resolves through.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CatalogError;

/// A track resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackItem {
    pub id: String,
    pub name: String,
    pub album_name: Option<String>,
    pub album_id: Option<String>,
    pub artist_names: Vec<String>,
}

/// An album resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumItem {
    pub id: String,
    pub name: String,
    pub artist_names: Vec<String>,
    pub genre_names: Vec<String>,
}

/// What a media id turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogItem {
    Track(TrackItem),
    Album(AlbumItem),
}

/// Read-only catalog keyed by track or album id.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn track(&self, id: &str) -> Result<TrackItem, CatalogError>;
    async fn album(&self, id: &str) -> Result<AlbumItem, CatalogError>;
}

/// Discovers whether `media_id` is a track or an album.
///
/// Any track failure falls back to an album lookup. If that also fails,
/// Unauthorized and Forbidden pass through and everything else, not-found
/// included, becomes `Upstream`.
pub async fn resolve<C>(catalog: &C, media_id: &str) -> Result<CatalogItem, CatalogError>
where
    C: CatalogLookup + ?Sized,
{
    match catalog.track(media_id).await {
        Ok(track) => return Ok(CatalogItem::Track(track)),
        Err(e) => tracing::debug!(media_id, error = %e, "track lookup failed, trying album"),
    }

    match catalog.album(media_id).await {
        Ok(album) => Ok(CatalogItem::Album(album)),
        Err(CatalogError::NotFound(_)) => Err(CatalogError::Upstream(format!(
            "{} is neither a track nor an album",
            media_id
        ))),
        Err(e) => Err(e),
    }
}
