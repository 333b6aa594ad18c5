//! Rating aggregation.
//!
//! Resolves each stored rating against the catalog and accumulates star
//! weights per album, artist, genre and track to produce top-N rankings.
//! Lookups may run concurrently (bounded), but tallies are always applied in
//! input order so ties rank the same way a sequential run would. The first
//! lookup failure to complete aborts the run without waiting on the others.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::catalog::{resolve, CatalogItem, CatalogLookup};
use crate::error::{AggregateError, CatalogError};

/// Entries kept per ranking.
pub const TOP_N: usize = 5;

/// A stored rating as read from the ratings table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub rating_id: i64,
    pub user_id: i64,
    pub media_id: String,
    pub num_stars: i64,
    pub comment: String,
}

/// Accumulated weight per display name, iterated in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct Tally {
    entries: Vec<(String, i64)>,
    index: HashMap<String, usize>,
}

impl Tally {
    pub fn credit(&mut self, name: &str, weight: i64) {
        match self.index.get(name) {
            Some(&i) => self.entries[i].1 += weight,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), weight));
            }
        }
    }

    /// Credits every distinct name in `names` once.
    pub fn credit_each(&mut self, names: &[String], weight: i64) {
        for (i, name) in names.iter().enumerate() {
            if !names[..i].contains(name) {
                self.credit(name, weight);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.index.get(name).map(|&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest weights first; equal weights keep first-seen order.
    pub fn top(&self, n: usize) -> Vec<(String, i64)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// The four tallies of one aggregation run.
#[derive(Debug, Default, Clone)]
pub struct Tallies {
    pub albums: Tally,
    pub artists: Tally,
    pub genres: Tally,
    pub tracks: Tally,
}

impl Tallies {
    fn apply(&mut self, item: &CatalogItem, genres: &[String], stars: i64) {
        match item {
            CatalogItem::Track(track) => {
                self.tracks.credit(&track.name, stars);
                if let Some(ref album) = track.album_name {
                    self.albums.credit(album, stars);
                }
                self.artists.credit_each(&track.artist_names, stars);
            }
            CatalogItem::Album(album) => {
                self.albums.credit(&album.name, stars);
                self.artists.credit_each(&album.artist_names, stars);
            }
        }
        self.genres.credit_each(genres, stars);
    }
}

/// Aggregate view of a user's ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResult {
    pub average_rating: f64,
    pub top_albums: Vec<(String, i64)>,
    pub top_artists: Vec<(String, i64)>,
    pub top_genres: Vec<(String, i64)>,
    pub top_tracks: Vec<(String, i64)>,
}

/// Display fields for one media id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    pub artists: Vec<String>,
    pub trackid: String,
}

impl MediaSummary {
    fn new(media_id: &str, item: CatalogItem) -> Self {
        match item {
            CatalogItem::Track(t) => Self {
                track_name: Some(t.name),
                album: t.album_name,
                artists: t.artist_names,
                trackid: media_id.to_string(),
            },
            CatalogItem::Album(a) => Self {
                track_name: None,
                album: Some(a.name),
                artists: a.artist_names,
                trackid: media_id.to_string(),
            },
        }
    }
}

/// A rating joined with its catalog display fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRating {
    pub userid: i64,
    pub num_stars: i64,
    pub comment: String,
    #[serde(flatten)]
    pub media: MediaSummary,
}

#[derive(Debug, Clone)]
pub struct RatingAggregator {
    concurrency: usize,
}

impl Default for RatingAggregator {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl RatingAggregator {
    /// `concurrency` bounds the number of in-flight catalog lookups; 0 is treated as 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub async fn compute_stats<C>(
        &self,
        ratings: &[RatingRecord],
        catalog: &C,
    ) -> Result<StatsResult, AggregateError>
    where
        C: CatalogLookup + ?Sized,
    {
        if ratings.is_empty() {
            return Err(AggregateError::InvalidInput("no ratings to aggregate".into()));
        }

        let total: i64 = ratings.iter().map(|r| r.num_stars).sum();
        let average_rating = total as f64 / ratings.len() as f64;

        let ids: Vec<String> = ratings.iter().map(|r| r.media_id.clone()).collect();
        let resolved = self
            .fan_out(ids, move |id| async move { resolve_with_genres(catalog, &id).await })
            .await?;

        let mut tallies = Tallies::default();
        for (rating, (item, genres)) in ratings.iter().zip(&resolved) {
            tallies.apply(item, genres, rating.num_stars);
        }

        tracing::info!(
            rating_count = ratings.len(),
            albums = tallies.albums.len(),
            artists = tallies.artists.len(),
            genres = tallies.genres.len(),
            tracks = tallies.tracks.len(),
            "aggregated ratings"
        );

        Ok(StatsResult {
            average_rating,
            top_albums: tallies.albums.top(TOP_N),
            top_artists: tallies.artists.top(TOP_N),
            top_genres: tallies.genres.top(TOP_N),
            top_tracks: tallies.tracks.top(TOP_N),
        })
    }

    /// Resolves every rating and keys the enriched record by rating id.
    pub async fn decorate_ratings<C>(
        &self,
        ratings: &[RatingRecord],
        catalog: &C,
    ) -> Result<BTreeMap<i64, EnrichedRating>, AggregateError>
    where
        C: CatalogLookup + ?Sized,
    {
        let ids: Vec<&str> = ratings.iter().map(|r| r.media_id.as_str()).collect();
        let summaries = self.describe_media(&ids, catalog).await?;

        Ok(ratings
            .iter()
            .zip(summaries)
            .map(|(r, media)| {
                (
                    r.rating_id,
                    EnrichedRating {
                        userid: r.user_id,
                        num_stars: r.num_stars,
                        comment: r.comment.clone(),
                        media,
                    },
                )
            })
            .collect())
    }

    /// Resolves media ids to display fields, in input order.
    pub async fn describe_media<C>(
        &self,
        media_ids: &[&str],
        catalog: &C,
    ) -> Result<Vec<MediaSummary>, AggregateError>
    where
        C: CatalogLookup + ?Sized,
    {
        let ids: Vec<String> = media_ids.iter().map(|id| id.to_string()).collect();
        let summaries = self
            .fan_out(ids, move |id| async move {
                let item = resolve(catalog, &id).await?;
                Ok::<_, CatalogError>(MediaSummary::new(&id, item))
            })
            .await?;
        Ok(summaries)
    }

    /// Runs `lookup` over `ids` with at most `concurrency` in flight and
    /// returns the results in input order. The first failure to complete is
    /// returned at once and drops the lookups still in flight.
    async fn fan_out<T, F, Fut>(&self, ids: Vec<String>, lookup: F) -> Result<Vec<T>, CatalogError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let mut indexed: Vec<(usize, T)> = stream::iter(ids.into_iter().enumerate())
            .map(|(i, id)| {
                let pending = lookup(id);
                async move { pending.await.map(|value| (i, value)) }
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;
        indexed.sort_by_key(|(i, _)| *i);
        Ok(indexed.into_iter().map(|(_, value)| value).collect())
    }
}

/// Resolves a media id and finds its genres. Tracks carry no genres, so their
/// album is looked up; a failure there only drops the genres.
async fn resolve_with_genres<C>(
    catalog: &C,
    media_id: &str,
) -> Result<(CatalogItem, Vec<String>), CatalogError>
where
    C: CatalogLookup + ?Sized,
{
    let item = resolve(catalog, media_id).await?;
    let genres = match &item {
        CatalogItem::Album(album) => album.genre_names.clone(),
        CatalogItem::Track(track) => match track.album_id {
            Some(ref album_id) => match catalog.album(album_id).await {
                Ok(album) => album.genre_names,
                Err(e) => {
                    tracing::warn!(media_id, album_id = %album_id, error = %e, "genre lookup failed, skipping");
                    Vec::new()
                }
            },
            None => Vec::new(),
        },
    };
    Ok((item, genres))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fake::FakeCatalog;

    fn rating(id: i64, media: &str, stars: i64) -> RatingRecord {
        RatingRecord {
            rating_id: id,
            user_id: 7,
            media_id: media.to_string(),
            num_stars: stars,
            comment: format!("comment {}", id),
        }
    }

    fn names(top: &[(String, i64)]) -> Vec<&str> {
        top.iter().map(|(n, _)| n.as_str()).collect()
    }

    #[tokio::test]
    async fn repeated_track_accumulates_everywhere() {
        let catalog = FakeCatalog::default()
            .with_track("trackA", "T", ("albA", "Alb"), &["X", "Y"])
            .with_album("albA", "Alb", &["X", "Y"], &["rock"]);
        let ratings = vec![rating(1, "trackA", 5), rating(2, "trackA", 1)];

        let stats = RatingAggregator::default()
            .compute_stats(&ratings, &catalog)
            .await
            .unwrap();

        assert_eq!(stats.top_tracks, vec![("T".to_string(), 6)]);
        assert_eq!(stats.top_albums, vec![("Alb".to_string(), 6)]);
        assert_eq!(
            stats.top_artists,
            vec![("X".to_string(), 6), ("Y".to_string(), 6)]
        );
        assert_eq!(stats.top_genres, vec![("rock".to_string(), 6)]);
        assert_eq!(stats.average_rating, 3.0);
    }

    #[tokio::test]
    async fn average_is_exact_mean() {
        let catalog = FakeCatalog::default()
            .with_album("a", "A", &["X"], &[])
            .with_album("b", "B", &["X"], &[])
            .with_album("c", "C", &["X"], &[]);
        let ratings = vec![rating(1, "a", 5), rating(2, "b", 3), rating(3, "c", 4)];

        let stats = RatingAggregator::new(3)
            .compute_stats(&ratings, &catalog)
            .await
            .unwrap();

        assert_eq!(stats.average_rating, 4.0);
        assert!(stats.top_tracks.is_empty());
        assert_eq!(stats.top_artists, vec![("X".to_string(), 12)]);
    }

    #[tokio::test]
    async fn co_credited_artists_each_get_full_weight() {
        let catalog = FakeCatalog::default()
            .with_track("t", "Duet", ("al", "Pair"), &["A", "B"])
            .with_album("al", "Pair", &["A", "B"], &[]);
        let stats = RatingAggregator::default()
            .compute_stats(&[rating(1, "t", 5)], &catalog)
            .await
            .unwrap();
        assert_eq!(
            stats.top_artists,
            vec![("A".to_string(), 5), ("B".to_string(), 5)]
        );
    }

    #[tokio::test]
    async fn duplicate_artist_credit_counts_once() {
        let catalog = FakeCatalog::default().with_album("al", "Echo", &["A", "A"], &["pop", "pop"]);
        let stats = RatingAggregator::default()
            .compute_stats(&[rating(1, "al", 4)], &catalog)
            .await
            .unwrap();
        assert_eq!(stats.top_artists, vec![("A".to_string(), 4)]);
        assert_eq!(stats.top_genres, vec![("pop".to_string(), 4)]);
    }

    #[tokio::test]
    async fn genre_lookup_failure_is_not_fatal() {
        let catalog = FakeCatalog::default()
            .with_track("t1", "One", ("missing", "Lost Album"), &["X"])
            .with_track("t2", "Two", ("al2", "Found"), &["Y"])
            .with_album("al2", "Found", &["Y"], &["jazz"]);
        let ratings = vec![rating(1, "t1", 5), rating(2, "t2", 2)];

        let stats = RatingAggregator::default()
            .compute_stats(&ratings, &catalog)
            .await
            .unwrap();

        assert_eq!(names(&stats.top_tracks), vec!["One", "Two"]);
        assert_eq!(names(&stats.top_albums), vec!["Lost Album", "Found"]);
        assert_eq!(stats.top_genres, vec![("jazz".to_string(), 2)]);
    }

    #[tokio::test]
    async fn one_unauthorized_lookup_fails_the_batch() {
        let catalog = FakeCatalog::default()
            .with_album("ok", "Fine", &["X"], &[])
            .failing("bad", CatalogError::Unauthorized);
        let ratings = vec![rating(1, "ok", 5), rating(2, "bad", 3), rating(3, "ok", 1)];

        let err = RatingAggregator::new(2)
            .compute_stats(&ratings, &catalog)
            .await
            .unwrap_err();
        assert_eq!(err, AggregateError::Catalog(CatalogError::Unauthorized));
    }

    #[tokio::test]
    async fn failure_does_not_wait_on_slower_lookups() {
        let catalog = FakeCatalog::default()
            .stalling("slow")
            .failing("bad", CatalogError::Unauthorized);
        let ratings = vec![rating(1, "slow", 5), rating(2, "bad", 3)];
        let aggregator = RatingAggregator::new(2);

        let stats = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            aggregator.compute_stats(&ratings, &catalog),
        )
        .await
        .expect("stats should fail without waiting on the stalled lookup");
        assert_eq!(stats.unwrap_err(), AggregateError::Catalog(CatalogError::Unauthorized));

        let ids = ["slow", "bad"];
        let described = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            aggregator.describe_media(&ids, &catalog),
        )
        .await
        .expect("describe should fail without waiting on the stalled lookup");
        assert_eq!(described.unwrap_err(), AggregateError::Catalog(CatalogError::Unauthorized));
    }

    #[tokio::test]
    async fn concurrent_results_keep_input_order() {
        let mut catalog = FakeCatalog::default();
        let mut ids = Vec::new();
        for i in 0..8 {
            let id = format!("al{}", i);
            catalog = catalog.with_album(&id, &format!("Album {}", i), &["X"], &[]);
            ids.push(id);
        }
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let summaries = RatingAggregator::new(4)
            .describe_media(&refs, &catalog)
            .await
            .unwrap();

        let trackids: Vec<&str> = summaries.iter().map(|s| s.trackid.as_str()).collect();
        assert_eq!(trackids, refs);
    }

    #[tokio::test]
    async fn forbidden_is_kept() {
        let catalog = FakeCatalog::default().failing("bad", CatalogError::Forbidden);
        let err = RatingAggregator::default()
            .compute_stats(&[rating(1, "bad", 3)], &catalog)
            .await
            .unwrap_err();
        assert_eq!(err, AggregateError::Catalog(CatalogError::Forbidden));
    }

    #[tokio::test]
    async fn unresolvable_id_is_upstream_error() {
        let catalog = FakeCatalog::default();
        let err = RatingAggregator::default()
            .compute_stats(&[rating(1, "ghost", 3)], &catalog)
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::Catalog(CatalogError::Upstream(_))));
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let catalog = FakeCatalog::default();
        let err = RatingAggregator::default()
            .compute_stats(&[], &catalog)
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn rankings_are_capped_and_sorted() {
        let mut catalog = FakeCatalog::default();
        let mut ratings = Vec::new();
        for (i, stars) in [1, 4, 2, 5, 3, 4, 0].into_iter().enumerate() {
            let id = format!("al{}", i);
            catalog = catalog.with_album(&id, &format!("Album {}", i), &["Same"], &[]);
            ratings.push(rating(i as i64, &id, stars));
        }

        let stats = RatingAggregator::new(4)
            .compute_stats(&ratings, &catalog)
            .await
            .unwrap();

        assert_eq!(stats.top_albums.len(), TOP_N);
        assert!(stats.top_albums.windows(2).all(|w| w[0].1 >= w[1].1));
        // "Album 1" and "Album 5" tie at 4; first seen ranks first.
        assert_eq!(
            names(&stats.top_albums),
            vec!["Album 3", "Album 1", "Album 5", "Album 4", "Album 2"]
        );
    }

    #[tokio::test]
    async fn decorate_keys_by_rating_id() {
        let catalog = FakeCatalog::default()
            .with_track("t", "Song", ("al", "Record"), &["X"])
            .with_album("al", "Record", &["X", "Y"], &["soul"]);
        let ratings = vec![rating(10, "t", 4), rating(11, "al", 2)];

        let decorated = RatingAggregator::default()
            .decorate_ratings(&ratings, &catalog)
            .await
            .unwrap();

        let track = &decorated[&10];
        assert_eq!(track.media.track_name.as_deref(), Some("Song"));
        assert_eq!(track.media.album.as_deref(), Some("Record"));
        assert_eq!(track.num_stars, 4);

        let album = &decorated[&11];
        assert_eq!(album.media.track_name, None);
        assert_eq!(album.media.artists, vec!["X", "Y"]);
        assert_eq!(album.media.trackid, "al");

        let json = serde_json::to_value(album).unwrap();
        assert!(json.get("track_name").is_none());
        assert_eq!(json["comment"], "comment 11");
    }

    #[tokio::test]
    async fn decorate_does_not_fetch_genres() {
        let catalog = FakeCatalog::default()
            .with_track("t", "Song", ("al", "Record"), &["X"])
            .with_album("al", "Record", &["X"], &["soul"]);
        RatingAggregator::default()
            .decorate_ratings(&[rating(1, "t", 3)], &catalog)
            .await
            .unwrap();
        assert_eq!(catalog.album_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn tally_keeps_first_seen_order_on_ties() {
        let mut tally = Tally::default();
        tally.credit("b", 2);
        tally.credit("a", 3);
        tally.credit("b", 1);
        tally.credit("c", 3);
        assert_eq!(tally.get("b"), Some(3));
        assert_eq!(
            tally.top(2),
            vec![("b".to_string(), 3), ("a".to_string(), 3)]
        );
    }
}
