//! HTTP client for the ratings API, used by the `allears` command-line tool.

use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::aggregator::{EnrichedRating, MediaSummary, StatsResult};
use crate::db::folders::Folder;
use crate::handlers::UserStatsResponse;
use crate::spotify::SearchHit;

pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let res = req.send().await.context("request failed")?;
        let status = res.status();
        if !status.is_success() {
            let body: Value = res.json().await.unwrap_or(Value::Null);
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            bail!("{} ({})", message, status);
        }
        res.json().await.context("unexpected response body")
    }

    pub async fn access_token(&self) -> Result<String> {
        let body: Value = self.send(self.http.get(self.url("/access_token"))).await?;
        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no access_token in response"))
    }

    pub async fn search(&self, kind: &str, query: &str, spotify_token: &str) -> Result<Vec<SearchHit>> {
        let url = self.url(&format!(
            "/search/{}/{}/{}",
            urlencoding::encode(kind),
            urlencoding::encode(query),
            urlencoding::encode(spotify_token)
        ));
        self.send(self.http.get(url)).await
    }

    pub async fn create_rating(&self, token: &str, musicid: &str, num_stars: i64, comment: &str) -> Result<()> {
        if !(0..=5).contains(&num_stars) {
            bail!("invalid number of stars: {}", num_stars);
        }
        let url = self.url(&format!("/create_rating/{}", urlencoding::encode(token)));
        let _: Value = self
            .send(self.http.post(url).json(&json!({
                "musicid": musicid,
                "num_stars": num_stars,
                "comment": comment,
            })))
            .await?;
        Ok(())
    }

    pub async fn ratings(&self, token: &str, spotify_token: &str) -> Result<BTreeMap<i64, EnrichedRating>> {
        let url = self.url(&format!("/get_ratings/{}", urlencoding::encode(spotify_token)));
        self.send(self.http.get(url).header("Authentication", token)).await
    }

    pub async fn stats(&self, token: &str, spotify_token: &str) -> Result<Option<StatsResult>> {
        let url = self.url(&format!("/user_stats/{}", urlencoding::encode(spotify_token)));
        let res: UserStatsResponse = self.send(self.http.get(url).header("Authentication", token)).await?;
        Ok(match res {
            UserStatsResponse::Stats(stats) => Some(stats),
            UserStatsResponse::NoRatings { .. } => None,
        })
    }

    pub async fn folders(&self, token: &str) -> Result<Vec<Folder>> {
        self.send(self.http.get(self.url("/get_folders")).header("Authentication", token))
            .await
    }

    pub async fn create_folder(&self, token: &str, name: &str) -> Result<i64> {
        let body: Value = self
            .send(
                self.http
                    .post(self.url("/create_folder"))
                    .json(&json!({ "token": token, "folder_name": name })),
            )
            .await?;
        body.get("folderid")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("no folderid in response"))
    }

    pub async fn add_to_folder(&self, token: &str, folder_id: i64, musicid: &str) -> Result<()> {
        let _: Value = self
            .send(self.http.post(self.url("/add_to_folder")).json(&json!({
                "token": token,
                "folderid": folder_id,
                "musicid": musicid,
            })))
            .await?;
        Ok(())
    }

    pub async fn open_folder(
        &self,
        token: &str,
        spotify_token: &str,
        folder_id: i64,
    ) -> Result<BTreeMap<usize, MediaSummary>> {
        let url = self.url(&format!(
            "/open_folder/{}/{}",
            urlencoding::encode(spotify_token),
            folder_id
        ));
        self.send(self.http.get(url).header("Authentication", token)).await
    }
}

pub fn render_search(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, hit.name);
        if let Some(ref album) = hit.album {
            let _ = writeln!(out, "    Album: {}", album);
        }
        let _ = writeln!(out, "    Artist: {}", hit.artists.join(", "));
        let _ = writeln!(out, "    Id: {}", hit.trackid);
    }
    out
}

pub fn render_ratings(ratings: &BTreeMap<i64, EnrichedRating>) -> String {
    if ratings.is_empty() {
        return "no ratings...\n".into();
    }
    let mut out = String::from("Ratings:\n");
    for (i, rating) in ratings.values().enumerate() {
        let title = rating
            .media
            .track_name
            .as_deref()
            .or(rating.media.album.as_deref())
            .unwrap_or(&rating.media.trackid);
        let _ = writeln!(out, "{}. {}", i + 1, title);
        if let Some(ref album) = rating.media.album {
            let _ = writeln!(out, "    Album: {}", album);
        }
        let _ = writeln!(out, "    Artist: {}", rating.media.artists.join(", "));
        let _ = writeln!(out, "    Stars: {}", rating.num_stars);
        let _ = writeln!(out, "    Comment: {}", rating.comment);
    }
    out
}

pub fn render_stats(stats: &StatsResult) -> String {
    let mut out = String::from("Your User Ratings Stats:\n");
    let _ = writeln!(out, "Average Rating: {}", stats.average_rating);
    for (title, top) in [
        ("Top Genres", &stats.top_genres),
        ("Top Tracks", &stats.top_tracks),
        ("Top Albums", &stats.top_albums),
        ("Top Artists", &stats.top_artists),
    ] {
        if top.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}:", title);
        for (i, (name, _)) in top.iter().enumerate() {
            let _ = writeln!(out, "    {}. {}", i + 1, name);
        }
    }
    out
}

pub fn render_folders(folders: &[Folder]) -> String {
    if folders.is_empty() {
        return "no folders...\n".into();
    }
    let mut out = String::from("Folders:\n");
    for folder in folders {
        let _ = writeln!(out, "{}. {}", folder.folderid, folder.folder_name);
    }
    out
}

pub fn render_folder(contents: &BTreeMap<usize, MediaSummary>) -> String {
    if contents.is_empty() {
        return "empty folder...\n".into();
    }
    let mut out = String::new();
    for (index, item) in contents {
        let title = item
            .track_name
            .as_deref()
            .or(item.album.as_deref())
            .unwrap_or(&item.trackid);
        let _ = writeln!(out, "{}. {}", index, title);
        if let Some(ref album) = item.album {
            let _ = writeln!(out, "    Album: {}", album);
        }
        let _ = writeln!(out, "    Artist: {}", item.artists.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_skip_empty_sections() {
        let stats = StatsResult {
            average_rating: 4.5,
            top_albums: vec![("Aja".into(), 9)],
            top_artists: vec![("Steely Dan".into(), 9), ("Donald Fagen".into(), 4)],
            top_genres: vec![],
            top_tracks: vec![],
        };
        let text = render_stats(&stats);
        assert!(text.contains("Average Rating: 4.5"));
        assert!(text.contains("    2. Donald Fagen"));
        assert!(!text.contains("Top Genres"));
    }

    #[test]
    fn album_rating_is_titled_by_album() {
        let mut ratings = BTreeMap::new();
        ratings.insert(
            3,
            EnrichedRating {
                userid: 1,
                num_stars: 5,
                comment: "classic".into(),
                media: MediaSummary {
                    track_name: None,
                    album: Some("Aja".into()),
                    artists: vec!["Steely Dan".into()],
                    trackid: "al1".into(),
                },
            },
        );
        let text = render_ratings(&ratings);
        assert!(text.starts_with("Ratings:\n1. Aja\n    Album: Aja\n"));
        assert!(text.contains("Stars: 5"));
    }

    #[tokio::test]
    async fn out_of_range_stars_never_hit_the_network() {
        let client = ApiClient::new("http://127.0.0.1:9");
        let err = client.create_rating("tok", "t1", 9, "").await.unwrap_err();
        assert!(err.to_string().contains("invalid number of stars"));
    }
}
