//! HTTP handlers for the ratings API.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;

use crate::aggregator::{EnrichedRating, MediaSummary, RatingAggregator, StatsResult};
use crate::auth::{header_token, Authenticator};
use crate::db::{self, folders::Folder, ratings::RatingOrder};
use crate::error::AppError;
use crate::spotify::{SearchError, SearchHit, SpotifyClient};

/// Shared handler state. Every collaborator is injected here at startup.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub auth: Arc<dyn Authenticator>,
    pub spotify: SpotifyClient,
    pub aggregator: RatingAggregator,
}

/// Body for `POST /create_rating/:token`.
#[derive(Debug, Deserialize)]
pub struct CreateRatingRequest {
    pub musicid: String,
    #[serde(default)]
    pub num_stars: i64,
    #[serde(default)]
    pub comment: String,
}

/// Body for `POST /create_folder`.
#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub token: String,
    pub folder_name: String,
}

/// Body for `POST /add_to_folder`.
#[derive(Debug, Deserialize)]
pub struct AddToFolderRequest {
    pub token: String,
    pub folderid: i64,
    pub musicid: String,
}

/// `GET /user_stats` answer: stats, or a note that there is nothing to aggregate.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserStatsResponse {
    Stats(StatsResult),
    NoRatings { message: String },
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::UnknownKind(_) | SearchError::Empty(_) => {
                AppError::BadRequest(err.to_string())
            }
            SearchError::Catalog(e) => e.into(),
        }
    }
}

/// GET /health - Health check.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /access_token - App token for catalog calls made by the client.
pub async fn access_token(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let token = state.spotify.access_token().await?;
    Ok(Json(json!({ "type": "success", "access_token": token })))
}

/// GET /search/:type_param/:filter_query/:token
pub async fn search(
    State(state): State<AppState>,
    Path((type_param, filter_query, token)): Path<(String, String, String)>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    if filter_query.trim().is_empty() {
        return Err(AppError::BadRequest("search query cannot be empty".into()));
    }
    let hits = state.spotify.search(&token, &type_param, &filter_query).await?;
    Ok(Json(hits))
}

/// POST /create_rating/:token
pub async fn create_rating(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<CreateRatingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = state.auth.validate(&token).await?;

    if body.musicid.trim().is_empty() {
        return Err(AppError::BadRequest("musicid is required".into()));
    }
    if !(0..=5).contains(&body.num_stars) {
        return Err(AppError::BadRequest("num_stars must be between 0 and 5".into()));
    }

    let rating_id = db::ratings::insert_rating(
        &state.pool,
        user_id,
        &body.musicid,
        body.num_stars,
        &body.comment,
    )
    .await?;
    tracing::info!(user_id, rating_id, media_id = %body.musicid, "rating created");

    Ok(Json(json!({ "message": "Rating added successfully", "ratingid": rating_id })))
}

/// GET /get_ratings/:spotify_token
pub async fn get_ratings(
    State(state): State<AppState>,
    Path(spotify_token): Path<String>,
    headers: HeaderMap,
) -> Result<Json<BTreeMap<i64, EnrichedRating>>, AppError> {
    let user_id = state.auth.validate(header_token(&headers)?).await?;
    let ratings = db::ratings::ratings_for_user(&state.pool, user_id, RatingOrder::ById).await?;

    let catalog = state.spotify.catalog(&spotify_token);
    let decorated = state.aggregator.decorate_ratings(&ratings, &catalog).await?;
    Ok(Json(decorated))
}

/// GET /user_stats/:spotify_token
pub async fn user_stats(
    State(state): State<AppState>,
    Path(spotify_token): Path<String>,
    headers: HeaderMap,
) -> Result<Json<UserStatsResponse>, AppError> {
    let user_id = state.auth.validate(header_token(&headers)?).await?;
    let ratings =
        db::ratings::ratings_for_user(&state.pool, user_id, RatingOrder::ByStarsDesc).await?;

    if ratings.is_empty() {
        tracing::info!(user_id, "no ratings to aggregate");
        return Ok(Json(UserStatsResponse::NoRatings {
            message: "user has no ratings".into(),
        }));
    }

    let catalog = state.spotify.catalog(&spotify_token);
    let stats = state.aggregator.compute_stats(&ratings, &catalog).await?;
    Ok(Json(UserStatsResponse::Stats(stats)))
}

/// POST /create_folder
pub async fn create_folder(
    State(state): State<AppState>,
    Json(body): Json<CreateFolderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = state.auth.validate(&body.token).await?;
    if body.folder_name.trim().is_empty() {
        return Err(AppError::BadRequest("folder_name is required".into()));
    }
    let folder_id = db::folders::create_folder(&state.pool, user_id, &body.folder_name).await?;
    tracing::info!(user_id, folder_id, "folder created");
    Ok(Json(json!({ "folderid": folder_id })))
}

/// GET /get_folders
pub async fn get_folders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Folder>>, AppError> {
    let user_id = state.auth.validate(header_token(&headers)?).await?;
    let folders = db::folders::folders_for_user(&state.pool, user_id).await?;
    Ok(Json(folders))
}

/// POST /add_to_folder
pub async fn add_to_folder(
    State(state): State<AppState>,
    Json(body): Json<AddToFolderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = state.auth.validate(&body.token).await?;
    if body.musicid.trim().is_empty() {
        return Err(AppError::BadRequest("musicid is required".into()));
    }
    owned_folder(&state.pool, body.folderid, user_id).await?;
    db::folders::add_to_folder(&state.pool, body.folderid, &body.musicid).await?;
    Ok(Json(json!({ "message": "Music added to folder successfully" })))
}

/// GET /open_folder/:spotify_token/:folderid
pub async fn open_folder(
    State(state): State<AppState>,
    Path((spotify_token, folder_id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Result<Json<BTreeMap<usize, MediaSummary>>, AppError> {
    let user_id = state.auth.validate(header_token(&headers)?).await?;
    owned_folder(&state.pool, folder_id, user_id).await?;

    let contents = db::folders::folder_contents(&state.pool, folder_id).await?;
    let ids: Vec<&str> = contents.iter().map(String::as_str).collect();
    let catalog = state.spotify.catalog(&spotify_token);
    let summaries = state.aggregator.describe_media(&ids, &catalog).await?;

    Ok(Json((1..).zip(summaries).collect()))
}

async fn owned_folder(pool: &SqlitePool, folder_id: i64, user_id: i64) -> Result<(), AppError> {
    match db::folders::folder_owner(pool, folder_id).await? {
        Some(owner) if owner == user_id => Ok(()),
        _ => Err(AppError::NotFound(format!("no folder {}", folder_id))),
    }
}

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/access_token", get(access_token))
        .route("/search/:type_param/:filter_query/:token", get(search))
        .route("/create_rating/:token", post(create_rating))
        .route("/get_ratings/:spotify_token", get(get_ratings))
        .route("/user_stats/:spotify_token", get(user_stats))
        .route("/create_folder", post(create_folder))
        .route("/get_folders", get(get_folders))
        .route("/add_to_folder", post(add_to_folder))
        .route("/open_folder/:spotify_token/:folderid", get(open_folder))
}
