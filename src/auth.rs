//! Caller token validation against the external authentication service.

use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::Client;
use serde_json::json;
use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;

/// Header carrying the caller's session token (sent as `Authentication`).
pub const AUTH_HEADER: &str = "authentication";

/// Validates a caller token and returns the user it belongs to.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<i64, AppError>;
}

/// Asks the auth service whether a token is live, then maps it to a user id.
#[derive(Clone)]
pub struct AuthService {
    client: Client,
    auth_url: String,
    pool: SqlitePool,
}

impl AuthService {
    pub fn new(client: Client, auth_url: &str, pool: SqlitePool) -> Self {
        Self {
            client,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            pool,
        }
    }
}

#[async_trait]
impl Authenticator for AuthService {
    async fn validate(&self, token: &str) -> Result<i64, AppError> {
        let res = self
            .client
            .post(format!("{}/auth", self.auth_url))
            .json(&json!({ "token": token }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("auth request failed: {}", e)))?;

        if !res.status().is_success() {
            tracing::warn!(status = %res.status(), "token rejected by auth service");
            return Err(AppError::Unauthorized("authentication failure".into()));
        }

        user_for_token(&self.pool, token).await
    }
}

/// Token-to-user lookup shared by authenticators backed by the tokens table.
pub async fn user_for_token(pool: &SqlitePool, token: &str) -> Result<i64, AppError> {
    db::tokens::user_for_token(pool, token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("authentication failure".into()))
}

/// Extracts the `Authentication` header value.
pub fn header_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized("no security credentials".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_unauthorized() {
        let headers = HeaderMap::new();
        assert!(matches!(header_token(&headers), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn header_is_read() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, HeaderValue::from_static("tok"));
        assert_eq!(header_token(&headers).unwrap(), "tok");
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let pool = db::connect_in_memory().await.unwrap();
        db::tokens::insert_token(&pool, "known", 5).await.unwrap();
        assert_eq!(user_for_token(&pool, "known").await.unwrap(), 5);
        assert!(matches!(
            user_for_token(&pool, "stranger").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    async fn spawn_auth_service() -> String {
        use axum::{routing::post, Json, Router};
        use axum::http::StatusCode;

        let app = Router::new().route(
            "/auth",
            post(|Json(body): Json<serde_json::Value>| async move {
                match body["token"].as_str() {
                    Some("live") | Some("orphan") => StatusCode::OK,
                    _ => StatusCode::UNAUTHORIZED,
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn service_validates_then_maps_token() {
        let pool = db::connect_in_memory().await.unwrap();
        db::tokens::insert_token(&pool, "live", 9).await.unwrap();
        db::tokens::insert_token(&pool, "revoked", 3).await.unwrap();
        let auth = AuthService::new(Client::new(), &spawn_auth_service().await, pool);

        assert_eq!(auth.validate("live").await.unwrap(), 9);
        assert!(matches!(
            auth.validate("revoked").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.validate("orphan").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_upstream() {
        let pool = db::connect_in_memory().await.unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let auth = AuthService::new(Client::new(), &format!("http://{}", addr), pool);

        assert!(matches!(auth.validate("live").await, Err(AppError::Upstream(_))));
    }
}
