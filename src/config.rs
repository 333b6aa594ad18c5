use std::env;
use std::time::Duration;

/// Application configuration from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// SQLite database. Its `tokens` table is owned by the authentication
    /// service, which must point at the same file; this service only reads it.
    pub database_url: String,
    /// Base URL of the authentication service; tokens are checked at `{auth_url}/auth`.
    pub auth_url: String,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_api_base: String,
    pub spotify_token_url: String,
    pub lookup_concurrency: usize,
    pub lookup_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8081);

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://allears.db?mode=rwc".into());

        let auth_url = env::var("AUTH_URL")
            .map_err(|_| anyhow::anyhow!("AUTH_URL is required"))?
            .trim_end_matches('/')
            .to_string();

        let spotify_client_id = env::var("SPOTIFY_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("SPOTIFY_CLIENT_ID is required"))?;

        let spotify_client_secret = env::var("SPOTIFY_CLIENT_SECRET")
            .map_err(|_| anyhow::anyhow!("SPOTIFY_CLIENT_SECRET is required"))?;

        let spotify_api_base = env::var("SPOTIFY_API_BASE")
            .unwrap_or_else(|_| crate::spotify::API_BASE.into());

        let spotify_token_url = env::var("SPOTIFY_TOKEN_URL")
            .unwrap_or_else(|_| crate::spotify::TOKEN_URL.into());

        let lookup_concurrency = env::var("LOOKUP_CONCURRENCY")
            .ok()
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(4)
            .max(1);

        let lookup_timeout = env::var("LOOKUP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Ok(Self {
            port,
            database_url,
            auth_url,
            spotify_client_id,
            spotify_client_secret,
            spotify_api_base,
            spotify_token_url,
            lookup_concurrency,
            lookup_timeout,
        })
    }
}
