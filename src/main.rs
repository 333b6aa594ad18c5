use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use allears::auth::AuthService;
use allears::config::Config;
use allears::spotify::SpotifyClient;
use allears::{db, router, AppState, RatingAggregator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let pool = db::connect(&config.database_url).await?;

    let http = reqwest::Client::builder()
        .timeout(config.lookup_timeout)
        .build()?;
    let auth = AuthService::new(http.clone(), &config.auth_url, pool.clone());
    let spotify = SpotifyClient::new(
        http,
        config.spotify_client_id,
        config.spotify_client_secret,
        &config.spotify_api_base,
        &config.spotify_token_url,
    );

    let state = AppState {
        pool,
        auth: Arc::new(auth),
        spotify,
        aggregator: RatingAggregator::new(config.lookup_concurrency),
    };

    let app = router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {}", addr);

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;

    Ok(())
}
