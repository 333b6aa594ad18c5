//! Relational store for tokens, ratings and folders.

pub mod folders;
pub mod ratings;
pub mod tokens;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Opens the pool and makes sure the tables exist.
pub async fn connect(database_url: &str) -> sqlx::Result<SqlitePool> {
    tracing::debug!("connecting to database: {}", database_url);
    let pool = SqlitePoolOptions::new().connect(database_url).await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory pool, for tests and local runs.
pub async fn connect_in_memory() -> sqlx::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tokens (
            token TEXT PRIMARY KEY,
            userid INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ratings (
            ratingid INTEGER PRIMARY KEY AUTOINCREMENT,
            userid INTEGER NOT NULL,
            musicid TEXT NOT NULL,
            num_stars INTEGER NOT NULL CHECK (num_stars BETWEEN 0 AND 5),
            comment TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS folders (
            folderid INTEGER PRIMARY KEY AUTOINCREMENT,
            userid INTEGER NOT NULL,
            folder_name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS folder_music (
            folderid INTEGER NOT NULL REFERENCES folders(folderid),
            musicid TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
