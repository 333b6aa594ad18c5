use sqlx::SqlitePool;

/// User id a session token belongs to.
pub async fn user_for_token(pool: &SqlitePool, token: &str) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT userid FROM tokens WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await
}

/// Rows are written by the authentication service that shares this database.
#[cfg(test)]
pub(crate) async fn insert_token(pool: &SqlitePool, token: &str, user_id: i64) -> sqlx::Result<()> {
    sqlx::query("INSERT OR REPLACE INTO tokens (token, userid) VALUES (?, ?)")
        .bind(token)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_maps_to_user() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        insert_token(&pool, "abc", 42).await.unwrap();
        assert_eq!(user_for_token(&pool, "abc").await.unwrap(), Some(42));
        assert_eq!(user_for_token(&pool, "nope").await.unwrap(), None);
    }
}
