use sqlx::{Row, SqlitePool};

use crate::aggregator::RatingRecord;

/// Row order for a user's ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingOrder {
    /// Oldest first.
    ById,
    /// Most stars first, then oldest.
    ByStarsDesc,
}

/// Inserts a rating and returns its id.
pub async fn insert_rating(
    pool: &SqlitePool,
    user_id: i64,
    media_id: &str,
    num_stars: i64,
    comment: &str,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO ratings (userid, musicid, num_stars, comment)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(media_id)
    .bind(num_stars)
    .bind(comment)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn ratings_for_user(
    pool: &SqlitePool,
    user_id: i64,
    order: RatingOrder,
) -> sqlx::Result<Vec<RatingRecord>> {
    let sql = match order {
        RatingOrder::ById => {
            "SELECT ratingid, userid, musicid, num_stars, comment FROM ratings WHERE userid = ? ORDER BY ratingid"
        }
        RatingOrder::ByStarsDesc => {
            "SELECT ratingid, userid, musicid, num_stars, comment FROM ratings WHERE userid = ? ORDER BY num_stars DESC, ratingid"
        }
    };

    let rows = sqlx::query(sql).bind(user_id).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| RatingRecord {
            rating_id: row.get("ratingid"),
            user_id: row.get("userid"),
            media_id: row.get("musicid"),
            num_stars: row.get("num_stars"),
            comment: row.get("comment"),
        })
        .collect())
}
