use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// A user's named collection of media ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub folderid: i64,
    pub userid: i64,
    pub folder_name: String,
}

pub async fn create_folder(pool: &SqlitePool, user_id: i64, name: &str) -> sqlx::Result<i64> {
    let result = sqlx::query("INSERT INTO folders (userid, folder_name) VALUES (?, ?)")
        .bind(user_id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn folders_for_user(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Vec<Folder>> {
    let rows = sqlx::query(
        "SELECT folderid, userid, folder_name FROM folders WHERE userid = ? ORDER BY folderid",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Folder {
            folderid: row.get("folderid"),
            userid: row.get("userid"),
            folder_name: row.get("folder_name"),
        })
        .collect())
}

/// Owner of a folder, if it exists.
pub async fn folder_owner(pool: &SqlitePool, folder_id: i64) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT userid FROM folders WHERE folderid = ?")
        .bind(folder_id)
        .fetch_optional(pool)
        .await
}

pub async fn add_to_folder(pool: &SqlitePool, folder_id: i64, media_id: &str) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO folder_music (folderid, musicid) VALUES (?, ?)")
        .bind(folder_id)
        .bind(media_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Media ids in a folder, in insertion order.
pub async fn folder_contents(pool: &SqlitePool, folder_id: i64) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar("SELECT musicid FROM folder_music WHERE folderid = ? ORDER BY rowid")
        .bind(folder_id)
        .fetch_all(pool)
        .await
}
