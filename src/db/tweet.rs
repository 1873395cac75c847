use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TweetStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    #[serde(rename = "owner")]
    pub owner_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TweetAuthor {
    pub username: String,
    pub avatar: String,
}

/// A tweet as listed on a user's page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetView {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub total_likes: i64,
    pub owner_details: TweetAuthor,
}

#[derive(sqlx::FromRow)]
struct TweetViewRow {
    id: String,
    content: String,
    created_at: String,
    updated_at: String,
    total_likes: i64,
    owner_username: String,
    owner_avatar: String,
}

const TWEET_COLUMNS: &str = "id, owner_id, content, created_at, updated_at";

impl TweetStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, id: &str, owner_id: &str, content: &str) -> Result<Tweet, sqlx::Error> {
        sqlx::query_as(&format!(
            "INSERT INTO tweets (id, owner_id, content) VALUES (?, ?, ?) RETURNING {}",
            TWEET_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Tweet>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM tweets WHERE id = ?", TWEET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Tweets by a user, newest first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<TweetView>, sqlx::Error> {
        let rows: Vec<TweetViewRow> = sqlx::query_as(
            "SELECT t.id, t.content, t.created_at, t.updated_at,
                (SELECT COUNT(*) FROM likes l WHERE l.tweet_id = t.id) AS total_likes,
                u.username AS owner_username, u.avatar_url AS owner_avatar
             FROM tweets t JOIN users u ON u.id = t.owner_id
             WHERE t.owner_id = ?
             ORDER BY t.created_at DESC, t.rowid DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TweetView {
                id: row.id,
                content: row.content,
                created_at: row.created_at,
                updated_at: row.updated_at,
                total_likes: row.total_likes,
                owner_details: TweetAuthor {
                    username: row.owner_username,
                    avatar: row.owner_avatar,
                },
            })
            .collect())
    }

    pub async fn update(&self, id: &str, content: &str) -> Result<Option<Tweet>, sqlx::Error> {
        sqlx::query_as(&format!(
            "UPDATE tweets SET content = ?, updated_at = datetime('now') WHERE id = ? RETURNING {}",
            TWEET_COLUMNS
        ))
        .bind(content)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tweets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, LikeTarget, test_support};

    #[tokio::test]
    async fn test_list_by_owner() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let bob = test_support::user(&db, "bob").await;

        db.tweets().create("t1", &alice, "hello").await.unwrap();
        db.tweets().create("t2", &alice, "again").await.unwrap();
        db.tweets().create("t3", &bob, "not mine").await.unwrap();
        db.likes().toggle(&bob, LikeTarget::Tweet("t1")).await.unwrap();

        let tweets = db.tweets().list_by_owner(&alice).await.unwrap();
        assert_eq!(tweets.len(), 2);
        assert_eq!(tweets[0].id, "t2");
        assert_eq!(tweets[1].total_likes, 1);
        assert_eq!(tweets[1].owner_details.username, "alice");

        let none = db.tweets().list_by_owner("nobody").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_update_returns_new_content() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        db.tweets().create("t1", &alice, "hello").await.unwrap();

        let tweet = db.tweets().update("t1", "edited").await.unwrap().unwrap();
        assert_eq!(tweet.content, "edited");
        assert_eq!(tweet.owner_id, alice);

        assert!(db.tweets().delete("t1").await.unwrap());
        assert!(db.tweets().get("t1").await.unwrap().is_none());
    }
}
