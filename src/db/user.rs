use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::video::{VIDEO_SUMMARY_COLUMNS, VideoSummary, VideoSummaryRow};

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// A registered user, including credential fields. Never serialized directly.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub avatar_public_id: String,
    pub cover_image_url: Option<String>,
    pub cover_image_public_id: Option<String>,
    pub token_version: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields needed to insert a new user.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub fullname: &'a str,
    pub password_hash: &'a str,
    pub avatar_url: &'a str,
    pub avatar_public_id: &'a str,
    pub cover_image_url: Option<&'a str>,
    pub cover_image_public_id: Option<&'a str>,
}

/// Public channel page for a user, as seen by a viewer.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: String,
    pub fullname: String,
    pub username: String,
    pub email: String,
    #[sqlx(rename = "avatar_url")]
    pub avatar: String,
    #[sqlx(rename = "cover_image_url")]
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

const USER_COLUMNS: &str = "id, username, email, fullname, password_hash, avatar_url, avatar_public_id, cover_image_url, cover_image_public_id, token_version, created_at, updated_at";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new user. Fails with a unique violation on duplicate username or email.
    pub async fn create(&self, user: &NewUser<'_>) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO users (id, username, email, fullname, password_hash, avatar_url, avatar_public_id, cover_image_url, cover_image_public_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(user.username)
        .bind(user.email)
        .bind(user.fullname)
        .bind(user.password_hash)
        .bind(user.avatar_url)
        .bind(user.avatar_public_id)
        .bind(user.cover_image_url)
        .bind(user.cover_image_public_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find a user matching either the username or the email.
    pub async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE username = ? OR email = ? LIMIT 1",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Check whether a username or email is already registered.
    pub async fn exists_with_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
                .bind(username)
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    pub async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Invalidate every access token issued so far. Returns the new version.
    pub async fn bump_token_version(&self, id: &str) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "UPDATE users SET token_version = token_version + 1 WHERE id = ? RETURNING token_version",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    pub async fn update_details(
        &self,
        id: &str,
        fullname: &str,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET fullname = ?, email = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(fullname)
        .bind(email)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_avatar(
        &self,
        id: &str,
        url: &str,
        public_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET avatar_url = ?, avatar_public_id = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(url)
        .bind(public_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_cover_image(
        &self,
        id: &str,
        url: &str,
        public_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET cover_image_url = ?, cover_image_public_id = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(url)
        .bind(public_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Channel page for `username`, with subscription state relative to `viewer_id`.
    pub async fn channel_profile(
        &self,
        username: &str,
        viewer_id: &str,
    ) -> Result<Option<ChannelProfile>, sqlx::Error> {
        sqlx::query_as(
            "SELECT u.id, u.fullname, u.username, u.email, u.avatar_url, u.cover_image_url,
                (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id) AS subscribers_count,
                (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id) AS channels_subscribed_to_count,
                EXISTS (SELECT 1 FROM subscriptions s WHERE s.channel_id = u.id AND s.subscriber_id = ?) AS is_subscribed
             FROM users u WHERE u.username = ?",
        )
        .bind(viewer_id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// Append a video to the user's watch history. Duplicates are kept.
    pub async fn push_watch_history(&self, user_id: &str, video_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO watch_history (user_id, video_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ids of the videos in the user's watch history, most recent last.
    pub async fn watch_history_ids(&self, user_id: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT video_id FROM watch_history WHERE user_id = ? ORDER BY id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Watch history with video details, most recent last.
    pub async fn watch_history(&self, user_id: &str) -> Result<Vec<VideoSummary>, sqlx::Error> {
        let rows: Vec<VideoSummaryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM watch_history h
             JOIN videos v ON v.id = h.video_id
             JOIN users u ON u.id = v.owner_id
             WHERE h.user_id = ?
             ORDER BY h.id",
            VIDEO_SUMMARY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(VideoSummary::from).collect())
    }
}
