mod comment;
mod dashboard;
mod like;
mod playlist;
mod session;
mod subscription;
mod tweet;
mod user;
mod video;

use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use comment::{Comment, CommentAuthor, CommentStore, CommentView};
pub use dashboard::{ChannelStats, ChannelVideos, DashboardStore};
pub use like::{LikeStore, LikeTarget};
pub use playlist::{Playlist, PlaylistCover, PlaylistDetail, PlaylistStore, PlaylistSummary};
pub use session::{SessionSlot, SessionStore};
pub use subscription::{
    LatestVideo, SubscribedChannel, SubscriberEntry, SubscriberProfile, SubscriptionStore,
};
pub use tweet::{Tweet, TweetAuthor, TweetStore, TweetView};
pub use user::{ChannelProfile, NewUser, User, UserStore};
pub use video::{
    NewVideo, OwnerSummary, Video, VideoDetail, VideoOwner, VideoQuery, VideoSort, VideoSortField,
    VideoStore, VideoSummary,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id TEXT PRIMARY KEY NOT NULL,
                    username TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    fullname TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    avatar_url TEXT NOT NULL,
                    avatar_public_id TEXT NOT NULL,
                    cover_image_url TEXT,
                    cover_image_public_id TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                // One live refresh token per user, stored as a fingerprint
                "CREATE TABLE sessions (
                    user_id TEXT PRIMARY KEY NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    token_hash TEXT NOT NULL,
                    expires_at INTEGER NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_sessions_expires_at ON sessions(expires_at)",
                "CREATE TABLE videos (
                    id TEXT PRIMARY KEY NOT NULL,
                    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    video_url TEXT NOT NULL,
                    video_public_id TEXT NOT NULL,
                    thumbnail_url TEXT NOT NULL,
                    thumbnail_public_id TEXT NOT NULL,
                    duration REAL NOT NULL DEFAULT 0,
                    views INTEGER NOT NULL DEFAULT 0,
                    is_published INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_videos_owner_id ON videos(owner_id)",
                "CREATE INDEX idx_videos_published ON videos(is_published, created_at)",
                // Ordered by rowid, duplicates allowed
                "CREATE TABLE watch_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                    watched_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_watch_history_user_id ON watch_history(user_id)",
                "CREATE TABLE comments (
                    id TEXT PRIMARY KEY NOT NULL,
                    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_comments_video_id ON comments(video_id)",
                "CREATE TABLE tweets (
                    id TEXT PRIMARY KEY NOT NULL,
                    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_tweets_owner_id ON tweets(owner_id)",
                // Exactly one of video_id, comment_id, tweet_id is set
                "CREATE TABLE likes (
                    id TEXT PRIMARY KEY NOT NULL,
                    liked_by TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    video_id TEXT REFERENCES videos(id) ON DELETE CASCADE,
                    comment_id TEXT REFERENCES comments(id) ON DELETE CASCADE,
                    tweet_id TEXT REFERENCES tweets(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE UNIQUE INDEX idx_likes_video ON likes(liked_by, video_id) WHERE video_id IS NOT NULL",
                "CREATE UNIQUE INDEX idx_likes_comment ON likes(liked_by, comment_id) WHERE comment_id IS NOT NULL",
                "CREATE UNIQUE INDEX idx_likes_tweet ON likes(liked_by, tweet_id) WHERE tweet_id IS NOT NULL",
                "CREATE TABLE playlists (
                    id TEXT PRIMARY KEY NOT NULL,
                    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_playlists_owner_id ON playlists(owner_id)",
                "CREATE TABLE playlist_videos (
                    playlist_id TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
                    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                    added_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (playlist_id, video_id)
                )",
                "CREATE TABLE subscriptions (
                    id TEXT PRIMARY KEY NOT NULL,
                    subscriber_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    channel_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE (subscriber_id, channel_id)
                )",
                "CREATE INDEX idx_subscriptions_channel_id ON subscriptions(channel_id)",
            ],
        )
        .await
    }

    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &[
                // Access tokens carrying an older version are rejected
                "ALTER TABLE users ADD COLUMN token_version INTEGER NOT NULL DEFAULT 0",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the refresh-token session store.
    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.pool.clone())
    }

    pub fn videos(&self) -> VideoStore {
        VideoStore::new(self.pool.clone())
    }

    pub fn comments(&self) -> CommentStore {
        CommentStore::new(self.pool.clone())
    }

    pub fn tweets(&self) -> TweetStore {
        TweetStore::new(self.pool.clone())
    }

    pub fn likes(&self) -> LikeStore {
        LikeStore::new(self.pool.clone())
    }

    pub fn playlists(&self) -> PlaylistStore {
        PlaylistStore::new(self.pool.clone())
    }

    pub fn subscriptions(&self) -> SubscriptionStore {
        SubscriptionStore::new(self.pool.clone())
    }

    /// Get the channel statistics store.
    pub fn dashboard(&self) -> DashboardStore {
        DashboardStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// True if the error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total_docs: i64,
    pub limit: u32,
    pub page: u32,
    pub total_pages: i64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total_docs: i64, page: u32, limit: u32) -> Self {
        let limit = limit.max(1);
        let total_pages = (total_docs + i64::from(limit) - 1) / i64::from(limit);
        Self {
            docs,
            total_docs,
            limit,
            page,
            total_pages,
            has_prev_page: page > 1,
            has_next_page: i64::from(page) < total_pages,
        }
    }
}

/// Convert a page/limit pair into a SQL offset.
pub(crate) fn page_offset(page: u32, limit: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(limit)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Insert a user with a placeholder password hash and return its id.
    pub async fn user(db: &Database, username: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        db.users()
            .create(&NewUser {
                id: &id,
                username,
                email: &format!("{}@x.com", username),
                fullname: username,
                password_hash: "hash",
                avatar_url: "https://media/avatar.png",
                avatar_public_id: "avatar",
                cover_image_url: None,
                cover_image_public_id: None,
            })
            .await
            .unwrap();
        id
    }

    /// Insert a published video owned by `owner` and return its id.
    pub async fn video(db: &Database, owner: &str, title: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        db.videos()
            .create(&NewVideo {
                id: &id,
                owner_id: owner,
                title,
                description: "description",
                video_url: "https://media/video.mp4",
                video_public_id: "video",
                thumbnail_url: "https://media/thumb.png",
                thumbnail_public_id: "thumb",
                duration: 12.5,
            })
            .await
            .unwrap();
        id
    }
}
