use sqlx::sqlite::SqlitePool;

use super::video::{VIDEO_SUMMARY_COLUMNS, VideoSummary, VideoSummaryRow};

#[derive(Clone)]
pub struct LikeStore {
    pool: SqlitePool,
}

/// What a like points at.
#[derive(Debug, Clone, Copy)]
pub enum LikeTarget<'a> {
    Video(&'a str),
    Comment(&'a str),
    Tweet(&'a str),
}

impl<'a> LikeTarget<'a> {
    fn column(&self) -> &'static str {
        match self {
            LikeTarget::Video(_) => "video_id",
            LikeTarget::Comment(_) => "comment_id",
            LikeTarget::Tweet(_) => "tweet_id",
        }
    }

    fn id(&self) -> &'a str {
        match self {
            LikeTarget::Video(id) | LikeTarget::Comment(id) | LikeTarget::Tweet(id) => id,
        }
    }
}

impl LikeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Like the target if the user hasn't yet, otherwise remove the like.
    /// Returns whether the target is liked afterwards.
    pub async fn toggle(&self, user_id: &str, target: LikeTarget<'_>) -> Result<bool, sqlx::Error> {
        let column = target.column();
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(&format!(
            "DELETE FROM likes WHERE liked_by = ? AND {} = ?",
            column
        ))
        .bind(user_id)
        .bind(target.id())
        .execute(&mut *tx)
        .await?;

        let liked = if removed.rows_affected() > 0 {
            false
        } else {
            sqlx::query(&format!(
                "INSERT OR IGNORE INTO likes (id, liked_by, {}) VALUES (?, ?, ?)",
                column
            ))
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(user_id)
            .bind(target.id())
            .execute(&mut *tx)
            .await?;
            true
        };

        tx.commit().await?;
        Ok(liked)
    }

    pub async fn count(&self, target: LikeTarget<'_>) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM likes WHERE {} = ?",
            target.column()
        ))
        .bind(target.id())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    /// Videos the user has liked, most recently liked first.
    pub async fn liked_videos(&self, user_id: &str) -> Result<Vec<VideoSummary>, sqlx::Error> {
        let rows: Vec<VideoSummaryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM likes l
             JOIN videos v ON v.id = l.video_id
             JOIN users u ON u.id = v.owner_id
             WHERE l.liked_by = ?
             ORDER BY l.created_at DESC, l.rowid DESC",
            VIDEO_SUMMARY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(VideoSummary::from).collect())
    }
}
