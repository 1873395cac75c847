use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::{Page, page_offset};

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(rename = "video")]
    pub video_id: String,
    #[serde(rename = "owner")]
    pub owner_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentAuthor {
    pub username: String,
    pub fullname: String,
    pub avatar: String,
}

/// A comment as listed under a video.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub likes_count: i64,
    pub is_liked: bool,
    pub owner: CommentAuthor,
}

#[derive(sqlx::FromRow)]
struct CommentViewRow {
    id: String,
    content: String,
    created_at: String,
    likes_count: i64,
    is_liked: bool,
    owner_username: String,
    owner_fullname: String,
    owner_avatar: String,
}

impl From<CommentViewRow> for CommentView {
    fn from(row: CommentViewRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            created_at: row.created_at,
            likes_count: row.likes_count,
            is_liked: row.is_liked,
            owner: CommentAuthor {
                username: row.owner_username,
                fullname: row.owner_fullname,
                avatar: row.owner_avatar,
            },
        }
    }
}

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        id: &str,
        video_id: &str,
        owner_id: &str,
        content: &str,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO comments (id, video_id, owner_id, content) VALUES (?, ?, ?, ?)
             RETURNING id, video_id, owner_id, content, created_at, updated_at",
        )
        .bind(id)
        .bind(video_id)
        .bind(owner_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, video_id, owner_id, content, created_at, updated_at FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Comments on a video, newest first, with like state relative to `viewer_id`.
    pub async fn list_for_video(
        &self,
        video_id: &str,
        viewer_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<CommentView>, sqlx::Error> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE video_id = ?")
            .bind(video_id)
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<CommentViewRow> = sqlx::query_as(
            "SELECT c.id, c.content, c.created_at,
                (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id) AS likes_count,
                EXISTS (SELECT 1 FROM likes l WHERE l.comment_id = c.id AND l.liked_by = ?) AS is_liked,
                u.username AS owner_username, u.fullname AS owner_fullname, u.avatar_url AS owner_avatar
             FROM comments c JOIN users u ON u.id = c.owner_id
             WHERE c.video_id = ?
             ORDER BY c.created_at DESC, c.rowid DESC
             LIMIT ? OFFSET ?",
        )
        .bind(viewer_id)
        .bind(video_id)
        .bind(i64::from(limit))
        .bind(page_offset(page, limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(CommentView::from).collect(),
            total.0,
            page,
            limit,
        ))
    }

    pub async fn update(&self, id: &str, content: &str) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE comments SET content = ?, updated_at = datetime('now') WHERE id = ?
             RETURNING id, video_id, owner_id, content, created_at, updated_at",
        )
        .bind(content)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
