use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::video::{OwnerSummary, VIDEO_SUMMARY_COLUMNS, VideoSummary, VideoSummaryRow};

#[derive(Clone)]
pub struct PlaylistStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    #[serde(rename = "owner")]
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistCover {
    pub id: String,
    pub thumbnail: String,
}

/// A playlist as listed on a user's page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
    pub video_count: i64,
    pub first_video: Option<PlaylistCover>,
}

/// A playlist with its owner and videos.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDetail {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
    pub owner: OwnerSummary,
    pub videos: Vec<VideoSummary>,
    pub video_count: i64,
    pub views_count: i64,
}

#[derive(sqlx::FromRow)]
struct PlaylistSummaryRow {
    id: String,
    name: String,
    description: String,
    created_at: String,
    updated_at: String,
    video_count: i64,
    first_video_id: Option<String>,
    first_video_thumbnail: Option<String>,
}

const PLAYLIST_COLUMNS: &str = "id, owner_id, name, description, created_at, updated_at";

impl PlaylistStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Playlist, sqlx::Error> {
        sqlx::query_as(&format!(
            "INSERT INTO playlists (id, owner_id, name, description) VALUES (?, ?, ?, ?) RETURNING {}",
            PLAYLIST_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Playlist>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM playlists WHERE id = ?", PLAYLIST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<PlaylistSummary>, sqlx::Error> {
        let rows: Vec<PlaylistSummaryRow> = sqlx::query_as(
            "SELECT p.id, p.name, p.description, p.created_at, p.updated_at,
                (SELECT COUNT(*) FROM playlist_videos pv WHERE pv.playlist_id = p.id) AS video_count,
                fv.id AS first_video_id, fv.thumbnail_url AS first_video_thumbnail
             FROM playlists p
             LEFT JOIN videos fv ON fv.id = (
                SELECT pv.video_id FROM playlist_videos pv
                WHERE pv.playlist_id = p.id
                ORDER BY pv.added_at, pv.rowid LIMIT 1
             )
             WHERE p.owner_id = ?
             ORDER BY p.created_at DESC, p.rowid DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PlaylistSummary {
                id: row.id,
                name: row.name,
                description: row.description,
                created_at: row.created_at,
                updated_at: row.updated_at,
                video_count: row.video_count,
                first_video: row
                    .first_video_id
                    .zip(row.first_video_thumbnail)
                    .map(|(id, thumbnail)| PlaylistCover { id, thumbnail }),
            })
            .collect())
    }

    /// Playlist with its videos in insertion order. Unpublished videos are
    /// listed only for their owner.
    pub async fn detail(
        &self,
        id: &str,
        viewer_id: &str,
    ) -> Result<Option<PlaylistDetail>, sqlx::Error> {
        let Some(playlist) = self.get(id).await? else {
            return Ok(None);
        };

        let owner: (String, String, String, String) =
            sqlx::query_as("SELECT id, username, fullname, avatar_url FROM users WHERE id = ?")
                .bind(&playlist.owner_id)
                .fetch_one(&self.pool)
                .await?;

        let rows: Vec<VideoSummaryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM playlist_videos pv
             JOIN videos v ON v.id = pv.video_id
             JOIN users u ON u.id = v.owner_id
             WHERE pv.playlist_id = ? AND (v.is_published = 1 OR v.owner_id = ?)
             ORDER BY pv.added_at, pv.rowid",
            VIDEO_SUMMARY_COLUMNS
        ))
        .bind(id)
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;
        let videos: Vec<VideoSummary> = rows.into_iter().map(VideoSummary::from).collect();

        Ok(Some(PlaylistDetail {
            id: playlist.id,
            name: playlist.name,
            description: playlist.description,
            created_at: playlist.created_at,
            updated_at: playlist.updated_at,
            owner: OwnerSummary {
                id: owner.0,
                username: owner.1,
                fullname: owner.2,
                avatar: owner.3,
            },
            video_count: videos.len() as i64,
            views_count: videos.iter().map(|v| v.views).sum(),
            videos,
        }))
    }

    pub async fn update(
        &self,
        id: &str,
        name: &str,
        description: &str,
    ) -> Result<Option<Playlist>, sqlx::Error> {
        sqlx::query_as(&format!(
            "UPDATE playlists SET name = ?, description = ?, updated_at = datetime('now') WHERE id = ? RETURNING {}",
            PLAYLIST_COLUMNS
        ))
        .bind(name)
        .bind(description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add a video. Adding a video already in the playlist is a no-op.
    pub async fn add_video(&self, playlist_id: &str, video_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO playlist_videos (playlist_id, video_id) VALUES (?, ?)")
            .bind(playlist_id)
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        self.touch(playlist_id).await
    }

    pub async fn remove_video(&self, playlist_id: &str, video_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ? AND video_id = ?")
            .bind(playlist_id)
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        self.touch(playlist_id).await
    }

    async fn touch(&self, playlist_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE playlists SET updated_at = datetime('now') WHERE id = ?")
            .bind(playlist_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
