//! Aggregates for a channel owner's dashboard.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::video::Video;

#[derive(Clone)]
pub struct DashboardStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub id: String,
    pub username: String,
    pub fullname: String,
    #[sqlx(rename = "avatar_url")]
    pub avatar: String,
    pub total_likes: i64,
    pub total_views: i64,
    pub total_videos: i64,
    pub total_subscribers: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelVideos {
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
    pub subscriber_count: i64,
    pub video_count: i64,
    pub videos: Vec<Video>,
}

impl DashboardStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Totals across every video of the channel, published or not.
    pub async fn stats(&self, channel_id: &str) -> Result<Option<ChannelStats>, sqlx::Error> {
        sqlx::query_as(
            "SELECT u.id, u.username, u.fullname, u.avatar_url,
                (SELECT COUNT(*) FROM likes l JOIN videos v ON v.id = l.video_id WHERE v.owner_id = u.id) AS total_likes,
                (SELECT COALESCE(SUM(v.views), 0) FROM videos v WHERE v.owner_id = u.id) AS total_views,
                (SELECT COUNT(*) FROM videos v WHERE v.owner_id = u.id) AS total_videos,
                (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id) AS total_subscribers
             FROM users u WHERE u.id = ?",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn channel_videos(&self, channel_id: &str) -> Result<Option<ChannelVideos>, sqlx::Error> {
        let row: Option<(String, String, String, String, i64)> = sqlx::query_as(
            "SELECT u.id, u.username, u.fullname, u.avatar_url,
                (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)
             FROM users u WHERE u.id = ?",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, username, fullname, avatar, subscriber_count)) = row else {
            return Ok(None);
        };

        let videos = super::VideoStore::new(self.pool.clone())
            .list_by_owner(channel_id)
            .await?;

        Ok(Some(ChannelVideos {
            id,
            username,
            fullname,
            avatar,
            subscriber_count,
            video_count: videos.len() as i64,
            videos,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, LikeTarget, test_support};

    #[tokio::test]
    async fn test_stats_counts_each_dimension_once() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let bob = test_support::user(&db, "bob").await;
        let carol = test_support::user(&db, "carol").await;

        let first = test_support::video(&db, &alice, "first").await;
        let second = test_support::video(&db, &alice, "second").await;
        db.videos().set_published(&second, false).await.unwrap();
        db.videos().increment_views(&first).await.unwrap();
        db.videos().increment_views(&second).await.unwrap();

        db.likes().toggle(&bob, LikeTarget::Video(&first)).await.unwrap();
        db.likes().toggle(&carol, LikeTarget::Video(&first)).await.unwrap();
        db.subscriptions().toggle(&bob, &alice).await.unwrap();
        db.subscriptions().toggle(&carol, &alice).await.unwrap();

        let stats = db.dashboard().stats(&alice).await.unwrap().unwrap();
        assert_eq!(stats.total_videos, 2);
        assert_eq!(stats.total_views, 2);
        assert_eq!(stats.total_likes, 2);
        assert_eq!(stats.total_subscribers, 2);
    }

    #[tokio::test]
    async fn test_channel_videos_includes_unpublished() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let hidden = test_support::video(&db, &alice, "hidden").await;
        db.videos().set_published(&hidden, false).await.unwrap();

        let channel = db.dashboard().channel_videos(&alice).await.unwrap().unwrap();
        assert_eq!(channel.video_count, 1);
        assert!(!channel.videos[0].is_published);
        assert_eq!(channel.subscriber_count, 0);

        assert!(db.dashboard().channel_videos("nobody").await.unwrap().is_none());
    }
}
