use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct SubscriptionStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriberProfile {
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
}

/// One subscriber of a channel.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberEntry {
    pub id: String,
    pub subscriber: SubscriberProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestVideo {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub views: i64,
    pub created_at: String,
}

/// A channel the user subscribes to, with its most recent published video.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedChannel {
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
    pub latest_video: Option<LatestVideo>,
}

#[derive(sqlx::FromRow)]
struct SubscriberRow {
    id: String,
    subscriber_id: String,
    username: String,
    fullname: String,
    avatar_url: String,
}

#[derive(sqlx::FromRow)]
struct SubscribedChannelRow {
    id: String,
    username: String,
    fullname: String,
    avatar_url: String,
    video_id: Option<String>,
    video_title: Option<String>,
    video_thumbnail: Option<String>,
    video_views: Option<i64>,
    video_created_at: Option<String>,
}

impl SubscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Subscribe if not subscribed, unsubscribe otherwise.
    /// Returns whether the subscriber is subscribed afterwards.
    pub async fn toggle(&self, subscriber_id: &str, channel_id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let removed =
            sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?")
                .bind(subscriber_id)
                .bind(channel_id)
                .execute(&mut *tx)
                .await?;

        let subscribed = if removed.rows_affected() > 0 {
            false
        } else {
            sqlx::query(
                "INSERT OR IGNORE INTO subscriptions (id, subscriber_id, channel_id) VALUES (?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(subscriber_id)
            .bind(channel_id)
            .execute(&mut *tx)
            .await?;
            true
        };

        tx.commit().await?;
        Ok(subscribed)
    }

    pub async fn subscribers(&self, channel_id: &str) -> Result<Vec<SubscriberEntry>, sqlx::Error> {
        let rows: Vec<SubscriberRow> = sqlx::query_as(
            "SELECT s.id, u.id AS subscriber_id, u.username, u.fullname, u.avatar_url
             FROM subscriptions s JOIN users u ON u.id = s.subscriber_id
             WHERE s.channel_id = ?
             ORDER BY s.created_at, s.rowid",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SubscriberEntry {
                id: row.id,
                subscriber: SubscriberProfile {
                    id: row.subscriber_id,
                    username: row.username,
                    fullname: row.fullname,
                    avatar: row.avatar_url,
                },
            })
            .collect())
    }

    pub async fn subscribed_channels(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<SubscribedChannel>, sqlx::Error> {
        let rows: Vec<SubscribedChannelRow> = sqlx::query_as(
            "SELECT u.id, u.username, u.fullname, u.avatar_url,
                v.id AS video_id, v.title AS video_title, v.thumbnail_url AS video_thumbnail,
                v.views AS video_views, v.created_at AS video_created_at
             FROM subscriptions s
             JOIN users u ON u.id = s.channel_id
             LEFT JOIN videos v ON v.id = (
                SELECT id FROM videos
                WHERE owner_id = u.id AND is_published = 1
                ORDER BY created_at DESC, rowid DESC LIMIT 1
             )
             WHERE s.subscriber_id = ?
             ORDER BY s.created_at, s.rowid",
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let latest_video = match (
                    row.video_id,
                    row.video_title,
                    row.video_thumbnail,
                    row.video_views,
                    row.video_created_at,
                ) {
                    (Some(id), Some(title), Some(thumbnail), Some(views), Some(created_at)) => {
                        Some(LatestVideo {
                            id,
                            title,
                            thumbnail,
                            views,
                            created_at,
                        })
                    }
                    _ => None,
                };
                SubscribedChannel {
                    id: row.id,
                    username: row.username,
                    fullname: row.fullname,
                    avatar: row.avatar_url,
                    latest_video,
                }
            })
            .collect())
    }
}
