//! Video storage and the read models built on top of it.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, sqlite::SqlitePool};

use super::{Page, page_offset};

#[derive(Clone)]
pub struct VideoStore {
    pool: SqlitePool,
}

/// A stored video.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    #[serde(rename = "owner")]
    pub owner_id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "videoFile")]
    pub video_url: String,
    pub video_public_id: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    pub thumbnail_public_id: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewVideo<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub video_url: &'a str,
    pub video_public_id: &'a str,
    pub thumbnail_url: &'a str,
    pub thumbnail_public_id: &'a str,
    pub duration: f64,
}

/// Minimal owner projection embedded in listings.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerSummary {
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
}

/// A video joined with its owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
    pub owner: OwnerSummary,
}

#[derive(sqlx::FromRow)]
pub(super) struct VideoSummaryRow {
    id: String,
    title: String,
    description: String,
    video_url: String,
    thumbnail_url: String,
    duration: f64,
    views: i64,
    is_published: bool,
    created_at: String,
    updated_at: String,
    owner_id: String,
    owner_username: String,
    owner_fullname: String,
    owner_avatar: String,
}

impl From<VideoSummaryRow> for VideoSummary {
    fn from(row: VideoSummaryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            video_file: row.video_url,
            thumbnail: row.thumbnail_url,
            duration: row.duration,
            views: row.views,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
            owner: OwnerSummary {
                id: row.owner_id,
                username: row.owner_username,
                fullname: row.owner_fullname,
                avatar: row.owner_avatar,
            },
        }
    }
}

/// Columns selected into a [`VideoSummaryRow`]; expects `v` (videos) and `u` (owner) aliases.
pub(super) const VIDEO_SUMMARY_COLUMNS: &str = "v.id, v.title, v.description, v.video_url, v.thumbnail_url, v.duration, v.views, v.is_published, v.created_at, v.updated_at, u.id AS owner_id, u.username AS owner_username, u.fullname AS owner_fullname, u.avatar_url AS owner_avatar";

/// Owner of a video as seen by a particular viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOwner {
    pub id: String,
    pub username: String,
    pub avatar: String,
    pub subscribers_count: i64,
    pub is_subscribed: bool,
}

/// Full video page: the video, its like state and its owner's channel state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub id: String,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: String,
    pub likes_count: i64,
    pub is_liked: bool,
    pub owner: VideoOwner,
}

#[derive(sqlx::FromRow)]
struct VideoDetailRow {
    id: String,
    title: String,
    description: String,
    video_url: String,
    thumbnail_url: String,
    duration: f64,
    views: i64,
    is_published: bool,
    created_at: String,
    likes_count: i64,
    is_liked: bool,
    owner_id: String,
    owner_username: String,
    owner_avatar: String,
    subscribers_count: i64,
    is_subscribed: bool,
}

impl From<VideoDetailRow> for VideoDetail {
    fn from(row: VideoDetailRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            video_file: row.video_url,
            thumbnail: row.thumbnail_url,
            duration: row.duration,
            views: row.views,
            is_published: row.is_published,
            created_at: row.created_at,
            likes_count: row.likes_count,
            is_liked: row.is_liked,
            owner: VideoOwner {
                id: row.owner_id,
                username: row.owner_username,
                avatar: row.owner_avatar,
                subscribers_count: row.subscribers_count,
                is_subscribed: row.is_subscribed,
            },
        }
    }
}

/// Sortable columns for the public video listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoSortField {
    #[default]
    CreatedAt,
    Views,
    Duration,
    Title,
}

impl VideoSortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "createdAt" => Some(Self::CreatedAt),
            "views" => Some(Self::Views),
            "duration" => Some(Self::Duration),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Views => "views",
            Self::Duration => "duration",
            Self::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VideoSort {
    pub field: VideoSortField,
    pub ascending: bool,
}

/// Filters for the public video listing. Only published videos are returned.
#[derive(Debug, Clone)]
pub struct VideoQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub owner_id: Option<String>,
    pub sort: VideoSort,
}

/// Substring pattern for `LIKE ... ESCAPE '\'`; wildcards in `search` match literally.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, query: &'a VideoQuery) {
    qb.push(" WHERE is_published = 1");
    if let Some(search) = &query.search {
        let pattern = like_pattern(search);
        qb.push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(owner_id) = &query.owner_id {
        qb.push(" AND owner_id = ").push_bind(owner_id.as_str());
    }
}

const VIDEO_COLUMNS: &str = "id, owner_id, title, description, video_url, video_public_id, thumbnail_url, thumbnail_public_id, duration, views, is_published, created_at, updated_at";

impl VideoStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, video: &NewVideo<'_>) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO videos (id, owner_id, title, description, video_url, video_public_id, thumbnail_url, thumbnail_public_id, duration, is_published) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(video.id)
        .bind(video.owner_id)
        .bind(video.title)
        .bind(video.description)
        .bind(video.video_url)
        .bind(video.video_public_id)
        .bind(video.thumbnail_url)
        .bind(video.thumbnail_public_id)
        .bind(video.duration)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Video>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM videos WHERE id = ?", VIDEO_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Whether `viewer_id` may see the video: published, or their own.
    pub async fn visible_to(&self, id: &str, viewer_id: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM videos WHERE id = ? AND (is_published = 1 OR owner_id = ?)",
        )
        .bind(id)
        .bind(viewer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Video page with like and subscription state relative to `viewer_id`.
    pub async fn detail(
        &self,
        id: &str,
        viewer_id: &str,
    ) -> Result<Option<VideoDetail>, sqlx::Error> {
        let row: Option<VideoDetailRow> = sqlx::query_as(
            "SELECT v.id, v.title, v.description, v.video_url, v.thumbnail_url, v.duration, v.views, v.is_published, v.created_at,
                (SELECT COUNT(*) FROM likes l WHERE l.video_id = v.id) AS likes_count,
                EXISTS (SELECT 1 FROM likes l WHERE l.video_id = v.id AND l.liked_by = ?1) AS is_liked,
                u.id AS owner_id, u.username AS owner_username, u.avatar_url AS owner_avatar,
                (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id) AS subscribers_count,
                EXISTS (SELECT 1 FROM subscriptions s WHERE s.channel_id = u.id AND s.subscriber_id = ?1) AS is_subscribed
             FROM videos v JOIN users u ON u.id = v.owner_id
             WHERE v.id = ?2",
        )
        .bind(viewer_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(VideoDetail::from))
    }

    /// Published videos matching the query, one page at a time.
    pub async fn list(&self, query: &VideoQuery) -> Result<Page<Video>, sqlx::Error> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM videos");
        push_filters(&mut count_qb, query);
        let total: (i64,) = count_qb.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM videos", VIDEO_COLUMNS));
        push_filters(&mut qb, query);
        qb.push(format!(
            " ORDER BY {} {}, rowid {} LIMIT ",
            query.sort.field.column(),
            if query.sort.ascending { "ASC" } else { "DESC" },
            if query.sort.ascending { "ASC" } else { "DESC" },
        ))
        .push_bind(i64::from(query.limit))
        .push(" OFFSET ")
        .push_bind(page_offset(query.page, query.limit));

        let docs: Vec<Video> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(Page::new(docs, total.0, query.page, query.limit))
    }

    /// All videos of a channel, published or not, newest first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Video>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {} FROM videos WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC",
            VIDEO_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn increment_views(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE videos SET views = views + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Update whichever fields are given; `None` keeps the current value.
    pub async fn update(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
        thumbnail: Option<(&str, &str)>,
    ) -> Result<bool, sqlx::Error> {
        let (thumbnail_url, thumbnail_public_id) = thumbnail.unzip();
        let result = sqlx::query(
            "UPDATE videos SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                thumbnail_url = COALESCE(?, thumbnail_url),
                thumbnail_public_id = COALESCE(?, thumbnail_public_id),
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(title)
        .bind(description)
        .bind(thumbnail_url)
        .bind(thumbnail_public_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_published(&self, id: &str, published: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE videos SET is_published = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(published)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a video. Comments, likes, playlist entries and watch history cascade.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LikeTarget, test_support};

    fn query() -> VideoQuery {
        VideoQuery {
            page: 1,
            limit: 10,
            search: None,
            owner_id: None,
            sort: VideoSort::default(),
        }
    }

    #[tokio::test]
    async fn test_list_only_published() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let public = test_support::video(&db, &alice, "public").await;
        let hidden = test_support::video(&db, &alice, "hidden").await;
        db.videos().set_published(&hidden, false).await.unwrap();

        let page = db.videos().list(&query()).await.unwrap();
        assert_eq!(page.total_docs, 1);
        assert_eq!(page.docs[0].id, public);
    }

    #[tokio::test]
    async fn test_list_search_owner_and_sort() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let bob = test_support::user(&db, "bob").await;
        let rust = test_support::video(&db, &alice, "learning rust").await;
        let cats = test_support::video(&db, &alice, "cats").await;
        test_support::video(&db, &bob, "rust by bob").await;

        db.videos().increment_views(&cats).await.unwrap();

        let mut q = query();
        q.search = Some("rust".to_string());
        q.owner_id = Some(alice.clone());
        let page = db.videos().list(&q).await.unwrap();
        assert_eq!(page.total_docs, 1);
        assert_eq!(page.docs[0].id, rust);

        let mut q = query();
        q.sort = VideoSort {
            field: VideoSortField::Views,
            ascending: false,
        };
        let page = db.videos().list(&q).await.unwrap();
        assert_eq!(page.docs[0].id, cats);
    }

    #[tokio::test]
    async fn test_visible_to_owner_or_when_published() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let bob = test_support::user(&db, "bob").await;
        let video = test_support::video(&db, &alice, "clip").await;

        assert!(db.videos().visible_to(&video, &bob).await.unwrap());
        db.videos().set_published(&video, false).await.unwrap();
        assert!(!db.videos().visible_to(&video, &bob).await.unwrap());
        assert!(db.videos().visible_to(&video, &alice).await.unwrap());
        assert!(!db.videos().visible_to("missing", &alice).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_wildcards_match_literally() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let full = test_support::video(&db, &alice, "100% effort").await;
        test_support::video(&db, &alice, "1000 subscribers").await;
        let snake = test_support::video(&db, &alice, "a_b testing").await;
        test_support::video(&db, &alice, "axb testing").await;

        let mut q = query();
        q.search = Some("100%".to_string());
        let page = db.videos().list(&q).await.unwrap();
        assert_eq!(page.total_docs, 1);
        assert_eq!(page.docs[0].id, full);

        q.search = Some("a_b".to_string());
        let page = db.videos().list(&q).await.unwrap();
        assert_eq!(page.total_docs, 1);
        assert_eq!(page.docs[0].id, snake);

        assert_eq!(like_pattern(r"50\_%"), r"%50\\\_\%%");
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        for i in 0..5 {
            test_support::video(&db, &alice, &format!("video {}", i)).await;
        }

        let mut q = query();
        q.limit = 2;
        q.page = 3;
        let page = db.videos().list(&q).await.unwrap();
        assert_eq!(page.total_docs, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.docs.len(), 1);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn test_detail_reflects_viewer() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let bob = test_support::user(&db, "bob").await;
        let video = test_support::video(&db, &alice, "clip").await;

        db.likes().toggle(&bob, LikeTarget::Video(&video)).await.unwrap();
        db.subscriptions().toggle(&bob, &alice).await.unwrap();

        let seen_by_bob = db.videos().detail(&video, &bob).await.unwrap().unwrap();
        assert_eq!(seen_by_bob.likes_count, 1);
        assert!(seen_by_bob.is_liked);
        assert_eq!(seen_by_bob.owner.subscribers_count, 1);
        assert!(seen_by_bob.owner.is_subscribed);

        let seen_by_alice = db.videos().detail(&video, &alice).await.unwrap().unwrap();
        assert!(!seen_by_alice.is_liked);
        assert!(!seen_by_alice.owner.is_subscribed);
    }

    #[tokio::test]
    async fn test_partial_update() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let video = test_support::video(&db, &alice, "clip").await;

        db.videos()
            .update(&video, Some("new title"), None, Some(("https://new", "new-thumb")))
            .await
            .unwrap();

        let updated = db.videos().get(&video).await.unwrap().unwrap();
        assert_eq!(updated.title, "new title");
        assert_eq!(updated.description, "description");
        assert_eq!(updated.thumbnail_public_id, "new-thumb");
    }
}
