//! Refresh-token session slots.
//!
//! Each user has at most one live refresh token. Only its sha256 fingerprint
//! is stored. Rotation is a compare-and-swap on the fingerprint, so two
//! concurrent refreshes presenting the same token cannot both succeed.

use sqlx::sqlite::SqlitePool;

/// The live refresh-token slot for a user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionSlot {
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: i64,
}

pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Install a new live token, replacing whatever was there.
    pub async fn replace(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sessions (user_id, token_hash, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET token_hash = excluded.token_hash, expires_at = excluded.expires_at, updated_at = datetime('now')",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Swap `expected_hash` for `new_hash`. Returns false if the slot no
    /// longer holds `expected_hash` (token already rotated or revoked).
    pub async fn rotate(
        &self,
        user_id: &str,
        expected_hash: &str,
        new_hash: &str,
        expires_at: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET token_hash = ?, expires_at = ?, updated_at = datetime('now')
             WHERE user_id = ? AND token_hash = ?",
        )
        .bind(new_hash)
        .bind(expires_at as i64)
        .bind(user_id)
        .bind(expected_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<SessionSlot>, sqlx::Error> {
        sqlx::query_as("SELECT user_id, token_hash, expires_at FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Clear the slot. Returns true if a live token was removed.
    pub async fn clear(&self, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete slots whose token has expired.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM sessions WHERE expires_at < CAST(strftime('%s', 'now') AS INTEGER)")
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, test_support};

    const FAR_FUTURE: u64 = 4_000_000_000;

    #[tokio::test]
    async fn test_replace_overwrites_previous_token() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;

        db.sessions().replace(&alice, "first", FAR_FUTURE).await.unwrap();
        db.sessions().replace(&alice, "second", FAR_FUTURE).await.unwrap();

        let slot = db.sessions().get(&alice).await.unwrap().unwrap();
        assert_eq!(slot.token_hash, "second");
    }

    #[tokio::test]
    async fn test_rotate_is_compare_and_swap() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        db.sessions().replace(&alice, "first", FAR_FUTURE).await.unwrap();

        assert!(db.sessions().rotate(&alice, "first", "second", FAR_FUTURE).await.unwrap());
        // Replaying the old fingerprint loses the race
        assert!(!db.sessions().rotate(&alice, "first", "third", FAR_FUTURE).await.unwrap());

        let slot = db.sessions().get(&alice).await.unwrap().unwrap();
        assert_eq!(slot.token_hash, "second");
    }

    #[tokio::test]
    async fn test_rotate_after_clear_fails() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        db.sessions().replace(&alice, "first", FAR_FUTURE).await.unwrap();

        assert!(db.sessions().clear(&alice).await.unwrap());
        assert!(!db.sessions().clear(&alice).await.unwrap());
        assert!(!db.sessions().rotate(&alice, "first", "second", FAR_FUTURE).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let bob = test_support::user(&db, "bob").await;

        db.sessions().replace(&alice, "old", 1).await.unwrap();
        db.sessions().replace(&bob, "new", FAR_FUTURE).await.unwrap();

        assert_eq!(db.sessions().delete_expired().await.unwrap(), 1);
        assert!(db.sessions().get(&alice).await.unwrap().is_none());
        assert!(db.sessions().get(&bob).await.unwrap().is_some());
    }
}
