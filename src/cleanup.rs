//! Scheduled cleanup of expired session slots.

use crate::db::Database;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database) {
    match db.sessions().delete_expired().await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired sessions", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired sessions: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[tokio::test]
    async fn test_run_cleanup_removes_only_expired_sessions() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_support::user(&db, "alice").await;
        let bob = test_support::user(&db, "bob").await;

        db.sessions().replace(&alice, "a-hash", 1).await.unwrap();
        db.sessions()
            .replace(&bob, "b-hash", 4_000_000_000)
            .await
            .unwrap();

        run_cleanup(&db).await;

        assert!(db.sessions().get(&alice).await.unwrap().is_none());
        assert!(db.sessions().get(&bob).await.unwrap().is_some());
    }
}
