use chrono::{DateTime, Duration, Utc};
use exam_core::model::{AttemptId, SessionToken};
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{AttemptCacheRepository, CachedAttempt, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn map_cached_row(row: &sqlx::sqlite::SqliteRow) -> Result<CachedAttempt, StorageError> {
    let attempt_id: String = row.try_get("attempt_id").map_err(ser)?;
    let session_token: String = row.try_get("session_token").map_err(ser)?;
    let saved_at: DateTime<Utc> = row.try_get("saved_at").map_err(ser)?;
    Ok(CachedAttempt {
        attempt_id: AttemptId::new(attempt_id),
        session_token: SessionToken::new(session_token),
        saved_at,
    })
}

#[async_trait::async_trait]
impl AttemptCacheRepository for SqliteRepository {
    async fn save_session_token(
        &self,
        attempt_id: &AttemptId,
        token: &SessionToken,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO attempt_cache (attempt_id, session_token, saved_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(attempt_id) DO UPDATE SET
                    session_token = excluded.session_token,
                    saved_at = excluded.saved_at
            ",
        )
        .bind(attempt_id.as_str())
        .bind(token.as_str())
        .bind(saved_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get(&self, attempt_id: &AttemptId) -> Result<Option<CachedAttempt>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT attempt_id, session_token, saved_at
                FROM attempt_cache
                WHERE attempt_id = ?1
            ",
        )
        .bind(attempt_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_cached_row).transpose()
    }

    async fn clear_local(&self, attempt_id: &AttemptId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM attempt_cache WHERE attempt_id = ?1")
            .bind(attempt_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn clear_all_local(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM attempt_cache")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn clear_stale_data(
        &self,
        max_age_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let cutoff = now - Duration::hours(i64::from(max_age_hours));
        let res = sqlx::query("DELETE FROM attempt_cache WHERE saved_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected())
    }

    async fn validate_and_cleanup(&self, keep: &AttemptId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM attempt_cache WHERE attempt_id != ?1")
            .bind(keep.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn last_attempt(&self) -> Result<Option<AttemptId>, StorageError> {
        let row = sqlx::query("SELECT attempt_id FROM last_attempt WHERE slot = 0")
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|row| {
            let id: String = row.try_get("attempt_id").map_err(ser)?;
            Ok(AttemptId::new(id))
        })
        .transpose()
    }

    async fn set_last_attempt(&self, attempt_id: &AttemptId) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO last_attempt (slot, attempt_id)
                VALUES (0, ?1)
                ON CONFLICT(slot) DO UPDATE SET attempt_id = excluded.attempt_id
            ",
        )
        .bind(attempt_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn clear_last_attempt_if(&self, attempt_id: &AttemptId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM last_attempt WHERE slot = 0 AND attempt_id = ?1")
            .bind(attempt_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
