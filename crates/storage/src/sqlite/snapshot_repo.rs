use chrono::Utc;
use exam_core::model::CheckpointState;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{CheckpointSnapshotRepository, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl CheckpointSnapshotRepository for SqliteRepository {
    async fn save(&self, state: &CheckpointState) -> Result<(), StorageError> {
        let payload = serde_json::to_string(state)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r"
                INSERT INTO checkpoint_snapshot (slot, state, saved_at)
                VALUES (0, ?1, ?2)
                ON CONFLICT(slot) DO UPDATE SET
                    state = excluded.state,
                    saved_at = excluded.saved_at
            ",
        )
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<CheckpointState>, StorageError> {
        let row = sqlx::query("SELECT state FROM checkpoint_snapshot WHERE slot = 0")
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|row| {
            let payload: String = row
                .try_get("state")
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            serde_json::from_str(&payload)
                .map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM checkpoint_snapshot WHERE slot = 0")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
