use async_trait::async_trait;
use chrono::DateTime;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::dto::{IssSample, PositionSelectResult, ReturningId};

pub type RowId = i64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("timestamp {0} is outside the representable calendar range")]
    InvalidTimestamp(i64),
    #[error("expected to update {expected} rows, updated {updated}")]
    RowsNotFound { expected: usize, updated: u64 },
}

/// Persistent history of ISS positions, ordered by insertion.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn has_any_row(&self) -> Result<bool, StoreError>;

    async fn insert(&self, sample: &IssSample) -> Result<RowId, StoreError>;

    /// Newest-first slice of the history, skipping `offset` rows.
    async fn recent(
        &self,
        offset: i64,
        count: i64,
    ) -> Result<Vec<PositionSelectResult>, StoreError>;

    async fn latest(&self) -> Result<Option<PositionSelectResult>, StoreError> {
        Ok(self.recent(0, 1).await?.into_iter().next())
    }

    async fn second_latest(&self) -> Result<Option<PositionSelectResult>, StoreError> {
        Ok(self.recent(1, 1).await?.into_iter().next())
    }

    async fn set_speed(&self, row_id: RowId, speed: i64) -> Result<(), StoreError> {
        self.set_speed_for_rows(&[row_id], speed).await
    }

    async fn set_speed_for_rows(&self, row_ids: &[RowId], speed: i64) -> Result<(), StoreError>;
}

pub struct SqlitePositionStore {
    pool: SqlitePool,
}

impl SqlitePositionStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqlitePositionStore { pool }
    }
}

#[async_trait]
impl PositionStore for SqlitePositionStore {
    async fn has_any_row(&self) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT EXISTS(SELECT 1 FROM iss_position)")
            .fetch_one(&self.pool)
            .await?;

        Ok(exists != 0)
    }

    async fn insert(&self, sample: &IssSample) -> Result<RowId, StoreError> {
        let recorded_at = DateTime::from_timestamp(sample.timestamp, 0)
            .ok_or(StoreError::InvalidTimestamp(sample.timestamp))?;

        let result = sqlx::query_as::<_, ReturningId>(
            "INSERT INTO iss_position (latitude, longitude, timestamp, date, time)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&sample.latitude)
        .bind(&sample.longitude)
        .bind(sample.timestamp)
        .bind(recorded_at.format("%Y-%m-%d").to_string())
        .bind(recorded_at.format("%H:%M:%S").to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(result.id)
    }

    async fn recent(
        &self,
        offset: i64,
        count: i64,
    ) -> Result<Vec<PositionSelectResult>, StoreError> {
        let positions = sqlx::query_as::<_, PositionSelectResult>(
            "SELECT id, latitude, longitude, timestamp, date, time, speed
             FROM iss_position
             ORDER BY id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(count)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(positions)
    }

    async fn set_speed_for_rows(&self, row_ids: &[RowId], speed: i64) -> Result<(), StoreError> {
        let mut row_ids = row_ids.to_vec();
        row_ids.sort_unstable();
        row_ids.dedup();

        if row_ids.is_empty() {
            return Ok(());
        }

        let query = format!(
            "UPDATE iss_position SET speed = ? WHERE id IN ({})",
            row_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ")
        );
        let mut query = sqlx::query(&query).bind(speed);
        for row_id in &row_ids {
            query = query.bind(row_id);
        }

        let updated = query.execute(&self.pool).await?.rows_affected();
        if updated != row_ids.len() as u64 {
            return Err(StoreError::RowsNotFound {
                expected: row_ids.len(),
                updated,
            });
        }

        Ok(())
    }
}
